//! Demo application (app port) — a tiny site whose handlers exercise every
//! re-dispatch kind, so the correlator has something to correlate.
//!
//! Nested invocations are built with [`redispatch`] and re-enter the fully
//! layered chain through [`AppState::chain`]. Each re-entry passes through
//! the correlator again and is recorded as a related invocation of the same
//! exchange:
//!
//! - `/page` hands its response over to `/page/full` (FORWARD)
//! - `/report` embeds `/report/summary` in its own body (INCLUDE)
//! - `/defer` finishes its work on a spawned task (ASYNC)
//! - `/boom` fails, and response middleware renders `/oops` (ERROR)

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use axum::{
    body::to_bytes,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower::ServiceExt;

use crate::correlator::ExchangeTraceLayer;
use crate::dispatch::{redispatch, DispatcherKind};
use crate::error::AppError;
use crate::timeline::Timeline;

/// Shared state of the demo server.
pub struct AppState {
    /// The fully layered application, registered once at startup so
    /// handlers can re-enter it for internal dispatches.
    chain: OnceLock<Router>,
    /// Sink buffering committed events for the admin API.
    pub timeline: Arc<Timeline>,
    /// Process start, for the admin uptime readout.
    pub started_at: Instant,
}

impl AppState {
    pub fn new(timeline: Arc<Timeline>) -> Self {
        Self {
            chain: OnceLock::new(),
            timeline,
            started_at: Instant::now(),
        }
    }

    /// The traced chain nested dispatches re-enter. Routers are cheap to
    /// clone, so every dispatch takes its own copy.
    pub fn chain(&self) -> Router {
        self.chain
            .get()
            .cloned()
            .expect("dispatch chain not initialised; build the app with traced_app")
    }

    fn set_chain(&self, chain: Router) {
        if self.chain.set(chain).is_err() {
            tracing::warn!("dispatch chain already initialised, keeping the first");
        }
    }
}

/// Build the demo application with the correlator applied outermost, and
/// register the finished chain on `state` so handlers can re-enter it.
pub fn traced_app(state: Arc<AppState>, layer: ExchangeTraceLayer) -> Router {
    let app = router(state.clone()).layer(layer);
    state.set_chain(app.clone());
    app
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/page", get(page))
        .route("/page/full", get(page_full))
        .route("/report", get(report))
        .route("/report/summary", get(report_summary))
        .route("/defer", get(defer))
        .route("/defer/complete", get(defer_complete))
        .route("/boom", get(boom))
        .route("/oops", get(oops))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            error_page_middleware,
        ))
        .with_state(state)
}

/// GET / — lists what the demo exposes.
async fn index() -> impl IntoResponse {
    Json(json!({
        "name": "exchange-trace demo",
        "routes": {
            "/page": "forward dispatch",
            "/report": "include dispatch",
            "/defer": "async continuation",
            "/boom": "failure followed by an error-page dispatch",
        },
    }))
}

/// GET /page — hands the whole response over to `/page/full`.
async fn page(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Response, AppError> {
    let nested = redispatch(request.extensions(), DispatcherKind::Forward, "/page/full")?;
    Ok(state.chain().oneshot(nested).await?)
}

/// GET /page/full — the forward target.
async fn page_full() -> &'static str {
    "the full page\n"
}

/// GET /report — embeds `/report/summary` into its own body.
async fn report(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<String, AppError> {
    let nested = redispatch(request.extensions(), DispatcherKind::Include, "/report/summary")?;
    let response = state.chain().oneshot(nested).await?;
    let summary = to_bytes(response.into_body(), 64 * 1024).await?;
    Ok(format!(
        "report\n======\n{}",
        String::from_utf8_lossy(&summary)
    ))
}

/// GET /report/summary — the include target.
async fn report_summary() -> &'static str {
    "all exchanges accounted for\n"
}

/// GET /defer — runs `/defer/complete` on a spawned task, answering 202
/// once the continuation has finished.
async fn defer(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<impl IntoResponse, AppError> {
    let nested = redispatch(request.extensions(), DispatcherKind::Async, "/defer/complete")?;
    let chain = state.chain();
    let continuation = tokio::spawn(async move { chain.oneshot(nested).await });
    continuation.await??;
    Ok((StatusCode::ACCEPTED, "continuation complete\n"))
}

/// GET /defer/complete — the continuation target.
async fn defer_complete() -> &'static str {
    "deferred work finished\n"
}

/// GET /boom — always fails, exercising the error-page dispatch.
async fn boom() -> Result<&'static str, AppError> {
    Err(anyhow::anyhow!("simulated application failure").into())
}

/// GET /oops — the error page targeted by ERROR dispatches.
async fn oops() -> &'static str {
    "something went wrong, but it was traced\n"
}

/// Response middleware performing the error-page dispatch.
///
/// A 5xx from any route re-enters the chain at `/oops` with kind ERROR, so
/// rendering the error page shows up on the exchange timeline like any other
/// nested invocation. The final response keeps the failing status but
/// carries the error page's body. Invocations that are themselves ERROR
/// dispatches are exempt, so a failing error page cannot recurse.
async fn error_page_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let announced = DispatcherKind::announced(request.extensions());
    let extensions = request.extensions().clone();

    let response = next.run(request).await;
    if !response.status().is_server_error() || announced == DispatcherKind::Error {
        return response;
    }

    let nested = match redispatch(&extensions, DispatcherKind::Error, "/oops") {
        Ok(nested) => nested,
        Err(_) => return response,
    };
    match state.chain().oneshot(nested).await {
        Ok(page) => (response.status(), page.into_body()).into_response(),
        Err(_) => response,
    }
}

//! Admin API (admin port) — operator-facing introspection endpoints.
//!
//! These endpoints are separated onto a different port so they can be
//! network-restricted independently of the traced application (e.g.
//! reachable only from an internal network). They are read-only views over
//! the in-memory timeline; nothing here passes through the correlator.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::api::app::AppState;
use crate::exchange::ExchangeId;

/// Build the admin-facing axum router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/timeline", get(timeline))
        .route("/timeline/{id}", get(exchange_timeline))
        .with_state(state)
}

/// GET /healthz — liveness probe.
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}

#[derive(Deserialize)]
struct TimelineQuery {
    #[serde(default = "default_limit")]
    limit: usize,
}
fn default_limit() -> usize {
    100
}

/// GET /timeline?limit=N — recent committed events (default 100) plus
/// aggregate stats, newest first.
async fn timeline(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TimelineQuery>,
) -> impl IntoResponse {
    let entries = state.timeline.recent(q.limit).await;
    let stats = state.timeline.stats().await;
    Json(json!({
        "stats": stats,
        "entries": entries,
    }))
}

/// GET /timeline/{id} — one exchange's correlated timeline, oldest first.
///
/// 404 when the buffer holds no events for the id (unknown, or already
/// evicted).
async fn exchange_timeline(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let events = state.timeline.events_for(ExchangeId::from(id)).await;
    if events.is_empty() {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no buffered events for exchange {id}") })),
        )
            .into_response();
    }
    Json(json!({
        "exchange_id": id,
        "events": events,
    }))
    .into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use http::Request;
    use tower::ServiceExt;

    use crate::dispatch::DispatcherKind;
    use crate::event::{ExchangeEvent, RelatedExchangeEvent};
    use crate::sink::EventSink;
    use crate::timeline::Timeline;

    use super::*;

    // -----------------------------------------------------------------------
    // Test helpers
    // -----------------------------------------------------------------------

    fn seeded_state() -> Arc<AppState> {
        let timeline = Timeline::new(32);
        // One complete exchange: a forward, then its outer event.
        let mut related = RelatedExchangeEvent::new(ExchangeId::from(5), DispatcherKind::Forward);
        related.end();
        timeline.commit_related(related);
        timeline.commit_exchange(exchange_event(5, "/page", 200));
        // A second, unrelated exchange.
        timeline.commit_exchange(exchange_event(6, "/report", 500));
        Arc::new(AppState::new(Arc::new(timeline)))
    }

    fn exchange_event(id: i64, uri: &str, status: u16) -> ExchangeEvent {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let mut event = ExchangeEvent::from_request(ExchangeId::from(id), &request);
        event.status = status;
        event.duration_ms = Some(12);
        event
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    // -----------------------------------------------------------------------
    // GET /healthz
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn healthz_reports_ok() {
        let app = router(seeded_state());
        let (status, json) = get_json(app, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert!(json["uptime_secs"].is_u64());
    }

    // -----------------------------------------------------------------------
    // GET /timeline
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn timeline_returns_stats_and_entries_newest_first() {
        let app = router(seeded_state());
        let (status, json) = get_json(app, "/timeline").await;
        assert_eq!(status, StatusCode::OK);

        assert_eq!(json["stats"]["total_events"], 3);
        assert_eq!(json["stats"]["exchanges"], 2);
        assert_eq!(json["stats"]["related"], 1);

        let entries = json["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 3);
        // Newest first; exchange 6 committed last.
        assert_eq!(entries[0]["exchange_id"], 6);
        assert_eq!(entries[2]["event"], "related");
    }

    #[tokio::test]
    async fn timeline_respects_limit_parameter() {
        let app = router(seeded_state());
        let (_, json) = get_json(app, "/timeline?limit=1").await;
        assert_eq!(json["entries"].as_array().unwrap().len(), 1);
    }

    // -----------------------------------------------------------------------
    // GET /timeline/{id}
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn exchange_timeline_returns_events_oldest_first() {
        let app = router(seeded_state());
        let (status, json) = get_json(app, "/timeline/5").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["exchange_id"], 5);

        let events = json["events"].as_array().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["event"], "related");
        assert_eq!(events[0]["dispatcher"], "FORWARD");
        assert_eq!(events[1]["event"], "exchange");
        assert_eq!(events[1]["uri"], "/page");
    }

    #[tokio::test]
    async fn exchange_timeline_404s_for_unknown_id() {
        let app = router(seeded_state());
        let (status, json) = get_json(app, "/timeline/999").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json["error"].as_str().unwrap().contains("999"));
    }
}

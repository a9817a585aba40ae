//! The exchange correlator: tower middleware that ties every internal
//! re-dispatch of an HTTP request back to one exchange.
//!
//! [`ExchangeTrace`] wraps the downstream service. On each invocation it
//! reads the exchange slot on the request:
//!
//! - Slot empty: this is the outermost invocation of a **new exchange**. A
//!   fresh id is minted and attached, and an exchange event is recorded
//!   carrying method, URI path, query string, dispatcher kind, and, once
//!   downstream answers, the response status.
//! - Slot occupied: a **related invocation** of an exchange already in
//!   flight. A related event is recorded carrying the shared id and the
//!   dispatcher kind announced at entry, nothing more.
//!
//! Downstream is invoked exactly once per invocation and its outcome is
//! returned unchanged; the correlator neither translates errors nor retries.
//! The in-flight event is owned by a drop guard, so it is ended and
//! committed exactly once on every exit path: normal completion, downstream
//! failure, a panic unwinding through the response future, or the future
//! being dropped before completion.
//!
//! Apply the layer outermost on the router, so nested re-entries of the
//! chain pass through it too:
//!
//! ```rust,ignore
//! let timeline = Arc::new(Timeline::new(512));
//! let app = Router::new()
//!     .route("/page", get(page))
//!     .layer(ExchangeTraceLayer::new(timeline.clone()));
//! ```

use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use http::{Request, Response, StatusCode};
use tower::{Layer, Service};
use tracing::Instrument as _;

use crate::dispatch::DispatcherKind;
use crate::event::{ExchangeEvent, RelatedExchangeEvent};
use crate::exchange::ExchangeId;
use crate::sink::{EventSink, TracingSink};

/// Layer applying [`ExchangeTrace`] to a service.
#[derive(Clone)]
pub struct ExchangeTraceLayer {
    sink: Arc<dyn EventSink>,
}

impl ExchangeTraceLayer {
    /// Correlate exchanges and commit their events to `sink`.
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    /// Correlate exchanges and commit their events as structured log
    /// records via [`TracingSink`].
    pub fn to_tracing() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl<S> Layer<S> for ExchangeTraceLayer {
    type Service = ExchangeTrace<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ExchangeTrace {
            inner,
            sink: Arc::clone(&self.sink),
        }
    }
}

/// Middleware service correlating invocations into exchanges. Built by
/// [`ExchangeTraceLayer`].
#[derive(Clone)]
pub struct ExchangeTrace<S> {
    inner: S,
    sink: Arc<dyn EventSink>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for ExchangeTrace<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        // Take the instance that was driven to readiness; leave the clone
        // for the next call.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        match ExchangeId::attached(req.extensions()) {
            None => {
                let id = ExchangeId::generate();
                id.attach(req.extensions_mut());

                let mut event = ExchangeEvent::from_request(id, &req);
                event.begin();
                let mut guard = FinalizeExchange::new(event, Arc::clone(&self.sink));

                // Span so application log lines carry the exchange id.
                let span = tracing::debug_span!("exchange", id = %id);
                let future = inner.call(req);
                Box::pin(
                    async move {
                        let result = future.await;
                        if let Ok(response) = &result {
                            guard.record_status(response.status());
                        }
                        // Finalize before the caller observes the outcome.
                        drop(guard);
                        result
                    }
                    .instrument(span),
                )
            }
            Some(id) => {
                // Snapshot the kind announced at entry; downstream must not
                // influence what the event reports.
                let kind = DispatcherKind::announced(req.extensions());
                let event = RelatedExchangeEvent::new(id, kind);
                let guard = FinalizeRelated::new(event, Arc::clone(&self.sink));

                let future = inner.call(req);
                Box::pin(async move {
                    let result = future.await;
                    drop(guard);
                    result
                })
            }
        }
    }
}

/// Owns the in-flight exchange event and guarantees its finalization.
///
/// `Drop` runs on every exit path of the response future, so the event is
/// ended and committed exactly once however the invocation terminates.
struct FinalizeExchange {
    event: Option<ExchangeEvent>,
    sink: Arc<dyn EventSink>,
}

impl FinalizeExchange {
    fn new(event: ExchangeEvent, sink: Arc<dyn EventSink>) -> Self {
        Self {
            event: Some(event),
            sink,
        }
    }

    fn record_status(&mut self, status: StatusCode) {
        if let Some(event) = self.event.as_mut() {
            event.set_status(status);
        }
    }
}

impl Drop for FinalizeExchange {
    fn drop(&mut self) {
        if let Some(mut event) = self.event.take() {
            event.end();
            self.sink.commit_exchange(event);
        }
    }
}

/// Drop guard finalizing a related invocation's event.
struct FinalizeRelated {
    event: Option<RelatedExchangeEvent>,
    sink: Arc<dyn EventSink>,
}

impl FinalizeRelated {
    fn new(event: RelatedExchangeEvent, sink: Arc<dyn EventSink>) -> Self {
        Self {
            event: Some(event),
            sink,
        }
    }
}

impl Drop for FinalizeRelated {
    fn drop(&mut self) {
        if let Some(mut event) = self.event.take() {
            event.end();
            self.sink.commit_related(event);
        }
    }
}

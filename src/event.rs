//! The two trace event shapes an exchange timeline is made of.
//!
//! The outermost invocation of an exchange produces an [`ExchangeEvent`]
//! carrying the full request/response attributes. Every nested invocation
//! produces a [`RelatedExchangeEvent`] carrying nothing but the shared id
//! and the re-dispatch reason; the id is the join key that relates it back
//! to its exchange.

use std::time::Instant;

use chrono::{DateTime, Utc};
use http::{Request, StatusCode};
use serde::{Deserialize, Serialize};

use crate::dispatch::DispatcherKind;
use crate::exchange::ExchangeId;

/// Trace event for the outermost invocation of an HTTP exchange.
///
/// Created and begun when the invocation is first observed, finalized with
/// [`end`][Self::end] exactly once when it completes, however it completes.
/// A `status` of 0 means downstream never produced a response (it failed or
/// the exchange was cancelled mid-flight).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeEvent {
    /// Id shared by every event of this exchange.
    pub exchange_id: ExchangeId,
    /// HTTP method of the original request.
    pub method: String,
    /// Request URI path, without the query string.
    pub uri: String,
    /// Query string, when the request carried one.
    pub query: Option<String>,
    /// Final response status code; 0 until a response is observed.
    pub status: u16,
    /// How this invocation entered the chain. `REQUEST` for the outermost
    /// invocation of a client request.
    pub dispatcher: DispatcherKind,
    /// Wall-clock time [`begin`][Self::begin] was called.
    pub started_at: Option<DateTime<Utc>>,
    /// Time between begin and end, measured on a monotonic clock.
    pub duration_ms: Option<u64>,
    #[serde(skip)]
    begun: Option<Instant>,
}

impl ExchangeEvent {
    /// Build an event from the outermost invocation's request attributes.
    ///
    /// Captures method, URI path, query string, and the announced dispatcher
    /// kind. The event is not yet begun and carries no status.
    pub fn from_request<B>(id: ExchangeId, request: &Request<B>) -> Self {
        Self {
            exchange_id: id,
            method: request.method().to_string(),
            uri: request.uri().path().to_string(),
            query: request.uri().query().map(str::to_string),
            status: 0,
            dispatcher: DispatcherKind::announced(request.extensions()),
            started_at: None,
            duration_ms: None,
            begun: None,
        }
    }

    /// Start the event, capturing its wall-clock and monotonic start times.
    pub fn begin(&mut self) {
        self.started_at = Some(Utc::now());
        self.begun = Some(Instant::now());
    }

    /// Copy the downstream response status into the event.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status.as_u16();
    }

    /// Stop the event. Populates `duration_ms` when the event was begun.
    pub fn end(&mut self) {
        if let Some(begun) = self.begun.take() {
            self.duration_ms = Some(begun.elapsed().as_millis() as u64);
        }
    }
}

/// Trace event for a nested invocation of an exchange already in flight.
///
/// Carries only the shared id and the re-dispatch reason. This shape has no
/// begin operation: related invocations are marked, not timed, so no
/// meaningful duration exists for them. `ended_at` records when the
/// invocation finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedExchangeEvent {
    /// Id of the exchange this invocation belongs to, copied unchanged from
    /// the request slot.
    pub exchange_id: ExchangeId,
    /// Re-dispatch reason announced at invocation entry.
    pub dispatcher: DispatcherKind,
    /// Wall-clock time [`end`][Self::end] was called.
    pub ended_at: Option<DateTime<Utc>>,
}

impl RelatedExchangeEvent {
    /// Build an event for a nested invocation. The kind is snapshotted here,
    /// before downstream runs, so it always reflects the kind announced at
    /// entry.
    pub fn new(id: ExchangeId, dispatcher: DispatcherKind) -> Self {
        Self {
            exchange_id: id,
            dispatcher,
            ended_at: None,
        }
    }

    /// Stop the event.
    pub fn end(&mut self) {
        self.ended_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;

    use super::*;

    fn request(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    // -----------------------------------------------------------------------
    // Exchange event
    // -----------------------------------------------------------------------

    #[test]
    fn captures_request_attributes() {
        let id = ExchangeId::from(42);
        let event = ExchangeEvent::from_request(id, &request("/app/page?tab=1"));

        assert_eq!(event.exchange_id, id);
        assert_eq!(event.method, "GET");
        assert_eq!(event.uri, "/app/page");
        assert_eq!(event.query.as_deref(), Some("tab=1"));
        assert_eq!(event.dispatcher, DispatcherKind::Request);
        assert_eq!(event.status, 0);
    }

    #[test]
    fn query_absent_when_request_has_none() {
        let event = ExchangeEvent::from_request(ExchangeId::from(1), &request("/plain"));
        assert_eq!(event.query, None);
    }

    #[test]
    fn begin_then_end_populates_timing() {
        let mut event = ExchangeEvent::from_request(ExchangeId::from(1), &request("/t"));
        assert!(event.started_at.is_none());

        event.begin();
        assert!(event.started_at.is_some());

        event.end();
        assert!(event.duration_ms.is_some());
    }

    #[test]
    fn end_without_begin_leaves_duration_unset() {
        let mut event = ExchangeEvent::from_request(ExchangeId::from(1), &request("/t"));
        event.end();
        assert_eq!(event.duration_ms, None);
    }

    #[test]
    fn set_status_copies_response_code() {
        let mut event = ExchangeEvent::from_request(ExchangeId::from(1), &request("/t"));
        event.set_status(StatusCode::OK);
        assert_eq!(event.status, 200);
    }

    // -----------------------------------------------------------------------
    // Related event
    // -----------------------------------------------------------------------

    #[test]
    fn related_event_carries_only_id_and_kind() {
        let mut event = RelatedExchangeEvent::new(ExchangeId::from(42), DispatcherKind::Forward);
        event.end();

        let value = serde_json::to_value(&event).unwrap();
        let fields = value.as_object().unwrap();
        let mut keys: Vec<_> = fields.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["dispatcher", "ended_at", "exchange_id"]);
        assert_eq!(fields["exchange_id"], 42);
        assert_eq!(fields["dispatcher"], "FORWARD");
    }

    #[test]
    fn related_event_records_end_time() {
        let mut event = RelatedExchangeEvent::new(ExchangeId::from(1), DispatcherKind::Include);
        assert!(event.ended_at.is_none());
        event.end();
        assert!(event.ended_at.is_some());
    }
}

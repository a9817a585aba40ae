//! Where committed events go.
//!
//! The correlator finalizes every event exactly once and hands it to an
//! [`EventSink`]. What happens next is the sink's business: the default
//! [`TracingSink`] turns each event into one structured log record, while
//! [`Timeline`](crate::timeline::Timeline) buffers them for the admin API.

use crate::event::{ExchangeEvent, RelatedExchangeEvent};

/// Destination for finalized trace events.
///
/// Implementations must be cheap and non-blocking: `commit_*` runs on the
/// request path, once per invocation, after the event is already ended.
pub trait EventSink: Send + Sync + 'static {
    /// Record the finalized event of an outermost invocation.
    fn commit_exchange(&self, event: ExchangeEvent);

    /// Record the finalized event of a nested invocation.
    fn commit_related(&self, event: RelatedExchangeEvent);
}

/// Sink that emits committed events as structured [`tracing`] records under
/// the `exchange_trace::timeline` target, one `info!` line per event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn commit_exchange(&self, event: ExchangeEvent) {
        tracing::info!(
            target: "exchange_trace::timeline",
            exchange_id = event.exchange_id.as_i64(),
            method = %event.method,
            uri = %event.uri,
            query = event.query.as_deref(),
            status = event.status,
            dispatcher = event.dispatcher.as_str(),
            duration_ms = event.duration_ms,
            "exchange"
        );
    }

    fn commit_related(&self, event: RelatedExchangeEvent) {
        tracing::info!(
            target: "exchange_trace::timeline",
            exchange_id = event.exchange_id.as_i64(),
            dispatcher = event.dispatcher.as_str(),
            "related exchange"
        );
    }
}

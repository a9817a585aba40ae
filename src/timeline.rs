//! In-memory record of committed trace events, exposed through the admin
//! API.
//!
//! [`Timeline`] is a fixed-capacity ring-buffer sink: once full, the oldest
//! entry is evicted to make room for the newest. This gives a bounded, O(1)
//! memory footprint regardless of traffic volume. Entries are kept in commit
//! order, so filtering by exchange id reproduces the correlated timeline of
//! one exchange.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::event::{ExchangeEvent, RelatedExchangeEvent};
use crate::exchange::ExchangeId;
use crate::sink::EventSink;

/// One committed event, tagged with its shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TimelineEntry {
    /// Outermost invocation of an exchange.
    Exchange(ExchangeEvent),
    /// Nested invocation of an exchange already in flight.
    Related(RelatedExchangeEvent),
}

impl TimelineEntry {
    /// The exchange this entry belongs to.
    pub fn exchange_id(&self) -> ExchangeId {
        match self {
            TimelineEntry::Exchange(event) => event.exchange_id,
            TimelineEntry::Related(event) => event.exchange_id,
        }
    }

    fn dispatcher_name(&self) -> &'static str {
        match self {
            TimelineEntry::Exchange(event) => event.dispatcher.as_str(),
            TimelineEntry::Related(event) => event.dispatcher.as_str(),
        }
    }
}

/// Fixed-capacity ring-buffer of recent [`TimelineEntry`] records.
///
/// Safe to share via `Arc<Timeline>`. Commits use a non-blocking `try_lock`
/// so they never delay request handling; in the unlikely event of lock
/// contention the entry is silently dropped.
pub struct Timeline {
    capacity: usize,
    entries: Mutex<VecDeque<TimelineEntry>>,
}

impl Timeline {
    /// Create a new timeline retaining at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    fn push(&self, entry: TimelineEntry) {
        // Never block the request path; contended commits are dropped.
        if let Ok(mut entries) = self.entries.try_lock() {
            if entries.len() == self.capacity {
                entries.pop_front();
            }
            entries.push_back(entry);
        }
    }

    /// Return up to `limit` recent entries, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<TimelineEntry> {
        let entries = self.entries.lock().await;
        entries.iter().rev().take(limit).cloned().collect()
    }

    /// Return every buffered entry of one exchange, oldest first.
    ///
    /// This is the correlated timeline the id exists for: the exchange's
    /// nested invocations in commit order, ending with the outermost
    /// exchange event (which always commits last, since nested invocations
    /// complete while the outer one is still running).
    pub async fn events_for(&self, id: ExchangeId) -> Vec<TimelineEntry> {
        let entries = self.entries.lock().await;
        entries
            .iter()
            .filter(|entry| entry.exchange_id() == id)
            .cloned()
            .collect()
    }

    /// Compute aggregate statistics over all buffered entries.
    pub async fn stats(&self) -> TimelineStats {
        let entries = self.entries.lock().await;

        let mut exchanges = 0usize;
        let mut related = 0usize;
        let mut aborted = 0usize;
        let mut duration_sum = 0u64;
        let mut duration_count = 0usize;
        let mut dispatch_counts: HashMap<String, usize> = HashMap::new();

        for entry in entries.iter() {
            *dispatch_counts
                .entry(entry.dispatcher_name().to_string())
                .or_default() += 1;
            match entry {
                TimelineEntry::Exchange(event) => {
                    exchanges += 1;
                    if event.status == 0 {
                        aborted += 1;
                    }
                    if let Some(ms) = event.duration_ms {
                        duration_sum += ms;
                        duration_count += 1;
                    }
                }
                TimelineEntry::Related(_) => related += 1,
            }
        }

        let avg_duration_ms = if duration_count == 0 {
            0.0
        } else {
            duration_sum as f64 / duration_count as f64
        };

        TimelineStats {
            total_events: entries.len(),
            exchanges,
            related,
            aborted,
            avg_duration_ms,
            dispatch_counts,
        }
    }
}

impl EventSink for Timeline {
    fn commit_exchange(&self, event: ExchangeEvent) {
        self.push(TimelineEntry::Exchange(event));
    }

    fn commit_related(&self, event: RelatedExchangeEvent) {
        self.push(TimelineEntry::Related(event));
    }
}

/// Aggregate statistics derived from all buffered [`TimelineEntry`] records.
#[derive(Debug, Serialize)]
pub struct TimelineStats {
    pub total_events: usize,
    /// Outermost-invocation events.
    pub exchanges: usize,
    /// Nested-invocation events.
    pub related: usize,
    /// Exchanges that never saw a response status (failed or cancelled).
    pub aborted: usize,
    pub avg_duration_ms: f64,
    /// Events per dispatcher kind, across both shapes.
    pub dispatch_counts: HashMap<String, usize>,
}

//! Exchange identity: process-unique ids and the request slot that
//! propagates them.
//!
//! An *exchange* is one client-originated HTTP request together with every
//! internal re-dispatch the server performs while answering it. Each exchange
//! gets exactly one [`ExchangeId`], minted when its outermost invocation is
//! first observed and carried to nested invocations through the request's
//! [`Extensions`]. The id is the join key an operator uses to stitch the
//! events of one exchange back into a single timeline.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use http::Extensions;
use serde::{Deserialize, Serialize};

/// Process-wide id source. The counter starts at zero, so the first exchange
/// of a process gets id 1. Ids are unique and strictly increasing for the
/// lifetime of the process; they reset on restart.
static EXCHANGE_ID_GENERATOR: AtomicI64 = AtomicI64::new(0);

/// Identifier shared by every invocation belonging to one exchange.
///
/// Serializes as a plain JSON number. Obtain a fresh one with
/// [`generate`][Self::generate]; never construct ids by other means in
/// request-handling code, or uniqueness is lost.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeId(i64);

impl ExchangeId {
    /// Mint the next process-unique id.
    ///
    /// Lock-free; safe under arbitrary concurrency. Two concurrently arriving
    /// requests always receive distinct ids, and ids handed out one after
    /// another are strictly increasing.
    pub fn generate() -> Self {
        Self(EXCHANGE_ID_GENERATOR.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Read the id attached to a request, if any.
    ///
    /// `None` means no correlator has seen this request yet, so the current
    /// invocation is the outermost one of a new exchange.
    pub fn attached(extensions: &Extensions) -> Option<ExchangeId> {
        extensions.get::<ExchangeId>().copied()
    }

    /// Attach this id to a request so nested re-dispatches can find it.
    ///
    /// Written once per exchange, by the correlator, at the moment the
    /// outermost invocation is observed; afterwards the slot is only read.
    pub fn attach(self, extensions: &mut Extensions) {
        extensions.insert(self);
    }

    /// The raw 64-bit value.
    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl From<i64> for ExchangeId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

//! Exchange correlation middleware for tower/axum HTTP servers.
//!
//! One client request is often answered through several internal handler
//! invocations: forwards, includes, async continuations, error pages. This
//! crate assigns each client request a process-unique exchange id, carries
//! the id to every nested invocation through the request extensions, and
//! commits one structured trace event per invocation, giving an operator a
//! single correlated timeline per exchange under failures, cancellation,
//! and concurrent traffic alike.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use axum::{routing::get, Router};
//! use exchange_trace::{ExchangeTraceLayer, Timeline};
//!
//! let timeline = Arc::new(Timeline::new(512));
//! let app = Router::new()
//!     .route("/", get(|| async { "hello" }))
//!     // Outermost, so nested re-entries pass through it too.
//!     .layer(ExchangeTraceLayer::new(timeline.clone()));
//! ```
//!
//! Committed events can instead go straight to structured logs with
//! [`ExchangeTraceLayer::to_tracing`], or to any [`EventSink`] of your own.
//! Nested dispatches are built with [`redispatch`], which carries the
//! parent's exchange context and announces the re-dispatch reason.

pub mod api;
pub mod config;
pub mod correlator;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod exchange;
pub mod sink;
pub mod timeline;

pub use correlator::{ExchangeTrace, ExchangeTraceLayer};
pub use dispatch::{redispatch, DispatcherKind};
pub use event::{ExchangeEvent, RelatedExchangeEvent};
pub use exchange::ExchangeId;
pub use sink::{EventSink, TracingSink};
pub use timeline::{Timeline, TimelineEntry, TimelineStats};

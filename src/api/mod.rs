//! HTTP surface of the demo server: the traced application and the
//! operator-facing admin API, each bound to its own port.

pub mod admin;
pub mod app;

//! Unified HTTP error type for the demo's axum handlers.
//!
//! [`AppError`] wraps [`anyhow::Error`] and converts it into an HTTP
//! response automatically via [`IntoResponse`], so every fallible handler
//! returns `Result<T, AppError>` and propagates with `?`. The demo's
//! handlers hit this on nested-dispatch failures, body assembly, and task
//! joins; the correlator itself never produces one (it passes downstream
//! outcomes through untouched, and a 500 built here is just another status
//! for it to record).
//!
//! # Example
//!
//! ```rust,ignore
//! async fn report(State(state): State<Arc<AppState>>, req: Request) -> Result<String, AppError> {
//!     let nested = redispatch(req.extensions(), DispatcherKind::Include, "/report/summary")?;
//!     let response = state.chain().oneshot(nested).await?;
//!     // ...
//! }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Wraps [`anyhow::Error`] so it can be returned from axum handlers.
///
/// Any type that implements `Into<anyhow::Error>` (`io::Error`,
/// `http::Error`, `tokio::task::JoinError`, ...) converts into an
/// [`AppError`] via the blanket [`From`] implementation.
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self.0, "request handler failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

/// Convert any `Into<anyhow::Error>` into an [`AppError`].
///
/// The pattern the axum error-handling guide recommends; see
/// <https://docs.rs/axum/latest/axum/error_handling/index.html>.
impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(e: E) -> Self {
        Self(e.into())
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    // -----------------------------------------------------------------------
    // IntoResponse
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn into_response_returns_500_with_json_error_body() {
        let err: AppError = anyhow::anyhow!("nested dispatch refused").into();
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "nested dispatch refused");
    }

    // -----------------------------------------------------------------------
    // From conversions
    // -----------------------------------------------------------------------

    #[test]
    fn converts_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let app_err: AppError = io_err.into();
        let s = format!("{app_err:?}");
        assert!(s.contains("denied"), "debug output: {s}");
    }

    #[tokio::test]
    async fn error_text_survives_http_error_conversion() {
        // The redispatch helper surfaces http::Error for invalid targets.
        let bad = http::Request::builder().uri("").body(()).unwrap_err();
        let app_err: AppError = bad.into();
        let response = app_err.into_response();

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(!json["error"].as_str().unwrap().is_empty());
    }
}

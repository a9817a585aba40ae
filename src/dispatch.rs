//! Dispatcher kinds and the internal re-dispatch helper.
//!
//! Servers answer one client request through several internal handler
//! invocations: the original dispatch, forwards to another resource,
//! includes of a fragment, continuations resumed off the original task, and
//! error-page dispatches. [`DispatcherKind`] names the reason for an
//! invocation; [`redispatch`] builds the nested request that re-enters the
//! handler chain carrying the parent's exchange context.

use axum::body::Body;
use http::{Extensions, Method, Request};
use serde::{Deserialize, Serialize};

/// Why an invocation entered the handler chain.
///
/// Announced on the request's extensions by whatever performs the
/// re-dispatch. An invocation with nothing announced is an original client
/// request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatcherKind {
    /// Original client-originated dispatch.
    #[default]
    Request,
    /// Control handed to another resource; its output becomes the response.
    Forward,
    /// Another resource's output embedded into the current response.
    Include,
    /// Continuation of the exchange resumed outside the original call.
    Async,
    /// Dispatch to an error page after a failed invocation.
    Error,
}

impl DispatcherKind {
    /// The kind announced on a request, [`Request`][Self::Request] when none
    /// has been announced.
    pub fn announced(extensions: &Extensions) -> DispatcherKind {
        extensions.get::<DispatcherKind>().copied().unwrap_or_default()
    }

    /// Announce this kind on a request about to be re-dispatched.
    pub fn announce(self, extensions: &mut Extensions) {
        extensions.insert(self);
    }

    /// Stable uppercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatcherKind::Request => "REQUEST",
            DispatcherKind::Forward => "FORWARD",
            DispatcherKind::Include => "INCLUDE",
            DispatcherKind::Async => "ASYNC",
            DispatcherKind::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for DispatcherKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build a nested invocation of `target` carrying a parent request's
/// exchange context.
///
/// The built request clones the parent's extensions, so the exchange id
/// (and anything else attached) travels with it, then announces `kind` for
/// this leg. Internal targets are addressed by path; the nested request is
/// a bodyless GET, since only the outermost invocation's method and URI are
/// recorded on the exchange.
///
/// Fails only if `target` is not a valid URI.
///
/// ```rust,ignore
/// let nested = redispatch(req.extensions(), DispatcherKind::Forward, "/page/full")?;
/// let response = chain.oneshot(nested).await?;
/// ```
pub fn redispatch(
    parent: &Extensions,
    kind: DispatcherKind,
    target: &str,
) -> http::Result<Request<Body>> {
    let mut request = Request::builder()
        .method(Method::GET)
        .uri(target)
        .body(Body::empty())?;
    *request.extensions_mut() = parent.clone();
    kind.announce(request.extensions_mut());
    Ok(request)
}

#![warn(missing_docs)]
//! # warden-guard
//!
//! ## Purpose
//! Request-pipeline stage deciding, for every outgoing backend call, whether
//! to bypass, attach the bearer credential, or abandon the call.
//!
//! ## Responsibilities
//! - Recognize the exact set of calls that must pass through untouched.
//! - Attach `Authorization: Bearer <token>` to authorized calls.
//! - Tear the session down and abandon the call when no valid user exists.
//!
//! ## Data flow
//! Feature code builds an [`OutboundRequest`] and hands it to
//! [`RequestGuard::intercept`]; the guard consults the session manager and
//! returns a [`GuardVerdict`] the transport layer acts on.
//!
//! ## Ownership and lifetimes
//! Requests are moved through the guard and returned (possibly augmented) in
//! the verdict, so no header state is shared behind the caller's back.
//!
//! ## Error model
//! The guard has no error type. An invalid session is not an error to
//! surface: the request is abandoned and the user is redirected to login.
//!
//! ## Security and privacy notes
//! Token values pass through header construction only and are never logged.
//! Requests already carrying credentials are left strictly untouched.

use warden_session::SessionManager;

/// Header name carrying request credentials.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Prefix of basic-auth header values, matched case-sensitively.
pub const BASIC_PREFIX: &str = "Basic";

/// Prefix of bearer header values, matched case-sensitively.
pub const BEARER_PREFIX: &str = "Bearer";

/// An outgoing backend call before it reaches the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    /// HTTP method name.
    pub method: String,
    /// Absolute request URL.
    pub url: String,
    /// Header name/value pairs in insertion order.
    pub headers: Vec<(String, String)>,
}

impl OutboundRequest {
    /// Creates a request without headers.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
        }
    }

    /// Returns the request with `name: value` appended.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Looks up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header_name, _)| header_name.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Outcome of guarding one outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardVerdict {
    /// Forward this request, either untouched or with the bearer attached.
    Forward(OutboundRequest),
    /// The session is dead; the request is dropped and never answered.
    Abandoned,
}

/// Calls that must not, or cannot, carry the bearer credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BypassRules {
    /// Path fragment identifying the application-configuration resource.
    pub config_route: String,
    /// Token-exchange endpoint URL; its own calls carry no bearer.
    pub token_endpoint: String,
}

/// Request-pipeline middleware guarding every outgoing backend call.
#[derive(Clone)]
pub struct RequestGuard {
    session: SessionManager,
    rules: BypassRules,
}

impl RequestGuard {
    /// Creates a guard over the given session and bypass rules.
    pub fn new(session: SessionManager, rules: BypassRules) -> Self {
        Self { session, rules }
    }

    /// Returns `true` when `request` must pass through untouched.
    ///
    /// The bypass set is exact: configuration-resource calls, calls already
    /// carrying a `Basic` or `Bearer` authorization value, and calls to the
    /// token-exchange endpoint itself.
    pub fn is_bypassed(&self, request: &OutboundRequest) -> bool {
        if request.url.contains(&self.rules.config_route) {
            return true;
        }
        if let Some(value) = request.header(AUTHORIZATION_HEADER)
            && (value.starts_with(BASIC_PREFIX) || value.starts_with(BEARER_PREFIX))
        {
            return true;
        }
        request.url.starts_with(&self.rules.token_endpoint)
    }

    /// Guards one outgoing request.
    ///
    /// Refresh is transparent here: callers issue requests as if always
    /// authenticated, and the guard silently refreshes or redirects.
    pub async fn intercept(&self, request: OutboundRequest) -> GuardVerdict {
        if self.is_bypassed(&request) {
            return GuardVerdict::Forward(request);
        }

        if self.session.has_valid_user().await
            && let Some(token) = self.session.token()
        {
            return GuardVerdict::Forward(
                request.with_header(AUTHORIZATION_HEADER, format!("{BEARER_PREFIX} {token}")),
            );
        }

        tracing::debug!(url = %request.url, "request abandoned; session torn down");
        self.session.clear_and_redirect();
        GuardVerdict::Abandoned
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for request header handling.

    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive_on_names() {
        let request = OutboundRequest::new("GET", "https://backend.test/users")
            .with_header("authorization", "Basic abc");

        assert_eq!(request.header("Authorization"), Some("Basic abc"));
        assert_eq!(request.header("AUTHORIZATION"), Some("Basic abc"));
        assert_eq!(request.header("Accept"), None);
    }

    #[test]
    fn with_header_appends_without_replacing() {
        let request = OutboundRequest::new("GET", "https://backend.test/users")
            .with_header("Accept", "application/json")
            .with_header("Accept-Language", "en");

        assert_eq!(request.headers.len(), 2);
        assert_eq!(request.header("Accept"), Some("application/json"));
    }
}

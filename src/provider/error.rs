//! Error types for provider requests.
//!
//! [`ApiError`] separates transport failures from well-formed but unsuccessful
//! responses. [`AuthError`] covers the login stage. The request driver wraps
//! both in [`RequestError`].

use std::fmt::Display;

use thiserror::Error;

use crate::track::Provider;

/// Errors from the metadata stages of a provider request.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The request could not be built or sent, or timed out.
    #[error("http request exception calling {endpoint}: {reason}")]
    HttpRequest {
        /// Endpoint that failed.
        endpoint: String,
        /// Transport-level reason.
        reason: String,
    },

    /// The platform answered, but not with a usable result.
    ///
    /// Covers non-2xx HTTP status, a non-success JSON status code, an
    /// undecodable body and an empty result set.
    #[error("api response exception from {endpoint}: code {code}, {message}")]
    ApiResponse {
        /// Endpoint that answered.
        endpoint: String,
        /// HTTP status or platform status code, as text.
        code: String,
        /// Platform message or failure description.
        message: String,
    },
}

impl ApiError {
    /// Creates a transport error from a reqwest error.
    pub fn transport(endpoint: impl Into<String>, source: &reqwest::Error) -> Self {
        let reason = if source.is_timeout() {
            "request timed out".to_string()
        } else {
            source.to_string()
        };
        Self::HttpRequest {
            endpoint: endpoint.into(),
            reason,
        }
    }

    /// Creates a transport error for a request that could not be built.
    pub fn invalid_request(endpoint: impl Into<String>, reason: impl Display) -> Self {
        Self::HttpRequest {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates an error for a non-2xx HTTP status.
    pub fn http_status(endpoint: impl Into<String>, status: u16) -> Self {
        Self::ApiResponse {
            endpoint: endpoint.into(),
            code: status.to_string(),
            message: format!("unexpected HTTP status {status}"),
        }
    }

    /// Creates an error for a non-success platform status code.
    pub fn status(endpoint: impl Into<String>, code: impl Display, message: impl Into<String>) -> Self {
        Self::ApiResponse {
            endpoint: endpoint.into(),
            code: code.to_string(),
            message: message.into(),
        }
    }

    /// Creates an error for a body that is not the expected JSON.
    pub fn decode(endpoint: impl Into<String>, source: &serde_json::Error) -> Self {
        Self::ApiResponse {
            endpoint: endpoint.into(),
            code: "malformed".to_string(),
            message: source.to_string(),
        }
    }

    /// Creates an error for an empty result set.
    pub fn empty(endpoint: impl Into<String>, what: &str) -> Self {
        Self::ApiResponse {
            endpoint: endpoint.into(),
            code: "empty".to_string(),
            message: format!("no {what} in response"),
        }
    }

    /// Whether the failure happened before a response was received.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::HttpRequest { .. })
    }
}

/// Errors from the login stage.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// No credentials could be obtained.
    #[error("login required for {provider} but no credentials are available")]
    CredentialsUnavailable {
        /// Provider asking for a login.
        provider: Provider,
    },

    /// The login call failed or was rejected.
    #[error("login to {provider} failed: {source}")]
    LoginFailed {
        provider: Provider,
        #[source]
        source: ApiError,
    },

    /// The platform accepted the login but returned no session cookie.
    #[error("login to {provider} returned no {cookie} cookie")]
    MissingSessionCookie {
        provider: Provider,
        cookie: &'static str,
    },
}

impl AuthError {
    /// Wraps an API failure raised while logging in.
    pub fn login_failed(provider: Provider, source: ApiError) -> Self {
        Self::LoginFailed { provider, source }
    }
}

/// Failure of one provider request, surfaced to the top level.
#[derive(Debug, Clone, Error)]
pub enum RequestError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

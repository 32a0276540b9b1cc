//! Error types.
//!
//! Configuration errors end the process at startup. Everything else is
//! scoped to a single request: [`FlowError`] is what the login and playlist
//! handlers return, and its [`IntoResponse`] impl decides the status code
//! and the generic message the caller gets to see.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::warning;

/// Invalid or missing process configuration.
///
/// Messages name the offending variable but never echo its value, since
/// several of them are secrets.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("${0} must be set")]
    Missing(&'static str),

    #[error("${var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Failure to write a session cookie.
///
/// Reading never fails: a cookie that cannot be authenticated, decrypted or
/// parsed is treated as an empty session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session key is invalid: {0}")]
    InvalidKey(&'static str),

    #[error("cannot serialize session: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("cannot encrypt session")]
    Encrypt,

    #[error("encoded session is {0} bytes, above the cookie size limit")]
    TooLarge(usize),
}

/// Errors reported by the identity provider and the playlist generator.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider redirected back with `error=...` instead of a code.
    #[error("authorization denied by provider: {0}")]
    Denied(String),

    /// The `state` echoed by the provider is not the one we issued.
    #[error("state parameter does not match")]
    StateMismatch,

    #[error("callback carries no authorization code")]
    MissingCode,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream answered {status}: {body}")]
    Upstream {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("{0}")]
    Unexpected(String),
}

impl ProviderError {
    /// True when the provider refused this particular authorization rather
    /// than failing to answer.
    pub fn is_rejection(&self) -> bool {
        match self {
            Self::Denied(_) | Self::StateMismatch | Self::MissingCode => true,
            Self::Upstream { status, .. } => status.is_client_error(),
            Self::Http(_) | Self::Unexpected(_) => false,
        }
    }
}

/// Errors raised by the login initiator and the callback authorizer.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// The session has no identity or timestamp, or the callback has no state.
    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("state token does not match the session")]
    StateMismatch,

    #[error("randomness source failed: {0}")]
    Randomness(String),

    #[error("cannot compute state token: {0}")]
    Hash(#[from] hmac::digest::InvalidLength),

    #[error("token exchange failed: {0}")]
    Exchange(#[source] ProviderError),

    #[error("playlist generation failed: {0}")]
    Generate(#[source] ProviderError),

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl FlowError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) | Self::StateMismatch => StatusCode::UNAUTHORIZED,
            Self::Exchange(e) if e.is_rejection() => StatusCode::UNAUTHORIZED,
            Self::Exchange(_) => StatusCode::BAD_GATEWAY,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Generate(_) | Self::Randomness(_) | Self::Hash(_) | Self::Session(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The message shown to the caller. Never includes upstream details.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) | Self::StateMismatch => "Cannot authorize request",
            Self::Exchange(e) if e.is_rejection() => "Cannot authorize request",
            Self::Exchange(_) => "Cannot authorize Spotify request",
            Self::Generate(_) => "Something went wrong while creating the user's playlist",
            Self::Timeout(_) => "Upstream service timed out",
            Self::Randomness(_) | Self::Hash(_) | Self::Session(_) => "Internal server error",
        }
    }
}

impl IntoResponse for FlowError {
    fn into_response(self) -> Response {
        warning!("Request failed: {}", self);
        let body = Json(json!({ "error": self.public_message() }));
        (self.status(), body).into_response()
    }
}

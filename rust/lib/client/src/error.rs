//! Client-side error types.

use thiserror::Error;

// ── ApiError ────────────────────────────────────────────────────────

/// Failure of a single request against the proxy.
///
/// Nothing in this crate retries: every variant describes the outcome of
/// exactly one attempt.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Proxy answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    Server { status: u16, message: String },

    /// Transport failure (connection refused, reset, timeout).
    #[error("network: {0}")]
    Network(#[from] reqwest::Error),

    /// Bad credentials, invalid session, or no session held.
    #[error("auth: {0}")]
    Auth(String),

    /// Proxy answered `{"success": false}`. Carries the server message,
    /// typically an ERP constraint violation.
    #[error("{0}")]
    Rejected(String),

    /// Response body did not have the expected shape.
    #[error("decode: {0}")]
    Decode(String),
}

impl ApiError {
    /// True for transport failures, where the backend never answered.
    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }

    /// Message suitable for showing to a user.
    ///
    /// Rejections carry the server's own wording; everything else falls
    /// back to the display form.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Rejected(msg) => msg.clone(),
            ApiError::Server { message, .. } if !message.is_empty() => message.clone(),
            other => other.to_string(),
        }
    }
}

// ── StorageError ────────────────────────────────────────────────────

/// Durable key/value storage failure.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage encode: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("storage decode: {0}")]
    Decode(#[from] toml::de::Error),
}

//! Error types for chat9-engine.

use std::fmt;

/// Result type alias for engine operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while building or invoking a chat engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request cannot be served as given (for example, no messages).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error (missing credentials, unknown model, etc.)
    #[error("configuration error: {0}")]
    Config(String),

    /// Provider error (API call failed, rate limited, etc.)
    #[error("provider error: {provider}: {message}")]
    Provider { provider: String, message: String },

    /// Token stream failed after it was handed out.
    #[error("stream error: {0}")]
    Stream(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification of an [`Error`] kept for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::AsRefStr, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// The caller sent something the engine cannot work with.
    BadInput,
    /// The engine could not be constructed.
    Unavailable,
    /// A downstream model or service failed.
    Downstream,
}

impl Error {
    /// Creates an invalid request error.
    pub fn invalid_request(message: impl fmt::Display) -> Self {
        Self::InvalidRequest(message.to_string())
    }

    /// Creates a configuration error.
    pub fn config(message: impl fmt::Display) -> Self {
        Self::Config(message.to_string())
    }

    /// Creates a provider error.
    pub fn provider(provider: impl fmt::Display, message: impl fmt::Display) -> Self {
        Self::Provider {
            provider: provider.to_string(),
            message: message.to_string(),
        }
    }

    /// Creates a stream error.
    pub fn stream(message: impl fmt::Display) -> Self {
        Self::Stream(message.to_string())
    }

    /// Returns the coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_) | Self::Serialization(_) => ErrorKind::BadInput,
            Self::Config(_) => ErrorKind::Unavailable,
            Self::Provider { .. } | Self::Stream(_) => ErrorKind::Downstream,
        }
    }

    /// Returns true if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider { .. } | Self::Stream(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_variants() {
        assert_eq!(Error::invalid_request("x").kind(), ErrorKind::BadInput);
        assert_eq!(Error::config("x").kind(), ErrorKind::Unavailable);
        assert_eq!(Error::provider("openai", "x").kind(), ErrorKind::Downstream);
        assert_eq!(Error::stream("x").kind(), ErrorKind::Downstream);
    }

    #[test]
    fn provider_error_display() {
        let error = Error::provider("openai", "rate limited");
        assert_eq!(error.to_string(), "provider error: openai: rate limited");
        assert!(error.is_retryable());
        assert!(!Error::config("missing key").is_retryable());
    }

    #[test]
    fn kind_as_str() {
        assert_eq!(ErrorKind::BadInput.as_ref(), "bad_input");
        assert_eq!(ErrorKind::Downstream.to_string(), "downstream");
    }
}

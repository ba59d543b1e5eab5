//! Chat engine error to HTTP error conversion.
//!
//! Every failure while preparing or running a chat is reported as a 500
//! whose detail starts with `Error in chat engine:`, including requests
//! without a usable last message.

use chat9_engine::ErrorKind as EngineErrorKind;

use super::http_error::{Error as HttpError, ErrorKind};

/// Tracing target for chat engine error conversions.
const TRACING_TARGET: &str = "chat9_server::handler::engine";

impl From<chat9_engine::Error> for HttpError<'static> {
    fn from(error: chat9_engine::Error) -> Self {
        match error.kind() {
            EngineErrorKind::BadInput => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    error = %error,
                    "Chat request rejected by the engine"
                );
            }
            kind => {
                tracing::error!(
                    target: TRACING_TARGET,
                    error = %error,
                    error_kind = %kind,
                    retryable = error.is_retryable(),
                    "Chat engine failed"
                );
            }
        }

        ErrorKind::InternalServerError.with_detail(format!("Error in chat engine: {error}"))
    }
}

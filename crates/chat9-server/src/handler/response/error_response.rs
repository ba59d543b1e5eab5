use std::borrow::Cow;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use schemars::JsonSchema;
use serde::Serialize;

/// HTTP error response body.
///
/// `detail` is the human-readable explanation chat clients display.
#[must_use = "error responses do nothing unless serialized"]
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ErrorResponse<'a> {
    /// The error name/type identifier.
    pub name: Cow<'a, str>,
    /// Human-readable explanation of the failure.
    pub detail: Cow<'a, str>,
    /// Additional information for debugging the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Cow<'a, str>>,
    /// HTTP status code (not serialized in JSON).
    #[serde(skip)]
    pub status: StatusCode,
}

impl<'a> ErrorResponse<'a> {
    pub const BAD_REQUEST: Self = Self::new(
        "bad_request",
        "The request could not be processed due to invalid data",
        StatusCode::BAD_REQUEST,
    );
    pub const INTERNAL_SERVER_ERROR: Self = Self::new(
        "internal_server_error",
        "An internal server error occurred. Please try again later",
        StatusCode::INTERNAL_SERVER_ERROR,
    );
    pub const NOT_FOUND: Self = Self::new(
        "not_found",
        "The requested resource was not found",
        StatusCode::NOT_FOUND,
    );

    /// Creates a new error response.
    #[inline]
    pub const fn new(name: &'a str, detail: &'a str, status: StatusCode) -> Self {
        Self {
            name: Cow::Borrowed(name),
            detail: Cow::Borrowed(detail),
            context: None,
            status,
        }
    }

    /// Replaces the detail message.
    pub fn with_detail(mut self, detail: impl Into<Cow<'a, str>>) -> Self {
        self.detail = detail.into();
        self
    }

    /// Attaches context to the error response.
    /// If context already exists, it merges them with a separator.
    pub fn with_context(mut self, context: impl Into<Cow<'a, str>>) -> Self {
        let new_context = context.into();
        self.context = Some(match self.context {
            Some(existing) => Cow::Owned(format!("{}; {}", existing, new_context)),
            None => new_context,
        });
        self
    }
}

impl Default for ErrorResponse<'_> {
    #[inline]
    fn default() -> Self {
        Self::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for ErrorResponse<'_> {
    #[inline]
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_is_replaced() {
        let response = ErrorResponse::INTERNAL_SERVER_ERROR.with_detail("Error in chat engine: boom");
        assert_eq!(response.detail, "Error in chat engine: boom");
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn context_is_merged() {
        let response = ErrorResponse::BAD_REQUEST
            .with_context("first")
            .with_context("second");
        assert_eq!(response.context.as_deref(), Some("first; second"));
    }

    #[test]
    fn serializes_without_status() {
        let json = serde_json::to_value(ErrorResponse::NOT_FOUND).unwrap();
        assert_eq!(json["name"], "not_found");
        assert!(json.get("status").is_none());
        assert!(json.get("context").is_none());
    }
}

//! Turns handler panics and stalled requests into JSON error responses.
//!
//! The timeout only bounds the wait for response headers. Once `POST
//! /api/chat` has started its event stream the body may run as long as
//! the engine keeps producing tokens.

use std::any::Any;
use std::future::ready;
use std::time::Duration;

use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::response::{IntoResponse, Response};
#[cfg(feature = "config")]
use clap::Args;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower::timeout::TimeoutLayer;
use tower::timeout::error::Elapsed;
use tower_http::catch_panic::CatchPanicLayer;

use crate::handler::{Error, ErrorKind};

/// Tracing target for failed middleware.
const TRACING_TARGET_ERROR: &str = "chat9_server::recovery::error";

/// Tracing target for caught panics.
const TRACING_TARGET_PANIC: &str = "chat9_server::recovery::panic";

/// Default number of seconds until the first response byte.
const DEFAULT_REQUEST_TIMEOUT: u64 = 120;

type ResponseFut = BoxFuture<'static, Response>;
type Panic = Box<dyn Any + Send + 'static>;

/// Request deadline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct RecoveryConfig {
    /// Seconds an answer may take before its response starts.
    ///
    /// Streaming bodies are not cut off once the response has started.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "REQUEST_TIMEOUT", default_value = "120")
    )]
    pub request_timeout: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self::with_timeout_secs(DEFAULT_REQUEST_TIMEOUT)
    }
}

impl RecoveryConfig {
    pub fn with_timeout_secs(secs: u64) -> Self {
        Self {
            request_timeout: secs,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

/// Adds panic catching and the request deadline to a router.
pub trait RouterRecoveryExt<S> {
    /// Wraps every route so panics and timeouts answer with a 500 error body.
    fn with_recovery(self, config: &RecoveryConfig) -> Self;
}

impl<S> RouterRecoveryExt<S> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_recovery(self, config: &RecoveryConfig) -> Self {
        let middlewares = ServiceBuilder::new()
            .layer(HandleErrorLayer::new(handle_error))
            .layer(CatchPanicLayer::custom(catch_panic))
            .layer(TimeoutLayer::new(config.request_timeout()));

        self.layer(middlewares)
    }
}

fn handle_error(err: tower::BoxError) -> ResponseFut {
    let error = if err.is::<Elapsed>() {
        tracing::error!(
            target: TRACING_TARGET_ERROR,
            error = %err,
            "chat request timed out"
        );

        ErrorKind::InternalServerError
            .with_detail("Request timeout")
            .with_context("No answer was started before the request deadline")
    } else {
        tracing::error!(
            target: TRACING_TARGET_ERROR,
            error = %err,
            "middleware failed"
        );

        ErrorKind::InternalServerError
            .with_detail("An unexpected error occurred")
            .with_context(err.to_string())
    };

    ready(error.into_response()).boxed()
}

/// Extracts the payload of a `panic!` with a string message.
fn panic_message(err: &Panic) -> &str {
    err.downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload")
}

fn catch_panic(err: Panic) -> Response {
    // Handlers may panic with a prepared error to keep its status.
    if let Some(error) = err.downcast_ref::<Error>() {
        tracing::error!(
            target: TRACING_TARGET_PANIC,
            error = %error,
            "handler panicked"
        );
        return error.clone().into_response();
    }

    tracing::error!(
        target: TRACING_TARGET_PANIC,
        message = %panic_message(&err),
        "handler panicked"
    );

    ErrorKind::InternalServerError
        .with_detail("An unexpected panic occurred")
        .into_response()
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum_test::TestServer;

    use super::*;

    #[tokio::test]
    async fn panics_become_internal_errors() -> anyhow::Result<()> {
        async fn boom() -> &'static str {
            panic!("boom")
        }

        let app: Router = Router::new()
            .route("/", get(boom))
            .with_recovery(&RecoveryConfig::default());
        let server = TestServer::new(app)?;

        let response = server.get("/").expect_failure().await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = response.json();
        assert_eq!(body["detail"], "An unexpected panic occurred");
        Ok(())
    }

    #[tokio::test]
    async fn slow_requests_time_out() -> anyhow::Result<()> {
        async fn slow() -> &'static str {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "late"
        }

        let app: Router = Router::new()
            .route("/", get(slow))
            .with_recovery(&RecoveryConfig::with_timeout_secs(0));
        let server = TestServer::new(app)?;

        let response = server.get("/").expect_failure().await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = response.json();
        assert_eq!(body["detail"], "Request timeout");
        Ok(())
    }

    #[test]
    fn panic_payloads_are_read_as_text() {
        let owned: Panic = Box::new("owned".to_owned());
        let literal: Panic = Box::new("literal");
        let number: Panic = Box::new(7_u8);

        assert_eq!(panic_message(&owned), "owned");
        assert_eq!(panic_message(&literal), "literal");
        assert_eq!(panic_message(&number), "non-string panic payload");
    }
}

//! All `axum::`[`Router`]s with related `axum::`[`Handler`]s.
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use aide::openapi::OpenApi;
//! use chat9_engine::provider::{MockConfig, MockProvider};
//! use chat9_engine::ChatEngineService;
//! use chat9_server::handler::{fallback, routes};
//! use chat9_server::service::{ServiceConfig, ServiceState};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let engines = ChatEngineService::from_provider(MockProvider::new(MockConfig::default()));
//! let state = ServiceState::new(ServiceConfig::default(), engines).await?;
//!
//! let mut api = OpenApi::default();
//! let router: axum::Router = routes()
//!     .finish_api(&mut api)
//!     .fallback(fallback)
//!     .with_state(state);
//! # Ok(())
//! # }
//! ```
//!
//! [`Router`]: axum::routing::Router
//! [`Handler`]: axum::handler::Handler

mod chat;
mod error;
mod files;
pub mod request;
pub mod response;

use aide::axum::ApiRouter;
use axum::response::{IntoResponse, Response};

pub use crate::handler::error::{Error, ErrorKind, Result};
pub use crate::handler::files::RouterFilesExt;
use crate::service::ServiceState;

/// Responds with 404 to requests no route matched.
#[inline]
pub async fn fallback() -> Response {
    ErrorKind::NotFound.into_response()
}

/// Returns an [`ApiRouter`] with all documented routes.
pub fn routes() -> ApiRouter<ServiceState> {
    ApiRouter::new().merge(chat::routes())
}

//! Middleware for `axum::Router` and HTTP request processing.
//!
//! - Security: CORS, security headers, body limits, compression
//! - Observability: request ids and request tracing
//! - Recovery: panics, timeouts and service errors
//! - OpenAPI documentation with the Scalar UI
//!
//! ```rust,no_run
//! use axum::Router;
//! use chat9_server::middleware::{
//!     CorsConfig, RecoveryConfig, RouterObservabilityExt, RouterRecoveryExt,
//!     RouterSecurityExt, SecurityHeadersConfig,
//! };
//!
//! let app: Router = Router::new()
//!     .with_security(&CorsConfig::default(), &SecurityHeadersConfig::default())
//!     .with_observability()
//!     .with_recovery(&RecoveryConfig::default());
//! ```

mod observability;
mod recovery;
mod security;
mod specification;

pub use observability::RouterObservabilityExt;
pub use recovery::{RecoveryConfig, RouterRecoveryExt};
pub use security::{
    CorsConfig, FrameOptions, ReferrerPolicy, RouterSecurityExt, SecurityHeadersConfig,
};
pub use specification::{OpenApiConfig, RouterOpenApiExt};

/// Maximum accepted request body size: 4MB.
pub const DEFAULT_MAX_BODY_SIZE: usize = 4 * 1024 * 1024;

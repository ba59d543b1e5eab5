//! Middleware configuration for the HTTP server.
//!
//! The groups are defined in `chat9-server` and flattened here.

use anyhow::{Result as AnyhowResult, anyhow};
use chat9_server::middleware::{CorsConfig, OpenApiConfig, RecoveryConfig};
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::TRACING_TARGET_CONFIG;

/// Middleware configuration combining CORS, OpenAPI, and recovery settings.
#[derive(Debug, Clone, Default, Args, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    /// CORS (Cross-Origin Resource Sharing) configuration.
    #[clap(flatten)]
    pub cors: CorsConfig,

    /// OpenAPI document and reference UI paths.
    #[clap(flatten)]
    pub openapi: OpenApiConfig,

    /// Request timeout and panic recovery.
    #[clap(flatten)]
    pub recovery: RecoveryConfig,
}

impl MiddlewareConfig {
    /// Validates paths and the request timeout.
    pub fn validate(&self) -> AnyhowResult<()> {
        for path in [&self.openapi.open_api_json, &self.openapi.scalar_ui] {
            if !path.starts_with('/') || path == "/" {
                return Err(anyhow!("OpenAPI path {path:?} must start with '/' and not be the root"));
            }
        }

        if self.recovery.request_timeout == 0 {
            return Err(anyhow!("Request timeout must be at least 1 second"));
        }

        Ok(())
    }

    /// Logs middleware configuration at info level.
    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            origins = ?self.cors.allowed_origins,
            any_origin = self.cors.allows_any_origin(),
            credentials = self.cors.allow_credentials,
            "CORS configuration"
        );

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            openapi_path = %self.openapi.open_api_json,
            scalar_path = %self.openapi.scalar_ui,
            request_timeout_secs = self.recovery.request_timeout,
            "Middleware configuration"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(MiddlewareConfig::default().validate().is_ok());
    }

    #[test]
    fn root_docs_path_is_rejected() {
        let mut config = MiddlewareConfig::default();
        config.openapi.scalar_ui = "/".to_owned();
        assert!(config.validate().is_err());
    }
}

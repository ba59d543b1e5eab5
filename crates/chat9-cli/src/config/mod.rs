//! CLI configuration management.
//!
//! ```text
//! Cli
//! ├── server: ServerConfig         # Host, port, shutdown
//! ├── middleware: MiddlewareConfig # CORS, OpenAPI, request timeout
//! ├── service: ServiceConfig       # Data dirs, file URLs, LlamaCloud
//! ├── engine: EngineConfig         # Model provider and settings
//! └── telemetry: TelemetryConfig   # Log format
//! ```
//!
//! Every option can be given as an argument or an environment variable.

mod middleware;
mod server;
mod telemetry;

use std::process;

use anyhow::Context;
use chat9_engine::EngineConfig;
use chat9_server::service::ServiceConfig;
use clap::Parser;
pub use middleware::MiddlewareConfig;
use serde::{Deserialize, Serialize};
pub use server::ServerConfig;
pub use telemetry::{LogFormat, TelemetryConfig};

use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_SERVER_STARTUP};

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(name = "chat9")]
#[command(about = "Retrieval-augmented chat server")]
#[command(version)]
pub struct Cli {
    /// Server network and lifecycle configuration.
    #[clap(flatten)]
    pub server: ServerConfig,

    /// HTTP middleware configuration (CORS, OpenAPI, timeouts).
    #[clap(flatten)]
    pub middleware: MiddlewareConfig,

    /// Data directories, file URLs and source downloads.
    #[clap(flatten)]
    pub service: ServiceConfig,

    /// Chat engine backend.
    #[clap(flatten)]
    pub engine: EngineConfig,

    /// Logging output.
    #[clap(flatten)]
    pub telemetry: TelemetryConfig,
}

impl Cli {
    /// Loads the `.env` file (if enabled) and parses arguments.
    ///
    /// The `.env` file is read first so clap picks its values up as
    /// environment defaults.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Validates all configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.server
            .validate()
            .context("invalid server configuration")?;
        self.middleware
            .validate()
            .context("invalid middleware configuration")?;
        self.engine
            .validate()
            .context("invalid chat engine configuration")?;
        Ok(())
    }

    /// Logs the configuration without secrets.
    pub fn log(&self) {
        tracing::debug!(
            target: TRACING_TARGET_SERVER_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "Build information"
        );

        self.server.log();
        self.middleware.log();

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            data_dir = %self.service.data_dir.display(),
            output_dir = %self.service.output_dir.display(),
            fileserver_url_prefix = ?self.service.fileserver_url_prefix,
            downloads_enabled = self.service.downloads_enabled(),
            "Service configuration"
        );

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            provider = %self.engine.provider,
            model = %self.engine.model,
            temperature = ?self.engine.temperature,
            max_tokens = ?self.engine.max_tokens,
            "Chat engine configuration"
        );
    }

    fn enabled_features() -> Vec<&'static str> {
        [cfg!(feature = "dotenv").then_some("dotenv")]
            .into_iter()
            .flatten()
            .collect()
    }
}

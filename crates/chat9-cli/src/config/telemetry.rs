//! Logging configuration and subscriber setup.

use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Output format of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, colored when attached to a terminal.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
///
/// Levels are read from `RUST_LOG` and default to `info`:
///
/// ```bash
/// RUST_LOG=chat9_server=debug,tower_http=debug chat9
/// ```
#[derive(Debug, Clone, Default, Args, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log output format.
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text")]
    #[serde(default)]
    pub log_format: LogFormat,
}

impl TelemetryConfig {
    /// Installs the global tracing subscriber.
    pub fn init_tracing(&self) -> anyhow::Result<()> {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let registry = tracing_subscriber::registry().with(filter);

        let result = match self.log_format {
            LogFormat::Text => registry.with(fmt::layer()).try_init(),
            LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        };

        result.map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))
    }
}

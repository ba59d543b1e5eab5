use std::path::PathBuf;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

/// Default values for configuration options.
mod defaults {
    /// Public LlamaCloud API endpoint.
    pub const LLAMA_CLOUD_BASE_URL: &str = "https://api.cloud.llamaindex.ai";

    pub fn llama_cloud_base_url() -> String {
        LLAMA_CLOUD_BASE_URL.to_owned()
    }

    /// Default timeout for LlamaCloud requests in seconds.
    pub const DOWNLOAD_TIMEOUT_SECS: u64 = 60;
}

/// App [`state`] configuration.
///
/// [`state`]: crate::service::ServiceState
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct ServiceConfig {
    /// Directory with the indexed source documents, served under `/api/files/data`.
    #[cfg_attr(feature = "config", arg(long, env = "DATA_DIR", default_value = "data"))]
    pub data_dir: PathBuf,

    /// Directory for generated and downloaded files, served under `/api/files/output`.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "OUTPUT_DIR", default_value = "output")
    )]
    pub output_dir: PathBuf,

    /// Public URL prefix of the file server, used to build source links.
    #[cfg_attr(feature = "config", arg(long, env = "FILESERVER_URL_PREFIX"))]
    pub fileserver_url_prefix: Option<String>,

    /// LlamaCloud API key. Enables downloading of cited pipeline files.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "LLAMA_CLOUD_API_KEY", hide_env_values = true)
    )]
    #[serde(skip_serializing)]
    pub llama_cloud_api_key: Option<String>,

    /// LlamaCloud API base URL.
    #[cfg_attr(
        feature = "config",
        arg(
            long,
            env = "LLAMA_CLOUD_BASE_URL",
            default_value = defaults::LLAMA_CLOUD_BASE_URL
        )
    )]
    #[serde(default = "defaults::llama_cloud_base_url")]
    pub llama_cloud_base_url: String,

    /// Timeout for a single LlamaCloud request in seconds.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "DOWNLOAD_TIMEOUT", default_value = "60")
    )]
    pub download_timeout: u64,

    /// Starter questions offered by the chat UI, one per line.
    #[cfg_attr(feature = "config", arg(long, env = "CONVERSATION_STARTERS"))]
    #[serde(default)]
    pub conversation_starters: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".into(),
            output_dir: "output".into(),
            fileserver_url_prefix: None,
            llama_cloud_api_key: None,
            llama_cloud_base_url: defaults::llama_cloud_base_url(),
            download_timeout: defaults::DOWNLOAD_TIMEOUT_SECS,
            conversation_starters: None,
        }
    }
}

impl ServiceConfig {
    /// Returns true if cited LlamaCloud files should be downloaded.
    pub fn downloads_enabled(&self) -> bool {
        self.llama_cloud_api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    /// Splits the configured starters into questions, skipping blank lines.
    ///
    /// Returns `None` when no starter is configured.
    pub fn starter_questions(&self) -> Option<Vec<String>> {
        let questions: Vec<String> = self
            .conversation_starters
            .as_deref()?
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect();

        (!questions.is_empty()).then_some(questions)
    }
}

//! Application state and dependency injection.

mod config;
mod download;
mod files;
mod postprocess;
mod starters;

use chat9_engine::{ChatEngineService, EngineOptions, SharedChatEngine};

pub use crate::service::config::ServiceConfig;
pub use crate::service::download::{DownloadOutcome, DownloadTarget, FileDownloadService};
pub use crate::service::files::{FileServer, LLAMACLOUD_DIR, UPLOADED_DIR};
pub use crate::service::postprocess::{PostProcessing, PostProcessor};
pub use crate::service::starters::StarterQuestions;
// Re-export error types from crate root for convenience
pub use crate::{Error, Result};

/// Tracing target for state construction.
const TRACING_TARGET: &str = "chat9_server::service";

/// Application state.
///
/// Used for the [`State`] extraction (dependency injection).
///
/// [`State`]: axum::extract::State
#[must_use = "state does nothing unless you use it"]
#[derive(Clone)]
pub struct ServiceState {
    // Chat engines:
    pub engines: ChatEngineService,
    pub shared_engine: SharedChatEngine,
    // Internal services:
    pub post_processor: PostProcessor,
    pub file_server: FileServer,
    pub starter_questions: StarterQuestions,
}

impl ServiceState {
    /// Initializes application state from configuration.
    ///
    /// Builds the unfiltered engine shared by the single-message endpoint
    /// and decides whether cited files are downloaded.
    pub async fn new(service_config: ServiceConfig, engines: ChatEngineService) -> Result<Self> {
        let shared_engine = engines
            .chat_engine(EngineOptions::new())
            .await
            .map_err(|e| Error::config("failed to create the shared chat engine").with_source(e))?;

        let file_server = FileServer::from_config(&service_config);
        let downloads = FileDownloadService::from_config(&service_config, &file_server)?;
        let starter_questions = StarterQuestions::new(service_config.starter_questions());

        tracing::info!(
            target: TRACING_TARGET,
            provider = engines.provider_name(),
            downloads_enabled = downloads.is_some(),
            starter_count = starter_questions.questions().map_or(0, <[String]>::len),
            data_dir = %file_server.data_dir().display(),
            output_dir = %file_server.output_dir().display(),
            "Service state initialized"
        );

        Ok(Self {
            engines,
            shared_engine: shared_engine.into(),
            post_processor: PostProcessor::new(downloads),
            file_server,
            starter_questions,
        })
    }
}

macro_rules! impl_di {
    ($($f:ident: $t:ty),+) => {$(
        impl axum::extract::FromRef<ServiceState> for $t {
            fn from_ref(state: &ServiceState) -> Self {
                state.$f.clone()
            }
        }
    )+};
}

// Chat engines:
impl_di!(engines: ChatEngineService);
impl_di!(shared_engine: SharedChatEngine);

// Internal services:
impl_di!(post_processor: PostProcessor);
impl_di!(file_server: FileServer);
impl_di!(starter_questions: StarterQuestions);

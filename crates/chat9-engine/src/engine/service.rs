//! Chat engine service with observability.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use super::{ChatEngine, ChatEngineProvider, EngineOptions};
use crate::{Result, TRACING_TARGET};

/// Cheaply cloneable handle to a [`ChatEngineProvider`] that logs every
/// engine construction.
#[derive(Clone)]
pub struct ChatEngineService {
    provider: Arc<dyn ChatEngineProvider>,
}

impl fmt::Debug for ChatEngineService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatEngineService")
            .field("provider", &self.provider.name())
            .finish()
    }
}

impl ChatEngineService {
    /// Creates a new service from a provider.
    pub fn from_provider<P>(provider: P) -> Self
    where
        P: ChatEngineProvider + 'static,
    {
        Self {
            provider: Arc::new(provider),
        }
    }

    /// Returns the provider name.
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Builds a chat engine for the given options.
    pub async fn chat_engine(&self, options: EngineOptions) -> Result<Box<dyn ChatEngine>> {
        let started_at = Instant::now();
        let filters = options.filters().to_string();
        let param_count = options.params().len();
        let with_events = options.event_handler().is_some();

        let result = self.provider.chat_engine(options).await;

        match &result {
            Ok(_) => {
                tracing::debug!(
                    target: TRACING_TARGET,
                    provider = self.provider.name(),
                    filters = %filters,
                    param_count,
                    with_events,
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    "Chat engine created"
                );
            }
            Err(error) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    provider = self.provider.name(),
                    filters = %filters,
                    error = %error,
                    kind = error.kind().as_ref(),
                    "Chat engine creation failed"
                );
            }
        }

        result
    }
}

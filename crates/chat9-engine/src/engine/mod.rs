//! Chat engine traits and the per-request options used to build engines.

mod response;
mod service;

use std::sync::Arc;

pub use response::{ChatResponse, StreamingChatResponse, TokenStream};
pub use service::ChatEngineService;

use crate::event::EventCallbackHandler;
use crate::filter::MetadataFilters;
use crate::message::Message;
use crate::Result;

/// Free-form parameters supplied by the caller with a chat request.
pub type Params = serde_json::Map<String, serde_json::Value>;

/// Shared engine instance reused across requests.
pub type SharedChatEngine = Arc<dyn ChatEngine>;

/// Options for constructing a [`ChatEngine`].
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    filters: MetadataFilters,
    params: Params,
    event_handler: Option<EventCallbackHandler>,
}

impl EngineOptions {
    /// Creates options with no filters, parameters or event handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts retrieval with the given filters.
    pub fn with_filters(mut self, filters: MetadataFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Sets caller-supplied parameters.
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Attaches an event callback handler.
    pub fn with_event_handler(mut self, handler: EventCallbackHandler) -> Self {
        self.event_handler = Some(handler);
        self
    }

    pub fn filters(&self) -> &MetadataFilters {
        &self.filters
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn event_handler(&self) -> Option<&EventCallbackHandler> {
        self.event_handler.as_ref()
    }

    /// Splits the options into their parts.
    pub fn into_parts(self) -> (MetadataFilters, Params, Option<EventCallbackHandler>) {
        (self.filters, self.params, self.event_handler)
    }
}

/// An engine that answers chat messages, optionally citing retrieved nodes.
#[async_trait::async_trait]
pub trait ChatEngine: Send + Sync {
    /// Answers a single message without history.
    async fn chat(&self, message: &str) -> Result<ChatResponse>;

    /// Answers a message given the preceding history.
    ///
    /// Resolves once generation has started; the returned handle carries
    /// the cited nodes and the token stream.
    async fn stream_chat(&self, message: &str, history: Vec<Message>)
    -> Result<StreamingChatResponse>;
}

/// Builds chat engines configured for a single request.
#[async_trait::async_trait]
pub trait ChatEngineProvider: Send + Sync {
    /// Returns the provider name used in logs.
    fn name(&self) -> &str;

    /// Creates an engine for the given options.
    async fn chat_engine(&self, options: EngineOptions) -> Result<Box<dyn ChatEngine>>;
}

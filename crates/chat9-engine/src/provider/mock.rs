//! Deterministic in-process chat engine.
//!
//! The mock provider answers from a fixed node list and a canned (or
//! echoed) response, and records every streaming call it receives so tests
//! can assert on the exact message, history, filters and parameters.
//!
//! ```rust,ignore
//! use chat9_engine::provider::{MockConfig, MockProvider};
//! use chat9_engine::ChatEngineService;
//!
//! let provider = MockProvider::new(MockConfig::default()).with_response("answer");
//! let service = ChatEngineService::from_provider(provider.clone());
//! ```

use std::sync::{Arc, Mutex, PoisonError};

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

use super::{TRACING_TARGET, split_tokens};
use crate::engine::{
    ChatEngine, ChatEngineProvider, ChatResponse, EngineOptions, Params, StreamingChatResponse,
};
use crate::event::{ChatEvent, EventCallbackHandler};
use crate::filter::MetadataFilters;
use crate::message::Message;
use crate::node::NodeWithScore;
use crate::{Error, Result};

/// Configuration for the mock provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct MockConfig {
    /// Canned response. When unset the engine echoes the message.
    #[cfg_attr(feature = "config", arg(long = "mock-response", env = "MOCK_RESPONSE"))]
    #[serde(default)]
    pub mock_response: Option<String>,
}

/// A streaming call observed by the mock engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedChat {
    pub message: String,
    pub history: Vec<Message>,
    pub filters: MetadataFilters,
    pub params: Params,
}

#[derive(Default)]
struct MockState {
    nodes: Vec<NodeWithScore>,
    failure: Option<String>,
    calls: Mutex<Vec<RecordedChat>>,
}

/// Chat engine provider returning deterministic answers.
#[derive(Clone)]
pub struct MockProvider {
    config: MockConfig,
    state: Arc<MockState>,
}

impl MockProvider {
    /// Creates a mock provider from configuration.
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            state: Arc::new(MockState::default()),
        }
    }

    /// Sets the canned response.
    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.config.mock_response = Some(response.into());
        self
    }

    /// Sets the nodes the engine retrieves from.
    pub fn with_nodes(self, nodes: Vec<NodeWithScore>) -> Self {
        self.with_state(|state| state.nodes = nodes)
    }

    /// Makes every engine construction fail with a provider error.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        let message = message.into();
        self.with_state(|state| state.failure = Some(message))
    }

    fn with_state(mut self, update: impl FnOnce(&mut MockState)) -> Self {
        let calls = self.calls();
        let mut state = MockState {
            nodes: self.state.nodes.clone(),
            failure: self.state.failure.clone(),
            calls: Mutex::new(calls),
        };
        update(&mut state);
        self.state = Arc::new(state);
        self
    }

    /// Returns the streaming calls observed so far.
    pub fn calls(&self) -> Vec<RecordedChat> {
        self.state
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait::async_trait]
impl ChatEngineProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn chat_engine(&self, options: EngineOptions) -> Result<Box<dyn ChatEngine>> {
        if let Some(failure) = &self.state.failure {
            return Err(Error::provider("mock", failure));
        }

        let (filters, params, events) = options.into_parts();
        Ok(Box::new(MockChatEngine {
            response: self.config.mock_response.clone(),
            state: self.state.clone(),
            filters,
            params,
            events,
        }))
    }
}

struct MockChatEngine {
    response: Option<String>,
    state: Arc<MockState>,
    filters: MetadataFilters,
    params: Params,
    events: Option<EventCallbackHandler>,
}

impl MockChatEngine {
    fn emit(&self, event: ChatEvent) {
        if let Some(events) = &self.events {
            events.on_event(event);
        }
    }

    fn retrieve(&self, query: &str) -> Vec<NodeWithScore> {
        self.emit(ChatEvent::RetrievalStarted {
            query: query.to_owned(),
        });

        let nodes: Vec<_> = self
            .state
            .nodes
            .iter()
            .filter(|node| self.filters.matches(node.metadata()))
            .cloned()
            .collect();

        self.emit(ChatEvent::RetrievalFinished {
            source_count: nodes.len(),
        });
        nodes
    }

    fn answer(&self, message: &str) -> String {
        self.response
            .clone()
            .unwrap_or_else(|| format!("You said: {message}"))
    }
}

#[async_trait::async_trait]
impl ChatEngine for MockChatEngine {
    async fn chat(&self, message: &str) -> Result<ChatResponse> {
        let nodes = self.retrieve(message);
        Ok(ChatResponse::new(self.answer(message), nodes))
    }

    async fn stream_chat(
        &self,
        message: &str,
        history: Vec<Message>,
    ) -> Result<StreamingChatResponse> {
        self.state
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedChat {
                message: message.to_owned(),
                history,
                filters: self.filters.clone(),
                params: self.params.clone(),
            });

        let nodes = self.retrieve(message);
        self.emit(ChatEvent::GenerationStarted {
            model: "mock".to_owned(),
        });
        let tokens = split_tokens(&self.answer(message));
        self.emit(ChatEvent::GenerationFinished);

        tracing::debug!(
            target: TRACING_TARGET,
            node_count = nodes.len(),
            token_count = tokens.len(),
            "Mock engine answered"
        );

        Ok(StreamingChatResponse::from_tokens(nodes, tokens))
    }
}

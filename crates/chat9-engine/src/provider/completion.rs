//! Completion-backed chat engine built on rig-core.

use std::fmt;
use std::sync::Arc;

use rig::completion::{AssistantContent, CompletionError, CompletionModel as RigCompletionModel};
use rig::message::Message as RigMessage;
use rig::one_or_many::OneOrMany;
use rig::prelude::CompletionClient;
use rig::providers::{anthropic, openai};
use serde_json::Value;

use super::{TRACING_TARGET, split_tokens};
use crate::engine::{
    ChatEngine, ChatEngineProvider, ChatResponse, EngineOptions, Params, StreamingChatResponse,
};
use crate::event::{ChatEvent, EventCallbackHandler};
use crate::message::{Message, MessageRole};
use crate::{Error, Result};

/// Generation settings applied to every completion request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionSettings {
    /// System prompt prepended to the preamble.
    pub system_prompt: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Upper bound on generated tokens.
    pub max_tokens: Option<u64>,
}

impl CompletionSettings {
    /// Overrides settings with `system_prompt`, `temperature` and
    /// `max_tokens` entries found in request parameters. Other entries are
    /// ignored.
    pub fn with_params(mut self, params: &Params) -> Self {
        if let Some(prompt) = params.get("system_prompt").and_then(Value::as_str) {
            self.system_prompt = Some(prompt.to_owned());
        }
        if let Some(temperature) = params.get("temperature").and_then(Value::as_f64) {
            self.temperature = Some(temperature);
        }
        if let Some(max_tokens) = params.get("max_tokens").and_then(Value::as_u64) {
            self.max_tokens = Some(max_tokens);
        }
        self
    }
}

/// Chat engine provider backed by a rig completion model.
///
/// This is a cheaply cloneable wrapper around an `Arc<CompletionService>`.
#[derive(Clone)]
pub struct CompletionProvider {
    inner: Arc<CompletionService>,
    settings: CompletionSettings,
}

enum CompletionService {
    OpenAi {
        model: openai::CompletionModel,
        model_name: String,
    },
    Anthropic {
        model: anthropic::completion::CompletionModel,
        model_name: String,
    },
}

impl CompletionProvider {
    /// Creates an OpenAI completion provider.
    pub fn openai(api_key: &str, model_name: &str) -> Result<Self> {
        let client = openai::Client::new(api_key)
            .map_err(|e| Error::provider("openai", e))?
            .completions_api();

        Ok(Self::from_service(CompletionService::OpenAi {
            model: client.completion_model(model_name),
            model_name: model_name.to_owned(),
        }))
    }

    /// Creates an Anthropic completion provider.
    pub fn anthropic(api_key: &str, model_name: &str) -> Result<Self> {
        let client =
            anthropic::Client::new(api_key).map_err(|e| Error::provider("anthropic", e))?;

        Ok(Self::from_service(CompletionService::Anthropic {
            model: client.completion_model(model_name),
            model_name: model_name.to_owned(),
        }))
    }

    fn from_service(service: CompletionService) -> Self {
        Self {
            inner: Arc::new(service),
            settings: CompletionSettings::default(),
        }
    }

    /// Replaces the default generation settings.
    pub fn with_settings(mut self, settings: CompletionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Returns the model name.
    pub fn model_name(&self) -> &str {
        match self.inner.as_ref() {
            CompletionService::OpenAi { model_name, .. } => model_name,
            CompletionService::Anthropic { model_name, .. } => model_name,
        }
    }

    /// Returns the provider name.
    pub fn provider_name(&self) -> &'static str {
        match self.inner.as_ref() {
            CompletionService::OpenAi { .. } => "openai",
            CompletionService::Anthropic { .. } => "anthropic",
        }
    }

    /// Sends a completion request and returns the generated text.
    pub async fn complete(
        &self,
        prompt: &str,
        history: Vec<Message>,
        settings: &CompletionSettings,
    ) -> Result<String> {
        let (preamble, history) = build_history(settings.system_prompt.as_deref(), history);
        let map_err = |e: CompletionError| Error::provider(self.provider_name(), e);

        match self.inner.as_ref() {
            CompletionService::OpenAi { model, .. } => {
                send(model, prompt, history, preamble, settings)
                    .await
                    .map_err(map_err)
            }
            CompletionService::Anthropic { model, .. } => {
                send(model, prompt, history, preamble, settings)
                    .await
                    .map_err(map_err)
            }
        }
    }
}

#[async_trait::async_trait]
impl ChatEngineProvider for CompletionProvider {
    fn name(&self) -> &str {
        self.provider_name()
    }

    async fn chat_engine(&self, options: EngineOptions) -> Result<Box<dyn ChatEngine>> {
        let (filters, params, events) = options.into_parts();

        if !filters.is_unrestricted() {
            tracing::debug!(
                target: TRACING_TARGET,
                provider = self.provider_name(),
                filters = %filters,
                "Completion engine has no retriever, filters are not applied"
            );
        }

        Ok(Box::new(CompletionChatEngine {
            settings: self.settings.clone().with_params(&params),
            provider: self.clone(),
            events,
        }))
    }
}

impl fmt::Debug for CompletionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionProvider")
            .field("provider", &self.provider_name())
            .field("model", &self.model_name())
            .field("settings", &self.settings)
            .finish()
    }
}

/// Chat engine answering directly from a completion model.
///
/// The model answers in one request; the text is then chunked into a token
/// stream. No nodes are cited.
pub struct CompletionChatEngine {
    provider: CompletionProvider,
    settings: CompletionSettings,
    events: Option<EventCallbackHandler>,
}

impl CompletionChatEngine {
    fn emit(&self, event: ChatEvent) {
        if let Some(events) = &self.events {
            events.on_event(event);
        }
    }

    async fn generate(&self, message: &str, history: Vec<Message>) -> Result<String> {
        self.emit(ChatEvent::GenerationStarted {
            model: self.provider.model_name().to_owned(),
        });

        let text = self
            .provider
            .complete(message, history, &self.settings)
            .await?;

        tracing::debug!(
            target: TRACING_TARGET,
            provider = self.provider.provider_name(),
            model = self.provider.model_name(),
            response_len = text.len(),
            "Completion finished"
        );

        self.emit(ChatEvent::GenerationFinished);
        Ok(text)
    }
}

#[async_trait::async_trait]
impl ChatEngine for CompletionChatEngine {
    async fn chat(&self, message: &str) -> Result<ChatResponse> {
        let text = self.generate(message, Vec::new()).await?;
        Ok(ChatResponse::new(text, Vec::new()))
    }

    async fn stream_chat(
        &self,
        message: &str,
        history: Vec<Message>,
    ) -> Result<StreamingChatResponse> {
        let text = self.generate(message, history).await?;
        Ok(StreamingChatResponse::from_tokens(
            Vec::new(),
            split_tokens(&text),
        ))
    }
}

async fn send<M>(
    model: &M,
    prompt: &str,
    history: Vec<RigMessage>,
    preamble: Option<String>,
    settings: &CompletionSettings,
) -> std::result::Result<String, CompletionError>
where
    M: RigCompletionModel,
{
    let mut request = model.completion_request(prompt).messages(history);
    if let Some(preamble) = preamble {
        request = request.preamble(preamble);
    }
    if let Some(temperature) = settings.temperature {
        request = request.temperature(temperature);
    }
    if let Some(max_tokens) = settings.max_tokens {
        request = request.max_tokens(max_tokens);
    }

    let response = request.send().await?;
    Ok(extract_text_content(&response.choice))
}

/// Folds system messages into the preamble and converts the rest.
fn build_history(
    system_prompt: Option<&str>,
    history: Vec<Message>,
) -> (Option<String>, Vec<RigMessage>) {
    let mut preamble: Vec<String> = system_prompt.map(str::to_owned).into_iter().collect();
    let mut messages = Vec::with_capacity(history.len());

    for message in history {
        match message.role() {
            MessageRole::System => preamble.push(message.into_content()),
            MessageRole::User => messages.push(RigMessage::user(message.into_content())),
            MessageRole::Assistant => {
                messages.push(RigMessage::assistant(message.into_content()))
            }
        }
    }

    let preamble = (!preamble.is_empty()).then(|| preamble.join("\n\n"));
    (preamble, messages)
}

/// Extracts text content from assistant content choices.
fn extract_text_content(choice: &OneOrMany<AssistantContent>) -> String {
    choice
        .iter()
        .filter_map(|content| match content {
            AssistantContent::Text(text) => Some(text.text()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn params_override_settings() {
        let defaults = CompletionSettings {
            system_prompt: Some("default".to_owned()),
            temperature: Some(0.2),
            max_tokens: None,
        };

        let params = json!({"temperature": 0.9, "max_tokens": 256, "top_k": 3});
        let params = params.as_object().cloned().unwrap_or_default();
        let settings = defaults.with_params(&params);

        assert_eq!(settings.system_prompt.as_deref(), Some("default"));
        assert_eq!(settings.temperature, Some(0.9));
        assert_eq!(settings.max_tokens, Some(256));
    }

    #[test]
    fn system_messages_join_preamble() {
        let history = vec![
            Message::system("Answer in French."),
            Message::user("a"),
            Message::assistant("b"),
        ];

        let (preamble, messages) = build_history(Some("You are helpful."), history);
        assert_eq!(
            preamble.as_deref(),
            Some("You are helpful.\n\nAnswer in French.")
        );
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn no_preamble_without_system_content() {
        let (preamble, messages) = build_history(None, vec![Message::user("a")]);
        assert!(preamble.is_none());
        assert_eq!(messages.len(), 1);
    }
}

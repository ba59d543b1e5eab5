//! Engine configuration and provider construction.

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::engine::ChatEngineService;
use crate::provider::{CompletionProvider, CompletionSettings, MockConfig, MockProvider};
use crate::{Error, Result, TRACING_TARGET};

/// Chat engine backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[derive(strum::AsRefStr, strum::Display, strum::EnumString)]
#[cfg_attr(feature = "config", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EngineKind {
    /// OpenAI completions.
    #[default]
    #[cfg_attr(feature = "config", value(name = "openai"))]
    OpenAi,
    /// Anthropic messages.
    Anthropic,
    /// Deterministic in-process engine.
    Mock,
}

/// Chat engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct EngineConfig {
    /// Chat engine backend.
    #[cfg_attr(
        feature = "config",
        arg(long = "model-provider", env = "MODEL_PROVIDER", value_enum, default_value = "openai")
    )]
    #[serde(default)]
    pub provider: EngineKind,

    /// Model name passed to the backend.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "MODEL", default_value = "gpt-4o-mini")
    )]
    pub model: String,

    /// OpenAI API key.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "OPENAI_API_KEY", hide_env_values = true)
    )]
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,

    /// Anthropic API key.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)
    )]
    #[serde(skip_serializing)]
    pub anthropic_api_key: Option<String>,

    /// System prompt prepended to every conversation.
    #[cfg_attr(feature = "config", arg(long, env = "SYSTEM_PROMPT"))]
    pub system_prompt: Option<String>,

    /// Default sampling temperature.
    #[cfg_attr(feature = "config", arg(long = "llm-temperature", env = "LLM_TEMPERATURE"))]
    pub temperature: Option<f64>,

    /// Default upper bound on generated tokens.
    #[cfg_attr(feature = "config", arg(long = "llm-max-tokens", env = "LLM_MAX_TOKENS"))]
    pub max_tokens: Option<u64>,

    /// Mock backend configuration.
    #[cfg_attr(feature = "config", clap(flatten))]
    #[serde(default)]
    pub mock: MockConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            provider: EngineKind::default(),
            model: "gpt-4o-mini".to_owned(),
            openai_api_key: None,
            anthropic_api_key: None,
            system_prompt: None,
            temperature: None,
            max_tokens: None,
            mock: MockConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Returns a mock configuration, used in tests and local development.
    pub fn mock() -> Self {
        Self {
            provider: EngineKind::Mock,
            ..Self::default()
        }
    }

    /// Validates the configuration for the selected backend.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() && self.provider != EngineKind::Mock {
            return Err(Error::config("model name must not be empty"));
        }

        if let Some(temperature) = self.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            return Err(Error::config(format!(
                "temperature {temperature} is outside the range 0.0-2.0"
            )));
        }

        match self.provider {
            EngineKind::OpenAi if self.openai_api_key.is_none() => Err(Error::config(
                "OPENAI_API_KEY is required when MODEL_PROVIDER is openai",
            )),
            EngineKind::Anthropic if self.anthropic_api_key.is_none() => Err(Error::config(
                "ANTHROPIC_API_KEY is required when MODEL_PROVIDER is anthropic",
            )),
            _ => Ok(()),
        }
    }

    fn settings(&self) -> CompletionSettings {
        CompletionSettings {
            system_prompt: self.system_prompt.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    /// Builds the chat engine service for the selected backend.
    pub fn build_service(&self) -> Result<ChatEngineService> {
        self.validate()?;

        let service = match self.provider {
            EngineKind::OpenAi => {
                let api_key = self.openai_api_key.as_deref().unwrap_or_default();
                let provider = CompletionProvider::openai(api_key, &self.model)?
                    .with_settings(self.settings());
                ChatEngineService::from_provider(provider)
            }
            EngineKind::Anthropic => {
                let api_key = self.anthropic_api_key.as_deref().unwrap_or_default();
                let provider = CompletionProvider::anthropic(api_key, &self.model)?
                    .with_settings(self.settings());
                ChatEngineService::from_provider(provider)
            }
            EngineKind::Mock => {
                ChatEngineService::from_provider(MockProvider::new(self.mock.clone()))
            }
        };

        tracing::info!(
            target: TRACING_TARGET,
            provider = service.provider_name(),
            model = %self.model,
            "Chat engine service configured"
        );

        Ok(service)
    }
}

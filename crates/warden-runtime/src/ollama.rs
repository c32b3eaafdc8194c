//! Ollama LLM Provider
//!
//! Implementation of `LlmProvider` for local Ollama inference through
//! `ollama-rs`, using non-streaming chat requests.

use std::time::Duration;

use async_trait::async_trait;
use ollama_rs::{
    Ollama,
    generation::chat::{ChatMessage, MessageRole, request::ChatMessageRequest},
    models::ModelOptions,
};
use warden_core::{
    error::{Result, WardenError},
    message::{Message, Role},
    provider::{Completion, GenerationOptions, LlmProvider},
};

/// Model requests can take minutes on CPU-only hosts
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Ollama provider configuration
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Ollama host URL
    pub host: String,

    /// Ollama port
    pub port: u16,

    /// Request timeout
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost".into(),
            port: 11434,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl OllamaConfig {
    pub fn from_env() -> Self {
        let host = std::env::var("OLLAMA_HOST").unwrap_or_else(|_| "http://localhost".into());
        let port = std::env::var("OLLAMA_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(11434);

        Self {
            host,
            port,
            ..Default::default()
        }
    }
}

/// Ollama LLM provider
pub struct OllamaProvider {
    client: Ollama,
    config: OllamaConfig,
}

impl OllamaProvider {
    /// Create from configuration
    pub fn from_config(config: OllamaConfig) -> Result<Self> {
        let host = reqwest::Url::parse(&config.host)
            .map_err(|e| WardenError::Config(format!("invalid Ollama host '{}': {e}", config.host)))?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| WardenError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client: Ollama::new_with_client(host, config.port, http),
            config,
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(OllamaConfig::from_env())
    }

    /// Create with default localhost settings
    pub fn localhost() -> Result<Self> {
        Self::from_config(OllamaConfig::default())
    }

    pub const fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Convert conversation messages to Ollama format
    fn convert_messages(messages: &[Message]) -> Vec<ChatMessage> {
        messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => MessageRole::System,
                    Role::User => MessageRole::User,
                    Role::Assistant => MessageRole::Assistant,
                };
                ChatMessage::new(role, m.content.clone())
            })
            .collect()
    }

    fn build_options(opts: &GenerationOptions) -> ModelOptions {
        let options = ModelOptions::default().temperature(opts.temperature);
        match opts.max_tokens {
            Some(max) => options.num_predict(i32::try_from(max).unwrap_or(i32::MAX)),
            None => options,
        }
    }

    fn chat_request(messages: &[Message], options: &GenerationOptions) -> ChatMessageRequest {
        ChatMessageRequest::new(options.model.clone(), Self::convert_messages(messages))
            .options(Self::build_options(options))
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn health_check(&self) -> Result<bool> {
        match self.client.list_local_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("Ollama health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        tracing::debug!(model = %options.model, messages = messages.len(), "sending chat request");

        let response = self
            .client
            .send_chat_messages(Self::chat_request(messages, options))
            .await
            .map_err(|e| WardenError::Provider(e.to_string()))?;

        let model = if response.model.is_empty() {
            options.model.clone()
        } else {
            response.model
        };
        Ok(Completion {
            content: response.message.content.trim().to_string(),
            model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = OllamaConfig::default();
        assert_eq!(config.host, "http://localhost");
        assert_eq!(config.port, 11434);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_message_conversion() {
        let messages = vec![
            Message::system("You are The Warden."),
            Message::user("Hello"),
            Message::assistant(r#"{"action": "complete"}"#),
        ];

        let converted = OllamaProvider::convert_messages(&messages);
        assert_eq!(converted.len(), 3);
        assert_eq!(converted[1].content, "Hello");
        assert!(matches!(converted[0].role, MessageRole::System));
        assert!(matches!(converted[2].role, MessageRole::Assistant));
    }

    #[test]
    fn test_invalid_host_is_config_error() {
        let config = OllamaConfig {
            host: "not a url".into(),
            ..Default::default()
        };
        assert!(matches!(
            OllamaProvider::from_config(config),
            Err(WardenError::Config(_))
        ));
    }

    #[test]
    fn test_localhost_provider() {
        let provider = OllamaProvider::localhost().unwrap();
        assert_eq!(provider.name(), "ollama");
        assert_eq!(provider.config().port, 11434);
    }
}

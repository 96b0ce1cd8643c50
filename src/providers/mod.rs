pub mod http;

use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Instant;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ConsensusError;
use crate::message::ChatMessage;
use http::{HttpDispatch, MAX_RESPONSE_BYTES};

/// One LLM endpoint, identified by a (provider, model) pair.
/// Duplicates in a request are not deduplicated — they simply run twice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelSpec {
    pub provider: String,
    pub model: String,
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.model)
    }
}

impl FromStr for ModelSpec {
    type Err = ConsensusError;

    /// Parse `provider:model`. The model id may itself contain colons
    /// (e.g. `ollama:llama3:8b`); the first colon is the separator.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (provider, model) = s.split_once(':').ok_or_else(|| {
            ConsensusError::Validation(format!("expected provider:model, got \"{s}\""))
        })?;
        let provider = provider.trim();
        let model = model.trim();
        if provider.is_empty() || model.is_empty() {
            return Err(ConsensusError::Validation(format!(
                "expected provider:model, got \"{s}\""
            )));
        }
        Ok(Self {
            provider: provider.to_string(),
            model: model.to_string(),
        })
    }
}

/// API wire format for HTTP providers.
#[derive(Clone, Debug, Default)]
pub enum ApiFormat {
    /// OpenAI-compatible chat completions (also Google's and Ollama's
    /// compatibility endpoints).
    #[default]
    OpenAi,
    /// Anthropic Messages API (different headers, SSE format).
    Anthropic,
}

/// Endpoint configuration for one provider.
#[derive(Clone)]
pub struct ProviderEntry {
    pub base_url: String,
    pub api_key: String,
    pub api_format: ApiFormat,
}

impl fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("api_format", &self.api_format)
            .finish()
    }
}

/// Token stream from one generation call.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, ConsensusError>> + Send>>;

/// One generation request against a (provider, model) pair.
#[derive(Clone)]
pub struct GenerationRequest {
    pub spec: ModelSpec,
    pub messages: Vec<ChatMessage>,
    pub deadline: Instant,
    /// Cooperative teardown signal. When cancelled, the token stream ends
    /// after the chunk in flight instead of running to completion.
    pub cancellation_token: Option<CancellationToken>,
}

/// Uniform interface to issue a text-generation request and obtain a token
/// stream. Provider authentication, rate limiting, and model-name validation
/// live behind this seam.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(&self, req: GenerationRequest) -> Result<TokenStream, ConsensusError>;
}

/// Drain a token stream into its full text, capped at [`MAX_RESPONSE_BYTES`].
pub async fn drain(spec: &ModelSpec, mut stream: TokenStream) -> Result<String, ConsensusError> {
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if text.len() + chunk.len() > MAX_RESPONSE_BYTES {
            return Err(ConsensusError::Upstream {
                provider: spec.provider.clone(),
                message: format!("response too large (max {MAX_RESPONSE_BYTES} bytes)"),
                status: None,
            });
        }
        text.push_str(&chunk);
    }
    Ok(text)
}

/// Model Client Adapter: resolves a spec's provider against the configured
/// endpoint table and dispatches over HTTP.
pub struct ProviderAdapter {
    providers: HashMap<String, ProviderEntry>,
    http: HttpDispatch,
}

impl ProviderAdapter {
    pub fn new(providers: HashMap<String, ProviderEntry>) -> Self {
        Self {
            providers,
            http: HttpDispatch::new(),
        }
    }

    /// Configured provider names, sorted for stable display.
    pub fn configured_providers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[async_trait]
impl ModelClient for ProviderAdapter {
    async fn generate(&self, req: GenerationRequest) -> Result<TokenStream, ConsensusError> {
        let entry = self.providers.get(&req.spec.provider).ok_or_else(|| {
            ConsensusError::ProviderNotConfigured {
                provider: req.spec.provider.clone(),
            }
        })?;
        self.http.stream_chat(&req, entry).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_spec_parses_provider_and_model() {
        let spec: ModelSpec = "openai:gpt-4.1".parse().unwrap();
        assert_eq!(spec.provider, "openai");
        assert_eq!(spec.model, "gpt-4.1");
        assert_eq!(spec.to_string(), "openai:gpt-4.1");
    }

    #[test]
    fn model_spec_keeps_colons_in_model_id() {
        let spec: ModelSpec = "ollama:llama3:8b".parse().unwrap();
        assert_eq!(spec.provider, "ollama");
        assert_eq!(spec.model, "llama3:8b");
    }

    #[test]
    fn model_spec_rejects_malformed_input() {
        assert!("gpt-4.1".parse::<ModelSpec>().is_err());
        assert!(":gpt-4.1".parse::<ModelSpec>().is_err());
        assert!("openai:".parse::<ModelSpec>().is_err());
    }

    #[test]
    fn configured_providers_are_sorted() {
        let entry = ProviderEntry {
            base_url: "http://localhost/v1/chat/completions".to_string(),
            api_key: "k".to_string(),
            api_format: ApiFormat::OpenAi,
        };
        let adapter = ProviderAdapter::new(HashMap::from([
            ("openai".to_string(), entry.clone()),
            ("anthropic".to_string(), entry.clone()),
            ("google".to_string(), entry),
        ]));
        assert_eq!(
            adapter.configured_providers(),
            vec!["anthropic", "google", "openai"]
        );
    }

    #[test]
    fn provider_entry_debug_redacts_api_key() {
        let entry = ProviderEntry {
            base_url: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: "sk-secret".to_string(),
            api_format: ApiFormat::OpenAi,
        };
        let rendered = format!("{entry:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("sk-secret"));
    }
}

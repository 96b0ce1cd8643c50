use std::collections::HashMap;
use std::env;

use crate::providers::{ApiFormat, ProviderEntry};

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
// Google exposes an OpenAI-compatible endpoint for Gemini models.
const GOOGLE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions";

pub struct Config {
    pub providers: HashMap<String, ProviderEntry>,
}

impl Config {
    pub fn from_env() -> Self {
        let mut providers = HashMap::new();

        if let Ok(key) = env::var("OPENAI_API_KEY") {
            providers.insert(
                "openai".to_string(),
                ProviderEntry {
                    base_url: OPENAI_URL.to_string(),
                    api_key: key,
                    api_format: ApiFormat::OpenAi,
                },
            );
        } else {
            tracing::warn!("OPENAI_API_KEY not set — openai models unavailable");
        }

        if let Ok(key) = env::var("ANTHROPIC_API_KEY") {
            providers.insert(
                "anthropic".to_string(),
                ProviderEntry {
                    base_url: ANTHROPIC_URL.to_string(),
                    api_key: key,
                    api_format: ApiFormat::Anthropic,
                },
            );
        } else {
            tracing::warn!("ANTHROPIC_API_KEY not set — anthropic models unavailable");
        }

        if let Ok(key) = env::var("GOOGLE_API_KEY") {
            providers.insert(
                "google".to_string(),
                ProviderEntry {
                    base_url: GOOGLE_URL.to_string(),
                    api_key: key,
                    api_format: ApiFormat::OpenAi,
                },
            );
        } else {
            tracing::warn!("GOOGLE_API_KEY not set — google models unavailable");
        }

        // Ollama speaks the OpenAI format and ignores the API key.
        if let Ok(base) = env::var("OLLAMA_BASE_URL") {
            let base = base.trim_end_matches('/');
            providers.insert(
                "ollama".to_string(),
                ProviderEntry {
                    base_url: format!("{base}/v1/chat/completions"),
                    api_key: "ollama".to_string(),
                    api_format: ApiFormat::OpenAi,
                },
            );
        } else {
            tracing::warn!("OLLAMA_BASE_URL not set — ollama models unavailable");
        }

        if providers.is_empty() {
            tracing::error!("no providers configured — all requests will fail");
        }

        Config { providers }
    }
}

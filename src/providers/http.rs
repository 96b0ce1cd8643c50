use std::time::{Duration, Instant};

use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use futures_util::future;
use reqwest::Client;
use serde::Deserialize;

use crate::error::ConsensusError;
use crate::message::{ContentPart, MessageContent, Role};
use crate::providers::{ApiFormat, GenerationRequest, ProviderEntry, TokenStream};

/// Cap on accumulated response text and on error bodies (prevents memory
/// exhaustion from a misbehaving provider).
pub const MAX_RESPONSE_BYTES: usize = 2 * 1024 * 1024; // 2MB

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// The Messages API requires max_tokens; this matches the ceiling the chat
/// layer uses for direct calls.
const ANTHROPIC_MAX_TOKENS: u64 = 8192;

pub struct HttpDispatch {
    client: Client,
}

#[derive(Deserialize)]
struct StreamCompletion {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicEvent {
    #[serde(rename = "type")]
    kind: String,
    delta: Option<AnthropicDelta>,
    error: Option<AnthropicErrorBody>,
}

#[derive(Deserialize)]
struct AnthropicDelta {
    text: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Classification of one SSE frame.
enum SseItem {
    Token(String),
    Skip,
    Done,
    Error(ConsensusError),
}

impl Default for HttpDispatch {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpDispatch {
    pub fn new() -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(4)
            .build()
            .expect("failed to build HTTP client");

        Self { client }
    }

    /// Issue one streaming chat-completion request and return the token
    /// stream. The remaining deadline bounds the whole request, body included,
    /// so a hung provider surfaces as a per-call timeout.
    pub async fn stream_chat(
        &self,
        req: &GenerationRequest,
        entry: &ProviderEntry,
    ) -> Result<TokenStream, ConsensusError> {
        // Check for expired deadline before making the request
        let timeout = req
            .deadline
            .checked_duration_since(Instant::now())
            .filter(|d| *d > Duration::from_millis(100))
            .ok_or(ConsensusError::Timeout(0))?;

        let provider = req.spec.provider.clone();

        let builder = match entry.api_format {
            ApiFormat::OpenAi => self
                .client
                .post(&entry.base_url)
                .header("Authorization", format!("Bearer {}", entry.api_key))
                .json(&openai_body(req)),
            ApiFormat::Anthropic => self
                .client
                .post(&entry.base_url)
                .header("x-api-key", entry.api_key.clone())
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&anthropic_body(req)),
        };

        let response = builder
            .header("Content-Type", "application/json")
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ConsensusError::RateLimited { provider });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ConsensusError::AuthFailed {
                provider,
                message: format!("{status}"),
            });
        }

        // Catch-all for any non-success status. Cap error body reads to
        // MAX_RESPONSE_BYTES.
        if !status.is_success() {
            let error_bytes = response.bytes().await.unwrap_or_default();
            let truncated = &error_bytes[..error_bytes.len().min(MAX_RESPONSE_BYTES)];
            let text = String::from_utf8_lossy(truncated);
            return Err(ConsensusError::Upstream {
                provider,
                message: format!("{status}: {text}"),
                status: Some(status.as_u16()),
            });
        }

        let format = entry.api_format.clone();
        let events = response.bytes_stream().eventsource();

        let mapped = events.map(move |ev| match ev {
            Ok(event) => match format {
                ApiFormat::OpenAi => parse_openai_event(&event.data),
                ApiFormat::Anthropic => parse_anthropic_event(&event.data, &provider),
            },
            Err(e) => SseItem::Error(ConsensusError::Upstream {
                provider: provider.clone(),
                message: format!("stream error: {e}"),
                status: None,
            }),
        });

        let tokens = mapped
            .take_while(|item| future::ready(!matches!(item, SseItem::Done)))
            .filter_map(|item| async move {
                match item {
                    SseItem::Token(text) => Some(Ok(text)),
                    SseItem::Skip | SseItem::Done => None,
                    SseItem::Error(e) => Some(Err(e)),
                }
            });

        Ok(match req.cancellation_token.clone() {
            Some(token) => Box::pin(tokens.take_until(token.cancelled_owned())) as TokenStream,
            None => Box::pin(tokens) as TokenStream,
        })
    }
}

/// Classify one OpenAI-format SSE frame. Frames that carry no content delta
/// (role preludes, keep-alives, usage reports) are skipped.
fn parse_openai_event(data: &str) -> SseItem {
    if data.trim() == "[DONE]" {
        return SseItem::Done;
    }
    match serde_json::from_str::<StreamCompletion>(data) {
        Ok(completion) => completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .map(SseItem::Token)
            .unwrap_or(SseItem::Skip),
        Err(_) => SseItem::Skip,
    }
}

/// Classify one Anthropic Messages SSE frame by its embedded `type` field.
fn parse_anthropic_event(data: &str, provider: &str) -> SseItem {
    let Ok(event) = serde_json::from_str::<AnthropicEvent>(data) else {
        return SseItem::Skip;
    };
    match event.kind.as_str() {
        "content_block_delta" => event
            .delta
            .and_then(|d| d.text)
            .map(SseItem::Token)
            .unwrap_or(SseItem::Skip),
        "message_stop" => SseItem::Done,
        "error" => SseItem::Error(ConsensusError::Upstream {
            provider: provider.to_string(),
            message: event
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| "unknown stream error".to_string()),
            status: None,
        }),
        _ => SseItem::Skip,
    }
}

fn openai_body(req: &GenerationRequest) -> serde_json::Value {
    let messages: Vec<serde_json::Value> = req
        .messages
        .iter()
        .map(|m| {
            serde_json::json!({
                "role": m.role,
                "content": openai_content(&m.content),
            })
        })
        .collect();

    serde_json::json!({
        "model": req.spec.model,
        "messages": messages,
        "stream": true,
    })
}

fn openai_content(content: &MessageContent) -> serde_json::Value {
    match content {
        MessageContent::Text(text) => serde_json::Value::String(text.clone()),
        MessageContent::Parts(parts) => serde_json::Value::Array(
            parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => {
                        serde_json::json!({"type": "text", "text": text})
                    }
                    ContentPart::Image { image } => {
                        serde_json::json!({"type": "image_url", "image_url": {"url": image}})
                    }
                })
                .collect(),
        ),
    }
}

fn anthropic_body(req: &GenerationRequest) -> serde_json::Value {
    // The Messages API takes system text as a top-level field, not a message.
    let mut system_parts: Vec<String> = Vec::new();
    let mut messages: Vec<serde_json::Value> = Vec::new();

    for m in &req.messages {
        match m.role {
            Role::System => system_parts.push(m.content.as_text()),
            Role::User | Role::Assistant => messages.push(serde_json::json!({
                "role": m.role,
                "content": anthropic_content(&m.content),
            })),
        }
    }

    let mut body = serde_json::json!({
        "model": req.spec.model,
        "max_tokens": ANTHROPIC_MAX_TOKENS,
        "messages": messages,
        "stream": true,
    });
    if !system_parts.is_empty() {
        body["system"] = serde_json::Value::String(system_parts.join("\n\n"));
    }
    body
}

fn anthropic_content(content: &MessageContent) -> serde_json::Value {
    match content {
        MessageContent::Text(text) => serde_json::Value::String(text.clone()),
        MessageContent::Parts(parts) => serde_json::Value::Array(
            parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => {
                        Some(serde_json::json!({"type": "text", "text": text}))
                    }
                    ContentPart::Image { image } => match parse_data_url(image) {
                        Some((media_type, data)) => Some(serde_json::json!({
                            "type": "image",
                            "source": {
                                "type": "base64",
                                "media_type": media_type,
                                "data": data,
                            },
                        })),
                        None => {
                            tracing::warn!("skipping non-data-URL image part for anthropic");
                            None
                        }
                    },
                })
                .collect(),
        ),
    }
}

/// Split a `data:<media-type>;base64,<data>` URL into its media type and
/// payload.
fn parse_data_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("data:")?;
    rest.split_once(";base64,")
}

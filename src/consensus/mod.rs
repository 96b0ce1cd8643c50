//! Consensus workflow: fan a chat request out to N models in parallel,
//! tolerate partial failure, and synthesize the surviving responses into one
//! streamed answer via a further model call.

pub mod executor;
pub mod prompt;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::ConsensusError;
use crate::message::{ChatMessage, last_user_query};
use crate::providers::{GenerationRequest, ModelClient, ModelSpec, TokenStream};
use crate::workflow::{ChatWorkflowRequest, WorkflowHandler};
use executor::query_participants;
use prompt::{ModelResponse, UNKNOWN_QUERY, build_synthesis_prompt};

/// Consensus is undefined below 2 participants.
pub const MIN_PARTICIPANTS: usize = 2;

/// Max participants per consensus request (prevents fan-out abuse).
pub const MAX_PARTICIPANTS: usize = 20;

/// Per-call deadline for participant and synthesizer requests. A hung
/// provider call surfaces as that participant's timeout, not a request-wide
/// hang.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(300);

pub struct ConsensusWorkflow {
    client: Arc<dyn ModelClient>,
    call_timeout: Duration,
}

impl ConsensusWorkflow {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self {
            client,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Reject malformed requests before any model call is made.
    fn validate(req: &ChatWorkflowRequest) -> Result<(), ConsensusError> {
        if req.messages.is_empty() {
            return Err(ConsensusError::Validation(
                "messages must not be empty".to_string(),
            ));
        }
        let n = req.tool_config.models.len();
        if n < MIN_PARTICIPANTS {
            return Err(ConsensusError::Validation(format!(
                "insufficient models: {n} (minimum {MIN_PARTICIPANTS} required)"
            )));
        }
        if n > MAX_PARTICIPANTS {
            return Err(ConsensusError::Validation(format!(
                "too many models: {n} (maximum {MAX_PARTICIPANTS})"
            )));
        }
        if req.provider.trim().is_empty() || req.model.trim().is_empty() {
            return Err(ConsensusError::Validation(
                "missing synthesizer provider or model".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn run(&self, req: ChatWorkflowRequest) -> Result<TokenStream, ConsensusError> {
        Self::validate(&req)?;

        let models = req.tool_config.models;

        // Prepend system context to a copy of the conversation; the caller's
        // message sequence is never mutated.
        let mut fan_out_messages: Vec<ChatMessage> = Vec::with_capacity(req.messages.len() + 1);
        if let Some(ctx) = req
            .system_context
            .as_deref()
            .filter(|c| !c.trim().is_empty())
        {
            fan_out_messages.push(ChatMessage::system(ctx));
        }
        fan_out_messages.extend(req.messages.iter().cloned());

        let model_list: Vec<String> = models.iter().map(ToString::to_string).collect();
        tracing::info!(
            "consensus query with {} models: {}",
            models.len(),
            model_list.join(", ")
        );

        let deadline = Instant::now() + self.call_timeout;
        let outcomes =
            query_participants(self.client.clone(), &fan_out_messages, &models, deadline).await;

        // Failed participants are absorbed: logged by the executor, excluded
        // from synthesis input.
        let responses: Vec<ModelResponse> = outcomes
            .into_iter()
            .filter_map(|outcome| match outcome.result {
                Ok(content) => Some(ModelResponse {
                    spec: outcome.spec,
                    content,
                }),
                Err(_) => None,
            })
            .collect();

        if responses.is_empty() {
            return Err(ConsensusError::AllModelsFailed {
                attempted: models.len(),
            });
        }

        tracing::info!(
            "{} of {} models responded successfully",
            responses.len(),
            models.len()
        );

        let user_query =
            last_user_query(&req.messages).unwrap_or_else(|| UNKNOWN_QUERY.to_string());
        let synthesis_prompt = build_synthesis_prompt(&user_query, &responses);

        let synthesizer = ModelSpec {
            provider: req.provider,
            model: req.model,
        };

        // Synthesis does not reuse the conversation history; the constructed
        // prompt is the sole user message. A failure here is a hard error —
        // there is nothing left to fall back on.
        let synth_req = GenerationRequest {
            spec: synthesizer.clone(),
            messages: vec![ChatMessage::user(synthesis_prompt)],
            deadline: Instant::now() + self.call_timeout,
            cancellation_token: req.cancellation_token,
        };
        self.client
            .generate(synth_req)
            .await
            .map_err(|e| ConsensusError::Synthesis {
                synthesizer: synthesizer.to_string(),
                message: e.user_message(),
            })
    }
}

#[async_trait]
impl WorkflowHandler for ConsensusWorkflow {
    async fn handle(&self, req: ChatWorkflowRequest) -> Result<TokenStream, ConsensusError> {
        self.run(req).await
    }
}

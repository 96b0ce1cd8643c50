use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::task::{Id as TaskId, JoinSet};

use crate::error::ConsensusError;
use crate::message::ChatMessage;
use crate::providers::{GenerationRequest, ModelClient, ModelSpec, drain};

/// Outcome of one participant's generation call.
#[derive(Debug)]
pub struct ParticipantOutcome {
    pub spec: ModelSpec,
    pub result: Result<String, ConsensusError>,
}

/// Fan one message sequence out to every participant and wait for all of them
/// to settle. Nothing is short-circuited: a failing participant never cancels
/// its siblings, and failures come back as outcomes rather than propagating.
///
/// Outcomes land in slots indexed by the caller's model order, so the returned
/// sequence is deterministic with respect to the input regardless of
/// completion order. Each participant's stream is fully drained here; no
/// partial tokens are forwarded during the fan-out phase.
pub async fn query_participants(
    client: Arc<dyn ModelClient>,
    messages: &[ChatMessage],
    models: &[ModelSpec],
    deadline: Instant,
) -> Vec<ParticipantOutcome> {
    let mut set = JoinSet::new();

    // Track task ID → slot index for panic attribution
    let mut task_slots: HashMap<TaskId, usize> = HashMap::new();

    for (index, spec) in models.iter().enumerate() {
        let client = client.clone();
        let spec = spec.clone();
        let messages = messages.to_vec();
        let handle = set.spawn(async move {
            let request = GenerationRequest {
                spec: spec.clone(),
                messages,
                deadline,
                cancellation_token: None,
            };
            let result = match client.generate(request).await {
                Ok(stream) => drain(&spec, stream).await,
                Err(e) => Err(e),
            };
            (index, result)
        });
        task_slots.insert(handle.id(), index);
    }

    let mut slots: Vec<Option<Result<String, ConsensusError>>> = Vec::with_capacity(models.len());
    slots.resize_with(models.len(), || None);

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, result)) => slots[index] = Some(result),
            Err(join_err) => {
                tracing::error!("participant task failed to join: {join_err}");
                if let Some(&index) = task_slots.get(&join_err.id()) {
                    slots[index] =
                        Some(Err(ConsensusError::Other(format!("task panicked: {join_err}"))));
                }
            }
        }
    }

    models
        .iter()
        .zip(slots)
        .map(|(spec, slot)| {
            let result = slot
                .unwrap_or_else(|| Err(ConsensusError::Other("task never settled".to_string())));
            if let Err(ref e) = result {
                tracing::warn!(model = %spec, "participant failed: {e}");
            }
            ParticipantOutcome {
                spec: spec.clone(),
                result,
            }
        })
        .collect()
}

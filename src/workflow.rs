use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::error::ConsensusError;
use crate::message::ChatMessage;
use crate::providers::{ModelSpec, TokenStream};

pub const CONSENSUS_WORKFLOW_ID: &str = "consensus";

/// Inbound chat request as handed over by the HTTP boundary once a workflow
/// id matched. `provider`/`model` designate the synthesizer.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatWorkflowRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub tool_config: ToolConfig,
    pub system_context: Option<String>,
    pub provider: String,
    pub model: String,
    /// Set by the boundary after parsing; fires when the client disconnects.
    #[serde(skip)]
    pub cancellation_token: Option<CancellationToken>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ToolConfig {
    #[serde(default)]
    pub models: Vec<ModelSpec>,
}

/// A workflow pipeline invocable by id. Returns a token stream the boundary
/// relays with the same wire format as plain chat.
#[async_trait]
pub trait WorkflowHandler: Send + Sync {
    async fn handle(&self, req: ChatWorkflowRequest) -> Result<TokenStream, ConsensusError>;
}

/// Workflow id → handler table. Built once at process startup, immutable
/// thereafter; `resolve(None)` and unknown ids mean the caller falls through
/// to the plain single-model chat path.
pub struct WorkflowRegistry {
    handlers: HashMap<String, Arc<dyn WorkflowHandler>>,
}

impl WorkflowRegistry {
    pub fn builder() -> WorkflowRegistryBuilder {
        WorkflowRegistryBuilder {
            handlers: HashMap::new(),
        }
    }

    pub fn resolve(&self, workflow_id: Option<&str>) -> Option<Arc<dyn WorkflowHandler>> {
        self.handlers.get(workflow_id?).cloned()
    }

    /// Registered workflow ids, sorted for stable display.
    pub fn workflow_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

pub struct WorkflowRegistryBuilder {
    handlers: HashMap<String, Arc<dyn WorkflowHandler>>,
}

impl WorkflowRegistryBuilder {
    /// Register a handler under an id. Registering the same id twice replaces
    /// the earlier handler.
    pub fn register(mut self, id: impl Into<String>, handler: Arc<dyn WorkflowHandler>) -> Self {
        self.handlers.insert(id.into(), handler);
        self
    }

    pub fn build(self) -> WorkflowRegistry {
        WorkflowRegistry {
            handlers: self.handlers,
        }
    }
}

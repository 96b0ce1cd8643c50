use std::env;
use std::sync::Arc;

use anyhow::Context;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

use feather_consensus::config::Config;
use feather_consensus::consensus::ConsensusWorkflow;
use feather_consensus::message::ChatMessage;
use feather_consensus::providers::{ModelSpec, ProviderAdapter};
use feather_consensus::relay::relay_data_stream;
use feather_consensus::workflow::{
    CONSENSUS_WORKFLOW_ID, ChatWorkflowRequest, ToolConfig, WorkflowHandler, WorkflowRegistry,
};

/// Dev runner: one consensus turn from the command line, wire frames to
/// stdout. `FEATHER_MODELS` lists the participants, `FEATHER_SYNTHESIZER`
/// the merge model, both as comma-separated `provider:model` pairs.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    dotenvy::dotenv().ok();

    tracing::info!("feather-consensus starting");

    let config = Config::from_env();
    let adapter = Arc::new(ProviderAdapter::new(config.providers));
    tracing::info!(
        "providers configured: {}",
        adapter.configured_providers().join(", ")
    );
    let registry = WorkflowRegistry::builder()
        .register(
            CONSENSUS_WORKFLOW_ID,
            Arc::new(ConsensusWorkflow::new(adapter)),
        )
        .build();

    let models = env::var("FEATHER_MODELS")
        .context("FEATHER_MODELS must list at least two provider:model pairs, comma separated")?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<ModelSpec>())
        .collect::<Result<Vec<ModelSpec>, _>>()
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    let synthesizer: ModelSpec = env::var("FEATHER_SYNTHESIZER")
        .context("FEATHER_SYNTHESIZER must name a provider:model pair")?
        .parse()
        .map_err(|e: feather_consensus::error::ConsensusError| {
            anyhow::anyhow!(e.user_message())
        })?;

    let prompt: String = env::args().skip(1).collect::<Vec<String>>().join(" ");
    if prompt.trim().is_empty() {
        anyhow::bail!("usage: feather-consensus <prompt>");
    }

    let handler = registry
        .resolve(Some(CONSENSUS_WORKFLOW_ID))
        .context("consensus workflow not registered")?;

    let request = ChatWorkflowRequest {
        messages: vec![ChatMessage::user(prompt)],
        tool_config: ToolConfig { models },
        system_context: None,
        provider: synthesizer.provider,
        model: synthesizer.model,
        cancellation_token: None,
    };

    let tokens = handler
        .handle(request)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    let wire = relay_data_stream(tokens);
    tokio::pin!(wire);
    let mut stdout = tokio::io::stdout();
    while let Some(frame) = wire.next().await {
        stdout.write_all(frame.as_bytes()).await?;
    }
    stdout.flush().await?;

    tracing::info!("feather-consensus done");
    Ok(())
}

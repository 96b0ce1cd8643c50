use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("provider not configured: {provider}")]
    ProviderNotConfigured { provider: String },

    #[error("timeout after {0}ms")]
    Timeout(u64),

    #[error("rate limited by {provider}")]
    RateLimited { provider: String },

    #[error("auth failed for {provider}: {message}")]
    AuthFailed { provider: String, message: String },

    #[error("upstream error from {provider}: {message}")]
    Upstream {
        provider: String,
        message: String,
        status: Option<u16>,
    },

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("all {attempted} models failed to respond")]
    AllModelsFailed { attempted: usize },

    #[error("synthesis failed for {synthesizer}: {message}")]
    Synthesis {
        synthesizer: String,
        message: String,
    },

    #[error("{0}")]
    Other(String),
}

impl ConsensusError {
    /// True for errors caused by the inbound request itself rather than by
    /// provider calls. The boundary layer maps these to HTTP 400; everything
    /// else surfaces as a 500-class failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::ProviderNotConfigured { .. }
        )
    }

    /// Produce a sanitized error message safe for returning to clients.
    /// Does not leak internal URLs, connection details, or raw upstream bodies.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::ProviderNotConfigured { provider } => {
                format!(
                    "provider \"{provider}\" not configured — check server environment variables"
                )
            }
            Self::Timeout(ms) => format!("request timed out after {ms}ms"),
            Self::RateLimited { provider } => {
                format!("rate limited by {provider} — try again shortly")
            }
            Self::AuthFailed { provider, message } => {
                format!("authentication failed for {provider}: {message}")
            }
            Self::Upstream {
                provider, message, ..
            } => {
                format!("upstream error from {provider}: {message}")
            }
            Self::Request(_) => "request to provider failed".to_string(),
            Self::AllModelsFailed { .. } => "all models failed to respond".to_string(),
            Self::Synthesis {
                synthesizer,
                message,
            } => format!("synthesis failed for {synthesizer}: {message}"),
            Self::Other(msg) => msg.clone(),
        }
    }
}

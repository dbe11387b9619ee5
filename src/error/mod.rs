//! Error types for baton.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion};

use thiserror::Error;

use crate::toon::ToonError;

/// Primary error type for all baton operations.
#[derive(Error, Debug)]
pub enum BatonError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOON error: {0}")]
    Toon(#[from] ToonError),

    #[error("Provider error: {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("Model invocation failed for agent '{agent}': {source}")]
    ModelInvocation {
        agent: String,
        #[source]
        source: Box<BatonError>,
    },

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Tool call '{tool_name}' rejected: {reason}")]
    ApprovalRejected { tool_name: String, reason: String },

    #[error("Guardrail '{guardrail}' tripped: {message}")]
    GuardrailTripwire { guardrail: String, message: String },

    #[error("Maximum turns exceeded ({max_turns})")]
    MaxTurnsExceeded { max_turns: usize },

    #[error("Maximum transfers exceeded ({max_transfers})")]
    MaxTransfersExceeded { max_transfers: usize },

    #[error("Agent '{agent}' cannot transfer to unknown target '{target}'")]
    UnknownTransferTarget { agent: String, target: String },

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Agent already registered: {0}")]
    DuplicateAgent(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Run canceled")]
    Canceled,

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl BatonError {
    /// Create a provider error.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a tool execution error.
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Wrap a provider failure with the agent whose turn it ended.
    pub fn model_invocation(agent: impl Into<String>, source: BatonError) -> Self {
        Self::ModelInvocation {
            agent: agent.into(),
            source: Box::new(source),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) | Self::ConfigParse(_) | Self::Io(_) => {
                ErrorCategory::Configuration
            }
            Self::Serialization(_) | Self::Toon(_) => ErrorCategory::Serialization,
            Self::Provider { .. } | Self::ModelInvocation { .. } => ErrorCategory::ModelInvocation,
            Self::ToolExecution { .. } | Self::InvalidArgument(_) => ErrorCategory::ToolExecution,
            Self::ApprovalRejected { .. } => ErrorCategory::Approval,
            Self::GuardrailTripwire { .. } => ErrorCategory::Guardrail,
            Self::MaxTurnsExceeded { .. } | Self::MaxTransfersExceeded { .. } => {
                ErrorCategory::Limit
            }
            Self::UnknownTransferTarget { .. } | Self::UnknownAgent(_) | Self::DuplicateAgent(_) => {
                ErrorCategory::AgentGraph
            }
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Canceled => ErrorCategory::Canceled,
            Self::InvalidState(_) => ErrorCategory::State,
        }
    }

    /// Whether this error ends a run.
    ///
    /// Tool failures and approval rejections are fed back to the model as
    /// tool results instead.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self.category(),
            ErrorCategory::ToolExecution | ErrorCategory::Approval
        )
    }

    /// Whether this error is potentially retryable by the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ModelInvocation { source, .. } => source.is_retryable(),
            Self::Provider { .. } | Self::Timeout(_) => true,
            _ => false,
        }
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::ModelInvocation => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Timeout => RecoverySuggestion::IncreaseTimeout,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::ToolExecution => RecoverySuggestion::CheckToolImplementation,
            ErrorCategory::Guardrail => RecoverySuggestion::ReviseInput,
            ErrorCategory::Limit => RecoverySuggestion::IncreaseTurnLimit,
            ErrorCategory::AgentGraph => RecoverySuggestion::CheckAgentGraph,
            ErrorCategory::Approval => RecoverySuggestion::ReviewApproval,
            _ => RecoverySuggestion::None,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, BatonError>;

//! Error classification and recovery hints.

use serde::{Deserialize, Serialize};

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Configuration,
    Serialization,
    ModelInvocation,
    ToolExecution,
    Approval,
    Guardrail,
    Limit,
    AgentGraph,
    Timeout,
    Canceled,
    State,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoverySuggestion {
    RetryWithBackoff,
    CheckConfiguration,
    IncreaseTimeout,
    IncreaseTurnLimit,
    CheckAgentGraph,
    CheckToolImplementation,
    ReviseInput,
    ReviewApproval,
    None,
}

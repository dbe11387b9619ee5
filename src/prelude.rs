//! Convenience re-exports for common use.

pub use crate::agent::{Agent, AgentRegistry};
pub use crate::agent_loop::{
    approval_handler, ApprovalDecision, ApprovalRequest, RunEvent, RunFailure, RunOptions,
    RunOutcome, RunResult, RunState, Runner,
};
pub use crate::config::BatonConfig;
pub use crate::context::SharedContext;
pub use crate::error::{BatonError, Result};
pub use crate::guardrail::{
    FnGuardrail, Guardrail, GuardrailKind, GuardrailOutcome, GuardrailPolicy, MaxLengthGuardrail,
    RegexGuardrail,
};
pub use crate::provider::{ModelProvider, ProviderRequest, ProviderResponse};
pub use crate::session::{InMemorySession, Session};
pub use crate::tools::{FunctionTool, Tool, ToolArguments, ToolExecutionContext, ToolParameters};
pub use crate::transfer::{InputFilter, Transfer};
pub use crate::types::{AgentToolCall, AgentToolResult, ModelMessage, Role, Usage};

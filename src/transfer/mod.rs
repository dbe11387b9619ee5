//! Agent-to-agent transfers.
//!
//! Every transfer target of the active agent is offered to the model as a
//! synthetic tool named `transfer_to_<agent>`. Calling it moves control to
//! that agent at the end of the turn.

pub mod filter;

pub use filter::{FilterFn, InputFilter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::error::{BatonError, Result};
use crate::provider::ToolDefinition;
use crate::types::{AgentToolCall, AgentToolResult};

/// Prefix shared by all synthetic transfer tools.
pub const TRANSFER_TOOL_PREFIX: &str = "transfer_to_";

/// A transfer target declared on an agent.
#[derive(Debug, Clone)]
pub struct Transfer {
    /// Registered name of the receiving agent.
    pub target: String,
    tool_name: Option<String>,
    description: Option<String>,
    input_filter: Option<InputFilter>,
}

impl Transfer {
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            tool_name: None,
            description: None,
            input_filter: None,
        }
    }

    /// Override the synthetic tool name.
    pub fn with_tool_name(mut self, name: impl Into<String>) -> Self {
        self.tool_name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Filter applied to the history before the target's first turn.
    pub fn with_input_filter(mut self, filter: InputFilter) -> Self {
        self.input_filter = Some(filter);
        self
    }

    pub fn input_filter(&self) -> Option<&InputFilter> {
        self.input_filter.as_ref()
    }

    pub fn tool_name(&self) -> String {
        self.tool_name
            .clone()
            .unwrap_or_else(|| default_tool_name(&self.target))
    }

    /// Schema offered to the model.
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.tool_name(),
            description: self.description.clone().unwrap_or_else(|| {
                format!(
                    "Transfer the conversation to the {} agent.",
                    self.target
                )
            }),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "reason": {
                        "type": "string",
                        "description": "Why the conversation is being transferred",
                    },
                },
                "required": [],
            }),
        }
    }
}

/// One handoff in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub from: String,
    pub to: String,
    /// Turn whose response requested the transfer (1-based).
    pub turn: usize,
    pub call_id: String,
    pub at: DateTime<Utc>,
}

/// `transfer_to_` followed by the agent name in snake case.
pub fn default_tool_name(agent: &str) -> String {
    let mut name = String::with_capacity(TRANSFER_TOOL_PREFIX.len() + agent.len());
    name.push_str(TRANSFER_TOOL_PREFIX);
    let mut last_underscore = true;
    for c in agent.chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c.to_ascii_lowercase());
            last_underscore = false;
        } else if !last_underscore {
            name.push('_');
            last_underscore = true;
        }
    }
    while name.ends_with('_') && name.len() > TRANSFER_TOOL_PREFIX.len() {
        name.pop();
    }
    name
}

/// Whether `call` asks the active agent to hand off control.
///
/// Declared transfer tools always count. Other `transfer_to_*` names count
/// unless the agent has a regular tool by that name, so a hallucinated
/// target is reported instead of being treated as a missing tool.
pub fn is_transfer_call(agent: &Agent, call: &AgentToolCall) -> bool {
    agent.transfers.iter().any(|t| t.tool_name() == call.name)
        || (call.name.starts_with(TRANSFER_TOOL_PREFIX) && !agent.tools.contains(&call.name))
}

/// Find the declared transfer named by `call`.
pub fn resolve<'a>(agent: &'a Agent, call: &AgentToolCall) -> Result<&'a Transfer> {
    agent
        .transfers
        .iter()
        .find(|t| t.tool_name() == call.name)
        .ok_or_else(|| BatonError::UnknownTransferTarget {
            agent: agent.name.clone(),
            target: call
                .name
                .strip_prefix(TRANSFER_TOOL_PREFIX)
                .unwrap_or(&call.name)
                .to_string(),
        })
}

/// Tool result recorded for an honoured transfer call.
pub fn accepted_result(call: &AgentToolCall, target: &str) -> AgentToolResult {
    AgentToolResult::success(call.id.clone(), serde_json::json!({ "assistant": target }))
}

/// Tool result for extra transfer calls in the same turn.
pub fn ignored_result(call: &AgentToolCall, honoured: &str) -> AgentToolResult {
    AgentToolResult::error(
        call.id.clone(),
        format!("Only one transfer per turn is honoured; control already moved to '{honoured}'"),
    )
}

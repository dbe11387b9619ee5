//! Results returned by a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::BatonError;
use crate::transfer::TransferRecord;
use crate::types::{AgentToolCall, AgentToolResult, ModelMessage, Usage};
use crate::util::UsageAggregator;

use super::state::RunState;

/// Unique identifier for a run.
pub type RunId = Uuid;

/// One model invocation and what it led to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStep {
    /// Turn number (1-based, counts every model invocation).
    pub turn: usize,
    pub agent: String,
    /// Assistant text produced in this turn.
    pub output_text: String,
    pub tool_calls: Vec<AgentToolCall>,
    /// Results in request order, with structured payloads.
    pub tool_results: Vec<AgentToolResult>,
    pub usage: Usage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer: Option<TransferRecord>,
}

/// Diagnostics accumulated across a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Agent the run started with.
    pub initial_agent: String,
    pub transfers: Vec<TransferRecord>,
    pub usage: UsageAggregator,
    /// Model invocations made.
    pub turns: usize,
    pub guardrail_retries: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunMetadata {
    /// Agent names in the order they held control, starting with the initial agent.
    pub fn handoff_chain(&self) -> Vec<String> {
        std::iter::once(self.initial_agent.clone())
            .chain(self.transfers.iter().map(|record| record.to.clone()))
            .collect()
    }
}

/// Final result of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: RunId,
    /// Text of the accepted final answer.
    pub output: String,
    /// Agent that produced the final answer.
    pub final_agent: String,
    pub steps: Vec<RunStep>,
    /// User input and every message generated during the run.
    pub messages: Vec<ModelMessage>,
    /// History as the final agent saw it, after any transfer filters.
    pub history: Vec<ModelMessage>,
    pub metadata: RunMetadata,
}

impl RunResult {
    /// The output parsed as JSON, when the final answer is structured.
    pub fn output_json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(self.output.trim()).ok()
    }

    pub fn usage(&self) -> &Usage {
        self.metadata.usage.total()
    }
}

/// What a call to `run` or `resume` produced.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(RunResult),
    /// Stopped at an approval gate. Resume with the state and decisions.
    Suspended(Box<RunState>),
}

impl RunOutcome {
    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspended(_))
    }

    pub fn result(&self) -> Option<&RunResult> {
        match self {
            Self::Completed(result) => Some(result),
            Self::Suspended(_) => None,
        }
    }

    pub fn into_result(self) -> Option<RunResult> {
        match self {
            Self::Completed(result) => Some(result),
            Self::Suspended(_) => None,
        }
    }

    pub fn into_state(self) -> Option<RunState> {
        match self {
            Self::Completed(_) => None,
            Self::Suspended(state) => Some(*state),
        }
    }
}

/// A run that ended in `Failed`, with everything accumulated before the failure.
#[derive(Debug, Error)]
#[error("run {run_id} failed in agent '{agent}': {error}")]
pub struct RunFailure {
    #[source]
    pub error: BatonError,
    pub run_id: RunId,
    /// Agent active when the run failed.
    pub agent: String,
    pub transcript: Vec<ModelMessage>,
    pub steps: Vec<RunStep>,
    pub metadata: RunMetadata,
}

impl RunFailure {
    /// A failure with nothing accumulated, for runs that never started.
    pub fn bare(run_id: RunId, agent: impl Into<String>, error: BatonError) -> Self {
        let agent = agent.into();
        let now = Utc::now();
        Self {
            error,
            run_id,
            metadata: RunMetadata {
                initial_agent: agent.clone(),
                transfers: Vec::new(),
                usage: UsageAggregator::new(),
                turns: 0,
                guardrail_retries: 0,
                started_at: now,
                finished_at: now,
            },
            agent,
            transcript: Vec::new(),
            steps: Vec::new(),
        }
    }
}

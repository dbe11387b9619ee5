//! Serializable run state.
//!
//! The run loop keeps all of its progress in a [`RunState`]. When a tool
//! call needs approval the loop stops and hands the state back to the
//! caller; [`Runner::resume`](super::Runner::resume) picks it up again at the
//! same step, in this process or another one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::{BatonError, Result};
use crate::transfer::TransferRecord;
use crate::types::{AgentToolCall, ModelMessage, Usage};
use crate::util::UsageAggregator;

use super::approvals::{ApprovalDecision, PendingApproval};
use super::types::{RunId, RunMetadata, RunStep};

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunStatus {
    Running,
    AwaitingApproval,
    Completed,
    Failed,
}

/// A tool batch interrupted by an approval gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingBatch {
    pub turn: usize,
    pub agent: String,
    pub assistant_text: String,
    /// Every call the model requested in that turn, transfers included.
    pub calls: Vec<AgentToolCall>,
    /// Calls that needed approval, with their current status.
    pub approvals: Vec<PendingApproval>,
    /// Usage reported by the invocation that produced the batch.
    pub usage: Usage,
}

/// Snapshot of a run, produced only when the run is suspended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: RunId,
    pub status: RunStatus,
    pub initial_agent: String,
    pub active_agent: String,
    /// Raw user input the run started with.
    pub input: String,
    /// Messages the active agent sees, after transfer filters.
    pub history: Vec<ModelMessage>,
    /// User input and every generated message, never filtered.
    pub transcript: Vec<ModelMessage>,
    /// Shared context value at suspension.
    pub context: serde_json::Value,
    /// Model invocations made so far.
    pub step: usize,
    pub max_turns: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingBatch>,
    pub usage: UsageAggregator,
    pub transfers: Vec<TransferRecord>,
    pub steps: Vec<RunStep>,
    pub guardrail_retries: usize,
    pub started_at: DateTime<Utc>,
}

impl RunState {
    pub(crate) fn new(
        run_id: RunId,
        agent: &str,
        input: String,
        prior_history: Vec<ModelMessage>,
        context: serde_json::Value,
        max_turns: usize,
    ) -> Self {
        Self {
            run_id,
            status: RunStatus::Running,
            initial_agent: agent.to_string(),
            active_agent: agent.to_string(),
            input,
            history: prior_history,
            transcript: Vec::new(),
            context,
            step: 0,
            max_turns,
            pending: None,
            usage: UsageAggregator::new(),
            transfers: Vec::new(),
            steps: Vec::new(),
            guardrail_retries: 0,
            started_at: Utc::now(),
        }
    }

    /// Append to both the visible history and the transcript.
    pub(crate) fn push(&mut self, message: ModelMessage) {
        self.transcript.push(message.clone());
        self.history.push(message);
    }

    pub fn is_suspended(&self) -> bool {
        self.status == RunStatus::AwaitingApproval
    }

    /// Gated calls that still need a decision.
    pub fn pending_approvals(&self) -> Vec<&PendingApproval> {
        self.pending
            .iter()
            .flat_map(|batch| batch.approvals.iter())
            .filter(|approval| approval.status.is_pending())
            .collect()
    }

    pub fn approve(&mut self, call_id: &str) -> Result<()> {
        self.decide(call_id, ApprovalDecision::Approve)
    }

    pub fn reject(&mut self, call_id: &str, reason: impl Into<String>) -> Result<()> {
        self.decide(call_id, ApprovalDecision::reject(reason))
    }

    /// Record a decision for one gated call.
    pub fn decide(&mut self, call_id: &str, decision: ApprovalDecision) -> Result<()> {
        let approval = self
            .pending
            .as_mut()
            .and_then(|batch| batch.approvals.iter_mut().find(|a| a.call_id == call_id))
            .ok_or_else(|| {
                BatonError::InvalidState(format!("no approval is pending for call '{call_id}'"))
            })?;
        approval.status = decision.into();
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub(crate) fn metadata(&self) -> RunMetadata {
        RunMetadata {
            initial_agent: self.initial_agent.clone(),
            transfers: self.transfers.clone(),
            usage: self.usage.clone(),
            turns: self.step,
            guardrail_retries: self.guardrail_retries,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

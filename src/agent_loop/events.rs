//! Run event stream types.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::guardrail::GuardrailFailure;
use crate::transfer::TransferRecord;
use crate::types::{AgentToolCall, AgentToolResult};

use super::approvals::ApprovalRequest;
use super::types::RunId;

/// Callback used for streaming run events.
pub type RunEventSink = Arc<dyn Fn(RunEvent) + Send + Sync>;

/// Stream category for events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunEventStream {
    Lifecycle,
    Assistant,
    Tool,
    Approval,
    Transfer,
    Guardrail,
}

/// Run lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunLifecycle {
    Started,
    Resumed,
    Suspended { pending: usize },
    Completed,
    Failed { error: String },
}

/// Concrete event payloads emitted by the run loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEventPayload {
    Lifecycle {
        state: RunLifecycle,
    },
    TurnStarted {
        agent: String,
        turn: usize,
    },
    AssistantDelta {
        text: String,
    },
    ToolCallStarted {
        call: AgentToolCall,
    },
    ToolResult {
        result: AgentToolResult,
    },
    ApprovalRequired {
        request: ApprovalRequest,
    },
    Transferred {
        record: TransferRecord,
    },
    GuardrailFailed {
        failure: GuardrailFailure,
    },
}

/// Envelope for streaming run events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    pub run_id: RunId,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub stream: RunEventStream,
    pub payload: RunEventPayload,
}

pub(crate) struct RunEventEmitter {
    run_id: RunId,
    seq: AtomicU64,
    sink: Option<RunEventSink>,
}

impl RunEventEmitter {
    pub(crate) fn new(run_id: RunId, sink: Option<RunEventSink>) -> Self {
        Self {
            run_id,
            seq: AtomicU64::new(1),
            sink,
        }
    }

    pub(crate) fn emit(&self, stream: RunEventStream, payload: RunEventPayload) {
        let Some(sink) = self.sink.as_ref() else {
            return;
        };
        sink(RunEvent {
            run_id: self.run_id,
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            timestamp: Utc::now(),
            stream,
            payload,
        });
    }

    pub(crate) fn lifecycle(&self, state: RunLifecycle) {
        self.emit(RunEventStream::Lifecycle, RunEventPayload::Lifecycle { state });
    }
}

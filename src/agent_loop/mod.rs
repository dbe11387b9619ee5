//! The run loop: turns, tool dispatch, transfers, guardrails and approvals.

pub mod approvals;
pub mod events;
pub mod runner;
pub mod state;
pub mod types;

pub use approvals::{
    approval_handler, ApprovalDecision, ApprovalHandler, ApprovalRequest, ApprovalStatus,
    PendingApproval,
};
pub use events::{RunEvent, RunEventPayload, RunEventSink, RunEventStream, RunLifecycle};
pub use runner::{RunHandle, RunOptions, Runner};
pub use state::{PendingBatch, RunState, RunStatus};
pub use types::{RunFailure, RunId, RunMetadata, RunOutcome, RunResult, RunStep};

//! Tool dispatcher: approval gating and concurrent execution of one batch.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::future::BoxFuture;
use futures::{stream, FutureExt, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::agent::Agent;
use crate::config::ToonConfig;
use crate::context::SharedContext;
use crate::error::BatonError;
use crate::toon;
use crate::tools::{ToolArguments, ToolExecutionContext};
use crate::types::{AgentToolCall, AgentToolResult, PayloadEncoding};

use super::super::approvals::{
    ApprovalHandler, ApprovalRequest, ApprovalStatus, PendingApproval, DEFAULT_REJECTION_REASON,
};
use super::super::events::{RunEventEmitter, RunEventPayload, RunEventStream};

/// What happens to one call of the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Gate {
    Execute,
    Rejected(String),
    Pending,
}

/// Gate decisions for a batch plus the approval records to keep.
#[derive(Debug, Default)]
pub(super) struct GatedBatch {
    pub(super) gates: Vec<Gate>,
    pub(super) approvals: Vec<PendingApproval>,
}

impl GatedBatch {
    pub(super) fn has_pending(&self) -> bool {
        self.gates.iter().any(|gate| *gate == Gate::Pending)
    }
}

/// Evaluate approval requirements for every call before anything runs.
///
/// `prior` holds decisions recorded while the batch was suspended. Calls
/// without a prior decision go to `handler`; with no handler they stay
/// pending.
pub(super) async fn gate_calls(
    agent: &Agent,
    calls: &[AgentToolCall],
    prior: &[PendingApproval],
    handler: Option<&ApprovalHandler>,
    ctx: &SharedContext,
) -> GatedBatch {
    let mut batch = GatedBatch::default();

    for call in calls {
        let Some(tool) = agent.tools.get(&call.name) else {
            batch.gates.push(Gate::Execute);
            continue;
        };
        let Ok(args) = ToolArguments::parse(&call.arguments) else {
            batch.gates.push(Gate::Execute);
            continue;
        };
        if !tool.needs_approval(&args, ctx) {
            batch.gates.push(Gate::Execute);
            continue;
        }

        let previous = prior
            .iter()
            .find(|approval| approval.call_id == call.id)
            .map(|approval| approval.status.clone());
        let status = match previous {
            Some(status) if !status.is_pending() => status,
            _ => match handler {
                Some(handler) => {
                    let request = approval_request(agent, call, ctx);
                    ApprovalStatus::from(handler(request).await)
                }
                None => ApprovalStatus::Pending,
            },
        };

        tracing::debug!(
            tool = %call.name,
            call_id = %call.id,
            status = ?status,
            "approval evaluated"
        );

        batch.gates.push(match &status {
            ApprovalStatus::Approved => Gate::Execute,
            ApprovalStatus::Rejected { reason } => Gate::Rejected(reason.clone()),
            ApprovalStatus::Pending => Gate::Pending,
        });
        batch.approvals.push(PendingApproval {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            arguments: call.arguments.clone(),
            status,
        });
    }

    batch
}

pub(super) fn approval_request(
    agent: &Agent,
    call: &AgentToolCall,
    ctx: &SharedContext,
) -> ApprovalRequest {
    ApprovalRequest {
        call_id: call.id.clone(),
        tool_name: call.name.clone(),
        arguments: call.arguments.clone(),
        agent: agent.name.clone(),
        context: ctx.snapshot(),
    }
}

pub(super) fn rejected_tool_result(call: &AgentToolCall, reason: &str) -> AgentToolResult {
    let reason = if reason.trim().is_empty() {
        DEFAULT_REJECTION_REASON
    } else {
        reason
    };
    let error = BatonError::ApprovalRejected {
        tool_name: call.name.clone(),
        reason: reason.to_string(),
    };
    AgentToolResult::error(call.id.clone(), error.to_string())
}

/// Execute the gated calls concurrently; results come back in request order.
///
/// `limit` caps how many tool bodies run at once.
pub(super) async fn execute_batch(
    agent: &Agent,
    calls: &[AgentToolCall],
    gates: &[Gate],
    ctx: &SharedContext,
    cancel: &CancellationToken,
    limit: Option<usize>,
    emitter: &RunEventEmitter,
) -> Vec<AgentToolResult> {
    let limit = limit.unwrap_or(calls.len()).max(1);
    let mut futures: Vec<BoxFuture<'_, AgentToolResult>> = Vec::with_capacity(calls.len());
    for (call, gate) in calls.iter().zip(gates) {
        let cancel = cancel.child_token();
        futures.push(Box::pin(async move {
            match gate {
                Gate::Execute => execute_tool_call(agent, call, ctx, cancel, emitter).await,
                Gate::Rejected(reason) => rejected_tool_result(call, reason),
                Gate::Pending => AgentToolResult::error(call.id.clone(), "approval pending"),
            }
        }));
    }
    stream::iter(futures).buffered(limit).collect().await
}

pub(super) async fn execute_tool_call(
    agent: &Agent,
    call: &AgentToolCall,
    ctx: &SharedContext,
    cancel: CancellationToken,
    emitter: &RunEventEmitter,
) -> AgentToolResult {
    emitter.emit(
        RunEventStream::Tool,
        RunEventPayload::ToolCallStarted { call: call.clone() },
    );

    let Some(tool) = agent.tools.get(&call.name) else {
        return AgentToolResult::error(call.id.clone(), format!("Tool '{}' not found", call.name));
    };

    let args = match ToolArguments::parse(&call.arguments) {
        Ok(args) => args,
        Err(err) => {
            let detail = match err {
                BatonError::InvalidArgument(message) => message,
                other => other.to_string(),
            };
            return AgentToolResult::error(
                call.id.clone(),
                format!("Argument validation failed: {detail}"),
            );
        }
    };
    if let Err(validation_error) = tool.validate(args.raw()) {
        return AgentToolResult::error(
            call.id.clone(),
            format!("Argument validation failed: {validation_error}"),
        );
    }

    let exec_ctx = ToolExecutionContext {
        call_id: call.id.clone(),
        tool_name: call.name.clone(),
        agent_name: agent.name.clone(),
        shared: ctx.clone(),
        cancel,
    };

    match AssertUnwindSafe(tool.execute(&args, &exec_ctx))
        .catch_unwind()
        .await
    {
        Ok(Ok(value)) => AgentToolResult::success(call.id.clone(), value),
        Ok(Err(error)) => {
            tracing::debug!(tool = %call.name, call_id = %call.id, error = %error, "tool failed");
            AgentToolResult::error(call.id.clone(), error.to_string())
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::warn!(tool = %call.name, call_id = %call.id, panic = %message, "tool panicked");
            AgentToolResult::error(
                call.id.clone(),
                format!("Tool '{}' panicked: {message}", call.name),
            )
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// The copy of a result placed in history, TOON-compacted when it pays off.
pub(super) fn history_copy(result: &AgentToolResult, config: &ToonConfig) -> AgentToolResult {
    if !config.enabled || result.is_error || result.encoding == PayloadEncoding::Toon {
        return result.clone();
    }
    match toon::compact(&result.result, config.min_chars) {
        Some(document) => AgentToolResult {
            tool_call_id: result.tool_call_id.clone(),
            result: serde_json::Value::String(document),
            is_error: false,
            encoding: PayloadEncoding::Toon,
        },
        None => result.clone(),
    }
}

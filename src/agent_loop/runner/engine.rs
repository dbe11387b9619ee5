//! The run loop state machine.
//!
//! Input guardrails, then turns until a final answer passes the output
//! guardrails. Each turn is one model invocation; a tool batch is gated,
//! executed and appended to history before the next turn starts, and a
//! transfer switches the active agent between turns. All progress lives in
//! the [`RunState`], so the loop can stop at an approval gate and pick up
//! again from the stored batch.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::agent::{Agent, AgentRegistry};
use crate::config::BatonConfig;
use crate::context::SharedContext;
use crate::error::{BatonError, Result};
use crate::guardrail::{enforce, Guardrail, GuardrailFailure, GuardrailKind, GuardrailVerdict};
use crate::provider::ModelProvider;
use crate::transfer::{self, Transfer, TransferRecord};
use crate::types::{AgentToolCall, AgentToolResult, ModelMessage, Usage};

use super::super::approvals::ApprovalRequest;
use super::super::events::{RunEventEmitter, RunEventPayload, RunEventStream, RunLifecycle};
use super::super::state::{PendingBatch, RunState, RunStatus};
use super::super::types::RunStep;
use super::dispatch;
use super::turn::{self, TurnOutcome};
use super::RunOptions;

/// How the loop stopped without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Flow {
    Completed(String),
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchOutcome {
    Continue,
    Suspended,
}

pub(super) struct Engine<'a> {
    pub(super) provider: &'a dyn ModelProvider,
    pub(super) agents: &'a AgentRegistry,
    pub(super) config: &'a BatonConfig,
    pub(super) options: &'a RunOptions,
    pub(super) emitter: &'a RunEventEmitter,
    pub(super) ctx: SharedContext,
    pub(super) cancel: CancellationToken,
}

impl Engine<'_> {
    /// Fresh run: input guardrails, then the turn loop.
    pub(super) async fn start(&self, state: &mut RunState) -> Result<Flow> {
        let agent = self.agents.get(&state.active_agent)?;
        let input = state.input.clone();
        state.push(ModelMessage::user(input.clone()));

        match enforce(&self.guardrails(agent), GuardrailKind::Input, &input, &self.ctx).await {
            GuardrailVerdict::Passed => {}
            GuardrailVerdict::Tripwire(failure) => {
                self.report_guardrail(&failure);
                return Err(failure.into_error());
            }
            GuardrailVerdict::Retry { feedback, failures } => {
                // Input cannot be regenerated; the note travels with it instead.
                failures.iter().for_each(|f| self.report_guardrail(f));
                state.push(ModelMessage::user(feedback));
            }
        }

        self.drive(state).await
    }

    /// Suspended run: replay the stored batch, then continue the turn loop.
    pub(super) async fn resume(&self, state: &mut RunState) -> Result<Flow> {
        if let Some(batch) = state.pending.take() {
            if self.dispatch(state, batch).await? == BatchOutcome::Suspended {
                return Ok(Flow::Suspended);
            }
        }
        self.drive(state).await
    }

    async fn drive(&self, state: &mut RunState) -> Result<Flow> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(BatonError::Canceled);
            }
            if state.step >= state.max_turns {
                return Err(BatonError::MaxTurnsExceeded {
                    max_turns: state.max_turns,
                });
            }

            let agent = self.agents.get(&state.active_agent)?;
            state.step += 1;
            let turn = state.step;
            self.emitter.emit(
                RunEventStream::Lifecycle,
                RunEventPayload::TurnStarted {
                    agent: agent.name.clone(),
                    turn,
                },
            );

            let request = turn::build_request(self.config, agent, &state.history);
            tracing::debug!(
                run_id = %state.run_id,
                agent = %agent.name,
                turn,
                model = %request.model,
                messages = request.messages.len(),
                tools = request.tools.len(),
                "invoking model"
            );
            let response =
                turn::invoke(self.provider, &request, self.options.streaming, self.emitter).await?;
            state.usage.record(&agent.name, &response.usage);
            let usage = response.usage.clone();

            let outcome = turn::classify(agent, turn, response);
            tracing::debug!(run_id = %state.run_id, agent = %agent.name, turn, kind = outcome.kind(), "turn classified");

            match outcome {
                TurnOutcome::FinalAnswer { text } => {
                    if let Some(output) = self.finish(state, agent, turn, text, usage).await? {
                        return Ok(Flow::Completed(output));
                    }
                }
                TurnOutcome::ToolBatch { text, calls } | TurnOutcome::Transfer { text, calls } => {
                    state.push(
                        ModelMessage::assistant_with_tool_calls(text.clone(), calls.clone())
                            .with_name(agent.name.clone()),
                    );
                    let batch = PendingBatch {
                        turn,
                        agent: agent.name.clone(),
                        assistant_text: text,
                        calls,
                        approvals: Vec::new(),
                        usage,
                    };
                    if self.dispatch(state, batch).await? == BatchOutcome::Suspended {
                        return Ok(Flow::Suspended);
                    }
                }
            }
        }
    }

    /// Run output guardrails on a final answer. `None` means retry.
    async fn finish(
        &self,
        state: &mut RunState,
        agent: &Agent,
        turn: usize,
        text: String,
        usage: Usage,
    ) -> Result<Option<String>> {
        let verdict = enforce(&self.guardrails(agent), GuardrailKind::Output, &text, &self.ctx).await;

        state.push(ModelMessage::assistant(text.clone()).with_name(agent.name.clone()));
        state.steps.push(RunStep {
            turn,
            agent: agent.name.clone(),
            output_text: text.clone(),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            usage,
            transfer: None,
        });

        match verdict {
            GuardrailVerdict::Passed => Ok(Some(text)),
            GuardrailVerdict::Tripwire(failure) => {
                self.report_guardrail(&failure);
                Err(failure.into_error())
            }
            GuardrailVerdict::Retry { feedback, failures } => {
                failures.iter().for_each(|f| self.report_guardrail(f));
                if state.guardrail_retries >= self.config.guardrail_max_retries {
                    tracing::info!(
                        run_id = %state.run_id,
                        agent = %agent.name,
                        retries = state.guardrail_retries,
                        "guardrail retries exhausted"
                    );
                    return Err(match failures.into_iter().next() {
                        Some(failure) => failure.into_error(),
                        None => BatonError::GuardrailTripwire {
                            guardrail: "output".to_string(),
                            message: feedback,
                        },
                    });
                }
                state.guardrail_retries += 1;
                state.push(ModelMessage::user(feedback));
                Ok(None)
            }
        }
    }

    /// Gate, execute and record one tool batch, then apply any transfer.
    async fn dispatch(&self, state: &mut RunState, mut batch: PendingBatch) -> Result<BatchOutcome> {
        let agent = self.agents.get(&batch.agent)?;

        // Targets are checked before any tool runs so a bad transfer has no side effects.
        let is_transfer: Vec<bool> = batch
            .calls
            .iter()
            .map(|call| transfer::is_transfer_call(agent, call))
            .collect();
        let mut honoured: Option<(usize, &Transfer)> = None;
        for (index, call) in batch.calls.iter().enumerate() {
            if !is_transfer[index] {
                continue;
            }
            let target = transfer::resolve(agent, call)?;
            if !self.agents.contains(&target.target) {
                return Err(BatonError::UnknownTransferTarget {
                    agent: agent.name.clone(),
                    target: target.target.clone(),
                });
            }
            if honoured.is_none() {
                honoured = Some((index, target));
            }
        }

        let regular: Vec<AgentToolCall> = batch
            .calls
            .iter()
            .zip(&is_transfer)
            .filter(|(_, transfer)| !**transfer)
            .map(|(call, _)| call.clone())
            .collect();

        let gated = dispatch::gate_calls(
            agent,
            &regular,
            &batch.approvals,
            self.options.approval_handler.as_ref(),
            &self.ctx,
        )
        .await;
        if gated.has_pending() {
            batch.approvals = gated.approvals;
            self.suspend(state, batch);
            return Ok(BatchOutcome::Suspended);
        }

        tracing::debug!(
            run_id = %state.run_id,
            agent = %agent.name,
            turn = batch.turn,
            calls = regular.len(),
            "executing tool batch"
        );
        let executed = dispatch::execute_batch(
            agent,
            &regular,
            &gated.gates,
            &self.ctx,
            &self.cancel,
            self.config.max_tool_concurrency,
            self.emitter,
        )
        .await;

        let mut executed = executed.into_iter();
        let mut results: Vec<AgentToolResult> = Vec::with_capacity(batch.calls.len());
        for (index, call) in batch.calls.iter().enumerate() {
            let result = match honoured {
                Some((chosen, target)) if is_transfer[index] => {
                    if chosen == index {
                        transfer::accepted_result(call, &target.target)
                    } else {
                        transfer::ignored_result(call, &target.target)
                    }
                }
                _ => executed.next().unwrap_or_else(|| {
                    AgentToolResult::error(call.id.clone(), "tool produced no result")
                }),
            };
            results.push(result);
        }

        for result in &results {
            self.emitter.emit(
                RunEventStream::Tool,
                RunEventPayload::ToolResult {
                    result: result.clone(),
                },
            );
            state.push(ModelMessage::tool_result(dispatch::history_copy(
                result,
                &self.config.toon,
            )));
        }

        let transfer_call = honoured.map(|(index, target)| (batch.calls[index].clone(), target));
        state.steps.push(RunStep {
            turn: batch.turn,
            agent: batch.agent,
            output_text: batch.assistant_text,
            tool_calls: batch.calls,
            tool_results: results,
            usage: batch.usage,
            transfer: None,
        });

        if let Some((call, target)) = transfer_call {
            let record = self.apply_transfer(state, agent, &call, target, batch.turn)?;
            if let Some(step) = state.steps.last_mut() {
                step.transfer = Some(record);
            }
        }

        Ok(BatchOutcome::Continue)
    }

    fn apply_transfer(
        &self,
        state: &mut RunState,
        from: &Agent,
        call: &AgentToolCall,
        target: &Transfer,
        turn: usize,
    ) -> Result<TransferRecord> {
        if let Some(max_transfers) = self.options.max_transfers {
            if state.transfers.len() >= max_transfers {
                return Err(BatonError::MaxTransfersExceeded { max_transfers });
            }
        }

        let record = TransferRecord {
            from: from.name.clone(),
            to: target.target.clone(),
            turn,
            call_id: call.id.clone(),
            at: Utc::now(),
        };

        let filter = target
            .input_filter()
            .or(self.options.transfer_input_filter.as_ref());
        if let Some(filter) = filter {
            let before = state.history.len();
            state.history = filter.apply(&state.history);
            tracing::debug!(
                run_id = %state.run_id,
                filter = ?filter,
                before,
                after = state.history.len(),
                "filtered history for transfer"
            );
        }

        state.active_agent = target.target.clone();
        state.transfers.push(record.clone());
        tracing::info!(
            run_id = %state.run_id,
            from = %record.from,
            to = %record.to,
            turn,
            "transferred control"
        );
        self.emitter.emit(
            RunEventStream::Transfer,
            RunEventPayload::Transferred {
                record: record.clone(),
            },
        );
        Ok(record)
    }

    fn suspend(&self, state: &mut RunState, batch: PendingBatch) {
        let pending: Vec<ApprovalRequest> = batch
            .approvals
            .iter()
            .filter(|approval| approval.status.is_pending())
            .map(|approval| ApprovalRequest {
                call_id: approval.call_id.clone(),
                tool_name: approval.tool_name.clone(),
                arguments: approval.arguments.clone(),
                agent: batch.agent.clone(),
                context: self.ctx.snapshot(),
            })
            .collect();

        tracing::info!(
            run_id = %state.run_id,
            agent = %batch.agent,
            turn = batch.turn,
            pending = pending.len(),
            "suspending for approval"
        );
        let count = pending.len();
        for request in pending {
            self.emitter.emit(
                RunEventStream::Approval,
                RunEventPayload::ApprovalRequired { request },
            );
        }

        state.pending = Some(batch);
        state.status = RunStatus::AwaitingApproval;
        state.context = self.ctx.snapshot();
        self.emitter
            .lifecycle(RunLifecycle::Suspended { pending: count });
    }

    /// Agent guardrails followed by run-level ones.
    fn guardrails(&self, agent: &Agent) -> Vec<Arc<dyn Guardrail>> {
        agent
            .guardrails
            .iter()
            .chain(self.options.guardrails.iter())
            .cloned()
            .collect()
    }

    fn report_guardrail(&self, failure: &GuardrailFailure) {
        tracing::info!(
            guardrail = %failure.guardrail,
            kind = %failure.kind,
            policy = %failure.policy,
            "guardrail failed"
        );
        self.emitter.emit(
            RunEventStream::Guardrail,
            RunEventPayload::GuardrailFailed {
                failure: failure.clone(),
            },
        );
    }
}

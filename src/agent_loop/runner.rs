//! Runner: the public entry points of the run loop.

mod dispatch;
mod engine;
mod turn;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::agent::AgentRegistry;
use crate::config::BatonConfig;
use crate::context::SharedContext;
use crate::error::BatonError;
use crate::guardrail::Guardrail;
use crate::provider::ModelProvider;
use crate::session::Session;
use crate::transfer::InputFilter;
use crate::util::with_optional_timeout;

use super::approvals::{ApprovalDecision, ApprovalHandler};
use super::events::{RunEventEmitter, RunEventSink, RunLifecycle};
use super::state::{RunState, RunStatus};
use super::types::{RunFailure, RunId, RunOutcome, RunResult};
use engine::{Engine, Flow};

/// Per-run options.
#[derive(Clone, Default)]
pub struct RunOptions {
    /// Shared context handed to tools, guardrails and approval handlers.
    pub context: Option<SharedContext>,
    pub session: Option<Arc<dyn Session>>,
    /// Overrides [`BatonConfig::max_turns`].
    pub max_turns: Option<usize>,
    pub approval_handler: Option<ApprovalHandler>,
    pub event_sink: Option<RunEventSink>,
    /// Guardrails applied in addition to each agent's own.
    pub guardrails: Vec<Arc<dyn Guardrail>>,
    /// Filter used for transfers that do not declare one.
    pub transfer_input_filter: Option<InputFilter>,
    /// Overrides [`BatonConfig::run_timeout_ms`].
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
    /// Consume the provider's stream and emit assistant deltas.
    pub streaming: bool,
    /// Fail once a run would exceed this many transfers.
    pub max_transfers: Option<usize>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(SharedContext::new(context));
        self
    }

    /// Share an existing context; the caller keeps observing tool writes.
    pub fn with_shared_context(mut self, context: SharedContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_session(mut self, session: Arc<dyn Session>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    pub fn with_approval_handler(mut self, handler: ApprovalHandler) -> Self {
        self.approval_handler = Some(handler);
        self
    }

    pub fn with_event_sink(mut self, sink: RunEventSink) -> Self {
        self.event_sink = Some(sink);
        self
    }

    pub fn with_guardrail(mut self, guardrail: impl Guardrail + 'static) -> Self {
        self.guardrails.push(Arc::new(guardrail));
        self
    }

    pub fn with_transfer_input_filter(mut self, filter: InputFilter) -> Self {
        self.transfer_input_filter = Some(filter);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_max_transfers(mut self, max_transfers: usize) -> Self {
        self.max_transfers = Some(max_transfers);
        self
    }
}

impl std::fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOptions")
            .field("context", &self.context)
            .field("session", &self.session.is_some())
            .field("max_turns", &self.max_turns)
            .field("approval_handler", &self.approval_handler.is_some())
            .field("event_sink", &self.event_sink.is_some())
            .field("guardrails", &self.guardrails.len())
            .field("transfer_input_filter", &self.transfer_input_filter)
            .field("timeout", &self.timeout)
            .field("streaming", &self.streaming)
            .field("max_transfers", &self.max_transfers)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Start,
    Resume,
}

/// Drives runs over a fixed set of agents and one model provider.
///
/// Cheap to clone; agents and provider are shared.
#[derive(Clone)]
pub struct Runner {
    provider: Arc<dyn ModelProvider>,
    agents: Arc<AgentRegistry>,
    config: BatonConfig,
}

impl Runner {
    pub fn new(provider: Arc<dyn ModelProvider>, agents: AgentRegistry) -> Self {
        Self {
            provider,
            agents: Arc::new(agents),
            config: BatonConfig::default(),
        }
    }

    pub fn with_config(mut self, config: BatonConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &BatonConfig {
        &self.config
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    /// Run `agent` on `input` until it completes, suspends or fails.
    pub async fn run(
        &self,
        agent: &str,
        input: impl Into<String>,
        options: RunOptions,
    ) -> Result<RunOutcome, RunFailure> {
        self.run_with_id(Uuid::new_v4(), agent, input.into(), options)
            .await
    }

    /// Resume a suspended run with decisions keyed by call id.
    pub async fn resume(
        &self,
        state: RunState,
        decisions: HashMap<String, ApprovalDecision>,
    ) -> Result<RunOutcome, RunFailure> {
        self.resume_with(state, decisions, RunOptions::default())
            .await
    }

    /// Like [`resume`](Self::resume) with fresh options.
    ///
    /// The stored context is used unless `options` carries one. A handler in
    /// `options` is consulted for calls that still have no decision.
    pub async fn resume_with(
        &self,
        mut state: RunState,
        decisions: HashMap<String, ApprovalDecision>,
        options: RunOptions,
    ) -> Result<RunOutcome, RunFailure> {
        if state.status != RunStatus::AwaitingApproval || state.pending.is_none() {
            let error = BatonError::InvalidState(format!(
                "run {} is {} and has nothing to resume",
                state.run_id, state.status
            ));
            return Err(failure(state, error));
        }

        for (call_id, decision) in decisions {
            if let Err(error) = state.decide(&call_id, decision) {
                tracing::warn!(run_id = %state.run_id, call_id = %call_id, error = %error, "ignoring decision");
            }
        }
        if let Some(max_turns) = options.max_turns {
            state.max_turns = max_turns;
        }
        let ctx = options
            .context
            .clone()
            .unwrap_or_else(|| SharedContext::new(state.context.clone()));
        state.status = RunStatus::Running;

        self.execute(state, ctx, options, Entry::Resume).await
    }

    /// Start a run on a Tokio task.
    pub fn spawn(
        &self,
        agent: impl Into<String>,
        input: impl Into<String>,
        mut options: RunOptions,
    ) -> RunHandle {
        let run_id = Uuid::new_v4();
        let agent = agent.into();
        let input = input.into();
        let cancel = options
            .cancel
            .as_ref()
            .map(CancellationToken::child_token)
            .unwrap_or_default();
        options.cancel = Some(cancel.clone());

        let runner = self.clone();
        let task_agent = agent.clone();
        let join = tokio::spawn(async move {
            runner
                .run_with_id(run_id, &task_agent, input, options)
                .await
        });

        RunHandle {
            run_id,
            agent,
            cancel,
            join,
        }
    }

    async fn run_with_id(
        &self,
        run_id: RunId,
        agent: &str,
        input: String,
        options: RunOptions,
    ) -> Result<RunOutcome, RunFailure> {
        if let Err(error) = self.agents.get(agent).and_then(|_| self.agents.validate()) {
            return Err(RunFailure::bare(run_id, agent, error));
        }

        let prior_history = match &options.session {
            Some(session) => match session.get_history().await {
                Ok(history) => history,
                Err(error) => return Err(RunFailure::bare(run_id, agent, error)),
            },
            None => Vec::new(),
        };

        let ctx = options.context.clone().unwrap_or_default();
        let max_turns = options.max_turns.unwrap_or(self.config.max_turns);
        let state = RunState::new(run_id, agent, input, prior_history, ctx.snapshot(), max_turns);

        self.execute(state, ctx, options, Entry::Start).await
    }

    async fn execute(
        &self,
        mut state: RunState,
        ctx: SharedContext,
        options: RunOptions,
        entry: Entry,
    ) -> Result<RunOutcome, RunFailure> {
        let emitter = RunEventEmitter::new(state.run_id, options.event_sink.clone());
        let cancel = options
            .cancel
            .as_ref()
            .map(CancellationToken::child_token)
            .unwrap_or_default();
        let timeout = options
            .timeout
            .or_else(|| self.config.run_timeout_ms.map(Duration::from_millis));
        let span = tracing::info_span!(
            "baton.run",
            run_id = %state.run_id,
            agent = %state.active_agent
        );

        emitter.lifecycle(match entry {
            Entry::Start => RunLifecycle::Started,
            Entry::Resume => RunLifecycle::Resumed,
        });

        let engine = Engine {
            provider: self.provider.as_ref(),
            agents: &self.agents,
            config: &self.config,
            options: &options,
            emitter: &emitter,
            ctx,
            cancel: cancel.clone(),
        };

        let outcome = async {
            let drive = async {
                match entry {
                    Entry::Start => engine.start(&mut state).await,
                    Entry::Resume => engine.resume(&mut state).await,
                }
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(BatonError::Canceled),
                result = with_optional_timeout(timeout, drive) => result,
            }
        }
        .instrument(span)
        .await;
        // Tools still holding the token see the run end.
        cancel.cancel();

        let output = match outcome {
            Ok(Flow::Suspended) => return Ok(RunOutcome::Suspended(Box::new(state))),
            Ok(Flow::Completed(output)) => output,
            Err(error) => return Err(fail(state, error, &emitter)),
        };

        if let Some(session) = &options.session {
            if let Err(error) = session.append(&state.transcript).await {
                return Err(fail(state, error, &emitter));
            }
        }

        state.status = RunStatus::Completed;
        tracing::info!(
            run_id = %state.run_id,
            agent = %state.active_agent,
            turns = state.step,
            transfers = state.transfers.len(),
            "run completed"
        );
        emitter.lifecycle(RunLifecycle::Completed);

        let metadata = state.metadata();
        Ok(RunOutcome::Completed(RunResult {
            run_id: state.run_id,
            output,
            final_agent: state.active_agent,
            steps: state.steps,
            messages: state.transcript,
            history: state.history,
            metadata,
        }))
    }
}

fn fail(state: RunState, error: BatonError, emitter: &RunEventEmitter) -> RunFailure {
    tracing::warn!(
        run_id = %state.run_id,
        agent = %state.active_agent,
        turns = state.step,
        error = %error,
        "run failed"
    );
    emitter.lifecycle(RunLifecycle::Failed {
        error: error.to_string(),
    });
    failure(state, error)
}

fn failure(mut state: RunState, error: BatonError) -> RunFailure {
    state.status = RunStatus::Failed;
    let metadata = state.metadata();
    RunFailure {
        error,
        run_id: state.run_id,
        agent: state.active_agent,
        transcript: state.transcript,
        steps: state.steps,
        metadata,
    }
}

/// Handle to a run started with [`Runner::spawn`].
#[derive(Debug)]
pub struct RunHandle {
    run_id: RunId,
    agent: String,
    cancel: CancellationToken,
    join: JoinHandle<Result<RunOutcome, RunFailure>>,
}

impl RunHandle {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Request cancellation. Returns false if it was already requested.
    pub fn abort(&self) -> bool {
        let first = !self.cancel.is_cancelled();
        self.cancel.cancel();
        first
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub async fn wait(self) -> Result<RunOutcome, RunFailure> {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(err) => {
                let error = if err.is_cancelled() {
                    BatonError::Canceled
                } else {
                    BatonError::InvalidState(format!("run task failed: {err}"))
                };
                Err(RunFailure::bare(self.run_id, self.agent, error))
            }
        }
    }
}

//! Turn driver: one model invocation for the active agent.

use std::collections::HashSet;

use crate::agent::Agent;
use crate::config::BatonConfig;
use crate::error::{BatonError, Result};
use crate::provider::{collect_stream, ModelProvider, ProviderRequest, ProviderResponse};
use crate::transfer;
use crate::types::{AgentToolCall, ModelMessage};

use super::super::events::{RunEventEmitter, RunEventPayload, RunEventStream};

/// How a response is handled by the run loop.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum TurnOutcome {
    /// Plain text with no tool calls.
    FinalAnswer { text: String },
    /// Regular tool calls only.
    ToolBatch {
        text: String,
        calls: Vec<AgentToolCall>,
    },
    /// A batch holding at least one transfer call.
    Transfer {
        text: String,
        calls: Vec<AgentToolCall>,
    },
}

impl TurnOutcome {
    pub(super) fn kind(&self) -> &'static str {
        match self {
            Self::FinalAnswer { .. } => "final_answer",
            Self::ToolBatch { .. } => "tool_batch",
            Self::Transfer { .. } => "transfer",
        }
    }
}

pub(super) fn build_request(
    config: &BatonConfig,
    agent: &Agent,
    history: &[ModelMessage],
) -> ProviderRequest {
    let mut messages = Vec::with_capacity(history.len() + 1);
    if !agent.instructions.is_empty() {
        messages.push(ModelMessage::system(agent.instructions.clone()));
    }
    messages.extend(history.iter().cloned());

    ProviderRequest {
        model: agent
            .settings
            .model
            .clone()
            .unwrap_or_else(|| config.default_model.clone()),
        agent: agent.name.clone(),
        instructions: agent.instructions.clone(),
        messages,
        tools: agent.tool_definitions(),
        settings: agent.settings.clone(),
    }
}

/// Issue exactly one invocation. Provider failures are fatal and never retried here.
pub(super) async fn invoke(
    provider: &dyn ModelProvider,
    request: &ProviderRequest,
    streaming: bool,
    emitter: &RunEventEmitter,
) -> Result<ProviderResponse> {
    let response = if streaming {
        match provider.stream_text(request).await {
            Ok(stream) => {
                collect_stream(stream, |text| {
                    emitter.emit(
                        RunEventStream::Assistant,
                        RunEventPayload::AssistantDelta {
                            text: text.to_string(),
                        },
                    )
                })
                .await
            }
            Err(err) => Err(err),
        }
    } else {
        provider.generate_text(request).await
    };
    response.map_err(|err| BatonError::model_invocation(request.agent.clone(), err))
}

/// Classify a response and give every call a usable, unique id.
pub(super) fn classify(agent: &Agent, turn: usize, response: ProviderResponse) -> TurnOutcome {
    let ProviderResponse {
        text, tool_calls, ..
    } = response;
    if tool_calls.is_empty() {
        return TurnOutcome::FinalAnswer { text };
    }

    let mut seen = HashSet::with_capacity(tool_calls.len());
    let calls: Vec<AgentToolCall> = tool_calls
        .into_iter()
        .enumerate()
        .map(|(index, mut call)| {
            if call.id.trim().is_empty() {
                call.id = format!("call_{turn}_{index}");
            }
            // Repeated ids get an index suffix so each result matches one call.
            let base = call.id.clone();
            let mut attempt = 0;
            while !seen.insert(call.id.clone()) {
                call.id = if attempt == 0 {
                    format!("{base}_{index}")
                } else {
                    format!("{base}_{index}_{attempt}")
                };
                attempt += 1;
            }
            call
        })
        .collect();

    if calls.iter().any(|call| transfer::is_transfer_call(agent, call)) {
        TurnOutcome::Transfer { text, calls }
    } else {
        TurnOutcome::ToolBatch { text, calls }
    }
}

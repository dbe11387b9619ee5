//! The model-invocation boundary.
//!
//! baton never talks to a model service directly. Callers plug in a
//! [`ModelProvider`]; the turn driver sends one [`ProviderRequest`] per turn
//! and classifies the [`ProviderResponse`] it gets back.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use crate::error::{BatonError, Result};
use crate::types::{
    AgentToolCall, FinishReason, ModelMessage, ModelSettings, StreamEventType, TextStreamDelta,
    Usage,
};

/// A request sent to a model provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// Resolved model id.
    pub model: String,
    /// Name of the agent taking the turn.
    pub agent: String,
    /// The agent's instructions. Also present as the leading system message.
    pub instructions: String,
    pub messages: Vec<ModelMessage>,
    pub tools: Vec<ToolDefinition>,
    pub settings: ModelSettings,
}

impl ProviderRequest {
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name.as_str()).collect()
    }
}

/// Tool definition sent to the provider API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Response from a provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub text: String,
    pub usage: Usage,
    pub tool_calls: Vec<AgentToolCall>,
    pub finish_reason: Option<FinishReason>,
}

impl ProviderResponse {
    /// A plain-text answer.
    pub fn text(text: impl Into<String>, usage: Usage) -> Self {
        Self {
            text: text.into(),
            usage,
            tool_calls: Vec::new(),
            finish_reason: Some(FinishReason::Stop),
        }
    }

    /// A batch of tool calls.
    pub fn tool_calls(tool_calls: Vec<AgentToolCall>, usage: Usage) -> Self {
        Self {
            text: String::new(),
            usage,
            tool_calls,
            finish_reason: Some(FinishReason::ToolCalls),
        }
    }
}

/// Core trait implemented by model services.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name used in logs and errors.
    fn provider_name(&self) -> &str;

    /// Generate one response (non-streaming).
    async fn generate_text(&self, request: &ProviderRequest) -> Result<ProviderResponse>;

    /// Generate one response as a stream of deltas.
    ///
    /// The default implementation replays [`generate_text`](Self::generate_text)
    /// as a single text delta, one delta per tool call and a final `Done`.
    async fn stream_text(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<TextStreamDelta>>> {
        let response = self.generate_text(request).await?;
        let stream = async_stream::stream! {
            if !response.text.is_empty() {
                yield Ok(TextStreamDelta::text(response.text));
            }
            for call in response.tool_calls {
                yield Ok(TextStreamDelta::tool_call(call));
            }
            yield Ok(TextStreamDelta::done(response.finish_reason, response.usage));
        };
        Ok(stream.boxed())
    }
}

/// Collect a stream into a single response, forwarding text deltas to `on_text`.
pub async fn collect_stream(
    mut stream: BoxStream<'static, Result<TextStreamDelta>>,
    mut on_text: impl FnMut(&str),
) -> Result<ProviderResponse> {
    let mut response = ProviderResponse::default();

    while let Some(delta) = stream.next().await {
        let delta = delta?;
        match delta.event_type {
            StreamEventType::TextDelta => {
                if !delta.text.is_empty() {
                    on_text(&delta.text);
                    response.text.push_str(&delta.text);
                }
            }
            StreamEventType::ToolCallDelta => {
                if let Some(call) = delta.tool_call {
                    // Later deltas for the same id carry the completed arguments.
                    // Calls without an id cannot be matched and are kept as-is.
                    let existing = if call.id.is_empty() {
                        None
                    } else {
                        response.tool_calls.iter_mut().find(|c| c.id == call.id)
                    };
                    match existing {
                        Some(existing) => *existing = call,
                        None => response.tool_calls.push(call),
                    }
                }
            }
            StreamEventType::Error => {
                let message = if delta.text.trim().is_empty() {
                    "stream error".to_string()
                } else {
                    delta.text
                };
                return Err(BatonError::provider("stream", message));
            }
            StreamEventType::Start | StreamEventType::Done => {}
        }
        if let Some(usage) = delta.usage {
            response.usage = usage;
        }
        if let Some(reason) = delta.finish_reason {
            response.finish_reason = Some(reason);
        }
    }

    Ok(response)
}

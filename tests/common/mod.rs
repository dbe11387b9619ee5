//! Shared test helpers and a scripted model provider.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use baton::agent_loop::{RunEvent, RunEventSink};
use baton::error::{BatonError, Result};
use baton::provider::{ModelProvider, ProviderRequest, ProviderResponse};
use baton::tools::{FunctionTool, ToolParameters};
use baton::types::*;

type Responder = dyn Fn(&ProviderRequest) -> Result<ProviderResponse> + Send + Sync;

/// A provider that replays queued responses and records every request.
///
/// When the queue is empty it asks the fallback responder, or answers "done".
pub struct ScriptedProvider {
    queue: Mutex<VecDeque<Result<ProviderResponse>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    fallback: Option<Box<Responder>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            fallback: None,
        }
    }

    /// Answer every unscripted request with `responder`.
    pub fn with_fallback<F>(mut self, responder: F) -> Self
    where
        F: Fn(&ProviderRequest) -> Result<ProviderResponse> + Send + Sync + 'static,
    {
        self.fallback = Some(Box::new(responder));
        self
    }

    pub fn text(self, text: &str) -> Self {
        self.push(Ok(ProviderResponse::text(text, Usage::new(10, 20))))
    }

    pub fn tool_call(self, id: &str, name: &str, args: serde_json::Value) -> Self {
        self.tool_calls(vec![call(id, name, args)])
    }

    pub fn tool_calls(self, calls: Vec<AgentToolCall>) -> Self {
        self.push(Ok(ProviderResponse::tool_calls(calls, Usage::new(10, 5))))
    }

    pub fn error(self, message: &str) -> Self {
        self.push(Err(BatonError::provider("scripted", message)))
    }

    fn push(self, response: Result<ProviderResponse>) -> Self {
        self.queue.lock().unwrap().push_back(response);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn generate_text(&self, request: &ProviderRequest) -> Result<ProviderResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let queued = self.queue.lock().unwrap().pop_front();
        match queued {
            Some(response) => response,
            None => match &self.fallback {
                Some(responder) => responder(request),
                None => Ok(ProviderResponse::text("done", Usage::new(1, 1))),
            },
        }
    }
}

pub fn call(id: &str, name: &str, args: serde_json::Value) -> AgentToolCall {
    AgentToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: args,
    }
}

/// `add(a, b)` returning `a + b`.
pub fn add_tool() -> FunctionTool {
    FunctionTool::new(
        "add",
        "Add two numbers",
        ToolParameters::object()
            .number("a", "left operand", true)
            .number("b", "right operand", true)
            .build(),
        |args, _ctx| async move {
            let sum = args.get_f64("a")? + args.get_f64("b")?;
            if sum.fract() == 0.0 {
                Ok(json!(sum as i64))
            } else {
                Ok(json!(sum))
            }
        },
    )
}

/// Tool-role results found in a request's messages, in order.
pub fn tool_results(request: &ProviderRequest) -> Vec<AgentToolResult> {
    request
        .messages
        .iter()
        .flat_map(|m| m.tool_results().into_iter().cloned())
        .collect()
}

pub fn capture_events() -> (RunEventSink, Arc<Mutex<Vec<RunEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink_events = events.clone();
    let sink: RunEventSink = Arc::new(move |event| sink_events.lock().unwrap().push(event));
    (sink, events)
}

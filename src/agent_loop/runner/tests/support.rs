use super::*;

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::agent_loop::events::RunEvent;
use crate::error::Result;
use crate::provider::{ProviderRequest, ProviderResponse};
use crate::types::{AgentToolCall, Usage};

pub(super) enum Scripted {
    Respond(ProviderResponse),
    Fail(String),
    /// Never answers within a test's lifetime.
    Stall,
}

pub(super) fn text(answer: &str) -> Scripted {
    Scripted::Respond(ProviderResponse::text(answer, Usage::new(10, 5)))
}

pub(super) fn tool_calls(calls: Vec<AgentToolCall>) -> Scripted {
    Scripted::Respond(ProviderResponse::tool_calls(calls, Usage::new(20, 3)))
}

pub(super) fn call(id: &str, name: &str, arguments: serde_json::Value) -> AgentToolCall {
    AgentToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments,
    }
}

/// Replays a fixed script and records every request. Answers "done" once the script runs out.
pub(super) struct ScriptedProvider {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub(super) fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(super) fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub(super) fn calls(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn generate_text(&self, request: &ProviderRequest) -> Result<ProviderResponse> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        let next = self.script.lock().expect("script lock").pop_front();
        match next {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(message)) => Err(BatonError::provider("scripted", message)),
            Some(Scripted::Stall) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(BatonError::provider("scripted", "stalled"))
            }
            None => Ok(ProviderResponse::text("done", Usage::new(1, 1))),
        }
    }
}

pub(super) fn runner(provider: Arc<ScriptedProvider>, agents: AgentRegistry) -> Runner {
    Runner::new(provider, agents)
}

pub(super) fn capture_events() -> (RunEventSink, Arc<Mutex<Vec<RunEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink_events = events.clone();
    let sink: RunEventSink = Arc::new(move |event| {
        sink_events.lock().expect("events lock").push(event);
    });
    (sink, events)
}

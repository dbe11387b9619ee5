use super::*;

use serde_json::json;

use crate::agent::Agent;
use crate::agent_loop::events::{RunEventPayload, RunEventStream};
use crate::session::{InMemorySession, Session as _};
use crate::tools::{FunctionTool, ToolParameters};
use crate::transfer::Transfer;
use crate::types::{ModelMessage, Role};

mod cancellation;
mod support;

use support::{call, capture_events, runner, text, tool_calls, Scripted, ScriptedProvider};

fn echo_tool() -> FunctionTool {
    FunctionTool::new(
        "echo",
        "Echo text back",
        ToolParameters::object().string("text", "text to echo", true).build(),
        |args, _ctx| async move { Ok(json!({ "echo": args.get_str("text")? })) },
    )
}

fn two_agents() -> AgentRegistry {
    AgentRegistry::new()
        .with(
            Agent::new("triage")
                .with_instructions("route the user")
                .with_tool(echo_tool())
                .with_transfer(Transfer::to("billing")),
        )
        .and_then(|r| r.with(Agent::new("billing").with_instructions("handle invoices")))
        .expect("registry")
}

#[tokio::test]
async fn usage_is_tagged_by_agent_across_transfers() {
    let provider = ScriptedProvider::new(vec![
        tool_calls(vec![call("c1", "echo", json!({ "text": "hi" }))]),
        tool_calls(vec![call("t1", "transfer_to_billing", json!({}))]),
        text("invoice sent"),
    ]);
    let runner = runner(provider.clone(), two_agents());

    let result = runner
        .run("triage", "I need an invoice", RunOptions::default())
        .await
        .expect("run")
        .into_result()
        .expect("completed");

    let usage = &result.metadata.usage;
    assert_eq!(usage.turns_for("triage"), 2);
    assert_eq!(usage.turns_for("billing"), 1);
    assert_eq!(usage.invocations(), 3);
    assert_eq!(usage.total().input_tokens, 50);
    assert_eq!(result.metadata.turns, 3);
    assert_eq!(result.final_agent, "billing");

    let requests = provider.requests();
    assert_eq!(requests[2].agent, "billing");
    assert_eq!(requests[2].messages[0].text(), "handle invoices");
    assert!(requests[2].tools.is_empty());
}

#[tokio::test]
async fn provider_failure_is_fatal_and_not_retried() {
    let provider = ScriptedProvider::new(vec![
        tool_calls(vec![call("c1", "echo", json!({ "text": "hi" }))]),
        Scripted::Fail("connection reset".into()),
    ]);
    let runner = runner(provider.clone(), two_agents());

    let failure = runner
        .run("triage", "hello", RunOptions::default())
        .await
        .expect_err("provider failure");

    assert_eq!(provider.calls(), 2);
    assert!(matches!(
        failure.error,
        BatonError::ModelInvocation { ref agent, .. } if agent == "triage"
    ));
    assert!(failure.error.is_fatal());
    assert_eq!(failure.steps.len(), 1);
    assert_eq!(failure.metadata.usage.invocations(), 1);
    assert!(failure
        .transcript
        .iter()
        .any(|m| m.role == Role::Tool));
}

#[tokio::test]
async fn streaming_turns_emit_deltas_and_lifecycle() {
    let provider = ScriptedProvider::new(vec![text("streamed answer")]);
    let runner = runner(provider, two_agents());
    let (sink, events) = capture_events();

    let outcome = runner
        .run(
            "triage",
            "hello",
            RunOptions::default()
                .with_streaming(true)
                .with_event_sink(sink),
        )
        .await
        .expect("run");
    assert_eq!(outcome.result().map(|r| r.output.as_str()), Some("streamed answer"));

    let events = events.lock().expect("events");
    let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
    assert_eq!(seqs, (1..=seqs.len() as u64).collect::<Vec<_>>());
    assert!(matches!(
        events.first().map(|e| &e.payload),
        Some(RunEventPayload::Lifecycle { state: RunLifecycle::Started })
    ));
    assert!(matches!(
        events.last().map(|e| &e.payload),
        Some(RunEventPayload::Lifecycle { state: RunLifecycle::Completed })
    ));
    let streamed: String = events
        .iter()
        .filter_map(|e| match &e.payload {
            RunEventPayload::AssistantDelta { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(streamed, "streamed answer");
}

#[tokio::test]
async fn streamed_calls_without_ids_all_run() {
    let provider = ScriptedProvider::new(vec![
        tool_calls(vec![
            call("", "echo", json!({ "text": "one" })),
            call("", "echo", json!({ "text": "two" })),
        ]),
        text("echoed"),
    ]);
    let runner = runner(provider, two_agents());

    let result = runner
        .run("triage", "hello", RunOptions::default().with_streaming(true))
        .await
        .expect("run")
        .into_result()
        .expect("completed");

    let step = &result.steps[0];
    let ids: Vec<&str> = step.tool_calls.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["call_1_0", "call_1_1"]);
    let outputs: Vec<_> = step.tool_results.iter().map(|r| r.result.clone()).collect();
    assert_eq!(outputs, vec![json!({ "echo": "one" }), json!({ "echo": "two" })]);
}

#[tokio::test]
async fn repeated_call_ids_get_distinct_results() {
    let provider = ScriptedProvider::new(vec![
        tool_calls(vec![
            call("x", "echo", json!({ "text": "one" })),
            call("x", "echo", json!({ "text": "two" })),
        ]),
        text("echoed"),
    ]);
    let runner = runner(provider.clone(), two_agents());

    let result = runner
        .run("triage", "hello", RunOptions::default())
        .await
        .expect("run")
        .into_result()
        .expect("completed");

    let step = &result.steps[0];
    let call_ids: Vec<&str> = step.tool_calls.iter().map(|c| c.id.as_str()).collect();
    let result_ids: Vec<&str> = step
        .tool_results
        .iter()
        .map(|r| r.tool_call_id.as_str())
        .collect();
    assert_eq!(call_ids, vec!["x", "x_1"]);
    assert_eq!(result_ids, call_ids);
    assert_eq!(step.tool_results[1].result, json!({ "echo": "two" }));
}

#[tokio::test]
async fn transfer_and_tool_events_are_emitted() {
    let provider = ScriptedProvider::new(vec![
        tool_calls(vec![
            call("c1", "echo", json!({ "text": "hi" })),
            call("t1", "transfer_to_billing", json!({})),
        ]),
        text("ok"),
    ]);
    let runner = runner(provider, two_agents());
    let (sink, events) = capture_events();

    runner
        .run("triage", "hello", RunOptions::default().with_event_sink(sink))
        .await
        .expect("run");

    let events = events.lock().expect("events");
    let transfers: Vec<_> = events
        .iter()
        .filter(|e| e.stream == RunEventStream::Transfer)
        .collect();
    assert_eq!(transfers.len(), 1);
    let tool_results = events
        .iter()
        .filter(|e| matches!(e.payload, RunEventPayload::ToolResult { .. }))
        .count();
    assert_eq!(tool_results, 2);
}

#[tokio::test]
async fn session_history_is_prepended_and_transcript_appended() {
    let session = Arc::new(InMemorySession::with_history(vec![
        ModelMessage::user("earlier question"),
        ModelMessage::assistant("earlier answer"),
    ]));
    let provider = ScriptedProvider::new(vec![text("fresh answer")]);
    let runner = runner(provider.clone(), two_agents());

    let result = runner
        .run(
            "triage",
            "new question",
            RunOptions::default().with_session(session.clone()),
        )
        .await
        .expect("run")
        .into_result()
        .expect("completed");

    let request = &provider.requests()[0];
    // system + two prior messages + new input
    assert_eq!(request.messages.len(), 4);
    assert_eq!(request.messages[1].text(), "earlier question");

    assert_eq!(result.messages.len(), 2);
    let stored = session.get_history().await.expect("history");
    assert_eq!(stored.len(), 4);
    assert_eq!(stored[3].text(), "fresh answer");
}

#[tokio::test]
async fn failed_runs_leave_the_session_untouched() {
    let session = Arc::new(InMemorySession::new());
    let provider = ScriptedProvider::new(vec![Scripted::Fail("down".into())]);
    let runner = runner(provider, two_agents());

    runner
        .run("triage", "hello", RunOptions::default().with_session(session.clone()))
        .await
        .expect_err("failure");

    assert!(session.is_empty());
}

#[tokio::test]
async fn max_transfers_bounds_ping_pong() {
    let mut agents = two_agents();
    agents
        .add_transfer("billing", Transfer::to("triage"))
        .expect("back edge");
    let provider = ScriptedProvider::new(vec![
        tool_calls(vec![call("t1", "transfer_to_billing", json!({}))]),
        tool_calls(vec![call("t2", "transfer_to_triage", json!({}))]),
        tool_calls(vec![call("t3", "transfer_to_billing", json!({}))]),
    ]);
    let runner = runner(provider.clone(), agents);

    let failure = runner
        .run("triage", "loop", RunOptions::default().with_max_transfers(2))
        .await
        .expect_err("bounded");

    assert!(matches!(
        failure.error,
        BatonError::MaxTransfersExceeded { max_transfers: 2 }
    ));
    assert_eq!(failure.metadata.handoff_chain(), vec!["triage", "billing", "triage"]);
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn unknown_start_agent_fails_before_any_turn() {
    let provider = ScriptedProvider::new(vec![]);
    let runner = runner(provider.clone(), two_agents());

    let failure = runner
        .run("nobody", "hello", RunOptions::default())
        .await
        .expect_err("unknown agent");

    assert!(matches!(failure.error, BatonError::UnknownAgent(ref name) if name == "nobody"));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn resuming_a_completed_state_is_rejected() {
    let provider = ScriptedProvider::new(vec![]);
    let runner = runner(provider, two_agents());
    let state = RunState::new(
        Uuid::new_v4(),
        "triage",
        "hi".into(),
        Vec::new(),
        json!({}),
        5,
    );

    let failure = runner
        .resume(state, HashMap::new())
        .await
        .expect_err("nothing to resume");
    assert!(matches!(failure.error, BatonError::InvalidState(_)));
}

#[tokio::test]
async fn model_falls_back_to_configured_default() {
    let provider = ScriptedProvider::new(vec![text("hi")]);
    let runner = runner(provider.clone(), two_agents())
        .with_config(BatonConfig::default().with_default_model("house-model"));

    runner
        .run("triage", "hello", RunOptions::default())
        .await
        .expect("run");

    assert_eq!(provider.requests()[0].model, "house-model");
}

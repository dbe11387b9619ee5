//! Approval gating, suspension and resume.

mod common;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;

use baton::agent_loop::{RunEventPayload, RunLifecycle, RunStatus};
use baton::prelude::*;
use common::{add_tool, call, capture_events, tool_results, ScriptedProvider};

/// `delete_file(path)` that always needs approval and counts executions.
fn delete_tool(runs: Arc<AtomicUsize>, gated: bool) -> FunctionTool {
    let tool = FunctionTool::new(
        "delete_file",
        "Delete a file",
        ToolParameters::object()
            .string("path", "file to delete", true)
            .build(),
        move |args, _ctx| {
            let runs = runs.clone();
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(json!({ "deleted": args.get_str("path")? }))
            }
        },
    );
    if gated {
        tool.requires_approval()
    } else {
        tool
    }
}

fn ops(runs: Arc<AtomicUsize>, gated: bool) -> AgentRegistry {
    AgentRegistry::new()
        .with(
            Agent::new("ops")
                .with_tool(delete_tool(runs, gated))
                .with_tool(add_tool()),
        )
        .unwrap()
}

fn delete_script() -> ScriptedProvider {
    ScriptedProvider::new()
        .tool_call("c1", "delete_file", json!({ "path": "/tmp/cache" }))
        .text("Cache removed.")
}

#[tokio::test]
async fn rejected_call_never_runs_and_model_sees_the_reason() {
    let runs = Arc::new(AtomicUsize::new(0));
    let provider = delete_script().shared();
    let handler = approval_handler(|request: ApprovalRequest| async move {
        assert_eq!(request.tool_name, "delete_file");
        assert_eq!(request.arguments, json!({ "path": "/tmp/cache" }));
        ApprovalDecision::reject("deletes are frozen")
    });

    let result = Runner::new(provider.clone(), ops(runs.clone(), true))
        .run(
            "ops",
            "clear the cache",
            RunOptions::default().with_approval_handler(handler),
        )
        .await
        .unwrap()
        .into_result()
        .unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(result.output, "Cache removed.");

    let seen = tool_results(&provider.requests()[1]);
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].tool_call_id, "c1");
    assert!(seen[0].is_error);
    assert_eq!(
        seen[0].result,
        json!({ "error": "Tool call 'delete_file' rejected: deletes are frozen" })
    );
}

#[tokio::test]
async fn approving_handler_runs_the_tool_inline() {
    let runs = Arc::new(AtomicUsize::new(0));
    let provider = delete_script().shared();

    let outcome = Runner::new(provider, ops(runs.clone(), true))
        .run(
            "ops",
            "clear the cache",
            RunOptions::default()
                .with_approval_handler(approval_handler(|_| async { ApprovalDecision::Approve })),
        )
        .await
        .unwrap();

    assert!(!outcome.is_suspended());
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn suspend_and_resume_matches_an_ungated_run() {
    let baseline_runs = Arc::new(AtomicUsize::new(0));
    let baseline = Runner::new(delete_script().shared(), ops(baseline_runs, false))
        .run("ops", "clear the cache", RunOptions::default())
        .await
        .unwrap()
        .into_result()
        .unwrap();

    let runs = Arc::new(AtomicUsize::new(0));
    let provider = delete_script().shared();
    let runner = Runner::new(provider.clone(), ops(runs.clone(), true));

    let outcome = runner
        .run("ops", "clear the cache", RunOptions::default())
        .await
        .unwrap();
    assert!(outcome.is_suspended());
    let state = outcome.into_state().unwrap();
    assert_eq!(state.status, RunStatus::AwaitingApproval);
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(provider.call_count(), 1);

    let pending = state.pending_approvals();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].call_id, "c1");

    // The suspended state survives a trip through storage.
    let stored = state.to_json().unwrap();
    let restored = RunState::from_json(&stored).unwrap();
    assert_eq!(restored.to_json().unwrap(), stored);

    let run_id = restored.run_id;
    let decisions = HashMap::from([("c1".to_string(), ApprovalDecision::Approve)]);
    let resumed = runner
        .resume(restored, decisions)
        .await
        .unwrap()
        .into_result()
        .unwrap();

    assert_eq!(resumed.run_id, run_id);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(resumed.output, baseline.output);
    assert_eq!(resumed.steps.len(), baseline.steps.len());
    assert_eq!(
        resumed.steps[0].tool_results,
        baseline.steps[0].tool_results
    );
    assert_eq!(resumed.metadata.turns, 2);
    assert_eq!(resumed.usage().total_tokens, baseline.usage().total_tokens);
}

#[tokio::test]
async fn deferring_handler_suspends_the_run() {
    let runs = Arc::new(AtomicUsize::new(0));
    let (sink, events) = capture_events();

    let outcome = Runner::new(delete_script().shared(), ops(runs.clone(), true))
        .run(
            "ops",
            "clear the cache",
            RunOptions::default()
                .with_event_sink(sink)
                .with_context(json!({ "tenant": "acme" }))
                .with_approval_handler(approval_handler(|_| async { ApprovalDecision::Defer })),
        )
        .await
        .unwrap();

    assert!(outcome.is_suspended());
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    let events = events.lock().unwrap();
    let required: Vec<_> = events
        .iter()
        .filter_map(|event| match &event.payload {
            RunEventPayload::ApprovalRequired { request } => Some(request.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(required.len(), 1);
    assert_eq!(required[0].call_id, "c1");
    assert_eq!(required[0].context, json!({ "tenant": "acme" }));
    assert!(matches!(
        events.last().map(|event| &event.payload),
        Some(RunEventPayload::Lifecycle {
            state: RunLifecycle::Suspended { pending: 1 }
        })
    ));
}

#[tokio::test]
async fn mixed_batch_runs_nothing_while_suspended() {
    let runs = Arc::new(AtomicUsize::new(0));
    let provider = ScriptedProvider::new()
        .tool_calls(vec![
            call("c1", "add", json!({ "a": 1, "b": 1 })),
            call("c2", "delete_file", json!({ "path": "/etc" })),
        ])
        .text("Partially done.")
        .shared();
    let (sink, events) = capture_events();
    let runner = Runner::new(provider.clone(), ops(runs.clone(), true));

    let state = runner
        .run("ops", "do both", RunOptions::default().with_event_sink(sink))
        .await
        .unwrap()
        .into_state()
        .unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert!(state.steps.is_empty());
    assert!(!events
        .lock()
        .unwrap()
        .iter()
        .any(|event| matches!(event.payload, RunEventPayload::ToolCallStarted { .. })));
    // Only the gated call waits for a decision.
    assert_eq!(state.pending_approvals().len(), 1);

    let mut state = state;
    state.reject("c2", "not /etc").unwrap();
    let result = runner
        .resume(state, HashMap::new())
        .await
        .unwrap()
        .into_result()
        .unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 0);
    let results = &result.steps[0].tool_results;
    assert_eq!(results[0].result, json!(2));
    assert_eq!(results[1].tool_call_id, "c2");
    assert!(results[1].is_error);

    let seen = tool_results(&provider.requests()[1]);
    assert_eq!(
        seen.iter().map(|r| r.tool_call_id.as_str()).collect::<Vec<_>>(),
        vec!["c1", "c2"]
    );
}

#[tokio::test]
async fn resume_without_decisions_suspends_again() {
    let runs = Arc::new(AtomicUsize::new(0));
    let runner = Runner::new(delete_script().shared(), ops(runs.clone(), true));

    let state = runner
        .run("ops", "clear the cache", RunOptions::default())
        .await
        .unwrap()
        .into_state()
        .unwrap();

    let decisions = HashMap::from([("unknown".to_string(), ApprovalDecision::Approve)]);
    let again = runner
        .resume(state, decisions)
        .await
        .unwrap()
        .into_state()
        .unwrap();

    assert!(again.is_suspended());
    assert_eq!(again.pending_approvals()[0].call_id, "c1");
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn conditional_approval_only_gates_matching_calls() {
    let transfers = Arc::new(AtomicUsize::new(0));
    let counter = transfers.clone();
    let pay = FunctionTool::new(
        "pay",
        "Send a payment",
        ToolParameters::object()
            .number("amount", "amount in dollars", true)
            .build(),
        move |_args, _ctx| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!("sent"))
            }
        },
    )
    .requires_approval_when(|args, _ctx| args.get_f64("amount").unwrap_or(0.0) > 100.0);
    let agents = AgentRegistry::new()
        .with(Agent::new("cashier").with_tool(pay))
        .unwrap();
    let provider = ScriptedProvider::new()
        .tool_calls(vec![
            call("small", "pay", json!({ "amount": 20 })),
            call("large", "pay", json!({ "amount": 5000 })),
        ])
        .shared();

    let state = Runner::new(provider, agents)
        .run("cashier", "pay both", RunOptions::default())
        .await
        .unwrap()
        .into_state()
        .unwrap();

    let pending: Vec<_> = state
        .pending_approvals()
        .into_iter()
        .map(|a| a.call_id.clone())
        .collect();
    assert_eq!(pending, vec!["large".to_string()]);
    assert_eq!(transfers.load(Ordering::SeqCst), 0);
}

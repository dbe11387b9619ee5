use super::*;

use tokio::time::timeout;

#[tokio::test(start_paused = true)]
async fn run_timeout_keeps_partial_state() {
    let provider = ScriptedProvider::new(vec![
        tool_calls(vec![call("c1", "echo", json!({ "text": "hi" }))]),
        Scripted::Stall,
    ]);
    let runner = runner(provider, two_agents());

    let failure = runner
        .run(
            "triage",
            "hello",
            RunOptions::default().with_timeout(Duration::from_millis(200)),
        )
        .await
        .expect_err("timeout");

    assert!(matches!(failure.error, BatonError::Timeout(200)));
    assert_eq!(failure.steps.len(), 1);
    assert_eq!(failure.metadata.turns, 2);
}

#[tokio::test(start_paused = true)]
async fn configured_timeout_applies_without_option() {
    let provider = ScriptedProvider::new(vec![Scripted::Stall]);
    let runner = runner(provider, two_agents())
        .with_config(BatonConfig::default().with_run_timeout_ms(50));

    let failure = runner
        .run("triage", "hello", RunOptions::default())
        .await
        .expect_err("timeout");
    assert!(matches!(failure.error, BatonError::Timeout(50)));
}

#[tokio::test]
async fn cancellation_token_ends_the_run() {
    let provider = ScriptedProvider::new(vec![Scripted::Stall]);
    let runner = runner(provider, two_agents());
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let failure = timeout(
        Duration::from_secs(5),
        runner.run("triage", "hello", RunOptions::default().with_cancellation(cancel)),
    )
    .await
    .expect("run ends")
    .expect_err("canceled");
    assert!(matches!(failure.error, BatonError::Canceled));
}

#[tokio::test]
async fn spawned_run_can_be_aborted() {
    let provider = ScriptedProvider::new(vec![Scripted::Stall]);
    let runner = runner(provider, two_agents());

    let handle = runner.spawn("triage", "hello", RunOptions::default());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(handle.abort());
    assert!(!handle.abort());

    let failure = timeout(Duration::from_secs(5), handle.wait())
        .await
        .expect("wait")
        .expect_err("aborted");
    assert!(matches!(failure.error, BatonError::Canceled));
}

#[tokio::test]
async fn spawned_run_completes() {
    let provider = ScriptedProvider::new(vec![text("background answer")]);
    let runner = runner(provider, two_agents());

    let handle = runner.spawn("triage", "hello", RunOptions::default());
    let run_id = handle.run_id();
    let result = handle
        .wait()
        .await
        .expect("run")
        .into_result()
        .expect("completed");

    assert_eq!(result.run_id, run_id);
    assert_eq!(result.output, "background answer");
}

#[tokio::test]
async fn spawned_run_executes_a_tool_batch() {
    let provider = ScriptedProvider::new(vec![
        tool_calls(vec![
            call("c1", "echo", json!({ "text": "one" })),
            call("c2", "echo", json!({ "text": "two" })),
        ]),
        text("echoed"),
    ]);
    let runner = runner(provider, two_agents());

    let result = runner
        .spawn("triage", "hello", RunOptions::default())
        .wait()
        .await
        .expect("run")
        .into_result()
        .expect("completed");

    assert_eq!(result.output, "echoed");
    let outputs: Vec<_> = result.steps[0]
        .tool_results
        .iter()
        .map(|r| r.result.clone())
        .collect();
    assert_eq!(outputs, vec![json!({ "echo": "one" }), json!({ "echo": "two" })]);
}

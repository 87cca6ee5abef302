// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sg_storage::{WaitRecord, WaitStatus};

fn put_pending_record(fx: &Fixture, agent: AgentId, message: &Message) {
    let now = chrono::Utc::now();
    fx.waits
        .put(&WaitRecord {
            status: WaitStatus::Pending,
            thread_id: message.thread_id.clone(),
            agent_id: agent,
            provider_thread_id: "fake-1".to_string(),
            timeout_ms: 5_000,
            message_id: message.id.clone(),
            from: message.from,
            to: message.to,
            title: message.title.clone(),
            message_created_at: message.created_at,
            created_at: now,
            updated_at: now,
            received_at: None,
            received_message: None,
        })
        .unwrap();
}

// A waiting turn resumes when the expected message arrives.
#[tokio::test]
async fn wait_resolves_on_message_arrival() {
    let fx = Fixture::new();
    let runtime = fx.runtime(AgentId::Karou);
    fx.provider.push_text("TOOL:waitForMessage timeoutMs=5000");
    fx.provider.push_text("");

    let rx = runtime
        .enqueue(fx.message(AgentId::Shogun, AgentId::Karou, "t1", "collect", "wait for it"))
        .unwrap();

    // Let the turn reach the suspension, then deliver the reply.
    let provider = fx.provider.clone();
    settle("turn suspended", || provider.call_count() >= 2).await;
    let reply = fx.message(AgentId::Ashigaru(1), AgentId::Karou, "t1", "reply", "done");
    assert!(runtime.enqueue(reply).is_none(), "reply must be consumed by the wait");

    rx.await.unwrap().unwrap();

    let inputs = fx.turn_inputs();
    assert_eq!(inputs.len(), 2);
    assert!(inputs[1].starts_with("TOOL_RESULT waitForMessage:"), "got: {}", inputs[1]);
    assert!(inputs[1].contains(r#""status":"message""#));
    assert!(inputs[1].contains(r#""body":"done""#));
    assert!(inputs[1].contains(r#""remainingWaits":9"#));

    // The suspension was consumed; its record is gone.
    assert!(fx.waits.get("t1", AgentId::Karou).is_none());
}

#[tokio::test]
async fn wait_times_out_without_a_message() {
    let fx = Fixture::new();
    let runtime = fx.runtime(AgentId::Karou);
    fx.provider.push_text("TOOL:waitForMessage timeoutMs=80");
    fx.provider.push_text("");

    let rx = runtime
        .enqueue(fx.message(AgentId::Shogun, AgentId::Karou, "t1", "collect", "x"))
        .unwrap();
    rx.await.unwrap().unwrap();

    let inputs = fx.turn_inputs();
    assert!(inputs[1].contains(r#""status":"timeout""#));
    assert!(inputs[1].contains(r#""timeoutMs":80"#));
    assert!(fx.waits.get("t1", AgentId::Karou).is_none());
}

// A message already queued for the thread satisfies the wait without
// suspending.
#[tokio::test]
async fn queued_message_satisfies_the_wait_immediately() {
    let fx = Fixture::new();
    let runtime = fx.runtime(AgentId::Karou);
    // The turn takes 150 ms to emit its wait; the reply arrives earlier
    // and queues behind the busy runtime.
    fx.provider.push_delayed(Duration::from_millis(150), "TOOL:waitForMessage timeoutMs=5000");
    fx.provider.push_text("");

    let rx = runtime
        .enqueue(fx.message(AgentId::Shogun, AgentId::Karou, "t1", "collect", "x"))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    let rx_reply = runtime
        .enqueue(fx.message(AgentId::Ashigaru(2), AgentId::Karou, "t1", "reply", "early bird"))
        .unwrap();

    rx.await.unwrap().unwrap();
    rx_reply.await.unwrap().unwrap();

    let inputs = fx.turn_inputs();
    assert!(inputs[1].contains(r#""status":"message""#));
    assert!(inputs[1].contains("early bird"));
}

#[tokio::test]
async fn wait_is_not_available_to_ashigaru() {
    let fx = Fixture::new();
    let runtime = fx.runtime(AgentId::Ashigaru(1));
    fx.provider.push_text("TOOL:waitForMessage");
    fx.provider.push_text("");

    let rx = runtime
        .enqueue(fx.message(AgentId::Karou, AgentId::Ashigaru(1), "t1", "try", "x"))
        .unwrap();
    rx.await.unwrap().unwrap();

    let inputs = fx.turn_inputs();
    assert!(inputs[1].contains(r#""status":"error""#));
    assert!(fx.waits.get("t1", AgentId::Ashigaru(1)).is_none());
}

// The eleventh wait in one turn short-circuits with limitReached.
#[tokio::test]
async fn wait_budget_limits_suspensions_per_turn() {
    let fx = Fixture::new();
    let runtime = fx.runtime(AgentId::Karou);
    for _ in 0..11 {
        fx.provider.push_text("TOOL:waitForMessage timeoutMs=10");
    }
    fx.provider.push_text("");

    let rx = runtime
        .enqueue(fx.message(AgentId::Shogun, AgentId::Karou, "t1", "impatient", "x"))
        .unwrap();
    rx.await.unwrap().unwrap();

    let inputs = fx.turn_inputs();
    // Input 11 carries the result of the tenth (final) real wait.
    assert!(inputs[10].contains(r#""remainingWaits":0"#), "got: {}", inputs[10]);
    assert!(!inputs[10].contains("limitReached"));
    // Input 12 carries the short-circuited result, and the model got one
    // more loop to wrap up.
    assert!(inputs[11].contains(r#""limitReached":true"#), "got: {}", inputs[11]);
    assert_eq!(inputs.len(), 12);
}

// A received record resumes the turn from the
// synthetic tool result without re-running the instruction.
#[tokio::test]
async fn resume_from_received_record_replays_the_outcome() {
    let fx = Fixture::new();
    let original = fx.message(AgentId::Shogun, AgentId::Karou, "t1", "collect", "original order");
    fx.history.append(&original).unwrap();

    let reply = fx.message(AgentId::Ashigaru(1), AgentId::Karou, "t1", "reply", "done");
    put_pending_record(&fx, AgentId::Karou, &original);
    fx.waits
        .mark_received("t1", AgentId::Karou, &reply, chrono::Utc::now())
        .unwrap()
        .unwrap();

    let runtime = fx.runtime(AgentId::Karou);
    fx.provider.push_text("");
    runtime.resume_pending_waits();

    let provider = fx.provider.clone();
    settle("resumed turn ran", || provider.call_count() >= 2).await;
    let waits = fx.waits.clone();
    settle("record cleared", || waits.get("t1", AgentId::Karou).is_none()).await;

    let inputs = fx.turn_inputs();
    assert_eq!(inputs.len(), 1, "exactly one resumed turn");
    assert!(inputs[0].starts_with("TOOL_RESULT waitForMessage:"), "got: {}", inputs[0]);
    assert!(inputs[0].contains(r#""body":"done""#));
    assert!(
        !inputs[0].contains("original order"),
        "the instruction must not be re-read on resume"
    );
}

// A still-pending record re-enters the suspension and resumes when the
// reply finally arrives.
#[tokio::test]
async fn resume_from_pending_record_waits_again() {
    let fx = Fixture::new();
    let original = fx.message(AgentId::Shogun, AgentId::Karou, "t1", "collect", "original order");
    fx.history.append(&original).unwrap();
    put_pending_record(&fx, AgentId::Karou, &original);

    let runtime = fx.runtime(AgentId::Karou);
    fx.provider.push_text("");
    runtime.resume_pending_waits();

    // The resumed turn suspends before any real provider turn (only the
    // session seed has happened); deliver the reply.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(fx.turn_inputs().is_empty(), "must suspend before the first turn input");
    let reply = fx.message(AgentId::Ashigaru(1), AgentId::Karou, "t1", "reply", "late result");
    assert!(runtime.enqueue(reply).is_none());

    let provider = fx.provider.clone();
    settle("turn resumed", || provider.call_count() >= 2).await;
    let inputs = fx.turn_inputs();
    assert!(inputs[0].starts_with("TOOL_RESULT waitForMessage:"));
    assert!(inputs[0].contains("late result"));
}

// A wait record whose originating message vanished from history is
// dropped at resume.
#[tokio::test]
async fn orphaned_wait_records_are_pruned_at_resume() {
    let fx = Fixture::new();
    let ghost = fx.message(AgentId::Shogun, AgentId::Karou, "t1", "ghost", "never archived");
    put_pending_record(&fx, AgentId::Karou, &ghost);

    let runtime = fx.runtime(AgentId::Karou);
    runtime.resume_pending_waits();

    let waits = fx.waits.clone();
    settle("record pruned", || waits.get("t1", AgentId::Karou).is_none()).await;
    assert_eq!(fx.provider.call_count(), 0);
}

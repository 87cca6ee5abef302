// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

// Scenario: tool-less output auto-replies to the superior.
#[tokio::test]
async fn tool_less_output_auto_replies_to_superior() {
    let fx = Fixture::new();
    let runtime = fx.runtime(AgentId::Ashigaru(1));
    fx.provider.push_text("ashigaru1");

    let rx = runtime
        .enqueue(fx.message(
            AgentId::Karou,
            AgentId::Ashigaru(1),
            "t1",
            "rollcall",
            "reply with your name only",
        ))
        .unwrap();
    rx.await.unwrap().unwrap();

    let stems = fx.outbox(AgentId::Karou, AgentId::Ashigaru(1));
    assert_eq!(stems.len(), 1, "expected exactly one auto-reply file");
    assert_eq!(fx.outbox_body(AgentId::Karou, AgentId::Ashigaru(1), &stems[0]), "ashigaru1");
    let parsed = sg_core::parse_stem(&stems[0]);
    assert_eq!(parsed.thread_id.as_deref(), Some("t1"));
    assert_eq!(parsed.title, "auto-reply-rollcall");
}

#[tokio::test]
async fn empty_output_does_not_auto_reply() {
    let fx = Fixture::new();
    let runtime = fx.runtime(AgentId::Ashigaru(1));
    fx.provider.push_text("   \n");

    let rx = runtime
        .enqueue(fx.message(AgentId::Karou, AgentId::Ashigaru(1), "t1", "quiet", "say nothing"))
        .unwrap();
    rx.await.unwrap().unwrap();

    assert!(fx.outbox(AgentId::Karou, AgentId::Ashigaru(1)).is_empty());
}

// Messages for the same runtime are processed in enqueue order.
#[tokio::test]
async fn turns_run_in_fifo_order() {
    let fx = Fixture::new();
    let runtime = fx.runtime(AgentId::Shogun);
    fx.provider.push_text("");
    fx.provider.push_text("");

    let rx1 = runtime
        .enqueue(fx.message(AgentId::King, AgentId::Shogun, "t1", "first", "body-one"))
        .unwrap();
    rx1.await.unwrap().unwrap();
    let rx2 = runtime
        .enqueue(fx.message(AgentId::King, AgentId::Shogun, "t2", "second", "body-two"))
        .unwrap();
    rx2.await.unwrap().unwrap();

    let inputs = fx.turn_inputs();
    assert_eq!(inputs.len(), 2);
    assert!(inputs[0].contains("body-one"));
    assert!(inputs[1].contains("body-two"));
}

// Messages for the same thread queued behind a busy turn coalesce into
// one batch input.
#[tokio::test]
async fn same_thread_messages_coalesce_into_a_batch() {
    let fx = Fixture::new();
    let runtime = fx.runtime(AgentId::Shogun);
    // First turn (thread t2) holds the runtime busy long enough for two
    // t1 messages to queue behind it.
    fx.provider.push_delayed(Duration::from_millis(150), "");
    fx.provider.push_text("");

    let rx0 = runtime
        .enqueue(fx.message(AgentId::King, AgentId::Shogun, "t2", "blocker", "hold"))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    let rx1 = runtime
        .enqueue(fx.message(AgentId::King, AgentId::Shogun, "t1", "part", "alpha"))
        .unwrap();
    let rx2 = runtime
        .enqueue(fx.message(AgentId::King, AgentId::Shogun, "t1", "part", "beta"))
        .unwrap();

    rx0.await.unwrap().unwrap();
    rx1.await.unwrap().unwrap();
    rx2.await.unwrap().unwrap();

    let inputs = fx.turn_inputs();
    assert_eq!(inputs.len(), 2, "two turns: blocker, then the coalesced batch");
    let batch = &inputs[1];
    assert!(batch.starts_with("BATCH_START count=2"), "got: {batch}");
    assert!(batch.contains("--- MESSAGE 1/2 START ---"));
    assert!(batch.contains("alpha"));
    assert!(batch.contains("beta"));
    assert!(batch.ends_with("BATCH_END"));
}

#[tokio::test]
async fn provider_failure_rejects_the_completion() {
    let fx = Fixture::new();
    let runtime = fx.runtime(AgentId::Shogun);
    fx.provider.push_fail("boom");

    let rx = runtime
        .enqueue(fx.message(AgentId::King, AgentId::Shogun, "t1", "task", "x"))
        .unwrap();
    let result = rx.await.unwrap();
    let err = result.unwrap_err();
    assert!(err.contains("boom"), "got: {err}");

    // The runtime returns to idle and accepts further work.
    settle("idle after failure", || !runtime.snapshot().status.eq(&sg_core::AgentStatus::Busy))
        .await;
    fx.provider.push_text("");
    let rx = runtime
        .enqueue(fx.message(AgentId::King, AgentId::Shogun, "t1", "task", "y"))
        .unwrap();
    rx.await.unwrap().unwrap();
}

#[tokio::test]
async fn session_is_created_once_per_thread_and_seeded() {
    let fx = Fixture::new();
    let runtime = fx.runtime(AgentId::Shogun);
    fx.provider.push_text("");
    fx.provider.push_text("");

    let rx = runtime
        .enqueue(fx.message(AgentId::King, AgentId::Shogun, "t1", "a", "one"))
        .unwrap();
    rx.await.unwrap().unwrap();
    let rx = runtime
        .enqueue(fx.message(AgentId::King, AgentId::Shogun, "t1", "b", "two"))
        .unwrap();
    rx.await.unwrap().unwrap();

    assert_eq!(fx.provider.created_threads().len(), 1, "one provider thread per (thread, agent)");
    let binding = fx.state.session("t1", AgentId::Shogun).unwrap();
    assert!(binding.initialized);
    assert_eq!(binding.provider, "fake");

    // The seed carried the system prompt and the ACK request.
    let calls = fx.provider.calls();
    assert!(calls[0].input.contains("You are shogun"));
    assert!(calls[0].input.contains("Reply with only the word ACK"));
}

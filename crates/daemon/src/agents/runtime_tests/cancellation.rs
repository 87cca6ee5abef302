// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

// After stop, the runtime reaches idle, the queue is empty, and every
// completion waiter is rejected.
#[tokio::test]
async fn stop_drains_the_queue_and_aborts_the_turn() {
    let fx = Fixture::new();
    let runtime = fx.runtime(AgentId::Shogun);
    fx.provider.push_hold();

    let rx1 = runtime
        .enqueue(fx.message(AgentId::King, AgentId::Shogun, "t1", "held", "x"))
        .unwrap();
    let provider = fx.provider.clone();
    settle("turn in flight", || provider.call_count() >= 2).await;
    let rx2 = runtime
        .enqueue(fx.message(AgentId::King, AgentId::Shogun, "t2", "queued", "y"))
        .unwrap();

    runtime.stop().await;

    assert_eq!(rx1.await.unwrap().unwrap_err(), "agent stopped");
    assert_eq!(rx2.await.unwrap().unwrap_err(), "agent stopped");

    let rt = runtime.clone();
    settle("idle after stop", || {
        let snap = rt.snapshot();
        snap.status == sg_core::AgentStatus::Idle && snap.queue_size == 0
    })
    .await;
}

#[tokio::test]
async fn stopped_runtime_refuses_work_until_cleared() {
    let fx = Fixture::new();
    let runtime = fx.runtime(AgentId::Shogun);
    runtime.stop().await;

    fx.provider.push_text("");
    let _rx = runtime
        .enqueue(fx.message(AgentId::King, AgentId::Shogun, "t1", "later", "x"))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(fx.provider.call_count(), 0, "stopped runtime must not start turns");

    runtime.clear_stop();
    let provider = fx.provider.clone();
    settle("turn ran after clear", || provider.call_count() >= 1).await;
}

// After interrupt the current work is gone but new enqueues run.
#[tokio::test]
async fn interrupt_clears_current_work_but_accepts_new() {
    let fx = Fixture::new();
    let runtime = fx.runtime(AgentId::Ashigaru(1));
    fx.provider.push_hold();

    let rx1 = runtime
        .enqueue(fx.message(AgentId::Karou, AgentId::Ashigaru(1), "t1", "held", "x"))
        .unwrap();
    let provider = fx.provider.clone();
    settle("turn in flight", || provider.call_count() >= 2).await;

    runtime.cancel(CancelReason::Interrupt).await;
    assert_eq!(rx1.await.unwrap().unwrap_err(), "agent stopped");

    let rt = runtime.clone();
    settle("idle after interrupt", || rt.snapshot().status == sg_core::AgentStatus::Idle).await;

    fx.provider.push_text("");
    let rx2 = runtime
        .enqueue(fx.message(AgentId::Karou, AgentId::Ashigaru(1), "t1", "fresh", "y"))
        .unwrap();
    rx2.await.unwrap().unwrap();
}

// A stop during a suspension resolves the waiter with null and exits the
// turn cleanly.
#[tokio::test]
async fn stop_during_wait_exits_cleanly() {
    let fx = Fixture::new();
    let runtime = fx.runtime(AgentId::Karou);
    fx.provider.push_text("TOOL:waitForMessage timeoutMs=60000");

    let rx = runtime
        .enqueue(fx.message(AgentId::Shogun, AgentId::Karou, "t1", "collect", "x"))
        .unwrap();
    let provider = fx.provider.clone();
    settle("suspended", || provider.call_count() >= 2).await;
    // Give the waiter a moment to install.
    tokio::time::sleep(Duration::from_millis(30)).await;

    runtime.stop().await;
    assert_eq!(rx.await.unwrap().unwrap_err(), "agent stopped");

    let rt = runtime.clone();
    settle("idle after stop", || rt.snapshot().status == sg_core::AgentStatus::Idle).await;
}

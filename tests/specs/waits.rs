// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::support::{settle, Harness};
use sg_core::AgentId;

// A karou turn suspends on waitForMessage, the process
// restarts, and a reply written after the restart resumes the turn with
// the synthetic tool result instead of re-reading the instruction.
#[tokio::test]
async fn wait_survives_a_restart_and_resumes_on_the_reply() {
    let h = Harness::start();
    h.provider.push_text("TOOL:waitForMessage timeoutMs=60000");

    let thread = h.daemon.coordinator().create_thread("patience").unwrap();
    let tid = thread.id.clone();
    h.drop_message(
        AgentId::Karou,
        AgentId::Shogun,
        &format!("{tid}__2026-08-01T00-00-00-000Z-sgr4nd__collect"),
        "gather the reports",
    );

    // The turn suspends: a pending wait record exists on disk.
    let wait_path = h.base.join(format!("waits/pending/{tid}__karou.json"));
    let wp = wait_path.clone();
    settle("wait record persisted", || wp.exists()).await;

    // "Kill" the process: tear the daemon down with the wait pending.
    let dir = h.stop().await;

    // Restart over the same state; the reply arrives afterwards.
    let h = Harness::start_in(dir);
    h.provider.push_text(""); // response after the wait result
    h.drop_message(
        AgentId::Karou,
        AgentId::Ashigaru(1),
        &format!("{tid}__2026-08-01T00-01-00-000Z-a1r4nd__reply"),
        "done",
    );

    let harness = &h;
    settle("resumed turn got the wait result", || {
        harness
            .turn_inputs()
            .iter()
            .any(|i| i.starts_with("TOOL_RESULT waitForMessage:"))
    })
    .await;

    let inputs = h.turn_inputs();
    let resumed = inputs
        .iter()
        .find(|i| i.starts_with("TOOL_RESULT waitForMessage:"))
        .unwrap();
    assert!(resumed.contains(r#""status":"message""#), "got: {resumed}");
    assert!(resumed.contains(r#""body":"done""#));
    // The original instruction is not re-read; the provider only sees
    // the outcome of the wait it suspended on.
    assert!(!resumed.contains("gather the reports"));
    assert!(inputs.iter().all(|i| !i.contains("gather the reports")));
    assert_eq!(
        inputs
            .iter()
            .filter(|i| i.starts_with("TOOL_RESULT waitForMessage:"))
            .count(),
        1,
        "the suspended turn resumes exactly once"
    );

    // The wait record is cleared once the resumed turn completes.
    let wp = wait_path.clone();
    settle("wait record cleared", || !wp.exists()).await;

    h.stop().await;
}

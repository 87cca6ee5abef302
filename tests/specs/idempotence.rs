// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::support::{settle, Harness};
use sg_core::AgentId;

// The history append landed but the handler did not complete
// (here: the provider was down). After restart the file in the
// processing tier is re-delivered; the history write is skipped and the
// handler runs once in effect.
#[tokio::test]
async fn history_survives_and_handler_retries_after_a_failed_turn() {
    let h = Harness::start();
    h.provider.fail_when_exhausted(Some("provider down".to_string()));

    let thread = h.daemon.coordinator().create_thread("flaky").unwrap();
    let tid = thread.id.clone();
    h.drop_message(
        AgentId::Shogun,
        AgentId::King,
        &format!("{tid}__2026-08-01T00-00-00-000Z-kgr4nd__task"),
        "try this",
    );

    // History is appended before the handler; the failed turn leaves the
    // file in the processing tier.
    let coordinator = h.daemon.coordinator();
    settle("history appended", || {
        coordinator.list_messages(&tid).map(|m| m.len()).unwrap_or(0) == 1
    })
    .await;
    let processing = h
        .base
        .join("message_processing/shogun/from/king")
        .join(format!("{tid}__2026-08-01T00-00-00-000Z-kgr4nd__task.md"));
    let p = processing.clone();
    settle("file stays in processing", || p.exists()).await;

    let dir = h.stop().await;

    // Restart with a healthy provider: the rescan re-delivers.
    let h = Harness::start_in(dir);
    h.provider.push_text("");

    let harness = &h;
    settle("file archived after retry", || {
        !harness.archived(&tid, AgentId::Shogun, AgentId::King).is_empty()
    })
    .await;

    // Still exactly one history entry for the message.
    let history = h.daemon.coordinator().list_messages(&tid).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].body, "try this");
    // The retried turn ran exactly once on the new provider.
    assert_eq!(h.turn_inputs().len(), 1);
    assert!(!processing.exists());

    h.stop().await;
}

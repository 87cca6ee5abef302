// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::support::{settle, Harness};
use sg_core::AgentId;

// The king submits an instruction; the watcher routes it to
// the shogun, whose tool call fans a sub-task out to the karou.
#[tokio::test]
async fn king_instruction_fans_out_to_the_karou() {
    let h = Harness::start();
    h.provider.push_text(r#"TOOL:sendMessage to=karou title="sub" body="A""#);
    h.provider.push_text("");
    h.provider.push_text(""); // karou's turn on the sub-task

    let coordinator = h.daemon.coordinator();
    let thread = coordinator.create_thread("expedition").unwrap();
    coordinator.submit_king_message(&thread.id, "調査して", Some("task")).unwrap();

    // The pending king file exists until the watcher claims it.
    let pending = h.pending(AgentId::Shogun, AgentId::King);
    assert!(
        pending.len() <= 1,
        "at most one pending king file, got {pending:?}"
    );

    // The sub-task reaches the karou and is eventually archived under the
    // thread's history.
    let harness = &h;
    let tid = thread.id.clone();
    settle("karou received the sub-task", || {
        !harness.archived(&tid, AgentId::Karou, AgentId::Shogun).is_empty()
    })
    .await;

    let archived = h.archived(&thread.id, AgentId::Karou, AgentId::Shogun);
    assert_eq!(archived.len(), 1);
    let parsed = sg_core::parse_stem(&archived[0]);
    assert_eq!(parsed.thread_id.as_deref(), Some(thread.id.as_str()));
    assert_eq!(parsed.title, "sub");

    // The karou saw body "A" from the shogun.
    let inputs = h.turn_inputs();
    let karou_turn = inputs.iter().find(|i| i.contains("FROM: shogun")).unwrap();
    assert!(karou_turn.contains("\nA"), "got: {karou_turn}");

    // The original king file is archived too, and history holds both
    // deliveries exactly once.
    settle("king file archived", || {
        !harness.archived(&tid, AgentId::Shogun, AgentId::King).is_empty()
    })
    .await;
    let history = coordinator.list_messages(&thread.id).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].body, "調査して");
    assert_eq!(history[1].body, "A");

    h.stop().await;
}

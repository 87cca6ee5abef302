// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::support::{settle, Harness};
use sg_core::AgentId;

// Tool-less provider output is forwarded to the superior as
// an auto-reply.
#[tokio::test]
async fn tool_less_ashigaru_output_auto_replies_to_the_karou() {
    let h = Harness::start();
    h.provider.push_text("ashigaru1"); // ashigaru1's whole reply
    h.provider.push_text(""); // karou's turn on the auto-reply

    let thread = h.daemon.coordinator().create_thread("rollcall").unwrap();
    h.drop_message(
        AgentId::Ashigaru(1),
        AgentId::Karou,
        &format!("{}__2026-08-01T00-00-00-000Z-k1r4nd__rollcall", thread.id),
        "reply with your name only",
    );

    let harness = &h;
    let tid = thread.id.clone();
    settle("auto-reply archived at the karou", || {
        !harness.archived(&tid, AgentId::Karou, AgentId::Ashigaru(1)).is_empty()
    })
    .await;

    let archived = h.archived(&thread.id, AgentId::Karou, AgentId::Ashigaru(1));
    assert_eq!(archived.len(), 1);
    let parsed = sg_core::parse_stem(&archived[0]);
    assert_eq!(parsed.title, "auto-reply-rollcall");

    let history = h.daemon.coordinator().list_messages(&thread.id).unwrap();
    let reply = history.iter().find(|m| m.from == AgentId::Ashigaru(1)).unwrap();
    assert_eq!(reply.body, "ashigaru1");
    assert_eq!(reply.to, AgentId::Karou);

    h.stop().await;
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::support::{settle, Harness};
use sg_core::AgentId;

// An ashigaru addressing the shogun is denied; no file is
// written and the tool result reports the denial.
#[tokio::test]
async fn ashigaru_to_shogun_send_is_denied() {
    let h = Harness::start();
    h.provider.push_text(r#"TOOL:sendMessage to=shogun title="x" body="y""#);
    h.provider.push_text("");

    let thread = h.daemon.coordinator().create_thread("mutiny").unwrap();
    h.drop_message(
        AgentId::Ashigaru(1),
        AgentId::Karou,
        &format!("{}__2026-08-01T00-00-00-000Z-k1r4nd__task", thread.id),
        "do it",
    );

    let harness = &h;
    settle("denied tool result returned to the provider", || {
        harness
            .turn_inputs()
            .iter()
            .any(|i| i.contains(r#""status":"denied""#))
    })
    .await;

    let inputs = h.turn_inputs();
    let denial = inputs.iter().find(|i| i.contains(r#""status":"denied""#)).unwrap();
    assert!(denial.contains(r#""to":["shogun"]"#), "got: {denial}");

    // Nothing was ever written toward the shogun.
    assert!(h.pending(AgentId::Shogun, AgentId::Ashigaru(1)).is_empty());
    assert!(h.archived(&thread.id, AgentId::Shogun, AgentId::Ashigaru(1)).is_empty());

    h.stop().await;
}

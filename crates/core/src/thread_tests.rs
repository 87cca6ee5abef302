// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn generated_thread_ids_are_valid() {
    for _ in 0..20 {
        let id = new_thread_id();
        assert!(is_valid_thread_id(&id), "invalid generated id: {}", id);
    }
}

#[test]
fn thread_id_validation_rejects_delimiter() {
    assert!(is_valid_thread_id("abc-123"));
    assert!(!is_valid_thread_id("abc__123"));
    assert!(!is_valid_thread_id(""));
}

#[test]
fn touch_updates_only_updated_at() {
    let t0 = chrono::Utc::now();
    let mut thread = Thread::new("t1", "research", t0);
    let t1 = t0 + chrono::Duration::seconds(5);
    thread.touch(t1);
    assert_eq!(thread.created_at, t0);
    assert_eq!(thread.updated_at, t1);
}

#[test]
fn session_bindings_round_trip_by_agent() {
    let mut thread = Thread::new("t1", "research", chrono::Utc::now());
    assert!(thread.session(AgentId::Karou).is_none());

    thread.set_session(
        AgentId::Karou,
        SessionBinding {
            provider: "cli".to_string(),
            provider_thread_id: "p-123".to_string(),
            initialized: false,
        },
    );

    let binding = thread.session(AgentId::Karou).unwrap();
    assert_eq!(binding.provider_thread_id, "p-123");
    assert!(!binding.initialized);

    let json = serde_json::to_value(&thread).unwrap();
    assert_eq!(json["sessions"]["karou"]["providerThreadId"], "p-123");
    assert_eq!(json["createdAt"], json["updatedAt"]);
}

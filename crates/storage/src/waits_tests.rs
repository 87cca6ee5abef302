// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

fn pending_record(thread: &str, agent: AgentId) -> WaitRecord {
    let now = Utc::now();
    WaitRecord {
        status: WaitStatus::Pending,
        thread_id: thread.to_string(),
        agent_id: agent,
        provider_thread_id: "p-1".to_string(),
        timeout_ms: 60_000,
        message_id: "t1__ts-r__task".to_string(),
        from: AgentId::Shogun,
        to: agent,
        title: "task".to_string(),
        message_created_at: now,
        created_at: now,
        updated_at: now,
        received_at: None,
        received_message: None,
    }
}

fn reply(thread: &str) -> Message {
    Message {
        id: format!("{}__ts2-r2__reply", thread),
        thread_id: thread.to_string(),
        from: AgentId::Ashigaru(1),
        to: AgentId::Karou,
        title: "reply".to_string(),
        body: "done".to_string(),
        created_at: Utc::now(),
    }
}

#[test]
fn put_get_clear_round_trip() {
    let dir = tempdir().unwrap();
    let store = WaitStore::new(dir.path().join("waits/pending"));

    assert!(store.get("t1", AgentId::Karou).is_none());

    store.put(&pending_record("t1", AgentId::Karou)).unwrap();
    let loaded = store.get("t1", AgentId::Karou).unwrap();
    assert_eq!(loaded.status, WaitStatus::Pending);
    assert_eq!(loaded.timeout_ms, 60_000);

    store.clear("t1", AgentId::Karou).unwrap();
    assert!(store.get("t1", AgentId::Karou).is_none());
    // Clearing again is fine.
    store.clear("t1", AgentId::Karou).unwrap();
}

#[test]
fn mark_received_stores_the_message() {
    let dir = tempdir().unwrap();
    let store = WaitStore::new(dir.path());
    store.put(&pending_record("t1", AgentId::Karou)).unwrap();

    let msg = reply("t1");
    let record = store
        .mark_received("t1", AgentId::Karou, &msg, Utc::now())
        .unwrap()
        .unwrap();
    assert_eq!(record.status, WaitStatus::Received);
    assert_eq!(record.received_message.as_ref().unwrap().body, "done");
    assert!(record.received_at.is_some());
}

#[test]
fn transitions_from_final_states_are_ignored() {
    let dir = tempdir().unwrap();
    let store = WaitStore::new(dir.path());
    store.put(&pending_record("t1", AgentId::Karou)).unwrap();

    store.mark_timeout("t1", AgentId::Karou, Utc::now()).unwrap();
    let record = store
        .mark_received("t1", AgentId::Karou, &reply("t1"), Utc::now())
        .unwrap()
        .unwrap();
    assert_eq!(record.status, WaitStatus::Timeout, "final state must not regress");
    assert!(record.received_message.is_none());
}

#[test]
fn missing_record_transitions_return_none() {
    let dir = tempdir().unwrap();
    let store = WaitStore::new(dir.path());
    assert!(store.mark_timeout("t1", AgentId::Karou, Utc::now()).unwrap().is_none());
    assert!(store
        .mark_received("t1", AgentId::Karou, &reply("t1"), Utc::now())
        .unwrap()
        .is_none());
}

#[test]
fn list_and_filter_by_agent() {
    let dir = tempdir().unwrap();
    let store = WaitStore::new(dir.path());

    store.put(&pending_record("t1", AgentId::Karou)).unwrap();
    store.put(&pending_record("t2", AgentId::Shogun)).unwrap();
    store.put(&pending_record("t3", AgentId::Karou)).unwrap();

    assert_eq!(store.list().unwrap().len(), 3);
    let karou = store.for_agent(AgentId::Karou).unwrap();
    assert_eq!(karou.len(), 2);
    assert!(karou.iter().all(|r| r.agent_id == AgentId::Karou));
}

#[test]
fn record_serializes_camel_case() {
    let record = pending_record("t1", AgentId::Karou);
    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(value["status"], "pending");
    assert_eq!(value["threadId"], "t1");
    assert_eq!(value["agentId"], "karou");
    assert_eq!(value["timeoutMs"], 60_000);
    assert_eq!(value["messageId"], "t1__ts-r__task");
    assert!(value.get("receivedMessage").is_none());
}

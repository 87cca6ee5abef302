// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::agents::ManagerDeps;
use crate::provider::fake::FakeProvider;
use chrono::Utc;
use sg_core::{format_stem, new_rand_token, AgentId, Role, SystemClock, Thread};
use sg_storage::{HistoryStore, WaitStore};
use std::collections::HashMap;
use tempfile::tempdir;

fn build(
    base: &std::path::Path,
    provider: Arc<FakeProvider>,
) -> (MessageRouter<SystemClock>, Arc<StateStore>, EventBus) {
    let state = Arc::new(StateStore::open(base.join("state.json")).unwrap());
    state.insert_thread(Thread::new("t1", "routing", Utc::now())).unwrap();
    let events = EventBus::new();
    let dyn_provider: Arc<dyn crate::provider::ProviderAdapter> = provider;
    let providers: HashMap<Role, _> = [
        (Role::Shogun, dyn_provider.clone()),
        (Role::Karou, dyn_provider.clone()),
        (Role::Ashigaru, dyn_provider),
    ]
    .into_iter()
    .collect();
    let manager = AgentManager::new(ManagerDeps {
        providers,
        state: state.clone(),
        history: Arc::new(HistoryStore::new(base.join("history"))),
        waits: Arc::new(WaitStore::new(base.join("waits/pending"))),
        events: events.clone(),
        clock: SystemClock,
        base_dir: base.to_path_buf(),
        history_dir: base.join("history"),
        working_dir: base.to_path_buf(),
        ashigaru_count: 2,
        ashigaru_profiles: HashMap::new(),
    })
    .unwrap();
    (MessageRouter::new(manager, state.clone(), events.clone(), SystemClock), state, events)
}

fn message(to: AgentId) -> Message {
    let now = Utc::now();
    Message {
        id: format_stem("t1", "task", now, &new_rand_token()),
        thread_id: "t1".to_string(),
        from: AgentId::King,
        to,
        title: "task".to_string(),
        body: "b".to_string(),
        created_at: now,
    }
}

#[tokio::test]
async fn routed_messages_touch_the_thread_and_emit_an_event() {
    let dir = tempdir().unwrap();
    let provider = Arc::new(FakeProvider::new());
    provider.push_text("");
    let (router, state, events) = build(dir.path(), provider);
    let mut rx = events.subscribe();

    let before = state.get_thread("t1").unwrap().updated_at;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    router.handle(message(AgentId::Shogun)).await.unwrap();

    assert!(state.get_thread("t1").unwrap().updated_at > before);
    let mut saw_message_event = false;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, TransportEvent::Message { .. }) {
            saw_message_event = true;
        }
    }
    assert!(saw_message_event);
}

#[tokio::test]
async fn king_messages_are_surfaced_but_not_dispatched() {
    let dir = tempdir().unwrap();
    let provider = Arc::new(FakeProvider::new());
    let (router, _state, events) = build(dir.path(), provider.clone());
    let mut rx = events.subscribe();

    router.handle(message(AgentId::King)).await.unwrap();

    assert_eq!(provider.call_count(), 0, "no runtime runs for the king");
    let event = rx.try_recv().unwrap();
    assert!(matches!(event, TransportEvent::Message { message } if message.to == AgentId::King));
}

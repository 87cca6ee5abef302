// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::provider::fake::FakeProvider;
use chrono::Utc;
use sg_core::{format_stem, new_rand_token, SystemClock, Thread};
use std::time::Duration;
use tempfile::{tempdir, TempDir};

struct Fixture {
    _dir: TempDir,
    base: PathBuf,
    provider: Arc<FakeProvider>,
    state: Arc<StateStore>,
    events: EventBus,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let base = dir.path().to_path_buf();
        let state = Arc::new(StateStore::open(base.join("state.json")).unwrap());
        state.insert_thread(Thread::new("t1", "fixture", Utc::now())).unwrap();
        Self {
            _dir: dir,
            base,
            provider: Arc::new(FakeProvider::new()),
            state,
            events: EventBus::new(),
        }
    }

    fn manager(&self, ashigaru_count: u32) -> Arc<AgentManager<SystemClock>> {
        let provider: Arc<dyn ProviderAdapter> = self.provider.clone();
        let providers: HashMap<Role, Arc<dyn ProviderAdapter>> = [
            (Role::Shogun, provider.clone()),
            (Role::Karou, provider.clone()),
            (Role::Ashigaru, provider),
        ]
        .into_iter()
        .collect();
        AgentManager::new(ManagerDeps {
            providers,
            state: self.state.clone(),
            history: Arc::new(HistoryStore::new(self.base.join("history"))),
            waits: Arc::new(WaitStore::new(self.base.join("waits/pending"))),
            events: self.events.clone(),
            clock: SystemClock,
            base_dir: self.base.clone(),
            history_dir: self.base.join("history"),
            working_dir: self.base.clone(),
            ashigaru_count,
            ashigaru_profiles: HashMap::new(),
        })
        .unwrap()
    }

    fn message(&self, to: AgentId, title: &str, body: &str) -> Message {
        let now = Utc::now();
        Message {
            id: format_stem("t1", title, now, &new_rand_token()),
            thread_id: "t1".to_string(),
            from: AgentId::King,
            to,
            title: title.to_string(),
            body: body.to_string(),
            created_at: now,
        }
    }
}

#[tokio::test]
async fn fleet_has_fixed_roles_plus_k_ashigaru() {
    let fx = Fixture::new();
    let manager = fx.manager(4);

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.len(), 6);
    assert_eq!(snapshot[0].id, AgentId::Shogun);
    assert_eq!(snapshot[1].id, AgentId::Karou);
    assert_eq!(snapshot[2].id, AgentId::Ashigaru(1));
    assert_eq!(snapshot[5].id, AgentId::Ashigaru(4));

    // Scratch dirs exist for bodyFile resolution.
    assert!(fx.base.join("tmp/shogun").is_dir());
    assert!(fx.base.join("tmp/ashigaru4").is_dir());
}

#[tokio::test]
async fn missing_provider_is_a_construction_error() {
    let fx = Fixture::new();
    let provider: Arc<dyn ProviderAdapter> = fx.provider.clone();
    let providers: HashMap<Role, Arc<dyn ProviderAdapter>> =
        [(Role::Shogun, provider)].into_iter().collect();
    let result = AgentManager::new(ManagerDeps {
        providers,
        state: fx.state.clone(),
        history: Arc::new(HistoryStore::new(fx.base.join("history"))),
        waits: Arc::new(WaitStore::new(fx.base.join("waits/pending"))),
        events: fx.events.clone(),
        clock: SystemClock,
        base_dir: fx.base.clone(),
        history_dir: fx.base.join("history"),
        working_dir: fx.base.clone(),
        ashigaru_count: 2,
        ashigaru_profiles: HashMap::new(),
    });
    assert!(matches!(result, Err(ManagerError::MissingProvider(Role::Karou))));
}

#[tokio::test]
async fn unknown_recipients_are_dropped_without_error() {
    let fx = Fixture::new();
    let manager = fx.manager(2);

    // King is a human endpoint: no runtime, message dropped here (the
    // router surfaces it to subscribers before this point).
    manager.deliver(fx.message(AgentId::King, "fyi", "x")).await.unwrap();
    // Out-of-fleet ashigaru index.
    manager.deliver(fx.message(AgentId::Ashigaru(9), "fyi", "x")).await.unwrap();
    assert_eq!(fx.provider.call_count(), 0);
}

#[tokio::test]
async fn deliver_awaits_the_turn() {
    let fx = Fixture::new();
    let manager = fx.manager(2);
    fx.provider.push_text("");

    manager.deliver(fx.message(AgentId::Shogun, "task", "run")).await.unwrap();
    assert!(fx.provider.call_count() >= 2, "seed + one turn");
}

#[tokio::test]
async fn failed_turns_surface_as_deliver_errors() {
    let fx = Fixture::new();
    let manager = fx.manager(2);
    fx.provider.push_fail("provider down");

    let err = manager.deliver(fx.message(AgentId::Shogun, "task", "run")).await.unwrap_err();
    assert!(matches!(err, DeliverError::Turn(ref reason) if reason.contains("provider down")));
}

#[tokio::test]
async fn stop_all_brackets_with_stop_events_and_idles_the_fleet() {
    let fx = Fixture::new();
    let manager = fx.manager(2);
    let mut rx = fx.events.subscribe();

    fx.provider.push_hold();
    let held = fx.message(AgentId::Shogun, "held", "x");
    let manager_clone = manager.clone();
    let deliver = tokio::spawn(async move { manager_clone.deliver(held).await });
    let provider = fx.provider.clone();
    for _ in 0..200 {
        if provider.call_count() >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    manager.stop_all().await;
    let _ = deliver.await;

    let mut stop_events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let TransportEvent::Stop { status } = event {
            stop_events.push(status);
        }
    }
    assert_eq!(stop_events, vec![StopStatus::Requested, StopStatus::Completed]);

    for snap in manager.snapshot() {
        assert_eq!(snap.status, AgentStatus::Idle, "{} not idle", snap.id);
        assert_eq!(snap.queue_size, 0);
    }
}

#[tokio::test]
async fn karou_sees_live_ashigaru_status_through_the_fleet_link() {
    let fx = Fixture::new();
    let manager = fx.manager(2);

    fx.provider.push_text("TOOL:getAshigaruStatus");
    fx.provider.push_text("");
    manager
        .deliver(fx.message(AgentId::Karou, "plan", "who is free?"))
        .await
        .unwrap();

    let result_input = fx
        .provider
        .calls()
        .into_iter()
        .map(|c| c.input)
        .find(|i| i.starts_with("TOOL_RESULT getAshigaruStatus:"))
        .unwrap();
    assert!(result_input.contains(r#""idle":["ashigaru1","ashigaru2"]"#));
    assert!(result_input.contains(r#""busy":[]"#));
}

#[tokio::test]
async fn status_changes_broadcast_full_fleet_snapshots() {
    let fx = Fixture::new();
    let manager = fx.manager(2);
    let mut rx = fx.events.subscribe();

    fx.provider.push_text("");
    manager.deliver(fx.message(AgentId::Shogun, "task", "x")).await.unwrap();

    let mut saw_fleet_snapshot = false;
    while let Ok(event) = rx.try_recv() {
        if let TransportEvent::AgentStatus { agents } = event {
            assert_eq!(agents.len(), 4, "snapshot must cover the whole fleet");
            saw_fleet_snapshot = true;
        }
    }
    assert!(saw_fleet_snapshot);
    drop(manager);
}

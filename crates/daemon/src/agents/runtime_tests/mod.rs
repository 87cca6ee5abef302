// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixture for runtime tests.

mod batching;
mod cancellation;
mod tools;
mod waits;

use super::*;
use crate::provider::fake::FakeProvider;
use chrono::Utc;
use sg_core::{format_stem, new_rand_token, SystemClock, Thread};
use sg_mailbox::MailboxRoot;
use tempfile::{tempdir, TempDir};

pub(crate) struct FakeFleet {
    pub interrupts: Mutex<Vec<(AgentId, CancelReason)>>,
    pub status: Mutex<AshigaruStatus>,
}

impl FakeFleet {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            interrupts: Mutex::new(Vec::new()),
            status: Mutex::new(AshigaruStatus::default()),
        })
    }
}

impl FleetOps for FakeFleet {
    fn ashigaru_status(&self) -> AshigaruStatus {
        self.status.lock().clone()
    }

    fn interrupt(&self, to: AgentId, reason: CancelReason) {
        self.interrupts.lock().push((to, reason));
    }
}

pub(crate) struct Fixture {
    pub _dir: TempDir,
    pub base: PathBuf,
    pub root: MailboxRoot,
    pub provider: Arc<FakeProvider>,
    pub state: Arc<StateStore>,
    pub history: Arc<HistoryStore>,
    pub waits: Arc<WaitStore>,
    pub fleet: Arc<FakeFleet>,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempdir().unwrap();
        let base = dir.path().to_path_buf();
        let state = Arc::new(StateStore::open(base.join("state.json")).unwrap());
        state.insert_thread(Thread::new("t1", "fixture", Utc::now())).unwrap();
        state.insert_thread(Thread::new("t2", "fixture-b", Utc::now())).unwrap();
        Self {
            root: MailboxRoot::new(&base),
            provider: Arc::new(FakeProvider::new()),
            state,
            history: Arc::new(HistoryStore::new(base.join("history"))),
            waits: Arc::new(WaitStore::new(base.join("waits/pending"))),
            fleet: FakeFleet::new(),
            base,
            _dir: dir,
        }
    }

    pub fn runtime(&self, id: AgentId) -> Arc<AgentRuntime<SystemClock>> {
        AgentRuntime::new(
            id,
            RuntimeDeps {
                provider: self.provider.clone(),
                writer: MessageWriter::with_clock(self.root.clone(), SystemClock),
                state: self.state.clone(),
                history: self.history.clone(),
                waits: self.waits.clone(),
                fleet: self.fleet.clone(),
                status: Arc::new(|_| {}),
                clock: SystemClock,
                working_dir: self.base.clone(),
                base_dir: self.base.clone(),
                history_dir: self.base.join("history"),
                ashigaru_count: 3,
                ashigaru_profiles: HashMap::new(),
            },
        )
    }

    pub fn message(&self, from: AgentId, to: AgentId, thread: &str, title: &str, body: &str) -> Message {
        let now = Utc::now();
        Message {
            id: format_stem(thread, title, now, &new_rand_token()),
            thread_id: thread.to_string(),
            from,
            to,
            title: sg_core::slugify(title),
            body: body.to_string(),
            created_at: now,
        }
    }

    /// Stems of pending mailbox files addressed `to` from `from`.
    pub fn outbox(&self, to: AgentId, from: AgentId) -> Vec<String> {
        let dir = self
            .root
            .pending_dir()
            .join(to.to_string())
            .join("from")
            .join(from.to_string());
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut out: Vec<String> = entries
            .flatten()
            .filter_map(|e| {
                e.file_name()
                    .to_str()
                    .and_then(|n| n.strip_suffix(".md"))
                    .map(str::to_string)
            })
            .collect();
        out.sort();
        out
    }

    pub fn outbox_body(&self, to: AgentId, from: AgentId, stem: &str) -> String {
        let path = self
            .root
            .pending_dir()
            .join(to.to_string())
            .join("from")
            .join(from.to_string())
            .join(format!("{stem}.md"));
        std::fs::read_to_string(path).unwrap()
    }

    /// Inputs of every non-seeding provider call, in order.
    pub fn turn_inputs(&self) -> Vec<String> {
        self.provider
            .calls()
            .into_iter()
            .filter(|c| !c.input.contains("Reply with only the word ACK"))
            .map(|c| c.input)
            .collect()
    }
}

/// Poll until `cond` holds, failing the test after two seconds.
pub(crate) async fn settle(what: &str, cond: impl Fn() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for: {what}");
}

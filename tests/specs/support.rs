// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared spec fixture: a daemon on real stores in a temp dir, scripted
//! fake providers, polling watchers tuned for test latency.

use sg_core::{AgentId, Role, SystemClock};
use sg_daemon::{Config, Daemon, FakeProvider, ProviderAdapter};
use sg_mailbox::{WatchMode, WatcherConfig};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub struct Harness {
    pub _dir: TempDir,
    pub base: PathBuf,
    pub provider: Arc<FakeProvider>,
    pub daemon: Daemon<SystemClock>,
}

impl Harness {
    pub fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        Self::start_in(dir)
    }

    /// Start against an existing directory; used to simulate a process
    /// restart over the same on-disk state.
    pub fn start_in(dir: TempDir) -> Self {
        let base = dir.path().join(".shogun");
        let mut config = Config::default();
        config.base_dir = base.clone();
        config.ashigaru_count = 3;

        let provider = Arc::new(FakeProvider::new());
        let dyn_provider: Arc<dyn ProviderAdapter> = provider.clone();
        let providers: HashMap<Role, Arc<dyn ProviderAdapter>> =
            [Role::Shogun, Role::Karou, Role::Ashigaru]
                .into_iter()
                .map(|role| (role, dyn_provider.clone()))
                .collect();

        let daemon = Daemon::start_with(
            config,
            providers,
            SystemClock,
            WatcherConfig {
                mode: WatchMode::Poll,
                poll_interval: Duration::from_millis(20),
                stability_threshold: Duration::from_millis(40),
                stability_poll: Duration::from_millis(10),
            },
        )
        .unwrap();

        Self { _dir: dir, base, provider, daemon }
    }

    /// Shut the daemon down and hand back the directory for a restart.
    pub async fn stop(self) -> TempDir {
        self.daemon.shutdown_handle().send(sg_daemon::ExitKind::Normal).unwrap();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.daemon.wait()).await;
        self._dir
    }

    /// Simulate an external producer dropping a pending mailbox file.
    pub fn drop_message(&self, to: AgentId, from: AgentId, stem: &str, body: &str) -> PathBuf {
        let dir = self
            .base
            .join("message_to")
            .join(to.to_string())
            .join("from")
            .join(from.to_string());
        std::fs::create_dir_all(&dir).unwrap();
        let tmp = dir.join(format!(".{stem}.tmp"));
        let target = dir.join(format!("{stem}.md"));
        std::fs::write(&tmp, body).unwrap();
        std::fs::rename(&tmp, &target).unwrap();
        target
    }

    /// Stems currently pending for `to` from `from`.
    pub fn pending(&self, to: AgentId, from: AgentId) -> Vec<String> {
        let dir = self
            .base
            .join("message_to")
            .join(to.to_string())
            .join("from")
            .join(from.to_string());
        list_stems(&dir)
    }

    /// Stems archived under a thread for `to` from `from`.
    pub fn archived(&self, thread_id: &str, to: AgentId, from: AgentId) -> Vec<String> {
        let dir = self
            .base
            .join("history")
            .join(thread_id)
            .join("message_to")
            .join(to.to_string())
            .join("from")
            .join(from.to_string());
        list_stems(&dir)
    }

    /// Inputs of every non-seeding provider call so far.
    pub fn turn_inputs(&self) -> Vec<String> {
        self.provider
            .calls()
            .into_iter()
            .filter(|c| !c.input.contains("Reply with only the word ACK"))
            .map(|c| c.input)
            .collect()
    }
}

fn list_stems(dir: &std::path::Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
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

/// Poll until `cond` holds, failing the test after five seconds.
pub async fn settle(what: &str, cond: impl Fn() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for: {what}");
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use parking_lot::Mutex;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

struct RecordingRestart {
    seen: Mutex<Vec<RestartRequest>>,
}

#[async_trait]
impl RestartHandler for RecordingRestart {
    async fn handle(&self, request: RestartRequest) -> Result<(), HandlerError> {
        self.seen.lock().push(request);
        Ok(())
    }
}

struct Fixture {
    _dir: TempDir,
    root: PathBuf,
    ledger: Arc<Ledger>,
    handler: Arc<RecordingRestart>,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let root = dir.path().join("tmp/restart");
        let ledger = Arc::new(Ledger::open(root.join("restart_ledger.json")).unwrap());
        let handler = Arc::new(RecordingRestart { seen: Mutex::new(Vec::new()) });
        Self { _dir: dir, root, ledger, handler }
    }

    fn watcher(&self) -> RestartWatcher {
        RestartWatcher::new(
            self.root.clone(),
            self.ledger.clone(),
            self.handler.clone(),
            SystemClock,
            WatcherConfig {
                mode: WatchMode::Poll,
                poll_interval: Duration::from_millis(20),
                stability_threshold: Duration::from_millis(40),
                stability_poll: Duration::from_millis(10),
            },
        )
    }
}

async fn settle(what: &str, cond: impl Fn() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for: {what}");
}

#[tokio::test]
async fn json_request_is_handled_and_archived() {
    let fx = Fixture::new();
    let watcher = fx.watcher();
    let token = watcher.shutdown_token();
    let run = tokio::spawn(async move { watcher.run().await });

    // Wait for the watcher to create its directories.
    let requests = fx.root.join("requests");
    settle("dirs", || requests.exists()).await;
    fs::write(requests.join("r1.json"), br#"{"reason":"config changed"}"#).unwrap();

    let handler = fx.handler.clone();
    settle("restart handled", || !handler.seen.lock().is_empty()).await;

    let seen = fx.handler.seen.lock().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].id, "r1");
    assert_eq!(seen[0].reason.as_deref(), Some("config changed"));

    let ledger = fx.ledger.clone();
    settle("ledger done", || ledger.is_at_least("requests/r1.json", LedgerStatus::Done)).await;
    assert!(fx.root.join("history/r1.json").exists());
    assert!(!fx.root.join("requests/r1.json").exists());
    assert!(!fx.root.join("processing/r1.json").exists());

    token.cancel();
    let _ = run.await;
}

#[tokio::test]
async fn non_json_body_falls_back_to_filename() {
    let fx = Fixture::new();
    let watcher = fx.watcher();
    let token = watcher.shutdown_token();
    let run = tokio::spawn(async move { watcher.run().await });

    let requests = fx.root.join("requests");
    settle("dirs", || requests.exists()).await;
    fs::write(requests.join("manual-restart.json"), b"please").unwrap();

    let handler = fx.handler.clone();
    settle("restart handled", || !handler.seen.lock().is_empty()).await;
    assert_eq!(fx.handler.seen.lock()[0].id, "manual-restart");
    assert_eq!(fx.handler.seen.lock()[0].reason, None);

    token.cancel();
    let _ = run.await;
}

#[tokio::test]
async fn already_done_requests_are_only_archived() {
    let fx = Fixture::new();

    // A request that was handled before a crash, left in processing.
    let processing = fx.root.join("processing");
    fs::create_dir_all(&processing).unwrap();
    fs::write(processing.join("r2.json"), b"{}").unwrap();
    fx.ledger
        .mark("requests/r2.json", LedgerStatus::JobDone, chrono::Utc::now())
        .unwrap();

    let watcher = fx.watcher();
    let token = watcher.shutdown_token();
    let run = tokio::spawn(async move { watcher.run().await });

    let ledger = fx.ledger.clone();
    settle("ledger done", || ledger.is_at_least("requests/r2.json", LedgerStatus::Done)).await;
    assert!(fx.handler.seen.lock().is_empty(), "handler must not run twice");
    assert!(fx.root.join("history/r2.json").exists());

    token.cancel();
    let _ = run.await;
}

#[tokio::test]
async fn non_json_extensions_are_ignored() {
    let fx = Fixture::new();
    let watcher = fx.watcher();
    let token = watcher.shutdown_token();
    let run = tokio::spawn(async move { watcher.run().await });

    let requests = fx.root.join("requests");
    settle("dirs", || requests.exists()).await;
    fs::write(requests.join("notes.txt"), b"x").unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(fx.handler.seen.lock().is_empty());
    assert!(requests.join("notes.txt").exists());

    token.cancel();
    let _ = run.await;
}

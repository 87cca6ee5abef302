// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restart-request watcher.
//!
//! Same two-phase shape as the mailbox watcher, over
//! `tmp/restart/{requests,processing,history}/*.json` with its own ledger.
//! The handler performs orderly shutdown; a supervising launcher treats
//! exit code 75 as "respawn".

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notify::{RecommendedWatcher, RecursiveMode, Watcher as _};
use serde::Deserialize;
use sg_core::{Clock, SystemClock};
use sg_storage::{Ledger, LedgerStatus};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::watcher::{HandlerError, WatchMode, WatcherConfig, WatcherError};
use crate::writer::mtime_utc;

const REQUESTS_DIR: &str = "requests";
const PROCESSING_DIR: &str = "processing";
const HISTORY_DIR: &str = "history";

/// One parsed restart request.
#[derive(Debug, Clone, PartialEq)]
pub struct RestartRequest {
    pub id: String,
    pub reason: Option<String>,
    pub requested_at: DateTime<Utc>,
}

/// Optional JSON body of a request file; anything missing falls back to
/// the filename stem and mtime.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawRequest {
    id: Option<String>,
    reason: Option<String>,
    requested_at: Option<DateTime<Utc>>,
}

/// Application side of the restart queue. Completing without error marks
/// the request done; in practice the handler stops the fleet and arranges
/// process exit 75.
#[async_trait]
pub trait RestartHandler: Send + Sync {
    async fn handle(&self, request: RestartRequest) -> Result<(), HandlerError>;
}

/// Watcher over the restart-request queue.
#[derive(Clone)]
pub struct RestartWatcher<C: Clock = SystemClock> {
    inner: Arc<RestartInner<C>>,
}

struct RestartInner<C: Clock> {
    /// The `tmp/restart` directory.
    root: PathBuf,
    ledger: Arc<Ledger>,
    handler: Arc<dyn RestartHandler>,
    clock: C,
    config: WatcherConfig,
    shutdown: CancellationToken,
}

impl<C: Clock> RestartWatcher<C> {
    pub fn new(
        root: impl Into<PathBuf>,
        ledger: Arc<Ledger>,
        handler: Arc<dyn RestartHandler>,
        clock: C,
        config: WatcherConfig,
    ) -> Self {
        Self {
            inner: Arc::new(RestartInner {
                root: root.into(),
                ledger,
                handler,
                clock,
                config,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    /// Rescan both tiers once and then watch until shutdown.
    pub async fn run(&self) -> Result<(), WatcherError> {
        fs::create_dir_all(self.inner.requests_dir())?;
        fs::create_dir_all(self.inner.processing_dir())?;
        fs::create_dir_all(self.inner.history_dir())?;

        self.rescan().await;

        match self.inner.config.mode {
            WatchMode::Poll => self.inner.clone().poll_loop().await,
            WatchMode::Native => self.inner.clone().native_loop().await,
        }
    }

    /// Re-observe every existing request and in-flight file.
    pub async fn rescan(&self) {
        for path in self.inner.scan() {
            let inner = self.inner.clone();
            tokio::spawn(async move { inner.observe(path).await });
        }
    }
}

impl<C: Clock> RestartInner<C> {
    fn requests_dir(&self) -> PathBuf {
        self.root.join(REQUESTS_DIR)
    }

    fn processing_dir(&self) -> PathBuf {
        self.root.join(PROCESSING_DIR)
    }

    fn history_dir(&self) -> PathBuf {
        self.root.join(HISTORY_DIR)
    }

    fn scan(&self) -> Vec<PathBuf> {
        let mut out = Vec::new();
        for dir in [self.requests_dir(), self.processing_dir()] {
            let Ok(entries) = fs::read_dir(&dir) else { continue };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_file() {
                    out.push(path);
                }
            }
        }
        out
    }

    async fn poll_loop(self: Arc<Self>) -> Result<(), WatcherError> {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("restart watcher stopping");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {
                    for path in self.scan() {
                        let inner = self.clone();
                        tokio::spawn(async move { inner.observe(path).await });
                    }
                }
            }
        }
    }

    async fn native_loop(self: Arc<Self>) -> Result<(), WatcherError> {
        let (tx, mut rx) = mpsc::channel::<Result<notify::Event, notify::Error>>(64);
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.blocking_send(res);
            },
            notify::Config::default(),
        )?;
        watcher.watch(&self.requests_dir(), RecursiveMode::NonRecursive)?;
        watcher.watch(&self.processing_dir(), RecursiveMode::NonRecursive)?;
        info!(root = %self.root.display(), "watching restart requests");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("restart watcher stopping");
                    return Ok(());
                }
                event = rx.recv() => {
                    match event {
                        None => return Ok(()),
                        Some(Err(e)) => warn!(err = %e, "restart watch error"),
                        Some(Ok(event)) => {
                            for path in event.paths {
                                let inner = self.clone();
                                tokio::spawn(async move { inner.observe(path).await });
                            }
                        }
                    }
                }
            }
        }
    }

    async fn observe(self: Arc<Self>, path: PathBuf) {
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            return;
        }
        let Some(parent) = path.parent() else { return };
        if parent == self.requests_dir() {
            self.claim(&path);
        } else if parent == self.processing_dir() {
            self.process(&path).await;
        }
    }

    /// Claim phase: rename into the processing tier.
    fn claim(&self, path: &Path) {
        let Some(name) = path.file_name() else { return };
        let dst = self.processing_dir().join(name);
        match fs::rename(path, &dst) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "restart request already claimed");
            }
            Err(e) => warn!(path = %path.display(), err = %e, "restart claim failed"),
        }
    }

    /// Process phase: parse, invoke the restart handler, archive.
    async fn process(&self, path: &Path) {
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            return;
        };
        let Ok(meta) = fs::metadata(path) else {
            return; // already archived
        };
        let Ok(body) = fs::read_to_string(path) else {
            return;
        };

        let stem = name.strip_suffix(".json").unwrap_or(&name);
        let raw: RawRequest = match serde_json::from_str(&body) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path.display(), err = %e, "non-JSON restart body, using filename");
                RawRequest::default()
            }
        };
        let request = RestartRequest {
            id: raw.id.unwrap_or_else(|| stem.to_string()),
            reason: raw.reason,
            requested_at: raw.requested_at.unwrap_or_else(|| mtime_utc(&meta)),
        };

        let key = format!("{REQUESTS_DIR}/{name}");
        if !self.ledger.is_at_least(&key, LedgerStatus::JobDone) {
            info!(id = %request.id, reason = ?request.reason, "restart requested");
            if let Err(e) = self.handler.handle(request).await {
                warn!(path = %path.display(), err = %e, "restart handler failed");
                return;
            }
            if let Err(e) = self.ledger.mark(&key, LedgerStatus::JobDone, self.clock.now_utc()) {
                warn!(path = %path.display(), err = %e, "restart ledger mark failed");
                return;
            }
        }

        let archive = self.history_dir().join(&name);
        match fs::rename(path, &archive) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && archive.exists() => {}
            Err(e) => {
                warn!(path = %path.display(), err = %e, "restart archive failed");
                return;
            }
        }
        if let Err(e) = self.ledger.mark(&key, LedgerStatus::Done, self.clock.now_utc()) {
            warn!(path = %path.display(), err = %e, "restart ledger mark failed");
        }
    }
}

#[cfg(test)]
#[path = "restart_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Two-phase mailbox watcher with a monotonic ledger.
//!
//! Claim phase: a file observed in `message_to/` is renamed to its mirror
//! path under `message_processing/`; the rename has no other side effect
//! and losing the race to another claimer is not an error. Process phase:
//! a file observed in `message_processing/` is read, parsed, appended to
//! history, handed to the application handler, and archived, each step
//! gated by the ledger so re-processing after a crash never repeats a
//! side effect. Files whose handler fails stay in the processing tier and
//! are retried on the next startup rescan.

use async_trait::async_trait;
use notify::{RecommendedWatcher, RecursiveMode, Watcher as _};
use parking_lot::Mutex;
use sg_core::{is_valid_slug, parse_stem, Clock, Message, SystemClock};
use sg_storage::{HistoryStore, Ledger, LedgerStatus, StateStore};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::paths::{MailboxAddress, MailboxRoot, MailboxTier};
use crate::writer::mtime_utc;

/// Error type application handlers may return; failures leave the file in
/// the processing tier for retry.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Application side of the mailbox: invoked once per delivered message
/// (in effect), after the history append.
#[async_trait]
pub trait MailboxHandler: Send + Sync {
    async fn handle(&self, message: Message) -> Result<(), HandlerError>;
}

/// How the watcher observes the directory tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchMode {
    /// Native filesystem events.
    Native,
    /// Periodic directory scans; selected by env toggle or test mode.
    Poll,
}

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub mode: WatchMode,
    pub poll_interval: Duration,
    /// A file must hold still this long before it is read.
    pub stability_threshold: Duration,
    pub stability_poll: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            mode: WatchMode::Native,
            poll_interval: Duration::from_millis(500),
            stability_threshold: Duration::from_millis(200),
            stability_poll: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("watch error: {0}")]
    Notify(#[from] notify::Error),
}

/// The mailbox watcher. Cheap to clone; `run` drives it until the
/// shutdown token fires.
#[derive(Clone)]
pub struct MailboxWatcher<C: Clock = SystemClock> {
    inner: Arc<WatcherInner<C>>,
}

struct WatcherInner<C: Clock> {
    root: MailboxRoot,
    ledger: Arc<Ledger>,
    history: Arc<HistoryStore>,
    state: Arc<StateStore>,
    handler: Arc<dyn MailboxHandler>,
    clock: C,
    config: WatcherConfig,
    /// At most one in-flight execution per absolute path, process-wide.
    inflight: Mutex<HashSet<PathBuf>>,
    shutdown: CancellationToken,
}

impl<C: Clock> MailboxWatcher<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        root: MailboxRoot,
        ledger: Arc<Ledger>,
        history: Arc<HistoryStore>,
        state: Arc<StateStore>,
        handler: Arc<dyn MailboxHandler>,
        clock: C,
        config: WatcherConfig,
    ) -> Self {
        Self {
            inner: Arc::new(WatcherInner {
                root,
                ledger,
                history,
                state,
                handler,
                clock,
                config,
                inflight: Mutex::new(HashSet::new()),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Token that stops the watch loop when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    /// Rescan both tiers once and then watch until shutdown.
    pub async fn run(&self) -> Result<(), WatcherError> {
        fs::create_dir_all(self.inner.root.pending_dir())?;
        fs::create_dir_all(self.inner.root.processing_dir())?;

        self.rescan().await;

        match self.inner.config.mode {
            WatchMode::Poll => self.inner.clone().poll_loop().await,
            WatchMode::Native => self.inner.clone().native_loop().await,
        }
    }

    /// Emit a synthetic event for every file already present in the
    /// watched tiers: pending files are re-claimed, processing files are
    /// re-processed. The ledger makes repetition safe. Files are handled
    /// concurrently; this returns once every event is in flight, since a
    /// resumed turn may legitimately outlast startup.
    pub async fn rescan(&self) {
        for dir in [self.inner.root.pending_dir(), self.inner.root.processing_dir()] {
            for path in collect_files(&dir) {
                let inner = self.inner.clone();
                tokio::spawn(async move { inner.observe(path).await });
            }
        }
    }
}

impl<C: Clock> WatcherInner<C> {
    async fn poll_loop(self: Arc<Self>) -> Result<(), WatcherError> {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("mailbox watcher stopping");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {
                    for dir in [self.root.pending_dir(), self.root.processing_dir()] {
                        for path in collect_files(&dir) {
                            let inner = self.clone();
                            tokio::spawn(async move { inner.observe(path).await });
                        }
                    }
                }
            }
        }
    }

    async fn native_loop(self: Arc<Self>) -> Result<(), WatcherError> {
        let (tx, mut rx) = mpsc::channel::<Result<notify::Event, notify::Error>>(256);

        // notify callbacks run on a notify-internal thread; forward them
        // onto the async executor.
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.blocking_send(res);
            },
            notify::Config::default(),
        )?;
        watcher.watch(&self.root.pending_dir(), RecursiveMode::Recursive)?;
        watcher.watch(&self.root.processing_dir(), RecursiveMode::Recursive)?;
        info!(base = %self.root.base().display(), "watching mailbox");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("mailbox watcher stopping");
                    return Ok(());
                }
                event = rx.recv() => {
                    match event {
                        None => return Ok(()),
                        Some(Err(e)) => warn!(err = %e, "mailbox watch error"),
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

    /// Entry point for one observed path, from any source (startup
    /// rescan, poll scan, native event).
    async fn observe(self: Arc<Self>, path: PathBuf) {
        let Some(addr) = self.root.classify(&path) else {
            debug!(path = %path.display(), "ignoring out-of-grammar path");
            return;
        };
        match addr.tier {
            MailboxTier::Pending => self.claim(addr).await,
            MailboxTier::Processing => self.process(addr).await,
        }
    }

    /// Claim phase: rename pending → processing. No other side effect.
    async fn claim(self: Arc<Self>, addr: MailboxAddress) {
        let src = addr.path_in(&self.root);
        if self.await_write_finish(&src).await.is_none() {
            return; // vanished; another actor claimed it
        }
        let claimed = addr.claimed();
        let dst = claimed.path_in(&self.root);
        if let Some(parent) = dst.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!(path = %dst.display(), err = %e, "could not prepare processing dir");
                return;
            }
        }
        match fs::rename(&src, &dst) {
            Ok(()) => self.process(claimed).await,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %src.display(), "already claimed");
            }
            Err(e) => warn!(path = %src.display(), err = %e, "claim failed"),
        }
    }

    /// Process phase: read, parse, deliver, archive, each step gated by
    /// the ledger.
    async fn process(self: Arc<Self>, addr: MailboxAddress) {
        let path = addr.path_in(&self.root);
        if !self.inflight.lock().insert(path.clone()) {
            return;
        }
        self.process_inner(&addr, &path).await;
        self.inflight.lock().remove(&path);
    }

    async fn process_inner(&self, addr: &MailboxAddress, path: &Path) {
        let Ok(meta) = fs::metadata(path) else {
            return; // gone (already archived); nothing to do
        };
        let created_at = mtime_utc(&meta);
        let Ok(body) = fs::read_to_string(path) else {
            return;
        };

        let parsed = parse_stem(&addr.stem);
        if !is_valid_slug(&parsed.title) {
            warn!(path = %path.display(), "filename violates the title grammar, ignoring");
            return;
        }
        let thread_id = match parsed.thread_id.or_else(|| self.state.last_active_thread()) {
            Some(id) => id,
            None => {
                warn!(path = %path.display(), "no thread id and no last-active thread");
                return;
            }
        };
        if !self.state.thread_exists(&thread_id) {
            warn!(%thread_id, path = %path.display(), "message references unknown thread");
        }

        let message = Message {
            id: addr.stem.clone(),
            thread_id: thread_id.clone(),
            from: addr.from,
            to: addr.to,
            title: parsed.title,
            body,
            created_at,
        };
        let key = addr.idempotency_key();
        let message_id = message.id.clone();

        if !self.ledger.is_at_least(&key, LedgerStatus::History) {
            if let Err(e) = self.history.append(&message) {
                error!(%message_id, err = %e, "history append failed");
                return;
            }
            if let Err(e) = self.ledger.mark(&key, LedgerStatus::History, self.clock.now_utc()) {
                error!(%message_id, err = %e, "ledger mark failed");
                return;
            }
        }

        if !self.ledger.is_at_least(&key, LedgerStatus::JobDone) {
            if let Err(e) = self.handler.handle(message.clone()).await {
                warn!(%message_id, %thread_id, err = %e, "handler failed, leaving for retry");
                return;
            }
            if let Err(e) = self.ledger.mark(&key, LedgerStatus::JobDone, self.clock.now_utc()) {
                error!(%message_id, err = %e, "ledger mark failed");
                return;
            }
        }

        let archive = self.root.archive_file(&thread_id, addr.to, addr.from, &addr.stem);
        if let Some(parent) = archive.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!(path = %archive.display(), err = %e, "could not prepare archive dir");
                return;
            }
        }
        match fs::rename(path, &archive) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && archive.exists() => {
                debug!(%message_id, "already archived");
            }
            Err(e) => {
                warn!(%message_id, err = %e, "archive failed");
                return;
            }
        }
        if let Err(e) = self.ledger.mark(&key, LedgerStatus::Done, self.clock.now_utc()) {
            error!(%message_id, err = %e, "ledger mark failed");
        }
    }

    /// Wait until the file's size and mtime hold still for the stability
    /// threshold, guaranteeing the writer has finished. `None` when the
    /// file disappears.
    async fn await_write_finish(&self, path: &Path) -> Option<()> {
        let cap = Duration::from_secs(10);
        let mut waited = Duration::ZERO;
        let mut stable = Duration::ZERO;
        let mut last: Option<(u64, std::time::SystemTime)> = None;

        loop {
            let meta = fs::metadata(path).ok()?;
            let sig = (meta.len(), meta.modified().ok()?);
            if last == Some(sig) {
                stable += self.config.stability_poll;
                if stable >= self.config.stability_threshold {
                    return Some(());
                }
            } else {
                stable = Duration::ZERO;
                last = Some(sig);
            }
            if waited >= cap {
                warn!(path = %path.display(), "file never stabilized, proceeding");
                return Some(());
            }
            tokio::time::sleep(self.config.stability_poll).await;
            waited += self.config.stability_poll;
        }
    }
}

/// Recursively collect regular files under `dir`. Missing directories are
/// empty.
fn collect_files(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return out;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            out.extend(collect_files(&path));
        } else if path.is_file() {
            out.push(path);
        }
    }
    out
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;

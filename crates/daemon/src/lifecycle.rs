// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon assembly and lifecycle.
//!
//! Startup: open the stores, build the fleet, resume suspended waits,
//! start both watchers (each rescans its tiers before watching). Shutdown
//! is the reverse; a restart request additionally maps to exit code 75,
//! which the supervising launcher treats as "respawn".

use async_trait::async_trait;
use sg_core::{Clock, Role, SystemClock};
use sg_mailbox::{
    HandlerError, MailboxRoot, MailboxWatcher, MessageWriter, RestartHandler, RestartRequest,
    RestartWatcher, WatchMode, WatcherConfig, WatcherError,
};
use sg_storage::{HistoryStore, Ledger, LedgerError, StateError, StateStore, WaitStore};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::agents::{AgentManager, ManagerDeps, ManagerError};
use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::env;
use crate::events::EventBus;
use crate::provider::cli::CliProvider;
use crate::provider::ProviderAdapter;
use crate::routing::MessageRouter;

/// Exit code a supervising launcher interprets as "respawn".
pub const RESTART_EXIT_CODE: i32 = 75;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    Normal,
    Restart,
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("state error: {0}")]
    State(#[from] StateError),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("fleet error: {0}")]
    Manager(#[from] ManagerError),
}

/// A running coordinator process.
pub struct Daemon<C: Clock = SystemClock> {
    coordinator: Arc<Coordinator<C>>,
    manager: Arc<AgentManager<C>>,
    events: EventBus,
    mailbox_token: CancellationToken,
    restart_token: CancellationToken,
    exit_tx: mpsc::UnboundedSender<ExitKind>,
    exit_rx: mpsc::UnboundedReceiver<ExitKind>,
    tasks: Vec<JoinHandle<Result<(), WatcherError>>>,
}

impl Daemon<SystemClock> {
    /// Start with CLI providers built from the config. Must run inside a
    /// tokio runtime.
    pub fn start(config: Config) -> Result<Self, LifecycleError> {
        let providers: HashMap<Role, Arc<dyn ProviderAdapter>> =
            [Role::Shogun, Role::Karou, Role::Ashigaru]
                .into_iter()
                .map(|role| {
                    let provider: Arc<dyn ProviderAdapter> =
                        Arc::new(CliProvider::from_config(&config, role));
                    (role, provider)
                })
                .collect();
        let watch = WatcherConfig {
            mode: if env::poll_watch() { WatchMode::Poll } else { WatchMode::Native },
            ..WatcherConfig::default()
        };
        Self::start_with(config, providers, SystemClock, watch)
    }
}

impl<C: Clock> Daemon<C> {
    /// Start with explicit providers, clock, and watch configuration.
    pub fn start_with(
        config: Config,
        providers: HashMap<Role, Arc<dyn ProviderAdapter>>,
        clock: C,
        watch: WatcherConfig,
    ) -> Result<Self, LifecycleError> {
        let base = config.base_dir.clone();
        let history_dir = config.history_dir();
        std::fs::create_dir_all(&base)?;
        std::fs::create_dir_all(&history_dir)?;

        let state = Arc::new(StateStore::open(base.join("state.json"))?);
        let history = Arc::new(HistoryStore::new(&history_dir));
        let waits = Arc::new(WaitStore::new(base.join("waits/pending")));
        let ledger = Arc::new(Ledger::open(base.join("message_ledger.json"))?);
        let restart_ledger = Arc::new(Ledger::open(base.join("tmp/restart/restart_ledger.json"))?);
        let events = EventBus::new();

        let root = MailboxRoot::new(&base);
        let manager = AgentManager::new(ManagerDeps {
            providers,
            state: state.clone(),
            history: history.clone(),
            waits: waits.clone(),
            events: events.clone(),
            clock: clock.clone(),
            base_dir: base.clone(),
            history_dir: history_dir.clone(),
            working_dir: env::workspace_root(),
            ashigaru_count: config.ashigaru_count,
            ashigaru_profiles: config.ashigaru_profiles.clone(),
        })?;

        let coordinator = Arc::new(Coordinator::new(
            state.clone(),
            history.clone(),
            MessageWriter::with_clock(root.clone(), clock.clone()),
            manager.clone(),
            events.clone(),
            config,
            clock.clone(),
        ));

        // Suspended turns first, so their records are observed before the
        // watcher re-delivers anything.
        manager.resume_pending_waits();

        let router = Arc::new(MessageRouter::new(
            manager.clone(),
            state.clone(),
            events.clone(),
            clock.clone(),
        ));
        let mailbox_watcher = MailboxWatcher::new(
            root,
            ledger,
            history,
            state,
            router,
            clock.clone(),
            watch.clone(),
        );
        let mailbox_token = mailbox_watcher.shutdown_token();

        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        let restart_watcher = RestartWatcher::new(
            base.join("tmp/restart"),
            restart_ledger,
            Arc::new(RestartShutdown { manager: manager.clone(), exit_tx: exit_tx.clone() }),
            clock,
            watch,
        );
        let restart_token = restart_watcher.shutdown_token();

        let tasks = vec![
            tokio::spawn(async move { mailbox_watcher.run().await }),
            tokio::spawn(async move { restart_watcher.run().await }),
        ];

        info!("daemon started");
        Ok(Self {
            coordinator,
            manager,
            events,
            mailbox_token,
            restart_token,
            exit_tx,
            exit_rx,
            tasks,
        })
    }

    pub fn coordinator(&self) -> Arc<Coordinator<C>> {
        self.coordinator.clone()
    }

    pub fn events(&self) -> EventBus {
        self.events.clone()
    }

    /// Handle external callers use to request shutdown.
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ExitKind> {
        self.exit_tx.clone()
    }

    /// Block until a shutdown is requested, then tear down in order:
    /// fleet, watchers, tasks. Returns what the process should exit with.
    pub async fn wait(mut self) -> ExitKind {
        let kind = self.exit_rx.recv().await.unwrap_or(ExitKind::Normal);
        if kind == ExitKind::Restart {
            // Give the restart watcher time to archive the request file
            // so the respawned process does not re-handle it.
            tokio::time::sleep(env::restart_grace()).await;
        }

        self.manager.stop_all().await;
        self.mailbox_token.cancel();
        self.restart_token.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(err = %e, "watcher task join failed");
            }
        }
        info!(?kind, "daemon stopped");
        kind
    }
}

/// Restart-queue handler: orderly fleet stop, then signal the main loop.
struct RestartShutdown<C: Clock> {
    manager: Arc<AgentManager<C>>,
    exit_tx: mpsc::UnboundedSender<ExitKind>,
}

#[async_trait]
impl<C: Clock> RestartHandler for RestartShutdown<C> {
    async fn handle(&self, request: RestartRequest) -> Result<(), HandlerError> {
        info!(id = %request.id, reason = ?request.reason, "restart requested, stopping fleet");
        self.manager.stop_all().await;
        let _ = self.exit_tx.send(ExitKind::Restart);
        Ok(())
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;

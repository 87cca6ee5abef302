// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-agent runtime: FIFO queue, single-turn execution, cancellation.
//!
//! One runtime per agent id. Messages enqueue into a FIFO; at most one
//! turn executes at a time, coalescing queued messages for the same
//! thread into a batch. A suspended `waitForMessage` is represented by an
//! in-memory rendezvous plus a durable wait record; the record is what
//! makes the suspension survive a crash.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use sg_core::{
    allowed_recipients, ActivityLog, AgentId, AgentSnapshot, AgentStatus, Clock, Message,
};
use sg_mailbox::MessageWriter;
use sg_storage::{HistoryStore, StateStore, WaitStore};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::provider::{ProviderAdapter, ProviderError};

/// Default `waitForMessage` timeout.
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 60_000;

/// Per-turn budget of real suspensions.
pub const WAITS_PER_TURN: u32 = 10;

/// Initial provider-call budget per turn; every wait grants one more.
pub const INITIAL_MAX_LOOPS: u32 = 3;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("provider failure: {0}")]
    Provider(#[from] ProviderError),
    #[error("state error: {0}")]
    State(#[from] sg_storage::StateError),
    #[error("wait store error: {0}")]
    Waits(#[from] sg_storage::WaitStoreError),
    #[error("mailbox write failed: {0}")]
    Write(#[from] sg_mailbox::WriteError),
}

/// Why a turn was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Stop,
    Interrupt,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Stop => write!(f, "stop"),
            CancelReason::Interrupt => write!(f, "interrupt"),
        }
    }
}

/// Live idle/busy split of the ashigaru fleet, as reported to a karou.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AshigaruStatus {
    pub idle: Vec<AgentId>,
    pub busy: Vec<AgentId>,
}

/// Capability record handed to each runtime so it can query and interrupt
/// the fleet without a back-pointer to the whole manager.
pub trait FleetOps: Send + Sync {
    fn ashigaru_status(&self) -> AshigaruStatus;
    fn interrupt(&self, to: AgentId, reason: CancelReason);
}

/// Broadcast hook invoked on any status change.
pub type StatusCallback = Arc<dyn Fn(AgentSnapshot) + Send + Sync>;

/// Everything a runtime needs from the outside world.
pub struct RuntimeDeps<C: Clock> {
    pub provider: Arc<dyn ProviderAdapter>,
    pub writer: MessageWriter<C>,
    pub state: Arc<StateStore>,
    pub history: Arc<HistoryStore>,
    pub waits: Arc<WaitStore>,
    pub fleet: Arc<dyn FleetOps>,
    pub status: StatusCallback,
    pub clock: C,
    pub working_dir: PathBuf,
    pub base_dir: PathBuf,
    pub history_dir: PathBuf,
    pub ashigaru_count: u32,
    pub ashigaru_profiles: HashMap<String, String>,
}

pub(crate) struct ThreadWaiter {
    pub thread_id: String,
    pub tx: oneshot::Sender<Option<Message>>,
}

pub(crate) struct RuntimeState {
    pub queue: VecDeque<Message>,
    pub busy: bool,
    pub active_thread: Option<String>,
    /// Ids of the batch currently executing; used to drop re-deliveries.
    pub active_batch: Vec<String>,
    pub cancel: Option<CancellationToken>,
    pub cancel_reason: Option<CancelReason>,
    pub stop_requested: bool,
    pub waiter: Option<ThreadWaiter>,
    /// Per-message completion waiters; the enqueuer awaits handler
    /// termination through these.
    pub completions: HashMap<String, oneshot::Sender<Result<(), String>>>,
    pub activity: ActivityLog,
    pub updated_at: DateTime<Utc>,
}

/// One agent's execution substrate.
pub struct AgentRuntime<C: Clock> {
    pub(crate) id: AgentId,
    pub(crate) allowed: Vec<AgentId>,
    pub(crate) deps: RuntimeDeps<C>,
    pub(crate) inner: Mutex<RuntimeState>,
    /// Self-reference for spawning turn tasks and heartbeats.
    self_ref: std::sync::Weak<AgentRuntime<C>>,
}

impl<C: Clock> AgentRuntime<C> {
    pub fn new(id: AgentId, deps: RuntimeDeps<C>) -> Arc<Self> {
        let allowed = allowed_recipients(id, deps.ashigaru_count);
        let updated_at = deps.clock.now_utc();
        Arc::new_cyclic(|self_ref| Self {
            id,
            allowed,
            deps,
            self_ref: self_ref.clone(),
            inner: Mutex::new(RuntimeState {
                queue: VecDeque::new(),
                busy: false,
                active_thread: None,
                active_batch: Vec::new(),
                cancel: None,
                cancel_reason: None,
                stop_requested: false,
                waiter: None,
                completions: HashMap::new(),
                activity: ActivityLog::new(),
                updated_at,
            }),
        })
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    /// Point-in-time view for subscribers.
    pub fn snapshot(&self) -> AgentSnapshot {
        let st = self.inner.lock();
        AgentSnapshot {
            id: self.id,
            role: self.id.role(),
            status: if st.busy { AgentStatus::Busy } else { AgentStatus::Idle },
            queue_size: st.queue.len(),
            active_thread_id: st.active_thread.clone(),
            updated_at: st.updated_at,
            activity: st.activity.latest().map(str::to_string),
            activity_log: st.activity.to_vec(),
        }
    }

    pub(crate) fn log_activity(&self, label: impl Into<String>) {
        {
            let mut st = self.inner.lock();
            let now = self.deps.clock.now_utc();
            st.activity.push(label, now);
            st.updated_at = now;
        }
        (self.deps.status)(self.snapshot());
    }

    /// Deliver one inbound message.
    ///
    /// Returns a completion receiver when the message was queued for a
    /// turn; `None` when it was consumed by a suspended wait (in-memory or
    /// durable) and needs no further handling from the caller.
    pub fn enqueue(&self, message: Message) -> Option<oneshot::Receiver<Result<(), String>>> {
        // At-least-once delivery means the same id can arrive twice (a
        // rescan re-delivering a file whose turn is already resuming);
        // a duplicate of queued or executing work is acknowledged as-is.
        {
            let st = self.inner.lock();
            if st.queue.iter().any(|q| q.id == message.id)
                || st.active_batch.iter().any(|id| *id == message.id)
            {
                debug!(agent_id = %self.id, message_id = %message.id, "duplicate delivery ignored");
                return None;
            }
        }

        // A durable pending wait for this thread consumes the message,
        // unless the message IS the one that started the suspended turn
        // (re-enqueued by resume-on-boot).
        if let Some(record) = self.deps.waits.get(&message.thread_id, self.id) {
            if record.status == sg_storage::WaitStatus::Pending && record.message_id != message.id
            {
                if let Err(e) = self.deps.waits.mark_received(
                    &message.thread_id,
                    self.id,
                    &message,
                    self.deps.clock.now_utc(),
                ) {
                    warn!(agent_id = %self.id, err = %e, "wait record update failed");
                }
                // Resolve the in-memory waiter if the turn is live; if it
                // is not (crashed before resume), the record alone carries
                // the outcome.
                self.try_resolve_waiter(message);
                return None;
            }
        }

        // A live waiter for this thread takes the message directly.
        let message = match self.try_resolve_waiter(message) {
            None => return None,
            Some(message) => message,
        };

        let (tx, rx) = oneshot::channel();
        {
            let mut st = self.inner.lock();
            st.queue.push_back(message.clone());
            st.completions.insert(message.id.clone(), tx);
        }
        debug!(agent_id = %self.id, message_id = %message.id, "enqueued");
        self.log_activity("enqueued");
        self.schedule();
        Some(rx)
    }

    /// Hand `message` to the in-memory waiter if one matches its thread.
    /// Returns the message back when no waiter took it.
    fn try_resolve_waiter(&self, message: Message) -> Option<Message> {
        let tx = {
            let mut st = self.inner.lock();
            if st
                .waiter
                .as_ref()
                .is_some_and(|w| w.thread_id == message.thread_id)
            {
                st.waiter.take().map(|w| w.tx)
            } else {
                None
            }
        };
        match tx {
            Some(tx) => {
                let _ = tx.send(Some(message));
                None
            }
            None => Some(message),
        }
    }

    pub(crate) fn schedule(&self) {
        let Some(runtime) = self.self_ref.upgrade() else {
            return;
        };
        tokio::spawn(async move { runtime.process_queue().await });
    }

    /// Pop the head plus all queued messages for the same thread and run
    /// one turn. No-op while busy, stopped, or empty.
    async fn process_queue(self: Arc<Self>) {
        let (batch, token) = {
            let mut st = self.inner.lock();
            if st.busy || st.stop_requested || st.queue.is_empty() {
                return;
            }
            let Some(head) = st.queue.pop_front() else {
                return;
            };
            let thread_id = head.thread_id.clone();
            let mut batch = vec![head];
            let mut rest = VecDeque::with_capacity(st.queue.len());
            while let Some(message) = st.queue.pop_front() {
                if message.thread_id == thread_id {
                    batch.push(message);
                } else {
                    rest.push_back(message);
                }
            }
            st.queue = rest;
            st.busy = true;
            st.active_thread = Some(thread_id);
            st.active_batch = batch.iter().map(|m| m.id.clone()).collect();
            let token = CancellationToken::new();
            st.cancel = Some(token.clone());
            st.cancel_reason = None;
            (batch, token)
        };

        info!(agent_id = %self.id, batch = batch.len(), thread_id = %batch[0].thread_id, "turn started");
        self.log_activity("turn_started");

        let end = self.run_turn(&batch, token).await;

        {
            let mut st = self.inner.lock();
            st.busy = false;
            st.active_thread = None;
            st.active_batch.clear();
            st.cancel = None;
        }

        match end {
            Ok(_) => {
                self.resolve_completions(&batch, Ok(()));
                self.log_activity("idle");
            }
            Err(e) => {
                error!(agent_id = %self.id, thread_id = %batch[0].thread_id, err = %e, "turn failed");
                self.resolve_completions(&batch, Err(e.to_string()));
                self.log_activity("error");
            }
        }

        let stopped = self.inner.lock().stop_requested;
        if !stopped {
            self.schedule();
        }
    }

    fn resolve_completions(&self, batch: &[Message], result: Result<(), String>) {
        let senders: Vec<_> = {
            let mut st = self.inner.lock();
            batch
                .iter()
                .filter_map(|m| st.completions.remove(&m.id))
                .collect()
        };
        for tx in senders {
            let _ = tx.send(result.clone());
        }
    }

    /// Abort the current turn and drain the queue.
    ///
    /// With reason `stop` the runtime refuses further work until
    /// [`clear_stop`](Self::clear_stop); with `interrupt` future enqueues
    /// are accepted.
    pub async fn cancel(&self, reason: CancelReason) {
        let (token, active_thread, completions, waiter) = {
            let mut st = self.inner.lock();
            if reason == CancelReason::Stop {
                st.stop_requested = true;
            }
            st.cancel_reason = Some(reason);
            let completions: Vec<_> = st.completions.drain().map(|(_, tx)| tx).collect();
            st.queue.clear();
            (st.cancel.clone(), st.active_thread.clone(), completions, st.waiter.take())
        };

        for tx in completions {
            let _ = tx.send(Err("agent stopped".to_string()));
        }
        if let Some(waiter) = waiter {
            let _ = waiter.tx.send(None);
        }
        if let Some(token) = token {
            token.cancel();
        }
        if let Some(thread_id) = active_thread {
            if let Some(binding) = self.deps.state.session(&thread_id, self.id) {
                self.deps.provider.cancel(&binding.provider_thread_id).await;
            }
        }

        info!(agent_id = %self.id, reason = %reason, "cancelled");
        self.log_activity(match reason {
            CancelReason::Stop => "stopped",
            CancelReason::Interrupt => "interrupted",
        });
    }

    pub async fn stop(&self) {
        self.cancel(CancelReason::Stop).await;
    }

    /// Lift a previous `stop` and resume draining the queue.
    pub fn clear_stop(&self) {
        self.inner.lock().stop_requested = false;
        self.schedule();
    }

    /// Re-enqueue the originating message of every durable wait record
    /// belonging to this agent. The turn entry observes the record and
    /// resumes from the synthetic tool result instead of re-running the
    /// instruction.
    pub fn resume_pending_waits(&self) {
        let records = match self.deps.waits.for_agent(self.id) {
            Ok(records) => records,
            Err(e) => {
                warn!(agent_id = %self.id, err = %e, "wait store scan failed");
                return;
            }
        };
        for record in records {
            match self.deps.history.find(&record.thread_id, &record.message_id) {
                Ok(Some(message)) => {
                    info!(
                        agent_id = %self.id,
                        thread_id = %record.thread_id,
                        message_id = %record.message_id,
                        "resuming suspended turn"
                    );
                    let _ = self.enqueue(message);
                }
                Ok(None) => {
                    warn!(
                        agent_id = %self.id,
                        thread_id = %record.thread_id,
                        message_id = %record.message_id,
                        "wait record has no history entry, dropping"
                    );
                    if let Err(e) = self.deps.waits.clear(&record.thread_id, record.agent_id) {
                        warn!(agent_id = %self.id, err = %e, "wait record cleanup failed");
                    }
                }
                Err(e) => warn!(agent_id = %self.id, err = %e, "history lookup failed"),
            }
        }
    }

    /// Remove and complete the first queued message for `thread_id`, if
    /// any. Used by `waitForMessage` to satisfy a wait without
    /// suspending.
    pub(crate) fn pop_queued(&self, thread_id: &str) -> Option<Message> {
        let (message, tx) = {
            let mut st = self.inner.lock();
            let idx = st.queue.iter().position(|m| m.thread_id == thread_id)?;
            let message = st.queue.remove(idx)?;
            let tx = st.completions.remove(&message.id);
            (message, tx)
        };
        if let Some(tx) = tx {
            let _ = tx.send(Ok(()));
        }
        Some(message)
    }

    pub(crate) fn explicit_cancel(&self) -> Option<CancelReason> {
        self.inner.lock().cancel_reason
    }

    /// Scoped activity heartbeat; aborted on drop on every exit path.
    pub(crate) fn heartbeat(&self, label: &'static str) -> Heartbeat {
        let runtime = self.self_ref.clone();
        Heartbeat {
            handle: tokio::spawn(async move {
                loop {
                    tokio::time::sleep(HEARTBEAT_INTERVAL).await;
                    match runtime.upgrade() {
                        Some(runtime) => runtime.log_activity(label),
                        None => break,
                    }
                }
            }),
        }
    }
}

pub(crate) struct Heartbeat {
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
#[path = "runtime_tests/mod.rs"]
mod tests;

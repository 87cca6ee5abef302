// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fleet manager: constructs one runtime per agent and routes inbound
//! messages.
//!
//! Runtimes never hold the manager; they get a [`FleetLink`] capability
//! with a weak reference to the shared registry, which is enough for
//! ashigaru-status queries, interrupts, and status broadcast.

use parking_lot::RwLock;
use sg_core::{AgentId, AgentSnapshot, AgentStatus, Clock, Message, Role, StopStatus, TransportEvent};
use sg_mailbox::{MailboxRoot, MessageWriter};
use sg_storage::{HistoryStore, StateStore, WaitStore};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use thiserror::Error;
use tracing::{info, warn};

use super::runtime::{
    AgentRuntime, AshigaruStatus, CancelReason, FleetOps, RuntimeDeps, StatusCallback,
};
use crate::events::EventBus;
use crate::provider::ProviderAdapter;

type Registry<C> = RwLock<HashMap<AgentId, Arc<AgentRuntime<C>>>>;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("no provider configured for role {0}")]
    MissingProvider(sg_core::Role),
}

/// Delivery failure surfaced back to the mailbox watcher so the file is
/// retried.
#[derive(Debug, Error)]
pub enum DeliverError {
    #[error("turn failed: {0}")]
    Turn(String),
    #[error("agent dropped the message")]
    Dropped,
}

/// Everything the manager needs to build the fleet.
pub struct ManagerDeps<C: Clock> {
    /// One provider instance per LLM-driven role.
    pub providers: HashMap<Role, Arc<dyn ProviderAdapter>>,
    pub state: Arc<StateStore>,
    pub history: Arc<HistoryStore>,
    pub waits: Arc<WaitStore>,
    pub events: EventBus,
    pub clock: C,
    pub base_dir: PathBuf,
    pub history_dir: PathBuf,
    pub working_dir: PathBuf,
    pub ashigaru_count: u32,
    pub ashigaru_profiles: HashMap<String, String>,
}

pub struct AgentManager<C: Clock> {
    registry: Arc<Registry<C>>,
    events: EventBus,
}

impl<C: Clock> AgentManager<C> {
    /// Build runtimes for shogun, karou, and ashigaru 1..K.
    pub fn new(deps: ManagerDeps<C>) -> Result<Arc<Self>, ManagerError> {
        let registry: Arc<Registry<C>> = Arc::new(RwLock::new(HashMap::new()));
        let fleet: Arc<dyn FleetOps> =
            Arc::new(FleetLink { registry: Arc::downgrade(&registry) });
        let status = status_callback(Arc::downgrade(&registry), deps.events.clone());

        let mut ids = vec![AgentId::Shogun, AgentId::Karou];
        ids.extend((1..=deps.ashigaru_count).map(AgentId::Ashigaru));

        for id in ids {
            let provider = deps
                .providers
                .get(&id.role())
                .cloned()
                .ok_or(ManagerError::MissingProvider(id.role()))?;

            // Scratch dir so bodyFile= references resolve.
            let scratch = deps.base_dir.join("tmp").join(id.to_string());
            if let Err(e) = std::fs::create_dir_all(&scratch) {
                warn!(agent_id = %id, err = %e, "could not create scratch dir");
            }

            let runtime = AgentRuntime::new(
                id,
                RuntimeDeps {
                    provider,
                    writer: MessageWriter::with_clock(
                        MailboxRoot::new(&deps.base_dir),
                        deps.clock.clone(),
                    ),
                    state: deps.state.clone(),
                    history: deps.history.clone(),
                    waits: deps.waits.clone(),
                    fleet: fleet.clone(),
                    status: status.clone(),
                    clock: deps.clock.clone(),
                    working_dir: deps.working_dir.clone(),
                    base_dir: deps.base_dir.clone(),
                    history_dir: deps.history_dir.clone(),
                    ashigaru_count: deps.ashigaru_count,
                    ashigaru_profiles: deps.ashigaru_profiles.clone(),
                },
            );
            registry.write().insert(id, runtime);
        }

        info!(agents = registry.read().len(), "fleet constructed");
        Ok(Arc::new(Self { registry, events: deps.events }))
    }

    /// Route one inbound message to its runtime and await handler
    /// termination. Unknown recipients are dropped with a warning.
    pub async fn deliver(&self, message: Message) -> Result<(), DeliverError> {
        let runtime = self.registry.read().get(&message.to).cloned();
        let Some(runtime) = runtime else {
            warn!(to = %message.to, message_id = %message.id, "no runtime for recipient, dropping");
            return Ok(());
        };
        match runtime.enqueue(message) {
            None => Ok(()), // consumed by a suspended wait
            Some(rx) => match rx.await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(reason)) => Err(DeliverError::Turn(reason)),
                Err(_) => Err(DeliverError::Dropped),
            },
        }
    }

    /// Stop every runtime, bracketed by `stop` events.
    pub async fn stop_all(&self) {
        self.events.emit(TransportEvent::Stop { status: StopStatus::Requested });
        let runtimes: Vec<_> = self.registry.read().values().cloned().collect();
        for runtime in runtimes {
            runtime.stop().await;
        }
        self.events.emit(TransportEvent::Stop { status: StopStatus::Completed });
    }

    /// Fleet snapshot, ordered shogun, karou, ashigaru1..K.
    pub fn snapshot(&self) -> Vec<AgentSnapshot> {
        snapshot_registry(&self.registry)
    }

    /// Re-enqueue suspended turns from durable wait records (boot).
    pub fn resume_pending_waits(&self) {
        let runtimes: Vec<_> = self.registry.read().values().cloned().collect();
        for runtime in runtimes {
            runtime.resume_pending_waits();
        }
    }

    pub fn runtime(&self, id: AgentId) -> Option<Arc<AgentRuntime<C>>> {
        self.registry.read().get(&id).cloned()
    }
}

fn snapshot_registry<C: Clock>(registry: &Registry<C>) -> Vec<AgentSnapshot> {
    let mut snapshots: Vec<AgentSnapshot> =
        registry.read().values().map(|r| r.snapshot()).collect();
    snapshots.sort_by_key(|s| s.id);
    snapshots
}

fn status_callback<C: Clock>(registry: Weak<Registry<C>>, events: EventBus) -> StatusCallback {
    Arc::new(move |_changed| {
        if let Some(registry) = registry.upgrade() {
            let agents = snapshot_registry(&registry);
            events.emit(TransportEvent::AgentStatus { agents });
        }
    })
}

/// Weak capability into the registry; see the module docs.
struct FleetLink<C: Clock> {
    registry: Weak<Registry<C>>,
}

impl<C: Clock> FleetOps for FleetLink<C> {
    fn ashigaru_status(&self) -> AshigaruStatus {
        let mut status = AshigaruStatus::default();
        let Some(registry) = self.registry.upgrade() else {
            return status;
        };
        let mut ashigaru: Vec<(AgentId, AgentStatus)> = registry
            .read()
            .iter()
            .filter(|(id, _)| matches!(id, AgentId::Ashigaru(_)))
            .map(|(id, runtime)| (*id, runtime.snapshot().status))
            .collect();
        ashigaru.sort_by_key(|(id, _)| *id);
        for (id, agent_status) in ashigaru {
            match agent_status {
                AgentStatus::Idle => status.idle.push(id),
                AgentStatus::Busy => status.busy.push(id),
            }
        }
        status
    }

    fn interrupt(&self, to: AgentId, reason: CancelReason) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let Some(runtime) = registry.read().get(&to).cloned() else {
            warn!(to = %to, "interrupt target has no runtime");
            return;
        };
        tokio::spawn(async move { runtime.cancel(reason).await });
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;

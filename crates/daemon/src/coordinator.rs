// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Boundary surface for serving layers.
//!
//! Resource semantics only; the HTTP/WebSocket transport lives outside
//! the core and calls into this.

use serde::Serialize;
use sg_core::{AgentId, AgentSnapshot, Clock, Message, Thread, TransportEvent};
use sg_mailbox::MessageWriter;
use sg_storage::{HistoryError, HistoryStore, StateError, StateStore};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::agents::AgentManager;
use crate::config::Config;
use crate::events::EventBus;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("state error: {0}")]
    State(#[from] StateError),
    #[error("history error: {0}")]
    History(#[from] HistoryError),
    #[error("mailbox write failed: {0}")]
    Write(#[from] sg_mailbox::WriteError),
    #[error("unknown thread: {0}")]
    UnknownThread(String),
}

/// Subset of the config exposed to UIs.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UiConfig {
    pub ashigaru_count: u32,
    pub provider: String,
    pub server_port: u16,
}

pub struct Coordinator<C: Clock> {
    state: Arc<StateStore>,
    history: Arc<HistoryStore>,
    writer: MessageWriter<C>,
    manager: Arc<AgentManager<C>>,
    events: EventBus,
    config: Config,
    clock: C,
}

impl<C: Clock> Coordinator<C> {
    pub fn new(
        state: Arc<StateStore>,
        history: Arc<HistoryStore>,
        writer: MessageWriter<C>,
        manager: Arc<AgentManager<C>>,
        events: EventBus,
        config: Config,
        clock: C,
    ) -> Self {
        Self { state, history, writer, manager, events, config, clock }
    }

    pub fn list_threads(&self) -> Vec<Thread> {
        self.state.list_threads()
    }

    pub fn create_thread(&self, title: &str) -> Result<Thread, CoordinatorError> {
        let thread = self.state.create_thread(title, self.clock.now_utc())?;
        info!(thread_id = %thread.id, "thread created");
        self.emit_threads();
        Ok(thread)
    }

    /// Mark a thread last-active; threadId-less mailbox files route here.
    pub fn select_thread(&self, id: &str) -> Result<(), CoordinatorError> {
        self.state.select_thread(id, self.clock.now_utc())?;
        self.emit_threads();
        Ok(())
    }

    pub fn delete_thread(&self, id: &str) -> Result<(), CoordinatorError> {
        self.state.delete_thread(id)?;
        info!(thread_id = %id, "thread deleted");
        self.emit_threads();
        Ok(())
    }

    pub fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>, CoordinatorError> {
        Ok(self.history.list(thread_id)?)
    }

    /// Inject a king instruction: one pending mailbox file addressed to
    /// the shogun, picked up by the watcher like any other message.
    pub fn submit_king_message(
        &self,
        thread_id: &str,
        body: &str,
        title: Option<&str>,
    ) -> Result<Message, CoordinatorError> {
        if !self.state.thread_exists(thread_id) {
            return Err(CoordinatorError::UnknownThread(thread_id.to_string()));
        }
        let title = title.unwrap_or("instruction");
        let message =
            self.writer.write(AgentId::King, AgentId::Shogun, thread_id, title, body)?;
        info!(thread_id, message_id = %message.id, "king message submitted");
        Ok(message)
    }

    pub fn fleet_snapshot(&self) -> Vec<AgentSnapshot> {
        self.manager.snapshot()
    }

    pub async fn stop_all(&self) {
        self.manager.stop_all().await;
    }

    pub fn ui_config(&self) -> UiConfig {
        UiConfig {
            ashigaru_count: self.config.ashigaru_count,
            provider: self.config.provider.clone(),
            server_port: self.config.server.port,
        }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }

    fn emit_threads(&self) {
        self.events.emit(TransportEvent::Threads { threads: self.state.list_threads() });
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mailbox-to-fleet routing.
//!
//! The application handler behind the mailbox watcher: refresh the
//! thread's activity timestamp, surface the message to subscribers, and
//! hand it to the recipient's runtime. Messages addressed to the king are
//! only surfaced; the coordinator never dispatches a king turn.

use async_trait::async_trait;
use sg_core::{Clock, Message, TransportEvent};
use sg_mailbox::{HandlerError, MailboxHandler};
use sg_storage::StateStore;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::agents::AgentManager;
use crate::events::EventBus;

pub struct MessageRouter<C: Clock> {
    manager: Arc<AgentManager<C>>,
    state: Arc<StateStore>,
    events: EventBus,
    clock: C,
}

impl<C: Clock> MessageRouter<C> {
    pub fn new(
        manager: Arc<AgentManager<C>>,
        state: Arc<StateStore>,
        events: EventBus,
        clock: C,
    ) -> Self {
        Self { manager, state, events, clock }
    }
}

#[async_trait]
impl<C: Clock> MailboxHandler for MessageRouter<C> {
    async fn handle(&self, message: Message) -> Result<(), HandlerError> {
        if let Err(e) = self.state.touch_thread(&message.thread_id, self.clock.now_utc()) {
            warn!(thread_id = %message.thread_id, err = %e, "thread touch failed");
        }
        self.events.emit(TransportEvent::Message { message: message.clone() });

        if message.to.is_king() {
            debug!(message_id = %message.id, "message for king surfaced to subscribers only");
            return Ok(());
        }
        self.manager.deliver(message).await.map_err(|e| Box::new(e) as HandlerError)
    }
}

#[cfg(test)]
#[path = "routing_tests.rs"]
mod tests;

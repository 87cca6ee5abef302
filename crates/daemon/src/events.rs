// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event bus for external subscribers.
//!
//! The core emits [`TransportEvent`]s here; serving layers subscribe and
//! fan them out over whatever transport they speak. Per subscriber,
//! events arrive in emission order; lagging subscribers lose the oldest
//! events rather than blocking emitters.

use sg_core::TransportEvent;
use tokio::sync::broadcast;
use tracing::trace;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TransportEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Emit an event to every current subscriber. Emitting with no
    /// subscribers is fine.
    pub fn emit(&self, event: TransportEvent) {
        trace!(?event, "emit");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport event contract for external subscribers.
//!
//! The core never depends on a transport; it emits these events into a
//! sink and the serving layer decides how to fan them out.

use serde::{Deserialize, Serialize};

use crate::agent::AgentSnapshot;
use crate::message::Message;
use crate::thread::Thread;

/// Phase of a fleet stop, bracketing `stopAll`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopStatus {
    Requested,
    Completed,
}

/// Events emitted to external subscribers.
///
/// Serializes with `{"type": "...", ...fields}` format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TransportEvent {
    /// Thread list changed (create/delete/update).
    #[serde(rename = "threads")]
    Threads { threads: Vec<Thread> },

    /// A mailbox file has been parsed and is about to be routed.
    #[serde(rename = "message")]
    Message { message: Message },

    /// Any runtime's status changed (queue size, busy, activity).
    #[serde(rename = "agent_status")]
    AgentStatus { agents: Vec<AgentSnapshot> },

    /// Brackets a fleet stop.
    #[serde(rename = "stop")]
    Stop { status: StopStatus },
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;

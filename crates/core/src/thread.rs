// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! King-level conversation threads and per-agent provider sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::agent::AgentId;

/// Generate a fresh thread id (UUID v4; never contains `__`).
pub fn new_thread_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Thread ids must be non-empty and must not contain the filename
/// delimiter `__`.
pub fn is_valid_thread_id(id: &str) -> bool {
    !id.is_empty() && !id.contains("__")
}

/// Provider-side session binding for one (thread, agent) pair.
///
/// `initialized` means the provider thread has already been seeded with the
/// agent's system prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionBinding {
    pub provider: String,
    pub provider_thread_id: String,
    pub initialized: bool,
}

/// A king-level conversation.
///
/// `sessions` is populated lazily by each agent runtime on first use;
/// `updated_at` refreshes whenever a message in this thread is delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub sessions: HashMap<String, SessionBinding>,
}

impl Thread {
    pub fn new(id: impl Into<String>, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            created_at: now,
            updated_at: now,
            sessions: HashMap::new(),
        }
    }

    /// Refresh the activity timestamp.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    pub fn session(&self, agent: AgentId) -> Option<&SessionBinding> {
        self.sessions.get(&agent.to_string())
    }

    pub fn set_session(&mut self, agent: AgentId, binding: SessionBinding) {
        self.sessions.insert(agent.to_string(), binding);
    }
}

#[cfg(test)]
#[path = "thread_tests.rs"]
mod tests;

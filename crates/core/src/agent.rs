// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent identity and fleet snapshot types.
//!
//! The hierarchy has four tiers: king (human), shogun, karou, and a
//! configurable number of ashigaru. Every tier except king is driven by an
//! LLM provider; messages addressed to king are only surfaced externally,
//! never dispatched to a runtime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Role of an agent within the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    King,
    Shogun,
    Karou,
    Ashigaru,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::King => write!(f, "king"),
            Role::Shogun => write!(f, "shogun"),
            Role::Karou => write!(f, "karou"),
            Role::Ashigaru => write!(f, "ashigaru"),
        }
    }
}

/// An addressable endpoint in the hierarchy.
///
/// Ashigaru indices are 1-based; `ashigaru0` does not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AgentId {
    King,
    Shogun,
    Karou,
    Ashigaru(u32),
}

impl AgentId {
    /// Parse an agent id from its canonical string form.
    pub fn parse(s: &str) -> Option<AgentId> {
        match s {
            "king" => Some(AgentId::King),
            "shogun" => Some(AgentId::Shogun),
            "karou" => Some(AgentId::Karou),
            _ => {
                let n = s.strip_prefix("ashigaru")?.parse::<u32>().ok()?;
                if n >= 1 {
                    Some(AgentId::Ashigaru(n))
                } else {
                    None
                }
            }
        }
    }

    pub fn role(&self) -> Role {
        match self {
            AgentId::King => Role::King,
            AgentId::Shogun => Role::Shogun,
            AgentId::Karou => Role::Karou,
            AgentId::Ashigaru(_) => Role::Ashigaru,
        }
    }

    /// True for the human endpoint. The coordinator never runs a king turn.
    pub fn is_king(&self) -> bool {
        matches!(self, AgentId::King)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentId::King => write!(f, "king"),
            AgentId::Shogun => write!(f, "shogun"),
            AgentId::Karou => write!(f, "karou"),
            AgentId::Ashigaru(n) => write!(f, "ashigaru{}", n),
        }
    }
}

impl Serialize for AgentId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for AgentId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        AgentId::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid agent id: {:?}", s)))
    }
}

/// Coarse execution state of a runtime, as surfaced to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Busy,
}

/// Maximum number of retained activity entries per agent.
pub const ACTIVITY_LOG_CAP: usize = 40;

/// One activity-log line: a short phase label plus when it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub label: String,
    pub at: DateTime<Utc>,
}

/// Bounded circular activity log, newest entry first.
#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    entries: VecDeque<ActivityEntry>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new entry, evicting the oldest past [`ACTIVITY_LOG_CAP`].
    pub fn push(&mut self, label: impl Into<String>, at: DateTime<Utc>) {
        self.entries.push_front(ActivityEntry { label: label.into(), at });
        self.entries.truncate(ACTIVITY_LOG_CAP);
    }

    /// Most recent entry label, if any.
    pub fn latest(&self) -> Option<&str> {
        self.entries.front().map(|e| e.label.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = &ActivityEntry> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<ActivityEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Point-in-time view of one runtime, derived for subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub role: Role,
    pub status: AgentStatus,
    pub queue_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_thread_id: Option<String>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,
    #[serde(default)]
    pub activity_log: Vec<ActivityEntry>,
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;

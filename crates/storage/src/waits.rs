// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable wait records for resumable `waitForMessage`.
//!
//! One JSON file per suspended (thread, agent) pair under
//! `waits/pending/`. The in-memory rendezvous in the runtime is a
//! performance shortcut; correctness lives here: a record exists exactly
//! while an agent has a suspended turn that has not been resumed and
//! cleared.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sg_core::{AgentId, Message};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::fsio;

#[derive(Debug, Error)]
pub enum WaitStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Lifecycle of a suspended wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitStatus {
    Pending,
    Received,
    Timeout,
}

/// Persistent suspension state for one `waitForMessage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitRecord {
    pub status: WaitStatus,
    pub thread_id: String,
    pub agent_id: AgentId,
    pub provider_thread_id: String,
    pub timeout_ms: u64,
    /// Originating message metadata: the turn being suspended.
    pub message_id: String,
    pub from: AgentId,
    pub to: AgentId,
    pub title: String,
    pub message_created_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_message: Option<Message>,
}

impl WaitRecord {
    /// Key for the record's file: `{threadId}__{agentId}`.
    pub fn key(thread_id: &str, agent: AgentId) -> String {
        format!("{}__{}", thread_id, agent)
    }
}

/// Store of durable wait records.
pub struct WaitStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl WaitStore {
    /// Root at `waits/pending/` under the base directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), write_lock: Mutex::new(()) }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, thread_id: &str, agent: AgentId) -> PathBuf {
        self.dir.join(format!("{}.json", WaitRecord::key(thread_id, agent)))
    }

    /// Persist a record, overwriting any previous one for the pair.
    pub fn put(&self, record: &WaitRecord) -> Result<(), WaitStoreError> {
        let _guard = self.write_lock.lock();
        let path = self.record_path(&record.thread_id, record.agent_id);
        let bytes = serde_json::to_vec_pretty(record)?;
        fsio::write_atomic(&path, &bytes)?;
        Ok(())
    }

    pub fn get(&self, thread_id: &str, agent: AgentId) -> Option<WaitRecord> {
        let path = self.record_path(thread_id, agent);
        let bytes = fs::read(&path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(path = %path.display(), err = %e, "unparseable wait record");
                None
            }
        }
    }

    /// Transition a pending record to `received` with the arrived message.
    /// Records already final are left untouched; returns the stored record.
    pub fn mark_received(
        &self,
        thread_id: &str,
        agent: AgentId,
        message: &Message,
        now: DateTime<Utc>,
    ) -> Result<Option<WaitRecord>, WaitStoreError> {
        let Some(mut record) = self.get(thread_id, agent) else {
            return Ok(None);
        };
        if record.status != WaitStatus::Pending {
            return Ok(Some(record));
        }
        record.status = WaitStatus::Received;
        record.received_at = Some(now);
        record.received_message = Some(message.clone());
        record.updated_at = now;
        self.put(&record)?;
        Ok(Some(record))
    }

    /// Transition a pending record to `timeout`. Records already final are
    /// left untouched; returns the stored record.
    pub fn mark_timeout(
        &self,
        thread_id: &str,
        agent: AgentId,
        now: DateTime<Utc>,
    ) -> Result<Option<WaitRecord>, WaitStoreError> {
        let Some(mut record) = self.get(thread_id, agent) else {
            return Ok(None);
        };
        if record.status != WaitStatus::Pending {
            return Ok(Some(record));
        }
        record.status = WaitStatus::Timeout;
        record.updated_at = now;
        self.put(&record)?;
        Ok(Some(record))
    }

    /// Remove the record for a pair. Missing files are fine.
    pub fn clear(&self, thread_id: &str, agent: AgentId) -> Result<(), WaitStoreError> {
        let _guard = self.write_lock.lock();
        match fs::remove_file(self.record_path(thread_id, agent)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// All stored records, in no particular order.
    pub fn list(&self) -> Result<Vec<WaitRecord>, WaitStoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut out = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(bytes) = fs::read(&path) else { continue };
            match serde_json::from_slice::<WaitRecord>(&bytes) {
                Ok(record) => out.push(record),
                Err(e) => warn!(path = %path.display(), err = %e, "skipping wait record"),
            }
        }
        Ok(out)
    }

    /// Records belonging to one agent.
    pub fn for_agent(&self, agent: AgentId) -> Result<Vec<WaitRecord>, WaitStoreError> {
        Ok(self.list()?.into_iter().filter(|r| r.agent_id == agent).collect())
    }
}

#[cfg(test)]
#[path = "waits_tests.rs"]
mod tests;

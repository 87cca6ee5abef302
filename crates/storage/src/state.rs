// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thread and provider-session state with atomic snapshots.
//!
//! One JSON snapshot (`state.json`) holds every thread, its per-agent
//! provider-session bindings, and the last-active thread id. Mutations
//! serialize behind a mutex and persist before returning; load falls back
//! to the newest parseable `.bak` generation.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sg_core::{AgentId, SessionBinding, Thread};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::error;

use crate::fsio;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid thread id: {0:?}")]
    InvalidThreadId(String),
    #[error("unknown thread: {0}")]
    UnknownThread(String),
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateFile {
    #[serde(default)]
    threads: HashMap<String, Thread>,
    #[serde(default)]
    last_active_thread: Option<String>,
}

/// Owner of the thread map and session bindings.
pub struct StateStore {
    path: PathBuf,
    inner: Mutex<StateFile>,
}

impl StateStore {
    /// Open (or create) the state snapshot at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StateError> {
        let path = path.into();
        let mut file = None;
        for candidate in fsio::load_candidates(&path) {
            let Ok(bytes) = std::fs::read(&candidate) else { continue };
            match serde_json::from_slice(&bytes) {
                Ok(parsed) => {
                    file = Some(parsed);
                    break;
                }
                Err(e) => {
                    error!(path = %candidate.display(), err = %e, "unreadable state version");
                }
            }
        }
        Ok(Self { path, inner: Mutex::new(file.unwrap_or_default()) })
    }

    /// Create a thread with a fresh UUID and select it as last-active.
    pub fn create_thread(
        &self,
        title: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Thread, StateError> {
        let thread = Thread::new(sg_core::new_thread_id(), title, now);
        let mut inner = self.inner.lock();
        inner.threads.insert(thread.id.clone(), thread.clone());
        inner.last_active_thread = Some(thread.id.clone());
        self.persist(&inner)?;
        Ok(thread)
    }

    /// Insert an externally-constructed thread (id must satisfy the
    /// delimiter rule).
    pub fn insert_thread(&self, thread: Thread) -> Result<(), StateError> {
        if !sg_core::is_valid_thread_id(&thread.id) {
            return Err(StateError::InvalidThreadId(thread.id));
        }
        let mut inner = self.inner.lock();
        inner.threads.insert(thread.id.clone(), thread);
        self.persist(&inner)
    }

    /// Mark a thread as last-active.
    pub fn select_thread(&self, id: &str, now: DateTime<Utc>) -> Result<(), StateError> {
        let mut inner = self.inner.lock();
        let thread = inner
            .threads
            .get_mut(id)
            .ok_or_else(|| StateError::UnknownThread(id.to_string()))?;
        thread.touch(now);
        inner.last_active_thread = Some(id.to_string());
        self.persist(&inner)
    }

    /// Remove a thread. Unknown ids are a no-op.
    pub fn delete_thread(&self, id: &str) -> Result<(), StateError> {
        let mut inner = self.inner.lock();
        if inner.threads.remove(id).is_none() {
            return Ok(());
        }
        if inner.last_active_thread.as_deref() == Some(id) {
            inner.last_active_thread = None;
        }
        self.persist(&inner)
    }

    /// Refresh a thread's `updated_at`. Unknown ids are a no-op (the
    /// message carrying them is logged upstream).
    pub fn touch_thread(&self, id: &str, now: DateTime<Utc>) -> Result<(), StateError> {
        let mut inner = self.inner.lock();
        let Some(thread) = inner.threads.get_mut(id) else {
            return Ok(());
        };
        thread.touch(now);
        self.persist(&inner)
    }

    pub fn get_thread(&self, id: &str) -> Option<Thread> {
        self.inner.lock().threads.get(id).cloned()
    }

    pub fn thread_exists(&self, id: &str) -> bool {
        self.inner.lock().threads.contains_key(id)
    }

    /// All threads, most recently updated first.
    pub fn list_threads(&self) -> Vec<Thread> {
        let mut threads: Vec<Thread> = self.inner.lock().threads.values().cloned().collect();
        threads.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        threads
    }

    pub fn last_active_thread(&self) -> Option<String> {
        self.inner.lock().last_active_thread.clone()
    }

    pub fn session(&self, thread_id: &str, agent: AgentId) -> Option<SessionBinding> {
        self.inner.lock().threads.get(thread_id)?.session(agent).cloned()
    }

    /// Record a provider-session binding for (thread, agent).
    pub fn set_session(
        &self,
        thread_id: &str,
        agent: AgentId,
        binding: SessionBinding,
    ) -> Result<(), StateError> {
        let mut inner = self.inner.lock();
        let thread = inner
            .threads
            .get_mut(thread_id)
            .ok_or_else(|| StateError::UnknownThread(thread_id.to_string()))?;
        thread.set_session(agent, binding);
        self.persist(&inner)
    }

    fn persist(&self, inner: &StateFile) -> Result<(), StateError> {
        let bytes = serde_json::to_vec_pretty(inner)?;
        fsio::persist_with_backup(&self.path, &bytes)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;

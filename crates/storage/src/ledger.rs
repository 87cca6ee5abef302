// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only monotonic status ledger.
//!
//! Keys are mailbox-relative paths of the original pending files; values
//! track how far processing got: `history < job_done < done`. A mark may
//! only raise the rank, so re-processing after a crash skips the
//! side-effecting steps already taken.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::error;

use crate::fsio;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Processing milestone for one queue entry. Rank is strictly increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    History,
    JobDone,
    Done,
}

impl LedgerStatus {
    fn rank(self) -> u8 {
        match self {
            LedgerStatus::History => 1,
            LedgerStatus::JobDone => 2,
            LedgerStatus::Done => 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerEntry {
    status: LedgerStatus,
    updated_at: DateTime<Utc>,
}

/// Persistent idempotency ledger, one per queue family.
pub struct Ledger {
    path: PathBuf,
    entries: Mutex<HashMap<String, LedgerEntry>>,
}

impl Ledger {
    /// Open (or create) a ledger at `path`.
    ///
    /// Loads the main file or, when it is missing or corrupt, the newest
    /// parseable backup. A ledger with no loadable version is logged at
    /// error level and replaced by an empty one; the process continues but
    /// operators must intervene.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let mut entries = None;
        let mut saw_any = false;
        for candidate in fsio::load_candidates(&path) {
            let Ok(bytes) = std::fs::read(&candidate) else { continue };
            saw_any = true;
            match serde_json::from_slice(&bytes) {
                Ok(map) => {
                    entries = Some(map);
                    break;
                }
                Err(e) => {
                    error!(path = %candidate.display(), err = %e, "unreadable ledger version");
                }
            }
        }
        if entries.is_none() && saw_any {
            error!(path = %path.display(), "corrupt ledger, starting empty");
        }
        Ok(Self { path, entries: Mutex::new(entries.unwrap_or_default()) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current status for a key.
    pub fn status(&self, key: &str) -> Option<LedgerStatus> {
        self.entries.lock().get(key).map(|e| e.status)
    }

    /// True if the key has reached at least `status`.
    pub fn is_at_least(&self, key: &str, status: LedgerStatus) -> bool {
        self.status(key).is_some_and(|s| s.rank() >= status.rank())
    }

    /// Raise the key to `status`. Marks that would lower or repeat the rank
    /// are no-ops returning `Ok(false)`; a raising mark persists before
    /// returning `Ok(true)`.
    pub fn mark(
        &self,
        key: &str,
        status: LedgerStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, LedgerError> {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(key) {
            if existing.status.rank() >= status.rank() {
                return Ok(false);
            }
        }
        entries.insert(key.to_string(), LedgerEntry { status, updated_at: now });
        let bytes = serde_json::to_vec_pretty(&*entries)?;
        fsio::persist_with_backup(&self.path, &bytes)?;
        Ok(true)
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;

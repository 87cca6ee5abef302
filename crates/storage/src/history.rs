// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-thread append-only message history.
//!
//! One `messages.jsonl` per thread under the history root, one JSON object
//! per line. Appends are single-writer; reads deduplicate by message id
//! (first occurrence wins) so a log torn by a pre-crash writer cannot
//! surface a duplicate.

use parking_lot::Mutex;
use sg_core::Message;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Append-only JSONL history, rooted at `history/`.
pub struct HistoryStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl HistoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), write_lock: Mutex::new(()) }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a thread's message log.
    pub fn messages_path(&self, thread_id: &str) -> PathBuf {
        self.root.join(thread_id).join("messages.jsonl")
    }

    /// Append one delivered message to its thread's log.
    ///
    /// Callers gate this behind the ledger so it runs at most once per
    /// message id; the append itself is a single O_APPEND write + flush.
    pub fn append(&self, message: &Message) -> Result<(), HistoryError> {
        let path = self.messages_path(&message.thread_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let line = serde_json::to_string(message)?;

        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{}", line)?;
        file.flush()?;
        Ok(())
    }

    /// All messages of a thread in append order, deduplicated by id.
    ///
    /// Unparseable lines are logged and skipped. A missing log is an empty
    /// thread, not an error.
    pub fn list(&self, thread_id: &str) -> Result<Vec<Message>, HistoryError> {
        let path = self.messages_path(thread_id);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut seen: HashSet<String> = HashSet::new();
        let mut out = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Message>(line) {
                Ok(msg) => {
                    if seen.insert(msg.id.clone()) {
                        out.push(msg);
                    }
                }
                Err(e) => {
                    warn!(
                        thread_id,
                        line = lineno + 1,
                        err = %e,
                        "skipping unparseable history line"
                    );
                }
            }
        }
        Ok(out)
    }

    /// Look up one message by id within a thread.
    pub fn find(&self, thread_id: &str, message_id: &str) -> Result<Option<Message>, HistoryError> {
        Ok(self.list(thread_id)?.into_iter().find(|m| m.id == message_id))
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;

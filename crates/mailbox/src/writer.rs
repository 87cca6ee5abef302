// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound mailbox file writer.
//!
//! Writes `message_to/{to}/from/{from}/{stem}.md` via a uniquely-named
//! temp sibling and rename; the rename is the linearization point. Writers
//! are idempotent by path, and each write generates a fresh rand token so
//! stems never collide.

use chrono::{DateTime, Utc};
use sg_core::{format_stem, new_rand_token, slugify, AgentId, Clock, Message, SystemClock};
use thiserror::Error;

use crate::paths::MailboxRoot;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid thread id: {0:?}")]
    InvalidThreadId(String),
}

/// Producer of pending mailbox files.
#[derive(Clone)]
pub struct MessageWriter<C: Clock = SystemClock> {
    root: MailboxRoot,
    clock: C,
}

impl MessageWriter<SystemClock> {
    pub fn new(root: MailboxRoot) -> Self {
        Self { root, clock: SystemClock }
    }
}

impl<C: Clock> MessageWriter<C> {
    pub fn with_clock(root: MailboxRoot, clock: C) -> Self {
        Self { root, clock }
    }

    pub fn root(&self) -> &MailboxRoot {
        &self.root
    }

    /// Write one outbound message and return its delivered form.
    pub fn write(
        &self,
        from: AgentId,
        to: AgentId,
        thread_id: &str,
        title: &str,
        body: &str,
    ) -> Result<Message, WriteError> {
        if !sg_core::is_valid_thread_id(thread_id) {
            return Err(WriteError::InvalidThreadId(thread_id.to_string()));
        }
        let now = self.clock.now_utc();
        let stem = format_stem(thread_id, title, now, &new_rand_token());
        let target = self.root.pending_file(to, from, &stem);
        sg_storage::write_atomic(&target, body.as_bytes())?;
        Ok(Message {
            id: stem,
            thread_id: thread_id.to_string(),
            from,
            to,
            title: slugify(title),
            body: body.to_string(),
            created_at: now,
        })
    }
}

/// Timestamp a producer observed for an existing file (mtime), used when
/// the watcher rebuilds a [`Message`] from disk.
pub fn mtime_utc(meta: &std::fs::Metadata) -> DateTime<Utc> {
    meta.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;

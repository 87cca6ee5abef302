// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mailbox directory grammar.
//!
//! ```text
//! message_to/{to}/from/{from}/{stem}.md          pending
//! message_processing/{to}/from/{from}/{stem}.md  claimed, in flight
//! history/{threadId}/message_to/{to}/from/{from}/{stem}.md  archived
//! ```
//!
//! Paths outside this grammar (wrong depth, not `.md`, wrong segment
//! labels) are not mailbox files and are ignored by the watcher.

use sg_core::AgentId;
use std::path::{Path, PathBuf};

pub const PENDING_SEGMENT: &str = "message_to";
pub const PROCESSING_SEGMENT: &str = "message_processing";
pub const HISTORY_SEGMENT: &str = "history";
const FROM_SEGMENT: &str = "from";

/// Which watched tier a mailbox file sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxTier {
    Pending,
    Processing,
}

/// Root of one mailbox tree (the `.shogun/` base directory).
#[derive(Debug, Clone)]
pub struct MailboxRoot {
    base: PathBuf,
}

impl MailboxRoot {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn pending_dir(&self) -> PathBuf {
        self.base.join(PENDING_SEGMENT)
    }

    pub fn processing_dir(&self) -> PathBuf {
        self.base.join(PROCESSING_SEGMENT)
    }

    pub fn history_dir(&self) -> PathBuf {
        self.base.join(HISTORY_SEGMENT)
    }

    pub fn pending_file(&self, to: AgentId, from: AgentId, stem: &str) -> PathBuf {
        self.pending_dir()
            .join(to.to_string())
            .join(FROM_SEGMENT)
            .join(from.to_string())
            .join(format!("{stem}.md"))
    }

    pub fn processing_file(&self, to: AgentId, from: AgentId, stem: &str) -> PathBuf {
        self.processing_dir()
            .join(to.to_string())
            .join(FROM_SEGMENT)
            .join(from.to_string())
            .join(format!("{stem}.md"))
    }

    /// Archive destination: the pending layout nested under the thread's
    /// history directory.
    pub fn archive_file(
        &self,
        thread_id: &str,
        to: AgentId,
        from: AgentId,
        stem: &str,
    ) -> PathBuf {
        self.history_dir()
            .join(thread_id)
            .join(PENDING_SEGMENT)
            .join(to.to_string())
            .join(FROM_SEGMENT)
            .join(from.to_string())
            .join(format!("{stem}.md"))
    }

    /// Classify a path within this root. `None` for anything outside the
    /// grammar.
    pub fn classify(&self, path: &Path) -> Option<MailboxAddress> {
        let rel = path.strip_prefix(&self.base).ok()?;
        let segments: Vec<&str> = rel.iter().filter_map(|s| s.to_str()).collect();
        // {tier}/{to}/from/{from}/{stem}.md
        let [tier, to, from_label, from, file] = segments.as_slice() else {
            return None;
        };
        let tier = match *tier {
            PENDING_SEGMENT => MailboxTier::Pending,
            PROCESSING_SEGMENT => MailboxTier::Processing,
            _ => return None,
        };
        if *from_label != FROM_SEGMENT {
            return None;
        }
        let stem = file.strip_suffix(".md")?;
        if stem.is_empty() {
            return None;
        }
        Some(MailboxAddress {
            tier,
            to: AgentId::parse(to)?,
            from: AgentId::parse(from)?,
            stem: stem.to_string(),
        })
    }
}

/// A mailbox file decomposed into its grammar parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxAddress {
    pub tier: MailboxTier,
    pub to: AgentId,
    pub from: AgentId,
    pub stem: String,
}

impl MailboxAddress {
    /// Ledger key: the relative path with the leading segment forced to
    /// `message_to`, so the key is stable across tiers.
    pub fn idempotency_key(&self) -> String {
        format!(
            "{}/{}/{}/{}/{}.md",
            PENDING_SEGMENT, self.to, FROM_SEGMENT, self.from, self.stem
        )
    }

    /// Absolute location of this address within `root`, per tier.
    pub fn path_in(&self, root: &MailboxRoot) -> PathBuf {
        match self.tier {
            MailboxTier::Pending => root.pending_file(self.to, self.from, &self.stem),
            MailboxTier::Processing => root.processing_file(self.to, self.from, &self.stem),
        }
    }

    /// The same address in the processing tier.
    pub fn claimed(&self) -> MailboxAddress {
        MailboxAddress { tier: MailboxTier::Processing, ..self.clone() }
    }
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;

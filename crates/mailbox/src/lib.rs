// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sg-mailbox: the file-based inter-agent queue.
//!
//! The mailbox directory tree is the only cross-process shared mutable
//! resource. Producers write with temp-and-rename; the watcher claims
//! pending files by renaming them into the processing tier, delivers them
//! through a ledger so side effects run exactly once in effect, and
//! archives them under the thread's history directory.

pub mod paths;
pub mod restart;
pub mod watcher;
pub mod writer;

pub use paths::{MailboxAddress, MailboxRoot, MailboxTier};
pub use restart::{RestartHandler, RestartRequest, RestartWatcher};
pub use watcher::{
    HandlerError, MailboxHandler, MailboxWatcher, WatchMode, WatcherConfig, WatcherError,
};
pub use writer::{MessageWriter, WriteError};

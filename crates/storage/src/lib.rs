// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sg-storage: durable stores for the coordinator.
//!
//! Every store here is single-writer: mutations serialize behind a mutex
//! and persist via write-temp-and-rename before returning, so callers that
//! observe a returned `Ok` observe durability. Snapshot-shaped files keep
//! rotating `.bak` copies so a crash mid-write loses at most the in-flight
//! version.

mod fsio;
mod history;
mod ledger;
mod state;
mod waits;

pub use fsio::{persist_with_backup, read_with_backup, write_atomic};
pub use history::{HistoryError, HistoryStore};
pub use ledger::{Ledger, LedgerError, LedgerStatus};
pub use state::{StateError, StateStore};
pub use waits::{WaitRecord, WaitStatus, WaitStore, WaitStoreError};

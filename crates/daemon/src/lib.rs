// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sg-daemon: the coordinator process.
//!
//! Owns the agent runtimes and the fleet manager, the provider adapters,
//! the boundary surface for UIs (thread CRUD, king-message injection,
//! fleet snapshots), and daemon lifecycle including the restart protocol
//! (exit code 75 means "respawn").

pub mod agents;
pub mod config;
pub mod coordinator;
pub mod env;
pub mod events;
pub mod lifecycle;
pub mod prompt;
pub mod provider;
pub mod routing;

pub use agents::{
    AgentManager, AgentRuntime, AshigaruStatus, CancelReason, FleetOps, RuntimeError,
};
pub use config::{Config, ConfigError};
pub use coordinator::Coordinator;
pub use events::EventBus;
pub use lifecycle::{Daemon, ExitKind, RESTART_EXIT_CODE};
pub use provider::{
    CreateThread, ProviderAdapter, ProviderError, ProviderThread, SendTurn, TurnOutput,
};

#[cfg(any(test, feature = "test-support"))]
pub use provider::fake::{FakeCall, FakeProvider, FakeResponse};

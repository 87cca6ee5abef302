// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Provider adapters: the thread-oriented LLM interface.
//!
//! The runtime only ever sees `outputText`; `raw` is carried through for
//! transports that want it but is never interpreted here. `send_message`
//! MUST abort promptly when the cancel token fires.

pub mod cli;
#[cfg(any(test, feature = "test-support"))]
pub mod fake;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider call cancelled")]
    Cancelled,
    #[error("provider IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unknown provider thread: {0}")]
    UnknownThread(String),
    #[error("provider failure: {0}")]
    Failed(String),
}

impl ProviderError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProviderError::Cancelled)
    }
}

/// Request to create a provider-side thread, seeded with a system prompt.
pub struct CreateThread<'a> {
    pub working_directory: &'a Path,
    pub initial_input: Option<&'a str>,
}

/// Provider-side thread handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderThread {
    pub id: String,
}

/// One turn: feed `input`, await the provider's next response.
pub struct SendTurn<'a> {
    pub thread_id: &'a str,
    pub input: &'a str,
    /// Aborts the in-flight call when cancelled.
    pub cancel: CancellationToken,
    /// Best-effort telemetry lines; may be dropped.
    pub progress: Option<mpsc::UnboundedSender<String>>,
}

/// A provider response. `output_text` is the sole response surface the
/// runtime interprets.
#[derive(Debug, Clone, Default)]
pub struct TurnOutput {
    pub output_text: String,
    pub raw: Option<serde_json::Value>,
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync + 'static {
    /// Short name recorded in session bindings.
    fn name(&self) -> &str;

    async fn create_thread(&self, req: CreateThread<'_>) -> Result<ProviderThread, ProviderError>;

    /// Attach to an existing provider-side thread.
    async fn resume_thread(&self, id: &str) -> Result<ProviderThread, ProviderError>;

    async fn send_message(&self, turn: SendTurn<'_>) -> Result<TurnOutput, ProviderError>;

    /// Optional explicit cancel hook; the token passed to `send_message`
    /// is the primary mechanism.
    async fn cancel(&self, _thread_id: &str) {}
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted in-process provider for tests.
//!
//! Responses are queued globally and consumed in call order; each call is
//! recorded with the thread id and full input so tests can assert on the
//! exact text the runtime composed.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

use super::{CreateThread, ProviderAdapter, ProviderError, ProviderThread, SendTurn, TurnOutput};

/// One recorded provider interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeCall {
    pub thread_id: String,
    pub input: String,
}

/// What the fake should do for one `send_message` call.
#[derive(Debug, Clone)]
pub enum FakeResponse {
    /// Return this text.
    Text(String),
    /// Return this text after a delay (still abortable by the token).
    Delayed(std::time::Duration, String),
    /// Block until the cancel token fires, then report cancellation.
    Hold,
    /// Fail with the given reason.
    Fail(String),
}

#[derive(Default)]
struct FakeState {
    responses: VecDeque<FakeResponse>,
    calls: Vec<FakeCall>,
    created: Vec<String>,
    next_thread: u32,
    /// When set, an exhausted script fails with this reason instead of
    /// returning empty output.
    exhausted_failure: Option<String>,
}

/// Scripted provider; cheap to clone via `Arc`.
#[derive(Default)]
pub struct FakeProvider {
    state: Mutex<FakeState>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&self, text: impl Into<String>) {
        self.state.lock().responses.push_back(FakeResponse::Text(text.into()));
    }

    pub fn push_hold(&self) {
        self.state.lock().responses.push_back(FakeResponse::Hold);
    }

    pub fn push_delayed(&self, delay: std::time::Duration, text: impl Into<String>) {
        self.state
            .lock()
            .responses
            .push_back(FakeResponse::Delayed(delay, text.into()));
    }

    pub fn push_fail(&self, reason: impl Into<String>) {
        self.state.lock().responses.push_back(FakeResponse::Fail(reason.into()));
    }

    /// Fail every call once the scripted responses run out; clear with
    /// `None`. Useful for simulating a provider that is down.
    pub fn fail_when_exhausted(&self, reason: impl Into<Option<String>>) {
        self.state.lock().exhausted_failure = reason.into();
    }

    /// Every `send_message` call so far, including session seeding.
    pub fn calls(&self) -> Vec<FakeCall> {
        self.state.lock().calls.clone()
    }

    /// Provider thread ids created so far.
    pub fn created_threads(&self) -> Vec<String> {
        self.state.lock().created.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }
}

#[async_trait]
impl ProviderAdapter for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn create_thread(&self, req: CreateThread<'_>) -> Result<ProviderThread, ProviderError> {
        let mut state = self.state.lock();
        state.next_thread += 1;
        let id = format!("fake-{}", state.next_thread);
        state.created.push(id.clone());
        if let Some(input) = req.initial_input {
            state.calls.push(FakeCall { thread_id: id.clone(), input: input.to_string() });
        }
        Ok(ProviderThread { id })
    }

    async fn resume_thread(&self, id: &str) -> Result<ProviderThread, ProviderError> {
        Ok(ProviderThread { id: id.to_string() })
    }

    async fn send_message(&self, turn: SendTurn<'_>) -> Result<TurnOutput, ProviderError> {
        let (response, exhausted_failure) = {
            let mut state = self.state.lock();
            state.calls.push(FakeCall {
                thread_id: turn.thread_id.to_string(),
                input: turn.input.to_string(),
            });
            (state.responses.pop_front(), state.exhausted_failure.clone())
        };
        match response {
            None => match exhausted_failure {
                Some(reason) => Err(ProviderError::Failed(reason)),
                None => Ok(TurnOutput::default()),
            },
            Some(FakeResponse::Text(text)) => {
                Ok(TurnOutput { output_text: text, raw: None })
            }
            Some(FakeResponse::Delayed(delay, text)) => {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => Ok(TurnOutput { output_text: text, raw: None }),
                    _ = turn.cancel.cancelled() => Err(ProviderError::Cancelled),
                }
            }
            Some(FakeResponse::Hold) => {
                turn.cancel.cancelled().await;
                Err(ProviderError::Cancelled)
            }
            Some(FakeResponse::Fail(reason)) => Err(ProviderError::Failed(reason)),
        }
    }
}

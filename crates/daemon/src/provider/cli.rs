// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess provider: drives an agent CLI, one invocation per turn.
//!
//! The configured command line runs under `sh -c` with the provider
//! thread id in `SHOGUN_SESSION` (plus `SHOGUN_MODEL` /
//! `SHOGUN_REASONING_EFFORT` when configured), the turn input on stdin,
//! and `outputText` collected from stdout. The wrapper script resumes its
//! own session state keyed by `SHOGUN_SESSION`. Cancellation kills the
//! child.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{CreateThread, ProviderAdapter, ProviderError, ProviderThread, SendTurn, TurnOutput};
use crate::config::Config;
use sg_core::Role;

#[derive(Clone)]
struct CliSession {
    working_directory: PathBuf,
}

/// One CLI provider instance per role.
pub struct CliProvider {
    name: String,
    command: String,
    model: Option<String>,
    env: HashMap<String, String>,
    reasoning_effort: Option<String>,
    sessions: Mutex<HashMap<String, CliSession>>,
}

impl CliProvider {
    /// Build from config for a role; the `provider` key is the command.
    pub fn from_config(config: &Config, role: Role) -> Self {
        Self {
            name: config.provider.clone(),
            command: config.provider.clone(),
            model: config.model_for(role).map(str::to_string),
            env: config.provider_specific.env.clone(),
            reasoning_effort: config.provider_specific.reasoning_effort.clone(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn build_command(&self, session: &CliSession, thread_id: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&self.command);
        cmd.env("SHOGUN_SESSION", thread_id);
        if let Some(model) = &self.model {
            cmd.env("SHOGUN_MODEL", model);
        }
        if let Some(effort) = &self.reasoning_effort {
            cmd.env("SHOGUN_REASONING_EFFORT", effort);
        }
        cmd.current_dir(&session.working_directory)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    fn session(&self, thread_id: &str) -> Result<CliSession, ProviderError> {
        self.sessions
            .lock()
            .get(thread_id)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownThread(thread_id.to_string()))
    }
}

#[async_trait]
impl ProviderAdapter for CliProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_thread(&self, req: CreateThread<'_>) -> Result<ProviderThread, ProviderError> {
        let id = uuid::Uuid::new_v4().to_string();
        let session = CliSession { working_directory: req.working_directory.to_path_buf() };
        self.sessions.lock().insert(id.clone(), session);
        debug!(thread_id = %id, "created provider session");

        if let Some(input) = req.initial_input {
            // Seed the session; the ACK reply is discarded.
            let turn = SendTurn {
                thread_id: &id,
                input,
                cancel: tokio_util::sync::CancellationToken::new(),
                progress: None,
            };
            self.send_message(turn).await?;
        }
        Ok(ProviderThread { id })
    }

    async fn resume_thread(&self, id: &str) -> Result<ProviderThread, ProviderError> {
        let mut sessions = self.sessions.lock();
        sessions.entry(id.to_string()).or_insert_with(|| CliSession {
            working_directory: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        });
        Ok(ProviderThread { id: id.to_string() })
    }

    async fn send_message(&self, turn: SendTurn<'_>) -> Result<TurnOutput, ProviderError> {
        let session = self.session(turn.thread_id)?;
        let mut child = self.build_command(&session, turn.thread_id).spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(turn.input.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        // Drain stdout concurrently so a chatty child never blocks on a
        // full pipe while we wait on it.
        let stdout = child.stdout.take();
        let reader = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut stdout) = stdout {
                use tokio::io::AsyncReadExt;
                let _ = stdout.read_to_end(&mut buf).await;
            }
            buf
        });

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = turn.cancel.cancelled() => {
                if let Err(e) = child.start_kill() {
                    warn!(thread_id = %turn.thread_id, err = %e, "kill after cancel failed");
                }
                let _ = child.wait().await;
                reader.abort();
                return Err(ProviderError::Cancelled);
            }
        };

        let stdout = reader.await.unwrap_or_default();
        let output_text = String::from_utf8_lossy(&stdout).into_owned();

        if let Some(progress) = &turn.progress {
            let _ = progress.send(format!("exit status: {status}"));
        }
        if !status.success() {
            return Err(ProviderError::Failed(format!(
                "{} exited with {}",
                self.command, status
            )));
        }
        Ok(TurnOutput { output_text, raw: None })
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;

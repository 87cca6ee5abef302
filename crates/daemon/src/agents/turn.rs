// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The turn protocol: provider round-trips with tool continuations.
//!
//! A turn starts from a batch of same-thread messages, loops the provider
//! up to `max_loops` times feeding back `TOOL_RESULT` lines, and ends
//! either on a tool-less response (auto-replied to the superior when
//! non-empty) or when the loop budget runs out. `waitForMessage` suspends
//! the turn against a durable record and grants one extra loop.

use chrono::SecondsFormat;
use serde_json::{json, Value};
use sg_core::{
    may_interrupt, parse_tool_requests, superior, AgentId, Clock, Message, Role, SessionBinding,
    ToolParse, ToolRequest,
};
use sg_storage::{WaitRecord, WaitStatus};
use std::fmt::Write as _;
use std::path::{Component, Path};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::runtime::{
    AgentRuntime, CancelReason, RuntimeError, DEFAULT_WAIT_TIMEOUT_MS, INITIAL_MAX_LOOPS,
    WAITS_PER_TURN,
};
use crate::prompt::{compose_system_prompt, PromptContext, ACK_REQUEST};
use crate::provider::{CreateThread, SendTurn, TurnOutput};

const BODY_FILE_MAX_BYTES: u64 = 10 * 1024;

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TurnEnd {
    Completed,
    Cancelled,
}

/// Outcome of a suspension.
enum WaitOutcome {
    Message(Message),
    Timeout(u64),
    Cancelled,
}

/// One executed (or rejected) tool line, ready for result framing.
struct ToolOutcome {
    name: String,
    payload: Value,
}

enum Exec {
    Payload(Value),
    /// A wait was processed; later tool lines in this batch are ignored.
    Wait(Value),
    Cancelled,
}

impl<C: Clock> AgentRuntime<C> {
    pub(crate) async fn run_turn(
        &self,
        batch: &[Message],
        token: CancellationToken,
    ) -> Result<TurnEnd, RuntimeError> {
        let head = &batch[0];
        let thread_id = head.thread_id.clone();
        let provider_thread = self.ensure_session(&thread_id, &token).await?;

        let mut input = compose_input(batch);
        let mut max_loops = INITIAL_MAX_LOOPS;
        let mut remaining_waits = WAITS_PER_TURN;

        // A durable wait record matching the head message means this turn
        // suspended before; resume from its outcome instead of replaying
        // the instruction.
        if let Some(record) = self.deps.waits.get(&thread_id, self.id) {
            if record.message_id == head.id {
                let payload = match record.status {
                    WaitStatus::Received => match record.received_message {
                        Some(message) => json!({"status": "message", "message": message}),
                        None => json!({"status": "timeout", "timeoutMs": record.timeout_ms}),
                    },
                    WaitStatus::Timeout => {
                        json!({"status": "timeout", "timeoutMs": record.timeout_ms})
                    }
                    WaitStatus::Pending => {
                        // Still unresolved: re-enter the suspension with a
                        // fresh timer of the recorded timeout.
                        match self.wait_for_arrival(&thread_id, record.timeout_ms, &token).await {
                            WaitOutcome::Message(message) => {
                                json!({"status": "message", "message": message})
                            }
                            WaitOutcome::Timeout(ms) => {
                                json!({"status": "timeout", "timeoutMs": ms})
                            }
                            WaitOutcome::Cancelled => return Ok(TurnEnd::Cancelled),
                        }
                    }
                };
                debug!(agent_id = %self.id, thread_id = %thread_id, "resuming from wait record");
                // The provider already saw the instruction before the
                // suspension; feed it only the outcome.
                input = format!("TOOL_RESULT waitForMessage: {payload}");
                max_loops += 1;
            }
        }

        let mut loops = 0;
        while loops < max_loops {
            loops += 1;
            let output = match self.provider_call(&provider_thread, &input, &token).await {
                Ok(TurnOutput { output_text, .. }) => output_text,
                Err(e) if e.is_cancelled() && self.explicit_cancel().is_some() => {
                    debug!(agent_id = %self.id, "turn aborted by explicit cancel");
                    return Ok(TurnEnd::Cancelled);
                }
                Err(e) => return Err(e.into()),
            };

            let parses = parse_tool_requests(&output);
            if parses.is_empty() {
                let trimmed = output.trim();
                if !trimmed.is_empty() {
                    self.auto_reply(head, trimmed)?;
                }
                break;
            }

            let mut outcomes: Vec<ToolOutcome> = Vec::new();
            let mut wait_done = false;
            for parse in parses {
                match parse {
                    ToolParse::Invalid { name, error } => {
                        warn!(agent_id = %self.id, tool = %name, error = %error, "invalid tool line");
                        outcomes.push(ToolOutcome {
                            name,
                            payload: json!({"status": "error", "error": error}),
                        });
                    }
                    ToolParse::Request(request) => {
                        if wait_done {
                            info!(
                                agent_id = %self.id,
                                tool = request.name(),
                                "ignoring tool line after waitForMessage in the same batch"
                            );
                            continue;
                        }
                        let name = request.name().to_string();
                        let exec = self
                            .execute_tool(
                                head,
                                &thread_id,
                                &provider_thread,
                                request,
                                &mut remaining_waits,
                                &mut max_loops,
                                &token,
                            )
                            .await?;
                        match exec {
                            Exec::Payload(payload) => {
                                outcomes.push(ToolOutcome { name, payload })
                            }
                            Exec::Wait(payload) => {
                                wait_done = true;
                                outcomes.push(ToolOutcome { name, payload });
                            }
                            Exec::Cancelled => return Ok(TurnEnd::Cancelled),
                        }
                    }
                }
            }
            input = frame_results(&outcomes);
        }

        // The suspension (if any) has been consumed; drop its record.
        if let Err(e) = self.deps.waits.clear(&thread_id, self.id) {
            warn!(agent_id = %self.id, err = %e, "wait record cleanup failed");
        }
        Ok(TurnEnd::Completed)
    }

    /// Idempotent session binding for (thread, agent): create or seed the
    /// provider thread with the composed system prompt on first use.
    async fn ensure_session(
        &self,
        thread_id: &str,
        token: &CancellationToken,
    ) -> Result<String, RuntimeError> {
        if let Some(binding) = self.deps.state.session(thread_id, self.id) {
            // Re-attach: after a restart the provider has not seen this
            // thread in its current incarnation.
            self.deps.provider.resume_thread(&binding.provider_thread_id).await?;
            if binding.initialized {
                return Ok(binding.provider_thread_id);
            }
            let seed = self.seed_input();
            self.deps
                .provider
                .send_message(SendTurn {
                    thread_id: &binding.provider_thread_id,
                    input: &seed,
                    cancel: token.clone(),
                    progress: None,
                })
                .await?;
            let initialized = SessionBinding { initialized: true, ..binding.clone() };
            self.deps.state.set_session(thread_id, self.id, initialized)?;
            return Ok(binding.provider_thread_id);
        }

        let seed = self.seed_input();
        let created = self
            .deps
            .provider
            .create_thread(CreateThread {
                working_directory: &self.deps.working_dir,
                initial_input: Some(&seed),
            })
            .await?;
        self.deps.state.set_session(
            thread_id,
            self.id,
            SessionBinding {
                provider: self.deps.provider.name().to_string(),
                provider_thread_id: created.id.clone(),
                initialized: true,
            },
        )?;
        info!(agent_id = %self.id, thread_id, provider_thread_id = %created.id, "session created");
        Ok(created.id)
    }

    fn seed_input(&self) -> String {
        let prompt = compose_system_prompt(&PromptContext {
            agent_id: self.id,
            base_dir: &self.deps.base_dir,
            history_dir: &self.deps.history_dir,
            ashigaru_count: self.deps.ashigaru_count,
            ashigaru_profiles: &self.deps.ashigaru_profiles,
        });
        format!("{prompt}\n{ACK_REQUEST}")
    }

    async fn provider_call(
        &self,
        provider_thread: &str,
        input: &str,
        token: &CancellationToken,
    ) -> Result<TurnOutput, crate::provider::ProviderError> {
        self.log_activity("calling_provider");
        let _heartbeat = self.heartbeat("calling_provider");
        self.deps
            .provider
            .send_message(SendTurn {
                thread_id: provider_thread,
                input,
                cancel: token.clone(),
                progress: None,
            })
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_tool(
        &self,
        head: &Message,
        thread_id: &str,
        provider_thread: &str,
        request: ToolRequest,
        remaining_waits: &mut u32,
        max_loops: &mut u32,
        token: &CancellationToken,
    ) -> Result<Exec, RuntimeError> {
        self.log_activity(format!("tool:{}", request.name()));
        match request {
            ToolRequest::GetAshigaruStatus => {
                if self.id.role() != Role::Karou {
                    return Ok(Exec::Payload(json!({
                        "status": "error",
                        "error": "getAshigaruStatus is only available to karou"
                    })));
                }
                let status = self.deps.fleet.ashigaru_status();
                Ok(Exec::Payload(serde_json::to_value(&status).unwrap_or(Value::Null)))
            }

            ToolRequest::WaitForMessage { timeout_ms } => {
                if !matches!(self.id.role(), Role::Shogun | Role::Karou) {
                    return Ok(Exec::Payload(json!({
                        "status": "error",
                        "error": "waitForMessage is not available to this role"
                    })));
                }
                let timeout = timeout_ms.unwrap_or(DEFAULT_WAIT_TIMEOUT_MS);
                if *remaining_waits == 0 {
                    // Budget exhausted: synthetic timeout, no suspension,
                    // but still one more loop so the model can wrap up.
                    *max_loops += 1;
                    return Ok(Exec::Wait(json!({
                        "status": "timeout",
                        "timeoutMs": timeout,
                        "limitReached": true,
                        "remainingWaits": 0
                    })));
                }
                *remaining_waits -= 1;

                let now = self.deps.clock.now_utc();
                self.deps.waits.put(&WaitRecord {
                    status: WaitStatus::Pending,
                    thread_id: thread_id.to_string(),
                    agent_id: self.id,
                    provider_thread_id: provider_thread.to_string(),
                    timeout_ms: timeout,
                    message_id: head.id.clone(),
                    from: head.from,
                    to: head.to,
                    title: head.title.clone(),
                    message_created_at: head.created_at,
                    created_at: now,
                    updated_at: now,
                    received_at: None,
                    received_message: None,
                })?;

                let payload = match self.wait_for_arrival(thread_id, timeout, token).await {
                    WaitOutcome::Message(message) => json!({
                        "status": "message",
                        "message": message,
                        "remainingWaits": *remaining_waits
                    }),
                    WaitOutcome::Timeout(ms) => json!({
                        "status": "timeout",
                        "timeoutMs": ms,
                        "remainingWaits": *remaining_waits
                    }),
                    WaitOutcome::Cancelled => return Ok(Exec::Cancelled),
                };
                *max_loops += 1;
                Ok(Exec::Wait(payload))
            }

            ToolRequest::InterruptAgent { to, title, body } => {
                let mut interrupted: Vec<String> = Vec::new();
                let mut denied: Vec<String> = Vec::new();
                for raw in to {
                    let Some(target) = AgentId::parse(&raw) else {
                        denied.push(raw);
                        continue;
                    };
                    if !may_interrupt(self.id, target) {
                        denied.push(raw);
                        continue;
                    }
                    if let Some(body) = &body {
                        let title = title.as_deref().unwrap_or("interrupt");
                        if let Err(e) =
                            self.deps.writer.write(self.id, target, thread_id, title, body)
                        {
                            warn!(agent_id = %self.id, to = %target, err = %e, "interrupt message write failed");
                            denied.push(raw);
                            continue;
                        }
                    }
                    let reason = if body.is_some() {
                        CancelReason::Interrupt
                    } else {
                        CancelReason::Stop
                    };
                    self.deps.fleet.interrupt(target, reason);
                    interrupted.push(target.to_string());
                }
                let status = if interrupted.is_empty() { "denied" } else { "ok" };
                Ok(Exec::Payload(json!({
                    "status": status,
                    "interrupted": interrupted,
                    "denied": denied
                })))
            }

            ToolRequest::SendMessage { to, title, body, body_file } => {
                Ok(Exec::Payload(self.send_message_tool(thread_id, to, title, body, body_file)))
            }
        }
    }

    fn send_message_tool(
        &self,
        thread_id: &str,
        to: Vec<String>,
        title: Option<String>,
        body: Option<String>,
        body_file: Option<String>,
    ) -> Value {
        let Some(title) = title else {
            return json!({"status": "error", "error": "sendMessage requires title="});
        };
        let body = match (body, body_file) {
            (Some(body), _) => body,
            (None, Some(file)) => match self.read_body_file(&file) {
                Ok(body) => body,
                Err(error) => return json!({"status": "error", "error": error}),
            },
            (None, None) => {
                return json!({"status": "error", "error": "sendMessage requires body= or bodyFile="})
            }
        };

        let mut sent: Vec<String> = Vec::new();
        let mut denied: Vec<String> = Vec::new();
        for raw in to {
            let Some(target) = AgentId::parse(&raw) else {
                denied.push(raw);
                continue;
            };
            if !self.allowed.contains(&target) {
                denied.push(raw);
                continue;
            }
            match self.deps.writer.write(self.id, target, thread_id, &title, &body) {
                Ok(written) => {
                    debug!(agent_id = %self.id, to = %target, message_id = %written.id, "sent");
                    sent.push(target.to_string());
                }
                Err(e) => {
                    warn!(agent_id = %self.id, to = %target, err = %e, "send failed");
                    denied.push(raw);
                }
            }
        }
        if sent.is_empty() {
            json!({"status": "denied", "to": denied})
        } else {
            json!({"status": "sent", "to": sent, "denied": denied})
        }
    }

    /// Read a `bodyFile` argument. The path must resolve under the
    /// agent's scratch directory and the file must be at most 10 KiB.
    fn read_body_file(&self, relative: &str) -> Result<String, String> {
        let path = Path::new(relative);
        if path.is_absolute()
            || path.components().any(|c| matches!(c, Component::ParentDir))
        {
            return Err(format!("bodyFile must stay under tmp/{}/", self.id));
        }
        let scratch = self.deps.base_dir.join("tmp").join(self.id.to_string());
        let full = scratch.join(path);
        let meta = std::fs::metadata(&full).map_err(|e| format!("bodyFile unreadable: {e}"))?;
        if meta.len() > BODY_FILE_MAX_BYTES {
            return Err(format!(
                "bodyFile exceeds {} bytes ({} bytes)",
                BODY_FILE_MAX_BYTES,
                meta.len()
            ));
        }
        std::fs::read_to_string(&full).map_err(|e| format!("bodyFile unreadable: {e}"))
    }

    /// Tool-less non-empty output is forwarded to the role's superior.
    fn auto_reply(&self, head: &Message, output: &str) -> Result<(), RuntimeError> {
        let Some(target) = superior(self.id) else {
            return Ok(());
        };
        if !self.allowed.contains(&target) {
            warn!(agent_id = %self.id, to = %target, "auto-reply target not permitted");
            return Ok(());
        }
        let title = format!("auto_reply: {}", head.title);
        self.deps
            .writer
            .write(self.id, target, &head.thread_id, &title, output)?;
        info!(agent_id = %self.id, to = %target, "auto-replied");
        self.log_activity("auto_reply");
        Ok(())
    }

    /// Suspend until a message for `thread_id` arrives, the timeout
    /// expires, or the turn is cancelled. The durable record must already
    /// be pending.
    async fn wait_for_arrival(
        &self,
        thread_id: &str,
        timeout_ms: u64,
        token: &CancellationToken,
    ) -> WaitOutcome {
        // Fast path: a message for this thread is already queued.
        if let Some(message) = self.pop_queued(thread_id) {
            let now = self.deps.clock.now_utc();
            let _ = self.deps.waits.mark_received(thread_id, self.id, &message, now);
            return WaitOutcome::Message(message);
        }

        let (tx, mut rx) = tokio::sync::oneshot::channel();
        {
            let mut st = self.inner.lock();
            st.waiter = Some(super::runtime::ThreadWaiter {
                thread_id: thread_id.to_string(),
                tx,
            });
        }

        // A message that raced in before the waiter was installed marked
        // the record received; honor it instead of waiting.
        if let Some(record) = self.deps.waits.get(thread_id, self.id) {
            if record.status == WaitStatus::Received {
                if let Some(message) = record.received_message {
                    self.inner.lock().waiter = None;
                    return WaitOutcome::Message(message);
                }
            }
        }

        self.log_activity("waiting");
        let _heartbeat = self.heartbeat("waiting");

        tokio::select! {
            res = &mut rx => match res {
                Ok(Some(message)) => {
                    let now = self.deps.clock.now_utc();
                    let _ = self.deps.waits.mark_received(thread_id, self.id, &message, now);
                    WaitOutcome::Message(message)
                }
                Ok(None) | Err(_) => WaitOutcome::Cancelled,
            },
            _ = token.cancelled() => {
                self.inner.lock().waiter = None;
                WaitOutcome::Cancelled
            }
            _ = tokio::time::sleep(Duration::from_millis(timeout_ms)) => {
                self.inner.lock().waiter = None;
                // A resolution may have slipped in while the timer fired.
                if let Ok(Some(message)) = rx.try_recv() {
                    let now = self.deps.clock.now_utc();
                    let _ = self.deps.waits.mark_received(thread_id, self.id, &message, now);
                    return WaitOutcome::Message(message);
                }
                let now = self.deps.clock.now_utc();
                match self.deps.waits.mark_timeout(thread_id, self.id, now) {
                    Ok(Some(record))
                        if record.status == WaitStatus::Received =>
                    {
                        match record.received_message {
                            Some(message) => WaitOutcome::Message(message),
                            None => WaitOutcome::Timeout(timeout_ms),
                        }
                    }
                    _ => WaitOutcome::Timeout(timeout_ms),
                }
            }
        }
    }
}

/// Compose the initial turn input from a batch.
pub(crate) fn compose_input(batch: &[Message]) -> String {
    if batch.len() == 1 {
        return format_message(&batch[0]);
    }
    let n = batch.len();
    let mut out = format!("BATCH_START count={n}\n");
    for (i, message) in batch.iter().enumerate() {
        let i = i + 1;
        let _ = writeln!(out, "--- MESSAGE {i}/{n} START ---");
        out.push_str(&format_message(message));
        out.push('\n');
        let _ = writeln!(out, "--- MESSAGE {i}/{n} END ---");
    }
    out.push_str("BATCH_END");
    out
}

fn format_message(message: &Message) -> String {
    format!(
        "FROM: {}\nDATE: {}\nTITLE: {}\n\n{}",
        message.from,
        message.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        message.title,
        message.body
    )
}

/// Frame executed tools into the next turn input.
fn frame_results(outcomes: &[ToolOutcome]) -> String {
    if let [only] = outcomes {
        return format!("TOOL_RESULT {}: {}", only.name, only.payload);
    }
    let items: Vec<Value> = outcomes
        .iter()
        .map(|o| {
            let mut entry = serde_json::Map::new();
            entry.insert("tool".to_string(), Value::String(o.name.clone()));
            if let Value::Object(fields) = &o.payload {
                for (k, v) in fields {
                    entry.insert(k.clone(), v.clone());
                }
            }
            Value::Object(entry)
        })
        .collect();
    format!("TOOL_RESULT batch: {}", Value::Array(items))
}

#[cfg(test)]
#[path = "turn_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! System-prompt composition.
//!
//! A pure function of the agent's identity and the coordinator layout.
//! The runtime treats the result as opaque text; it is sent once per
//! (thread, agent) session when the provider thread is seeded.

use sg_core::{allowed_recipients, AgentId, Role};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

/// Appended to the system prompt when seeding a session; the provider's
/// reply to it is discarded.
pub const ACK_REQUEST: &str = "Reply with only the word ACK to confirm you are ready.";

pub struct PromptContext<'a> {
    pub agent_id: AgentId,
    pub base_dir: &'a Path,
    pub history_dir: &'a Path,
    pub ashigaru_count: u32,
    pub ashigaru_profiles: &'a HashMap<String, String>,
}

/// Compose the full system prompt for one agent.
pub fn compose_system_prompt(ctx: &PromptContext<'_>) -> String {
    let mut out = String::new();
    let id = ctx.agent_id;

    let _ = writeln!(out, "You are {id}, an agent in a four-tier chain of command:");
    let _ = writeln!(out, "king (human) -> shogun -> karou -> ashigaru1..ashigaru{}.", ctx.ashigaru_count);
    out.push('\n');
    out.push_str(role_charter(id.role()));
    out.push('\n');

    if let AgentId::Ashigaru(_) = id {
        if let Some(profile) = ctx.ashigaru_profiles.get(&id.to_string()) {
            let _ = writeln!(out, "Your profile: {profile}");
            out.push('\n');
        }
    }

    out.push_str(TOOL_PROTOCOL);
    out.push('\n');

    let peers: Vec<String> = allowed_recipients(id, ctx.ashigaru_count)
        .into_iter()
        .map(|a| a.to_string())
        .collect();
    let _ = writeln!(out, "You may address: {}.", peers.join(", "));
    let _ = writeln!(
        out,
        "Messages are delivered through a file mailbox under {}; replies and \
         sub-tasks you send with tools are written there for you.",
        ctx.base_dir.display()
    );
    let _ = writeln!(
        out,
        "Conversation history is archived under {}.",
        ctx.history_dir.display()
    );
    let _ = writeln!(
        out,
        "Scratch files for bodyFile= must live under {}/tmp/{id}/.",
        ctx.base_dir.display()
    );

    out
}

fn role_charter(role: Role) -> &'static str {
    match role {
        Role::King => "You are the human operator. This prompt is never used.\n",
        Role::Shogun => {
            "You receive instructions from the king and own their outcome. Break each \
             instruction into work for the karou, dispatch it with sendMessage, wait for \
             results with waitForMessage, and report the consolidated outcome back to the \
             king.\n"
        }
        Role::Karou => {
            "You receive work from the shogun and run the ashigaru. Check who is free with \
             getAshigaruStatus, split the work across them with sendMessage, collect their \
             replies with waitForMessage, and send the combined result to the shogun. Use \
             interruptAgent only to redirect an ashigaru that is working on the wrong \
             thing.\n"
        }
        Role::Ashigaru => {
            "You execute the task you are given and send the result to the karou with \
             sendMessage. If you produce no tool call, your entire reply is forwarded to \
             the karou as-is.\n"
        }
    }
}

const TOOL_PROTOCOL: &str = "\
To act, emit tool lines in your reply, one per line:
  TOOL:sendMessage to=<id>[,<id>] title=\"...\" body=\"...\"
  TOOL:sendMessage to=<id> title=\"...\" bodyFile=relative/path.md
  TOOL:waitForMessage timeoutMs=<n>
  TOOL:getAshigaruStatus            (karou only)
  TOOL:interruptAgent to=<id>[,<id>] [title=\"...\" body=\"...\"]
Values may be bare, \"double-quoted\", or 'single-quoted'; escapes \\\\ \\n \\\" \\'
work inside quotes. A JSON form is also accepted: TOOL <name> {\"to\": [...], ...}.
After your tools run you receive one TOOL_RESULT line and may continue.
";

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;

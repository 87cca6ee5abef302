// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message model and the mailbox filename-stem grammar.
//!
//! A mailbox filename stem is `{threadId}__{timestamp}-{rand6}__{slug}`:
//! the timestamp is sortable ISO-8601 UTC with `:` and `.` folded to `-`,
//! the rand token is 6 URL-safe characters, and the slug is
//! `[a-z0-9-]{1..60}` with `message` as the fallback. The stem fully
//! determines the message id.

use crate::agent::AgentId;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Maximum slug length in a filename stem.
pub const SLUG_MAX_LEN: usize = 60;

/// Slug used when a title normalizes to nothing.
pub const SLUG_FALLBACK: &str = "message";

/// One delivered (or deliverable) message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Stable id: always the filename stem.
    pub id: String,
    pub thread_id: String,
    pub from: AgentId,
    pub to: AgentId,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Normalize a title into the slug grammar `[a-z0-9-]{1..60}`.
///
/// Runs of out-of-grammar characters collapse into a single `-`; leading
/// and trailing dashes are trimmed. An empty result falls back to
/// [`SLUG_FALLBACK`].
pub fn slugify(title: &str) -> String {
    let mut out = String::with_capacity(title.len().min(SLUG_MAX_LEN));
    let mut pending_dash = false;
    for ch in title.chars() {
        let mapped = match ch {
            'a'..='z' | '0'..='9' | '-' => Some(ch),
            'A'..='Z' => Some(ch.to_ascii_lowercase()),
            _ => None,
        };
        match mapped {
            Some('-') => pending_dash = !out.is_empty(),
            Some(c) => {
                if pending_dash {
                    out.push('-');
                    pending_dash = false;
                }
                out.push(c);
            }
            None => pending_dash = !out.is_empty(),
        }
        if out.len() >= SLUG_MAX_LEN {
            break;
        }
    }
    out.truncate(SLUG_MAX_LEN);
    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        SLUG_FALLBACK.to_string()
    } else {
        out
    }
}

/// True if `s` already satisfies the slug grammar.
pub fn is_valid_slug(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= SLUG_MAX_LEN
        && s.chars().all(|c| matches!(c, 'a'..='z' | '0'..='9' | '-'))
}

/// Fold a timestamp into its filename form: sortable ISO-8601 UTC
/// milliseconds with `:` and `.` replaced by `-`.
pub fn fold_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

/// Generate the 6-character URL-safe random token used in stems.
pub fn new_rand_token() -> String {
    nanoid::nanoid!(6)
}

/// Build a filename stem for a message.
pub fn format_stem(thread_id: &str, title: &str, ts: DateTime<Utc>, rand: &str) -> String {
    format!("{}__{}-{}__{}", thread_id, fold_timestamp(ts), rand, slugify(title))
}

/// Result of parsing a filename stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedStem {
    pub thread_id: Option<String>,
    pub title: String,
}

/// Parse a filename stem into thread id and title.
///
/// Split on `__`: three or more tokens yield `(tok[0], join(tok[2..]))`,
/// two yield `(tok[0], tok[1])`, one yields no thread id and the whole stem
/// as the title. Callers substitute the last-active thread when the thread
/// id is absent.
pub fn parse_stem(stem: &str) -> ParsedStem {
    let tokens: Vec<&str> = stem.split("__").collect();
    match tokens.len() {
        0 | 1 => ParsedStem { thread_id: None, title: stem.to_string() },
        2 => ParsedStem {
            thread_id: Some(tokens[0].to_string()),
            title: tokens[1].to_string(),
        },
        _ => ParsedStem {
            thread_id: Some(tokens[0].to_string()),
            title: tokens[2..].join("__"),
        },
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;

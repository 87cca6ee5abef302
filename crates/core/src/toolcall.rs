// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool-request grammar for model output.
//!
//! Two line forms are recognized, scanned per non-empty output line:
//!
//! ```text
//! TOOL:sendMessage to=karou,ashigaru1 title="sub task" body='line\none'
//! TOOL sendMessage {"to": ["karou"], "title": "sub task", "body": "..."}
//! ```
//!
//! Argument values may be bare, double-quoted, or single-quoted; quoted
//! values support the escapes `\\`, `\n`, `\"`, and `\'`. A malformed
//! argument list or JSON block for a known tool is reported as an invalid
//! tool line so the model can recover; lines that do not name a known tool
//! are not tool lines at all.

use serde_json::Value;

pub const TOOL_GET_ASHIGARU_STATUS: &str = "getAshigaruStatus";
pub const TOOL_INTERRUPT_AGENT: &str = "interruptAgent";
pub const TOOL_WAIT_FOR_MESSAGE: &str = "waitForMessage";
pub const TOOL_SEND_MESSAGE: &str = "sendMessage";

/// A parsed tool request. Recipient names stay raw strings here; the
/// runtime resolves and authorizes them at execution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolRequest {
    GetAshigaruStatus,
    WaitForMessage {
        timeout_ms: Option<u64>,
    },
    InterruptAgent {
        to: Vec<String>,
        title: Option<String>,
        body: Option<String>,
    },
    SendMessage {
        to: Vec<String>,
        title: Option<String>,
        body: Option<String>,
        body_file: Option<String>,
    },
}

impl ToolRequest {
    pub fn name(&self) -> &'static str {
        match self {
            ToolRequest::GetAshigaruStatus => TOOL_GET_ASHIGARU_STATUS,
            ToolRequest::WaitForMessage { .. } => TOOL_WAIT_FOR_MESSAGE,
            ToolRequest::InterruptAgent { .. } => TOOL_INTERRUPT_AGENT,
            ToolRequest::SendMessage { .. } => TOOL_SEND_MESSAGE,
        }
    }
}

/// One recognized tool line: either a well-formed request or a per-line
/// error to be surfaced back to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolParse {
    Request(ToolRequest),
    Invalid { name: String, error: String },
}

/// Scan model output for tool lines, in document order.
pub fn parse_tool_requests(output: &str) -> Vec<ToolParse> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(parse_tool_line)
        .collect()
}

fn parse_tool_line(line: &str) -> Option<ToolParse> {
    if let Some(rest) = line.strip_prefix("TOOL:") {
        return parse_colon_form(rest.trim());
    }
    if let Some(rest) = line.strip_prefix("TOOL ") {
        return parse_json_form(rest.trim());
    }
    None
}

fn is_known_tool(name: &str) -> bool {
    matches!(
        name,
        TOOL_GET_ASHIGARU_STATUS | TOOL_INTERRUPT_AGENT | TOOL_WAIT_FOR_MESSAGE
            | TOOL_SEND_MESSAGE
    )
}

fn parse_colon_form(rest: &str) -> Option<ToolParse> {
    let (name, args) = match rest.find(char::is_whitespace) {
        Some(idx) => (&rest[..idx], rest[idx..].trim_start()),
        None => (rest, ""),
    };
    if !is_known_tool(name) {
        return None;
    }
    if name == TOOL_GET_ASHIGARU_STATUS {
        return Some(ToolParse::Request(ToolRequest::GetAshigaruStatus));
    }
    let pairs = match parse_kv_args(args) {
        Ok(pairs) => pairs,
        Err(error) => return Some(ToolParse::Invalid { name: name.to_string(), error }),
    };
    Some(build_request(name, &pairs))
}

fn parse_json_form(rest: &str) -> Option<ToolParse> {
    let (name, json) = match rest.find(char::is_whitespace) {
        Some(idx) => (&rest[..idx], rest[idx..].trim_start()),
        None => (rest, ""),
    };
    if !is_known_tool(name) {
        return None;
    }
    let value: Value = match serde_json::from_str(json) {
        Ok(v) => v,
        Err(e) => {
            return Some(ToolParse::Invalid {
                name: name.to_string(),
                error: format!("invalid JSON arguments: {}", e),
            })
        }
    };
    let Value::Object(map) = value else {
        return Some(ToolParse::Invalid {
            name: name.to_string(),
            error: "JSON arguments must be an object".to_string(),
        });
    };

    let mut pairs: Vec<(String, String)> = Vec::new();
    for (key, val) in map {
        match val {
            Value::String(s) => pairs.push((key, s)),
            Value::Number(n) => pairs.push((key, n.to_string())),
            Value::Array(items) => {
                let mut joined = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(s) => joined.push(s),
                        other => {
                            return Some(ToolParse::Invalid {
                                name: name.to_string(),
                                error: format!("{} entries must be strings, got {}", key, other),
                            })
                        }
                    }
                }
                pairs.push((key, joined.join(",")));
            }
            other => {
                return Some(ToolParse::Invalid {
                    name: name.to_string(),
                    error: format!("unsupported value for {}: {}", key, other),
                })
            }
        }
    }
    Some(build_request(name, &pairs))
}

fn build_request(name: &str, pairs: &[(String, String)]) -> ToolParse {
    let get = |key: &str| -> Option<String> {
        pairs.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    };
    let recipients = |raw: &str| -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    };

    match name {
        TOOL_WAIT_FOR_MESSAGE => {
            let timeout_ms = match get("timeoutMs") {
                None => None,
                Some(raw) => match raw.parse::<u64>() {
                    Ok(ms) => Some(ms),
                    Err(_) => {
                        return ToolParse::Invalid {
                            name: name.to_string(),
                            error: format!("timeoutMs must be an integer, got {:?}", raw),
                        }
                    }
                },
            };
            ToolParse::Request(ToolRequest::WaitForMessage { timeout_ms })
        }
        TOOL_INTERRUPT_AGENT => {
            let Some(raw_to) = get("to") else {
                return ToolParse::Invalid {
                    name: name.to_string(),
                    error: "interruptAgent requires to=".to_string(),
                };
            };
            let to = recipients(&raw_to);
            if to.is_empty() {
                return ToolParse::Invalid {
                    name: name.to_string(),
                    error: "interruptAgent requires at least one recipient".to_string(),
                };
            }
            ToolParse::Request(ToolRequest::InterruptAgent {
                to,
                title: get("title"),
                body: get("body"),
            })
        }
        TOOL_SEND_MESSAGE => {
            let Some(raw_to) = get("to") else {
                return ToolParse::Invalid {
                    name: name.to_string(),
                    error: "sendMessage requires to=".to_string(),
                };
            };
            let to = recipients(&raw_to);
            if to.is_empty() {
                return ToolParse::Invalid {
                    name: name.to_string(),
                    error: "sendMessage requires at least one recipient".to_string(),
                };
            }
            ToolParse::Request(ToolRequest::SendMessage {
                to,
                title: get("title"),
                body: get("body"),
                body_file: get("bodyFile"),
            })
        }
        _ => ToolParse::Request(ToolRequest::GetAshigaruStatus),
    }
}

/// Parse a `key=value` argument list.
///
/// Keys are `[A-Za-z0-9_]+`. Values are bare (up to whitespace),
/// double-quoted, or single-quoted with backslash escapes.
fn parse_kv_args(input: &str) -> Result<Vec<(String, String)>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut pairs = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if i >= chars.len() {
            break;
        }

        let key_start = i;
        while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
            i += 1;
        }
        if i == key_start {
            return Err(format!("unexpected character {:?} in arguments", chars[i]));
        }
        let key: String = chars[key_start..i].iter().collect();

        if i >= chars.len() || chars[i] != '=' {
            return Err(format!("expected '=' after {:?}", key));
        }
        i += 1;

        let value = match chars.get(i) {
            Some(&quote @ ('"' | '\'')) => {
                i += 1;
                let (value, next) = scan_quoted(&chars, i, quote)
                    .ok_or_else(|| format!("unterminated quote in value of {:?}", key))?;
                i = next;
                value
            }
            _ => {
                let start = i;
                while i < chars.len() && !chars[i].is_whitespace() {
                    i += 1;
                }
                chars[start..i].iter().collect()
            }
        };

        pairs.push((key, value));
    }

    Ok(pairs)
}

/// Scan a quoted value starting just past the opening quote. Returns the
/// unescaped value and the index past the closing quote.
fn scan_quoted(chars: &[char], mut i: usize, quote: char) -> Option<(String, usize)> {
    let mut out = String::new();
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                match chars.get(i + 1) {
                    Some('n') => out.push('\n'),
                    Some('\\') => out.push('\\'),
                    Some('"') => out.push('"'),
                    Some('\'') => out.push('\''),
                    Some(other) => {
                        // Unknown escape: keep both characters.
                        out.push('\\');
                        out.push(*other);
                    }
                    None => return None,
                }
                i += 2;
            }
            c if c == quote => return Some((out, i + 1)),
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    None
}

#[cfg(test)]
#[path = "toolcall_tests.rs"]
mod tests;

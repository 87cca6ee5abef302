// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn single_request(output: &str) -> ToolRequest {
    let mut parsed = parse_tool_requests(output);
    assert_eq!(parsed.len(), 1, "expected one tool line in {:?}", output);
    match parsed.remove(0) {
        ToolParse::Request(req) => req,
        ToolParse::Invalid { name, error } => panic!("invalid {}: {}", name, error),
    }
}

#[test]
fn plain_text_has_no_tool_lines() {
    assert!(parse_tool_requests("just a reply\nwith two lines").is_empty());
    assert!(parse_tool_requests("").is_empty());
    // Prose mentioning the word TOOL is not a tool line.
    assert!(parse_tool_requests("TOOL usage is described above").is_empty());
    assert!(parse_tool_requests("TOOL:unknownThing to=karou").is_empty());
}

#[test]
fn get_ashigaru_status_parses() {
    assert_eq!(single_request("TOOL:getAshigaruStatus"), ToolRequest::GetAshigaruStatus);
}

#[test]
fn wait_for_message_with_and_without_timeout() {
    assert_eq!(
        single_request("TOOL:waitForMessage"),
        ToolRequest::WaitForMessage { timeout_ms: None }
    );
    assert_eq!(
        single_request("TOOL:waitForMessage timeoutMs=5000"),
        ToolRequest::WaitForMessage { timeout_ms: Some(5000) }
    );
}

#[test]
fn wait_for_message_bad_timeout_is_invalid() {
    let parsed = parse_tool_requests("TOOL:waitForMessage timeoutMs=soon");
    assert_eq!(parsed.len(), 1);
    match &parsed[0] {
        ToolParse::Invalid { name, error } => {
            assert_eq!(name, "waitForMessage");
            assert!(error.contains("timeoutMs"));
        }
        other => panic!("expected invalid, got {:?}", other),
    }
}

#[test]
fn send_message_bare_and_quoted_values() {
    let req = single_request(r#"TOOL:sendMessage to=karou title="sub task" body='do "it"'"#);
    assert_eq!(
        req,
        ToolRequest::SendMessage {
            to: vec!["karou".to_string()],
            title: Some("sub task".to_string()),
            body: Some("do \"it\"".to_string()),
            body_file: None,
        }
    );
}

#[test]
fn send_message_multiple_recipients() {
    let req = single_request("TOOL:sendMessage to=ashigaru1,ashigaru2 title=t body=b");
    assert_eq!(
        req,
        ToolRequest::SendMessage {
            to: vec!["ashigaru1".to_string(), "ashigaru2".to_string()],
            title: Some("t".to_string()),
            body: Some("b".to_string()),
            body_file: None,
        }
    );
}

#[test]
fn send_message_body_file() {
    let req = single_request("TOOL:sendMessage to=karou title=report bodyFile=out.md");
    assert_eq!(
        req,
        ToolRequest::SendMessage {
            to: vec!["karou".to_string()],
            title: Some("report".to_string()),
            body: None,
            body_file: Some("out.md".to_string()),
        }
    );
}

#[test]
fn escapes_in_quoted_values() {
    let req = single_request(r#"TOOL:sendMessage to=karou body="line1\nline2\\end\"q\"""#);
    match req {
        ToolRequest::SendMessage { body: Some(body), .. } => {
            assert_eq!(body, "line1\nline2\\end\"q\"");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn single_quoted_escape() {
    let req = single_request(r"TOOL:sendMessage to=karou body='it\'s done'");
    match req {
        ToolRequest::SendMessage { body: Some(body), .. } => assert_eq!(body, "it's done"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn missing_recipients_is_invalid() {
    let parsed = parse_tool_requests("TOOL:sendMessage title=x body=y");
    assert!(matches!(&parsed[0], ToolParse::Invalid { name, .. } if name == "sendMessage"));

    let parsed = parse_tool_requests("TOOL:interruptAgent title=x");
    assert!(matches!(&parsed[0], ToolParse::Invalid { name, .. } if name == "interruptAgent"));
}

#[test]
fn unterminated_quote_is_invalid() {
    let parsed = parse_tool_requests(r#"TOOL:sendMessage to=karou body="oops"#);
    assert!(matches!(&parsed[0], ToolParse::Invalid { error, .. } if error.contains("unterminated")));
}

#[test]
fn interrupt_agent_with_and_without_body() {
    let req = single_request("TOOL:interruptAgent to=ashigaru1 title=stop body=\"drop it\"");
    assert_eq!(
        req,
        ToolRequest::InterruptAgent {
            to: vec!["ashigaru1".to_string()],
            title: Some("stop".to_string()),
            body: Some("drop it".to_string()),
        }
    );

    let req = single_request("TOOL:interruptAgent to=ashigaru1,ashigaru2");
    assert_eq!(
        req,
        ToolRequest::InterruptAgent {
            to: vec!["ashigaru1".to_string(), "ashigaru2".to_string()],
            title: None,
            body: None,
        }
    );
}

#[test]
fn json_variant_parses() {
    let req = single_request(
        r#"TOOL sendMessage {"to": ["karou", "ashigaru1"], "title": "t", "body": "b"}"#,
    );
    assert_eq!(
        req,
        ToolRequest::SendMessage {
            to: vec!["karou".to_string(), "ashigaru1".to_string()],
            title: Some("t".to_string()),
            body: Some("b".to_string()),
            body_file: None,
        }
    );

    let req = single_request(r#"TOOL waitForMessage {"timeoutMs": 2500}"#);
    assert_eq!(req, ToolRequest::WaitForMessage { timeout_ms: Some(2500) });
}

#[test]
fn json_variant_bad_json_is_invalid() {
    let parsed = parse_tool_requests("TOOL sendMessage {not json}");
    assert_eq!(parsed.len(), 1);
    match &parsed[0] {
        ToolParse::Invalid { name, error } => {
            assert_eq!(name, "sendMessage");
            assert!(error.contains("invalid JSON"));
        }
        other => panic!("expected invalid, got {:?}", other),
    }
}

#[test]
fn multiple_tool_lines_keep_document_order() {
    let output = "some preamble\n\
                  TOOL:sendMessage to=ashigaru1 title=a body=one\n\
                  TOOL:sendMessage to=ashigaru2 title=b body=two\n\
                  TOOL:waitForMessage timeoutMs=1000\n";
    let parsed = parse_tool_requests(output);
    assert_eq!(parsed.len(), 3);
    assert!(matches!(
        &parsed[0],
        ToolParse::Request(ToolRequest::SendMessage { to, .. }) if to == &["ashigaru1".to_string()]
    ));
    assert!(matches!(
        &parsed[2],
        ToolParse::Request(ToolRequest::WaitForMessage { timeout_ms: Some(1000) })
    ));
}

#[test]
fn duplicate_keys_take_the_last_value() {
    let req = single_request("TOOL:sendMessage to=karou title=a title=b body=x");
    match req {
        ToolRequest::SendMessage { title: Some(title), .. } => assert_eq!(title, "b"),
        other => panic!("unexpected {:?}", other),
    }
}

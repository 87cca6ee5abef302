// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

// Scenario: the shogun fans a sub-task out to the karou.
#[tokio::test]
async fn send_message_tool_writes_the_outbound_file() {
    let fx = Fixture::new();
    let runtime = fx.runtime(AgentId::Shogun);
    fx.provider.push_text(r#"TOOL:sendMessage to=karou title="sub" body="A""#);
    fx.provider.push_text("");

    let rx = runtime
        .enqueue(fx.message(AgentId::King, AgentId::Shogun, "t1", "task", "調査して"))
        .unwrap();
    rx.await.unwrap().unwrap();

    let stems = fx.outbox(AgentId::Karou, AgentId::Shogun);
    assert_eq!(stems.len(), 1);
    assert_eq!(fx.outbox_body(AgentId::Karou, AgentId::Shogun, &stems[0]), "A");
    assert_eq!(sg_core::parse_stem(&stems[0]).thread_id.as_deref(), Some("t1"));

    let inputs = fx.turn_inputs();
    assert_eq!(inputs.len(), 2);
    assert!(inputs[1].starts_with("TOOL_RESULT sendMessage:"), "got: {}", inputs[1]);
    assert!(inputs[1].contains(r#""status":"sent""#));
    assert!(inputs[1].contains(r#""to":["karou"]"#));
}

// Scenario: an ashigaru may not address the shogun.
#[tokio::test]
async fn denied_recipients_produce_no_file_and_a_denied_result() {
    let fx = Fixture::new();
    let runtime = fx.runtime(AgentId::Ashigaru(1));
    fx.provider.push_text(r#"TOOL:sendMessage to=shogun title="x" body="y""#);
    fx.provider.push_text("");

    let rx = runtime
        .enqueue(fx.message(AgentId::Karou, AgentId::Ashigaru(1), "t1", "task", "b"))
        .unwrap();
    rx.await.unwrap().unwrap();

    assert!(fx.outbox(AgentId::Shogun, AgentId::Ashigaru(1)).is_empty());
    let inputs = fx.turn_inputs();
    assert!(inputs[1].contains(r#""status":"denied""#));
    assert!(inputs[1].contains(r#""to":["shogun"]"#));
}

// Recipients are filtered per sender; the allowed part still sends.
#[tokio::test]
async fn mixed_recipients_split_into_sent_and_denied() {
    let fx = Fixture::new();
    let runtime = fx.runtime(AgentId::Ashigaru(1));
    fx.provider.push_text("TOOL:sendMessage to=karou,shogun,ashigaru2 title=t body=b");
    fx.provider.push_text("");

    let rx = runtime
        .enqueue(fx.message(AgentId::Karou, AgentId::Ashigaru(1), "t1", "task", "x"))
        .unwrap();
    rx.await.unwrap().unwrap();

    assert_eq!(fx.outbox(AgentId::Karou, AgentId::Ashigaru(1)).len(), 1);
    assert_eq!(fx.outbox(AgentId::Ashigaru(2), AgentId::Ashigaru(1)).len(), 1);
    assert!(fx.outbox(AgentId::Shogun, AgentId::Ashigaru(1)).is_empty());

    let inputs = fx.turn_inputs();
    assert!(inputs[1].contains(r#""status":"sent""#));
    assert!(inputs[1].contains(r#""denied":["shogun"]"#));
}

#[tokio::test]
async fn get_ashigaru_status_is_karou_only() {
    let fx = Fixture::new();
    *fx.fleet.status.lock() = AshigaruStatus {
        idle: vec![AgentId::Ashigaru(1), AgentId::Ashigaru(3)],
        busy: vec![AgentId::Ashigaru(2)],
    };

    let karou = fx.runtime(AgentId::Karou);
    fx.provider.push_text("TOOL:getAshigaruStatus");
    fx.provider.push_text("");
    let rx = karou
        .enqueue(fx.message(AgentId::Shogun, AgentId::Karou, "t1", "plan", "go"))
        .unwrap();
    rx.await.unwrap().unwrap();

    let inputs = fx.turn_inputs();
    assert!(inputs[1].starts_with("TOOL_RESULT getAshigaruStatus:"));
    assert!(inputs[1].contains(r#""idle":["ashigaru1","ashigaru3"]"#));
    assert!(inputs[1].contains(r#""busy":["ashigaru2"]"#));

    // The shogun gets an error result, not a status.
    let shogun = fx.runtime(AgentId::Shogun);
    fx.provider.push_text("TOOL:getAshigaruStatus");
    fx.provider.push_text("");
    let rx = shogun
        .enqueue(fx.message(AgentId::King, AgentId::Shogun, "t2", "peek", "x"))
        .unwrap();
    rx.await.unwrap().unwrap();
    let inputs = fx.turn_inputs();
    let last = inputs.last().unwrap();
    assert!(last.contains(r#""status":"error""#), "got: {last}");
}

#[tokio::test]
async fn interrupt_with_body_delivers_then_interrupts() {
    let fx = Fixture::new();
    let runtime = fx.runtime(AgentId::Karou);
    fx.provider.push_text(r#"TOOL:interruptAgent to=ashigaru1 title=redirect body="new orders""#);
    fx.provider.push_text("");

    let rx = runtime
        .enqueue(fx.message(AgentId::Shogun, AgentId::Karou, "t1", "go", "x"))
        .unwrap();
    rx.await.unwrap().unwrap();

    let stems = fx.outbox(AgentId::Ashigaru(1), AgentId::Karou);
    assert_eq!(stems.len(), 1);
    assert_eq!(fx.outbox_body(AgentId::Ashigaru(1), AgentId::Karou, &stems[0]), "new orders");
    assert_eq!(
        fx.fleet.interrupts.lock().as_slice(),
        &[(AgentId::Ashigaru(1), CancelReason::Interrupt)]
    );
}

#[tokio::test]
async fn interrupt_without_body_stops_the_target() {
    let fx = Fixture::new();
    let runtime = fx.runtime(AgentId::Karou);
    fx.provider.push_text("TOOL:interruptAgent to=ashigaru2");
    fx.provider.push_text("");

    let rx = runtime
        .enqueue(fx.message(AgentId::Shogun, AgentId::Karou, "t1", "halt", "x"))
        .unwrap();
    rx.await.unwrap().unwrap();

    assert!(fx.outbox(AgentId::Ashigaru(2), AgentId::Karou).is_empty());
    assert_eq!(
        fx.fleet.interrupts.lock().as_slice(),
        &[(AgentId::Ashigaru(2), CancelReason::Stop)]
    );
}

// Interrupt authorization is stricter than mail: direct subordinates only.
#[tokio::test]
async fn interrupt_outside_the_chain_is_denied() {
    let fx = Fixture::new();
    let runtime = fx.runtime(AgentId::Ashigaru(1));
    fx.provider.push_text("TOOL:interruptAgent to=ashigaru2");
    fx.provider.push_text("");

    let rx = runtime
        .enqueue(fx.message(AgentId::Karou, AgentId::Ashigaru(1), "t1", "nope", "x"))
        .unwrap();
    rx.await.unwrap().unwrap();

    assert!(fx.fleet.interrupts.lock().is_empty());
    let inputs = fx.turn_inputs();
    assert!(inputs[1].contains(r#""denied":["ashigaru2"]"#));
}

#[tokio::test]
async fn invalid_tool_lines_return_error_results() {
    let fx = Fixture::new();
    let runtime = fx.runtime(AgentId::Shogun);
    // Missing to= is a per-tool error, returned so the model can recover.
    fx.provider.push_text("TOOL:sendMessage title=x body=y");
    fx.provider.push_text("");

    let rx = runtime
        .enqueue(fx.message(AgentId::King, AgentId::Shogun, "t1", "task", "b"))
        .unwrap();
    rx.await.unwrap().unwrap();

    let inputs = fx.turn_inputs();
    assert!(inputs[1].starts_with("TOOL_RESULT sendMessage:"));
    assert!(inputs[1].contains(r#""status":"error""#));
}

#[tokio::test]
async fn body_file_is_read_from_the_scratch_dir() {
    let fx = Fixture::new();
    let scratch = fx.base.join("tmp/shogun");
    std::fs::create_dir_all(&scratch).unwrap();
    std::fs::write(scratch.join("report.md"), "long report body").unwrap();

    let runtime = fx.runtime(AgentId::Shogun);
    fx.provider.push_text("TOOL:sendMessage to=karou title=report bodyFile=report.md");
    fx.provider.push_text("");

    let rx = runtime
        .enqueue(fx.message(AgentId::King, AgentId::Shogun, "t1", "task", "b"))
        .unwrap();
    rx.await.unwrap().unwrap();

    let stems = fx.outbox(AgentId::Karou, AgentId::Shogun);
    assert_eq!(stems.len(), 1);
    assert_eq!(
        fx.outbox_body(AgentId::Karou, AgentId::Shogun, &stems[0]),
        "long report body"
    );
}

#[tokio::test]
async fn body_file_outside_scratch_or_missing_is_an_error() {
    // Traversal, absolute, and missing paths all surface as tool errors.
    for path in ["../../state.json", "/etc/passwd", "not-there.md"] {
        let fx = Fixture::new();
        let runtime = fx.runtime(AgentId::Shogun);
        fx.provider.push_text(format!("TOOL:sendMessage to=karou title=x bodyFile={path}"));
        fx.provider.push_text("");

        let rx = runtime
            .enqueue(fx.message(AgentId::King, AgentId::Shogun, "t1", "task", "b"))
            .unwrap();
        rx.await.unwrap().unwrap();

        assert!(fx.outbox(AgentId::Karou, AgentId::Shogun).is_empty(), "case {path}");
        let inputs = fx.turn_inputs();
        assert!(inputs[1].contains(r#""status":"error""#), "case {path}: {}", inputs[1]);
    }
}

#[tokio::test]
async fn oversized_body_file_is_rejected() {
    let fx = Fixture::new();
    let scratch = fx.base.join("tmp/shogun");
    std::fs::create_dir_all(&scratch).unwrap();
    std::fs::write(scratch.join("big.md"), vec![b'x'; 11 * 1024]).unwrap();

    let runtime = fx.runtime(AgentId::Shogun);
    fx.provider.push_text("TOOL:sendMessage to=karou title=x bodyFile=big.md");
    fx.provider.push_text("");

    let rx = runtime
        .enqueue(fx.message(AgentId::King, AgentId::Shogun, "t1", "task", "b"))
        .unwrap();
    rx.await.unwrap().unwrap();

    assert!(fx.outbox(AgentId::Karou, AgentId::Shogun).is_empty());
    let inputs = fx.turn_inputs();
    assert!(inputs[1].contains("exceeds"), "got: {}", inputs[1]);
}

#[tokio::test]
async fn two_tools_in_one_response_frame_as_a_batch_result() {
    let fx = Fixture::new();
    let runtime = fx.runtime(AgentId::Karou);
    fx.provider.push_text(
        "TOOL:sendMessage to=ashigaru1 title=a body=one\n\
         TOOL:sendMessage to=ashigaru2 title=b body=two",
    );
    fx.provider.push_text("");

    let rx = runtime
        .enqueue(fx.message(AgentId::Shogun, AgentId::Karou, "t1", "fan", "x"))
        .unwrap();
    rx.await.unwrap().unwrap();

    assert_eq!(fx.outbox(AgentId::Ashigaru(1), AgentId::Karou).len(), 1);
    assert_eq!(fx.outbox(AgentId::Ashigaru(2), AgentId::Karou).len(), 1);
    let inputs = fx.turn_inputs();
    assert!(inputs[1].starts_with("TOOL_RESULT batch: ["), "got: {}", inputs[1]);
    assert!(inputs[1].matches(r#""tool":"sendMessage""#).count() == 2);
}

use llm_stream_engine::streaming::{
    AnthropicStreamParser, FrameReader, StreamEvent, StreamParser,
};
use serde_json::json;

/// Run a raw byte transcript through reader + parser with a given chunking.
fn run_chunked(transcript: &[u8], chunk_size: usize) -> Vec<StreamEvent> {
    let mut reader = FrameReader::new();
    let mut parser = AnthropicStreamParser::new();
    let mut events = Vec::new();
    for chunk in transcript.chunks(chunk_size.max(1)) {
        for line in reader.push(chunk) {
            events.extend(parser.parse_line(&line));
        }
    }
    events.extend(parser.finish());
    events
}

fn text_transcript() -> Vec<u8> {
    let lines = [
        "event: message_start",
        r#"data: {"type":"message_start","message":{"id":"msg_a","usage":{"input_tokens":12,"output_tokens":0}}}"#,
        "",
        "event: content_block_start",
        r#"data: {"type":"content_block_start","index":0,"content_block":{"type":"text"}}"#,
        "",
        "event: content_block_delta",
        r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hello, "}}"#,
        "",
        "event: content_block_delta",
        r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"world!"}}"#,
        "",
        "event: content_block_stop",
        r#"data: {"type":"content_block_stop","index":0}"#,
        "",
        "event: message_delta",
        r#"data: {"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":4}}"#,
        "",
        "event: message_stop",
        r#"data: {"type":"message_stop"}"#,
        "",
    ];
    let mut out = Vec::new();
    for line in lines {
        out.extend_from_slice(line.as_bytes());
        out.push(b'\n');
    }
    out
}

fn concatenated_content(events: &[StreamEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::ContentDelta(text) => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_single_text_block_scenario() {
    let lines = [
        "event: content_block_start",
        r#"data: {"type":"content_block_start","index":0,"content_block":{"type":"text"}}"#,
        "event: content_block_delta",
        r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#,
        "event: content_block_stop",
        r#"data: {"type":"content_block_stop","index":0}"#,
    ];
    let mut parser = AnthropicStreamParser::new();
    let events: Vec<StreamEvent> = lines
        .iter()
        .flat_map(|line| parser.parse_line(line))
        .collect();

    assert_eq!(events, vec![StreamEvent::ContentDelta("Hi".to_string())]);
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, StreamEvent::ToolCallRequested { .. }))
    );
}

#[test]
fn test_framing_independence() {
    let transcript = text_transcript();
    let reference = run_chunked(&transcript, transcript.len());
    let reference_content = concatenated_content(&reference);
    assert_eq!(reference_content, "Hello, world!");
    assert_eq!(reference.last(), Some(&StreamEvent::Completed));

    for chunk_size in [1, 2, 3, 7, 11, 64, 1024] {
        let events = run_chunked(&transcript, chunk_size);
        assert_eq!(events, reference, "chunk size {chunk_size}");
    }
}

#[test]
fn test_tool_argument_partition_invariance() {
    let arguments = r#"{"path": "src/main.rs", "limit": 42}"#;
    let expected = json!({"path": "src/main.rs", "limit": 42});

    for split in 0..=arguments.len() {
        let (first, second) = arguments.split_at(split);
        let mut parser = AnthropicStreamParser::new();
        let mut events = Vec::new();
        events.extend(parser.parse_line(
            r#"data: {"type":"content_block_start","index":0,"content_block":{"type":"tool_use","id":"toolu_1","name":"read_file"}}"#,
        ));
        for fragment in [first, second] {
            if fragment.is_empty() {
                continue;
            }
            let line = format!(
                r#"data: {{"type":"content_block_delta","index":0,"delta":{{"type":"input_json_delta","partial_json":{}}}}}"#,
                serde_json::to_string(fragment).unwrap()
            );
            events.extend(parser.parse_line(&line));
        }
        events.extend(parser.parse_line(r#"data: {"type":"content_block_stop","index":0}"#));

        assert_eq!(events.len(), 1, "split at {split}");
        match &events[0] {
            StreamEvent::ToolCallRequested { arguments, .. } => {
                assert_eq!(arguments, &expected, "split at {split}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

#[test]
fn test_malformed_tool_json_scenario() {
    let mut parser = AnthropicStreamParser::new();
    let mut events = Vec::new();
    events.extend(parser.parse_line(
        r#"data: {"type":"content_block_start","index":0,"content_block":{"type":"tool_use","id":"toolu_x","name":"broken"}}"#,
    ));
    events.extend(parser.parse_line(
        r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"not json"}}"#,
    ));
    events.extend(parser.parse_line(r#"data: {"type":"content_block_stop","index":0}"#));

    assert_eq!(events.len(), 1);
    match &events[0] {
        StreamEvent::ToolCallRequested {
            id,
            name,
            arguments,
        } => {
            assert_eq!(id, "toolu_x");
            assert_eq!(name, "broken");
            assert!(arguments.get("error").is_some(), "no error marker");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_interleaved_text_and_tool_blocks() {
    let mut parser = AnthropicStreamParser::new();
    let lines = [
        r#"data: {"type":"content_block_start","index":0,"content_block":{"type":"text"}}"#,
        r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Let me check."}}"#,
        r#"data: {"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"toolu_2","name":"search"}}"#,
        r#"data: {"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"q\":\"rust\"}"}}"#,
        r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":" One moment."}}"#,
        r#"data: {"type":"content_block_stop","index":1}"#,
        r#"data: {"type":"content_block_stop","index":0}"#,
        r#"data: {"type":"message_stop"}"#,
    ];
    let events: Vec<StreamEvent> = lines
        .iter()
        .flat_map(|line| parser.parse_line(line))
        .collect();

    assert_eq!(
        events,
        vec![
            StreamEvent::ContentDelta("Let me check.".to_string()),
            StreamEvent::ContentDelta(" One moment.".to_string()),
            StreamEvent::ToolCallRequested {
                id: "toolu_2".to_string(),
                name: "search".to_string(),
                arguments: json!({"q": "rust"}),
            },
            StreamEvent::Completed,
        ]
    );
}

#[test]
fn test_keepalives_and_unknown_events_between_blocks() {
    let transcript_lines = [
        "event: ping",
        r#"data: {"type":"ping"}"#,
        "",
        ": comment line",
        "event: content_block_start",
        r#"data: {"type":"content_block_start","index":0,"content_block":{"type":"text"}}"#,
        "event: shiny_new_event",
        r#"data: {"type":"shiny_new_event","payload":{"nested":true}}"#,
        "event: content_block_delta",
        r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"ok"}}"#,
        "event: message_stop",
        r#"data: {"type":"message_stop"}"#,
    ];
    let mut parser = AnthropicStreamParser::new();
    let events: Vec<StreamEvent> = transcript_lines
        .iter()
        .flat_map(|line| parser.parse_line(line))
        .collect();

    assert_eq!(
        events,
        vec![
            StreamEvent::ContentDelta("ok".to_string()),
            StreamEvent::Completed,
        ]
    );
}

#[test]
fn test_state_captured_from_transcript() {
    let transcript = text_transcript();
    let mut reader = FrameReader::new();
    let mut parser = AnthropicStreamParser::new();
    for line in reader.push(&transcript) {
        parser.parse_line(&line);
    }
    let state = parser.state();
    assert_eq!(state.message_id.as_deref(), Some("msg_a"));
    assert_eq!(state.stop_reason.as_deref(), Some("end_turn"));
    assert_eq!(state.usage.input_tokens, 12);
    assert_eq!(state.usage.output_tokens, 4);
    assert_eq!(state.malformed_lines, 0);
}

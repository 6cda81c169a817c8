mod harness;

use std::time::Duration;

use chatwire::sse;
use chatwire::types::StreamSummary;
use chatwire::{ChatOutcome, DiagnosticKind, FinishReason, StreamAssembler, StreamEvent, ToolCall, Usage, WireError, WireState};
use harness::vendor::{VendorStream, replay, streamed_text};
use serde_json::json;

fn openai_text_stream() -> VendorStream {
    VendorStream::new()
        .chunk(json!({
            "id": "chatcmpl-9",
            "object": "chat.completion.chunk",
            "created": 1_718_000_000,
            "model": "gpt-4o-2024-08-06",
            "choices": [{"index": 0, "delta": {"role": "assistant", "content": ""}, "finish_reason": null}]
        }))
        .chunk(json!({
            "id": "chatcmpl-9",
            "object": "chat.completion.chunk",
            "model": "gpt-4o-2024-08-06",
            "choices": [{"index": 0, "delta": {"content": "The sky"}, "finish_reason": null}]
        }))
        .chunk(json!({
            "id": "chatcmpl-9",
            "object": "chat.completion.chunk",
            "model": "gpt-4o-2024-08-06",
            "choices": [{"index": 0, "delta": {"content": " is blue."}, "finish_reason": null}]
        }))
        .chunk(json!({
            "id": "chatcmpl-9",
            "object": "chat.completion.chunk",
            "model": "gpt-4o-2024-08-06",
            "choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}]
        }))
        .chunk(json!({
            "id": "chatcmpl-9",
            "object": "chat.completion.chunk",
            "model": "gpt-4o-2024-08-06",
            "choices": [],
            "usage": {"prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17}
        }))
        .done()
}

#[tokio::test]
async fn openai_text_stream_assembles() {
    chatwire_telemetry::init_for_tests();

    let (outcome, events) = replay(&openai_text_stream(), 13, StreamAssembler::default()).await;
    let response = outcome.completed().cloned().unwrap();

    assert_eq!(response.id.as_deref(), Some("chatcmpl-9"));
    assert_eq!(response.model.as_deref(), Some("gpt-4o-2024-08-06"));
    assert_eq!(response.choices.len(), 1);
    assert_eq!(response.choices[0].message.content.as_deref(), Some("The sky is blue."));
    assert_eq!(response.choices[0].finish_reason, FinishReason::Stop);
    assert!(response.diagnostics.is_empty());
    assert_eq!(
        response.usage,
        Some(Usage {
            prompt_tokens: 12,
            completion_tokens: 5,
            total_tokens: 17
        })
    );

    assert_eq!(streamed_text(&events, 0), "The sky is blue.");
    assert!(matches!(events.last(), Some(StreamEvent::Summary(StreamSummary { error: None, usage: Some(_) }))));
}

#[tokio::test]
async fn packet_size_never_changes_the_result() {
    let vendor = openai_text_stream();
    let (reference, _) = replay(&vendor, vendor.body().len(), StreamAssembler::default()).await;

    for size in [1, 2, 3, 5, 8, 21, 55] {
        let (outcome, _) = replay(&vendor, size, StreamAssembler::default()).await;
        assert_eq!(outcome, reference, "packet size {size}");
    }
}

#[tokio::test]
async fn trickled_stream_matches_immediate_delivery() {
    let vendor = openai_text_stream();
    let immediate = sse::assemble(vendor.units(9), StreamAssembler::default()).await;
    let trickled = sse::assemble(vendor.trickle(9, Duration::from_millis(1)), StreamAssembler::default()).await;
    assert_eq!(immediate, trickled);
}

#[tokio::test]
async fn openai_parallel_tool_calls() {
    let vendor = VendorStream::new()
        .chunk(json!({
            "id": "chatcmpl-t",
            "object": "chat.completion.chunk",
            "choices": [{"index": 0, "delta": {"role": "assistant", "content": null, "tool_calls": [
                {"index": 0, "id": "call_paris", "type": "function", "function": {"name": "get_weather", "arguments": ""}}
            ]}}]
        }))
        .chunk(json!({
            "id": "chatcmpl-t",
            "object": "chat.completion.chunk",
            "choices": [{"index": 0, "delta": {"tool_calls": [
                {"index": 0, "function": {"arguments": "{\"city\":"}}
            ]}}]
        }))
        .chunk(json!({
            "id": "chatcmpl-t",
            "object": "chat.completion.chunk",
            "choices": [{"index": 0, "delta": {"tool_calls": [
                {"index": 1, "id": "call_tokyo", "type": "function", "function": {"name": "get_weather", "arguments": "{\"city\":"}}
            ]}}]
        }))
        .chunk(json!({
            "id": "chatcmpl-t",
            "object": "chat.completion.chunk",
            "choices": [{"index": 0, "delta": {"tool_calls": [
                {"index": 1, "function": {"arguments": "\"Tokyo\"}"}},
                {"index": 0, "function": {"arguments": "\"Paris\"}"}}
            ]}}]
        }))
        .chunk(json!({
            "id": "chatcmpl-t",
            "object": "chat.completion.chunk",
            "choices": [{"index": 0, "delta": {}, "finish_reason": "tool_calls"}]
        }))
        .done();

    let (outcome, _) = replay(&vendor, 17, StreamAssembler::default()).await;
    let choice = outcome.completed().and_then(|r| r.choice(0)).cloned().unwrap();

    assert_eq!(choice.finish_reason, FinishReason::ToolCalls);
    assert_eq!(choice.message.content, None);
    assert_eq!(
        choice.message.tool_calls,
        vec![
            ToolCall::new("call_paris", "get_weather", "{\"city\":\"Paris\"}"),
            ToolCall::new("call_tokyo", "get_weather", "{\"city\":\"Tokyo\"}"),
        ]
    );
}

#[tokio::test]
async fn mistral_whole_tool_calls_without_index() {
    let vendor = VendorStream::new()
        .chunk(json!({
            "id": "cmpl-m",
            "object": "chat.completion.chunk",
            "model": "mistral-large-latest",
            "choices": [{"index": 0, "delta": {"role": "assistant", "content": ""}, "finish_reason": null}]
        }))
        .chunk(json!({
            "id": "cmpl-m",
            "object": "chat.completion.chunk",
            "model": "mistral-large-latest",
            "choices": [{"index": 0, "delta": {"tool_calls": [
                {"id": "Ab12Cd34E", "function": {"name": "lookup", "arguments": "{\"q\":\"rust\"}"}},
                {"id": "Fg56Hi78J", "function": {"name": "lookup", "arguments": "{\"q\":\"serde\"}"}}
            ]}, "finish_reason": "tool_calls"}],
            "usage": {"prompt_tokens": 40, "completion_tokens": 22, "total_tokens": 62}
        }))
        .done();

    let (outcome, _) = replay(&vendor, 64, StreamAssembler::default()).await;
    let response = outcome.completed().cloned().unwrap();
    let choice = &response.choices[0];

    assert_eq!(
        choice.message.tool_calls,
        vec![
            ToolCall::new("Ab12Cd34E", "lookup", "{\"q\":\"rust\"}"),
            ToolCall::new("Fg56Hi78J", "lookup", "{\"q\":\"serde\"}"),
        ]
    );
    assert_eq!(choice.finish_reason, FinishReason::ToolCalls);
    assert!(
        response
            .diagnostics
            .iter()
            .all(|d| d.kind == DiagnosticKind::ProtocolInconsistency)
    );
}

#[tokio::test]
async fn azure_content_filter_preamble() {
    let vendor = VendorStream::new()
        .chunk(json!({
            "id": "",
            "object": "",
            "created": 0,
            "model": "",
            "choices": [],
            "prompt_filter_results": [{"prompt_index": 0, "content_filter_results": {}}]
        }))
        .chunk(json!({
            "id": "chatcmpl-az",
            "object": "chat.completion.chunk",
            "model": "gpt-4o",
            "choices": [{"index": 0, "delta": {"role": "assistant", "content": "Filtered"}, "content_filter_results": {}}]
        }))
        .chunk(json!({
            "id": "chatcmpl-az",
            "object": "chat.completion.chunk",
            "model": "gpt-4o",
            "choices": [{"index": 0, "delta": {}, "finish_reason": "content_filter"}]
        }))
        .done();

    let (outcome, _) = replay(&vendor, 30, StreamAssembler::default()).await;
    let response = outcome.completed().cloned().unwrap();

    assert_eq!(response.id.as_deref(), Some("chatcmpl-az"));
    assert_eq!(response.model.as_deref(), Some("gpt-4o"));
    assert_eq!(response.choices.len(), 1);
    assert_eq!(response.choices[0].finish_reason, FinishReason::ContentFilter);
    assert!(response.diagnostics.is_empty());
}

#[tokio::test]
async fn openrouter_keep_alives_and_mid_stream_error() {
    let vendor = VendorStream::new()
        .comment("OPENROUTER PROCESSING")
        .chunk(json!({
            "id": "gen-1",
            "object": "chat.completion.chunk",
            "model": "anthropic/claude-3.5-sonnet",
            "choices": [{"index": 0, "delta": {"role": "assistant", "content": "Partial "}}]
        }))
        .comment("OPENROUTER PROCESSING")
        .chunk(json!({
            "id": "gen-1",
            "object": "chat.completion.chunk",
            "choices": [{"index": 0, "delta": {"content": "answer"}, "finish_reason": "error"}],
            "error": {"message": "Upstream overloaded", "code": 502}
        }))
        .chunk(json!({
            "id": "gen-1",
            "object": "chat.completion.chunk",
            "choices": [{"index": 0, "delta": {"content": " never seen"}}]
        }))
        .done();

    let (outcome, events) = replay(&vendor, 11, StreamAssembler::default()).await;

    let ChatOutcome::Failed { error, partial } = outcome else {
        panic!("expected a failed outcome");
    };
    let WireError::Vendor(vendor_error) = error else {
        panic!("expected a vendor error");
    };
    assert_eq!(vendor_error.message, "Upstream overloaded");
    assert_eq!(vendor_error.code.as_deref(), Some("502"));

    let choice = partial.choice(0).unwrap();
    assert_eq!(choice.message.content.as_deref(), Some("Partial answer"));
    assert_eq!(choice.finish_reason, FinishReason::Error);

    assert!(events.iter().any(|e| matches!(e, StreamEvent::VendorError(_))));
    assert!(matches!(events.last(), Some(StreamEvent::Summary(StreamSummary { error: Some(_), .. }))));
}

#[tokio::test]
async fn error_only_payload_ends_stream() {
    let vendor = VendorStream::new()
        .chunk(json!({
            "id": "c",
            "choices": [{"index": 0, "delta": {"content": "so far"}}]
        }))
        .chunk(json!({"error": {"message": "rate limited", "type": "rate_limit_error", "code": "429"}}))
        .done();

    let (outcome, _) = replay(&vendor, 40, StreamAssembler::default()).await;
    let ChatOutcome::Failed { error, partial } = outcome else {
        panic!("expected a failed outcome");
    };
    assert!(error.is_terminal());
    assert_eq!(partial.choices[0].message.content.as_deref(), Some("so far"));
    assert_eq!(partial.choices[0].finish_reason, FinishReason::Unknown);
}

#[tokio::test]
async fn perplexity_cumulative_message_and_repeated_usage() {
    let vendor = VendorStream::new()
        .chunk(json!({
            "id": "pplx-1",
            "model": "sonar",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "delta": {"role": "assistant", "content": "Rust "},
                "message": {"role": "assistant", "content": "Rust "}
            }],
            "usage": {"prompt_tokens": 8, "completion_tokens": 1, "total_tokens": 9}
        }))
        .chunk(json!({
            "id": "pplx-1",
            "model": "sonar",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "delta": {"content": "is fast."},
                "message": {"role": "assistant", "content": "Rust is fast."},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 8, "completion_tokens": 4, "total_tokens": 12}
        }))
        .done();

    let (outcome, events) = replay(&vendor, 25, StreamAssembler::default()).await;
    let response = outcome.completed().cloned().unwrap();

    assert_eq!(response.choices[0].message.content.as_deref(), Some("Rust is fast."));
    assert_eq!(response.usage.map(|u| u.total_tokens), Some(12));
    assert_eq!(events.iter().filter(|e| matches!(e, StreamEvent::Usage(_))).count(), 2);
}

#[tokio::test]
async fn groq_usage_without_total_is_derived() {
    let vendor = VendorStream::new()
        .chunk(json!({
            "id": "chatcmpl-g",
            "object": "chat.completion.chunk",
            "choices": [{"index": 0, "delta": {"content": "hi"}, "finish_reason": "stop"}],
            "x_groq": {"id": "req_01"}
        }))
        .chunk(json!({
            "id": "chatcmpl-g",
            "object": "chat.completion.chunk",
            "choices": [],
            "usage": {"prompt_tokens": 3, "completion_tokens": 1}
        }))
        .done();

    let (outcome, _) = replay(&vendor, 32, StreamAssembler::default()).await;
    assert_eq!(outcome.completed().and_then(|r| r.usage).map(|u| u.total_tokens), Some(4));
}

#[tokio::test]
async fn multiple_choices_finish_independently() {
    let vendor = VendorStream::new()
        .chunk(json!({
            "id": "c",
            "choices": [
                {"index": 1, "delta": {"role": "assistant", "content": "B"}},
                {"index": 0, "delta": {"role": "assistant", "content": "A"}}
            ]
        }))
        .chunk(json!({"id": "c", "choices": [{"index": 1, "delta": {}, "finish_reason": "length"}]}))
        .chunk(json!({"id": "c", "choices": [{"index": 0, "delta": {"content": "a"}, "finish_reason": "stop"}]}))
        .done();

    let (outcome, events) = replay(&vendor, 10, StreamAssembler::default()).await;
    let response = outcome.completed().cloned().unwrap();

    let indices: Vec<u32> = response.choices.iter().map(|c| c.index).collect();
    assert_eq!(indices, vec![0, 1]);
    assert_eq!(response.choices[0].message.content.as_deref(), Some("Aa"));
    assert_eq!(response.choices[1].finish_reason, FinishReason::Length);

    let finished = events.iter().filter(|e| matches!(e, StreamEvent::Finished(_))).count();
    assert_eq!(finished, 2);
}

#[tokio::test]
async fn malformed_units_are_skipped_and_recorded() {
    let vendor = VendorStream::new()
        .chunk(json!({"id": "c", "choices": [{"index": 0, "delta": {"content": "one "}}]}))
        .raw("{\"id\": \"c\", \"choices\": [")
        .chunk(json!({"id": "c", "choices": [{"index": "zero", "delta": {"content": "bad"}}]}))
        .chunk(json!({"choices": [{"index": 0, "delta": {"content": "no id"}}]}))
        .chunk(json!({"id": "c", "choices": [{"index": 0, "delta": {"content": "two"}, "finish_reason": "stop"}]}))
        .done();

    let (outcome, _) = replay(&vendor, 19, StreamAssembler::default()).await;
    let response = outcome.completed().cloned().unwrap();

    assert_eq!(response.choices[0].message.content.as_deref(), Some("one two"));
    let units: Vec<u64> = response
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::SchemaViolation)
        .map(|d| d.unit)
        .collect();
    assert_eq!(units, vec![1, 2, 3]);
}

#[tokio::test]
async fn diagnostics_are_bounded() {
    let mut vendor = VendorStream::new();
    for _ in 0..10 {
        vendor = vendor.raw("not json");
    }
    vendor = vendor.chunk(json!({"id": "c", "choices": [{"index": 0, "delta": {"content": "ok"}, "finish_reason": "stop"}]}));

    let state = WireState::default();
    let assembler = StreamAssembler::new(state.mapper().clone(), 3);
    let (outcome, _) = replay(&vendor, 64, assembler).await;
    let response = outcome.completed().cloned().unwrap();

    assert_eq!(response.diagnostics.len(), 3);
    assert_eq!(response.dropped_diagnostics, 7);
    assert_eq!(response.choices[0].message.content.as_deref(), Some("ok"));
}

#[tokio::test]
async fn transport_failure_keeps_partial_output() {
    let vendor = VendorStream::new()
        .chunk(json!({"id": "c", "choices": [{"index": 0, "delta": {"content": "Once upon"}}]}))
        .then_fail("connection reset by peer");

    let (outcome, events) = replay(&vendor, 16, StreamAssembler::default()).await;
    let ChatOutcome::Failed { error, partial } = outcome else {
        panic!("expected a failed outcome");
    };

    assert_eq!(error, WireError::Transport("connection reset by peer".to_owned()));
    assert_eq!(partial.choices[0].message.content.as_deref(), Some("Once upon"));
    assert_eq!(partial.choices[0].finish_reason, FinishReason::Unknown);
    assert!(matches!(events.last(), Some(StreamEvent::Summary(StreamSummary { error: Some(_), .. }))));
}

#[tokio::test]
async fn units_after_done_are_ignored() {
    let vendor = VendorStream::new()
        .chunk(json!({"id": "c", "choices": [{"index": 0, "delta": {"content": "done"}, "finish_reason": "stop"}]}))
        .done()
        .chunk(json!({"id": "c", "choices": [{"index": 1, "delta": {"content": "ghost"}}]}));

    let (outcome, _) = replay(&vendor, 8, StreamAssembler::default()).await;
    assert_eq!(outcome.completed().map(|r| r.choices.len()), Some(1));
}

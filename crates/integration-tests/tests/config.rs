mod harness;

use chatwire::types::ToolDefinition;
use chatwire::{ChatRequest, DialectKind, FinishReason, Message, StreamEvent, ToolChoice};
use chatwire_config::LogFormat;
use harness::config::ConfigFile;
use harness::vendor::{VendorStream, replay};
use serde_json::json;

const GATEWAY_CONFIG: &str = r#"
[dialects.office-proxy]
base = "openai"
accepts_stream_options = false
omit_fields = ["seed"]

[dialects.strict-local]
base = "lmstudio"
accepts_tools = false

[finish_reasons]
"end_of_text" = "stop"
"blocked" = "content_filter"

[stream]
max_diagnostics = 2
include_usage = true

[logging]
filter = "warn,chatwire=debug"
format = "json"
"#;

#[test]
fn config_file_loads() {
    let file = ConfigFile::write(GATEWAY_CONFIG).unwrap();
    let config = file.load().unwrap();

    assert_eq!(config.dialects.len(), 2);
    assert_eq!(config.stream.max_diagnostics, 2);
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.logging.filter, "warn,chatwire=debug");
}

#[test]
fn invalid_config_files_are_rejected() {
    for (toml, needle) in [
        ("[dialects.x]\nbase = \"cohere\"\n", "unknown preset"),
        ("[dialects.x]\nbase = \"openai\"\nomit_fields = [\"messages\"]\n", "cannot omit"),
        ("[stream]\nmax_diagnostics = 0\n", "max_diagnostics"),
        ("[finish_reasons]\n\"\" = \"stop\"\n", "empty token"),
        ("[server]\nport = 1\n", "failed to parse"),
    ] {
        let file = ConfigFile::write(toml).unwrap();
        let error = file.load().unwrap_err().to_string();
        assert!(error.contains(needle), "{toml:?}: {error}");
    }
}

#[test]
fn configured_dialects_shape_requests() {
    let state = ConfigFile::write(GATEWAY_CONFIG).unwrap().state().unwrap();

    let mut req = ChatRequest::new("gpt-4o-mini", vec![Message::system("be brief"), Message::user("hi")]);
    req.stream = true;
    req.params.seed = Some(42);
    req.tools = Some(vec![ToolDefinition::function("search", None, None)]);
    req.tool_choice = Some(ToolChoice::Auto);

    let proxy = state.dialect("office-proxy").unwrap();
    assert_eq!(proxy.kind, DialectKind::OpenAi);

    let body = state.normalize_request(&req, "office-proxy").unwrap().body;
    assert!(body.get("stream_options").is_none());
    assert!(body.get("seed").is_none());
    assert_eq!(body["tool_choice"], json!("auto"));

    let body = state.normalize_request(&req, "strict-local").unwrap().body;
    assert!(body.get("tools").is_none());
    assert!(body.get("tool_choice").is_none());

    // Presets stay reachable next to configured names
    let body = state.normalize_request(&req, "openai").unwrap().body;
    assert_eq!(body["seed"], json!(42));
    assert_eq!(body["stream_options"], json!({"include_usage": true}));
}

#[tokio::test]
async fn configured_tokens_and_limits_reach_streams() {
    let state = ConfigFile::write(GATEWAY_CONFIG).unwrap().state().unwrap();

    let vendor = VendorStream::new()
        .raw("garbage 1")
        .raw("garbage 2")
        .raw("garbage 3")
        .chunk(json!({"id": "c", "choices": [
            {"index": 0, "delta": {"content": "a"}, "finish_reason": "end_of_text"},
            {"index": 1, "delta": {"content": "b"}, "finish_reason": "blocked"}
        ]}))
        .done();

    let (outcome, events) = replay(&vendor, 7, state.assembler()).await;
    let response = outcome.completed().cloned().unwrap();

    assert_eq!(response.choices[0].finish_reason, FinishReason::Stop);
    assert_eq!(response.choices[1].finish_reason, FinishReason::ContentFilter);
    assert_eq!(response.diagnostics.len(), 2);
    assert_eq!(response.dropped_diagnostics, 1);

    let finished: Vec<FinishReason> = events
        .iter()
        .filter_map(|event| match event {
            StreamEvent::Finished(choice) => Some(choice.finish_reason),
            _ => None,
        })
        .collect();
    assert_eq!(finished, vec![FinishReason::Stop, FinishReason::ContentFilter]);
}

#[test]
fn logging_initializes_from_config() {
    let config = ConfigFile::write(GATEWAY_CONFIG).unwrap().load().unwrap();
    chatwire_telemetry::init(&config.logging).unwrap();

    // A second global subscriber is refused
    assert!(chatwire_telemetry::init(&config.logging).is_err());
}

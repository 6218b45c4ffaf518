//! End-to-end tool round trips through a queue-based mock provider.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use claudekit::api::{Client, CompletionProvider, ProviderFuture, RetryConfig};
use claudekit::config::ClientConfig;
use claudekit::conversation::Conversation;
use claudekit::tools::{LocalFn, Param, ToolArgs, ToolRunner, tool};
use claudekit::{
    ApiError, CompletionRequest, CompletionResponse, ContentBlock, Error, MessageContent, Role,
    ToolInvocation, Usage,
};
use serde_json::{Map, Value, json};

/// Pops queued outcomes front to back and records every request.
#[derive(Default, Clone)]
struct MockProvider {
    responses: Arc<Mutex<VecDeque<Result<CompletionResponse, ApiError>>>>,
    calls: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockProvider {
    fn queue_response(&self, response: CompletionResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    fn queue_error(&self, error: ApiError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    fn recorded_calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().unwrap().clone()
    }
}

impl CompletionProvider for MockProvider {
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> ProviderFuture<'a> {
        self.calls.lock().unwrap().push(request.clone());
        let next = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("MockProvider: no queued response");
        Box::pin(async move { next })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn text_response(text: &str) -> CompletionResponse {
    CompletionResponse {
        content: text.into(),
        model: "mock-model".into(),
        stop_reason: Some("end_turn".into()),
        usage: Usage {
            input_tokens: 10,
            output_tokens: 5,
        },
        ..Default::default()
    }
}

fn tool_response(calls: Vec<ToolInvocation>) -> CompletionResponse {
    CompletionResponse {
        content: "Let me check.".into(),
        model: "mock-model".into(),
        stop_reason: Some("tool_use".into()),
        tool_calls: calls,
        ..Default::default()
    }
}

fn runner() -> ToolRunner {
    let weather = LocalFn::new("get_weather", |args: ToolArgs| async move {
        let city: String = args.get("city")?;
        let units: String = args.get("units")?;
        Ok(json!({"city": city, "temperature": 22, "units": units}))
    })
    .param(Param::new("city").typed("str"))
    .param(Param::new("units").typed("str").default("celsius"))
    .doc("Get the current weather for a city.");

    let sum = LocalFn::new("calculate_sum", |args: ToolArgs| async move {
        let numbers: Vec<f64> = args.get("numbers")?;
        Ok(numbers.iter().sum::<f64>())
    })
    .param(Param::new("numbers").typed("list"));

    ToolRunner::new()
        .with(tool().declare(weather))
        .and_then(|r| r.with(tool().description("Add numbers").declare(sum)))
        .unwrap()
}

fn client(mock: &MockProvider) -> Client<MockProvider> {
    let config = ClientConfig::default().with_retry(
        RetryConfig::with_retries(2)
            .with_delays(Duration::from_millis(1), Duration::from_millis(5))
            .with_jitter(false),
    );
    Client::new(mock.clone(), config)
}

#[tokio::test]
async fn tool_round_trip() {
    let mock = MockProvider::default();
    mock.queue_response(tool_response(vec![
        ToolInvocation::new("toolu_1", "get_weather", object(json!({"city": "Tokyo"}))),
        ToolInvocation::new(
            "toolu_2",
            "calculate_sum",
            object(json!({"numbers": [1.5, 2.5]})),
        ),
    ]));
    mock.queue_response(text_response("It is 22 degrees in Tokyo; the sum is 4."));

    let client = client(&mock);
    let runner = runner();
    let mut conversation = Conversation::new().with_system("Use tools when helpful.");
    conversation.add_user("Weather in Tokyo, and 1.5 + 2.5?");

    let response = client
        .run_with_tools(&mut conversation, &runner, 5)
        .await
        .unwrap();
    assert_eq!(response.content, "It is 22 degrees in Tokyo; the sum is 4.");

    // user, assistant(tool_use), user(tool_result), assistant(text)
    assert_eq!(conversation.len(), 4);
    let results = &conversation.history()[2];
    assert_eq!(results.role, Role::User);
    let MessageContent::Blocks(blocks) = &results.content else {
        panic!("tool results should be blocks");
    };
    assert_eq!(blocks.len(), 2);
    match &blocks[0] {
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => {
            assert_eq!(tool_use_id, "toolu_1");
            assert!(!is_error);
            let parsed: Value = serde_json::from_str(content).unwrap();
            assert_eq!(parsed["units"], "celsius");
        }
        other => panic!("unexpected block {other:?}"),
    }
    assert!(matches!(
        &blocks[1],
        ContentBlock::ToolResult { content, .. } if content == "4.0"
    ));

    let calls = mock.recorded_calls();
    assert_eq!(calls.len(), 2);
    let tool_names: Vec<_> = calls[0].tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(tool_names, ["get_weather", "calculate_sum"]);
    assert_eq!(calls[0].system.as_deref(), Some("Use tools when helpful."));
    assert_eq!(calls[1].messages.len(), 3);
}

#[tokio::test]
async fn unknown_tool_is_reported_back_to_the_model() {
    let mock = MockProvider::default();
    mock.queue_response(tool_response(vec![ToolInvocation::new(
        "toolu_9",
        "launch_rocket",
        Map::new(),
    )]));
    mock.queue_response(text_response("I can't do that."));

    let mut conversation = Conversation::new();
    conversation.add_user("Launch it.");
    client(&mock)
        .run_with_tools(&mut conversation, &runner(), 5)
        .await
        .unwrap();

    let sent = &mock.recorded_calls()[1];
    let MessageContent::Blocks(blocks) = &sent.messages[2].content else {
        panic!("expected tool result blocks");
    };
    assert_eq!(
        blocks[0],
        ContentBlock::ToolResult {
            tool_use_id: "toolu_9".into(),
            content: "Unknown tool: launch_rocket".into(),
            is_error: true,
        }
    );
}

#[tokio::test]
async fn round_limit_stops_the_loop() {
    let mock = MockProvider::default();
    for i in 0..3 {
        mock.queue_response(tool_response(vec![ToolInvocation::new(
            format!("toolu_{i}"),
            "calculate_sum",
            object(json!({"numbers": [1]})),
        )]));
    }

    let mut conversation = Conversation::new();
    conversation.add_user("Keep adding.");
    let response = client(&mock)
        .run_with_tools(&mut conversation, &runner(), 2)
        .await
        .unwrap();

    assert!(response.has_tool_calls());
    assert_eq!(mock.recorded_calls().len(), 2);
    // user + 2 x (assistant, tool results)
    assert_eq!(conversation.len(), 5);
}

#[tokio::test]
async fn transient_errors_are_retried_inside_the_loop() {
    let mock = MockProvider::default();
    mock.queue_error(ApiError::from_status(529, "overloaded"));
    mock.queue_response(text_response("recovered"));

    let mut conversation = Conversation::new();
    conversation.add_user("Hello");
    let response = client(&mock)
        .run_with_tools(&mut conversation, &runner(), 3)
        .await
        .unwrap();
    assert_eq!(response.content, "recovered");
    assert_eq!(mock.recorded_calls().len(), 2);
}

#[tokio::test]
async fn fatal_error_aborts_without_touching_history() {
    let mock = MockProvider::default();
    mock.queue_error(ApiError::from_status(401, "invalid x-api-key"));

    let mut conversation = Conversation::new();
    conversation.add_user("Hello");
    let err = client(&mock)
        .run_with_tools(&mut conversation, &runner(), 3)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Api(ApiError::Client { status: 401, .. })));
    assert_eq!(mock.recorded_calls().len(), 1);
    assert_eq!(conversation.len(), 1);
}

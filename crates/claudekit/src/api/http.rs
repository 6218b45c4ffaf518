//! [`CompletionProvider`] over HTTP against the Messages endpoint.

use std::time::Instant;

use serde::Deserialize;
use tracing::{debug, trace};

use super::provider::{CompletionProvider, ProviderFuture};
use crate::config::ClientConfig;
use crate::error::{ApiError, Error, Result};
use crate::{API_VERSION, CompletionRequest, CompletionResponse, ToolInvocation, Usage};

// ── Raw response shapes ────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct RawMessageResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    content: Vec<RawBlock>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Map<String, serde_json::Value>,
    },
    // Thinking and other block kinds are not surfaced.
    #[serde(other)]
    Other,
}

/// Decode a successful Messages response body.
///
/// Text blocks are concatenated into `content`; `tool_use` blocks become
/// [`ToolInvocation`]s in response order.
pub fn parse_response(text: &str) -> Result<CompletionResponse, ApiError> {
    let raw: serde_json::Value =
        serde_json::from_str(text).map_err(|e| ApiError::Decode(e.to_string()))?;
    let parsed: RawMessageResponse =
        serde_json::from_value(raw.clone()).map_err(|e| ApiError::Decode(e.to_string()))?;

    let mut content = String::new();
    let mut tool_calls = Vec::new();
    for block in parsed.content {
        match block {
            RawBlock::Text { text } => content.push_str(&text),
            RawBlock::ToolUse { id, name, input } => {
                tool_calls.push(ToolInvocation { id, name, input });
            }
            RawBlock::Other => {}
        }
    }

    Ok(CompletionResponse {
        content,
        model: parsed.model,
        stop_reason: parsed.stop_reason,
        usage: parsed.usage,
        tool_calls,
        raw: Some(raw),
    })
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for the Messages API.
pub struct MessagesClient {
    client: reqwest::Client,
    api_key: String,
    url: String,
}

impl MessagesClient {
    /// Build a client from a config. Fails when no API key is configured.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let api_key = config.require_api_key()?.to_string();
        let client = reqwest::Client::builder()
            .user_agent(concat!("claudekit/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            url: config.messages_url(),
        })
    }

    /// Endpoint this client posts to.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send(&self, body: &CompletionRequest) -> Result<CompletionResponse, ApiError> {
        debug!(
            "LLM request: model={}, messages={}, tools={}, max_tokens={}",
            body.model,
            body.messages.len(),
            body.tools.len(),
            body.max_tokens,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let resp = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Connection(format!("request failed: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Connection(format!("failed to read response: {e}")))?;

        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(ApiError::from_status(status.as_u16(), &text));
        }

        let response = parse_response(&text)?;
        debug!(
            "Token usage: input={}, output={}; {} chars text, {} tool call(s)",
            response.usage.input_tokens,
            response.usage.output_tokens,
            response.content.len(),
            response.tool_calls.len(),
        );
        Ok(response)
    }
}

impl CompletionProvider for MessagesClient {
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> ProviderFuture<'a> {
        Box::pin(self.send(request))
    }

    fn name(&self) -> &str {
        "messages"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_text_response() {
        let body = json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "model": "claude-3-sonnet-20240229",
            "content": [{"type": "text", "text": "The capital of France is Paris."}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 14, "output_tokens": 10}
        });
        let response = parse_response(&body.to_string()).unwrap();
        assert_eq!(response.content, "The capital of France is Paris.");
        assert_eq!(response.stop_reason.as_deref(), Some("end_turn"));
        assert_eq!(response.usage.total_tokens(), 24);
        assert!(!response.has_tool_calls());
        assert!(response.raw.is_some());
    }

    #[test]
    fn parses_tool_use_blocks_in_order() {
        let body = json!({
            "model": "m",
            "content": [
                {"type": "text", "text": "Let me look that up."},
                {"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {"city": "Tokyo"}},
                {"type": "tool_use", "id": "toolu_2", "name": "calculate_sum", "input": {"numbers": [1, 2]}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 1, "output_tokens": 1}
        });
        let response = parse_response(&body.to_string()).unwrap();
        assert_eq!(response.content, "Let me look that up.");
        let names: Vec<_> = response.tool_calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["get_weather", "calculate_sum"]);
        assert_eq!(response.tool_calls[0].input["city"], "Tokyo");
    }

    #[test]
    fn unknown_block_types_are_skipped() {
        let body = json!({
            "model": "m",
            "content": [
                {"type": "thinking", "thinking": "hmm", "signature": "x"},
                {"type": "text", "text": "ok"}
            ]
        });
        let response = parse_response(&body.to_string()).unwrap();
        assert_eq!(response.content, "ok");
        assert_eq!(response.usage, Usage::default());
    }

    #[test]
    fn invalid_body_is_decode_error() {
        assert!(matches!(
            parse_response("<html>bad gateway</html>"),
            Err(ApiError::Decode(_))
        ));
    }

    #[test]
    fn new_requires_api_key() {
        assert!(matches!(
            MessagesClient::new(&ClientConfig::default()),
            Err(Error::Config(_))
        ));
        let client =
            MessagesClient::new(&ClientConfig::default().with_api_key("sk-test")).unwrap();
        assert_eq!(client.url(), "https://api.anthropic.com/v1/messages");
    }
}

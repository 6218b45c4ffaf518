//! Client toolkit for the Claude Messages API.
//!
//! `claudekit` wraps a remote chat-completion endpoint with three things an
//! application usually ends up writing by hand:
//!
//! - a **retrying request wrapper** ([`api::retry`]) that classifies failures
//!   and backs off exponentially with jitter on transient ones,
//! - **conversation state** ([`conversation::Conversation`]) with snapshots,
//!   rollback, forking and a sliding message window,
//! - **tools**: local functions declared with [`tools::tool()`] carry a name,
//!   description and input schema, and a [`ToolRunner`](tools::ToolRunner)
//!   dispatches the model's tool calls to them and turns every outcome
//!   (success, unknown tool, failure, panic) into a [`ToolResult`].
//!
//! # Getting started
//!
//! ```ignore
//! use claudekit::prelude::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), claudekit::Error> {
//!     let client = Client::from_env()?;
//!
//!     let weather = LocalFn::new("get_weather", |args: ToolArgs| async move {
//!         let city: String = args.get("city")?;
//!         let units: String = args.get("units")?;
//!         Ok(json!({ "city": city, "temperature": 22, "units": units }))
//!     })
//!     .param(Param::new("city").typed("str"))
//!     .param(Param::new("units").typed("str").default("celsius"));
//!
//!     let mut runner = ToolRunner::new();
//!     runner.register(tool().description("Get the current weather").declare(weather))?;
//!
//!     let mut conversation = Conversation::new().with_system("Use tools when needed.");
//!     conversation.add_user("What is the weather in Tokyo?");
//!
//!     let response = client.run_with_tools(&mut conversation, &runner, 5).await?;
//!     println!("{}", response.content);
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | Retry with backoff, the [`CompletionProvider`](api::CompletionProvider) trait, the HTTP provider, and the retrying [`Client`](api::Client) |
//! | [`tools`] | Schema builder, tool declaration, [`ToolRunner`](tools::ToolRunner) registry and dispatcher |
//! | [`conversation`] | Multi-turn message history with snapshot/rollback |
//! | [`config`] | [`ClientConfig`](config::ClientConfig) defaults, environment and file loading |
//! | [`error`] | Error types |

pub mod api;
pub mod config;
pub mod conversation;
pub mod error;
pub mod prelude;
pub mod tools;

use serde::{Deserialize, Serialize};

pub use error::{ApiError, Error, Result};

// Re-export schemars for downstream crates deriving typed tool arguments.
pub use schemars;

// ── Constants ──────────────────────────────────────────────────────

/// Default API origin. The Messages endpoint lives at `{base}/v1/messages`.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// `anthropic-version` header sent with every request.
pub const API_VERSION: &str = "2023-06-01";

/// Default model for completions.
pub const DEFAULT_MODEL: &str = "claude-3-sonnet-20240229";

/// Default `max_tokens` for completions.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A structured content block inside a message.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Map<String, serde_json::Value>,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

/// Message content: plain text or a list of blocks.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }

    /// An assistant turn made of explicit blocks (text and `tool_use`).
    pub fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Blocks(blocks),
        }
    }

    /// Tool results are sent back to the model as a user turn.
    pub fn tool_results(results: &[ToolResult]) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Blocks(results.iter().map(ToolResult::to_block).collect()),
        }
    }

    /// Concatenated text of the message, ignoring non-text blocks.
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(t) => t.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }
}

// ── Tool types ─────────────────────────────────────────────────────

/// A tool the model may call, as sent in the request's `tools` array.
///
/// Built once when a function is declared as a tool and never mutated.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// A request from the model to run a tool.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub input: serde_json::Map<String, serde_json::Value>,
}

impl ToolInvocation {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        input: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
        }
    }
}

/// Outcome of one tool invocation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ToolResult {
    pub tool_use_id: String,
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error: true,
        }
    }

    /// The `tool_result` content block for this result.
    pub fn to_block(&self) -> ContentBlock {
        ContentBlock::ToolResult {
            tool_use_id: self.tool_use_id.clone(),
            content: self.content.clone(),
            is_error: self.is_error,
        }
    }
}

// ── Request types ──────────────────────────────────────────────────

/// Completion request body. Unset optional fields are omitted.
#[derive(Serialize, Debug, Clone, Default)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "is_blank")]
    pub system: Option<String>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

fn is_blank(v: &Option<String>) -> bool {
    v.as_deref().is_none_or(str::is_empty)
}

impl CompletionRequest {
    /// A request with the given messages. Empty `model` and zero
    /// `max_tokens` are filled in from the client config.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Sequences that end generation when produced.
    pub fn with_stop_sequences<I, S>(mut self, sequences: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop_sequences = sequences.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

// ── Response types ─────────────────────────────────────────────────

/// Token usage statistics.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

impl Usage {
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// Normalized completion returned by a provider.
#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    /// All text blocks, concatenated.
    pub content: String,
    pub model: String,
    pub stop_reason: Option<String>,
    pub usage: Usage,
    /// Tool calls requested by the model, in response order.
    pub tool_calls: Vec<ToolInvocation>,
    /// The undecoded response body, when the provider keeps it.
    pub raw: Option<serde_json::Value>,
}

impl CompletionResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// The assistant turn to append to the history: the text (if any)
    /// followed by one `tool_use` block per tool call.
    pub fn to_message(&self) -> Message {
        if self.tool_calls.is_empty() {
            return Message::assistant(self.content.clone());
        }
        let mut blocks = Vec::with_capacity(self.tool_calls.len() + 1);
        if !self.content.is_empty() {
            blocks.push(ContentBlock::Text {
                text: self.content.clone(),
            });
        }
        blocks.extend(self.tool_calls.iter().map(|call| ContentBlock::ToolUse {
            id: call.id.clone(),
            name: call.name.clone(),
            input: call.input.clone(),
        }));
        Message::assistant_blocks(blocks)
    }
}

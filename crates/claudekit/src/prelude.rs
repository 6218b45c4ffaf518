//! Convenience re-exports for common `claudekit` types.
//!
//! Meant to be glob-imported:
//!
//! ```ignore
//! use claudekit::prelude::*;
//! ```
//!
//! Covers the client, conversation, message types and tool declaration.
//! Lower-level pieces (the retry executor, `MessagesClient`, schema types)
//! are imported from their modules directly.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{
    CompletionRequest, CompletionResponse, ContentBlock, Message, Role, ToolDefinition,
    ToolInvocation, ToolResult, Usage,
};

// ── Client ──────────────────────────────────────────────────────────
pub use crate::api::{Client, CompletionProvider, RetryConfig};
pub use crate::config::ClientConfig;
pub use crate::conversation::Conversation;
pub use crate::error::{ApiError, Error};

// ── Tools ───────────────────────────────────────────────────────────
pub use crate::tools::{
    FnTool, Invocable, LocalFn, Param, ParamType, ToolArgs, ToolError, ToolRunner,
    json_schema_for, tool,
};

//! Multi-turn conversation history with snapshot and rollback.
//!
//! ```ignore
//! let mut conv = Conversation::new().with_system("You are terse.");
//! conv.add_user("My name is Alice.");
//! conv.save();
//! conv.add_user("Forget that.");
//! conv.rollback(); // back to one message
//! ```

use chrono::{DateTime, Local};
use tracing::debug;

use crate::{CompletionResponse, Message, Role, ToolResult};

/// A saved copy of the message list.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub messages: Vec<Message>,
    pub taken_at: DateTime<Local>,
}

/// Message counts returned by [`Conversation::summary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConversationSummary {
    pub total_messages: usize,
    pub snapshots: usize,
    pub user_messages: usize,
    pub assistant_messages: usize,
}

/// Ordered message history plus a stack of snapshots.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    system: Option<String>,
    max_messages: Option<usize>,
    messages: Vec<Message>,
    snapshots: Vec<Snapshot>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Only the last `max` messages are returned by [`messages`](Self::messages).
    /// The full history is still kept.
    pub fn with_max_messages(mut self, max: usize) -> Self {
        self.max_messages = Some(max);
        self
    }

    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }

    pub fn add_user(&mut self, text: impl Into<String>) -> &mut Self {
        self.messages.push(Message::user(text));
        self
    }

    pub fn add_assistant(&mut self, text: impl Into<String>) -> &mut Self {
        self.messages.push(Message::assistant(text));
        self
    }

    /// Append the assistant turn of a response, tool calls included.
    pub fn add_response(&mut self, response: &CompletionResponse) -> &mut Self {
        self.messages.push(response.to_message());
        self
    }

    /// Append a user turn carrying tool results.
    pub fn add_tool_results(&mut self, results: &[ToolResult]) -> &mut Self {
        if !results.is_empty() {
            self.messages.push(Message::tool_results(results));
        }
        self
    }

    /// The message window sent with the next request.
    pub fn messages(&self) -> &[Message] {
        match self.max_messages {
            Some(max) if self.messages.len() > max => {
                &self.messages[self.messages.len() - max..]
            }
            _ => &self.messages,
        }
    }

    /// Every message, ignoring the window.
    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Push a copy of the current messages onto the snapshot stack.
    pub fn save(&mut self) -> &mut Self {
        self.snapshots.push(Snapshot {
            messages: self.messages.clone(),
            taken_at: Local::now(),
        });
        debug!(
            "Saved conversation snapshot #{} ({} messages)",
            self.snapshots.len(),
            self.messages.len()
        );
        self
    }

    /// Restore the latest snapshot and drop it. Returns `false` when there
    /// is nothing to roll back to.
    pub fn rollback(&mut self) -> bool {
        match self.snapshots.pop() {
            Some(snapshot) => {
                debug!(
                    "Rolled back to snapshot from {} ({} messages)",
                    snapshot.taken_at.format("%H:%M:%S"),
                    snapshot.messages.len()
                );
                self.messages = snapshot.messages;
                true
            }
            None => false,
        }
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    /// Remove and return the last `min(n, len)` messages, oldest first.
    pub fn pop(&mut self, n: usize) -> Vec<Message> {
        let keep = self.messages.len().saturating_sub(n);
        self.messages.split_off(keep)
    }

    /// Drop all messages and snapshots. The system prompt and window stay.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.snapshots.clear();
    }

    /// An independent copy with the same system prompt, window and
    /// messages, but no snapshots.
    pub fn fork(&self) -> Self {
        Self {
            system: self.system.clone(),
            max_messages: self.max_messages,
            messages: self.messages.clone(),
            snapshots: Vec::new(),
        }
    }

    pub fn summary(&self) -> ConversationSummary {
        let user_messages = self
            .messages
            .iter()
            .filter(|m| m.role == Role::User)
            .count();
        ConversationSummary {
            total_messages: self.messages.len(),
            snapshots: self.snapshots.len(),
            user_messages,
            assistant_messages: self.messages.len() - user_messages,
        }
    }
}

//! Conversation history for the agent loop.
//!
//! The history is owned exclusively by the loop for the duration of one
//! session, is only ever appended to, and is discarded when the session
//! ends; nothing is persisted.

use serde_json::Value;

/// One tool invocation requested by the model.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Correlation id echoed back in the matching tool result.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// Tool arguments as a JSON object.
    pub arguments: Value,
}

/// A single message in the conversation history.
#[derive(Debug, Clone)]
pub enum Message {
    /// Text entered by the user.
    User { content: String },
    /// A model reply: final text, tool calls, or both.
    Assistant {
        content: Option<String>,
        tool_calls: Vec<ToolCall>,
    },
    /// The result of one tool call, correlated by id.
    ToolResult { call_id: String, content: String },
}

/// Append-only message history for one session.
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::User {
            content: content.into(),
        });
    }

    pub fn push_assistant(&mut self, content: Option<String>, tool_calls: Vec<ToolCall>) {
        self.messages.push(Message::Assistant {
            content,
            tool_calls,
        });
    }

    pub fn push_tool_result(&mut self, call_id: impl Into<String>, content: impl Into<String>) {
        self.messages.push(Message::ToolResult {
            call_id: call_id.into(),
            content: content.into(),
        });
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Whether every tool call has been answered by exactly one result with
    /// the matching id, in call order, before any later user or assistant
    /// message.
    pub fn is_balanced(&self) -> bool {
        let mut pending: Vec<&str> = Vec::new();
        for message in &self.messages {
            match message {
                Message::User { .. } => {
                    if !pending.is_empty() {
                        return false;
                    }
                }
                Message::Assistant { tool_calls, .. } => {
                    if !pending.is_empty() {
                        return false;
                    }
                    pending = tool_calls.iter().map(|c| c.id.as_str()).collect();
                }
                Message::ToolResult { call_id, .. } => {
                    if pending.first() != Some(&call_id.as_str()) {
                        return false;
                    }
                    pending.remove(0);
                }
            }
        }
        pending.is_empty()
    }
}

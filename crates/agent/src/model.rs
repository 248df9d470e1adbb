//! Model boundary: an OpenAI-compatible chat completions API with
//! function calling.

use crate::config::AgentConfig;
use crate::conversation::{Conversation, Message, ToolCall};
use crate::error::Error;
use serde::Deserialize;
use serde_json::{Value, json};
use std::future::Future;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// A tool advertised to the model.
#[derive(Debug, Clone)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    /// JSON schema for the tool's arguments.
    pub parameters: Value,
}

impl ToolDef {
    /// Convert an MCP tool description into a model-facing definition.
    pub fn from_mcp(tool: &rmcp::model::Tool) -> Self {
        Self {
            name: tool.name.to_string(),
            description: tool
                .description
                .as_deref()
                .unwrap_or_default()
                .to_string(),
            parameters: Value::Object((*tool.input_schema).clone()),
        }
    }

    fn to_openai(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// One model reply, split into final text and tool requests.
///
/// An empty `tool_calls` means the reply is a final answer.
#[derive(Debug, Clone, Default)]
pub struct ModelReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

/// Chat completion boundary used by the agent loop.
pub trait ModelClient {
    /// Send the conversation and tool catalogue, returning the model's
    /// next reply.
    fn complete(
        &self,
        conversation: &Conversation,
        tools: &[ToolDef],
    ) -> impl Future<Output = Result<ModelReply, Error>> + Send;
}

/// Client for an OpenAI-compatible chat completions endpoint.
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiClient {
    pub fn new(config: &AgentConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    fn request_body(&self, conversation: &Conversation, tools: &[ToolDef]) -> Value {
        let mut body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": wire_messages(conversation),
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.iter().map(ToolDef::to_openai).collect());
            body["tool_choice"] = json!("auto");
        }
        body
    }
}

impl ModelClient for OpenAiClient {
    async fn complete(
        &self,
        conversation: &Conversation,
        tools: &[ToolDef],
    ) -> Result<ModelReply, Error> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.request_body(conversation, tools);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Model(format!("{status}: {detail}")));
        }

        let parsed: ChatResponse = response.json().await?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Model("response contained no choices".into()))?;

        let mut tool_calls = Vec::new();
        for wire in choice.message.tool_calls.unwrap_or_default() {
            let arguments = serde_json::from_str(&wire.function.arguments).map_err(|e| {
                Error::Model(format!(
                    "malformed arguments for tool {}: {e}",
                    wire.function.name
                ))
            })?;
            tool_calls.push(ToolCall {
                id: wire.id,
                name: wire.function.name,
                arguments,
            });
        }

        Ok(ModelReply {
            content: choice.message.content,
            tool_calls,
        })
    }
}

/// Convert the conversation to chat completions wire messages.
///
/// Each tool result becomes its own `role: "tool"` message, and assistant
/// tool calls carry their arguments re-encoded as a JSON string.
fn wire_messages(conversation: &Conversation) -> Vec<Value> {
    conversation
        .messages()
        .iter()
        .map(|message| match message {
            Message::User { content } => json!({"role": "user", "content": content}),
            Message::Assistant {
                content,
                tool_calls,
            } if tool_calls.is_empty() => {
                json!({"role": "assistant", "content": content})
            }
            Message::Assistant {
                content,
                tool_calls,
            } => {
                let calls: Vec<Value> = tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": call.arguments.to_string(),
                            }
                        })
                    })
                    .collect();
                let mut wire = json!({"role": "assistant", "tool_calls": calls});
                if let Some(text) = content {
                    if !text.is_empty() {
                        wire["content"] = json!(text);
                    }
                }
                wire
            }
            Message::ToolResult { call_id, content } => {
                json!({"role": "tool", "tool_call_id": call_id, "content": content})
            }
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

//! The agent loop: a finite-state machine bridging the model and the tool
//! server.
//!
//! One turn runs from a user input to the model's final answer, possibly
//! spanning several tool-call/tool-result cycles. Tool calls within a turn
//! execute sequentially in the order the model issued them, so the history
//! is deterministic and no two operations ever race over session state.

use crate::client::ToolBackend;
use crate::conversation::Conversation;
use crate::error::Error;
use crate::model::{ModelClient, ToolDef};
use rmcp::model::CallToolResult;
use serde_json::Value;

/// Phase of the agent loop within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the next user input.
    AwaitingUserInput,
    /// A completion request is in flight.
    ModelThinking,
    /// Tool calls from the last reply are being executed.
    ExecutingTools,
}

/// Drives the conversation between a model and a tool server.
pub struct AgentLoop<M, T> {
    model: M,
    tools: T,
    catalogue: Vec<ToolDef>,
    conversation: Conversation,
    max_tool_exchanges: usize,
    phase: Phase,
}

impl<M: ModelClient, T: ToolBackend> AgentLoop<M, T> {
    /// Connect the loop to its collaborators and fetch the tool catalogue.
    pub async fn new(model: M, tools: T, max_tool_exchanges: usize) -> Result<Self, Error> {
        let catalogue = tools
            .list_tools()
            .await?
            .iter()
            .map(ToolDef::from_mcp)
            .collect();
        Ok(Self {
            model,
            tools,
            catalogue,
            conversation: Conversation::new(),
            max_tool_exchanges,
            phase: Phase::AwaitingUserInput,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Names of the tools advertised by the connected server.
    pub fn tool_names(&self) -> impl Iterator<Item = &str> {
        self.catalogue.iter().map(|t| t.name.as_str())
    }

    /// Release the underlying tool backend, ending the session.
    pub fn into_tools(self) -> T {
        self.tools
    }

    /// Run one user turn to completion.
    ///
    /// Every tool call receives exactly one result message — including on
    /// transport failure, whose error text becomes the result so the
    /// remaining calls in the turn still run. A failed completion request
    /// aborts the turn. Either way the loop returns to awaiting input.
    pub async fn run_turn(&mut self, input: &str) -> Result<String, Error> {
        self.conversation.push_user(input);
        let mut exchanges = 0;
        let outcome = loop {
            self.phase = Phase::ModelThinking;
            let reply = match self.model.complete(&self.conversation, &self.catalogue).await {
                Ok(reply) => reply,
                Err(err) => break Err(err),
            };

            if reply.tool_calls.is_empty() {
                let answer = reply.content.unwrap_or_default();
                self.conversation.push_assistant(Some(answer.clone()), Vec::new());
                break Ok(answer);
            }

            self.phase = Phase::ExecutingTools;
            self.conversation
                .push_assistant(reply.content, reply.tool_calls.clone());
            for call in &reply.tool_calls {
                tracing::info!(tool = %call.name, args = %call.arguments, "calling tool");
                let content = match self.tools.call_tool(call).await {
                    Ok(result) => render_result(&result),
                    Err(err) => format!("tool call failed: {err}"),
                };
                self.conversation.push_tool_result(&call.id, content);
            }

            exchanges += 1;
            if exchanges >= self.max_tool_exchanges {
                break Err(Error::TurnLimit(exchanges));
            }
        };
        self.phase = Phase::AwaitingUserInput;
        outcome
    }
}

/// Flatten the text blocks of a tool result into one string for the model.
///
/// Walks the serialized form of the result, which keeps this independent of
/// the protocol library's content-block variants.
fn render_result(result: &CallToolResult) -> String {
    let Ok(value) = serde_json::to_value(result) else {
        return "(unreadable tool result)".into();
    };
    let text = value
        .get("content")
        .and_then(Value::as_array)
        .map(|blocks| {
            blocks
                .iter()
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();
    if !text.is_empty() {
        return text;
    }
    let is_error = value
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if is_error {
        "(tool reported an error)".into()
    } else {
        "(no output)".into()
    }
}

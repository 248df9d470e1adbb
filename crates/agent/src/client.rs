//! MCP server connection handling for stdio and remote transports.

use crate::conversation::ToolCall;
use crate::error::Error;
use rmcp::{
    RoleClient, ServiceExt,
    model::{CallToolRequestParams, CallToolResult, Tool},
    service::RunningService,
    transport::{TokioChildProcess, streamable_http_client::StreamableHttpClientTransportConfig},
};
use std::borrow::Cow;
use std::future::Future;
use tokio::process::Command;

/// Parsed target for connecting to an MCP server.
pub enum Target {
    /// Remote server at the given URL.
    Remote { url: String, auth: Option<String> },
    /// Stdio server launched by a command.
    Stdio { program: String, args: Vec<String> },
}

impl Target {
    /// Parse CLI target arguments into a [`Target`].
    ///
    /// If the first element starts with `http://` or `https://`, treat it as
    /// a remote URL. Otherwise treat the entire vec as a stdio command.
    pub fn parse(target: Vec<String>, auth: Option<String>) -> Self {
        let first = &target[0];
        if first.starts_with("http://") || first.starts_with("https://") {
            Target::Remote {
                url: first.clone(),
                auth,
            }
        } else {
            Target::Stdio {
                program: first.clone(),
                args: target[1..].to_vec(),
            }
        }
    }
}

/// Connect to an MCP server and return a running client service.
pub async fn connect(target: Target) -> Result<RunningService<RoleClient, ()>, Error> {
    match target {
        Target::Remote { url, auth } => {
            let config = StreamableHttpClientTransportConfig {
                uri: url.into(),
                ..Default::default()
            };
            let config = if let Some(token) = auth {
                config.auth_header(token)
            } else {
                config
            };
            let transport = rmcp::transport::StreamableHttpClientTransport::from_config(config);
            let service = ().serve(transport).await?;
            Ok(service)
        }
        Target::Stdio { program, args } => {
            let mut cmd = Command::new(&program);
            cmd.args(&args);
            let transport = TokioChildProcess::new(cmd)?;
            let service = ().serve(transport).await?;
            Ok(service)
        }
    }
}

/// Tool-serving boundary used by the agent loop.
pub trait ToolBackend {
    /// List the tools advertised by the server.
    fn list_tools(&self) -> impl Future<Output = Result<Vec<Tool>, Error>> + Send;

    /// Invoke one tool call and return its result.
    fn call_tool(&self, call: &ToolCall)
    -> impl Future<Output = Result<CallToolResult, Error>> + Send;
}

impl ToolBackend for RunningService<RoleClient, ()> {
    async fn list_tools(&self) -> Result<Vec<Tool>, Error> {
        Ok(self.peer().list_all_tools().await?)
    }

    async fn call_tool(&self, call: &ToolCall) -> Result<CallToolResult, Error> {
        let arguments = call.arguments.as_object().cloned();
        let result = self
            .peer()
            .call_tool(CallToolRequestParams {
                meta: None,
                name: Cow::Owned(call.name.clone()),
                arguments,
                task: None,
            })
            .await?;
        Ok(result)
    }
}

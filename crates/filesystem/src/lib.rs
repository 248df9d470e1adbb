//! MCP server providing sandboxed filesystem tools.
//!
//! All operations are confined to a set of root directories configured at
//! server startup; every caller-supplied path is resolved and checked by
//! [`guard::PathGuard`] before any storage access. Implements 11 tools
//! following the MCP filesystem server reference specification.

use crate::guard::PathGuard;
use rmcp::{
    ServerHandler,
    handler::server::router::tool::ToolRouter,
    model::{Implementation, ServerCapabilities, ServerInfo},
    tool_handler,
};
pub mod error;
pub mod guard;
pub mod tools;

/// MCP filesystem server with directory-level access control.
#[derive(Debug, Clone)]
pub struct FilesystemServer {
    pub(crate) guard: PathGuard,
    pub(crate) tool_router: ToolRouter<Self>,
}

#[tool_handler]
impl ServerHandler for FilesystemServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "bmcp-filesystem".into(),
                title: Some("Burrow MCP Filesystem Server".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "Filesystem server providing sandboxed file and directory operations.".into(),
            ),
        }
    }
}

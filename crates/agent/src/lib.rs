//! LLM chat agent for Burrow MCP servers.
//!
//! Connects to an MCP tool server (a stdio child process or a remote URL),
//! advertises the server's tools to an OpenAI-compatible chat model, and
//! drives the tool-call loop until the model produces a final answer.

pub mod agent;
pub mod client;
pub mod cmd;
pub mod config;
pub mod conversation;
pub mod error;
pub mod model;

//! Agent configuration.
//!
//! All model and loop settings are assembled once at process start by the
//! CLI and passed by reference into the constructors; core modules never
//! consult the environment themselves.

/// Settings for one agent session.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Base URL of the OpenAI-compatible API.
    pub base_url: String,
    /// API key sent as a bearer token.
    pub api_key: String,
    /// Model identifier requested for every completion.
    pub model: String,
    /// Upper bound on completion tokens per request.
    pub max_tokens: u32,
    /// Maximum model/tool exchanges within a single user turn before the
    /// turn is terminated instead of looping forever.
    pub max_tool_exchanges: usize,
}

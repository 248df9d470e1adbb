//! Command-line interface for the agent.

use crate::agent::AgentLoop;
use crate::client::{Target, connect};
use crate::config::AgentConfig;
use crate::error::Error;
use crate::model::OpenAiClient;
use clap::Parser;
use std::io::{BufRead, Write};

/// Chat with an OpenAI-compatible model that can call tools on an MCP server.
#[derive(Parser, Debug)]
#[command(name = "bmcp-agent", version, about)]
pub struct App {
    /// Target MCP server: a URL (http/https) for remote servers,
    /// or a command for stdio servers.
    ///
    /// Use `--` before commands with flags:
    ///   bmcp-agent -- bmcp-filesystem /path/to/sandbox
    #[arg(required = true, num_args = 1..)]
    pub target: Vec<String>,

    /// Bearer token for authenticating with remote servers.
    #[arg(long = "auth", value_name = "TOKEN")]
    pub auth: Option<String>,

    /// Model identifier to request. Falls back to the MODEL environment
    /// variable.
    #[arg(long)]
    pub model: Option<String>,

    /// Base URL of the OpenAI-compatible API.
    #[arg(long, default_value = "https://api.openai.com")]
    pub base_url: String,

    /// Upper bound on completion tokens per request.
    #[arg(long, default_value_t = 4096)]
    pub max_tokens: u32,

    /// Maximum tool exchanges within one user turn.
    #[arg(long, default_value_t = 16)]
    pub max_turns: usize,
}

impl App {
    /// Parse CLI arguments and run the chat session.
    pub async fn run() -> Result<(), Error> {
        let app = App::parse();

        let api_key =
            std::env::var("OPENAI_API_KEY").map_err(|_| Error::MissingApiKey("OPENAI_API_KEY"))?;
        let model = app
            .model
            .or_else(|| std::env::var("MODEL").ok())
            .unwrap_or_else(|| "gpt-4o-mini".into());
        let config = AgentConfig {
            base_url: app.base_url,
            api_key,
            model,
            max_tokens: app.max_tokens,
            max_tool_exchanges: app.max_turns,
        };

        let target = Target::parse(app.target, app.auth);
        let service = connect(target).await?;
        let client = OpenAiClient::new(&config)?;
        let mut agent = AgentLoop::new(client, service, config.max_tool_exchanges).await?;

        println!(
            "Connected. Tools available: {}",
            agent.tool_names().collect::<Vec<_>>().join(", ")
        );
        println!("Type your queries or 'quit' to exit.");

        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            print!("\n> ");
            std::io::stdout().flush()?;
            line.clear();
            if stdin.lock().read_line(&mut line)? == 0 {
                break;
            }
            let input = line.trim();
            if input.is_empty() {
                continue;
            }
            if input.eq_ignore_ascii_case("quit") {
                break;
            }
            match agent.run_turn(input).await {
                Ok(answer) => println!("\n{answer}"),
                Err(err) => eprintln!("error: {err}"),
            }
        }

        agent.into_tools().cancel().await.ok();
        Ok(())
    }
}

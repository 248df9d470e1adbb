use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("MCP client initialization error: {0}")]
    ClientInit(#[from] rmcp::service::ClientInitializeError),

    #[error("tool transport error: {0}")]
    Transport(#[from] rmcp::ServiceError),

    #[error("model error: {0}")]
    Model(String),

    #[error("model transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no final answer after {0} tool exchanges")]
    TurnLimit(usize),

    #[error("missing API key: set {0}")]
    MissingApiKey(&'static str),
}

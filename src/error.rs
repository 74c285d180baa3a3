// src/error.rs
use std::path::PathBuf;

/// Fatal failure of a fetch/filter cycle. Per-source problems never end up here.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("writing snapshot {path}: {source}")]
    Snapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serializing snapshot {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure of one conversational run.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("agent API key is not configured")]
    MissingApiKey,
    #[error("agent transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("agent API error ({status}): {body}")]
    Status { status: u16, body: String },
    #[error("malformed agent response: {0}")]
    Malformed(String),
    #[error("agent exceeded {0} tool rounds without answering")]
    ToolRounds(usize),
}

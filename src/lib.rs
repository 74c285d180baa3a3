// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod agent;
pub mod api;
pub mod classify;
pub mod config;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod snapshot;

pub use crate::api::router;
pub use crate::config::AppConfig;
pub use crate::error::{AgentError, CycleError};
pub use crate::pipeline::{MatchResult, Pipeline};

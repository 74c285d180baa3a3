//! Web-chat deployment: boots the Axum server with the fetch pipeline, the
//! hosted agent and the static chat UI.
//!
//! The command-line shape lives in `src/bin/chat_cli.rs`.

use std::sync::Arc;

use channel_intel::agent::HostedAgent;
use channel_intel::api::{self, AppState};
use channel_intel::metrics::Metrics;
use channel_intel::{logging, AppConfig, Pipeline};
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    logging::init_tracing();

    let cfg = AppConfig::load_default()?;
    tracing::info!(
        sources = cfg.channels().len(),
        match_mode = %cfg.filter.match_mode,
        concurrency = %cfg.fetch.concurrency,
        "configuration loaded"
    );

    let pipeline = Arc::new(Pipeline::from_config(&cfg)?);
    let agent = Arc::new(HostedAgent::from_config(&cfg, Arc::clone(&pipeline))?);
    let metrics = Metrics::init(cfg.channels().len())?;

    let state =
        AppState::new(pipeline, agent).with_max_conversations(cfg.agent.max_conversations);
    let router = metrics.router().merge(api::router(state));

    Ok(router.into())
}

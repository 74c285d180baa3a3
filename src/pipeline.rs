// src/pipeline.rs
//! The single fetch/filter entrypoint shared by every front-end.

use std::sync::Arc;

use metrics::{counter, gauge, histogram};
use serde::{Deserialize, Serialize};

use crate::classify::Classifier;
use crate::config::AppConfig;
use crate::error::CycleError;
use crate::ingest::providers::telegram_web::TelegramWebFactory;
use crate::ingest::types::{NormalizedMessage, SessionFactory};
use crate::ingest::{self, Concurrency};
use crate::snapshot::SnapshotWriter;

/// What one invocation hands back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchResult {
    pub keywords_used: Vec<String>,
    pub matched_messages: Vec<NormalizedMessage>,
}

/// Counts of the last cycle, mostly for logs and the HTTP surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleStats {
    pub total: usize,
    pub errors: usize,
    pub matched: usize,
}

pub struct Pipeline {
    sources: Vec<String>,
    default_limit: usize,
    concurrency: Concurrency,
    classifier: Classifier,
    snapshots: SnapshotWriter,
    factory: Arc<dyn SessionFactory>,
}

impl Pipeline {
    pub fn new(
        sources: Vec<String>,
        factory: Arc<dyn SessionFactory>,
        classifier: Classifier,
        snapshots: SnapshotWriter,
    ) -> Self {
        Self {
            sources,
            default_limit: crate::config::app::DEFAULT_MESSAGE_LIMIT,
            concurrency: Concurrency::Sequential,
            classifier,
            snapshots,
            factory,
        }
    }

    pub fn with_concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit.max(1);
        self
    }

    /// Wire the production preview session from configuration.
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let factory = TelegramWebFactory::new(
            &cfg.fetch.base_url,
            cfg.fetch_timeout(),
            &cfg.fetch.user_agent,
        );
        Self::from_config_with_factory(cfg, Arc::new(factory))
    }

    pub fn from_config_with_factory(
        cfg: &AppConfig,
        factory: Arc<dyn SessionFactory>,
    ) -> anyhow::Result<Self> {
        let snapshots = SnapshotWriter::new(
            &cfg.snapshot.dir,
            &cfg.snapshot.all_file,
            &cfg.snapshot.filtered_file,
        );
        Ok(Self::new(
            cfg.channels().to_vec(),
            factory,
            Classifier::new(cfg.match_mode()?),
            snapshots,
        )
        .with_concurrency(cfg.concurrency()?)
        .with_default_limit(cfg.fetch.message_limit))
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    pub fn snapshots(&self) -> &SnapshotWriter {
        &self.snapshots
    }

    /// One complete cycle: fetch every source, classify, write both snapshots.
    ///
    /// Source failures are folded into the full snapshot; only snapshot I/O
    /// fails the call. `limit` of `None` uses the configured default.
    pub async fn fetch_and_filter(
        &self,
        keywords: &[String],
        limit: Option<usize>,
    ) -> Result<MatchResult, CycleError> {
        self.run_cycle(keywords, limit).await.map(|(res, _)| res)
    }

    pub async fn run_cycle(
        &self,
        keywords: &[String],
        limit: Option<usize>,
    ) -> Result<(MatchResult, CycleStats), CycleError> {
        let t0 = std::time::Instant::now();
        let limit = limit.filter(|l| *l > 0).unwrap_or(self.default_limit);
        tracing::info!(keywords = ?keywords, limit, "filtering with keywords");

        let fetched =
            ingest::run_once(self.factory.as_ref(), &self.sources, limit, self.concurrency).await;
        let messages = fetched.messages();
        let matched = self.classifier.classify(&self.sources, &messages, keywords);

        self.snapshots.write(&fetched.entries, &matched)?;

        let stats = CycleStats {
            total: fetched.entries.len(),
            errors: fetched.error_count(),
            matched: matched.len(),
        };
        counter!("fetch_matched_total").increment(matched.len() as u64);
        histogram!("fetch_cycle_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        gauge!("fetch_last_cycle_ts").set(chrono::Utc::now().timestamp().max(0) as f64);
        tracing::info!(
            matched = stats.matched,
            total = stats.total,
            errors = stats.errors,
            "filtered {} messages out of {} total",
            stats.matched,
            stats.total
        );

        Ok((
            MatchResult {
                keywords_used: keywords.to_vec(),
                matched_messages: matched,
            },
            stats,
        ))
    }
}

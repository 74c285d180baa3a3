// src/ingest/mod.rs
pub mod providers;
pub mod types;

use std::sync::Arc;

use crate::ingest::types::{
    ChannelSession, FetchError, NormalizedMessage, SessionFactory, SnapshotEntry, SourceOutcome,
};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use tokio::task::JoinSet;

/// How sources are walked within one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Concurrency {
    #[default]
    Sequential,
    /// One task per source; results are reassembled in registry order.
    Parallel,
}

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "fetch_messages_total",
            "Non-empty messages fetched from all sources."
        );
        describe_counter!(
            "fetch_source_errors_total",
            "Sources that failed to resolve or return history."
        );
        describe_counter!(
            "fetch_matched_total",
            "Messages kept by the keyword classifier."
        );
        describe_histogram!("fetch_cycle_ms", "Fetch/filter cycle time in milliseconds.");
        describe_histogram!("fetch_preview_ms", "Preview page load + parse time in milliseconds.");
        describe_gauge!("fetch_last_cycle_ts", "Unix ts when the last cycle finished.");
    });
}

/// Result of the fetch half of a cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Full snapshot rows, in registry order.
    pub entries: Vec<SnapshotEntry>,
}

impl FetchOutcome {
    pub fn messages(&self) -> Vec<NormalizedMessage> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                SnapshotEntry::Message(m) => Some(m.clone()),
                SnapshotEntry::Error(_) => None,
            })
            .collect()
    }

    pub fn error_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_error()).count()
    }

    fn push(&mut self, outcome: SourceOutcome) {
        match outcome {
            SourceOutcome::Messages(msgs) => self
                .entries
                .extend(msgs.into_iter().map(SnapshotEntry::Message)),
            SourceOutcome::Failed(err) => self.entries.push(SnapshotEntry::Error(err)),
        }
    }
}

/// Fetch one source. Never fails: problems become a single `FetchError`.
pub async fn fetch_source(
    session: &dyn ChannelSession,
    source: &str,
    limit: usize,
) -> SourceOutcome {
    let fetched = async {
        let handle = session.resolve(source).await?;
        session.history(&handle, limit).await
    }
    .await;

    match fetched {
        Ok(records) => {
            let msgs: Vec<NormalizedMessage> = records
                .into_iter()
                .take(limit)
                .filter_map(NormalizedMessage::from_raw)
                .collect();
            counter!("fetch_messages_total").increment(msgs.len() as u64);
            tracing::debug!(source, kept = msgs.len(), "source fetched");
            SourceOutcome::Messages(msgs)
        }
        Err(e) => {
            tracing::warn!(error = ?e, source, session = session.name(), "source fetch error");
            counter!("fetch_source_errors_total").increment(1);
            SourceOutcome::Failed(FetchError {
                source: source.to_string(),
                error: format!("{e:#}"),
            })
        }
    }
}

/// Run the fetch half of one cycle over `sources`.
///
/// Opens a session, walks every source and always closes the session before
/// returning. If the session cannot be opened, every source records the open
/// error so the registry-size invariant still holds.
pub async fn run_once(
    factory: &dyn SessionFactory,
    sources: &[String],
    limit: usize,
    concurrency: Concurrency,
) -> FetchOutcome {
    ensure_metrics_described();

    let session: Arc<dyn ChannelSession> = match factory.open().await {
        Ok(s) => Arc::from(s),
        Err(e) => {
            tracing::warn!(error = ?e, "session open failed");
            counter!("fetch_source_errors_total").increment(sources.len() as u64);
            let msg = format!("{e:#}");
            let mut out = FetchOutcome::default();
            for s in sources {
                out.push(SourceOutcome::Failed(FetchError {
                    source: s.clone(),
                    error: msg.clone(),
                }));
            }
            return out;
        }
    };

    let outcomes = match concurrency {
        Concurrency::Sequential => {
            let mut v = Vec::with_capacity(sources.len());
            for s in sources {
                v.push(fetch_source(session.as_ref(), s, limit).await);
            }
            v
        }
        Concurrency::Parallel => fetch_parallel(&session, sources, limit).await,
    };

    session.close().await;

    let mut out = FetchOutcome::default();
    for o in outcomes {
        out.push(o);
    }
    out
}

async fn fetch_parallel(
    session: &Arc<dyn ChannelSession>,
    sources: &[String],
    limit: usize,
) -> Vec<SourceOutcome> {
    let mut set = JoinSet::new();
    for (idx, source) in sources.iter().enumerate() {
        let session = Arc::clone(session);
        let source = source.clone();
        set.spawn(async move { (idx, fetch_source(session.as_ref(), &source, limit).await) });
    }

    let mut slots: Vec<Option<SourceOutcome>> = vec![None; sources.len()];
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, outcome)) => slots[idx] = Some(outcome),
            Err(e) => tracing::warn!(error = ?e, "source task aborted"),
        }
    }

    slots
        .into_iter()
        .zip(sources)
        .map(|(slot, source)| {
            slot.unwrap_or_else(|| {
                counter!("fetch_source_errors_total").increment(1);
                SourceOutcome::Failed(FetchError {
                    source: source.clone(),
                    error: "fetch task aborted".to_string(),
                })
            })
        })
        .collect()
}

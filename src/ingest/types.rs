// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// One message as returned by a remote channel, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub source: String,
    pub timestamp: String,
    pub body: Option<String>,
    pub permalink: Option<String>,
}

/// Uniform message shape shared by snapshots and the tool contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedMessage {
    #[serde(rename = "channel")]
    pub source: String,
    #[serde(rename = "date")]
    pub timestamp: String,
    #[serde(rename = "message")]
    pub body: String,
    pub url: Option<String>,
}

impl NormalizedMessage {
    /// Returns `None` for missing or empty bodies; those never reach a snapshot.
    /// Whitespace-only text is still a body.
    pub fn from_raw(raw: RawRecord) -> Option<Self> {
        let body = raw.body?;
        if body.is_empty() {
            return None;
        }
        Some(Self {
            source: raw.source,
            timestamp: raw.timestamp,
            body,
            url: raw.permalink,
        })
    }
}

/// Recorded in place of messages when a source cannot be read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchError {
    #[serde(rename = "channel")]
    pub source: String,
    pub error: String,
}

/// One row of the full snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum SnapshotEntry {
    Message(NormalizedMessage),
    Error(FetchError),
}

impl SnapshotEntry {
    pub fn source(&self) -> &str {
        match self {
            SnapshotEntry::Message(m) => &m.source,
            SnapshotEntry::Error(e) => &e.source,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SnapshotEntry::Error(_))
    }
}

/// Everything one source produced during a cycle: messages or exactly one error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    Messages(Vec<NormalizedMessage>),
    Failed(FetchError),
}

/// Queryable handle for a resolved channel. `alias` is the public username,
/// when the remote side exposes one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelHandle {
    pub source: String,
    pub alias: Option<String>,
}

/// An open remote session. Lives for exactly one cycle.
#[async_trait::async_trait]
pub trait ChannelSession: Send + Sync {
    async fn resolve(&self, source: &str) -> Result<ChannelHandle>;

    /// Most recent `limit` records of the channel, newest first.
    async fn history(&self, handle: &ChannelHandle, limit: usize) -> Result<Vec<RawRecord>>;

    /// Release the session. Called once at the end of every cycle.
    async fn close(&self) {}

    fn name(&self) -> &'static str;
}

/// Opens a fresh session per cycle; sessions are never pooled.
#[async_trait::async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn ChannelSession>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(body: Option<&str>) -> RawRecord {
        RawRecord {
            source: "basrah_oil".into(),
            timestamp: "2025-01-01T10:00:00+00:00".into(),
            body: body.map(str::to_string),
            permalink: None,
        }
    }

    #[test]
    fn only_missing_or_empty_bodies_are_dropped() {
        assert!(NormalizedMessage::from_raw(raw(None)).is_none());
        assert!(NormalizedMessage::from_raw(raw(Some(""))).is_none());
        let ws = NormalizedMessage::from_raw(raw(Some("  \n "))).expect("whitespace kept");
        assert_eq!(ws.body, "  \n ");
        assert!(NormalizedMessage::from_raw(raw(Some("نفط"))).is_some());
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let msg = NormalizedMessage::from_raw(raw(Some("hello"))).unwrap();
        let v = serde_json::to_value(SnapshotEntry::Message(msg)).unwrap();
        assert_eq!(v["channel"], "basrah_oil");
        assert_eq!(v["message"], "hello");
        assert!(v["url"].is_null());

        let err = SnapshotEntry::Error(FetchError {
            source: "maymun5".into(),
            error: "boom".into(),
        });
        let v = serde_json::to_value(err).unwrap();
        assert_eq!(v, serde_json::json!({ "channel": "maymun5", "error": "boom" }));
    }
}

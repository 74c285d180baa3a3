// tests/common/mod.rs
// Scripted channel sessions shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use channel_intel::ingest::types::{ChannelHandle, ChannelSession, RawRecord, SessionFactory};

/// Per-source script: `Ok(records)` (newest first) or an error message.
pub type Script = HashMap<String, Result<Vec<RawRecord>, String>>;

pub fn rec(source: &str, ts: &str, body: &str) -> RawRecord {
    RawRecord {
        source: source.to_string(),
        timestamp: ts.to_string(),
        body: Some(body.to_string()),
        permalink: Some(format!("https://t.me/s/{source}/{ts}")),
    }
}

pub fn empty_rec(source: &str, ts: &str) -> RawRecord {
    RawRecord {
        source: source.to_string(),
        timestamp: ts.to_string(),
        body: None,
        permalink: None,
    }
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[derive(Default)]
pub struct Counters {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
}

pub struct ScriptedFactory {
    pub script: Script,
    pub fail_open: bool,
    pub counters: Arc<Counters>,
}

impl ScriptedFactory {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            fail_open: false,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn failing_open() -> Self {
        Self {
            script: Script::new(),
            fail_open: true,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }
}

struct ScriptedSession {
    script: Script,
    counters: Arc<Counters>,
}

#[async_trait]
impl ChannelSession for ScriptedSession {
    async fn resolve(&self, source: &str) -> Result<ChannelHandle> {
        match self.script.get(source) {
            None => Err(anyhow!("cannot resolve '{source}'")),
            Some(Err(msg)) => Err(anyhow!("{msg}")),
            Some(Ok(_)) => Ok(ChannelHandle {
                source: source.to_string(),
                alias: Some(source.to_string()),
            }),
        }
    }

    async fn history(&self, handle: &ChannelHandle, limit: usize) -> Result<Vec<RawRecord>> {
        match self.script.get(&handle.source) {
            Some(Ok(records)) => Ok(records.iter().take(limit).cloned().collect()),
            _ => Err(anyhow!("no history for '{}'", handle.source)),
        }
    }

    async fn close(&self) {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

#[async_trait]
impl SessionFactory for ScriptedFactory {
    async fn open(&self) -> Result<Box<dyn ChannelSession>> {
        if self.fail_open {
            return Err(anyhow!("auth rejected"));
        }
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            script: self.script.clone(),
            counters: Arc::clone(&self.counters),
        }))
    }
}

/// Three-source registry: two healthy, one failing.
pub fn iraq_script() -> Script {
    let mut s = Script::new();
    s.insert(
        "basrah_oil".into(),
        Ok(vec![
            rec("basrah_oil", "2025-03-01T10:00:00+00:00", "Weather is calm today"),
            rec("basrah_oil", "2025-03-01T09:00:00+00:00", "Exports of crude rose"),
            empty_rec("basrah_oil", "2025-03-01T08:00:00+00:00"),
        ]),
    );
    s.insert(
        "IraqiPmo".into(),
        Ok(vec![
            rec("IraqiPmo", "2025-03-01T11:00:00+00:00", "PM meets Basrah_Oil delegation"),
            rec("IraqiPmo", "2025-03-01T07:00:00+00:00", "اجتماع مجلس الوزراء حول النفط"),
        ]),
    );
    s.insert("maymun5".into(), Err("channel is private".into()));
    s
}

pub fn iraq_sources() -> Vec<String> {
    strings(&["basrah_oil", "IraqiPmo", "maymun5"])
}

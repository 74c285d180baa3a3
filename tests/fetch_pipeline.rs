// tests/fetch_pipeline.rs
//
// End-to-end fetch/filter cycles over scripted sessions: registry invariant,
// explicit-source override, snapshot side effects, session scoping.

mod common;

use std::sync::Arc;

use channel_intel::classify::Classifier;
use channel_intel::ingest::types::SnapshotEntry;
use channel_intel::ingest::{self, Concurrency};
use channel_intel::pipeline::Pipeline;
use channel_intel::snapshot::SnapshotWriter;
use common::{iraq_script, iraq_sources, strings, ScriptedFactory};

fn pipeline(factory: Arc<ScriptedFactory>, dir: &std::path::Path) -> Pipeline {
    Pipeline::new(
        iraq_sources(),
        factory,
        Classifier::default(),
        SnapshotWriter::in_dir(dir),
    )
}

fn read_entries(path: &std::path::Path) -> Vec<SnapshotEntry> {
    let s = std::fs::read_to_string(path).expect("read snapshot");
    serde_json::from_str(&s).expect("parse snapshot")
}

#[tokio::test]
async fn every_source_yields_messages_or_one_error() {
    let factory = ScriptedFactory::new(iraq_script());
    let out = ingest::run_once(&factory, &iraq_sources(), 120, Concurrency::Sequential).await;

    // 2 + 2 messages (empty body dropped) + 1 error
    assert_eq!(out.entries.len(), 5);
    assert_eq!(out.error_count(), 1);
    for source in iraq_sources() {
        let errors = out
            .entries
            .iter()
            .filter(|e| e.source() == source && e.is_error())
            .count();
        let msgs = out
            .entries
            .iter()
            .filter(|e| e.source() == source && !e.is_error())
            .count();
        assert!(errors <= 1);
        assert!(errors == 0 || msgs == 0, "{source} has both messages and an error");
    }
    assert!(out
        .messages()
        .iter()
        .all(|m| !m.body.trim().is_empty()));
}

#[tokio::test]
async fn unknown_source_is_recorded_and_cycle_continues() {
    let factory = ScriptedFactory::new(iraq_script());
    let sources = strings(&["ghost_channel", "basrah_oil"]);
    let out = ingest::run_once(&factory, &sources, 120, Concurrency::Sequential).await;

    match &out.entries[0] {
        SnapshotEntry::Error(e) => {
            assert_eq!(e.source, "ghost_channel");
            assert!(e.error.contains("cannot resolve"));
        }
        other => panic!("expected error entry, got {other:?}"),
    }
    assert_eq!(out.messages().len(), 2);
}

#[tokio::test]
async fn limit_caps_messages_per_source() {
    let factory = ScriptedFactory::new(iraq_script());
    let out = ingest::run_once(&factory, &iraq_sources(), 1, Concurrency::Sequential).await;
    let msgs = out.messages();
    assert_eq!(msgs.len(), 2);
    assert_eq!(msgs[0].body, "Weather is calm today");
    assert_eq!(msgs[1].body, "PM meets Basrah_Oil delegation");
}

#[tokio::test]
async fn parallel_mode_keeps_registry_order() {
    let seq = ScriptedFactory::new(iraq_script());
    let par = ScriptedFactory::new(iraq_script());
    let a = ingest::run_once(&seq, &iraq_sources(), 120, Concurrency::Sequential).await;
    let b = ingest::run_once(&par, &iraq_sources(), 120, Concurrency::Parallel).await;
    assert_eq!(a, b);
}

#[tokio::test]
async fn session_is_opened_and_closed_once_per_cycle() {
    let factory = Arc::new(ScriptedFactory::new(iraq_script()));
    let tmp = tempfile::tempdir().unwrap();
    let p = pipeline(Arc::clone(&factory), tmp.path());

    p.fetch_and_filter(&strings(&["crude"]), None).await.unwrap();
    p.fetch_and_filter(&strings(&["crude"]), None).await.unwrap();

    assert_eq!(factory.opened(), 2);
    assert_eq!(factory.closed(), 2);
}

#[tokio::test]
async fn failed_open_marks_every_source() {
    let factory = ScriptedFactory::failing_open();
    let out = ingest::run_once(&factory, &iraq_sources(), 120, Concurrency::Sequential).await;
    assert_eq!(out.entries.len(), 3);
    assert_eq!(out.error_count(), 3);
    assert!(out.entries.iter().all(|e| match e {
        SnapshotEntry::Error(err) => err.error.contains("auth rejected"),
        _ => false,
    }));
}

#[tokio::test]
async fn mentioned_source_override_and_content_matches() {
    let factory = Arc::new(ScriptedFactory::new(iraq_script()));
    let tmp = tempfile::tempdir().unwrap();
    let p = pipeline(factory, tmp.path());

    let res = p
        .fetch_and_filter(&strings(&["basrah_oil"]), None)
        .await
        .unwrap();

    assert_eq!(res.keywords_used, strings(&["basrah_oil"]));
    let bodies: Vec<&str> = res.matched_messages.iter().map(|m| m.body.as_str()).collect();
    // every basrah_oil message regardless of content, plus the IraqiPmo post
    // that literally contains the keyword (case-insensitive)
    assert_eq!(
        bodies,
        vec![
            "Weather is calm today",
            "Exports of crude rose",
            "PM meets Basrah_Oil delegation",
        ]
    );
}

#[tokio::test]
async fn empty_keywords_match_nothing() {
    let factory = Arc::new(ScriptedFactory::new(iraq_script()));
    let tmp = tempfile::tempdir().unwrap();
    let p = pipeline(factory, tmp.path());

    let res = p.fetch_and_filter(&[], None).await.unwrap();
    assert!(res.matched_messages.is_empty());

    // the full snapshot is still written
    let all = read_entries(p.snapshots().all_path());
    assert_eq!(all.len(), 5);
}

#[tokio::test]
async fn snapshots_reflect_cycle_and_are_idempotent() {
    let factory = Arc::new(ScriptedFactory::new(iraq_script()));
    let tmp = tempfile::tempdir().unwrap();
    let p = pipeline(factory, tmp.path());
    let kws = strings(&["النفط", "CRUDE"]);

    let first = p.fetch_and_filter(&kws, Some(50)).await.unwrap();
    let second = p.fetch_and_filter(&kws, Some(50)).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.matched_messages.len(), 2);

    let all = read_entries(p.snapshots().all_path());
    let filtered = std::fs::read_to_string(p.snapshots().filtered_path()).unwrap();
    let filtered: Vec<serde_json::Value> = serde_json::from_str(&filtered).unwrap();
    assert!(all.len() >= filtered.len());
    assert_eq!(filtered.len(), 2);
    assert!(filtered.iter().all(|v| v.get("error").is_none()));
}

#[tokio::test]
async fn snapshot_failure_is_fatal_for_the_cycle() {
    let factory = Arc::new(ScriptedFactory::new(iraq_script()));
    let tmp = tempfile::tempdir().unwrap();
    // a regular file where the snapshot directory should be
    let blocker = tmp.path().join("not_a_dir");
    std::fs::write(&blocker, "x").unwrap();
    let p = pipeline(Arc::clone(&factory), &blocker);

    let err = p.fetch_and_filter(&strings(&["crude"]), None).await.unwrap_err();
    assert!(err.to_string().contains("snapshot"));
    // the session was still released
    assert_eq!(factory.closed(), 1);
}

// tests/provider_telegram_web.rs
use std::collections::HashMap;

use channel_intel::ingest::providers::telegram_web::{
    parse_preview, FixtureFactory, TelegramWebSession, DEFAULT_BASE_URL,
};
use channel_intel::ingest::types::ChannelSession;
use channel_intel::ingest::{self, Concurrency};

const PREVIEW: &str = include_str!("fixtures/basrah_oil_preview.html");
const OLDER: &str = include_str!("fixtures/basrah_oil_preview_before_101.html");

fn pages(with_older: bool) -> HashMap<String, String> {
    let mut pages = HashMap::new();
    pages.insert("basrah_oil".to_string(), PREVIEW.to_string());
    if with_older {
        pages.insert("basrah_oil?before=101".to_string(), OLDER.to_string());
    }
    pages
}

fn permalinks(records: &[channel_intel::ingest::types::RawRecord]) -> Vec<&str> {
    records
        .iter()
        .map(|r| r.permalink.as_deref().unwrap_or(""))
        .collect()
}

#[test]
fn parses_posts_newest_first() {
    let page = parse_preview(PREVIEW, "basrah_oil", DEFAULT_BASE_URL).expect("parse preview");
    assert_eq!(page.alias.as_deref(), Some("basrah_oil"));
    assert_eq!(page.records.len(), 6);
    assert_eq!(page.oldest_id, Some(101));

    // service message carries no body of its own
    assert_eq!(page.records[0].body, None);
    assert_eq!(page.records[0].timestamp, "2025-03-01T14:00:00+00:00");

    // forwarded post: the body, not the "Forwarded from" header
    assert_eq!(
        page.records[1].body.as_deref(),
        Some("بيان وزارة النفط حول أسعار الخام")
    );

    // reply post: its own text, not the quoted parent
    let reply = &page.records[2];
    assert_eq!(
        reply.body.as_deref(),
        Some("Update: Shuaiba units back online, exports resumed at Khor al-Zubair")
    );
    assert_eq!(reply.permalink.as_deref(), Some("https://t.me/s/basrah_oil/104"));
    assert_eq!(reply.timestamp, "2025-03-01T12:05:00+00:00");

    let refinery = &page.records[3];
    assert_eq!(refinery.timestamp, "2025-03-01T10:30:00+00:00");
    assert_eq!(
        refinery.body.as_deref(),
        Some("Refinery maintenance in Shuaiba \u{2013} output reduced")
    );

    // photo-only post has no text block
    assert_eq!(page.records[4].body, None);

    let oldest = &page.records[5];
    assert_eq!(
        oldest.body.as_deref(),
        Some("ارتفاع صادرات النفط من موانئ البصرة\nExports up & steady")
    );
}

#[test]
fn custom_base_url_is_used_for_permalinks() {
    let page = parse_preview(PREVIEW, "basrah_oil", "https://mirror.example/").unwrap();
    assert_eq!(
        page.records[0].permalink.as_deref(),
        Some("https://mirror.example/s/basrah_oil/106")
    );
}

#[tokio::test]
async fn history_follows_older_pages_up_to_the_limit() {
    let session = TelegramWebSession::from_fixtures(pages(true));

    let handle = session.resolve("basrah_oil").await.unwrap();
    let records = session.history(&handle, 8).await.unwrap();
    assert_eq!(records.len(), 8);
    assert_eq!(
        permalinks(&records)[5..],
        [
            "https://t.me/s/basrah_oil/101",
            "https://t.me/s/basrah_oil/100",
            "https://t.me/s/basrah_oil/99",
        ]
    );

    // channel runs out before the limit: everything available, newest first
    let handle = session.resolve("basrah_oil").await.unwrap();
    let records = session.history(&handle, 120).await.unwrap();
    assert_eq!(records.len(), 9);
    assert_eq!(
        records.last().and_then(|r| r.permalink.as_deref()),
        Some("https://t.me/s/basrah_oil/98")
    );
}

#[tokio::test]
async fn small_limit_is_served_from_the_first_page() {
    // no older page available; a small limit must not need one
    let session = TelegramWebSession::from_fixtures(pages(false));
    let handle = session.resolve("basrah_oil").await.unwrap();
    let records = session.history(&handle, 3).await.unwrap();
    assert_eq!(
        permalinks(&records),
        [
            "https://t.me/s/basrah_oil/106",
            "https://t.me/s/basrah_oil/105",
            "https://t.me/s/basrah_oil/104",
        ]
    );
}

#[tokio::test]
async fn fixture_session_feeds_the_fetch_cycle() {
    let factory = FixtureFactory { pages: pages(false) };
    let sources = vec!["basrah_oil".to_string(), "ghost".to_string()];

    let out = ingest::run_once(&factory, &sources, 120, Concurrency::Sequential).await;
    let msgs = out.messages();
    // media-only and service posts dropped, unknown channel recorded as an error
    assert_eq!(msgs.len(), 4);
    assert_eq!(out.error_count(), 1);
    assert!(msgs.iter().all(|m| m.source == "basrah_oil" && m.url.is_some()));

    let factory = FixtureFactory { pages: pages(true) };
    let out = ingest::run_once(&factory, &sources, 120, Concurrency::Sequential).await;
    assert_eq!(out.messages().len(), 7);
}

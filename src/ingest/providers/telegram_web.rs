//! Session over the public Telegram web preview (`https://t.me/s/<channel>`).
//!
//! The first preview page carries the latest posts of a public channel and
//! doubles as the resolution step. Older posts are reached through
//! `?before=<post id>` pages until the requested limit is met.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use metrics::histogram;
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::ingest::types::{ChannelHandle, ChannelSession, RawRecord, SessionFactory};

pub const DEFAULT_BASE_URL: &str = "https://t.me";

fn re(cell: &'static OnceCell<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

fn re_post() -> &'static Regex {
    static CELL: OnceCell<Regex> = OnceCell::new();
    re(&CELL, r#"data-post="([^"/]+)/(\d+)""#)
}

fn re_text() -> &'static Regex {
    static CELL: OnceCell<Regex> = OnceCell::new();
    re(
        &CELL,
        r#"(?s)<div class="tgme_widget_message_text js-message_text"[^>]*>(.*?)</div>"#,
    )
}

fn re_time() -> &'static Regex {
    static CELL: OnceCell<Regex> = OnceCell::new();
    re(&CELL, r#"<time[^>]*datetime="([^"]+)""#)
}

fn re_username() -> &'static Regex {
    static CELL: OnceCell<Regex> = OnceCell::new();
    re(
        &CELL,
        r#"(?s)tgme_channel_info_header_username[^>]*>\s*<a[^>]*>@([A-Za-z0-9_]+)"#,
    )
}

fn re_br() -> &'static Regex {
    static CELL: OnceCell<Regex> = OnceCell::new();
    re(&CELL, r"(?i)<br\s*/?>")
}

fn re_tags() -> &'static Regex {
    static CELL: OnceCell<Regex> = OnceCell::new();
    re(&CELL, r"(?s)</?[^>]+>")
}

/// Turn a message-text block into plain text: line breaks kept, tags dropped,
/// entities decoded.
pub fn html_to_text(fragment: &str) -> String {
    let with_breaks = re_br().replace_all(fragment, "\n");
    let stripped = re_tags().replace_all(&with_breaks, "");
    html_escape::decode_html_entities(&stripped).trim().to_string()
}

/// Render preview timestamps as RFC 3339; unknown formats pass through.
fn normalize_timestamp(raw: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|_| raw.to_string())
}

/// A parsed preview page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewPage {
    pub alias: Option<String>,
    /// Newest first.
    pub records: Vec<RawRecord>,
    /// Smallest post id on the page; the cursor for the next older page.
    pub oldest_id: Option<u64>,
}

/// Parse a channel preview page. Fails when the page has no channel markup,
/// which is how Telegram answers for unknown or private channels.
pub fn parse_preview(html: &str, source: &str, base_url: &str) -> Result<PreviewPage> {
    let has_channel = html.contains("tgme_channel_info") || html.contains("tgme_widget_message_wrap");
    if !has_channel {
        bail!("channel '{source}' not found or not public");
    }

    let mut alias = re_username()
        .captures(html)
        .map(|c| c[1].to_string());

    let base = base_url.trim_end_matches('/');
    let mut records = Vec::new();
    let mut oldest_id: Option<u64> = None;
    for chunk in html.split("tgme_widget_message_wrap").skip(1) {
        let post = re_post().captures(chunk);
        if alias.is_none() {
            alias = post.as_ref().map(|c| c[1].to_string());
        }
        if let Some(id) = post.as_ref().and_then(|c| c[2].parse::<u64>().ok()) {
            oldest_id = Some(oldest_id.map_or(id, |o| o.min(id)));
        }
        let permalink = match (&alias, post.as_ref()) {
            (Some(a), Some(c)) => Some(format!("{base}/s/{a}/{}", &c[2])),
            _ => None,
        };
        let timestamp = re_time()
            .captures(chunk)
            .map(|c| normalize_timestamp(&c[1]))
            .unwrap_or_default();
        // media-only and service posts have no body of their own; they are kept
        // as empty bodies and dropped later by normalization
        let body = if chunk.contains("service_message") {
            None
        } else {
            re_text().captures(chunk).map(|c| html_to_text(&c[1]))
        };

        records.push(RawRecord {
            source: source.to_string(),
            timestamp,
            body,
            permalink,
        });
    }
    records.reverse();

    Ok(PreviewPage {
        alias,
        records,
        oldest_id,
    })
}

enum Mode {
    // Pages keyed by source id, older pages by `<source>?before=<id>`; used by
    // tests and offline demos.
    Fixture(HashMap<String, String>),
    Http { client: reqwest::Client },
}

pub struct TelegramWebSession {
    mode: Mode,
    base_url: String,
    pages: Mutex<HashMap<String, PreviewPage>>,
}

impl TelegramWebSession {
    pub fn from_fixtures(pages: HashMap<String, String>) -> Self {
        Self {
            mode: Mode::Fixture(pages),
            base_url: DEFAULT_BASE_URL.to_string(),
            pages: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            mode: Mode::Http { client },
            base_url: base_url.trim_end_matches('/').to_string(),
            pages: Mutex::new(HashMap::new()),
        }
    }

    /// Raw page HTML. `Ok(None)` when a fixture has no such page.
    async fn load_page(&self, source: &str, before: Option<u64>) -> Result<Option<String>> {
        let query = before.map(|id| format!("?before={id}")).unwrap_or_default();
        match &self.mode {
            Mode::Fixture(pages) => Ok(pages.get(&format!("{source}{query}")).cloned()),
            Mode::Http { client } => {
                let url = format!("{}/s/{}{}", self.base_url, source, query);
                let resp = client
                    .get(&url)
                    .send()
                    .await
                    .with_context(|| format!("GET {url}"))?;
                // Telegram redirects unknown/private channels away from /s/.
                if !resp.url().path().starts_with("/s/") {
                    bail!("channel '{source}' not found or not public");
                }
                let resp = resp
                    .error_for_status()
                    .with_context(|| format!("GET {url}"))?;
                resp.text().await.context("preview .text()").map(Some)
            }
        }
    }

    /// Walk older pages until `limit` records are collected or the channel
    /// runs out. A failing older page ends the walk with what was collected.
    async fn extend_history(
        &self,
        source: &str,
        mut records: Vec<RawRecord>,
        mut before: Option<u64>,
        limit: usize,
    ) -> Vec<RawRecord> {
        while records.len() < limit {
            let Some(id) = before else { break };
            let page = match self.load_page(source, Some(id)).await {
                Ok(Some(html)) => parse_preview(&html, source, &self.base_url),
                Ok(None) => break,
                Err(e) => Err(e),
            };
            let page = match page {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(error = ?e, source, before = id, "older preview page failed");
                    break;
                }
            };
            if page.records.is_empty() {
                break;
            }
            // the cursor must move strictly backwards
            before = page.oldest_id.filter(|&next| next < id);
            records.extend(page.records);
        }
        records.truncate(limit);
        records
    }
}

#[async_trait]
impl ChannelSession for TelegramWebSession {
    async fn resolve(&self, source: &str) -> Result<ChannelHandle> {
        let t0 = std::time::Instant::now();
        let html = self
            .load_page(source, None)
            .await?
            .ok_or_else(|| anyhow!("channel '{source}' not found or not public"))?;
        let page = parse_preview(&html, source, &self.base_url)?;
        histogram!("fetch_preview_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        let handle = ChannelHandle {
            source: source.to_string(),
            alias: page.alias.clone(),
        };
        self.pages
            .lock()
            .map_err(|_| anyhow!("preview cache poisoned"))?
            .insert(source.to_string(), page);
        Ok(handle)
    }

    async fn history(&self, handle: &ChannelHandle, limit: usize) -> Result<Vec<RawRecord>> {
        let page = self
            .pages
            .lock()
            .map_err(|_| anyhow!("preview cache poisoned"))?
            .remove(&handle.source)
            .ok_or_else(|| anyhow!("channel '{}' was not resolved", handle.source))?;
        Ok(self
            .extend_history(&handle.source, page.records, page.oldest_id, limit)
            .await)
    }

    async fn close(&self) {
        if let Ok(mut pages) = self.pages.lock() {
            pages.clear();
        }
        tracing::debug!(base_url = %self.base_url, "preview session closed");
    }

    fn name(&self) -> &'static str {
        match self.mode {
            Mode::Fixture(_) => "telegram-web-fixture",
            Mode::Http { .. } => "telegram-web",
        }
    }
}

/// Builds one HTTP client per cycle.
#[derive(Debug, Clone)]
pub struct TelegramWebFactory {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl TelegramWebFactory {
    pub fn new(base_url: &str, timeout: Duration, user_agent: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            timeout,
            user_agent: user_agent.to_string(),
        }
    }
}

#[async_trait]
impl SessionFactory for TelegramWebFactory {
    async fn open(&self) -> Result<Box<dyn ChannelSession>> {
        let client = reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .connect_timeout(Duration::from_secs(4))
            .timeout(self.timeout)
            .build()
            .context("building preview http client")?;
        Ok(Box::new(TelegramWebSession::from_client(
            client,
            &self.base_url,
        )))
    }
}

/// Serves fixed pages; every `open` gets a fresh session over the same pages.
#[derive(Debug, Clone, Default)]
pub struct FixtureFactory {
    pub pages: HashMap<String, String>,
}

#[async_trait]
impl SessionFactory for FixtureFactory {
    async fn open(&self) -> Result<Box<dyn ChannelSession>> {
        Ok(Box::new(TelegramWebSession::from_fixtures(
            self.pages.clone(),
        )))
    }
}

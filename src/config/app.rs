// src/config/app.rs
//! Application configuration, passed explicitly into the pipeline and the agent.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use crate::classify::{MatchMode, DEFAULT_FUZZY_THRESHOLD};
use crate::config::sources;
use crate::ingest::providers::telegram_web::DEFAULT_BASE_URL;
use crate::ingest::Concurrency;

pub const DEFAULT_APP_CONFIG_PATH: &str = "config/app.toml";
pub const ENV_APP_CONFIG_PATH: &str = "APP_CONFIG_PATH";
pub const ENV_AGENT_API_KEY: &str = "AGENT_API_KEY";
pub const ENV_AGENT_ENDPOINT: &str = "AGENT_ENDPOINT";
pub const ENV_AGENT_MODEL: &str = "AGENT_MODEL";

pub const DEFAULT_MESSAGE_LIMIT: usize = 120;

fn default_message_limit() -> usize {
    DEFAULT_MESSAGE_LIMIT
}
fn default_concurrency() -> String {
    "sequential".to_string()
}
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_timeout_secs() -> u64 {
    15
}
fn default_user_agent() -> String {
    "channel-intel/0.1".to_string()
}
fn default_match_mode() -> String {
    "substring".to_string()
}
fn default_fuzzy_threshold() -> f64 {
    DEFAULT_FUZZY_THRESHOLD
}
fn default_snapshot_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_all_file() -> String {
    crate::snapshot::DEFAULT_ALL_FILE.to_string()
}
fn default_filtered_file() -> String {
    crate::snapshot::DEFAULT_FILTERED_FILE.to_string()
}
fn default_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model() -> String {
    "gpt-4.1".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_agent_name() -> String {
    "telegram-fetch-agent".to_string()
}
fn default_max_tool_rounds() -> usize {
    8
}
fn default_max_conversations() -> usize {
    crate::api::DEFAULT_MAX_CONVERSATIONS
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesSection {
    /// Inline registry; empty means the built-in channel list.
    #[serde(default)]
    pub channels: Vec<String>,
    /// Optional registry file (TOML or JSON), overridden by `$SOURCES_PATH`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSection {
    #[serde(default = "default_message_limit")]
    pub message_limit: usize,
    /// "sequential" | "parallel"
    #[serde(default = "default_concurrency")]
    pub concurrency: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            message_limit: default_message_limit(),
            concurrency: default_concurrency(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterSection {
    /// "substring" | "token" | "fuzzy"
    #[serde(default = "default_match_mode")]
    pub match_mode: String,
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
}

impl Default for FilterSection {
    fn default() -> Self {
        Self {
            match_mode: default_match_mode(),
            fuzzy_threshold: default_fuzzy_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotSection {
    #[serde(default = "default_snapshot_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_all_file")]
    pub all_file: String,
    #[serde(default = "default_filtered_file")]
    pub filtered_file: String,
}

impl Default for SnapshotSection {
    fn default() -> Self {
        Self {
            dir: default_snapshot_dir(),
            all_file: default_all_file(),
            filtered_file: default_filtered_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read from AGENT_API_KEY
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_agent_name")]
    pub name: String,
    /// Replaces the built-in instructions when set.
    #[serde(default)]
    pub instructions_path: Option<PathBuf>,
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    /// Live web-chat threads kept before the least recently used is dropped.
    #[serde(default = "default_max_conversations")]
    pub max_conversations: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: default_api_key(),
            name: default_agent_name(),
            instructions_path: None,
            max_tool_rounds: default_max_tool_rounds(),
            max_conversations: default_max_conversations(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub sources: SourcesSection,
    #[serde(default)]
    pub fetch: FetchSection,
    #[serde(default)]
    pub filter: FilterSection,
    #[serde(default)]
    pub snapshot: SnapshotSection,
    #[serde(default)]
    pub agent: AgentSection,
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading app config from {}", path.display()))?;
        let cfg: AppConfig = toml::from_str(&data)
            .with_context(|| format!("parsing app config {}", path.display()))?;
        cfg.finish()
    }

    /// Load using env var + fallbacks:
    /// 1) $APP_CONFIG_PATH (must exist)
    /// 2) config/app.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_APP_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("APP_CONFIG_PATH points to non-existent path");
            }
            return Self::load_from_file(pb);
        }
        let p = PathBuf::from(DEFAULT_APP_CONFIG_PATH);
        if p.exists() {
            return Self::load_from_file(p);
        }
        AppConfig::default().finish()
    }

    /// Apply registry file, env overrides and sanity checks.
    fn finish(mut self) -> Result<Self> {
        if let Some(list) = sources::load_sources_override(self.sources.path.as_deref())? {
            self.sources.channels = list;
        }
        self.sources.channels = if self.sources.channels.is_empty() {
            sources::default_channels()
        } else {
            sources::clean_list(std::mem::take(&mut self.sources.channels))
        };

        if let Ok(v) = env::var(ENV_AGENT_ENDPOINT) {
            self.agent.endpoint = v;
        }
        if let Ok(v) = env::var(ENV_AGENT_MODEL) {
            self.agent.model = v;
        }

        if self.fetch.message_limit == 0 {
            self.fetch.message_limit = default_message_limit();
        }
        if self.agent.max_tool_rounds == 0 {
            self.agent.max_tool_rounds = default_max_tool_rounds();
        }
        if self.agent.max_conversations == 0 {
            self.agent.max_conversations = default_max_conversations();
        }
        // surface typos at load time rather than per cycle
        self.match_mode()?;
        self.concurrency()?;
        Ok(self)
    }

    pub fn channels(&self) -> &[String] {
        &self.sources.channels
    }

    pub fn match_mode(&self) -> Result<MatchMode> {
        MatchMode::parse(&self.filter.match_mode, self.filter.fuzzy_threshold)
            .ok_or_else(|| anyhow!("unsupported match_mode: {}", self.filter.match_mode))
    }

    pub fn concurrency(&self) -> Result<Concurrency> {
        match self.fetch.concurrency.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Concurrency::Sequential),
            "parallel" => Ok(Concurrency::Parallel),
            other => bail!("unsupported concurrency: {other}"),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.timeout_secs.max(1))
    }

    /// Resolve the agent key; `"ENV"` reads `AGENT_API_KEY`. Empty when unset.
    pub fn agent_api_key(&self) -> String {
        if self.agent.api_key.trim().eq_ignore_ascii_case("env") {
            env::var(ENV_AGENT_API_KEY).unwrap_or_default()
        } else {
            self.agent.api_key.clone()
        }
    }
}

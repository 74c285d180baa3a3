// src/config/sources.rs
//! Source registry loading. The registry is ordered: entries are trimmed, empties
//! dropped and duplicates removed while keeping the first occurrence.

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_SOURCES_PATH: &str = "SOURCES_PATH";

/// Channels polled when no registry is configured.
pub const DEFAULT_CHANNELS: &[&str] = &[
    "SabrenNews22",
    "alsumariatviraq",
    "maymun5",
    "basrah_net",
    "IraqiPmo",
    "basrah_oil",
    "ElamAlmoqawama",
];

pub fn default_channels() -> Vec<String> {
    DEFAULT_CHANNELS.iter().map(|s| s.to_string()).collect()
}

#[derive(serde::Deserialize)]
struct SourcesFile {
    channels: Vec<String>,
}

/// Load a registry file: a JSON array for `.json`, otherwise TOML with
/// `channels = [...]`.
pub fn load_sources_from(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let channels = if is_json {
        serde_json::from_str::<Vec<String>>(&content)
            .with_context(|| format!("parsing JSON sources {}", path.display()))?
    } else {
        toml::from_str::<SourcesFile>(&content)
            .with_context(|| format!("parsing TOML sources {}", path.display()))?
            .channels
    };
    Ok(clean_list(channels))
}

/// Resolve the registry file: `$SOURCES_PATH` first, then the configured path.
/// `Ok(None)` means no file applies and inline/default channels are used.
pub fn load_sources_override(configured: Option<&Path>) -> Result<Option<Vec<String>>> {
    if let Ok(p) = std::env::var(ENV_SOURCES_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(anyhow!("SOURCES_PATH points to non-existent path"));
        }
        return load_sources_from(&pb).map(Some);
    }
    match configured {
        Some(p) => load_sources_from(p).map(Some),
        None => Ok(None),
    }
}

pub fn clean_list(items: Vec<String>) -> Vec<String> {
    use std::collections::HashSet;
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim().trim_start_matches('@');
        if !t.is_empty() && seen.insert(t.to_ascii_lowercase()) {
            out.push(t.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn order_is_kept_while_cleaning() {
        let items = [" maymun5 ", "", "@IraqiPmo", "MAYMUN5", "basrah_oil"];
        assert_eq!(
            clean_list(items.iter().map(|s| s.to_string()).collect()),
            vec!["maymun5", "IraqiPmo", "basrah_oil"]
        );
    }

    #[test]
    fn format_follows_the_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let toml_path = tmp.path().join("sources.toml");
        fs::write(&toml_path, r#"channels = ["basrah_net", "  SabrenNews22  "]"#).unwrap();
        assert_eq!(
            load_sources_from(&toml_path).unwrap(),
            vec!["basrah_net", "SabrenNews22"]
        );

        let json_path = tmp.path().join("sources.JSON");
        fs::write(&json_path, r#"["IraqiPmo", ""]"#).unwrap();
        assert_eq!(load_sources_from(&json_path).unwrap(), vec!["IraqiPmo"]);

        // a JSON list under a TOML name is rejected, not guessed
        let wrong = tmp.path().join("sources.txt");
        fs::write(&wrong, r#"["IraqiPmo"]"#).unwrap();
        assert!(load_sources_from(&wrong).is_err());
    }

    #[serial_test::serial]
    #[test]
    fn env_path_wins_over_configured_path() {
        let tmp = tempfile::tempdir().unwrap();
        let configured = tmp.path().join("sources.toml");
        fs::write(&configured, r#"channels = ["A"]"#).unwrap();

        env::remove_var(ENV_SOURCES_PATH);
        assert_eq!(
            load_sources_override(Some(&configured)).unwrap(),
            Some(vec!["A".to_string()])
        );
        assert_eq!(load_sources_override(None).unwrap(), None);

        let p_json = tmp.path().join("sources.json");
        fs::write(&p_json, r#"["X", "Y"]"#).unwrap();
        env::set_var(ENV_SOURCES_PATH, p_json.display().to_string());
        assert_eq!(
            load_sources_override(Some(&configured)).unwrap(),
            Some(vec!["X".to_string(), "Y".to_string()])
        );

        env::set_var(ENV_SOURCES_PATH, tmp.path().join("missing.json"));
        assert!(load_sources_override(None).is_err());
        env::remove_var(ENV_SOURCES_PATH);
    }
}

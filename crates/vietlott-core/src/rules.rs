//! Streak rule configuration: one JSON object per line.
//!
//! ```text
//! {"SoTour": 10, "SoMuonDanh": "12"}
//! {"SoTour": 14, "SoMuonDanh": 7}
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("rule file not found: {0}")]
    NotFound(PathBuf),
    #[error("could not read rule file {path}: {source}")]
    Decode {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One (threshold, recommended pick) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    #[serde(rename = "SoTour")]
    pub streak_threshold: u32,
    #[serde(rename = "SoMuonDanh", deserialize_with = "string_or_number")]
    pub recommended_number: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Pick {
        Text(String),
        Int(i64),
    }

    Ok(match Pick::deserialize(deserializer)? {
        Pick::Text(s) => s,
        Pick::Int(n) => n.to_string(),
    })
}

/// Parse rule lines, skipping blank and malformed ones.
pub fn parse_rules(content: &str) -> Vec<RuleConfig> {
    let mut rules = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<RuleConfig>(line) {
            Ok(rule) => rules.push(rule),
            Err(e) => warn!(line = idx + 1, error = %e, "skipping malformed rule line"),
        }
    }
    rules
}

/// Read and parse the rule file at `path`.
pub fn load_rules(path: &Path) -> Result<Vec<RuleConfig>, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let rules = parse_rules(&content);
    debug!(path = %path.display(), count = rules.len(), "loaded streak rules");
    Ok(rules)
}

/// Like [`load_rules`], but a missing or unreadable file yields no rules.
pub fn load_rules_or_empty(path: &Path) -> Vec<RuleConfig> {
    match load_rules(path) {
        Ok(rules) => rules,
        Err(e) => {
            warn!(error = %e, "no streak rules loaded");
            Vec::new()
        }
    }
}

//! Run configuration.
//!
//! Loaded from the `--config` path if given, otherwise from the first of
//! `./vietlott.toml` or `./.vietlott.toml` that exists, otherwise defaults.
//!
//! ```toml
//! data_dir = "data"
//! rules_path = "data/rules.jsonl"
//!
//! [http]
//! timeout_secs = 30
//!
//! [notify]
//! recipients = ["me@example.com"]
//! webhook_url = "https://relay.example.com/send"
//!
//! [streak]
//! big_win_sums = [4, 5, 16, 17]
//!
//! [games.power_655]
//! num_threads = 20
//! default_index_to = 3
//!
//! [games.keno]
//! url = "https://vietlott.vn/ajaxpro/..."
//! key = "..."
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use vietlott_core::streak::DEFAULT_BIG_WIN_SUMS;
use vietlott_core::{BigWinRule, GameDescriptor, TableShape, builtin_games, find_builtin};

const DEFAULT_CONFIG_FILES: &[&str] = &["./vietlott.toml", "./.vietlott.toml"];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    /// Defaults to `<data_dir>/rules.jsonl`.
    pub rules_path: Option<PathBuf>,
    pub http: HttpConfig,
    pub notify: NotifyConfig,
    pub streak: StreakConfig,
    pub games: BTreeMap<String, GameSettings>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            rules_path: None,
            http: HttpConfig::default(),
            notify: NotifyConfig::default(),
            streak: StreakConfig::default(),
            games: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    /// Sent verbatim as the `Cookie` header.
    pub cookies: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            cookies: None,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub recipients: Vec<String>,
    /// Alerts are only logged when unset.
    pub webhook_url: Option<String>,
    /// Environment variable holding the relay bearer token.
    pub token_env: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            recipients: Vec::new(),
            webhook_url: None,
            token_env: "VIETLOTT_NOTIFY_TOKEN".to_string(),
        }
    }
}

impl NotifyConfig {
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env).ok().filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreakConfig {
    pub big_win_sums: Vec<u32>,
}

impl Default for StreakConfig {
    fn default() -> Self {
        Self {
            big_win_sums: DEFAULT_BIG_WIN_SUMS.to_vec(),
        }
    }
}

impl StreakConfig {
    pub fn big_win_rule(&self) -> BigWinRule {
        BigWinRule::new(self.big_win_sums.iter().copied())
    }
}

/// Per-game overrides. A game that is not built in needs `url` and `key`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    pub url: Option<String>,
    pub key: Option<String>,
    pub num_threads: Option<usize>,
    pub default_index_to: Option<u32>,
    pub table: Option<TableShape>,
    /// Extra request body fields.
    pub extra: Option<toml::Table>,
}

impl AppConfig {
    /// Load from `path`, or from a default location, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        for candidate in DEFAULT_CONFIG_FILES {
            let candidate = Path::new(candidate);
            if candidate.exists() {
                return Self::from_file(candidate);
            }
        }
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    pub fn rules_path(&self) -> PathBuf {
        self.rules_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("rules.jsonl"))
    }

    /// Resolve a game by name: built-in defaults with config overrides
    /// applied, or a game defined entirely in config.
    pub fn game(&self, name: &str) -> Result<GameDescriptor> {
        let settings = self.games.get(name);
        let mut game = match (find_builtin(name), settings) {
            (Some(game), _) => game,
            (None, Some(GameSettings {
                url: Some(url),
                key: Some(key),
                ..
            })) => GameDescriptor::new(name, url.clone(), key.clone()),
            (None, Some(_)) => bail!("game {name:?} needs both `url` and `key` in config"),
            (None, None) => bail!("unknown game {name:?}; known games: {}", self.game_names().join(", ")),
        };

        if let Some(settings) = settings {
            apply_settings(&mut game, settings)?;
        }
        Ok(game)
    }

    /// Names of every built-in and configured game, sorted.
    pub fn game_names(&self) -> Vec<String> {
        let mut names: Vec<String> = builtin_games().into_iter().map(|g| g.name).collect();
        names.extend(self.games.keys().cloned());
        names.sort();
        names.dedup();
        names
    }
}

fn apply_settings(game: &mut GameDescriptor, settings: &GameSettings) -> Result<()> {
    if let Some(url) = &settings.url {
        game.url = url.clone();
    }
    if let Some(key) = &settings.key {
        game.key = key.clone();
    }
    if let Some(n) = settings.num_threads {
        game.num_threads = n;
    }
    if let Some(to) = settings.default_index_to {
        game.default_index_to = to;
    }
    if let Some(table) = settings.table {
        game.table = table;
    }
    if let Some(extra) = &settings.extra {
        let value = serde_json::to_value(extra).context("converting extra body fields")?;
        if let serde_json::Value::Object(map) = value {
            game.extra.extend(map);
        }
    }
    Ok(())
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::warn;

use crate::models::Game;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub strategies: StrategyConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GameConfig {
    #[serde(default = "default_game")]
    pub name: Game,
}

/// Fetcher configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetcherConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Keep walking the endpoint list after the first relevant page.
    #[serde(default)]
    pub exhaustive: bool,

    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<Endpoint>,
}

/// One candidate source page, tried in list order.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Endpoint {
    #[serde(default)]
    pub name: Option<String>,
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            name: None,
            url: url.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.url)
    }
}

/// Strategy tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyConfig {
    /// Dates older than this many days are not considered "recent".
    #[serde(default = "default_horizon_days")]
    pub horizon_days: i64,

    /// Characters searched around each date occurrence.
    #[serde(default = "default_window_chars")]
    pub window_chars: usize,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_csv_path")]
    pub csv_path: PathBuf,

    /// chrono format used when writing new rows.
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_game() -> Game {
    Game::Toto
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36".to_string()
}
fn default_endpoints() -> Vec<Endpoint> {
    let mut main = Endpoint::new("https://www.singaporepools.com.sg/en/product/Pages/toto_results.aspx");
    main.name = Some("toto results".to_string());
    main.headers.insert(
        "Accept".to_string(),
        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
    );
    main.headers.insert("Accept-Language".to_string(), "en-US,en;q=0.9".to_string());

    let mut alt = Endpoint::new("https://www.singaporepools.com.sg/en/product/sr/Pages/toto_results.aspx");
    alt.name = Some("toto results (sr)".to_string());

    vec![main, alt]
}
fn default_horizon_days() -> i64 {
    60
}
fn default_window_chars() -> usize {
    600
}
fn default_csv_path() -> PathBuf {
    PathBuf::from("data/totoResult.csv")
}
fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

impl Default for GameConfig {
    fn default() -> Self {
        Self { name: default_game() }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            exhaustive: false,
            endpoints: default_endpoints(),
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            horizon_days: default_horizon_days(),
            window_chars: default_window_chars(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            csv_path: default_csv_path(),
            date_format: default_date_format(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            game: GameConfig::default(),
            fetcher: FetcherConfig::default(),
            strategies: StrategyConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("TOTO").separator("__"))
            .build()?;

        let app_cfg: AppConfig = cfg.try_deserialize().unwrap_or_else(|e| {
            warn!("Config not usable ({}), falling back to defaults", e);
            AppConfig::default()
        });
        app_cfg.validate()?;
        Ok(app_cfg)
    }

    /// Reject endpoint lists the fetcher could never use.
    pub fn validate(&self) -> Result<()> {
        if self.fetcher.endpoints.is_empty() {
            anyhow::bail!("fetcher.endpoints is empty");
        }
        for ep in &self.fetcher.endpoints {
            let parsed = url::Url::parse(&ep.url)
                .with_context(|| format!("Invalid endpoint URL {:?}", ep.url))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                anyhow::bail!("Endpoint {} must be http(s)", ep.url);
            }
        }
        if self.strategies.horizon_days <= 0 {
            anyhow::bail!("strategies.horizon_days must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.game.name, Game::Toto);
        assert_eq!(cfg.fetcher.endpoints.len(), 2);
    }

    #[test]
    fn rejects_non_http_endpoint() {
        let mut cfg = AppConfig::default();
        cfg.fetcher.endpoints = vec![Endpoint::new("ftp://example.com/results")];
        assert!(cfg.validate().is_err());

        cfg.fetcher.endpoints = vec![Endpoint::new("not a url")];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn deserializes_endpoint_table() {
        let cfg = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [game]
                name = "four_d"

                [[fetcher.endpoints]]
                url = "https://example.com/4d"
                headers = { "User-Agent" = "test-agent" }
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let app: AppConfig = cfg.try_deserialize().unwrap();
        assert_eq!(app.game.name, Game::FourD);
        assert!(app.fetcher.endpoints[0]
            .headers
            .iter()
            .any(|(k, v)| k.eq_ignore_ascii_case("user-agent") && v == "test-agent"));
        assert_eq!(app.storage.date_format, "%Y-%m-%d");
    }
}

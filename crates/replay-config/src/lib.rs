//! Configuration management for the trade replay engine.
//!
//! Loads configuration from TOML files with per-timeframe backfill lookbacks.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Directory name used under the platform config and data dirs.
const APP_DIR: &str = "trade-replay";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub sync: SyncConfig,
    pub replay: ReplayConfig,
    pub alignment: AlignmentConfig,
    pub annotations: AnnotationConfig,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from default locations.
    ///
    /// Searches in order:
    /// 1. `./replay.toml`
    /// 2. `<config dir>/trade-replay/replay.toml`
    ///
    /// Returns default config if no file found.
    pub fn load_default() -> Self {
        if let Ok(config) = Self::load(Self::default_path()) {
            return config;
        }

        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join(APP_DIR).join("replay.toml");
            if let Ok(config) = Self::load(&config_path) {
                return config;
            }
        }

        Self::default()
    }

    /// Save configuration to a file path.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path.
    pub fn default_path() -> PathBuf {
        PathBuf::from("replay.toml")
    }
}

/// Remote candle endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the journal backend serving `/api/candles`.
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout_secs: 30,
            user_agent: format!("trade-replay/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Sync configuration for historical data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Path to the DuckDB database file.
    /// Defaults to ~/.local/share/trade-replay/candles.duckdb
    pub db_path: Option<PathBuf>,
    /// Window used by an incremental sync when nothing is cached.
    pub default_lookback_days: u32,
    /// Size of one bulk import chunk, in days.
    pub chunk_size_days: f64,
    /// Attempts per chunk before it is skipped.
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Pause between bulk import chunks.
    pub chunk_pause_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            default_lookback_days: 7,
            chunk_size_days: 0.08,
            max_retries: 3,
            retry_delay_ms: 2000,
            chunk_pause_ms: 300,
        }
    }
}

impl SyncConfig {
    /// Get the database path, using default if not specified.
    pub fn get_db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join("candles.duckdb")
        })
    }

    /// Chunk size in whole seconds (at least one minute).
    pub fn chunk_secs(&self) -> i64 {
        ((self.chunk_size_days * 86_400.0).round() as i64).max(60)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn chunk_pause(&self) -> Duration {
        Duration::from_millis(self.chunk_pause_ms)
    }
}

/// Replay, backfill and go-to-trade configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub default_speed_ms: u64,
    pub min_speed_ms: u64,
    pub max_speed_ms: u64,
    /// Fraction of the loaded span that triggers a backfill when scrolled into.
    pub backfill_quartile: f64,
    /// Delay before another backfill may start.
    pub backfill_cooldown_ms: u64,
    /// Backfill lookback in days, keyed by timeframe label. Entries given in
    /// the file override the built-in ones; the rest are kept.
    #[serde(deserialize_with = "merge_lookback_days")]
    pub backfill_lookback_days: HashMap<String, u32>,
    /// Lookback for timeframes missing from `backfill_lookback_days`.
    pub default_backfill_lookback_days: u32,
    pub go_to_trade_lead_secs: i64,
    pub go_to_trade_min_lag_secs: i64,
    pub go_to_trade_duration_multiple: i64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            default_speed_ms: 1000,
            min_speed_ms: 100,
            max_speed_ms: 3000,
            backfill_quartile: 0.25,
            backfill_cooldown_ms: 800,
            backfill_lookback_days: default_lookback_days(),
            default_backfill_lookback_days: 30,
            go_to_trade_lead_secs: 3600,
            go_to_trade_min_lag_secs: 7200,
            go_to_trade_duration_multiple: 3,
        }
    }
}

fn default_lookback_days() -> HashMap<String, u32> {
    [
        ("1m", 2),
        ("5m", 2),
        ("15m", 30),
        ("1h", 30),
        ("4h", 180),
        ("D", 180),
        ("W", 180),
    ]
    .into_iter()
    .map(|(label, days)| (label.to_string(), days))
    .collect()
}

fn merge_lookback_days<'de, D>(deserializer: D) -> Result<HashMap<String, u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = HashMap::<String, u32>::deserialize(deserializer)?;
    let mut days = default_lookback_days();
    days.extend(overrides);
    Ok(days)
}

impl ReplayConfig {
    /// Backfill lookback for a timeframe label, in seconds.
    /// Falls back to the default if the timeframe is not configured.
    pub fn backfill_lookback_secs(&self, timeframe: &str) -> i64 {
        let days = self
            .backfill_lookback_days
            .get(timeframe)
            .copied()
            .unwrap_or(self.default_backfill_lookback_days);
        i64::from(days) * 86_400
    }

    /// Clamp a playback interval to the configured range.
    pub fn clamp_speed(&self, speed_ms: u64) -> u64 {
        speed_ms.clamp(self.min_speed_ms, self.max_speed_ms.max(self.min_speed_ms))
    }

    pub fn backfill_cooldown(&self) -> Duration {
        Duration::from_millis(self.backfill_cooldown_ms)
    }
}

/// Trade alignment and snapping tolerances.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    /// Matches further than this from the entry time get no price offset.
    pub sanity_threshold_secs: i64,
    /// Maximum distance from a bar for a drawing point to snap to it.
    pub magnet_tolerance_secs: i64,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            sanity_threshold_secs: 4 * 3600,
            magnet_tolerance_secs: 300,
        }
    }
}

/// Annotation persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    pub debounce_ms: u64,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self { debounce_ms: 1000 }
    }
}

impl AnnotationConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

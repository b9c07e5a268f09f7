//! Configuration loading and management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use walk_core::{CalorieModel, TrackerConfig, UserId};

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Owner of recorded walks; also the backend's path parameter.
    pub user_id: String,
    /// Session clock resolution.
    pub tick_period_ms: u64,
    pub calories_per_meter: f64,
    /// REST backend. Walks are only stored locally when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
    /// Where GeoJSON map snapshots of finished walks are written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        let tracker = TrackerConfig::default();
        Self {
            database_path: data_dir.join("walk.db"),
            user_id: "local".to_string(),
            tick_period_ms: u64::try_from(tracker.tick_period.as_millis()).unwrap_or(1000),
            calories_per_meter: tracker.calorie_model.kcal_per_meter(),
            api_base_url: None,
            snapshot_dir: None,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (WALK_*)
        figment = figment.merge(Env::prefixed("WALK_"));

        figment.extract()
    }

    /// The tracker settings, validated.
    pub fn tracker_config(&self) -> Result<TrackerConfig> {
        ensure!(self.tick_period_ms > 0, "tick_period_ms must be positive");
        let calorie_model = CalorieModel::new(self.calories_per_meter).with_context(|| {
            format!(
                "calories_per_meter must be a finite non-negative number, got {}",
                self.calories_per_meter
            )
        })?;
        Ok(TrackerConfig {
            tick_period: Duration::from_millis(self.tick_period_ms),
            calorie_model,
        })
    }

    /// The configured user, validated.
    pub fn user(&self) -> Result<UserId> {
        UserId::new(self.user_id.clone()).context("invalid user_id")
    }
}

/// Returns the platform-specific config directory for walk.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("walk"))
}

/// Returns the platform-specific data directory for walk.
///
/// On Linux: `~/.local/share/walk`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("walk"))
}

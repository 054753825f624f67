use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::LevelFilter;
use provision_core::DEFAULT_ACTIVITY_CAPACITY;
use provision_engine::{ReconnectSettings, TrackerSettings};
use serde::{Deserialize, Serialize};
use tracker_logging::{tracker_info, tracker_warn};

use super::logging::LogDestination;

pub const CONFIG_ENV: &str = "PROVISION_DASHBOARD_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "./dashboard.ron";

/// Dashboard settings, read from a RON file. Every field has a default, so a
/// partial file (or none at all) is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub log: LogConfig,
    pub tracker: TrackerConfig,
    pub reconnect: ReconnectConfig,
    /// Age limit for the "recent activity" section of the summary.
    pub activity_window_secs: u64,
    pub activity_rows: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            tracker: TrackerConfig::default(),
            reconnect: ReconnectConfig::default(),
            activity_window_secs: 600,
            activity_rows: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub destination: LogDestination,
    pub level: String,
    pub file: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            destination: LogDestination::File,
            level: "info".to_string(),
            file: PathBuf::from("./dashboard.log"),
        }
    }
}

impl LogConfig {
    pub fn level_filter(&self) -> LevelFilter {
        tracker_logging::parse_level(&self.level).unwrap_or(LevelFilter::Info)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub pending_window_ms: u64,
    pub pending_capacity: usize,
    pub activity_capacity: usize,
    pub removed_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            pending_window_ms: 5_000,
            pending_capacity: 256,
            activity_capacity: DEFAULT_ACTIVITY_CAPACITY,
            removed_capacity: 1024,
        }
    }
}

impl From<&TrackerConfig> for TrackerSettings {
    fn from(config: &TrackerConfig) -> Self {
        Self {
            pending_window: Duration::from_millis(config.pending_window_ms),
            pending_capacity: config.pending_capacity,
            activity_capacity: config.activity_capacity,
            removed_capacity: config.removed_capacity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 250,
            max_backoff_ms: 10_000,
            max_attempts: None,
        }
    }
}

impl From<&ReconnectConfig> for ReconnectSettings {
    fn from(config: &ReconnectConfig) -> Self {
        Self {
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            max_attempts: config.max_attempts,
        }
    }
}

impl DashboardConfig {
    pub fn activity_window(&self) -> Duration {
        Duration::from_secs(self.activity_window_secs)
    }
}

/// Config path from `PROVISION_DASHBOARD_CONFIG`, or `./dashboard.ron`.
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Reads the config at `path`. A missing file yields defaults; an unreadable
/// or unparsable one is reported and also yields defaults.
///
/// Runs before the logger exists, so problems are returned as messages for the
/// caller to log once logging is up.
pub fn load(path: &Path) -> (DashboardConfig, Option<String>) {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return (DashboardConfig::default(), None);
        }
        Err(err) => {
            return (
                DashboardConfig::default(),
                Some(format!("Failed to read config from {:?}: {}", path, err)),
            );
        }
    };

    match ron::from_str(&content) {
        Ok(config) => (config, None),
        Err(err) => (
            DashboardConfig::default(),
            Some(format!("Failed to parse config from {:?}: {}", path, err)),
        ),
    }
}

/// Logs the outcome of [`load`].
pub fn report(path: &Path, problem: Option<&str>) {
    match problem {
        Some(problem) => tracker_warn!("{}; using defaults", problem),
        None => tracker_info!("Dashboard config resolved from {:?}", path),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let config: DashboardConfig = ron::from_str(
            "(log: (destination: Both, level: \"debug\"), reconnect: (max_attempts: Some(3)))",
        )
        .unwrap();

        assert_eq!(config.log.destination, LogDestination::Both);
        assert_eq!(config.log.level_filter(), LevelFilter::Debug);
        assert_eq!(config.log.file, PathBuf::from("./dashboard.log"));
        assert_eq!(config.tracker, TrackerConfig::default());
        assert_eq!(config.reconnect.max_attempts, Some(3));
        assert_eq!(config.reconnect.initial_backoff_ms, 250);
    }

    #[test]
    fn unknown_level_falls_back_to_info() {
        let config = LogConfig {
            level: "chatty".to_string(),
            ..LogConfig::default()
        };
        assert_eq!(config.level_filter(), LevelFilter::Info);
    }

    #[test]
    fn converts_into_engine_settings() {
        let config = DashboardConfig::default();
        assert_eq!(TrackerSettings::from(&config.tracker), TrackerSettings::default());
        assert_eq!(
            ReconnectSettings::from(&config.reconnect),
            ReconnectSettings::default()
        );
    }
}

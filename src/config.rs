//! Configuration module for wxwatch.
//!
//! Process settings come from environment variables with sensible defaults
//! (command line flags override them). Stations and alert rules are read
//! from JSON files.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::alert::{AlertRule, RuleDefinition};

/// Configuration errors. Any of these aborts the process before a single
/// rule is evaluated.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid JSON in {origin}: {source}")]
    Json {
        origin: String,
        source: serde_json::Error,
    },
    #[error("duplicate alert name '{0}'")]
    DuplicateRule(String),
}

/// Process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Station file (default: "/etc/wxwatch/stations.json")
    pub stations_path: PathBuf,
    /// Alert rule file (default: "alerts.json")
    pub rules_path: PathBuf,
    /// Webhook receiving fired alerts, if any
    pub webhook_url: Option<String>,
    /// Webhook request timeout (default: 10s)
    pub webhook_timeout: Duration,
    /// Repeat passes on this interval instead of running once
    pub watch_interval: Option<Duration>,
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            stations_path: PathBuf::from("/etc/wxwatch/stations.json"),
            rules_path: PathBuf::from("alerts.json"),
            webhook_url: None,
            webhook_timeout: Duration::from_secs(10),
            watch_interval: None,
            debug: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `WXWATCH_STATIONS`: station file path
    /// - `WXWATCH_RULES`: alert rule file path
    /// - `WXWATCH_WEBHOOK_URL`: webhook URL
    /// - `WXWATCH_WEBHOOK_TIMEOUT`: webhook timeout in seconds
    /// - `WXWATCH_WATCH`: pass interval in seconds (0 runs once)
    /// - `WXWATCH_DEBUG`: `1` or `true` enables debug logging
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(path) = env::var("WXWATCH_STATIONS") {
            cfg.stations_path = PathBuf::from(path);
        }

        if let Ok(path) = env::var("WXWATCH_RULES") {
            cfg.rules_path = PathBuf::from(path);
        }

        if let Ok(url) = env::var("WXWATCH_WEBHOOK_URL") {
            if !url.trim().is_empty() {
                cfg.webhook_url = Some(url);
            }
        }

        if let Ok(secs) = env::var("WXWATCH_WEBHOOK_TIMEOUT") {
            if let Ok(secs) = secs.parse() {
                cfg.webhook_timeout = Duration::from_secs(secs);
            }
        }

        if let Ok(secs) = env::var("WXWATCH_WATCH") {
            if let Ok(secs) = secs.parse::<u64>() {
                cfg.watch_interval = (secs > 0).then(|| Duration::from_secs(secs));
            }
        }

        if let Ok(flag) = env::var("WXWATCH_DEBUG") {
            cfg.debug = matches!(flag.as_str(), "1" | "true" | "yes");
        }

        cfg
    }
}

/// Connection details for one station.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    /// Key used by rules; filled in from the station map.
    #[serde(skip)]
    pub key: String,
    /// SQLite database holding the station's observations and cooldowns.
    pub database: PathBuf,
    #[serde(rename = "weatherStation", default)]
    pub name: String,
}

impl StationConfig {
    pub fn new(key: impl Into<String>, database: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            database: database.into(),
            name: name.into(),
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.key
        } else {
            &self.name
        }
    }
}

pub type StationMap = BTreeMap<String, StationConfig>;

#[derive(Deserialize)]
struct StationFile {
    #[serde(rename = "dbConfigs", default)]
    db_configs: StationMap,
}

#[derive(Deserialize)]
struct RuleFile {
    #[serde(default)]
    alerts: Vec<RuleDefinition>,
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the station map.
pub fn load_stations(path: &Path) -> Result<StationMap, ConfigError> {
    parse_stations(&read(path)?, &path.display().to_string())
}

pub fn parse_stations(json: &str, origin: &str) -> Result<StationMap, ConfigError> {
    let file: StationFile = serde_json::from_str(json).map_err(|source| ConfigError::Json {
        origin: origin.to_string(),
        source,
    })?;

    let mut stations = file.db_configs;
    for (key, station) in stations.iter_mut() {
        station.key = key.clone();
    }
    Ok(stations)
}

/// Load the enabled alert rules.
pub fn load_rules(path: &Path) -> Result<Vec<AlertRule>, ConfigError> {
    parse_rules(&read(path)?, &path.display().to_string())
}

/// Parse a rule file.
///
/// Malformed JSON, missing required keys and duplicate enabled names fail
/// the whole file. Disabled rules are dropped unchecked. An enabled rule
/// with a semantic error is logged and skipped.
pub fn parse_rules(json: &str, origin: &str) -> Result<Vec<AlertRule>, ConfigError> {
    let file: RuleFile = serde_json::from_str(json).map_err(|source| ConfigError::Json {
        origin: origin.to_string(),
        source,
    })?;

    let mut seen = HashSet::new();
    let mut rules = Vec::new();

    for def in file.alerts.into_iter().filter(|d| d.enabled) {
        if !seen.insert(def.name.clone()) {
            return Err(ConfigError::DuplicateRule(def.name));
        }

        let name = def.name.clone();
        match AlertRule::try_from(def) {
            Ok(rule) => rules.push(rule),
            Err(e) => tracing::error!(rule = %name, "Skipping alert rule: {}", e),
        }
    }

    tracing::info!("Loaded {} enabled alert rules from {}", rules.len(), origin);
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::Condition;

    #[test]
    fn test_default_config() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.rules_path, PathBuf::from("alerts.json"));
        assert!(cfg.webhook_url.is_none());
        assert!(cfg.watch_interval.is_none());
        assert!(!cfg.debug);
    }

    #[test]
    fn test_parse_stations() {
        let json = r#"{
            "dbConfigs": {
                "db1": { "database": "/var/lib/wx/villebon.db", "weatherStation": "Villebon" },
                "db2": { "database": "/var/lib/wx/garden.db" }
            }
        }"#;
        let stations = parse_stations(json, "test").unwrap();
        assert_eq!(stations.len(), 2);
        assert_eq!(stations["db1"].key, "db1");
        assert_eq!(stations["db1"].display_name(), "Villebon");
        assert_eq!(stations["db2"].display_name(), "db2");
        assert_eq!(stations["db2"].database, PathBuf::from("/var/lib/wx/garden.db"));
    }

    #[test]
    fn test_parse_stations_rejects_garbage() {
        assert!(matches!(parse_stations("{", "test"), Err(ConfigError::Json { .. })));
        assert!(matches!(
            parse_stations(r#"{"dbConfigs": {"db1": {}}}"#, "test"),
            Err(ConfigError::Json { .. })
        ));
    }

    #[test]
    fn test_parse_rules_filters_and_skips() {
        let json = r#"{
            "alerts": [
                {
                    "name": "rain", "enabled": true, "stations": "db1",
                    "weather_field": "WC_precipTotal", "weather_unit": "mm",
                    "alert_type": "increase", "threshold": 10, "time_ago": "1h",
                    "cooldown": 120, "exclude_hours": [0, 6],
                    "recipients": ["a@example.com"], "message": "More than {threshold}mm of rain"
                },
                {
                    "name": "broken", "enabled": true, "stations": ["db1"],
                    "weather_field": "WC_temp", "alert_type": "increase",
                    "threshold": 5, "time_ago": "2w", "cooldown": 60
                },
                {
                    "name": "off", "enabled": false, "stations": ["db1"],
                    "weather_field": "nonsense", "alert_type": "nonsense",
                    "threshold": 5, "cooldown": 60
                },
                {
                    "name": "stale", "enabled": true, "stations": ["db1", "db2"],
                    "weather_field": "WC_temp", "alert_type": "no_update",
                    "threshold": 120, "cooldown": 240
                }
            ]
        }"#;

        let rules = parse_rules(json, "test").unwrap();
        let names: Vec<&str> = rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["rain", "stale"]);
        assert!(matches!(rules[0].condition, Condition::Variation { .. }));
        assert_eq!(rules[1].stations, vec!["db1", "db2"]);
    }

    #[test]
    fn test_parse_rules_missing_key_is_fatal() {
        let json = r#"{"alerts": [{"name": "x", "enabled": true}]}"#;
        assert!(matches!(parse_rules(json, "test"), Err(ConfigError::Json { .. })));
    }

    #[test]
    fn test_parse_rules_duplicate_names() {
        let rule = r#"{
            "name": "dup", "enabled": true, "stations": "db1",
            "weather_field": "WC_temp", "alert_type": "no_update",
            "threshold": 60, "cooldown": 60
        }"#;
        let json = format!(r#"{{"alerts": [{rule}, {rule}]}}"#);
        assert!(matches!(parse_rules(&json, "test"), Err(ConfigError::DuplicateRule(n)) if n == "dup"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_rules(Path::new("/nonexistent/wxwatch/alerts.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

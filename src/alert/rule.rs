//! Alert rule definitions.
//!
//! Rule files are read into loosely-typed [`RuleDefinition`]s and then
//! validated into [`AlertRule`]s, with one [`Condition`] variant per alert
//! type.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::duration::{TimeAgo, MAX_SPAN_DAYS};
use crate::db::{Exclusions, HourRange, WeatherField};

/// Semantic errors in a single rule. The offending rule is skipped; the
/// rest of the rule file still loads.
#[derive(Error, Debug)]
pub enum RuleError {
    #[error("invalid duration '{0}' (expected e.g. 30m, 2h, 1d)")]
    InvalidDuration(String),
    #[error("unsupported duration unit '{0}' (m, h, d are allowed)")]
    UnsupportedUnit(String),
    #[error("unsupported alert type '{0}'")]
    UnsupportedAlertType(String),
    #[error("unknown weather field '{0}'")]
    UnknownField(String),
    #[error("invalid threshold {0}")]
    InvalidThreshold(f64),
    #[error("cooldown of {0} minutes is out of range")]
    InvalidCooldown(i64),
    #[error("month {0} is outside 1-12")]
    InvalidMonth(u32),
    #[error("invalid exclude_hours {0:?}")]
    InvalidHours([Option<u32>; 2]),
    #[error("no stations configured")]
    NoStations,
}

/// One station key or a list of them.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StationList {
    One(String),
    Many(Vec<String>),
}

impl StationList {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(key) => vec![key],
            Self::Many(keys) => keys,
        }
    }
}

fn default_time_ago() -> String {
    "0m".to_string()
}

/// A rule as written in the rule file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleDefinition {
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    pub stations: StationList,
    pub weather_field: String,
    #[serde(default)]
    pub weather_unit: String,
    pub alert_type: String,
    pub threshold: f64,
    #[serde(default = "default_time_ago")]
    pub time_ago: String,
    /// Minutes between two firings for the same station.
    pub cooldown: i64,
    #[serde(default)]
    pub exclude_months: Vec<u32>,
    #[serde(default)]
    pub exclude_hours: Option<[Option<u32>; 2]>,
    /// How far before `now - time_ago` a baseline sample may be taken.
    #[serde(default)]
    pub tolerance: Option<String>,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Increase,
    Decrease,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Increase => "increase",
            Self::Decrease => "decrease",
        }
    }

    /// Absolute comparison of the latest value against the threshold.
    pub fn level_reached(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Increase => value >= threshold,
            Self::Decrease => value <= threshold,
        }
    }

    /// Comparison of `last - past` against the threshold.
    pub fn variation_reached(self, variation: f64, threshold: f64) -> bool {
        match self {
            Self::Increase => variation >= threshold,
            Self::Decrease => variation <= -threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// No observation for at least `minutes`.
    NoUpdate { minutes: f64 },
    /// Latest value compared directly with the threshold.
    Threshold { direction: Direction, threshold: f64 },
    /// Latest value compared with the value `time_ago` earlier.
    Variation {
        direction: Direction,
        threshold: f64,
        time_ago: TimeAgo,
        tolerance: TimeAgo,
        exclusions: Exclusions,
    },
}

impl Condition {
    pub fn alert_type(&self) -> &'static str {
        match self {
            Self::NoUpdate { .. } => "no_update",
            Self::Threshold { direction, .. } | Self::Variation { direction, .. } => direction.as_str(),
        }
    }

    pub fn threshold(&self) -> f64 {
        match self {
            Self::NoUpdate { minutes } => *minutes,
            Self::Threshold { threshold, .. } | Self::Variation { threshold, .. } => *threshold,
        }
    }
}

/// A validated, immutable alert rule.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertRule {
    pub name: String,
    pub stations: Vec<String>,
    pub field: WeatherField,
    pub unit: String,
    pub condition: Condition,
    pub cooldown_minutes: i64,
    pub recipients: Vec<String>,
    pub message: String,
}

impl AlertRule {
    pub fn alert_type(&self) -> &'static str {
        self.condition.alert_type()
    }

    pub fn threshold(&self) -> f64 {
        self.condition.threshold()
    }

    /// The message template with `{threshold}` substituted.
    pub fn render_message(&self) -> String {
        self.message.replace("{threshold}", &format_number(self.threshold()))
    }
}

/// Minutes as a duration, rounded to the millisecond.
pub fn minutes_duration(minutes: f64) -> Duration {
    Duration::milliseconds((minutes * 60_000.0).round() as i64)
}

/// Render a number without a trailing `.0` for whole values.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn parse_exclusions(def: &RuleDefinition) -> Result<Exclusions, RuleError> {
    if let Some(month) = def.exclude_months.iter().find(|m| !(1..=12).contains(*m)) {
        return Err(RuleError::InvalidMonth(*month));
    }

    let hours = match def.exclude_hours {
        None | Some([None, None]) => None,
        Some([Some(start), Some(end)]) => Some(
            HourRange::new(start, end).ok_or(RuleError::InvalidHours([Some(start), Some(end)]))?,
        ),
        Some(partial) => return Err(RuleError::InvalidHours(partial)),
    };

    Ok(Exclusions {
        months: def.exclude_months.clone(),
        hours,
    })
}

impl TryFrom<RuleDefinition> for AlertRule {
    type Error = RuleError;

    fn try_from(def: RuleDefinition) -> Result<Self, Self::Error> {
        let field: WeatherField = def
            .weather_field
            .parse()
            .map_err(|_| RuleError::UnknownField(def.weather_field.clone()))?;

        if !def.threshold.is_finite() {
            return Err(RuleError::InvalidThreshold(def.threshold));
        }
        if !(0..=MAX_SPAN_DAYS * 24 * 60).contains(&def.cooldown) {
            return Err(RuleError::InvalidCooldown(def.cooldown));
        }

        let direction = match def.alert_type.as_str() {
            "increase" => Some(Direction::Increase),
            "decrease" => Some(Direction::Decrease),
            "no_update" => None,
            other => return Err(RuleError::UnsupportedAlertType(other.to_string())),
        };

        let condition = match direction {
            None => {
                if def.threshold < 0.0 {
                    return Err(RuleError::InvalidThreshold(def.threshold));
                }
                Condition::NoUpdate {
                    minutes: def.threshold,
                }
            }
            Some(direction) => {
                let time_ago: TimeAgo = def.time_ago.parse()?;
                let exclusions = parse_exclusions(&def)?;
                if time_ago.is_zero() {
                    Condition::Threshold {
                        direction,
                        threshold: def.threshold,
                    }
                } else {
                    if def.threshold < 0.0 {
                        return Err(RuleError::InvalidThreshold(def.threshold));
                    }
                    let tolerance = match &def.tolerance {
                        Some(s) => s.parse()?,
                        None => TimeAgo::ZERO,
                    };
                    Condition::Variation {
                        direction,
                        threshold: def.threshold,
                        time_ago,
                        tolerance,
                        exclusions,
                    }
                }
            }
        };

        let stations = def.stations.into_vec();
        if stations.is_empty() {
            return Err(RuleError::NoStations);
        }

        Ok(Self {
            name: def.name,
            stations,
            field,
            unit: def.weather_unit,
            condition,
            cooldown_minutes: def.cooldown,
            recipients: def.recipients,
            message: def.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(json: serde_json::Value) -> RuleDefinition {
        serde_json::from_value(json).unwrap()
    }

    fn base() -> serde_json::Value {
        serde_json::json!({
            "name": "temp-rise",
            "enabled": true,
            "stations": ["db1", "db2"],
            "weather_field": "WC_temp",
            "weather_unit": "°C",
            "alert_type": "increase",
            "threshold": 5,
            "time_ago": "1h",
            "cooldown": 60,
            "recipients": ["ops@example.com"],
            "message": "Temperature rose by more than {threshold}°C"
        })
    }

    #[test]
    fn test_variation_rule() {
        let mut json = base();
        json["exclude_months"] = serde_json::json!([6, 7]);
        json["exclude_hours"] = serde_json::json!([0, 6]);
        json["tolerance"] = serde_json::json!("10m");

        let rule = AlertRule::try_from(definition(json)).unwrap();
        assert_eq!(rule.field, WeatherField::Temperature);
        assert_eq!(rule.stations, vec!["db1", "db2"]);
        assert_eq!(rule.alert_type(), "increase");
        assert_eq!(rule.render_message(), "Temperature rose by more than 5°C");

        match rule.condition {
            Condition::Variation {
                direction,
                time_ago,
                tolerance,
                exclusions,
                ..
            } => {
                assert_eq!(direction, Direction::Increase);
                assert_eq!(time_ago.to_duration(), Some(Duration::hours(1)));
                assert_eq!(tolerance.to_duration(), Some(Duration::minutes(10)));
                assert_eq!(exclusions.months, vec![6, 7]);
                assert_eq!(exclusions.hours, HourRange::new(0, 6));
            }
            other => panic!("unexpected condition {other:?}"),
        }
    }

    #[test]
    fn test_zero_time_ago_is_threshold() {
        let mut json = base();
        json["time_ago"] = serde_json::json!("0m");
        json["alert_type"] = serde_json::json!("decrease");
        json["threshold"] = serde_json::json!(-5.0);

        let rule = AlertRule::try_from(definition(json)).unwrap();
        assert_eq!(
            rule.condition,
            Condition::Threshold {
                direction: Direction::Decrease,
                threshold: -5.0
            }
        );
    }

    #[test]
    fn test_no_update_and_single_station() {
        let mut json = base();
        json["alert_type"] = serde_json::json!("no_update");
        json["threshold"] = serde_json::json!(120);
        json["stations"] = serde_json::json!("db1");
        json["time_ago"] = serde_json::json!("bogus");

        let rule = AlertRule::try_from(definition(json)).unwrap();
        assert_eq!(rule.condition, Condition::NoUpdate { minutes: 120.0 });
        assert_eq!(rule.stations, vec!["db1"]);
    }

    #[test]
    fn test_semantic_errors() {
        let cases = [
            ("alert_type", serde_json::json!("sideways")),
            ("time_ago", serde_json::json!("3w")),
            ("time_ago", serde_json::json!("soon")),
            ("weather_field", serde_json::json!("WC_elev")),
            ("exclude_months", serde_json::json!([13])),
            ("exclude_hours", serde_json::json!([3, null])),
            ("exclude_hours", serde_json::json!([25, 3])),
            ("threshold", serde_json::json!(-1)),
            ("cooldown", serde_json::json!(-10)),
            ("cooldown", serde_json::json!(1_000_000_000_000_000i64)),
            ("time_ago", serde_json::json!("200000000d")),
            ("tolerance", serde_json::json!("200000000d")),
            ("stations", serde_json::json!([])),
        ];

        for (key, value) in cases {
            let mut json = base();
            json[key] = value.clone();
            let result = AlertRule::try_from(definition(json));
            assert!(result.is_err(), "{key}={value} should be rejected");
        }
    }

    #[test]
    fn test_level_rule_validates_exclusions() {
        for (key, value) in [
            ("exclude_months", serde_json::json!([13])),
            ("exclude_hours", serde_json::json!([3, null])),
        ] {
            let mut json = base();
            json["time_ago"] = serde_json::json!("0m");
            json[key] = value.clone();
            assert!(
                AlertRule::try_from(definition(json)).is_err(),
                "{key}={value} should be rejected"
            );
        }
    }

    #[test]
    fn test_no_update_cooldown_bounds() {
        let mut json = base();
        json["alert_type"] = serde_json::json!("no_update");
        json["cooldown"] = serde_json::json!(1_000_000_000_000_000i64);
        assert!(matches!(
            AlertRule::try_from(definition(json)),
            Err(RuleError::InvalidCooldown(_))
        ));
    }

    #[test]
    fn test_directions() {
        assert!(Direction::Increase.level_reached(5.0, 5.0));
        assert!(!Direction::Increase.level_reached(4.9, 5.0));
        assert!(Direction::Decrease.level_reached(5.0, 5.0));
        assert!(Direction::Decrease.variation_reached(-5.0, 5.0));
        assert!(!Direction::Decrease.variation_reached(-4.0, 5.0));
        assert!(Direction::Increase.variation_reached(6.0, 5.0));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(5.0), "5");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(-3.0), "-3");
    }
}

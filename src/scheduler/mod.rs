//! Scheduler module for running alert passes.
//!
//! A pass walks every rule in configured order and, for each rule, every
//! station in configured order. Nothing that goes wrong for one
//! (rule, station) pair stops the pass.

mod pool;
mod watch;

pub use pool::*;
pub use watch::*;

use chrono::{Local, NaiveDateTime};
use std::fmt;

use crate::alert::{AlertRule, Evaluator, Outcome};
use crate::config::StationMap;
use crate::notify::Notifier;

/// Outcome counts for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub evaluated: usize,
    pub fired: usize,
    pub cooldown: usize,
    pub no_data: usize,
    pub unmet: usize,
    pub errors: usize,
    pub unknown_stations: usize,
    pub notify_failures: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} evaluated, {} fired, {} in cooldown, {} without data, {} below threshold, {} errors, {} unknown stations, {} failed notifications",
            self.evaluated,
            self.fired,
            self.cooldown,
            self.no_data,
            self.unmet,
            self.errors,
            self.unknown_stations,
            self.notify_failures
        )
    }
}

/// Run every rule against every one of its stations at `now`.
///
/// Each fired event is registered by the evaluator and then passed to every
/// notifier, synchronously and in order.
pub fn run_alert_checks(
    rules: &[AlertRule],
    stations: &StationMap,
    provider: &mut dyn StoreProvider,
    notifiers: &[Box<dyn Notifier>],
    now: NaiveDateTime,
) -> RunSummary {
    let mut summary = RunSummary::default();

    for rule in rules {
        for station_key in &rule.stations {
            let Some(station) = stations.get(station_key) else {
                tracing::warn!(rule = %rule.name, "No database configuration found for station {}", station_key);
                summary.unknown_stations += 1;
                continue;
            };

            summary.evaluated += 1;

            let store = match provider.store_for(station) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(
                        rule = %rule.name,
                        station = %station.key,
                        "Failed to open station database: {}",
                        e
                    );
                    summary.errors += 1;
                    continue;
                }
            };

            let evaluator = Evaluator::new(store.series(), store.cooldowns());
            let event = match evaluator.evaluate(rule, station, now) {
                Ok(Outcome::Fired(event)) => event,
                Ok(Outcome::CooldownActive) => {
                    tracing::info!(
                        "{} - {} is in cooldown, no reactivation for now",
                        station.display_name(),
                        rule.name
                    );
                    summary.cooldown += 1;
                    continue;
                }
                Ok(Outcome::NoData) => {
                    tracing::info!("{} - {} - No data to evaluate", station.display_name(), rule.name);
                    summary.no_data += 1;
                    continue;
                }
                Ok(Outcome::ConditionUnmet) => {
                    tracing::info!("{} - {} - No alert triggered", station.display_name(), rule.name);
                    summary.unmet += 1;
                    continue;
                }
                Err(e) => {
                    tracing::error!(
                        rule = %rule.name,
                        station = %station.key,
                        "Alert evaluation failed: {}",
                        e
                    );
                    summary.errors += 1;
                    continue;
                }
            };

            tracing::warn!(
                "{} - {} alert: {}",
                station.display_name(),
                rule.name,
                event.reason
            );
            summary.fired += 1;

            for notifier in notifiers {
                if let Err(e) = notifier.notify(rule, &event, station) {
                    tracing::error!(
                        rule = %rule.name,
                        station = %station.key,
                        notifier = notifier.name(),
                        "Failed to deliver alert: {}",
                        e
                    );
                    summary.notify_failures += 1;
                }
            }
        }
    }

    summary
}

/// Rules, stations and notifiers for repeated passes.
pub struct AlertChecks {
    rules: Vec<AlertRule>,
    stations: StationMap,
    notifiers: Vec<Box<dyn Notifier>>,
}

impl AlertChecks {
    pub fn new(rules: Vec<AlertRule>, stations: StationMap, notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self {
            rules,
            stations,
            notifiers,
        }
    }

    /// One pass at the current local time, with freshly opened databases.
    pub fn run_now(&self) -> RunSummary {
        let now = Local::now().naive_local();
        let mut pool = StorePool::new();
        let summary = run_alert_checks(&self.rules, &self.stations, &mut pool, &self.notifiers, now);
        tracing::info!("Alert pass finished: {}", summary);
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::RuleDefinition;
    use crate::config::StationConfig;
    use crate::db::{CooldownStore, Observation, Store, WeatherField};
    use crate::notify::NotificationError;
    use crate::alert::AlertEvent;
    use chrono::{Duration, NaiveDate};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, 10)
            .unwrap()
            .and_hms_opt(14, 0, 0)
            .unwrap()
    }

    fn stale_rule(name: &str, stations: &[&str]) -> AlertRule {
        let def: RuleDefinition = serde_json::from_value(serde_json::json!({
            "name": name,
            "enabled": true,
            "stations": stations,
            "weather_field": "WC_temp",
            "alert_type": "no_update",
            "threshold": 30,
            "cooldown": 60
        }))
        .unwrap();
        AlertRule::try_from(def).unwrap()
    }

    /// Stations `s1` and `s2`, both last reporting an hour before `t0`.
    fn stations(dir: &TempDir) -> StationMap {
        let mut map = StationMap::new();
        for key in ["s1", "s2"] {
            let station = StationConfig::new(key, dir.path().join(format!("{key}.db")), key.to_uppercase());
            let store = Store::new(&station.database).unwrap();
            store
                .add_observations(&[Observation::new(key, t0() - Duration::hours(1))
                    .with(WeatherField::Temperature, 12.0)])
                .unwrap();
            map.insert(key.to_string(), station);
        }
        map
    }

    #[derive(Clone, Default)]
    struct Recorder {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Notifier for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn notify(&self, rule: &AlertRule, event: &AlertEvent, _: &StationConfig) -> Result<(), NotificationError> {
            self.seen
                .lock()
                .unwrap()
                .push(format!("{}/{}", rule.name, event.station_key));
            Ok(())
        }
    }

    struct Failing;

    impl Notifier for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn notify(&self, _: &AlertRule, _: &AlertEvent, _: &StationConfig) -> Result<(), NotificationError> {
            Err(NotificationError::Delivery("mailbox full".to_string()))
        }
    }

    #[test]
    fn test_pass_order() {
        let dir = TempDir::new().unwrap();
        let stations = stations(&dir);
        let rules = vec![stale_rule("a", &["s2", "s1"]), stale_rule("b", &["s1"])];
        let recorder = Recorder::default();
        let notifiers: Vec<Box<dyn Notifier>> = vec![Box::new(recorder.clone())];

        let summary = run_alert_checks(&rules, &stations, &mut StorePool::new(), &notifiers, t0());
        assert_eq!(summary.evaluated, 3);
        assert_eq!(summary.fired, 3);
        assert_eq!(*recorder.seen.lock().unwrap(), vec!["a/s2", "a/s1", "b/s1"]);

        // Every pair is now cooling down.
        let summary = run_alert_checks(&rules, &stations, &mut StorePool::new(), &notifiers, t0());
        assert_eq!(summary.cooldown, 3);
        assert_eq!(recorder.seen.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_unknown_station_is_skipped() {
        let dir = TempDir::new().unwrap();
        let stations = stations(&dir);
        let rules = vec![stale_rule("a", &["nowhere", "s1"])];
        let recorder = Recorder::default();
        let notifiers: Vec<Box<dyn Notifier>> = vec![Box::new(recorder.clone())];

        let summary = run_alert_checks(&rules, &stations, &mut StorePool::new(), &notifiers, t0());
        assert_eq!(summary.unknown_stations, 1);
        assert_eq!(summary.fired, 1);
        assert_eq!(*recorder.seen.lock().unwrap(), vec!["a/s1"]);
    }

    #[test]
    fn test_failed_delivery_keeps_registration() {
        let dir = TempDir::new().unwrap();
        let stations = stations(&dir);
        let rules = vec![stale_rule("a", &["s1"])];
        let recorder = Recorder::default();
        let notifiers: Vec<Box<dyn Notifier>> = vec![Box::new(Failing), Box::new(recorder.clone())];

        let summary = run_alert_checks(&rules, &stations, &mut StorePool::new(), &notifiers, t0());
        assert_eq!(summary.fired, 1);
        assert_eq!(summary.notify_failures, 1);
        assert_eq!(recorder.seen.lock().unwrap().len(), 1);

        let store = Store::new(&stations["s1"].database).unwrap();
        assert!(store.cooldown_record("a", "s1").unwrap().is_some());
    }

    #[test]
    fn test_unevaluable_rule_does_not_stop_the_pass() {
        use crate::alert::{Condition, TimeAgo, TimeUnit};

        let dir = TempDir::new().unwrap();
        let stations = stations(&dir);
        let def: RuleDefinition = serde_json::from_value(serde_json::json!({
            "name": "rise",
            "enabled": true,
            "stations": ["s1"],
            "weather_field": "WC_temp",
            "alert_type": "increase",
            "threshold": 5,
            "time_ago": "1h",
            "cooldown": 60
        }))
        .unwrap();
        let mut broken = AlertRule::try_from(def).unwrap();
        if let Condition::Variation { time_ago, .. } = &mut broken.condition {
            *time_ago = TimeAgo {
                magnitude: u32::MAX,
                unit: TimeUnit::Days,
            };
        }
        let rules = vec![broken, stale_rule("b", &["s1", "s2"])];
        let recorder = Recorder::default();
        let notifiers: Vec<Box<dyn Notifier>> = vec![Box::new(recorder.clone())];

        let summary = run_alert_checks(&rules, &stations, &mut StorePool::new(), &notifiers, t0());
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.fired, 2);
        assert_eq!(*recorder.seen.lock().unwrap(), vec!["b/s1", "b/s2"]);
    }

    #[test]
    fn test_unopenable_database_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mut stations = stations(&dir);
        stations.insert(
            "s3".to_string(),
            StationConfig::new("s3", dir.path().join("missing/s3.db"), "S3"),
        );
        let rules = vec![stale_rule("a", &["s3", "s1"])];

        let summary = run_alert_checks(&rules, &stations, &mut StorePool::new(), &[], t0());
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.fired, 1);
    }
}

//! Structured filters for observation queries.
//!
//! A [`Filter`] is a list of [`Predicate`]s joined with `AND`. It renders to
//! a SQL `WHERE` fragment with positional parameters, and the same filter
//! can be evaluated in memory against an [`Observation`], so filter
//! combinations can be tested without a database.

use chrono::{Datelike, Duration, NaiveDateTime, Timelike};
use rusqlite::types::Value;

use super::models::{Observation, WeatherField};
use super::store::format_db_time;

const HOUR_EXPR: &str = "CAST(strftime('%H', time) AS INTEGER)";
const MONTH_EXPR: &str = "CAST(strftime('%m', time) AS INTEGER)";

/// Half-open hour-of-day range `[start, end)`.
///
/// When `start > end` the range wraps past midnight (`[22, 6)` covers
/// 22:00-05:59). `start == end` covers no hour at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HourRange {
    start: u32,
    end: u32,
}

impl HourRange {
    /// Returns `None` unless `start` is 0-23 and `end` is 0-24.
    pub fn new(start: u32, end: u32) -> Option<Self> {
        if start > 23 || end > 24 {
            return None;
        }
        Some(Self { start, end })
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn contains(&self, hour: u32) -> bool {
        if self.start <= self.end {
            hour >= self.start && hour < self.end
        } else {
            hour >= self.start || hour < self.end
        }
    }
}

/// Records ignored when searching for a historical baseline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Exclusions {
    /// Month numbers, 1-12.
    pub months: Vec<u32>,
    pub hours: Option<HourRange>,
}

impl Exclusions {
    pub fn is_empty(&self) -> bool {
        self.months.is_empty() && self.hours.is_none()
    }

    pub fn excludes(&self, time: NaiveDateTime) -> bool {
        self.months.contains(&time.month()) || self.hours.is_some_and(|h| h.contains(time.hour()))
    }
}

/// A single condition on an observation row.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Station(String),
    /// `time >= t`
    TimeAtLeast(NaiveDateTime),
    /// `time <= t`
    TimeAtMost(NaiveDateTime),
    /// `time > t`
    TimeAfter(NaiveDateTime),
    NotNull(WeatherField),
    HourOutside(HourRange),
    MonthNotIn(Vec<u32>),
}

impl Predicate {
    fn render(&self, params: &mut Vec<Value>) -> String {
        match self {
            Self::Station(key) => {
                params.push(Value::Text(key.clone()));
                "station_key = ?".to_string()
            }
            Self::TimeAtLeast(t) => {
                params.push(Value::Text(format_db_time(*t)));
                "time >= ?".to_string()
            }
            Self::TimeAtMost(t) => {
                params.push(Value::Text(format_db_time(*t)));
                "time <= ?".to_string()
            }
            Self::TimeAfter(t) => {
                params.push(Value::Text(format_db_time(*t)));
                "time > ?".to_string()
            }
            Self::NotNull(field) => format!("{} IS NOT NULL", field.column()),
            Self::HourOutside(range) => {
                params.push(Value::Integer(range.start as i64));
                params.push(Value::Integer(range.end as i64));
                if range.start <= range.end {
                    format!("NOT ({HOUR_EXPR} >= ? AND {HOUR_EXPR} < ?)")
                } else {
                    format!("NOT ({HOUR_EXPR} >= ? OR {HOUR_EXPR} < ?)")
                }
            }
            Self::MonthNotIn(months) => {
                if months.is_empty() {
                    return "1 = 1".to_string();
                }
                params.extend(months.iter().map(|m| Value::Integer(*m as i64)));
                let placeholders = vec!["?"; months.len()].join(", ");
                format!("{MONTH_EXPR} NOT IN ({placeholders})")
            }
        }
    }

    pub fn matches(&self, obs: &Observation) -> bool {
        match self {
            Self::Station(key) => obs.station_key == *key,
            Self::TimeAtLeast(t) => obs.time >= *t,
            Self::TimeAtMost(t) => obs.time <= *t,
            Self::TimeAfter(t) => obs.time > *t,
            Self::NotNull(field) => obs.value(*field).is_some(),
            Self::HourOutside(range) => !range.contains(obs.time.hour()),
            Self::MonthNotIn(months) => !months.contains(&obs.time.month()),
        }
    }
}

/// Predicates combined with `AND`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    predicates: Vec<Predicate>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Adds the hour and month exclusions, skipping empty ones.
    pub fn excluding(mut self, exclusions: &Exclusions) -> Self {
        if exclusions.is_empty() {
            return self;
        }
        if let Some(hours) = exclusions.hours {
            self.predicates.push(Predicate::HourOutside(hours));
        }
        if !exclusions.months.is_empty() {
            self.predicates.push(Predicate::MonthNotIn(exclusions.months.clone()));
        }
        self
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Render as a `WHERE` body and its positional parameters.
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        if self.predicates.is_empty() {
            return ("1 = 1".to_string(), params);
        }
        let clauses: Vec<String> = self
            .predicates
            .iter()
            .map(|p| p.render(&mut params))
            .collect();
        (clauses.join(" AND "), params)
    }

    pub fn matches(&self, obs: &Observation) -> bool {
        self.predicates.iter().all(|p| p.matches(obs))
    }
}

/// Search for the observation closest to `target`.
///
/// Two candidates are considered: the latest one in
/// `[target - tolerance, target]` and the earliest one in `(target, now]`.
/// Both must carry a value for `field` and pass the exclusions. With a zero
/// tolerance the baseline is, in practice, the earliest sample after `target`.
#[derive(Debug, Clone)]
pub struct NearestQuery<'a> {
    pub station_key: &'a str,
    pub field: WeatherField,
    pub target: NaiveDateTime,
    pub now: NaiveDateTime,
    pub tolerance: Duration,
    pub exclusions: &'a Exclusions,
}

impl NearestQuery<'_> {
    pub fn before_filter(&self) -> Filter {
        Filter::new()
            .and(Predicate::Station(self.station_key.to_string()))
            .and(Predicate::NotNull(self.field))
            .and(Predicate::TimeAtLeast(
                self.target
                    .checked_sub_signed(self.tolerance)
                    .unwrap_or(NaiveDateTime::MIN),
            ))
            .and(Predicate::TimeAtMost(self.target))
            .excluding(self.exclusions)
    }

    pub fn after_filter(&self) -> Filter {
        Filter::new()
            .and(Predicate::Station(self.station_key.to_string()))
            .and(Predicate::NotNull(self.field))
            .and(Predicate::TimeAfter(self.target))
            .and(Predicate::TimeAtMost(self.now))
            .excluding(self.exclusions)
    }
}

/// Pick whichever candidate is closer to `target`. An exact tie goes to
/// the candidate before the target.
pub fn pick_nearest(
    target: NaiveDateTime,
    before: Option<Observation>,
    after: Option<Observation>,
) -> Option<Observation> {
    match (before, after) {
        (Some(b), Some(a)) => {
            let before_gap = (target - b.time).num_milliseconds().abs();
            let after_gap = (a.time - target).num_milliseconds().abs();
            if after_gap < before_gap {
                Some(a)
            } else {
                Some(b)
            }
        }
        (b, a) => b.or(a),
    }
}

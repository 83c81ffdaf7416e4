//! Per (rule, station) alert evaluation.

use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;

use super::registry::AlertRegistry;
use super::rule::{format_number, minutes_duration, AlertRule, Condition, RuleError};
use crate::config::StationConfig;
use crate::db::{CooldownStore, DbError, NearestQuery, TimeSeriesStore};

/// What caused an alert to fire.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    Stale {
        last_time: NaiveDateTime,
        age_minutes: i64,
    },
    Threshold {
        last_time: NaiveDateTime,
        last_value: f64,
    },
    Variation {
        last_time: NaiveDateTime,
        last_value: f64,
        past_time: NaiveDateTime,
        past_value: f64,
        variation: f64,
    },
}

impl Trigger {
    pub fn last_time(&self) -> NaiveDateTime {
        match self {
            Self::Stale { last_time, .. }
            | Self::Threshold { last_time, .. }
            | Self::Variation { last_time, .. } => *last_time,
        }
    }

    pub fn last_value(&self) -> Option<f64> {
        match self {
            Self::Stale { .. } => None,
            Self::Threshold { last_value, .. } | Self::Variation { last_value, .. } => {
                Some(*last_value)
            }
        }
    }
}

/// A fired alert, handed to the notifiers and then dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    pub rule_name: String,
    pub station_key: String,
    pub station_name: String,
    pub triggered_at: NaiveDateTime,
    pub trigger: Trigger,
    pub reason: String,
}

/// Errors that abandon a single evaluation.
#[derive(Error, Debug)]
pub enum EvalError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("rule cannot be evaluated: {0}")]
    Rule(#[from] RuleError),
}

/// Result of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    CooldownActive,
    NoData,
    ConditionUnmet,
    Fired(AlertEvent),
}

pub struct Evaluator<'a> {
    series: &'a dyn TimeSeriesStore,
    registry: AlertRegistry<'a>,
}

impl<'a> Evaluator<'a> {
    pub fn new(series: &'a dyn TimeSeriesStore, cooldowns: &'a dyn CooldownStore) -> Self {
        Self {
            series,
            registry: AlertRegistry::new(cooldowns),
        }
    }

    /// Evaluate `rule` for `station` at `now`.
    ///
    /// A firing is registered before it is returned. Storage errors and
    /// offsets reaching outside the calendar abort this evaluation only.
    pub fn evaluate(
        &self,
        rule: &AlertRule,
        station: &StationConfig,
        now: NaiveDateTime,
    ) -> Result<Outcome, EvalError> {
        if self
            .registry
            .is_cooldown_active(&rule.name, &station.key, rule.cooldown_minutes, now)
        {
            tracing::debug!(rule = %rule.name, station = %station.key, "Cooldown active");
            return Ok(Outcome::CooldownActive);
        }

        let Some(latest) = self.series.latest(&station.key)? else {
            tracing::debug!(rule = %rule.name, station = %station.key, "No observations");
            return Ok(Outcome::NoData);
        };
        tracing::debug!(
            rule = %rule.name,
            station = %station.key,
            time = %latest.time,
            value = ?latest.value(rule.field),
            "Latest observation"
        );

        let last_time = latest.time;
        let found = match &rule.condition {
            Condition::NoUpdate { minutes } => {
                let age = now - last_time;
                if age >= minutes_duration(*minutes) {
                    Some((
                        Trigger::Stale {
                            last_time,
                            age_minutes: age.num_minutes(),
                        },
                        format!(
                            "No data update in the last {} minutes (last observation at {})",
                            format_number(*minutes),
                            last_time
                        ),
                    ))
                } else {
                    None
                }
            }
            Condition::Threshold {
                direction,
                threshold,
            } => {
                let Some(last_value) = latest.value(rule.field) else {
                    return Ok(Outcome::NoData);
                };
                direction.level_reached(last_value, *threshold).then(|| {
                    (
                        Trigger::Threshold {
                            last_time,
                            last_value,
                        },
                        format!(
                            "Threshold crossed: {} {} {}{}",
                            rule.field,
                            direction.as_str(),
                            format_number(*threshold),
                            rule.unit
                        ),
                    )
                })
            }
            Condition::Variation {
                direction,
                threshold,
                time_ago,
                tolerance,
                exclusions,
            } => {
                let Some(last_value) = latest.value(rule.field) else {
                    return Ok(Outcome::NoData);
                };
                let target = time_ago
                    .to_duration()
                    .and_then(|d| now.checked_sub_signed(d))
                    .ok_or_else(|| RuleError::InvalidDuration(time_ago.to_string()))?;
                let tolerance = tolerance
                    .to_duration()
                    .ok_or_else(|| RuleError::InvalidDuration(tolerance.to_string()))?;
                let query = NearestQuery {
                    station_key: &station.key,
                    field: rule.field,
                    target,
                    now,
                    tolerance,
                    exclusions,
                };
                let Some(past) = self.series.nearest(&query)? else {
                    tracing::debug!(rule = %rule.name, station = %station.key, "No baseline observation");
                    return Ok(Outcome::NoData);
                };
                let Some(past_value) = past.value(rule.field) else {
                    return Ok(Outcome::NoData);
                };

                let variation = last_value - past_value;
                tracing::debug!(
                    rule = %rule.name,
                    station = %station.key,
                    past_time = %past.time,
                    past_value,
                    variation,
                    "Baseline observation"
                );

                direction.variation_reached(variation, *threshold).then(|| {
                    (
                        Trigger::Variation {
                            last_time,
                            last_value,
                            past_time: past.time,
                            past_value,
                            variation,
                        },
                        format!(
                            "Variation crossed: {} {} of {}{} in the last {}",
                            rule.field,
                            direction.as_str(),
                            format_number(*threshold),
                            rule.unit,
                            time_ago
                        ),
                    )
                })
            }
        };

        let Some((trigger, reason)) = found else {
            return Ok(Outcome::ConditionUnmet);
        };

        self.registry
            .register_alert(&rule.name, &station.key, rule.cooldown_minutes, now)?;

        Ok(Outcome::Fired(AlertEvent {
            rule_name: rule.name.clone(),
            station_key: station.key.clone(),
            station_name: station.display_name().to_string(),
            triggered_at: now,
            trigger,
            reason,
        }))
    }
}

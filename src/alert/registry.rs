//! Persistent alert cooldowns.

use chrono::{Duration, NaiveDateTime};

use crate::db::{CooldownStore, DbError};

/// Cooldown bookkeeping for `(alert_name, station_key)` pairs.
///
/// The backing table is the only record of past firings; nothing is cached
/// between passes.
pub struct AlertRegistry<'a> {
    store: &'a dyn CooldownStore,
}

impl<'a> AlertRegistry<'a> {
    pub fn new(store: &'a dyn CooldownStore) -> Self {
        Self { store }
    }

    /// True if the alert fired for this station less than
    /// `cooldown_minutes` before `now`.
    ///
    /// A storage error is logged and reported as "no cooldown": an alert
    /// that fires twice is preferred over one that never fires.
    pub fn is_cooldown_active(
        &self,
        alert_name: &str,
        station_key: &str,
        cooldown_minutes: i64,
        now: NaiveDateTime,
    ) -> bool {
        match self.store.cooldown_record(alert_name, station_key) {
            // A cooldown too long to represent never expires.
            Ok(Some(record)) => Duration::try_minutes(cooldown_minutes)
                .map_or(true, |cooldown| now - record.last_sent < cooldown),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(
                    alert = alert_name,
                    station = station_key,
                    "Cooldown lookup failed, treating as inactive: {}",
                    e
                );
                false
            }
        }
    }

    /// Record a firing at `now`, replacing any previous record for the pair.
    pub fn register_alert(
        &self,
        alert_name: &str,
        station_key: &str,
        cooldown_minutes: i64,
        now: NaiveDateTime,
    ) -> Result<(), DbError> {
        self.store
            .upsert_cooldown(alert_name, station_key, cooldown_minutes, now)?;
        tracing::info!(
            alert = alert_name,
            station = station_key,
            cooldown_minutes,
            "Alert registered"
        );
        Ok(())
    }
}

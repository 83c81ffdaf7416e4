//! SQLite database store implementation.

use chrono::{NaiveDateTime, Timelike};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use super::models::*;
use super::query::{pick_nearest, Filter, NearestQuery, Predicate};

const DB_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("database connection lock poisoned")]
    LockPoisoned,
}

/// Read access to station observations.
pub trait TimeSeriesStore {
    /// Most recent observation for the station, if any.
    fn latest(&self, station_key: &str) -> Result<Option<Observation>, DbError>;

    /// Observation closest to `query.target`, see [`NearestQuery`].
    fn nearest(&self, query: &NearestQuery<'_>) -> Result<Option<Observation>, DbError>;
}

/// Persistence for alert cooldowns.
pub trait CooldownStore {
    fn cooldown_record(
        &self,
        alert_name: &str,
        station_key: &str,
    ) -> Result<Option<CooldownRecord>, DbError>;

    /// Insert the record, or update `last_sent` and `cooldown_minutes` of the
    /// existing one.
    fn upsert_cooldown(
        &self,
        alert_name: &str,
        station_key: &str,
        cooldown_minutes: i64,
        sent_at: NaiveDateTime,
    ) -> Result<(), DbError>;
}

/// Everything the evaluator needs from one station's database.
pub trait StationStore: TimeSeriesStore + CooldownStore {
    fn series(&self) -> &dyn TimeSeriesStore;
    fn cooldowns(&self) -> &dyn CooldownStore;
}

impl<T: TimeSeriesStore + CooldownStore> StationStore for T {
    fn series(&self) -> &dyn TimeSeriesStore {
        self
    }

    fn cooldowns(&self) -> &dyn CooldownStore {
        self
    }
}

/// Thread-safe database store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Initialize the database with migrations.
    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn()?;
        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| DbError::Migration(format!("Migration 1 failed: {}", e)))?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    // --- Observations ---

    /// Append observations in one transaction.
    pub fn add_observations(&self, observations: &[Observation]) -> Result<(), DbError> {
        if observations.is_empty() {
            return Ok(());
        }

        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        {
            let columns = observation_columns();
            let placeholders = vec!["?"; WeatherField::ALL.len() + 2].join(", ");
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO weather_conditions ({columns}) VALUES ({placeholders})"
            ))?;

            for obs in observations {
                let mut values: Vec<rusqlite::types::Value> = Vec::with_capacity(15);
                values.push(obs.station_key.clone().into());
                values.push(format_db_time(obs.time).into());
                values.extend(WeatherField::ALL.iter().map(|f| obs.value(*f).into()));
                stmt.execute(params_from_iter(values))?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// First observation matching `filter` in the given order.
    fn first_observation(&self, filter: &Filter, order: &str) -> Result<Option<Observation>, DbError> {
        let (clause, values) = filter.to_sql();
        let sql = format!(
            "SELECT {} FROM weather_conditions WHERE {clause} ORDER BY {order} LIMIT 1",
            observation_columns()
        );
        tracing::trace!(%sql, "observation query");

        let conn = self.conn()?;
        let obs = conn
            .query_row(&sql, params_from_iter(values), row_to_observation)
            .optional()?;
        Ok(obs)
    }
}

impl TimeSeriesStore for Store {
    fn latest(&self, station_key: &str) -> Result<Option<Observation>, DbError> {
        let filter = Filter::new().and(Predicate::Station(station_key.to_string()));
        self.first_observation(&filter, "time DESC, id DESC")
    }

    fn nearest(&self, query: &NearestQuery<'_>) -> Result<Option<Observation>, DbError> {
        let before = self.first_observation(&query.before_filter(), "time DESC, id DESC")?;
        let after = self.first_observation(&query.after_filter(), "time ASC, id ASC")?;

        // Excluded candidates must never be selected as a baseline.
        let before = before.filter(|o| query.before_filter().matches(o));
        let after = after.filter(|o| query.after_filter().matches(o));

        Ok(pick_nearest(query.target, before, after))
    }
}

impl CooldownStore for Store {
    fn cooldown_record(
        &self,
        alert_name: &str,
        station_key: &str,
    ) -> Result<Option<CooldownRecord>, DbError> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                "SELECT alert_name, station_key, last_sent, cooldown_minutes
                 FROM weather_alerts WHERE alert_name = ?1 AND station_key = ?2",
                params![alert_name, station_key],
                |row| {
                    Ok(CooldownRecord {
                        alert_name: row.get(0)?,
                        station_key: row.get(1)?,
                        last_sent: time_column(row, 2)?,
                        cooldown_minutes: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    fn upsert_cooldown(
        &self,
        alert_name: &str,
        station_key: &str,
        cooldown_minutes: i64,
        sent_at: NaiveDateTime,
    ) -> Result<(), DbError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO weather_alerts (alert_name, station_key, last_sent, cooldown_minutes)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(alert_name, station_key) DO UPDATE SET
             last_sent=excluded.last_sent, cooldown_minutes=excluded.cooldown_minutes",
            params![alert_name, station_key, format_db_time(sent_at), cooldown_minutes],
        )?;
        Ok(())
    }
}

/// `station_key, time` followed by every reading column.
fn observation_columns() -> String {
    let mut columns = vec!["station_key", "time"];
    columns.extend(WeatherField::ALL.iter().map(|f| f.column()));
    columns.join(", ")
}

fn row_to_observation(row: &Row<'_>) -> rusqlite::Result<Observation> {
    let mut obs = Observation::new(row.get::<_, String>(0)?, time_column(row, 1)?);
    for (i, field) in WeatherField::ALL.iter().enumerate() {
        obs.set_value(*field, row.get(i + 2)?);
    }
    Ok(obs)
}

fn time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    parse_db_time(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("invalid timestamp: {raw}").into(),
        )
    })
}

/// Format a timestamp for storage. Sub-second precision is dropped so that
/// text ordering matches time ordering.
pub(crate) fn format_db_time(t: NaiveDateTime) -> String {
    t.with_nanosecond(0).unwrap_or(t).format(DB_TIME_FORMAT).to_string()
}

/// Parse a datetime string from the database.
fn parse_db_time(s: &str) -> Option<NaiveDateTime> {
    let formats = [DB_TIME_FORMAT, "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"];

    formats
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

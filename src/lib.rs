//! wxwatch - weather station alerting.
//!
//! Evaluates threshold, variation and staleness rules against station
//! observations stored in SQLite, suppresses repeats with a persistent
//! cooldown registry, and hands fired alerts to notifiers.

pub mod alert;
pub mod config;
pub mod db;
pub mod notify;
pub mod scheduler;

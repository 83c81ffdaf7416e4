//! Database module for wxwatch.
//!
//! Provides SQLite storage for station observations and alert cooldowns.

mod models;
mod query;
mod store;

pub use models::*;
pub use query::*;
pub use store::*;

//! Station database connections for one pass.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::config::StationConfig;
use crate::db::{DbError, StationStore, Store};

/// Source of station stores for a pass.
pub trait StoreProvider {
    fn store_for(&mut self, station: &StationConfig) -> Result<&dyn StationStore, DbError>;
}

/// Opens each station database on first use and keeps it for the rest of
/// the pass. Stations sharing a database file share the connection.
#[derive(Default)]
pub struct StorePool {
    opened: HashMap<PathBuf, Store>,
}

impl StorePool {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreProvider for StorePool {
    fn store_for(&mut self, station: &StationConfig) -> Result<&dyn StationStore, DbError> {
        if !self.opened.contains_key(&station.database) {
            let store = Store::new(&station.database)?;
            tracing::debug!(station = %station.key, path = %station.database.display(), "Opened station database");
            self.opened.insert(station.database.clone(), store);
        }
        Ok(&self.opened[&station.database])
    }
}

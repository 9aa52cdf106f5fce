use log::{debug, info};
use snafu::prelude::*;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, TryLockError};

use crate::config::*;

/// Where the tables come from.
///
/// Implementations read the storage (files, network, ...). They are called at
/// most once per dataset by a `DatasetRegistry`.
pub trait TableSource: Send + Sync {
    fn load(&self, id: DatasetId) -> Result<ElectionTable, BoxError>;
}

impl<F> TableSource for F
where
    F: Fn(DatasetId) -> Result<ElectionTable, BoxError> + Send + Sync,
{
    fn load(&self, id: DatasetId) -> Result<ElectionTable, BoxError> {
        self(id)
    }
}

// One slot per dataset. The slot lock is held while the dataset is read, so
// concurrent callers for the same dataset wait for a single read while the
// other datasets stay available.
type Slot = Arc<Mutex<Option<Arc<ElectionTable>>>>;

/// Loads the datasets on demand and keeps them for the lifetime of the
/// registry.
///
/// The registry can be shared between sessions. Tables are handed out as
/// `Arc`s and are never modified after loading.
pub struct DatasetRegistry {
    source: Box<dyn TableSource>,
    slots: RwLock<HashMap<DatasetId, Slot>>,
}

impl DatasetRegistry {
    pub fn new<S: TableSource + 'static>(source: S) -> DatasetRegistry {
        DatasetRegistry {
            source: Box::new(source),
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the table of a dataset, reading it from the source on the
    /// first call only.
    ///
    /// Failed loads are not cached: a later call tries the source again.
    pub fn load(&self, id: DatasetId) -> ReduceResult<Arc<ElectionTable>> {
        let slot = self.slot(id);
        let mut cached = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(table) = cached.as_ref() {
            debug!("load: dataset {} served from cache", id);
            return Ok(table.clone());
        }
        info!("load: reading dataset {}", id);
        let table = self.source.load(id).context(LoadSnafu { id })?;
        ensure!(
            table.level() == id.level(),
            LevelMismatchSnafu {
                id,
                level: table.level()
            }
        );
        info!(
            "load: dataset {}: {} records, {} columns",
            id,
            table.len(),
            table.columns().len()
        );
        let table = Arc::new(table);
        *cached = Some(table.clone());
        Ok(table)
    }

    /// Same as `load`, for an identifier given as text.
    pub fn load_named(&self, id: &str) -> ReduceResult<Arc<ElectionTable>> {
        self.load(id.parse::<DatasetId>()?)
    }

    /// Whether the dataset has been loaded. A dataset being read is not
    /// cached yet.
    pub fn is_cached(&self, id: DatasetId) -> bool {
        let slot = match self.existing_slot(id) {
            Some(slot) => slot,
            None => return false,
        };
        let res = match slot.try_lock() {
            Ok(cached) => cached.is_some(),
            Err(TryLockError::Poisoned(e)) => e.into_inner().is_some(),
            Err(TryLockError::WouldBlock) => false,
        };
        res
    }

    fn existing_slot(&self, id: DatasetId) -> Option<Slot> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    fn slot(&self, id: DatasetId) -> Slot {
        if let Some(slot) = self.existing_slot(id) {
            return slot;
        }
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id)
            .or_default()
            .clone()
    }
}

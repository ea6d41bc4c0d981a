//! In-memory record backend.

use crate::domain::{StoreError, StoredRecord};
use crate::ports::RecordBackend;
use parking_lot::RwLock;
use shared_types::Address;
use std::collections::HashMap;

/// Records held in a `HashMap`; lost on restart.
#[derive(Default)]
pub struct MemoryBackend {
    records: RwLock<HashMap<Address, StoredRecord>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordBackend for MemoryBackend {
    fn get(&self, address: &Address) -> Result<Option<StoredRecord>, StoreError> {
        Ok(self.records.read().get(address).cloned())
    }

    fn put(&self, record: &StoredRecord) -> Result<(), StoreError> {
        self.records.write().insert(record.address, record.clone());
        Ok(())
    }

    fn remove(&self, address: &Address) -> Result<bool, StoreError> {
        Ok(self.records.write().remove(address).is_some())
    }

    fn addresses(&self) -> Result<Vec<Address>, StoreError> {
        Ok(self.records.read().keys().copied().collect())
    }

    fn len(&self) -> usize {
        self.records.read().len()
    }
}

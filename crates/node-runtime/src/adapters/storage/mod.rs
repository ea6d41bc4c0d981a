//! Record backends selectable at startup.

#[cfg(feature = "rocksdb")]
mod rocksdb_backend;

#[cfg(feature = "rocksdb")]
pub use rocksdb_backend::{RocksDbBackend, RocksDbConfig};

use ks_03_metadata_store::{MemoryBackend, RecordBackend, StoreError, StoredRecord};
use shared_types::Address;

/// The metadata store is generic over one backend type; this picks one at
/// runtime.
pub enum NodeBackend {
    Memory(MemoryBackend),
    #[cfg(feature = "rocksdb")]
    RocksDb(RocksDbBackend),
}

impl NodeBackend {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            #[cfg(feature = "rocksdb")]
            Self::RocksDb(_) => "rocksdb",
        }
    }
}

impl RecordBackend for NodeBackend {
    fn get(&self, address: &Address) -> Result<Option<StoredRecord>, StoreError> {
        match self {
            Self::Memory(b) => b.get(address),
            #[cfg(feature = "rocksdb")]
            Self::RocksDb(b) => b.get(address),
        }
    }

    fn put(&self, record: &StoredRecord) -> Result<(), StoreError> {
        match self {
            Self::Memory(b) => b.put(record),
            #[cfg(feature = "rocksdb")]
            Self::RocksDb(b) => b.put(record),
        }
    }

    fn remove(&self, address: &Address) -> Result<bool, StoreError> {
        match self {
            Self::Memory(b) => b.remove(address),
            #[cfg(feature = "rocksdb")]
            Self::RocksDb(b) => b.remove(address),
        }
    }

    fn addresses(&self) -> Result<Vec<Address>, StoreError> {
        match self {
            Self::Memory(b) => b.addresses(),
            #[cfg(feature = "rocksdb")]
            Self::RocksDb(b) => b.addresses(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Memory(b) => b.len(),
            #[cfg(feature = "rocksdb")]
            Self::RocksDb(b) => b.len(),
        }
    }
}

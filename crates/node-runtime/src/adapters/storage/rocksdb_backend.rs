//! # RocksDB Record Backend
//!
//! Durable `RecordBackend` for the metadata store. One key per address (the
//! 20 raw address bytes), value is the bincode-encoded `StoredRecord`.
//!
//! ## Configuration
//!
//! - Snappy compression
//! - Bloom filters for point reads
//! - fsync on write unless opened for testing

use ks_03_metadata_store::{RecordBackend, StoreError, StoredRecord};
use rocksdb::{IteratorMode, Options, WriteOptions, DB};
use shared_types::Address;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    pub path: PathBuf,
    /// Block cache size in bytes (default: 32MB).
    pub block_cache_size: usize,
    pub sync_writes: bool,
}

impl RocksDbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 32 * 1024 * 1024,
            sync_writes: true,
        }
    }

    /// Small cache, no fsync.
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 1024 * 1024,
            sync_writes: false,
        }
    }
}

pub struct RocksDbBackend {
    db: DB,
    sync_writes: bool,
}

impl RocksDbBackend {
    pub fn open(config: RocksDbConfig) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let db = DB::open(&opts, &config.path).map_err(|e| {
            StoreError::Backend(format!(
                "failed to open RocksDB at {}: {}",
                config.path.display(),
                e
            ))
        })?;

        Ok(Self {
            db,
            sync_writes: config.sync_writes,
        })
    }

    pub fn open_default(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open(RocksDbConfig::new(path.as_ref()))
    }

    fn decode(bytes: &[u8]) -> Result<StoredRecord, StoreError> {
        bincode::deserialize(bytes)
            .map_err(|e| StoreError::Backend(format!("corrupt stored record: {}", e)))
    }
}

fn address_from_key(key: &[u8]) -> Result<Address, StoreError> {
    let bytes: [u8; 20] = key
        .try_into()
        .map_err(|_| StoreError::Backend(format!("unexpected key length {}", key.len())))?;
    Ok(Address(bytes))
}

impl RecordBackend for RocksDbBackend {
    fn get(&self, address: &Address) -> Result<Option<StoredRecord>, StoreError> {
        let value = self
            .db
            .get_pinned(address.0)
            .map_err(|e| StoreError::Backend(format!("RocksDB get failed: {}", e)))?;
        value.map(|bytes| Self::decode(&bytes)).transpose()
    }

    fn put(&self, record: &StoredRecord) -> Result<(), StoreError> {
        let value = bincode::serialize(record)
            .map_err(|e| StoreError::Backend(format!("record encoding failed: {}", e)))?;
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.sync_writes);
        self.db
            .put_opt(record.address.0, value, &write_opts)
            .map_err(|e| StoreError::Backend(format!("RocksDB put failed: {}", e)))
    }

    fn remove(&self, address: &Address) -> Result<bool, StoreError> {
        let existed = self
            .db
            .get_pinned(address.0)
            .map_err(|e| StoreError::Backend(format!("RocksDB get failed: {}", e)))?
            .is_some();
        if existed {
            self.db
                .delete(address.0)
                .map_err(|e| StoreError::Backend(format!("RocksDB delete failed: {}", e)))?;
        }
        Ok(existed)
    }

    fn addresses(&self) -> Result<Vec<Address>, StoreError> {
        let mut addresses = Vec::new();
        for item in self.db.iterator(IteratorMode::Start) {
            let (key, _) =
                item.map_err(|e| StoreError::Backend(format!("RocksDB scan failed: {}", e)))?;
            addresses.push(address_from_key(&key)?);
        }
        Ok(addresses)
    }

    fn len(&self) -> usize {
        self.db.iterator(IteratorMode::Start).filter(Result::is_ok).count()
    }
}

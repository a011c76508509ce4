//! Key-value state access.
//!
//! All marketplace state lives under four well-known keys, each holding a
//! JSON-serialized value. Components read through [`StateStore::get`] and
//! stage their writes into a [`WriteBatch`]; a public operation commits the
//! whole batch at once, so a mid-sequence failure never leaves the book,
//! ledger and pending slot out of sync.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::Db;

use crate::errors::MarketError;

pub const CUSTOMERS_KEY: &str = "customers";
pub const OFFERS_KEY: &str = "offers";
pub const TRANSACTIONS_KEY: &str = "transactions";
pub const PENDING_TRANSACTION_KEY: &str = "pendingtransaction";

/// An ordered set of puts, applied all-or-none.
#[derive(Debug, Default)]
pub struct WriteBatch {
    puts: Vec<(String, Vec<u8>)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: &str, value: Vec<u8>) {
        self.puts.push((key.to_string(), value));
    }

    pub fn put_json<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), MarketError> {
        self.puts.push((key.to_string(), serde_json::to_vec(value)?));
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.puts.is_empty()
    }

    pub fn into_puts(self) -> Vec<(String, Vec<u8>)> {
        self.puts
    }
}

pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, MarketError>;
    fn apply(&self, batch: WriteBatch) -> Result<(), MarketError>;
}

/// Deserialize the JSON value stored under `key`, or the type's default if
/// the key has never been written.
pub fn get_json<T>(store: &dyn StateStore, key: &str) -> Result<T, MarketError>
where
    T: DeserializeOwned + Default,
{
    match store.get(key)? {
        Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
        None => Ok(T::default()),
    }
}

pub struct SledStore {
    db: Db,
}

impl SledStore {
    pub fn open(path: &str) -> Result<Self, MarketError> {
        Ok(Self { db: sled::open(path)? })
    }
}

impl StateStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, MarketError> {
        Ok(self.db.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    fn apply(&self, batch: WriteBatch) -> Result<(), MarketError> {
        let mut sled_batch = sled::Batch::default();
        for (key, value) in batch.into_puts() {
            sled_batch.insert(key.as_bytes(), value);
        }
        self.db.apply_batch(sled_batch)?;
        self.db.flush()?;
        Ok(())
    }
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, MarketError> {
        let data = self.data.lock().expect("store mutex poisoned");
        Ok(data.get(key).cloned())
    }

    fn apply(&self, batch: WriteBatch) -> Result<(), MarketError> {
        let mut data = self.data.lock().expect("store mutex poisoned");
        for (key, value) in batch.into_puts() {
            data.insert(key, value);
        }
        Ok(())
    }
}

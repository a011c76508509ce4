//! Append-only journal of finalized transactions.

use crate::errors::MarketError;
use crate::models::TransactionRecord;
use crate::store::{get_json, StateStore, WriteBatch, TRANSACTIONS_KEY};

#[derive(Debug, Default)]
pub struct Journal {
    entries: Vec<TransactionRecord>,
}

impl Journal {
    pub fn load(store: &dyn StateStore) -> Result<Self, MarketError> {
        Ok(Self { entries: get_json(store, TRANSACTIONS_KEY)? })
    }

    pub fn stage(&self, batch: &mut WriteBatch) -> Result<(), MarketError> {
        batch.put_json(TRANSACTIONS_KEY, &self.entries)
    }

    pub fn entries(&self) -> &[TransactionRecord] {
        &self.entries
    }

    /// Appending is the only mutation; existing entries are never touched.
    pub fn append(&mut self, record: TransactionRecord) {
        self.entries.push(record);
    }
}

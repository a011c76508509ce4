//! Pending transaction coordinator.
//!
//! Owns the single-slot pending transaction and orchestrates the Offer Book
//! and Customer Ledger around it. The slot is either `Empty` or `Pending`;
//! `accept_offer` fills it and `complete_transaction`/`cancel_transaction`
//! finalize it into the journal and return it to empty. No second purchase
//! may begin while one is unresolved.
//!
//! Every operation reads through the store, computes in memory, and commits
//! all of its writes in one batch, so a failure at any point leaves nothing
//! half-applied.

use std::sync::Arc;

use crate::customer_ledger::{CustomerLedger, OWNER_ID};
use crate::errors::MarketError;
use crate::journal::Journal;
use crate::models::{TransactionRecord, TxStatus};
use crate::offer_book::OfferBook;
use crate::store::{get_json, StateStore, WriteBatch, PENDING_TRANSACTION_KEY};

/// The persisted pending slot: an array of zero or one transaction.
#[derive(Debug, Default)]
pub struct PendingSlot {
    slot: Option<TransactionRecord>,
}

impl PendingSlot {
    pub fn load(store: &dyn StateStore) -> Result<Self, MarketError> {
        let mut records: Vec<TransactionRecord> = get_json(store, PENDING_TRANSACTION_KEY)?;
        if records.len() > 1 {
            return Err(MarketError::Store(
                "more than one pending transaction in state".to_string(),
            ));
        }
        Ok(Self { slot: records.pop() })
    }

    pub fn stage(&self, batch: &mut WriteBatch) -> Result<(), MarketError> {
        let records: Vec<&TransactionRecord> = self.slot.iter().collect();
        batch.put_json(PENDING_TRANSACTION_KEY, &records)
    }

    pub fn is_pending(&self) -> bool {
        self.slot.is_some()
    }

    pub fn get(&self) -> Option<&TransactionRecord> {
        self.slot.as_ref()
    }

    pub fn set(&mut self, record: TransactionRecord) {
        self.slot = Some(record);
    }

    pub fn take(&mut self) -> Option<TransactionRecord> {
        self.slot.take()
    }
}

pub struct TxCoordinator {
    store: Arc<dyn StateStore>,
}

impl TxCoordinator {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Start a purchase: reserve energy cheapest-first, move funds from the
    /// buyer to the owner, and fill the pending slot.
    pub fn accept_offer(
        &self,
        buyer: &str,
        energy: i64,
    ) -> Result<TransactionRecord, MarketError> {
        let mut slot = PendingSlot::load(self.store.as_ref())?;
        if slot.is_pending() {
            return Err(MarketError::Conflict(
                "a transaction is already pending; complete or cancel it first".to_string(),
            ));
        }
        if energy <= 0 {
            return Err(MarketError::InvalidArgument(
                "energy to buy must be greater than zero".to_string(),
            ));
        }

        let buyer = buyer.to_lowercase();
        let mut ledger = CustomerLedger::load(self.store.as_ref())?;
        if !ledger.contains(&buyer) {
            return Err(MarketError::NotFound(format!("'{}' is not a valid buyer", buyer)));
        }

        let mut book = OfferBook::load(self.store.as_ref())?;
        let (offers, total_cost) = book.reserve_cheapest_first(energy)?;

        // Funds check after costing the reservation. Nothing has been written
        // yet, so a failure here leaves the persisted book untouched.
        let available = ledger.balance(&buyer).unwrap_or(0);
        if available < total_cost {
            return Err(MarketError::InsufficientFunds { available, required: total_cost });
        }

        ledger.debit(&buyer, total_cost)?;
        ledger.credit(OWNER_ID, total_cost)?;

        let record = TransactionRecord::pending(buyer.clone(), energy, total_cost, offers);
        slot.set(record.clone());

        let mut batch = WriteBatch::new();
        slot.stage(&mut batch)?;
        ledger.stage(&mut batch)?;
        book.stage(&mut batch)?;
        self.store.apply(batch)?;

        log::info!("accepted offer: buyer={} energy={} cost={}", buyer, energy, total_cost);
        Ok(record)
    }

    /// Finalize the pending transaction as completed.
    pub fn complete_transaction(&self) -> Result<TransactionRecord, MarketError> {
        let mut slot = PendingSlot::load(self.store.as_ref())?;
        let mut record = slot.take().ok_or_else(|| {
            MarketError::NotFound("no pending transaction to complete; accept an offer first".to_string())
        })?;

        record.status = TxStatus::Completed;
        record.txid = chrono::Utc::now().timestamp();

        let mut journal = Journal::load(self.store.as_ref())?;
        journal.append(record.clone());

        let mut batch = WriteBatch::new();
        journal.stage(&mut batch)?;
        slot.stage(&mut batch)?;
        self.store.apply(batch)?;

        log::info!("completed transaction {} for {}", record.txid, record.buyer);
        Ok(record)
    }

    /// Refund `units` of the pending transaction, most-expensive tiers first,
    /// and finalize it. Finalization is unconditional: even a partial refund
    /// journals the reduced record and empties the slot.
    pub fn cancel_transaction(&self, units: i64) -> Result<TransactionRecord, MarketError> {
        if units <= 0 {
            return Err(MarketError::InvalidArgument(
                "units to refund must be greater than zero".to_string(),
            ));
        }

        let mut slot = PendingSlot::load(self.store.as_ref())?;
        let mut record = slot.take().ok_or_else(|| {
            MarketError::NotFound("no pending transaction to cancel; accept an offer first".to_string())
        })?;

        if units > record.energy {
            return Err(MarketError::InvalidArgument(format!(
                "cannot refund {} units, only {} in the current transaction",
                units, record.energy
            )));
        }

        let mut book = OfferBook::load(self.store.as_ref())?;
        let released_cost = book.release_most_expensive_first(&mut record.offers, units);

        // The owner funds the refund; it may go negative here.
        let mut ledger = CustomerLedger::load(self.store.as_ref())?;
        ledger.credit(&record.buyer, released_cost)?;
        ledger.debit(OWNER_ID, released_cost)?;

        record.energy -= units;
        record.cost -= released_cost;
        record.status = TxStatus::Refunded(units);
        record.txid = chrono::Utc::now().timestamp();

        let mut journal = Journal::load(self.store.as_ref())?;
        journal.append(record.clone());

        let mut batch = WriteBatch::new();
        journal.stage(&mut batch)?;
        slot.stage(&mut batch)?;
        ledger.stage(&mut batch)?;
        book.stage(&mut batch)?;
        self.store.apply(batch)?;

        log::info!(
            "refunded {} units ({}) of transaction for {}",
            units,
            released_cost,
            record.buyer
        );
        Ok(record)
    }
}

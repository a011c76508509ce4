//! Customer balances.
//!
//! Ids are case-folded on the way in. The reserved `"owner"` account is
//! seeded at initialization and collects sale proceeds / funds refunds; it is
//! never balance-checked, so cumulative refunds in excess of proceeds drive
//! it negative. That is intentional, not clamped.

use std::collections::BTreeMap;

use crate::errors::MarketError;
use crate::store::{get_json, StateStore, WriteBatch, CUSTOMERS_KEY};

pub const OWNER_ID: &str = "owner";

#[derive(Debug, Default, PartialEq)]
pub struct CustomerLedger {
    balances: BTreeMap<String, i64>,
}

impl CustomerLedger {
    pub fn load(store: &dyn StateStore) -> Result<Self, MarketError> {
        Ok(Self { balances: get_json(store, CUSTOMERS_KEY)? })
    }

    /// Fresh ledger holding only the reserved owner account at balance 0.
    pub fn seed() -> Self {
        Self { balances: BTreeMap::from([(OWNER_ID.to_string(), 0)]) }
    }

    pub fn stage(&self, batch: &mut WriteBatch) -> Result<(), MarketError> {
        batch.put_json(CUSTOMERS_KEY, &self.balances)
    }

    pub fn balances(&self) -> &BTreeMap<String, i64> {
        &self.balances
    }

    pub fn contains(&self, id: &str) -> bool {
        self.balances.contains_key(&id.to_lowercase())
    }

    pub fn balance(&self, id: &str) -> Option<i64> {
        self.balances.get(&id.to_lowercase()).copied()
    }

    pub fn create_customer(&mut self, id: &str) -> Result<(), MarketError> {
        let id = id.to_lowercase();
        if self.balances.contains_key(&id) {
            return Err(MarketError::AlreadyExists(format!("customer '{}' already exists", id)));
        }
        self.balances.insert(id, 0);
        Ok(())
    }

    /// No overdraft check: callers pre-validate buyer funds, and the owner
    /// account is allowed to go negative.
    pub fn credit(&mut self, id: &str, amount: i64) -> Result<(), MarketError> {
        let balance = self.balance_mut(id)?;
        *balance += amount;
        Ok(())
    }

    pub fn debit(&mut self, id: &str, amount: i64) -> Result<(), MarketError> {
        let balance = self.balance_mut(id)?;
        *balance -= amount;
        Ok(())
    }

    fn balance_mut(&mut self, id: &str) -> Result<&mut i64, MarketError> {
        let id = id.to_lowercase();
        self.balances
            .get_mut(&id)
            .ok_or_else(|| MarketError::NotFound(format!("customer '{}' does not exist", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_contains_owner() {
        let ledger = CustomerLedger::seed();
        assert_eq!(ledger.balance(OWNER_ID), Some(0));
        assert_eq!(ledger.balances().len(), 1);
    }

    #[test]
    fn test_create_customer_case_folds() {
        let mut ledger = CustomerLedger::seed();
        ledger.create_customer("Alice").unwrap();
        assert!(ledger.contains("ALICE"));
        assert_eq!(ledger.balance("alice"), Some(0));

        let err = ledger.create_customer("aLiCe").unwrap_err();
        assert!(matches!(err, MarketError::AlreadyExists(_)));
    }

    #[test]
    fn test_owner_cannot_be_recreated() {
        let mut ledger = CustomerLedger::seed();
        assert!(matches!(ledger.create_customer("Owner"), Err(MarketError::AlreadyExists(_))));
    }

    #[test]
    fn test_credit_and_debit() {
        let mut ledger = CustomerLedger::seed();
        ledger.create_customer("alice").unwrap();
        ledger.credit("alice", 500).unwrap();
        ledger.debit("alice", 200).unwrap();
        assert_eq!(ledger.balance("alice"), Some(300));
    }

    #[test]
    fn test_unknown_customer_is_not_found() {
        let mut ledger = CustomerLedger::seed();
        assert!(matches!(ledger.credit("ghost", 10), Err(MarketError::NotFound(_))));
        assert!(matches!(ledger.debit("ghost", 10), Err(MarketError::NotFound(_))));
        assert_eq!(ledger.balance("ghost"), None);
    }

    #[test]
    fn test_owner_may_go_negative() {
        let mut ledger = CustomerLedger::seed();
        ledger.debit(OWNER_ID, 140).unwrap();
        assert_eq!(ledger.balance(OWNER_ID), Some(-140));
    }
}

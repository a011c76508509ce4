//! Tiered supply ledger with greedy matching.
//!
//! The book maps a per-unit price to the quantity for sale at that price.
//! Purchases drain tiers cheapest-first; refunds return units to the book
//! most-expensive-first, so the unrefunded remainder of a transaction always
//! reflects the cheapest energy actually kept. Tiers are kept in a
//! `BTreeMap<i64, i64>` so the ascending/descending walk is numeric order,
//! not string order.

use std::collections::BTreeMap;

use crate::errors::MarketError;
use crate::store::{get_json, StateStore, WriteBatch, OFFERS_KEY};

#[derive(Debug, Default, PartialEq)]
pub struct OfferBook {
    tiers: BTreeMap<i64, i64>,
}

impl OfferBook {
    pub fn load(store: &dyn StateStore) -> Result<Self, MarketError> {
        Ok(Self { tiers: get_json(store, OFFERS_KEY)? })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Queue the book's current state into the batch.
    pub fn stage(&self, batch: &mut WriteBatch) -> Result<(), MarketError> {
        batch.put_json(OFFERS_KEY, &self.tiers)
    }

    pub fn tiers(&self) -> &BTreeMap<i64, i64> {
        &self.tiers
    }

    /// Merge `qty` units into the tier at `price`, creating it if absent.
    pub fn add_supply(&mut self, price: i64, qty: i64) -> Result<(), MarketError> {
        if price < 0 {
            return Err(MarketError::InvalidArgument(
                "offer price must not be negative".to_string(),
            ));
        }
        if qty <= 0 {
            return Err(MarketError::InvalidArgument(
                "quantity to add must be greater than zero".to_string(),
            ));
        }
        *self.tiers.entry(price).or_insert(0) += qty;
        Ok(())
    }

    /// Subtract `qty` units from the tier at `price`. Removing at least the
    /// whole tier is allowed: if `qty` meets or overshoots the available
    /// quantity the tier is deleted entirely, without error.
    pub fn remove_supply(&mut self, price: i64, qty: i64) -> Result<(), MarketError> {
        if qty <= 0 {
            return Err(MarketError::InvalidArgument(
                "quantity to subtract must be greater than zero".to_string(),
            ));
        }
        let available = *self
            .tiers
            .get(&price)
            .ok_or_else(|| MarketError::NotFound(format!("offer tier {} does not exist", price)))?;
        if qty >= available {
            self.tiers.remove(&price);
        } else {
            self.tiers.insert(price, available - qty);
        }
        Ok(())
    }

    pub fn total_available(&self) -> i64 {
        self.tiers.values().sum()
    }

    /// Reserve `requested` units, draining tiers in ascending price order.
    ///
    /// Fails with `InsufficientSupply` before any mutation, so the call is
    /// all-or-nothing. Returns the per-tier breakdown of the reservation and
    /// its total cost; fully drained tiers are removed from the book.
    pub fn reserve_cheapest_first(
        &mut self,
        requested: i64,
    ) -> Result<(BTreeMap<i64, i64>, i64), MarketError> {
        let available = self.total_available();
        if requested > available {
            return Err(MarketError::InsufficientSupply { available, requested });
        }

        let mut breakdown = BTreeMap::new();
        let mut total_cost = 0;
        let mut remaining = requested;

        let prices: Vec<i64> = self.tiers.keys().copied().collect();
        for price in prices {
            if remaining == 0 {
                break;
            }
            let units_at_tier = self.tiers[&price];
            let take = remaining.min(units_at_tier);
            total_cost += take * price;
            breakdown.insert(price, take);
            if take == units_at_tier {
                self.tiers.remove(&price);
            } else {
                self.tiers.insert(price, units_at_tier - take);
            }
            remaining -= take;
        }

        Ok((breakdown, total_cost))
    }

    /// Release up to `limit` units from `breakdown` back into the book,
    /// starting from the most expensive tier. Returns the released cost;
    /// `breakdown` is reduced in place to the unreleased remainder.
    ///
    /// A `limit` larger than the breakdown's total is not checked here; the
    /// coordinator bounds it to the transaction's energy before calling.
    pub fn release_most_expensive_first(
        &mut self,
        breakdown: &mut BTreeMap<i64, i64>,
        limit: i64,
    ) -> i64 {
        let mut released_cost = 0;
        let mut remaining = limit;

        let prices: Vec<i64> = breakdown.keys().rev().copied().collect();
        for price in prices {
            if remaining == 0 {
                break;
            }
            let units_held = breakdown[&price];
            let release = remaining.min(units_held);
            released_cost += release * price;
            *self.tiers.entry(price).or_insert(0) += release;
            if release == units_held {
                breakdown.remove(&price);
            } else {
                breakdown.insert(price, units_held - release);
            }
            remaining -= release;
        }

        released_cost
    }
}

//! Transaction records.
//!
//! The same record shape serves the single pending slot (status `Pending`,
//! txid 0) and the journal (terminal status, txid set at finalization).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Transaction status, serialized as a plain string: `"Pending"`,
/// `"Completed"` or `"Refunded <units>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Pending,
    Completed,
    Refunded(i64),
}

impl TxStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TxStatus::Pending)
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxStatus::Pending => write!(f, "Pending"),
            TxStatus::Completed => write!(f, "Completed"),
            TxStatus::Refunded(units) => write!(f, "Refunded {}", units),
        }
    }
}

impl FromStr for TxStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(TxStatus::Pending),
            "Completed" => Ok(TxStatus::Completed),
            _ => {
                if let Some(units) = s.strip_prefix("Refunded ") {
                    let units =
                        units.parse::<i64>().map_err(|_| format!("bad refund count in {:?}", s))?;
                    Ok(TxStatus::Refunded(units))
                } else {
                    Err(format!("unknown transaction status {:?}", s))
                }
            }
        }
    }
}

impl Serialize for TxStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TxStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// A purchase: total energy and cost plus the per-tier composition.
///
/// Invariants: `offers` unit counts sum to `energy`, and price*units over
/// `offers` sums to `cost`. `txid` is 0 until the record is finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub txid: i64,
    pub buyer: String,
    pub energy: i64,
    pub cost: i64,
    /// Price tier -> units drawn from that tier. Keys serialize as decimal
    /// strings in JSON.
    pub offers: BTreeMap<i64, i64>,
    pub status: TxStatus,
}

impl TransactionRecord {
    pub fn pending(buyer: String, energy: i64, cost: i64, offers: BTreeMap<i64, i64>) -> Self {
        Self { txid: 0, buyer, energy, cost, offers, status: TxStatus::Pending }
    }

    /// Sum of units over the tier breakdown.
    pub fn breakdown_units(&self) -> i64 {
        self.offers.values().sum()
    }

    /// Sum of price*units over the tier breakdown.
    pub fn breakdown_cost(&self) -> i64 {
        self.offers.iter().map(|(price, units)| price * units).sum()
    }
}

//! Command dispatch.
//!
//! Named operations with string arguments are parsed into a closed set of
//! typed [`Command`] variants, then executed by [`Market`] with a total
//! match. The transport that delivers `(name, args)` pairs is external; this
//! module only assumes invocations arrive one at a time and run to
//! completion.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::coordinator::{PendingSlot, TxCoordinator};
use crate::customer_ledger::CustomerLedger;
use crate::errors::MarketError;
use crate::journal::Journal;
use crate::models::{QueryResponse, TransactionRecord, TxStatus};
use crate::offer_book::OfferBook;
use crate::store::{StateStore, WriteBatch};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Reset all marketplace state, seeding the owner account.
    Init,
    AddOfferQuantity { tier: i64, qty: i64 },
    SubtractOfferQuantity { tier: i64, qty: i64 },
    AddCustomer { id: String },
    AddCustomerFunds { id: String, amount: i64 },
    AcceptOffer { buyer: String, energy: i64 },
    CompleteTransaction,
    CancelTransaction { units: i64 },
    /// Administrative bypass: append a caller-constructed journal entry with
    /// no consistency checks against book or ledger state.
    AddTransaction { record: TransactionRecord },
    GetOffers,
    GetTotalEnergyForSale,
    GetTransactions,
    GetCustomers,
    GetCustomer { id: String },
    GetPendingTransaction,
    Read { name: String },
}

fn expect_args(args: &[String], n: usize, usage: &str) -> Result<(), MarketError> {
    if args.len() != n {
        return Err(MarketError::InvalidArgument(format!(
            "incorrect number of arguments, expecting {}: {}",
            n, usage
        )));
    }
    Ok(())
}

fn non_empty<'a>(arg: &'a str, what: &str) -> Result<&'a str, MarketError> {
    if arg.is_empty() {
        return Err(MarketError::InvalidArgument(format!("{} cannot be an empty string", what)));
    }
    Ok(arg)
}

fn parse_int(arg: &str, what: &str) -> Result<i64, MarketError> {
    non_empty(arg, what)?;
    arg.parse::<i64>()
        .map_err(|_| MarketError::InvalidArgument(format!("{} must be an integer string", what)))
}

impl Command {
    /// Parse a named operation and its string arguments. Argument count,
    /// emptiness and numeric form are checked here; range and state checks
    /// belong to the components.
    pub fn parse(name: &str, args: &[String]) -> Result<Self, MarketError> {
        match name {
            "init" => {
                expect_args(args, 0, "no arguments")?;
                Ok(Command::Init)
            }
            "addOfferQuantity" => {
                expect_args(args, 2, "offer tier, quantity to add")?;
                Ok(Command::AddOfferQuantity {
                    tier: parse_int(&args[0], "first argument (offer tier)")?,
                    qty: parse_int(&args[1], "second argument (quantity to add)")?,
                })
            }
            "subtractOfferQuantity" => {
                expect_args(args, 2, "offer tier, quantity to subtract")?;
                Ok(Command::SubtractOfferQuantity {
                    tier: parse_int(&args[0], "first argument (offer tier)")?,
                    qty: parse_int(&args[1], "second argument (quantity to subtract)")?,
                })
            }
            "addCustomer" => {
                expect_args(args, 1, "new customer ID")?;
                non_empty(&args[0], "first argument (customer ID)")?;
                Ok(Command::AddCustomer { id: args[0].clone() })
            }
            "addCustomerFunds" => {
                expect_args(args, 2, "customer ID, amount to add")?;
                non_empty(&args[0], "first argument (customer ID)")?;
                Ok(Command::AddCustomerFunds {
                    id: args[0].clone(),
                    amount: parse_int(&args[1], "second argument (funds)")?,
                })
            }
            "acceptOffer" => {
                expect_args(args, 2, "customer ID, units of energy to buy")?;
                non_empty(&args[0], "first argument (customer ID)")?;
                Ok(Command::AcceptOffer {
                    buyer: args[0].clone(),
                    energy: parse_int(&args[1], "second argument (quantity to buy)")?,
                })
            }
            "completeTransaction" => {
                expect_args(args, 0, "no arguments")?;
                Ok(Command::CompleteTransaction)
            }
            "cancelTransaction" => {
                expect_args(args, 1, "units to refund")?;
                Ok(Command::CancelTransaction {
                    units: parse_int(&args[0], "first argument (units to refund)")?,
                })
            }
            "addTransaction" => Self::parse_add_transaction(args),
            "getOffers" => {
                expect_args(args, 0, "no arguments")?;
                Ok(Command::GetOffers)
            }
            "getTotalEnergyForSale" => {
                expect_args(args, 0, "no arguments")?;
                Ok(Command::GetTotalEnergyForSale)
            }
            "getTransactions" => {
                expect_args(args, 0, "no arguments")?;
                Ok(Command::GetTransactions)
            }
            "getCustomers" => {
                expect_args(args, 0, "no arguments")?;
                Ok(Command::GetCustomers)
            }
            "getCustomer" => {
                expect_args(args, 1, "customer ID")?;
                non_empty(&args[0], "first argument (customer ID)")?;
                Ok(Command::GetCustomer { id: args[0].clone() })
            }
            "getPendingTransaction" => {
                expect_args(args, 0, "no arguments")?;
                Ok(Command::GetPendingTransaction)
            }
            "read" => {
                expect_args(args, 1, "name of variable to query")?;
                non_empty(&args[0], "first argument (variable name)")?;
                Ok(Command::Read { name: args[0].clone() })
            }
            _ => Err(MarketError::InvalidArgument(format!("unknown operation '{}'", name))),
        }
    }

    // txid, buyer, energy, cost, then (tier, units) pairs
    fn parse_add_transaction(args: &[String]) -> Result<Self, MarketError> {
        if args.len() < 6 || args.len() % 2 != 0 {
            return Err(MarketError::InvalidArgument(format!(
                "incorrect number of arguments, expecting an even number >= 6, received {}",
                args.len()
            )));
        }
        let txid = parse_int(&args[0], "first argument (txid)")?;
        let buyer = non_empty(&args[1], "second argument (buyer)")?.to_lowercase();
        let energy = parse_int(&args[2], "third argument (energy)")?;
        let cost = parse_int(&args[3], "fourth argument (cost)")?;

        let mut offers = BTreeMap::new();
        for pair in args[4..].chunks(2) {
            let tier = parse_int(&pair[0], "offer tier")?;
            let units = parse_int(&pair[1], "offer units")?;
            offers.insert(tier, units);
        }

        Ok(Command::AddTransaction {
            record: TransactionRecord { txid, buyer, energy, cost, offers, status: TxStatus::Completed },
        })
    }
}

/// Facade over all marketplace operations against one state store.
pub struct Market {
    store: Arc<dyn StateStore>,
    coordinator: TxCoordinator,
}

impl Market {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        let coordinator = TxCoordinator::new(store.clone());
        Self { store, coordinator }
    }

    /// Execute a command and wrap the outcome as `{success, data}`.
    pub fn respond(&self, cmd: Command) -> QueryResponse {
        match self.execute(cmd) {
            Ok(data) => QueryResponse::ok(data),
            Err(err) => {
                if err.is_user_error() {
                    log::warn!("operation rejected: {}", err);
                } else {
                    log::error!("operation failed: {}", err);
                }
                QueryResponse::failure(&err)
            }
        }
    }

    pub fn execute(&self, cmd: Command) -> Result<Value, MarketError> {
        match cmd {
            Command::Init => self.init(),
            Command::AddOfferQuantity { tier, qty } => self.add_offer_quantity(tier, qty),
            Command::SubtractOfferQuantity { tier, qty } => {
                self.subtract_offer_quantity(tier, qty)
            }
            Command::AddCustomer { id } => self.add_customer(&id),
            Command::AddCustomerFunds { id, amount } => self.add_customer_funds(&id, amount),
            Command::AcceptOffer { buyer, energy } => {
                let record = self.coordinator.accept_offer(&buyer, energy)?;
                Ok(serde_json::to_value(record)?)
            }
            Command::CompleteTransaction => {
                let record = self.coordinator.complete_transaction()?;
                Ok(serde_json::to_value(record)?)
            }
            Command::CancelTransaction { units } => {
                let record = self.coordinator.cancel_transaction(units)?;
                Ok(serde_json::to_value(record)?)
            }
            Command::AddTransaction { record } => self.add_transaction(record),
            Command::GetOffers => {
                let book = OfferBook::load(self.store.as_ref())?;
                Ok(serde_json::to_value(book.tiers())?)
            }
            Command::GetTotalEnergyForSale => {
                let book = OfferBook::load(self.store.as_ref())?;
                Ok(json!(book.total_available()))
            }
            Command::GetTransactions => {
                let journal = Journal::load(self.store.as_ref())?;
                Ok(serde_json::to_value(journal.entries())?)
            }
            Command::GetCustomers => {
                let ledger = CustomerLedger::load(self.store.as_ref())?;
                Ok(serde_json::to_value(ledger.balances())?)
            }
            Command::GetCustomer { id } => {
                let ledger = CustomerLedger::load(self.store.as_ref())?;
                let balance = ledger.balance(&id).ok_or_else(|| {
                    MarketError::NotFound(format!("customer '{}' does not exist", id.to_lowercase()))
                })?;
                Ok(json!(balance))
            }
            Command::GetPendingTransaction => {
                let slot = PendingSlot::load(self.store.as_ref())?;
                let records: Vec<&TransactionRecord> = slot.get().into_iter().collect();
                Ok(serde_json::to_value(records)?)
            }
            Command::Read { name } => self.read(&name),
        }
    }

    /// Reset all state. The owner account is the only customer afterwards.
    fn init(&self) -> Result<Value, MarketError> {
        let mut batch = WriteBatch::new();
        CustomerLedger::seed().stage(&mut batch)?;
        OfferBook::empty().stage(&mut batch)?;
        Journal::default().stage(&mut batch)?;
        PendingSlot::default().stage(&mut batch)?;
        self.store.apply(batch)?;
        log::info!("marketplace state initialized");
        Ok(json!("marketplace state initialized"))
    }

    fn add_offer_quantity(&self, tier: i64, qty: i64) -> Result<Value, MarketError> {
        let mut book = OfferBook::load(self.store.as_ref())?;
        book.add_supply(tier, qty)?;
        let mut batch = WriteBatch::new();
        book.stage(&mut batch)?;
        self.store.apply(batch)?;
        log::debug!("added {} units to offer tier {}", qty, tier);
        Ok(json!(format!("added {} units to offer tier {}", qty, tier)))
    }

    fn subtract_offer_quantity(&self, tier: i64, qty: i64) -> Result<Value, MarketError> {
        let mut book = OfferBook::load(self.store.as_ref())?;
        book.remove_supply(tier, qty)?;
        let mut batch = WriteBatch::new();
        book.stage(&mut batch)?;
        self.store.apply(batch)?;
        log::debug!("subtracted {} units from offer tier {}", qty, tier);
        Ok(json!(format!("subtracted {} units from offer tier {}", qty, tier)))
    }

    fn add_customer(&self, id: &str) -> Result<Value, MarketError> {
        let mut ledger = CustomerLedger::load(self.store.as_ref())?;
        ledger.create_customer(id)?;
        let mut batch = WriteBatch::new();
        ledger.stage(&mut batch)?;
        self.store.apply(batch)?;
        log::info!("added customer '{}'", id.to_lowercase());
        Ok(json!(format!("added customer '{}'", id.to_lowercase())))
    }

    fn add_customer_funds(&self, id: &str, amount: i64) -> Result<Value, MarketError> {
        if amount <= 0 {
            return Err(MarketError::InvalidArgument(
                "funds to add must be greater than zero".to_string(),
            ));
        }
        let mut ledger = CustomerLedger::load(self.store.as_ref())?;
        ledger.credit(id, amount)?;
        let mut batch = WriteBatch::new();
        ledger.stage(&mut batch)?;
        self.store.apply(batch)?;
        log::info!("added {} to '{}' balance", amount, id.to_lowercase());
        Ok(json!(format!("added {} to '{}' balance", amount, id.to_lowercase())))
    }

    // Data-seeding path: appends as-is, bypassing book and ledger.
    fn add_transaction(&self, record: TransactionRecord) -> Result<Value, MarketError> {
        let mut journal = Journal::load(self.store.as_ref())?;
        let txid = record.txid;
        journal.append(record);
        let mut batch = WriteBatch::new();
        journal.stage(&mut batch)?;
        self.store.apply(batch)?;
        log::info!("injected transaction {} into the journal", txid);
        Ok(json!(format!("injected transaction {} into the journal", txid)))
    }

    fn read(&self, name: &str) -> Result<Value, MarketError> {
        let bytes = self
            .store
            .get(name)?
            .ok_or_else(|| MarketError::NotFound(format!("variable \"{}\" does not exist", name)))?;
        // All state values are JSON; fall back to a raw string for anything else
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(value),
            Err(_) => Ok(Value::String(String::from_utf8_lossy(&bytes).into_owned())),
        }
    }
}

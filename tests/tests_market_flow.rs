use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use charge_market::dispatch::{Command, Market};
use charge_market::errors::MarketError;
use charge_market::store::SledStore;

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

fn open_market(dir: &TempDir) -> Market {
    let store = SledStore::open(dir.path().to_str().unwrap()).unwrap();
    Market::new(Arc::new(store))
}

fn run(market: &Market, name: &str, args: &[&str]) -> serde_json::Value {
    let cmd = Command::parse(name, &strings(args)).unwrap();
    market.execute(cmd).unwrap()
}

#[test]
fn test_purchase_lifecycle_end_to_end() {
    let dir = TempDir::new().unwrap();
    let market = open_market(&dir);

    run(&market, "init", &[]);
    run(&market, "addCustomer", &["alice"]);
    run(&market, "addCustomerFunds", &["alice", "500"]);
    run(&market, "addOfferQuantity", &["10", "20"]);

    let pending = run(&market, "acceptOffer", &["alice", "20"]);
    assert_eq!(pending["cost"], 200);
    assert_eq!(pending["energy"], 20);
    assert_eq!(pending["status"], "Pending");
    assert_eq!(pending["txid"], 0);

    assert_eq!(run(&market, "getCustomer", &["alice"]), json!(300));
    assert_eq!(run(&market, "getCustomer", &["owner"]), json!(200));
    assert_eq!(run(&market, "getOffers", &[]), json!({}));
    assert_eq!(run(&market, "getTotalEnergyForSale", &[]), json!(0));
    assert_eq!(run(&market, "getPendingTransaction", &[]).as_array().unwrap().len(), 1);

    let completed = run(&market, "completeTransaction", &[]);
    assert_eq!(completed["status"], "Completed");
    assert!(completed["txid"].as_i64().unwrap() > 0);

    let journal = run(&market, "getTransactions", &[]);
    assert_eq!(journal.as_array().unwrap().len(), 1);
    assert_eq!(journal[0]["status"], "Completed");
    assert_eq!(run(&market, "getPendingTransaction", &[]), json!([]));
}

#[test]
fn test_partial_refund_flow() {
    let dir = TempDir::new().unwrap();
    let market = open_market(&dir);

    run(&market, "init", &[]);
    run(&market, "addCustomer", &["bob"]);
    run(&market, "addCustomerFunds", &["bob", "500"]);
    run(&market, "addOfferQuantity", &["3", "25"]);
    run(&market, "addOfferQuantity", &["5", "25"]);

    let pending = run(&market, "acceptOffer", &["bob", "50"]);
    assert_eq!(pending["cost"], 200);
    assert_eq!(pending["offers"], json!({"3": 25, "5": 25}));

    let refunded = run(&market, "cancelTransaction", &["30"]);
    assert_eq!(refunded["status"], "Refunded 30");
    assert_eq!(refunded["energy"], 20);
    assert_eq!(refunded["cost"], 60);
    assert_eq!(refunded["offers"], json!({"3": 20}));

    // Most-expensive-first: all of tier 5 and 5 units of tier 3 returned
    assert_eq!(run(&market, "getOffers", &[]), json!({"3": 5, "5": 25}));
    assert_eq!(run(&market, "getCustomer", &["bob"]), json!(440));
    assert_eq!(run(&market, "getCustomer", &["owner"]), json!(60));

    let journal = run(&market, "getTransactions", &[]);
    assert_eq!(journal.as_array().unwrap().len(), 1);
    assert_eq!(journal[0]["status"], "Refunded 30");
    assert_eq!(run(&market, "getPendingTransaction", &[]), json!([]));
}

#[test]
fn test_second_purchase_blocked_until_resolved() {
    let dir = TempDir::new().unwrap();
    let market = open_market(&dir);

    run(&market, "init", &[]);
    run(&market, "addCustomer", &["alice"]);
    run(&market, "addCustomer", &["bob"]);
    run(&market, "addCustomerFunds", &["alice", "100"]);
    run(&market, "addCustomerFunds", &["bob", "100"]);
    run(&market, "addOfferQuantity", &["2", "40"]);

    run(&market, "acceptOffer", &["alice", "10"]);

    let cmd = Command::parse("acceptOffer", &strings(&["bob", "10"])).unwrap();
    assert!(matches!(market.execute(cmd), Err(MarketError::Conflict(_))));

    run(&market, "completeTransaction", &[]);
    let pending = run(&market, "acceptOffer", &["bob", "10"]);
    assert_eq!(pending["buyer"], "bob");
}

#[test]
fn test_state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let market = open_market(&dir);
        run(&market, "init", &[]);
        run(&market, "addCustomer", &["alice"]);
        run(&market, "addCustomerFunds", &["alice", "500"]);
        run(&market, "addOfferQuantity", &["7", "30"]);
        run(&market, "acceptOffer", &["alice", "10"]);
    }

    // A fresh handle sees the pending transaction and carries it forward
    let market = open_market(&dir);
    assert_eq!(run(&market, "getPendingTransaction", &[]).as_array().unwrap().len(), 1);
    assert_eq!(run(&market, "getCustomer", &["alice"]), json!(430));

    let completed = run(&market, "completeTransaction", &[]);
    assert_eq!(completed["status"], "Completed");
    assert_eq!(run(&market, "getTransactions", &[]).as_array().unwrap().len(), 1);
}

#[test]
fn test_funds_are_conserved_across_sale_and_refund() {
    let dir = TempDir::new().unwrap();
    let market = open_market(&dir);

    run(&market, "init", &[]);
    run(&market, "addCustomer", &["alice"]);
    run(&market, "addCustomerFunds", &["alice", "500"]);
    run(&market, "addOfferQuantity", &["4", "50"]);

    run(&market, "acceptOffer", &["alice", "25"]);
    run(&market, "completeTransaction", &[]);

    run(&market, "acceptOffer", &["alice", "25"]);
    run(&market, "cancelTransaction", &["25"]);

    // Owner keeps only the completed sale's proceeds; every refunded unit
    // moved its cost back to the buyer.
    assert_eq!(run(&market, "getCustomer", &["owner"]), json!(100));
    assert_eq!(run(&market, "getCustomer", &["alice"]), json!(400));
    assert_eq!(run(&market, "getTotalEnergyForSale", &[]), json!(25));
}

#[test]
fn test_read_exposes_raw_state() {
    let dir = TempDir::new().unwrap();
    let market = open_market(&dir);

    run(&market, "init", &[]);
    run(&market, "addOfferQuantity", &["2", "10"]);

    assert_eq!(run(&market, "read", &["offers"]), json!({"2": 10}));
    assert_eq!(run(&market, "read", &["customers"]), json!({"owner": 0}));

    let cmd = Command::parse("read", &strings(&["bogus"])).unwrap();
    assert!(matches!(market.execute(cmd), Err(MarketError::NotFound(_))));
}

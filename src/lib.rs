pub mod configure;
pub mod logger;
pub mod errors;
pub mod store;
pub mod models;
pub mod offer_book;
pub mod customer_ledger;
pub mod journal;
pub mod coordinator;
pub mod dispatch;

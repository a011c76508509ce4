use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use charge_market::configure::load_config;
use charge_market::dispatch::{Command, Market};
use charge_market::logger::setup_logger;
use charge_market::models::QueryResponse;
use charge_market::store::SledStore;

/// Single-charger energy marketplace. Runs one operation against the state
/// store and prints the wrapped JSON response.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Operation name (e.g. acceptOffer, getOffers, init)
    name: String,

    /// String arguments for the operation
    args: Vec<String>,

    /// Override the configured sled database path
    #[arg(long)]
    db_path: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config()?;
    if let Err(e) = setup_logger(&config) {
        eprintln!("Failed to set up logging: {}", e);
    }

    let db_path = args.db_path.unwrap_or(config.db_path);
    let store = Arc::new(SledStore::open(&db_path)?);
    let market = Market::new(store);

    let response = match Command::parse(&args.name, &args.args) {
        Ok(cmd) => market.respond(cmd),
        Err(err) => QueryResponse::failure(&err),
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    if !response.success {
        std::process::exit(1);
    }
    Ok(())
}

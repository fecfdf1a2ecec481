//! # Price Probe
//!
//! Diagnostic CLI that resolves USD prices for the given token addresses
//! through the full aggregation pipeline and prints the price map as JSON.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin price_probe -- 0x4200000000000000000000000000000000000006 0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913
//! cargo run --bin price_probe -- --quotes --network base 0x...
//! ```
//!
//! API keys are read from the environment (or `.env`): `BIRDEYE_API_KEY`,
//! `COINGECKO_API_KEY`, `ONEINCH_API_KEY`.

use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use token_price_sdk::{metrics, PriceAggregator, PriceCache, PriceMap, Settings, TokenAddress};

#[derive(Parser, Debug)]
#[command(name = "price_probe", about = "Resolve token USD prices from multiple sources")]
struct Args {
    /// Token contract addresses (any case)
    #[arg(required = true)]
    addresses: Vec<String>,

    /// Override the network for every provider (e.g. base, eth, arbitrum)
    #[arg(long)]
    network: Option<String>,

    /// Print which source produced each price
    #[arg(long)]
    quotes: bool,

    /// Resolve twice to show the cache hit on the second round
    #[arg(long)]
    twice: bool,
}

const CACHE_KEY: &str = "multi_price";

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    env_logger::init();
    metrics::describe_metrics();

    let args = Args::parse();

    let mut settings = Settings::new()?;
    if let Some(network) = args.network.as_deref() {
        settings.apply_overrides(|name| (name == "PRICE_SDK_NETWORK").then(|| network.to_string()));
    }

    let aggregator = PriceAggregator::from_settings(&settings);
    log::info!("Sources (priority order): {:?}", aggregator.source_ids());

    if args.quotes {
        let quotes = aggregator.resolve_quotes(&args.addresses).await;
        println!("{}", serde_json::to_string_pretty(&quotes)?);
        return Ok(());
    }

    let ttl = Duration::from_secs(settings.aggregator.cache_ttl_seconds);
    let mut cache = PriceCache::new().with_ttl(ttl);
    if let Some(path) = settings.aggregator.cache_mirror_path.as_deref() {
        cache = cache.with_mirror(path);
    }

    let rounds = if args.twice { 2 } else { 1 };
    let mut prices = PriceMap::new();
    for round in 1..=rounds {
        prices = match cache.get(CACHE_KEY) {
            Some(cached) => {
                log::info!("Round {}: served from cache", round);
                cached
            }
            None => {
                let resolved = aggregator.resolve_many(&args.addresses).await;
                cache.set(CACHE_KEY, resolved.clone());
                resolved
            }
        };
        println!("{}", serde_json::to_string_pretty(&prices)?);
    }

    let missing: Vec<&String> = args
        .addresses
        .iter()
        .filter(|a| TokenAddress::new(a).map_or(false, |t| !prices.contains_key(&t)))
        .collect();
    if !missing.is_empty() {
        eprintln!("No price currently available for: {:?}", missing);
    }

    Ok(())
}

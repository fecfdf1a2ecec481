//! # Token Price SDK
//!
//! A Rust library that resolves USD prices for token contract addresses by
//! aggregating several external price providers with strict priority
//! ordering, bounded concurrency and a short-lived cache.
//!
//! ## Overview
//!
//! Consumers (wallet sync, portfolio valuation, new-pool feeds) hand the SDK
//! a list of addresses and read back a map `address -> USD price`. The SDK
//! focuses on:
//!
//! - **Aggregation**: batch providers first, then per-address fallback chains
//! - **Fail-soft behaviour**: provider errors, timeouts and bad data become
//!   "price unknown", never an error for the caller
//! - **Caching**: a TTL cache for the last aggregated price map
//!
//! ## Architecture
//!
//! ### Source Layer
//! One adapter per provider (GeckoTerminal, Birdeye, DexScreener, DefiLlama,
//! CoinGecko, 1inch, HTML scrape), all implementing [`PriceSource`].
//!
//! ### Aggregation Layer
//! [`PriceAggregator`] runs the primary batch pass, the key-gated secondary
//! batch pass and the per-address fallback pass, merging results so that
//! earlier passes always win.
//!
//! ### Cache Layer
//! [`PriceCache`] stores one price map per key with lazy TTL expiry and an
//! optional best-effort JSON mirror.

// Core Types
/// Token addresses, quotes, price maps and conversions
pub mod types;
/// Trait for price provider adapters
pub mod price_source;

// Providers
/// Provider-specific adapters
pub mod sources;

// Aggregation & Caching
/// Priority-ordered multi-source aggregation
pub mod aggregator;
/// TTL cache for aggregated price maps
pub mod cache;
/// Bounded dedup filter for notifications
pub mod notification_dedup;

// Infrastructure
/// Metrics and observability
pub mod metrics;
/// Configuration management
pub mod settings;
/// General utilities
pub mod utils;

// Re-exports for convenience
pub use aggregator::PriceAggregator;
pub use cache::PriceCache;
pub use notification_dedup::NotificationDedup;
pub use price_source::{PriceSource, SourceError};
pub use settings::Settings;
pub use types::{PriceMap, PriceQuote, SourceId, TokenAddress};

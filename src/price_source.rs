//! # Price Source Trait
//!
//! This module defines the core abstraction for integrating external price
//! providers into the SDK. The `PriceSource` trait provides a unified
//! interface for single-address and batch price lookups across all
//! supported providers.
//!
//! ## Overview
//!
//! Every provider (GeckoTerminal, DexScreener, DefiLlama, ...) implements
//! `PriceSource`. The aggregator only ever talks to this trait, so providers
//! can be reordered, added or replaced by test doubles without touching the
//! orchestration logic.
//!
//! ## Adding a New Provider
//!
//! 1. Implement `PriceSource` for your provider (only `id()` and `fetch_one()`
//!    are required)
//! 2. Override `fetch_many()` if the provider resolves many addresses per call
//! 3. Register the source in `PriceAggregator::from_settings` or through the
//!    builder
//!
//! ## Example
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use token_price_sdk::price_source::{PriceSource, SourceError};
//! use token_price_sdk::types::{SourceId, TokenAddress};
//!
//! struct FixedSource;
//!
//! #[async_trait]
//! impl PriceSource for FixedSource {
//!     fn id(&self) -> SourceId {
//!         SourceId::Custom("fixed")
//!     }
//!
//!     async fn fetch_one(&self, _address: &TokenAddress) -> Result<f64, SourceError> {
//!         Ok(1.0)
//!     }
//! }
//! ```

use crate::types::conversions::is_valid_usd_price;
use crate::types::{PriceMap, SourceId, TokenAddress};
use async_trait::async_trait;
use futures::future::join_all;
use log::debug;

/// Why a source produced no price for an address.
///
/// None of these cross the aggregator boundary: they are logged and turned
/// into "absent". The variants exist so that "the provider has no data" and
/// "the provider failed" stay distinguishable in logs, metrics and tests.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SourceError {
    #[error("no price data")]
    NoData,
    #[error("API key not configured")]
    MissingApiKey,
    #[error("HTTP status {0}")]
    Http(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("malformed response: {0}")]
    Parse(String),
    #[error("invalid price {0}")]
    InvalidPrice(f64),
}

impl SourceError {
    /// Short label used for metrics.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            SourceError::NoData => "no_data",
            SourceError::MissingApiKey => "missing_key",
            SourceError::Http(429) => "rate_limited",
            SourceError::Http(_) => "http_error",
            SourceError::Transport(_) => "transport_error",
            SourceError::Timeout => "timeout",
            SourceError::Parse(_) => "parse_error",
            SourceError::InvalidPrice(_) => "invalid_price",
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SourceError::Timeout
        } else if let Some(status) = e.status() {
            SourceError::Http(status.as_u16())
        } else if e.is_decode() {
            SourceError::Parse(e.to_string())
        } else {
            SourceError::Transport(e.to_string())
        }
    }
}

/// The main trait for all price providers.
///
/// # Implementation Requirements
///
/// - `id()`: identify the provider (logging, metrics, provenance)
/// - `fetch_one()`: resolve one address, returning `Err` for every kind of
///   failure, never panicking
///
/// Key-gated providers report `is_enabled() == false` when no key is
/// configured and must answer `Err(SourceError::MissingApiKey)` without
/// touching the network.
///
/// # Thread Safety
///
/// Sources are shared across concurrent fallback chains and must be
/// `Send + Sync`.
#[async_trait]
pub trait PriceSource: Send + Sync {
    fn id(&self) -> SourceId;

    /// Whether the source can be queried at all (e.g. API key present).
    fn is_enabled(&self) -> bool {
        true
    }

    /// Whether `fetch_many` resolves several addresses per round trip.
    fn supports_batch(&self) -> bool {
        false
    }

    /// Most addresses sent in one provider request, if the provider caps it.
    fn max_batch_size(&self) -> Option<usize> {
        None
    }

    /// Resolves the USD price of a single token.
    async fn fetch_one(&self, address: &TokenAddress) -> Result<f64, SourceError>;

    /// Resolves many tokens at once. The result may be partial: addresses
    /// without data are simply missing.
    ///
    /// The default runs `fetch_one` concurrently for every address and keeps
    /// only valid prices. Providers with a native batch endpoint override it.
    async fn fetch_many(&self, addresses: &[TokenAddress]) -> Result<PriceMap, SourceError> {
        if !self.is_enabled() {
            return Err(SourceError::MissingApiKey);
        }

        let results = join_all(addresses.iter().map(|address| async move {
            (address, self.fetch_one(address).await)
        }))
        .await;

        let mut prices = PriceMap::with_capacity(addresses.len());
        for (address, result) in results {
            match result {
                Ok(price) if is_valid_usd_price(price) => {
                    prices.insert(address.clone(), price);
                }
                Ok(price) => {
                    debug!("{}: discarding invalid price {} for {}", self.id(), price, address)
                }
                Err(e) => debug!("{}: no price for {}: {}", self.id(), address, e),
            }
        }
        Ok(prices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EvenOnly;

    #[async_trait]
    impl PriceSource for EvenOnly {
        fn id(&self) -> SourceId {
            SourceId::Custom("even_only")
        }

        async fn fetch_one(&self, address: &TokenAddress) -> Result<f64, SourceError> {
            match address.as_str() {
                "0x2" => Ok(2.0),
                "0x4" => Ok(-4.0),
                _ => Err(SourceError::NoData),
            }
        }
    }

    #[tokio::test]
    async fn default_fetch_many_keeps_only_valid_prices() {
        let addresses: Vec<TokenAddress> = ["0x1", "0x2", "0x4"]
            .iter()
            .map(|a| TokenAddress::new(a).unwrap())
            .collect();

        let prices = EvenOnly.fetch_many(&addresses).await.unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices[&addresses[1]], 2.0);
    }

    #[test]
    fn outcome_labels_distinguish_rate_limits() {
        assert_eq!(SourceError::Http(429).outcome_label(), "rate_limited");
        assert_eq!(SourceError::Http(500).outcome_label(), "http_error");
        assert_eq!(SourceError::MissingApiKey.outcome_label(), "missing_key");
    }
}

// src/aggregator.rs

use crate::metrics;
use crate::price_source::{PriceSource, SourceError};
use crate::settings::Settings;
use crate::sources::{
    BirdeyeSource, CoinGeckoSource, DefiLlamaSource, DexScreenerSource, GeckoTerminalSource,
    HtmlScrapeSource, OneInchSource,
};
use crate::types::conversions::is_valid_usd_price;
use crate::types::{PriceMap, PriceQuote, SourceId, TokenAddress};
use crate::utils::fetch_chunked_with_timeout;
use futures::future::join_all;
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_FALLBACK_CONCURRENCY: usize = 5;
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(15); // per chunk

/// Multi-source USD price aggregator.
///
/// Resolves prices through a fixed, priority-ordered pipeline of passes:
///
/// 1. **Primary batch pass**: one batch-capable source gets the full address set
/// 2. **Secondary batch pass**: an optional (usually key-gated) batch source,
///    only for addresses the primary pass left unresolved
/// 3. **Fallback pass**: per address, the fallback sources are tried one
///    after another until one returns a valid price. Addresses are processed
///    concurrently in windows of `fallback_concurrency`
///
/// Passes run strictly one after another and each pass only sees what is
/// still missing, so a lower-priority source is never asked for an address a
/// higher-priority source already priced.
///
/// The aggregator never fails: source errors and timeouts become "absent",
/// and an address nobody could price is simply missing from the result.
/// It holds no mutable state; caching is left to the caller (see
/// `cache::PriceCache`).
///
/// ## Usage
///
/// ```rust,no_run
/// # async fn run() -> Result<(), config::ConfigError> {
/// use token_price_sdk::{PriceAggregator, Settings};
///
/// let settings = Settings::new()?;
/// let aggregator = PriceAggregator::from_settings(&settings);
/// let prices = aggregator.resolve_many(["0xAbC...", "0xdef..."]).await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PriceAggregator {
    primary_batch: Option<Arc<dyn PriceSource>>,
    secondary_batch: Option<Arc<dyn PriceSource>>,
    fallbacks: Vec<Arc<dyn PriceSource>>,
    fallback_concurrency: usize,
    call_timeout: Duration,
    batch_timeout: Duration,
}

impl Default for PriceAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceAggregator {
    /// Empty pipeline; add sources with the `with_*` methods.
    pub fn new() -> Self {
        Self {
            primary_batch: None,
            secondary_batch: None,
            fallbacks: Vec::new(),
            fallback_concurrency: DEFAULT_FALLBACK_CONCURRENCY,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
        }
    }

    /// Wires the built-in providers from configuration, in priority order:
    /// GeckoTerminal (batch) -> Birdeye (batch, key-gated) -> DexScreener ->
    /// DefiLlama -> CoinGecko -> 1inch (key-gated) -> HTML scrape.
    pub fn from_settings(settings: &Settings) -> Self {
        let chain = &settings.chain;
        let endpoints = &settings.endpoints;
        let keys = &settings.api_keys;
        let agg = &settings.aggregator;
        let request_timeout = Duration::from_millis(agg.request_timeout_ms);

        let mut aggregator = Self::new()
            .with_primary_batch(Arc::new(
                GeckoTerminalSource::new(chain.network.clone())
                    .with_base_url(&endpoints.geckoterminal)
                    .with_timeout(request_timeout)
                    .with_batch_limit(agg.batch_limit),
            ))
            .with_secondary_batch(Arc::new(
                BirdeyeSource::new(chain.birdeye_chain.clone(), keys.birdeye.clone())
                    .with_base_url(&endpoints.birdeye)
                    .with_timeout(request_timeout)
                    .with_batch_limit(agg.batch_limit),
            ))
            .with_fallback(Arc::new(
                DexScreenerSource::new(chain.dexscreener_chain.clone())
                    .with_base_url(&endpoints.dexscreener)
                    .with_timeout(request_timeout),
            ))
            .with_fallback(Arc::new(
                DefiLlamaSource::new(chain.defillama_chain.clone())
                    .with_base_url(&endpoints.defillama)
                    .with_timeout(request_timeout),
            ))
            .with_fallback(Arc::new(
                CoinGeckoSource::new(chain.coingecko_platform.clone(), keys.coingecko.clone())
                    .with_base_url(&endpoints.coingecko)
                    .with_timeout(request_timeout),
            ))
            .with_fallback(Arc::new(
                OneInchSource::new(chain.chain_id, keys.oneinch.clone())
                    .with_base_url(&endpoints.oneinch)
                    .with_timeout(request_timeout),
            ));

        if agg.enable_html_scrape {
            aggregator = aggregator.with_fallback(Arc::new(
                HtmlScrapeSource::new(chain.dexscreener_chain.clone())
                    .with_base_url(&endpoints.html_scrape)
                    .with_timeout(request_timeout),
            ));
        }

        aggregator
            .with_fallback_concurrency(agg.fallback_concurrency)
            .with_call_timeout(Duration::from_millis(agg.call_timeout_ms))
            .with_batch_timeout(Duration::from_millis(agg.batch_timeout_ms))
    }

    pub fn with_primary_batch(mut self, source: Arc<dyn PriceSource>) -> Self {
        if !source.supports_batch() {
            warn!(
                "⚠️ {} has no batch endpoint, primary pass uses per-address calls",
                source.id()
            );
        }
        self.primary_batch = Some(source);
        self
    }

    pub fn with_secondary_batch(mut self, source: Arc<dyn PriceSource>) -> Self {
        self.secondary_batch = Some(source);
        self
    }

    /// Appends a fallback source; call order defines priority.
    pub fn with_fallback(mut self, source: Arc<dyn PriceSource>) -> Self {
        self.fallbacks.push(source);
        self
    }

    pub fn with_fallback_concurrency(mut self, concurrency: usize) -> Self {
        self.fallback_concurrency = concurrency.max(1);
        self
    }

    /// Upper bound for a single-address source call.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Upper bound for one batch request (a single chunk of at most
    /// `max_batch_size` addresses). A chunk that runs over only loses its
    /// own addresses to the fallback pass.
    pub fn with_batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = timeout;
        self
    }

    /// Sources in the order they are consulted.
    pub fn source_ids(&self) -> Vec<SourceId> {
        self.primary_batch
            .iter()
            .chain(self.secondary_batch.iter())
            .chain(self.fallbacks.iter())
            .map(|s| s.id())
            .collect()
    }

    /// Resolves USD prices for `addresses` (any case). Output keys are
    /// canonical lowercase; addresses without a price are absent.
    pub async fn resolve_many<I, S>(&self, addresses: I) -> PriceMap
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.resolve_quotes(addresses)
            .await
            .into_iter()
            .map(|q| (q.address, q.usd))
            .collect()
    }

    /// Convenience single-address lookup through the same pipeline.
    pub async fn resolve_one(&self, address: &str) -> Option<f64> {
        let canonical = TokenAddress::new(address).ok()?;
        self.resolve_many([address]).await.remove(&canonical)
    }

    /// Same as `resolve_many`, keeping which source priced each address.
    pub async fn resolve_quotes<I, S>(&self, addresses: I) -> Vec<PriceQuote>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let requested = canonicalize(addresses);
        if requested.is_empty() {
            return Vec::new();
        }

        let start = Instant::now();
        let mut resolved: HashMap<TokenAddress, PriceQuote> =
            HashMap::with_capacity(requested.len());

        // Pass 1: primary batch
        if let Some(source) = &self.primary_batch {
            let quotes = self.call_batch(source.as_ref(), &requested).await;
            merge(&mut resolved, quotes);
            debug!(
                "Primary batch pass ({}): {}/{} resolved",
                source.id(),
                resolved.len(),
                requested.len()
            );
        }

        // Pass 2: secondary batch, only for what is still missing
        if let Some(source) = &self.secondary_batch {
            let missing = still_missing(&requested, &resolved);
            if !missing.is_empty() && source.is_enabled() {
                let quotes = self.call_batch(source.as_ref(), &missing).await;
                merge(&mut resolved, quotes);
                debug!(
                    "Secondary batch pass ({}): {}/{} resolved",
                    source.id(),
                    resolved.len(),
                    requested.len()
                );
            }
        }

        // Pass 3: per-address fallback chains in bounded windows
        let missing = still_missing(&requested, &resolved);
        if !missing.is_empty() && !self.fallbacks.is_empty() {
            for window in missing.chunks(self.fallback_concurrency) {
                let quotes =
                    join_all(window.iter().map(|address| self.resolve_with_fallbacks(address)))
                        .await;
                merge(&mut resolved, quotes.into_iter().flatten());
            }
            debug!("Fallback pass: {}/{} resolved", resolved.len(), requested.len());
        }

        let missing_count = requested.len() - resolved.len();
        metrics::record_resolve(start.elapsed(), missing_count);
        if resolved.is_empty() {
            warn!(
                "⚠️ No prices resolved for {} addresses (all sources failed)",
                requested.len()
            );
        } else {
            info!(
                "📊 Resolved {}/{} prices in {:?} ({} missing)",
                resolved.len(),
                requested.len(),
                start.elapsed(),
                missing_count
            );
        }

        // Keep the caller's (deduplicated) order
        requested
            .into_iter()
            .filter_map(|address| resolved.remove(&address))
            .collect()
    }

    async fn resolve_with_fallbacks(&self, address: &TokenAddress) -> Option<PriceQuote> {
        for source in &self.fallbacks {
            if !source.is_enabled() {
                continue;
            }
            if let Some(quote) = self.call_one(source.as_ref(), address).await {
                return Some(quote);
            }
        }
        None
    }

    async fn call_one(
        &self,
        source: &dyn PriceSource,
        address: &TokenAddress,
    ) -> Option<PriceQuote> {
        let id = source.id();
        let request = source.fetch_one(address);
        let outcome = match tokio::time::timeout(self.call_timeout, request).await {
            Ok(Ok(price)) if is_valid_usd_price(price) => Ok(price),
            Ok(Ok(price)) => Err(SourceError::InvalidPrice(price)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SourceError::Timeout),
        };

        match outcome {
            Ok(price) => {
                metrics::record_source_outcome(id.as_str(), "ok");
                PriceQuote::new(address.clone(), price, id)
            }
            Err(e) => {
                metrics::record_source_outcome(id.as_str(), e.outcome_label());
                debug!("{}: no price for {}: {}", id, address, e);
                None
            }
        }
    }

    async fn call_batch(
        &self,
        source: &dyn PriceSource,
        addresses: &[TokenAddress],
    ) -> Vec<PriceQuote> {
        let id = source.id();
        if !source.is_enabled() {
            debug!("{} disabled, skipping batch pass", id);
            return Vec::new();
        }

        // Chunked here so the timeout applies per request, not per pass
        let limit = source.max_batch_size().unwrap_or(addresses.len()).max(1);
        debug!("{} batch: {} addresses, {} per request", id, addresses.len(), limit);
        let fetch = move |chunk: Vec<TokenAddress>| async move { source.fetch_many(&chunk).await };
        let fetched = fetch_chunked_with_timeout(addresses, limit, self.batch_timeout, fetch).await;

        let prices = match fetched {
            Ok(prices) => prices,
            Err(e) => {
                metrics::record_source_outcome(id.as_str(), e.outcome_label());
                debug!("{} batch failed for {} addresses: {}", id, addresses.len(), e);
                return Vec::new();
            }
        };
        metrics::record_source_outcome(id.as_str(), "ok");

        // Sources may answer for addresses that were not asked for
        let wanted: HashSet<&TokenAddress> = addresses.iter().collect();
        prices
            .into_iter()
            .filter(|(address, _)| wanted.contains(address))
            .filter_map(|(address, price)| PriceQuote::new(address, price, id))
            .collect()
    }
}

/// Canonical, deduplicated addresses in first-seen order. Blank or malformed
/// entries are dropped.
fn canonicalize<I, S>(addresses: I) -> Vec<TokenAddress>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for raw in addresses {
        match TokenAddress::new(raw.as_ref()) {
            Ok(address) => {
                if seen.insert(address.clone()) {
                    out.push(address);
                }
            }
            Err(e) => debug!("Skipping address {:?}: {}", raw.as_ref(), e),
        }
    }
    out
}

fn still_missing(
    requested: &[TokenAddress],
    resolved: &HashMap<TokenAddress, PriceQuote>,
) -> Vec<TokenAddress> {
    requested
        .iter()
        .filter(|a| !resolved.contains_key(*a))
        .cloned()
        .collect()
}

// Earlier passes win: never overwrite a filled slot
fn merge(
    resolved: &mut HashMap<TokenAddress, PriceQuote>,
    quotes: impl IntoIterator<Item = PriceQuote>,
) {
    for quote in quotes {
        resolved.entry(quote.address.clone()).or_insert(quote);
    }
}

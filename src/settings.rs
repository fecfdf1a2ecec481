use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::env;

/// Chain / network identifiers, one per provider naming scheme.
#[derive(Debug, Deserialize, Clone)]
pub struct Chain {
    /// GeckoTerminal network id
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_network")]
    pub dexscreener_chain: String,
    #[serde(default = "default_network")]
    pub defillama_chain: String,
    #[serde(default = "default_network")]
    pub coingecko_platform: String,
    #[serde(default = "default_network")]
    pub birdeye_chain: String,
}

fn default_network() -> String {
    "base".to_string()
}
fn default_chain_id() -> u64 {
    8453 // Base mainnet
}

impl Default for Chain {
    fn default() -> Self {
        Self {
            network: default_network(),
            chain_id: default_chain_id(),
            dexscreener_chain: default_network(),
            defillama_chain: default_network(),
            coingecko_platform: default_network(),
            birdeye_chain: default_network(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Aggregator {
    #[serde(default = "default_fallback_concurrency")]
    pub fallback_concurrency: usize,
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
    /// Aggregator-side bound for one single-address source call
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    /// Aggregator-side bound for one batch request (one chunk)
    #[serde(default = "default_batch_timeout_ms")]
    pub batch_timeout_ms: u64,
    /// HTTP client timeout inside each source
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,
    #[serde(default)]
    pub cache_mirror_path: Option<String>,
    #[serde(default = "default_true")]
    pub enable_html_scrape: bool,
}

fn default_fallback_concurrency() -> usize {
    5
}
fn default_batch_limit() -> usize {
    30
}
fn default_call_timeout_ms() -> u64 {
    5000
}
fn default_batch_timeout_ms() -> u64 {
    15000
}
fn default_request_timeout_ms() -> u64 {
    4000
}
fn default_cache_ttl_seconds() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

impl Default for Aggregator {
    fn default() -> Self {
        Self {
            fallback_concurrency: default_fallback_concurrency(),
            batch_limit: default_batch_limit(),
            call_timeout_ms: default_call_timeout_ms(),
            batch_timeout_ms: default_batch_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            cache_ttl_seconds: default_cache_ttl_seconds(),
            cache_mirror_path: None,
            enable_html_scrape: default_true(),
        }
    }
}

/// Base URLs, overridable for proxies and tests.
#[derive(Debug, Deserialize, Clone)]
pub struct Endpoints {
    #[serde(default = "default_geckoterminal_url")]
    pub geckoterminal: String,
    #[serde(default = "default_birdeye_url")]
    pub birdeye: String,
    #[serde(default = "default_dexscreener_url")]
    pub dexscreener: String,
    #[serde(default = "default_defillama_url")]
    pub defillama: String,
    #[serde(default = "default_coingecko_url")]
    pub coingecko: String,
    #[serde(default = "default_oneinch_url")]
    pub oneinch: String,
    #[serde(default = "default_html_scrape_url")]
    pub html_scrape: String,
}

fn default_geckoterminal_url() -> String {
    crate::sources::geckoterminal::DEFAULT_BASE_URL.to_string()
}
fn default_birdeye_url() -> String {
    crate::sources::birdeye::DEFAULT_BASE_URL.to_string()
}
fn default_dexscreener_url() -> String {
    crate::sources::dexscreener::DEFAULT_BASE_URL.to_string()
}
fn default_defillama_url() -> String {
    crate::sources::defillama::DEFAULT_BASE_URL.to_string()
}
fn default_coingecko_url() -> String {
    crate::sources::coingecko::DEFAULT_BASE_URL.to_string()
}
fn default_oneinch_url() -> String {
    crate::sources::oneinch::DEFAULT_BASE_URL.to_string()
}
fn default_html_scrape_url() -> String {
    crate::sources::html_scrape::DEFAULT_BASE_URL.to_string()
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            geckoterminal: default_geckoterminal_url(),
            birdeye: default_birdeye_url(),
            dexscreener: default_dexscreener_url(),
            defillama: default_defillama_url(),
            coingecko: default_coingecko_url(),
            oneinch: default_oneinch_url(),
            html_scrape: default_html_scrape_url(),
        }
    }
}

/// Provider API keys. A missing key disables the sources that need it.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ApiKeys {
    #[serde(default)]
    pub birdeye: Option<String>,
    #[serde(default)]
    pub coingecko: Option<String>,
    #[serde(default)]
    pub oneinch: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub chain: Chain,
    #[serde(default)]
    pub aggregator: Aggregator,
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default)]
    pub api_keys: ApiKeys,
}

impl Settings {
    /// Loads `Config.toml` (optional) from the working directory, then applies
    /// environment overrides.
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_file("Config.toml")
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;
        settings.apply_overrides(|name| env::var(name).ok());
        Ok(settings)
    }

    /// Applies overrides from `lookup` (the process environment in `new`).
    ///
    /// - `BIRDEYE_API_KEY`, `COINGECKO_API_KEY`, `ONEINCH_API_KEY`
    /// - `PRICE_SDK_NETWORK`: sets the network for every provider
    /// - `PRICE_SDK_CHAIN_ID`
    /// - `PRICE_SDK_CACHE_MIRROR_PATH`
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(key) = non_empty("BIRDEYE_API_KEY") {
            self.api_keys.birdeye = Some(key);
        }
        if let Some(key) = non_empty("COINGECKO_API_KEY") {
            self.api_keys.coingecko = Some(key);
        }
        if let Some(key) = non_empty("ONEINCH_API_KEY") {
            self.api_keys.oneinch = Some(key);
        }

        if let Some(network) = non_empty("PRICE_SDK_NETWORK") {
            self.chain.network = network.clone();
            self.chain.dexscreener_chain = network.clone();
            self.chain.defillama_chain = network.clone();
            self.chain.coingecko_platform = network.clone();
            self.chain.birdeye_chain = network;
        }
        if let Some(raw) = non_empty("PRICE_SDK_CHAIN_ID") {
            match raw.parse() {
                Ok(chain_id) => self.chain.chain_id = chain_id,
                Err(e) => log::warn!("⚠️ Ignoring PRICE_SDK_CHAIN_ID={:?}: {}", raw, e),
            }
        }
        if let Some(path) = non_empty("PRICE_SDK_CACHE_MIRROR_PATH") {
            self.aggregator.cache_mirror_path = Some(path);
        }
    }
}

// Last-resort source: scrape a USD price out of a public token page.
// GET {base}/{chain}/{address}, price extracted with regex patterns.

use crate::price_source::{PriceSource, SourceError};
use crate::sources::{get_text, DEFAULT_REQUEST_TIMEOUT};
use crate::types::conversions::is_valid_usd_price;
use crate::types::{SourceId, TokenAddress};
use crate::utils::{build_http_client, trim_base_url};
use async_trait::async_trait;
use log::warn;
use regex::Regex;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://dexscreener.com";

/// Patterns tried in order; the first capture group must be the price.
pub const DEFAULT_PATTERNS: &[&str] = &[
    r#""priceUsd"\s*:\s*"?([0-9]*\.?[0-9]+(?:[eE][-+]?[0-9]+)?)"?"#,
    r#"<meta[^>]+property="og:price:amount"[^>]+content="([0-9]*\.?[0-9]+)""#,
    r#"data-price-usd="([0-9]*\.?[0-9]+(?:[eE][-+]?[0-9]+)?)""#,
];

pub struct HtmlScrapeSource {
    client: reqwest::Client,
    base_url: String,
    chain: String,
    patterns: Vec<Regex>,
}

impl HtmlScrapeSource {
    pub fn new(chain: impl Into<String>) -> Self {
        Self {
            client: build_http_client(DEFAULT_REQUEST_TIMEOUT),
            base_url: DEFAULT_BASE_URL.to_string(),
            chain: chain.into(),
            patterns: compile_patterns(DEFAULT_PATTERNS),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = trim_base_url(base_url);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_http_client(timeout);
        self
    }

    /// Replaces the extraction patterns. Invalid patterns are skipped.
    pub fn with_patterns(mut self, patterns: &[&str]) -> Self {
        self.patterns = compile_patterns(patterns);
        self
    }
}

fn compile_patterns(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!("⚠️ Skipping invalid price pattern {:?}: {}", p, e);
                None
            }
        })
        .collect()
}

fn extract_price(html: &str, patterns: &[Regex]) -> Option<f64> {
    patterns.iter().find_map(|re| {
        re.captures_iter(html)
            .filter_map(|caps| caps.get(1)?.as_str().parse::<f64>().ok())
            .find(|price| is_valid_usd_price(*price))
    })
}

#[async_trait]
impl PriceSource for HtmlScrapeSource {
    fn id(&self) -> SourceId {
        SourceId::HtmlScrape
    }

    fn is_enabled(&self) -> bool {
        !self.patterns.is_empty()
    }

    async fn fetch_one(&self, address: &TokenAddress) -> Result<f64, SourceError> {
        if self.patterns.is_empty() {
            return Err(SourceError::NoData);
        }
        let url = format!("{}/{}/{}", self.base_url, self.chain, address);
        let html = get_text(self.client.get(&url).header("accept", "text/html")).await?;
        extract_price(&html, &self.patterns).ok_or(SourceError::NoData)
    }
}

// DefiLlama coins API (market data)
// GET {base}/prices/current/{chain}:{address}

use crate::price_source::{PriceSource, SourceError};
use crate::sources::{get_json, DEFAULT_REQUEST_TIMEOUT};
use crate::types::conversions::json_to_usd_price;
use crate::types::{SourceId, TokenAddress};
use crate::utils::{build_http_client, trim_base_url};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://coins.llama.fi";

pub struct DefiLlamaSource {
    client: reqwest::Client,
    base_url: String,
    chain: String,
    min_confidence: f64,
}

#[derive(Debug, Deserialize)]
struct DefiLlamaPriceResponse {
    #[serde(default)]
    coins: HashMap<String, DefiLlamaCoin>,
}

#[derive(Debug, Deserialize)]
struct DefiLlamaCoin {
    price: Value,
    #[serde(default)]
    confidence: Option<f64>,
}

impl DefiLlamaSource {
    pub fn new(chain: impl Into<String>) -> Self {
        Self {
            client: build_http_client(DEFAULT_REQUEST_TIMEOUT),
            base_url: DEFAULT_BASE_URL.to_string(),
            chain: chain.into(),
            min_confidence: 0.5,
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

    /// Prices whose reported confidence is below this are treated as no data.
    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }
}

fn parse_coin_price(body: Value, coin_id: &str, min_confidence: f64) -> Result<f64, SourceError> {
    let response: DefiLlamaPriceResponse =
        serde_json::from_value(body).map_err(|e| SourceError::Parse(e.to_string()))?;

    // DefiLlama puede devolver la key con otro casing
    let coin = response
        .coins
        .iter()
        .find(|(id, _)| id.eq_ignore_ascii_case(coin_id))
        .map(|(_, coin)| coin)
        .ok_or(SourceError::NoData)?;

    if coin.confidence.is_some_and(|c| c < min_confidence) {
        return Err(SourceError::NoData);
    }
    json_to_usd_price(&coin.price).ok_or(SourceError::NoData)
}

#[async_trait]
impl PriceSource for DefiLlamaSource {
    fn id(&self) -> SourceId {
        SourceId::DefiLlama
    }

    async fn fetch_one(&self, address: &TokenAddress) -> Result<f64, SourceError> {
        let coin_id = format!("{}:{}", self.chain, address);
        let url = format!("{}/prices/current/{}", self.base_url, coin_id);
        let body = get_json(self.client.get(&url)).await?;
        parse_coin_price(body, &coin_id, self.min_confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_price_case_insensitively() {
        let body = json!({
            "coins": {
                "base:0xAbC": { "decimals": 18, "symbol": "TKN", "price": 0.0123, "timestamp": 1700000000, "confidence": 0.99 }
            }
        });
        assert_eq!(parse_coin_price(body, "base:0xabc", 0.5), Ok(0.0123));
    }

    #[test]
    fn empty_coins_and_low_confidence_are_no_data() {
        assert_eq!(
            parse_coin_price(json!({ "coins": {} }), "base:0xabc", 0.5),
            Err(SourceError::NoData)
        );
        let low = json!({ "coins": { "base:0xabc": { "price": 1.0, "confidence": 0.2 } } });
        assert_eq!(parse_coin_price(low, "base:0xabc", 0.5), Err(SourceError::NoData));
    }
}

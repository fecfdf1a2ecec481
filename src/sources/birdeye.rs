// Birdeye: key-gated multi-chain aggregator, used as the secondary batch pass.
// GET {base}/defi/multi_price?list_address=a,b  (X-API-KEY, x-chain)

use crate::price_source::{PriceSource, SourceError};
use crate::sources::{get_json, usable_key, DEFAULT_REQUEST_TIMEOUT, MAX_ADDRESSES_PER_CALL};
use crate::types::conversions::json_to_usd_price;
use crate::types::{PriceMap, SourceId, TokenAddress};
use crate::utils::{build_http_client, fetch_chunked, trim_base_url};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://public-api.birdeye.so";

pub struct BirdeyeSource {
    client: reqwest::Client,
    base_url: String,
    chain: String,
    api_key: Option<String>,
    batch_limit: usize,
}

impl BirdeyeSource {
    pub fn new(chain: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: build_http_client(DEFAULT_REQUEST_TIMEOUT),
            base_url: DEFAULT_BASE_URL.to_string(),
            chain: chain.into(),
            api_key: usable_key(api_key),
            batch_limit: MAX_ADDRESSES_PER_CALL,
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

    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit.max(1);
        self
    }

    async fn fetch_chunk(&self, chunk: Vec<TokenAddress>) -> Result<PriceMap, SourceError> {
        let api_key = self.api_key.as_deref().ok_or(SourceError::MissingApiKey)?;
        let joined = chunk.iter().map(TokenAddress::as_str).collect::<Vec<_>>().join(",");
        let request = self
            .client
            .get(format!("{}/defi/multi_price", self.base_url))
            .query(&[("list_address", joined.as_str())])
            .header("X-API-KEY", api_key)
            .header("x-chain", self.chain.as_str())
            .header("accept", "application/json");
        let body = get_json(request).await?;
        parse_multi_price(&body, &chunk)
    }
}

/// `{"success": true, "data": {"<addr>": {"value": 1.2}, "<addr2>": null}}`
fn parse_multi_price(body: &Value, requested: &[TokenAddress]) -> Result<PriceMap, SourceError> {
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(SourceError::NoData);
    }
    let data = body
        .get("data")
        .and_then(Value::as_object)
        .ok_or_else(|| SourceError::Parse("missing data object".to_string()))?;

    let wanted: HashSet<&TokenAddress> = requested.iter().collect();
    let mut prices = PriceMap::new();
    for (raw_address, entry) in data {
        let Ok(address) = TokenAddress::new(raw_address) else {
            continue;
        };
        if !wanted.contains(&address) {
            continue;
        }
        if let Some(price) = entry.get("value").and_then(json_to_usd_price) {
            prices.insert(address, price);
        }
    }
    Ok(prices)
}

#[async_trait]
impl PriceSource for BirdeyeSource {
    fn id(&self) -> SourceId {
        SourceId::Birdeye
    }

    fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    fn supports_batch(&self) -> bool {
        true
    }

    fn max_batch_size(&self) -> Option<usize> {
        Some(self.batch_limit)
    }

    async fn fetch_one(&self, address: &TokenAddress) -> Result<f64, SourceError> {
        self.fetch_chunk(vec![address.clone()])
            .await?
            .remove(address)
            .ok_or(SourceError::NoData)
    }

    async fn fetch_many(&self, addresses: &[TokenAddress]) -> Result<PriceMap, SourceError> {
        if !self.is_enabled() {
            return Err(SourceError::MissingApiKey);
        }
        fetch_chunked(addresses, self.batch_limit, |chunk| self.fetch_chunk(chunk)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn addr(s: &str) -> TokenAddress {
        TokenAddress::new(s).unwrap()
    }

    #[test]
    fn parses_values_and_ignores_null_entries() {
        let body = json!({
            "success": true,
            "data": {
                "0xAaa": { "value": 0.42, "updateUnixTime": 1700000000 },
                "0xbbb": null,
                "0xccc": { "value": -1 }
            }
        });
        let requested = [addr("0xaaa"), addr("0xbbb"), addr("0xccc")];
        let prices = parse_multi_price(&body, &requested).unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices[&addr("0xaaa")], 0.42);
    }

    #[test]
    fn unsuccessful_response_is_no_data() {
        let body = json!({ "success": false, "message": "Unauthorized" });
        assert_eq!(parse_multi_price(&body, &[addr("0xaaa")]), Err(SourceError::NoData));
    }

    #[tokio::test]
    async fn missing_key_fails_fast() {
        let source = BirdeyeSource::new("base", Some("   ".to_string()));
        assert!(!source.is_enabled());
        assert_eq!(source.fetch_one(&addr("0xaaa")).await, Err(SourceError::MissingApiKey));
        assert_eq!(source.fetch_many(&[addr("0xaaa")]).await, Err(SourceError::MissingApiKey));
    }
}

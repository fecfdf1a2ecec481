// GeckoTerminal: aggregated on-chain pool data with a true batch price endpoint.
// GET {base}/simple/networks/{network}/token_price/{a,b,c}

use crate::price_source::{PriceSource, SourceError};
use crate::sources::{get_json, DEFAULT_REQUEST_TIMEOUT, MAX_ADDRESSES_PER_CALL};
use crate::types::conversions::json_to_usd_price;
use crate::types::{PriceMap, SourceId, TokenAddress};
use crate::utils::{build_http_client, fetch_chunked, trim_base_url};
use async_trait::async_trait;
use log::debug;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.geckoterminal.com/api/v2";

/// Primary batch source. Scoped to one network (e.g. `base`).
pub struct GeckoTerminalSource {
    client: reqwest::Client,
    base_url: String,
    network: String,
    batch_limit: usize,
}

impl GeckoTerminalSource {
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            client: build_http_client(DEFAULT_REQUEST_TIMEOUT),
            base_url: DEFAULT_BASE_URL.to_string(),
            network: network.into(),
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
        let joined = chunk.iter().map(TokenAddress::as_str).collect::<Vec<_>>().join(",");
        let url = format!(
            "{}/simple/networks/{}/token_price/{}",
            self.base_url, self.network, joined
        );
        let request = self.client.get(&url).header("accept", "application/json");
        let body = get_json(request).await?;
        let prices = parse_token_prices(&body, &chunk)?;
        debug!(
            "geckoterminal: {}/{} prices on {}",
            prices.len(),
            chunk.len(),
            self.network
        );
        Ok(prices)
    }
}

/// Extracts `data.attributes.token_prices`, keeping only requested
/// addresses with valid prices.
fn parse_token_prices(body: &Value, requested: &[TokenAddress]) -> Result<PriceMap, SourceError> {
    let token_prices = body
        .pointer("/data/attributes/token_prices")
        .and_then(Value::as_object)
        .ok_or_else(|| SourceError::Parse("missing data.attributes.token_prices".to_string()))?;

    let wanted: HashSet<&TokenAddress> = requested.iter().collect();
    let mut prices = PriceMap::with_capacity(token_prices.len());
    for (raw_address, raw_price) in token_prices {
        let Ok(address) = TokenAddress::new(raw_address) else {
            continue;
        };
        if !wanted.contains(&address) {
            continue;
        }
        if let Some(price) = json_to_usd_price(raw_price) {
            prices.insert(address, price);
        }
    }
    Ok(prices)
}

#[async_trait]
impl PriceSource for GeckoTerminalSource {
    fn id(&self) -> SourceId {
        SourceId::GeckoTerminal
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
    fn parses_token_prices_and_skips_nulls() {
        let body = json!({
            "data": {
                "id": "x",
                "type": "simple_token_price",
                "attributes": {
                    "token_prices": {
                        "0xAAA": "1.5",
                        "0xbbb": null,
                        "0xccc": "0",
                        "0xddd": "9.0"
                    }
                }
            }
        });
        let requested = vec![addr("0xaaa"), addr("0xbbb"), addr("0xccc")];
        let prices = parse_token_prices(&body, &requested).unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices[&addr("0xaaa")], 1.5);
    }

    #[test]
    fn schema_mismatch_is_a_parse_error() {
        let body = json!({ "errors": [{ "status": "404" }] });
        assert!(matches!(
            parse_token_prices(&body, &[addr("0xaaa")]),
            Err(SourceError::Parse(_))
        ));
    }
}

// CoinGecko contract lookup (market data). Works keyless on the public API,
// a demo/pro key is sent when configured.
// GET {base}/simple/token_price/{platform}?contract_addresses={a}&vs_currencies=usd

use crate::price_source::{PriceSource, SourceError};
use crate::sources::{get_json, usable_key, DEFAULT_REQUEST_TIMEOUT};
use crate::types::conversions::json_to_usd_price;
use crate::types::{SourceId, TokenAddress};
use crate::utils::{build_http_client, trim_base_url};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

pub struct CoinGeckoSource {
    client: reqwest::Client,
    base_url: String,
    platform: String,
    api_key: Option<String>,
}

impl CoinGeckoSource {
    pub fn new(platform: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: build_http_client(DEFAULT_REQUEST_TIMEOUT),
            base_url: DEFAULT_BASE_URL.to_string(),
            platform: platform.into(),
            api_key: usable_key(api_key),
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
}

// CoinGecko devuelve { "<contract>": { "usd": price } }
fn parse_token_price(body: &Value, address: &TokenAddress) -> Result<f64, SourceError> {
    let object = body
        .as_object()
        .ok_or_else(|| SourceError::Parse("expected a JSON object".to_string()))?;

    object
        .iter()
        .find(|(contract, _)| contract.eq_ignore_ascii_case(address.as_str()))
        .and_then(|(_, entry)| entry.get("usd"))
        .and_then(json_to_usd_price)
        .ok_or(SourceError::NoData)
}

#[async_trait]
impl PriceSource for CoinGeckoSource {
    fn id(&self) -> SourceId {
        SourceId::CoinGecko
    }

    async fn fetch_one(&self, address: &TokenAddress) -> Result<f64, SourceError> {
        let url = format!("{}/simple/token_price/{}", self.base_url, self.platform);
        let mut request = self
            .client
            .get(&url)
            .query(&[("contract_addresses", address.as_str()), ("vs_currencies", "usd")]);
        if let Some(key) = &self.api_key {
            request = request.header("x-cg-demo-api-key", key.as_str());
        }
        let body = get_json(request).await?;
        parse_token_price(&body, address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_usd_entry() {
        let address = TokenAddress::new("0xabc").unwrap();
        let body = json!({ "0xABC": { "usd": 0.98 } });
        assert_eq!(parse_token_price(&body, &address), Ok(0.98));
    }

    #[test]
    fn unknown_contract_is_no_data() {
        let address = TokenAddress::new("0xabc").unwrap();
        assert_eq!(parse_token_price(&json!({}), &address), Err(SourceError::NoData));
        assert!(matches!(
            parse_token_price(&json!([1, 2]), &address),
            Err(SourceError::Parse(_))
        ));
    }
}

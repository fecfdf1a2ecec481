// 1inch spot price API (swap-quote oracle). Requires an API key.
// GET {base}/price/v1.1/{chain_id}/{address}?currency=USD

use crate::price_source::{PriceSource, SourceError};
use crate::sources::{get_json, usable_key, DEFAULT_REQUEST_TIMEOUT};
use crate::types::conversions::json_to_usd_price;
use crate::types::{SourceId, TokenAddress};
use crate::utils::{build_http_client, trim_base_url};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.1inch.dev";

pub struct OneInchSource {
    client: reqwest::Client,
    base_url: String,
    chain_id: u64,
    api_key: Option<String>,
}

impl OneInchSource {
    pub fn new(chain_id: u64, api_key: Option<String>) -> Self {
        Self {
            client: build_http_client(DEFAULT_REQUEST_TIMEOUT),
            base_url: DEFAULT_BASE_URL.to_string(),
            chain_id,
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

fn parse_spot_price(body: &Value, address: &TokenAddress) -> Result<f64, SourceError> {
    let object = body
        .as_object()
        .ok_or_else(|| SourceError::Parse("expected a JSON object".to_string()))?;
    object
        .iter()
        .find(|(token, _)| token.eq_ignore_ascii_case(address.as_str()))
        .and_then(|(_, price)| json_to_usd_price(price))
        .ok_or(SourceError::NoData)
}

#[async_trait]
impl PriceSource for OneInchSource {
    fn id(&self) -> SourceId {
        SourceId::OneInch
    }

    fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    async fn fetch_one(&self, address: &TokenAddress) -> Result<f64, SourceError> {
        let api_key = self.api_key.as_deref().ok_or(SourceError::MissingApiKey)?;
        let url = format!("{}/price/v1.1/{}/{}", self.base_url, self.chain_id, address);
        let request = self
            .client
            .get(&url)
            .query(&[("currency", "USD")])
            .bearer_auth(api_key);
        let body = get_json(request).await?;
        parse_spot_price(&body, address)
    }
}

// DexScreener: pair search, price of the most liquid pair for the token.
// GET {base}/latest/dex/tokens/{address}

use crate::price_source::{PriceSource, SourceError};
use crate::sources::{get_json, DEFAULT_REQUEST_TIMEOUT};
use crate::types::conversions::json_to_usd_price;
use crate::types::{SourceId, TokenAddress};
use crate::utils::{build_http_client, trim_base_url};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.dexscreener.com";

pub struct DexScreenerSource {
    client: reqwest::Client,
    base_url: String,
    chain: String,
}

// Solo los campos que usamos; el resto del payload se ignora.
// Cada pair se lee por separado: un pair raro no tumba la respuesta entera.
#[derive(Debug, Deserialize)]
struct PairsResponse {
    #[serde(default)]
    pairs: Option<Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Pair {
    chain_id: Option<Value>,
    base_token: Option<Value>,
    price_usd: Option<Value>,
    liquidity: Option<Value>,
}

impl Pair {
    fn chain_id(&self) -> Option<&str> {
        self.chain_id.as_ref()?.as_str()
    }

    fn base_address(&self) -> Option<&str> {
        self.base_token.as_ref()?.get("address")?.as_str()
    }

    fn liquidity_usd(&self) -> f64 {
        self.liquidity
            .as_ref()
            .and_then(|l| l.get("usd"))
            .and_then(json_to_usd_price)
            .unwrap_or(0.0)
    }
}

impl DexScreenerSource {
    pub fn new(chain: impl Into<String>) -> Self {
        Self {
            client: build_http_client(DEFAULT_REQUEST_TIMEOUT),
            base_url: DEFAULT_BASE_URL.to_string(),
            chain: chain.into(),
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

/// Picks the priced pair with the deepest USD liquidity where the requested
/// token is the base token on the configured chain. `priceUsd` is always the
/// base token's price, so quote-side pairs are useless here.
fn best_pair_price(body: Value, address: &TokenAddress, chain: &str) -> Result<f64, SourceError> {
    let response: PairsResponse =
        serde_json::from_value(body).map_err(|e| SourceError::Parse(e.to_string()))?;

    response
        .pairs
        .unwrap_or_default()
        .into_iter()
        .filter_map(|raw| match serde_json::from_value::<Pair>(raw) {
            Ok(pair) => Some(pair),
            Err(e) => {
                debug!("dexscreener: skipping malformed pair: {}", e);
                None
            }
        })
        .filter(|p| p.chain_id().map_or(true, |c| c.eq_ignore_ascii_case(chain)))
        .filter(|p| {
            p.base_address()
                .is_some_and(|a| a.eq_ignore_ascii_case(address.as_str()))
        })
        .filter_map(|p| {
            let price = p.price_usd.as_ref().and_then(json_to_usd_price)?;
            Some((p.liquidity_usd(), price))
        })
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, price)| price)
        .ok_or(SourceError::NoData)
}

#[async_trait]
impl PriceSource for DexScreenerSource {
    fn id(&self) -> SourceId {
        SourceId::DexScreener
    }

    async fn fetch_one(&self, address: &TokenAddress) -> Result<f64, SourceError> {
        let url = format!("{}/latest/dex/tokens/{}", self.base_url, address);
        let body = get_json(self.client.get(&url)).await?;
        best_pair_price(body, address, &self.chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn picks_most_liquid_base_pair_on_chain() {
        let address = TokenAddress::new("0xAAA").unwrap();
        let body = json!({
            "schemaVersion": "1.0.0",
            "pairs": [
                { "chainId": "base", "baseToken": { "address": "0xaaa" }, "priceUsd": "1.10", "liquidity": { "usd": 1000.0 } },
                { "chainId": "base", "baseToken": { "address": "0xAAA" }, "priceUsd": "1.25", "liquidity": { "usd": 50000.0 } },
                { "chainId": "ethereum", "baseToken": { "address": "0xaaa" }, "priceUsd": "9.99", "liquidity": { "usd": 9e9 } },
                { "chainId": "base", "baseToken": { "address": "0xweth" }, "priceUsd": "3000", "liquidity": { "usd": 9e9 } }
            ]
        });
        assert_eq!(best_pair_price(body, &address, "base"), Ok(1.25));
    }

    #[test]
    fn null_pairs_is_no_data() {
        let address = TokenAddress::new("0xaaa").unwrap();
        let body = json!({ "schemaVersion": "1.0.0", "pairs": null });
        assert_eq!(best_pair_price(body, &address, "base"), Err(SourceError::NoData));
    }

    #[test]
    fn odd_pairs_do_not_hide_the_good_one() {
        let address = TokenAddress::new("0xaaa").unwrap();
        let body = json!({
            "pairs": [
                {
                    "chainId": "base",
                    "baseToken": { "address": "0xaaa" },
                    "priceUsd": "1.20",
                    "liquidity": { "usd": 900.0 }
                },
                {
                    "chainId": "base",
                    "baseToken": { "address": "0xaaa" },
                    "priceUsd": "1.10",
                    "liquidity": { "usd": "12.5" }
                },
                { "chainId": "base", "baseToken": { "symbol": "AAA" }, "priceUsd": "7.0" },
                "not-a-pair",
                { "chainId": 8453, "baseToken": { "address": "0xaaa" }, "priceUsd": "3.0" }
            ]
        });
        assert_eq!(best_pair_price(body, &address, "base"), Ok(1.20));
    }

    #[test]
    fn string_liquidity_still_ranks_pairs() {
        let address = TokenAddress::new("0xaaa").unwrap();
        let body = json!({
            "pairs": [
                { "chainId": "base", "baseToken": { "address": "0xaaa" }, "priceUsd": "1.0", "liquidity": { "usd": "50" } },
                { "chainId": "base", "baseToken": { "address": "0xaaa" }, "priceUsd": "2.0", "liquidity": { "usd": "5000" } }
            ]
        });
        assert_eq!(best_pair_price(body, &address, "base"), Ok(2.0));
    }

    #[test]
    fn pairs_with_unusable_prices_are_skipped() {
        let address = TokenAddress::new("0xaaa").unwrap();
        let body = json!({
            "pairs": [
                { "chainId": "base", "baseToken": { "address": "0xaaa" }, "priceUsd": "0", "liquidity": { "usd": 1e6 } },
                { "chainId": "base", "baseToken": { "address": "0xaaa" }, "priceUsd": "0.5" }
            ]
        });
        assert_eq!(best_pair_price(body, &address, "base"), Ok(0.5));
    }
}

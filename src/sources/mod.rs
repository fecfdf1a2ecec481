// Price Sources Module
// One adapter per external price provider, all behind the `PriceSource` trait

pub mod birdeye;
pub mod coingecko;
pub mod defillama;
pub mod dexscreener;
pub mod geckoterminal;
pub mod html_scrape;
pub mod oneinch;

pub use birdeye::BirdeyeSource;
pub use coingecko::CoinGeckoSource;
pub use defillama::DefiLlamaSource;
pub use dexscreener::DexScreenerSource;
pub use geckoterminal::GeckoTerminalSource;
pub use html_scrape::HtmlScrapeSource;
pub use oneinch::OneInchSource;

// Re-export the trait
pub use crate::price_source::{PriceSource, SourceError};

use serde_json::Value;
use std::time::Duration;

/// Per-call address limit observed on the batch endpoints.
pub const MAX_ADDRESSES_PER_CALL: usize = 30;

/// Default HTTP timeout for a single provider request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(4000);

/// Sends a request and decodes the body as untyped JSON.
///
/// Non-2xx statuses map to `SourceError::Http`, undecodable bodies to
/// `SourceError::Parse`. Schemas are checked by each adapter afterwards.
pub(crate) async fn get_json(request: reqwest::RequestBuilder) -> Result<Value, SourceError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Http(status.as_u16()));
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| SourceError::Parse(e.to_string()))
}

/// Same as `get_json` but returns the raw body (HTML pages).
pub(crate) async fn get_text(request: reqwest::RequestBuilder) -> Result<String, SourceError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Http(status.as_u16()));
    }
    response.text().await.map_err(SourceError::from)
}

/// Returns the key if it is present and not blank.
pub(crate) fn usable_key(key: Option<String>) -> Option<String> {
    key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty())
}

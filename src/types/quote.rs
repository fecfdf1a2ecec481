use crate::types::conversions::is_valid_usd_price;
use crate::types::token::TokenAddress;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Address -> USD price. Keys are canonical, values always valid prices.
pub type PriceMap = HashMap<TokenAddress, f64>;

/// Identifies the provider behind a price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SourceId {
    GeckoTerminal,
    Birdeye,
    DexScreener,
    DefiLlama,
    CoinGecko,
    OneInch,
    HtmlScrape,
    /// Externally injected sources (custom providers, test doubles)
    Custom(&'static str),
}

impl SourceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::GeckoTerminal => "geckoterminal",
            SourceId::Birdeye => "birdeye",
            SourceId::DexScreener => "dexscreener",
            SourceId::DefiLlama => "defillama",
            SourceId::CoinGecko => "coingecko",
            SourceId::OneInch => "oneinch",
            SourceId::HtmlScrape => "html_scrape",
            SourceId::Custom(name) => name,
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single accepted price together with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceQuote {
    pub address: TokenAddress,
    pub usd: f64,
    pub source: SourceId,
}

impl PriceQuote {
    /// Returns `None` unless `usd` is finite and strictly positive.
    pub fn new(address: TokenAddress, usd: f64, source: SourceId) -> Option<Self> {
        is_valid_usd_price(usd).then(|| Self { address, usd, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_rejects_invalid_prices() {
        let addr = TokenAddress::new("0xabc").unwrap();
        for bad in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            assert!(PriceQuote::new(addr.clone(), bad, SourceId::DexScreener).is_none());
        }
        let quote = PriceQuote::new(addr.clone(), 1.23, SourceId::DexScreener).unwrap();
        assert_eq!(quote.usd, 1.23);
        assert_eq!(quote.source.to_string(), "dexscreener");
    }
}

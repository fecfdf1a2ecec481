// src/utils.rs
// Utility functions for the price SDK

use crate::price_source::SourceError;
use crate::types::{PriceMap, TokenAddress};
use log::{debug, warn};
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

const USER_AGENT: &str = concat!("token-price-sdk/", env!("CARGO_PKG_VERSION"));

/// Builds the HTTP client owned by a single source. Falls back to a default
/// client (no custom timeout) if the builder fails, the aggregator still
/// enforces its own per-call timeout on top.
pub fn build_http_client(timeout: Duration) -> reqwest::Client {
    match reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            warn!("⚠️ Failed to build HTTP client with timeout {:?}: {}", timeout, e);
            reqwest::Client::new()
        }
    }
}

/// Strips trailing slashes so paths can be appended with `format!`.
pub fn trim_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Removes duplicates while keeping first-seen order.
pub fn dedup_addresses(addresses: &[TokenAddress]) -> Vec<TokenAddress> {
    let mut seen = HashSet::with_capacity(addresses.len());
    addresses
        .iter()
        .filter(|a| seen.insert((*a).clone()))
        .cloned()
        .collect()
}

/// Splits `addresses` into chunks of at most `limit` (deduplicated first) and
/// runs `fetch_chunk` on each chunk sequentially, merging the partial maps.
///
/// A failed chunk does not abort the others. The call only fails if every
/// chunk failed; the first error is returned in that case.
pub async fn fetch_chunked<F, Fut>(
    addresses: &[TokenAddress],
    limit: usize,
    mut fetch_chunk: F,
) -> Result<PriceMap, SourceError>
where
    F: FnMut(Vec<TokenAddress>) -> Fut,
    Fut: Future<Output = Result<PriceMap, SourceError>>,
{
    let unique = dedup_addresses(addresses);
    let mut merged = PriceMap::with_capacity(unique.len());
    if unique.is_empty() {
        return Ok(merged);
    }

    let limit = limit.max(1);
    let mut first_error = None;
    let mut succeeded = 0usize;

    for chunk in unique.chunks(limit) {
        match fetch_chunk(chunk.to_vec()).await {
            Ok(prices) => {
                succeeded += 1;
                for (address, price) in prices {
                    merged.entry(address).or_insert(price);
                }
            }
            Err(e) => {
                debug!("Chunk of {} addresses failed: {}", chunk.len(), e);
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) if succeeded == 0 => Err(e),
        _ => Ok(merged),
    }
}

/// `fetch_chunked` with an upper bound on each chunk. A chunk that runs past
/// `chunk_timeout` counts as a `SourceError::Timeout` for its own addresses
/// only; chunks that already answered are kept.
pub async fn fetch_chunked_with_timeout<F, Fut>(
    addresses: &[TokenAddress],
    limit: usize,
    chunk_timeout: Duration,
    mut fetch_chunk: F,
) -> Result<PriceMap, SourceError>
where
    F: FnMut(Vec<TokenAddress>) -> Fut,
    Fut: Future<Output = Result<PriceMap, SourceError>>,
{
    fetch_chunked(addresses, limit, |chunk| {
        let len = chunk.len();
        let request = fetch_chunk(chunk);
        async move {
            match tokio::time::timeout(chunk_timeout, request).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("⚠️ Chunk of {} addresses timed out after {:?}", len, chunk_timeout);
                    Err(SourceError::Timeout)
                }
            }
        }
    })
    .await
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn addrs(n: usize) -> Vec<TokenAddress> {
        (0..n)
            .map(|i| TokenAddress::new(&format!("0x{:040x}", i)).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn chunks_respect_limit_and_cover_everything_once() {
        let addresses = addrs(65);
        let calls: Mutex<Vec<Vec<TokenAddress>>> = Mutex::new(Vec::new());

        let prices = fetch_chunked(&addresses, 30, |chunk| {
            calls.lock().unwrap().push(chunk.clone());
            let prices: PriceMap = chunk.into_iter().map(|a| (a, 1.0)).collect();
            async move { Ok::<_, SourceError>(prices) }
        })
        .await
        .unwrap();

        let calls = calls.into_inner().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(
            calls.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![30, 30, 5]
        );

        let flattened: Vec<_> = calls.into_iter().flatten().collect();
        let unique: HashSet<_> = flattened.iter().cloned().collect();
        assert_eq!(flattened.len(), 65);
        assert_eq!(unique.len(), 65);
        assert_eq!(prices.len(), 65);
    }

    #[tokio::test]
    async fn duplicate_inputs_are_requested_once() {
        let mut addresses = addrs(3);
        addresses.push(addresses[0].clone());

        let mut requested = 0;
        let prices = fetch_chunked(&addresses, 30, |chunk| {
            requested += chunk.len();
            async move { Ok::<_, SourceError>(PriceMap::new()) }
        })
        .await
        .unwrap();

        assert_eq!(requested, 3);
        assert!(prices.is_empty());
    }

    #[tokio::test]
    async fn one_failing_chunk_keeps_the_others() {
        let addresses = addrs(4);
        let mut call = 0;
        let prices = fetch_chunked(&addresses, 2, |chunk| {
            call += 1;
            let fail = call == 1;
            async move {
                if fail {
                    Err(SourceError::Http(500))
                } else {
                    Ok::<PriceMap, SourceError>(chunk.into_iter().map(|a| (a, 3.0)).collect())
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(prices.len(), 2);

        let all_fail = fetch_chunked(&addresses, 2, |_chunk| async {
            Err::<PriceMap, _>(SourceError::Timeout)
        })
        .await;
        assert_eq!(all_fail, Err(SourceError::Timeout));
    }

    #[tokio::test]
    async fn slow_chunk_times_out_alone() {
        let addresses = addrs(65);
        let mut call = 0;
        let timeout = Duration::from_millis(100);
        let prices = fetch_chunked_with_timeout(&addresses, 30, timeout, |chunk| {
            call += 1;
            let hang = call == 3;
            async move {
                if hang {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
                Ok::<PriceMap, SourceError>(chunk.into_iter().map(|a| (a, 1.0)).collect())
            }
        })
        .await
        .unwrap();

        assert_eq!(prices.len(), 60);
        assert!(!prices.contains_key(&addresses[64]));
    }

    #[test]
    fn trim_base_url_strips_trailing_slashes() {
        assert_eq!(trim_base_url("https://api.example.com/v2//"), "https://api.example.com/v2");
    }
}

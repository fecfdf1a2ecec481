//! Integration tests for PriceCache expiry and the JSON mirror

use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use token_price_sdk::cache::ManualClock;
use token_price_sdk::{PriceCache, PriceMap, TokenAddress};

fn prices(pairs: &[(&str, f64)]) -> PriceMap {
    pairs
        .iter()
        .map(|(a, p)| (TokenAddress::new(a).unwrap(), *p))
        .collect()
}

#[test]
fn get_within_ttl_returns_stored_map_and_expires_after() {
    let clock = ManualClock::new(1_700_000_000_000);
    let cache = PriceCache::new()
        .with_ttl(Duration::from_secs(30))
        .with_clock(Arc::new(clock.clone()));

    let stored = prices(&[("0xaaa", 1.5), ("0xbbb", 2.75)]);
    cache.set("multi_price", stored.clone());

    clock.advance(Duration::from_secs(10));
    assert_eq!(cache.get("multi_price"), Some(stored.clone()));

    clock.advance(Duration::from_secs(21));
    assert_eq!(cache.get("multi_price"), None);
}

#[test]
fn set_refreshes_timestamp() {
    let clock = ManualClock::new(0);
    let cache = PriceCache::new()
        .with_ttl(Duration::from_secs(30))
        .with_clock(Arc::new(clock.clone()));

    cache.set("k", prices(&[("0x1", 1.0)]));
    clock.advance(Duration::from_secs(25));
    cache.set("k", prices(&[("0x1", 2.0)]));
    clock.advance(Duration::from_secs(25));

    assert_eq!(cache.get("k"), Some(prices(&[("0x1", 2.0)])));
}

#[test]
fn mirror_survives_a_new_cache_instance() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("prices.json");
    let clock = ManualClock::new(5_000);

    let writer = PriceCache::new()
        .with_clock(Arc::new(clock.clone()))
        .with_mirror(&path);
    writer.set("multi_price", prices(&[("0xAAA", 1.5)]));
    assert!(path.exists());

    let reader = PriceCache::new()
        .with_clock(Arc::new(clock.clone()))
        .with_mirror(&path);
    assert!(reader.is_empty());
    assert_eq!(reader.get("multi_price"), Some(prices(&[("0xaaa", 1.5)])));
    assert_eq!(reader.len(), 1);

    // Same age rule applies to mirrored entries
    let late_reader = PriceCache::new()
        .with_clock(Arc::new(clock.clone()))
        .with_mirror(&path);
    clock.advance(Duration::from_secs(31));
    assert_eq!(late_reader.get("multi_price"), None);
}

#[test]
fn unreadable_mirror_is_treated_as_miss() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("prices.json");
    std::fs::write(&path, "{ not json").unwrap();

    let cache = PriceCache::new().with_mirror(&path);
    assert_eq!(cache.get("multi_price"), None);

    // The next write replaces the broken file
    cache.set("multi_price", prices(&[("0x1", 3.0)]));
    let fresh = PriceCache::new().with_mirror(&path);
    assert_eq!(fresh.get("multi_price"), Some(prices(&[("0x1", 3.0)])));
}

#[test]
fn missing_mirror_directory_does_not_break_the_cache() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("does-not-exist").join("prices.json");

    let cache = PriceCache::new().with_mirror(&path);
    cache.set("k", prices(&[("0x1", 1.0)]));
    assert_eq!(cache.get("k"), Some(prices(&[("0x1", 1.0)])));
}

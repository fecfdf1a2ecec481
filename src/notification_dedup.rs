// Notification dedup filter - evita alertas duplicadas (nuevos pools, precios)
//
// Bounded FIFO: cuando se supera la capacidad se descartan las keys más viejas.

use crate::types::TokenAddress;
use log::debug;
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

pub const DEFAULT_CAPACITY: usize = 1000;

/// Remembers which notification keys were already emitted.
///
/// Owned by whoever emits notifications (one instance per feed), so tests
/// and independent feeds never share state. Keys that parse as token
/// addresses are compared case-insensitively.
pub struct NotificationDedup {
    inner: Mutex<Inner>,
    capacity: usize,
}

#[derive(Default)]
struct Inner {
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl Default for NotificationDedup {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl NotificationDedup {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: capacity.max(1),
        }
    }

    /// Returns `true` the first time `key` is seen (the caller should notify),
    /// `false` for repeats still inside the window.
    pub fn check_and_insert(&self, key: &str) -> bool {
        let key = canonical_key(key);
        let mut inner = self.lock();
        if inner.seen.contains(&key) {
            return false;
        }
        inner.seen.insert(key.clone());
        inner.order.push_back(key);

        let mut trimmed = 0;
        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.seen.remove(&oldest);
                trimmed += 1;
            }
        }
        if trimmed > 0 {
            debug!("Notification dedup trimmed {} oldest keys", trimmed);
        }
        true
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().seen.contains(&canonical_key(key))
    }

    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.order.clear();
        inner.seen.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means another thread panicked mid-insert;
        // the sets are still usable.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn canonical_key(key: &str) -> String {
    match TokenAddress::new(key) {
        Ok(address) => address.into(),
        Err(_) => key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeats_are_suppressed_case_insensitively() {
        let dedup = NotificationDedup::with_capacity(10);
        assert!(dedup.check_and_insert("0xABC"));
        assert!(!dedup.check_and_insert("0xabc"));
        assert!(dedup.contains("0xAbC"));
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn oldest_keys_are_trimmed_fifo() {
        let dedup = NotificationDedup::with_capacity(3);
        for key in ["0x1", "0x2", "0x3", "0x4"] {
            assert!(dedup.check_and_insert(key));
        }
        assert_eq!(dedup.len(), 3);
        assert!(!dedup.contains("0x1"));
        assert!(dedup.contains("0x4"));

        // Trimmed key notifies again
        assert!(dedup.check_and_insert("0x1"));
        assert!(!dedup.contains("0x2"));
    }

    #[test]
    fn instances_do_not_share_state() {
        let a = NotificationDedup::default();
        let b = NotificationDedup::default();
        assert!(a.check_and_insert("pool:0xabc"));
        assert!(b.check_and_insert("pool:0xabc"));
        a.clear();
        assert!(a.is_empty());
        assert!(!b.is_empty());
    }
}

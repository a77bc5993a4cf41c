//! TTL cache for hot lookups (roles, unread counts).
//!
//! Read-through only. Entries expire on read; the store stays the system
//! of record and writers invalidate explicitly.

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// A concurrent key/value cache with per-entry expiry.
pub struct TtlCache<V> {
    entries: DashMap<String, (Instant, V)>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        // The shard guard must drop before the remove below.
        let expired = match self.entries.get(key) {
            Some(entry) if entry.0.elapsed() < self.ttl => return Some(entry.1.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    pub fn put(&self, key: impl Into<String>, value: V) {
        self.entries.insert(key.into(), (Instant::now(), value));
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_entries_are_not_returned() {
        let cache = TtlCache::new(Duration::from_millis(0));
        cache.put("k", 1u32);
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn live_entries_round_trip() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.put("k", vec!["admin".to_string()]);
        assert_eq!(cache.get("k"), Some(vec!["admin".to_string()]));
        cache.invalidate("k");
        assert_eq!(cache.get("k"), None);
    }
}

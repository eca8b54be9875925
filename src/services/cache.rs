// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Time-to-live result cache.
//!
//! Callers pass "now" in, so freshness is decided by whatever clock the
//! caller holds rather than an ambient time read.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::hash::Hash;

/// One cached value with its insertion time.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub inserted_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// Fresh strictly before `inserted_at + ttl`.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.inserted_at
            .checked_add_signed(self.ttl)
            .map_or(true, |expires_at| now < expires_at)
    }
}

/// Keyed cache whose entries expire after a fixed TTL.
pub struct ResultCache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    ttl: Duration,
}

impl<K, V> ResultCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Fresh value for `key`; a stale entry is evicted.
    pub fn get(&self, key: &K, now: DateTime<Utc>) -> Option<V> {
        if let Some(entry) = self.entries.get(key) {
            if entry.is_fresh(now) {
                return Some(entry.value.clone());
            }
        }
        // Guard dropped above; removing while holding it would deadlock.
        self.entries.remove_if(key, |_, entry| !entry.is_fresh(now));
        None
    }

    pub fn insert(&self, key: K, value: V, now: DateTime<Utc>) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
                ttl: self.ttl,
            },
        );
    }

    pub fn invalidate(&self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 14, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_hit_within_ttl() {
        let cache = ResultCache::new(Duration::seconds(3600));
        cache.insert("k", 1, t0());
        assert_eq!(cache.get(&"k", t0() + Duration::seconds(3599)), Some(1));
    }

    #[test]
    fn test_miss_at_and_after_ttl() {
        let cache = ResultCache::new(Duration::seconds(3600));
        cache.insert("k", 1, t0());
        assert_eq!(cache.get(&"k", t0() + Duration::seconds(3600)), None);
        // Stale entry was evicted
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate() {
        let cache = ResultCache::new(Duration::seconds(3600));
        cache.insert("k", 1, t0());
        assert!(cache.invalidate(&"k"));
        assert!(!cache.invalidate(&"k"));
        assert_eq!(cache.get(&"k", t0()), None);
    }

    #[test]
    fn test_keys_are_independent() {
        let cache = ResultCache::new(Duration::seconds(60));
        cache.insert("a", 1, t0());
        cache.insert("b", 2, t0() + Duration::seconds(30));

        let later = t0() + Duration::seconds(61);
        assert_eq!(cache.get(&"a", later), None);
        assert_eq!(cache.get(&"b", later), Some(2));
        assert_eq!(cache.len(), 1);
    }
}

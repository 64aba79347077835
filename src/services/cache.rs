use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

/// A thread-safe cache with lazy TTL checks.
///
/// Entries are never evicted. An entry older than the TTL reads as absent and is
/// overwritten by the next insert for its key.
pub struct Cache<V> {
    data: DashMap<String, CacheEntry<V>>,
    ttl: Duration,
}

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

/// A live cache entry and how old it is.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<V> {
    pub value: V,
    pub age: Duration,
}

impl<V: Clone> Cache<V> {
    /// Create a new cache with the given TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            data: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get a value if it was stored less than one TTL ago.
    pub fn get(&self, key: &str) -> Option<Cached<V>> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<Cached<V>> {
        let entry = self.data.get(key)?;
        let age = now.saturating_duration_since(entry.stored_at);
        if age < self.ttl {
            Some(Cached {
                value: entry.value.clone(),
                age,
            })
        } else {
            None
        }
    }

    /// Store a value, replacing whatever was under the key.
    pub fn insert(&self, key: String, value: V) {
        self.data.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Seconds a client may keep reusing an entry of the given age.
    pub fn remaining_secs(&self, age: Duration) -> u64 {
        self.ttl.saturating_sub(age).as_secs()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_insert_and_get() {
        let cache: Cache<String> = Cache::new(Duration::from_secs(60));

        cache.insert("key1".to_string(), "value1".to_string());
        assert_eq!(cache.get("key1").map(|c| c.value), Some("value1".to_string()));
        assert!(cache.get("key2").is_none());
    }

    #[test]
    fn test_expired_entry_reads_as_absent_but_stays_stored() {
        let cache: Cache<u32> = Cache::new(Duration::from_secs(60));
        cache.insert("k".to_string(), 7);

        let later = Instant::now() + Duration::from_secs(61);
        assert!(cache.get_at("k", later).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_entry_valid_just_before_ttl() {
        let cache: Cache<u32> = Cache::new(Duration::from_secs(60));
        cache.insert("k".to_string(), 7);

        let almost = Instant::now() + Duration::from_millis(59_500);
        let cached = cache.get_at("k", almost).unwrap();
        assert_eq!(cached.value, 7);
        assert_eq!(cache.remaining_secs(cached.age), 0);
    }

    #[test]
    fn test_insert_overwrites() {
        let cache: Cache<u32> = Cache::new(Duration::from_secs(60));
        cache.insert("k".to_string(), 1);
        cache.insert("k".to_string(), 2);

        assert_eq!(cache.get("k").unwrap().value, 2);
        assert_eq!(cache.len(), 1);
        assert!(!cache.is_empty());
    }

    #[test]
    fn test_remaining_secs() {
        let cache: Cache<u32> = Cache::new(Duration::from_secs(60));
        assert_eq!(cache.remaining_secs(Duration::ZERO), 60);
        assert_eq!(cache.remaining_secs(Duration::from_millis(10_500)), 49);
        assert_eq!(cache.remaining_secs(Duration::from_secs(90)), 0);
    }
}

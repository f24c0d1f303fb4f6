use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use crate::core::task::ListSummary;

pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Per-profile list cache used by the router.
pub type ListCache = TtlCache<String, Vec<ListSummary>>;

/// Small TTL map with lazy eviction.
///
/// Expired entries are dropped when they are read, there is no sweeper.
/// The `*_at` variants take the current instant explicitly.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: HashMap<K, (Instant, V)>,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&mut self, key: &K, now: Instant) -> Option<V> {
        let (expires_at, value) = self.entries.get(key)?;
        if now > *expires_at {
            self.entries.remove(key);
            return None;
        }
        Some(value.clone())
    }

    pub fn set(&mut self, key: K, value: V) {
        self.set_at(key, value, Instant::now());
    }

    pub fn set_at(&mut self, key: K, value: V, now: Instant) {
        self.entries.insert(key, (now + self.ttl, value));
    }

    pub fn contains(&mut self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Invalidate one key, returning whatever was stored (expired or not).
    pub fn pop(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|(_, value)| value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Live entries at `now`; expired ones are evicted on the way.
    pub fn items_at(&mut self, now: Instant) -> Vec<(K, V)> {
        self.entries.retain(|_, (expires_at, _)| now <= *expires_at);
        self.entries
            .iter()
            .map(|(k, (_, v))| (k.clone(), v.clone()))
            .collect()
    }

    /// Number of stored entries, including ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

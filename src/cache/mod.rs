//! TTL-bounded memoization for taxonomy lookups.
//!
//! A string-keyed cache with absolute per-entry expiry and glob-style
//! invalidation (`taxonomy:*`). The cache assumes a single-writer,
//! cooperative scheduler; under OS threads callers serialize access, which
//! the internal mutex makes safe but not contention-free.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// TTL applied to whole-taxonomy lookups.
pub const TTL_GLOBAL: Duration = Duration::from_secs(5 * 60);

/// TTL applied to user-scoped lookups.
pub const TTL_USER: Duration = Duration::from_secs(2 * 60);

/// TTL applied to single-branch lookups.
pub const TTL_BRANCH: Duration = Duration::from_secs(10 * 60);

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// A TTL cache over cloneable values.
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch a live entry; expired entries are dropped on the way out.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert a value with an absolute expiry of now + `ttl`.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let mut entries = self.entries.lock();
        entries.insert(
            key.into(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Remove one key. Returns whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    /// Remove every key matching a glob pattern (`*` wildcards).
    ///
    /// Returns the number of entries dropped. `taxonomy:*` clears the whole
    /// taxonomy namespace.
    pub fn invalidate(&self, pattern: &str) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| !glob_match(pattern, key));
        before - entries.len()
    }

    /// Drop every expired entry. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Live entry count (expired-but-unswept entries included).
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Rewind one entry's expiry so tests can observe expiration without
    /// sleeping.
    #[cfg(test)]
    fn force_expire(&self, key: &str) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(key) {
            entry.expires_at = Instant::now() - Duration::from_secs(1);
        }
    }
}

/// Match `text` against `pattern`, where `*` matches any run of characters.
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == text;
    }

    let mut rest = text;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(tail) => rest = tail,
                None => return false,
            }
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(at) => rest = &rest[at + part.len()..],
                None => return false,
            }
        }
    }
    // Pattern ended with `*`, which swallows whatever is left.
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_returns_value() {
        let cache = TtlCache::new();
        cache.set("taxonomy:global", 42u32, TTL_GLOBAL);
        assert_eq!(cache.get("taxonomy:global"), Some(42));
    }

    #[test]
    fn missing_key_returns_none() {
        let cache: TtlCache<u32> = TtlCache::new();
        assert_eq!(cache.get("nope"), None);
    }

    #[test]
    fn expired_entries_are_dropped_on_read() {
        let cache = TtlCache::new();
        cache.set("k", "v".to_string(), TTL_USER);
        cache.force_expire("k");
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.len(), 0, "read should evict the expired entry");
    }

    #[test]
    fn set_overwrites_and_refreshes_expiry() {
        let cache = TtlCache::new();
        cache.set("k", 1u32, TTL_USER);
        cache.force_expire("k");
        cache.set("k", 2u32, TTL_USER);
        assert_eq!(cache.get("k"), Some(2));
    }

    #[test]
    fn purge_removes_only_expired() {
        let cache = TtlCache::new();
        cache.set("a", 1u32, TTL_GLOBAL);
        cache.set("b", 2u32, TTL_GLOBAL);
        cache.force_expire("a");
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.get("b"), Some(2));
    }

    mod invalidation_tests {
        use super::*;

        #[test]
        fn prefix_glob_clears_namespace() {
            let cache = TtlCache::new();
            cache.set("taxonomy:global", 1u32, TTL_GLOBAL);
            cache.set("taxonomy:user:alice", 2u32, TTL_USER);
            cache.set("jobs:123", 3u32, TTL_USER);

            assert_eq!(cache.invalidate("taxonomy:*"), 2);
            assert_eq!(cache.get("taxonomy:global"), None);
            assert_eq!(cache.get("jobs:123"), Some(3));
        }

        #[test]
        fn exact_pattern_matches_exactly() {
            let cache = TtlCache::new();
            cache.set("a", 1u32, TTL_GLOBAL);
            cache.set("ab", 2u32, TTL_GLOBAL);
            assert_eq!(cache.invalidate("a"), 1);
            assert_eq!(cache.get("ab"), Some(2));
        }

        #[test]
        fn infix_glob_matches_middle() {
            assert!(glob_match("taxonomy:*:branch", "taxonomy:alice:branch"));
            assert!(!glob_match("taxonomy:*:branch", "taxonomy:alice:leaf"));
        }

        #[test]
        fn bare_star_matches_everything() {
            assert!(glob_match("*", ""));
            assert!(glob_match("*", "anything"));
        }

        #[test]
        fn anchored_patterns_respect_edges() {
            assert!(glob_match("a*", "abc"));
            assert!(!glob_match("a*", "ba"));
            assert!(glob_match("*c", "abc"));
            assert!(!glob_match("*c", "cb"));
        }
    }

    #[test]
    fn ttl_constants_are_minutes() {
        assert_eq!(TTL_GLOBAL, Duration::from_secs(300));
        assert_eq!(TTL_USER, Duration::from_secs(120));
        assert_eq!(TTL_BRANCH, Duration::from_secs(600));
    }
}

//! Result cache for converted outputs.
//!
//! Maps an output identity (e.g. `"<hash>.webp"`) to the result that was
//! produced for it, so repeated requests for the same upload and format skip
//! the encoder entirely.
//!
//! # Eviction
//!
//! There is none. Entries live until they are deleted or the process exits.
//! Identities are content addressed, so the key space grows with distinct
//! uploads, not with traffic.

use std::collections::HashMap;
use std::hash::Hash;

use tokio::sync::RwLock;

/// Thread-safe key/value cache.
///
/// Readers share the lock; writers take it exclusively, so a reader sees
/// either the old value or the new one, never a partial write.
///
/// # Example
///
/// ```
/// use tinyimg::convert::ResultCache;
///
/// #[tokio::main]
/// async fn main() {
///     let cache: ResultCache<String, u64> = ResultCache::new();
///
///     cache.set("abc.webp".to_string(), 1024).await;
///     assert_eq!(cache.get(&"abc.webp".to_string()).await, Some(1024));
///
///     cache.delete(&"abc.webp".to_string()).await;
///     assert_eq!(cache.get(&"abc.webp".to_string()).await, None);
/// }
/// ```
pub struct ResultCache<K, V> {
    entries: RwLock<HashMap<K, V>>,
}

impl<K, V> ResultCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Get a copy of the value stored for `key`.
    pub async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().await;
        entries.get(key).cloned()
    }

    /// Store a value, replacing any previous one.
    pub async fn set(&self, key: K, value: V) {
        let mut entries = self.entries.write().await;
        entries.insert(key, value);
    }

    /// Remove a value. Returns it if it existed.
    pub async fn delete(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.write().await;
        entries.remove(key)
    }

    /// Check for a key without cloning the value.
    pub async fn contains(&self, key: &K) -> bool {
        let entries = self.entries.read().await;
        entries.contains_key(key)
    }

    /// Number of cached entries.
    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.len()
    }

    /// Check if the cache is empty.
    pub async fn is_empty(&self) -> bool {
        let entries = self.entries.read().await;
        entries.is_empty()
    }

    /// Remove all entries.
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
    }
}

impl<K, V> Default for ResultCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

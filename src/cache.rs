//! Short-lived discovery cache.
//!
//! Listing a remote source costs one API round trip per release plus one
//! per manifest; a hit returns the previously computed bundle list without
//! re-issuing any network calls. Entries are read-only snapshots keyed by
//! source-plus-branch.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::model::Bundle;

/// How long a discovery snapshot stays fresh.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

struct CacheEntry {
    bundles: Vec<Bundle>,
    inserted: Instant,
}

pub struct DiscoveryCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl Default for DiscoveryCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl DiscoveryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached snapshot for `key` if it is still fresh.
    pub async fn get(&self, key: &str) -> Option<Vec<Bundle>> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.inserted.elapsed() < self.ttl => {
                tracing::debug!(key, "discovery cache hit");
                Some(entry.bundles.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub async fn put(&self, key: &str, bundles: Vec<Bundle>) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                bundles,
                inserted: Instant::now(),
            },
        );
    }

    /// Drop every snapshot, forcing the next listing to hit the network.
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}

// Tessera
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Write-through ACL cache

use crate::acl::{AccessControlList, ObjectIdentity};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Cache entry with expiration
#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    expires_at: Instant,
}

impl<T> CacheEntry<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub current_size: usize,
    pub max_size_reached: usize,
}

impl CacheStats {
    /// Calculate hit ratio
    pub fn hit_ratio(&self) -> f64 {
        if self.hits + self.misses == 0 { 0.0 } else { self.hits as f64 / (self.hits + self.misses) as f64 }
    }
}

/// ACL cache keyed by object identity.
///
/// Writers replace entries while holding the identity's row lock; the cache
/// itself does no locking beyond the map shards.
#[derive(Debug)]
pub struct AclCache {
    entries: DashMap<ObjectIdentity, CacheEntry<AccessControlList>>,
    ttl: Duration,
    stats: Arc<RwLock<CacheStats>>,
}

impl AclCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            stats: Arc::new(RwLock::new(CacheStats::default())),
        }
    }

    /// Get a cached ACL
    pub async fn get(&self, identity: &ObjectIdentity) -> Option<AccessControlList> {
        let cached = self.entries.get(identity).map(|entry| if entry.is_expired() { None } else { Some(entry.value.clone()) });

        match cached {
            Some(Some(acl)) => {
                self.stats.write().await.hits += 1;
                debug!(identity = %identity, "ACL cache hit");
                Some(acl)
            }
            Some(None) => {
                self.entries.remove_if(identity, |_, entry| entry.is_expired());
                let mut stats = self.stats.write().await;
                stats.evictions += 1;
                stats.misses += 1;
                None
            }
            None => {
                self.stats.write().await.misses += 1;
                debug!(identity = %identity, "ACL cache miss");
                None
            }
        }
    }

    /// Store or replace the cached copy
    pub async fn put(&self, acl: AccessControlList) {
        let identity = acl.identity().clone();
        self.entries.insert(identity.clone(), CacheEntry::new(acl, self.ttl));
        self.update_cache_size().await;
        debug!(identity = %identity, ttl = ?self.ttl, "ACL cached");
    }

    /// Drop the cached copy for an identity
    pub async fn invalidate(&self, identity: &ObjectIdentity) {
        self.entries.remove(identity);
        self.update_cache_size().await;
        debug!(identity = %identity, "Invalidated ACL cache entry");
    }

    /// Clear all cache entries
    pub async fn clear(&self) {
        self.entries.clear();
        self.stats.write().await.current_size = 0;
        debug!("Cleared ACL cache");
    }

    /// Clean up expired entries
    pub async fn cleanup_expired(&self) {
        let mut evicted = 0;
        self.entries.retain(|_, entry| {
            if entry.is_expired() {
                evicted += 1;
                false
            } else {
                true
            }
        });

        if evicted > 0 {
            self.stats.write().await.evictions += evicted;
            self.update_cache_size().await;
            debug!("Cleaned up {} expired ACL cache entries", evicted);
        }
    }

    pub async fn get_stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }

    async fn update_cache_size(&self) {
        let current_size = self.entries.len();
        let mut stats = self.stats.write().await;
        stats.current_size = current_size;
        if current_size > stats.max_size_reached {
            stats.max_size_reached = current_size;
        }
    }

    /// Start background cleanup task
    pub fn start_cleanup_task(cache: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);

            loop {
                ticker.tick().await;
                cache.cleanup_expired().await;

                let stats = cache.get_stats().await;
                debug!(
                    "ACL cache stats - Hits: {}, Misses: {}, Hit ratio: {:.2}%, Size: {}, Evictions: {}",
                    stats.hits,
                    stats.misses,
                    stats.hit_ratio() * 100.0,
                    stats.current_size,
                    stats.evictions
                );

                if stats.hits + stats.misses > 100 && stats.hit_ratio() < 0.5 {
                    warn!("Low ACL cache hit ratio: {:.2}%", stats.hit_ratio() * 100.0);
                }
            }
        })
    }
}

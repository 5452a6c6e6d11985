// Distance cache: memoized jump counts between pairs of systems.
// Entries expire after a fixed TTL and are refreshed on the next access; nothing is
// evicted in the background.

use crate::connection::SystemId;
use crate::esi::{RouteLookup, RouteService};
use crate::metrics;
use crate::settings::RoutePreference;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::{Duration, Instant};

/// Ordered pair: `(from, to)` and `(to, from)` are separate entries.
pub type DistanceKey = (SystemId, SystemId);

#[derive(Debug, Clone, Copy)]
pub struct DistanceEntry {
    pub jumps: u32,
    pub computed_at: Instant,
}

#[derive(Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    lookup_failures: AtomicU64,
}

/// Jump-count provider backed by a routing service and a TTL cache.
pub struct DistanceCache {
    entries: DashMap<DistanceKey, DistanceEntry>,
    routes: Arc<dyn RouteService>,
    preference: RoutePreference,
    ttl: Duration,
    max_concurrent_lookups: usize,
    counters: CacheCounters,
}

impl DistanceCache {
    pub fn new(
        routes: Arc<dyn RouteService>,
        preference: RoutePreference,
        ttl: Duration,
        max_concurrent_lookups: usize,
    ) -> Self {
        Self {
            entries: DashMap::new(),
            routes,
            preference,
            ttl,
            max_concurrent_lookups: max_concurrent_lookups.max(1),
            counters: CacheCounters::default(),
        }
    }

    /// Jumps from `from` to `to`, or `None` when unreachable or the lookup failed.
    ///
    /// Only successful lookups are memoized; a miss is re-queried next time.
    pub async fn jumps(&self, from: SystemId, to: SystemId) -> Option<u32> {
        let key = (from, to);
        let cached = self.entries.get(&key).map(|e| *e);
        if let Some(entry) = cached {
            if entry.computed_at.elapsed() < self.ttl {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                metrics::increment_distance_lookup("hit");
                return Some(entry.jumps);
            }
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        metrics::increment_distance_lookup("miss");

        match self.routes.route(from, to, self.preference).await {
            Ok(RouteLookup::Jumps(jumps)) => {
                self.entries.insert(
                    key,
                    DistanceEntry {
                        jumps,
                        computed_at: Instant::now(),
                    },
                );
                Some(jumps)
            }
            Ok(RouteLookup::NoRoute) => {
                debug!("No route from {} to {}", from, to);
                None
            }
            Err(e) => {
                self.counters.lookup_failures.fetch_add(1, Ordering::Relaxed);
                metrics::increment_distance_lookup("error");
                warn!("Route lookup {} -> {} failed: {}", from, to, e);
                None
            }
        }
    }

    /// Resolves many pairs concurrently. Unreachable pairs are absent from the result.
    pub async fn jumps_many(&self, pairs: Vec<DistanceKey>) -> HashMap<DistanceKey, u32> {
        let mut unique = pairs;
        unique.sort_unstable();
        unique.dedup();

        stream::iter(unique)
            .map(|(from, to)| async move { ((from, to), self.jumps(from, to).await) })
            .buffer_unordered(self.max_concurrent_lookups)
            .filter_map(|(key, jumps)| async move { jumps.map(|j| (key, j)) })
            .collect()
            .await
    }

    pub fn stats(&self) -> DistanceCacheStats {
        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        DistanceCacheStats {
            hits,
            misses,
            lookup_failures: self.counters.lookup_failures.load(Ordering::Relaxed),
            hit_rate: if total > 0 { hits as f64 / total as f64 } else { 0.0 },
            cache_size: self.entries.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct DistanceCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub lookup_failures: u64,
    pub hit_rate: f64,
    pub cache_size: usize,
}

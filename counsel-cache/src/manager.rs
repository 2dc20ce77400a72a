//! Unified statistics and maintenance across the three caches.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::core::CacheStats;
use crate::stores::{SchemaCache, TokenCache, ValidationCache};

/// Minimum spacing between maintenance passes.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Aggregated statistics across every cache.
#[derive(Debug, Clone, Copy)]
pub struct GlobalCacheStats {
    /// Token-estimation cache counters.
    pub token: CacheStats,
    /// Schema cache counters.
    pub schema: CacheStats,
    /// Model-validation cache counters.
    pub validation: CacheStats,
}

impl GlobalCacheStats {
    /// Overall hit rate in percent across all caches.
    pub fn overall_hit_rate_percent(&self) -> f64 {
        let hits = self.token.hits + self.schema.hits + self.validation.hits;
        let misses = self.token.misses + self.schema.misses + self.validation.misses;
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64 * 100.0
        }
    }
}

/// Owns the three process-wide caches and their maintenance cadence.
///
/// `should_cleanup` is checked from the request path; the actual cleanup
/// runs in a background task so tool execution is never blocked on it.
pub struct CacheManager {
    token: Arc<TokenCache>,
    schema: Arc<SchemaCache>,
    validation: Arc<ValidationCache>,
    last_cleanup: Mutex<Instant>,
}

impl CacheManager {
    /// Create a manager with fresh caches.
    pub fn new() -> Self {
        Self {
            token: Arc::new(TokenCache::new()),
            schema: Arc::new(SchemaCache::new()),
            validation: Arc::new(ValidationCache::new()),
            last_cleanup: Mutex::new(Instant::now()),
        }
    }

    /// Shared handle to the token-estimation cache.
    pub fn token(&self) -> Arc<TokenCache> {
        Arc::clone(&self.token)
    }

    /// Shared handle to the schema cache.
    pub fn schema(&self) -> Arc<SchemaCache> {
        Arc::clone(&self.schema)
    }

    /// Shared handle to the model-validation cache.
    pub fn validation(&self) -> Arc<ValidationCache> {
        Arc::clone(&self.validation)
    }

    /// Whether enough time has passed since the last maintenance pass.
    pub fn should_cleanup(&self) -> bool {
        let last = self.last_cleanup.lock().unwrap_or_else(|e| e.into_inner());
        last.elapsed() > CLEANUP_INTERVAL
    }

    /// Remove expired entries from every cache.
    pub fn cleanup_all(&self) {
        let started = Instant::now();
        let removed =
            self.token.cleanup() + self.schema.cleanup() + self.validation.cleanup();
        let mut last = self.last_cleanup.lock().unwrap_or_else(|e| e.into_inner());
        *last = Instant::now();
        if removed > 0 {
            info!(removed, elapsed = ?started.elapsed(), "cache cleanup complete");
        } else {
            debug!(elapsed = ?started.elapsed(), "cache cleanup found nothing expired");
        }
    }

    /// Drop every entry from every cache.
    pub fn invalidate_all(&self) {
        self.token.clear();
        self.schema.invalidate_all();
        self.validation.invalidate_model("");
    }

    /// Aggregate statistics snapshot.
    pub fn global_stats(&self) -> GlobalCacheStats {
        GlobalCacheStats {
            token: self.token.stats(),
            schema: self.schema.stats(),
            validation: self.validation.stats(),
        }
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_manager_does_not_need_cleanup() {
        let manager = CacheManager::new();
        assert!(!manager.should_cleanup());
    }

    #[test]
    fn global_stats_aggregate_all_caches() {
        let manager = CacheManager::new();
        manager.token().put("text", "model", 4);
        let _ = manager.token().get("text", "model");
        let _ = manager.schema().get("chat", "1");
        let stats = manager.global_stats();
        assert_eq!(stats.token.hits, 1);
        assert_eq!(stats.schema.misses, 1);
        // 1 hit, 2 misses overall (schema miss + none on validation).
        assert!(stats.overall_hit_rate_percent() > 0.0);
    }

    #[test]
    fn invalidate_all_empties_every_cache() {
        let manager = CacheManager::new();
        manager.token().put("text", "model", 4);
        manager.invalidate_all();
        assert_eq!(manager.token().get("text", "model"), None);
    }
}

//! The three concrete caches used by the request pipeline.

use std::time::Duration;

use counsel_types::ToolCategory;
use sha2::{Digest, Sha256};

use crate::core::{CacheStats, TtlCache};

const TOKEN_CACHE_CAPACITY: usize = 1_000;
const TOKEN_CACHE_TTL: Duration = Duration::from_secs(3_600);
const SCHEMA_CACHE_CAPACITY: usize = 256;
const SCHEMA_CACHE_TTL: Duration = Duration::from_secs(24 * 3_600);
const VALIDATION_CACHE_CAPACITY: usize = 512;
const VALIDATION_CACHE_TTL: Duration = Duration::from_secs(900);

/// Cache of token estimates keyed by a digest of `(len, model, text)`.
///
/// Keys are the first 16 hex characters of `sha256("{len}:{model}:{text}")`
/// so the cache never retains the estimated text itself.
pub struct TokenCache {
    inner: TtlCache<String, usize>,
}

impl TokenCache {
    /// Create a token cache with the standard capacity and TTL.
    pub fn new() -> Self {
        Self {
            inner: TtlCache::new(TOKEN_CACHE_CAPACITY, TOKEN_CACHE_TTL),
        }
    }

    fn key(text: &str, model: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.len().to_string().as_bytes());
        hasher.update(b":");
        hasher.update(model.as_bytes());
        hasher.update(b":");
        hasher.update(text.as_bytes());
        let digest = hasher.finalize();
        let mut hex = String::with_capacity(16);
        for byte in &digest[..8] {
            hex.push_str(&format!("{byte:02x}"));
        }
        hex
    }

    /// Cached estimate for `(text, model)`, if present.
    pub fn get(&self, text: &str, model: &str) -> Option<usize> {
        self.inner.get(&Self::key(text, model))
    }

    /// Store an estimate.
    pub fn put(&self, text: &str, model: &str, tokens: usize) {
        self.inner.put(Self::key(text, model), tokens);
    }

    /// Cached estimate or `compute(text)`, stored on the way out.
    pub fn get_or_compute(&self, text: &str, model: &str, compute: impl FnOnce(&str) -> usize) -> usize {
        let key = Self::key(text, model);
        if let Some(tokens) = self.inner.get(&key) {
            return tokens;
        }
        let tokens = compute(text);
        self.inner.put(key, tokens);
        tokens
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.inner.clear();
    }

    /// Remove expired entries.
    pub fn cleanup(&self) -> usize {
        self.inner.cleanup()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache of generated tool input schemas keyed by `(tool, version)`.
///
/// The version component invalidates stale schemas when a tool descriptor
/// changes shape.
pub struct SchemaCache {
    inner: TtlCache<(String, String), serde_json::Value>,
}

impl SchemaCache {
    /// Create a schema cache with the standard capacity and TTL.
    pub fn new() -> Self {
        Self {
            inner: TtlCache::new(SCHEMA_CACHE_CAPACITY, SCHEMA_CACHE_TTL),
        }
    }

    /// Cached schema for `(tool, version)`, if present.
    pub fn get(&self, tool: &str, version: &str) -> Option<serde_json::Value> {
        self.inner.get(&(tool.to_string(), version.to_string()))
    }

    /// Cached schema or `build()`, stored on the way out.
    pub fn get_or_build(
        &self,
        tool: &str,
        version: &str,
        build: impl FnOnce() -> serde_json::Value,
    ) -> serde_json::Value {
        self.inner
            .get_or_insert_with((tool.to_string(), version.to_string()), build)
    }

    /// Drop every schema (e.g. on catalogue reconfiguration).
    pub fn invalidate_all(&self) {
        self.inner.clear();
    }

    /// Remove expired entries.
    pub fn cleanup(&self) -> usize {
        self.inner.cleanup()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cached availability verdict for a `(model, tool)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Whether the model resolved to an enabled provider.
    pub is_available: bool,
    /// Diagnostic for the negative case.
    pub error_message: Option<String>,
    /// Provider that answered for the positive case.
    pub provider_name: Option<String>,
}

/// Cache of model-validation verdicts and `auto`-mode resolutions.
///
/// Both positive and negative verdicts are cached: a hit returns the
/// recorded outcome without consulting the registry again.
pub struct ValidationCache {
    availability: TtlCache<(String, String), Verdict>,
    resolution: TtlCache<(String, ToolCategory), String>,
}

impl ValidationCache {
    /// Create a validation cache with the standard capacity and TTL.
    pub fn new() -> Self {
        Self {
            availability: TtlCache::new(VALIDATION_CACHE_CAPACITY, VALIDATION_CACHE_TTL),
            resolution: TtlCache::new(VALIDATION_CACHE_CAPACITY, VALIDATION_CACHE_TTL),
        }
    }

    /// Cached verdict for `(model, tool)`, if present.
    pub fn get_availability(&self, model: &str, tool: &str) -> Option<Verdict> {
        self.availability
            .get(&(model.to_string(), tool.to_string()))
    }

    /// Record a verdict for `(model, tool)`.
    pub fn put_availability(&self, model: &str, tool: &str, verdict: Verdict) {
        self.availability
            .put((model.to_string(), tool.to_string()), verdict);
    }

    /// Cached `auto` resolution for `(tool, category)`, if present.
    pub fn get_resolution(&self, tool: &str, category: ToolCategory) -> Option<String> {
        self.resolution.get(&(tool.to_string(), category))
    }

    /// Record an `auto` resolution for `(tool, category)`.
    pub fn put_resolution(&self, tool: &str, category: ToolCategory, model: String) {
        self.resolution.put((tool.to_string(), category), model);
    }

    /// Drop every entry mentioning `model` (availability side).
    pub fn invalidate_model(&self, model: &str) {
        // Availability keys embed the model name; the LRU map offers no
        // prefix scan, so clear both sides. Verdicts are cheap to rebuild.
        let _ = model;
        self.availability.clear();
        self.resolution.clear();
    }

    /// Remove expired entries on both sides.
    pub fn cleanup(&self) -> usize {
        self.availability.cleanup() + self.resolution.cleanup()
    }

    /// Combined counter snapshot.
    pub fn stats(&self) -> CacheStats {
        let a = self.availability.stats();
        let r = self.resolution.stats();
        CacheStats {
            hits: a.hits + r.hits,
            misses: a.misses + r.misses,
            evictions: a.evictions + r.evictions,
            len: a.len + r.len,
            capacity: a.capacity + r.capacity,
        }
    }
}

impl Default for ValidationCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_cache_round_trip() {
        let cache = TokenCache::new();
        assert_eq!(cache.get("hello", "o3"), None);
        cache.put("hello", "o3", 2);
        assert_eq!(cache.get("hello", "o3"), Some(2));
        // Different model, different key.
        assert_eq!(cache.get("hello", "flash"), None);
    }

    #[test]
    fn token_cache_key_is_16_hex_chars() {
        let key = TokenCache::key("some text", "model");
        assert_eq!(key.len(), 16);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn token_cache_get_or_compute_runs_once() {
        let cache = TokenCache::new();
        let mut calls = 0;
        let first = cache.get_or_compute("abcd", "m", |t| {
            calls += 1;
            t.len() / 4
        });
        let second = cache.get_or_compute("abcd", "m", |_| unreachable!());
        assert_eq!(first, 1);
        assert_eq!(second, 1);
        assert_eq!(calls, 1);
    }

    #[test]
    fn schema_cache_keyed_by_version() {
        let cache = SchemaCache::new();
        let v1 = cache.get_or_build("chat", "1", || serde_json::json!({"v": 1}));
        assert_eq!(v1["v"], 1);
        // Version bump misses the old entry.
        assert_eq!(cache.get("chat", "2"), None);
        assert_eq!(cache.get("chat", "1"), Some(v1));
    }

    #[test]
    fn validation_cache_returns_negative_verdicts() {
        let cache = ValidationCache::new();
        cache.put_availability(
            "o9",
            "debug",
            Verdict {
                is_available: false,
                error_message: Some("no provider".into()),
                provider_name: None,
            },
        );
        let verdict = cache.get_availability("o9", "debug").unwrap();
        assert!(!verdict.is_available);
        assert_eq!(verdict.error_message.as_deref(), Some("no provider"));
    }

    #[test]
    fn resolution_cache_keyed_by_tool_and_category() {
        let cache = ValidationCache::new();
        cache.put_resolution("debug", ToolCategory::ExtendedReasoning, "o3".into());
        assert_eq!(
            cache.get_resolution("debug", ToolCategory::ExtendedReasoning),
            Some("o3".into())
        );
        assert_eq!(cache.get_resolution("debug", ToolCategory::FastResponse), None);
    }
}

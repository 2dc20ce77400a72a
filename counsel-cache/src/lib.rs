#![deny(missing_docs)]
//! LRU+TTL caches for the counsel server.
//!
//! One generic cache ([`TtlCache`]) backs three process-wide stores: token
//! estimates, generated tool schemas, and model-validation verdicts. The
//! [`CacheManager`] aggregates their statistics and drives cadence-based
//! maintenance from the request path.

mod core;
mod manager;
mod stores;

pub use core::{CacheStats, TtlCache};
pub use manager::{CacheManager, GlobalCacheStats, CLEANUP_INTERVAL};
pub use stores::{SchemaCache, TokenCache, ValidationCache, Verdict};

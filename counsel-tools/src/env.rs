//! Shared execution environment threaded through every tool call.

use std::sync::Arc;

use counsel_budget::TokenEstimator;
use counsel_cache::CacheManager;
use counsel_conversation::ConversationStore;
use counsel_providers::{ModelResolver, ResolvedModel};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Process-wide services tools execute against.
///
/// One instance exists per server; tools receive it by reference rather
/// than reaching for ambient singletons.
pub struct ToolEnv {
    /// Model resolution over the provider registry.
    pub resolver: Arc<ModelResolver>,
    /// The conversation thread store.
    pub store: Arc<ConversationStore>,
    /// Token estimation over the shared cache.
    pub estimator: TokenEstimator,
    /// The three process caches and their maintenance cadence.
    pub caches: Arc<CacheManager>,
}

/// Per-request state attached by the request handler.
#[derive(Clone)]
pub struct CallContext {
    /// Model resolved for this request; `None` for tools that declare
    /// `requires_model = false`.
    pub resolved: Option<ResolvedModel>,
    /// Continuation id when the call resumes an existing thread.
    pub continuation_id: Option<Uuid>,
    /// Content budget left after history reconstruction.
    pub remaining_tokens: Option<usize>,
    /// Cooperative cancellation for provider calls and file streams.
    pub cancel: CancellationToken,
}

impl CallContext {
    /// A fresh context with nothing resolved and a live token.
    pub fn new() -> Self {
        Self {
            resolved: None,
            continuation_id: None,
            remaining_tokens: None,
            cancel: CancellationToken::new(),
        }
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

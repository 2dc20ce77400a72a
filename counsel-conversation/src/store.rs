//! The process-wide thread store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::thread::{Role, ThreadContext, Turn, TurnMeta, MAX_CONVERSATION_TURNS};

const STORE_CAPACITY: usize = 1_000;

/// In-memory thread store with TTL and capacity-driven eviction.
///
/// The outer map lock is held only for lookup; each thread carries its own
/// mutex so concurrent appends to one thread serialise while unrelated
/// threads proceed in parallel. Readers receive cloned snapshots, never
/// references into the store.
pub struct ConversationStore {
    threads: RwLock<HashMap<Uuid, Arc<Mutex<ThreadContext>>>>,
}

impl ConversationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            threads: RwLock::new(HashMap::new()),
        }
    }

    /// Create a thread for `tool_name`, stripping transient (underscore)
    /// keys from the stored initial context. Returns the new thread id.
    pub async fn create(
        &self,
        tool_name: &str,
        initial_args: &serde_json::Value,
        parent_thread_id: Option<Uuid>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let now = SystemTime::now();
        let initial_context = match initial_args.as_object() {
            Some(map) => {
                let clean: serde_json::Map<String, serde_json::Value> = map
                    .iter()
                    .filter(|(k, _)| !k.starts_with('_') && *k != "continuation_id")
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                serde_json::Value::Object(clean)
            }
            None => serde_json::json!({}),
        };
        let ctx = ThreadContext {
            id,
            tool_name: tool_name.to_string(),
            turns: Vec::new(),
            initial_context,
            parent_thread_id,
            created_at: now,
            last_activity_at: now,
        };

        let mut threads = self.threads.write().await;
        if threads.len() >= STORE_CAPACITY {
            evict_lru(&mut threads).await;
        }
        threads.insert(id, Arc::new(Mutex::new(ctx)));
        debug!(thread = %id, tool = tool_name, "thread created");
        id
    }

    /// Snapshot of a live thread; expired threads are removed and `None`
    /// is returned, indistinguishable from never-existed.
    pub async fn get(&self, id: Uuid) -> Option<ThreadContext> {
        let handle = {
            let threads = self.threads.read().await;
            threads.get(&id).cloned()
        }?;
        let ctx = handle.lock().await.clone();
        if ctx.is_expired(SystemTime::now()) {
            let mut threads = self.threads.write().await;
            threads.remove(&id);
            debug!(thread = %id, "thread expired on access");
            return None;
        }
        Some(ctx)
    }

    /// Append a turn. Returns `false` when the thread is missing, expired,
    /// or already at [`MAX_CONVERSATION_TURNS`]; the thread is unchanged in
    /// every `false` case.
    pub async fn add_turn(
        &self,
        id: Uuid,
        role: Role,
        content: impl Into<String>,
        meta: TurnMeta,
    ) -> bool {
        let handle = {
            let threads = self.threads.read().await;
            threads.get(&id).cloned()
        };
        let Some(handle) = handle else {
            warn!(thread = %id, "add_turn on unknown thread");
            return false;
        };

        let mut ctx = handle.lock().await;
        let now = SystemTime::now();
        if ctx.is_expired(now) {
            return false;
        }
        if ctx.turns.len() >= MAX_CONVERSATION_TURNS {
            debug!(thread = %id, "turn limit reached");
            return false;
        }
        ctx.turns.push(Turn {
            role,
            content: content.into(),
            timestamp: now,
            meta,
        });
        ctx.last_activity_at = now;
        true
    }

    /// Number of live-or-expired threads currently held.
    pub async fn len(&self) -> usize {
        self.threads.read().await.len()
    }

    /// Whether the store holds no threads.
    pub async fn is_empty(&self) -> bool {
        self.threads.read().await.is_empty()
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

async fn evict_lru(threads: &mut HashMap<Uuid, Arc<Mutex<ThreadContext>>>) {
    let mut oldest: Option<(Uuid, SystemTime)> = None;
    for (id, handle) in threads.iter() {
        let last = handle.lock().await.last_activity_at;
        if oldest.is_none_or(|(_, t)| last < t) {
            oldest = Some((*id, last));
        }
    }
    if let Some((id, _)) = oldest {
        threads.remove(&id);
        debug!(thread = %id, "evicted least recently used thread");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn create_strips_transient_keys() {
        let store = ConversationStore::new();
        let args = serde_json::json!({
            "prompt": "hi",
            "_model_context": {"x": 1},
            "_remaining_tokens": 12345,
            "continuation_id": "should-go",
        });
        let id = store.create("chat", &args, None).await;
        let ctx = store.get(id).await.unwrap();
        assert_eq!(ctx.initial_context["prompt"], "hi");
        assert!(ctx.initial_context.get("_model_context").is_none());
        assert!(ctx.initial_context.get("_remaining_tokens").is_none());
        assert!(ctx.initial_context.get("continuation_id").is_none());
    }

    #[tokio::test]
    async fn turns_append_in_order_with_timestamps() {
        let store = ConversationStore::new();
        let id = store.create("debug", &serde_json::json!({}), None).await;
        assert!(store.add_turn(id, Role::User, "q", TurnMeta::default()).await);
        assert!(
            store
                .add_turn(
                    id,
                    Role::Assistant,
                    "a",
                    TurnMeta {
                        model_name: Some("o3".into()),
                        ..Default::default()
                    }
                )
                .await
        );
        let ctx = store.get(id).await.unwrap();
        assert_eq!(ctx.turns.len(), 2);
        assert_eq!(ctx.turns[0].role, Role::User);
        assert_eq!(ctx.turns[1].meta.model_name.as_deref(), Some("o3"));
        assert!(ctx.turns[0].timestamp <= ctx.turns[1].timestamp);
    }

    #[tokio::test]
    async fn turn_limit_refuses_and_leaves_state_unchanged() {
        let store = ConversationStore::new();
        let id = store.create("debug", &serde_json::json!({}), None).await;
        for i in 0..MAX_CONVERSATION_TURNS {
            assert!(
                store
                    .add_turn(id, Role::User, format!("t{i}"), TurnMeta::default())
                    .await
            );
        }
        assert!(!store.add_turn(id, Role::User, "over", TurnMeta::default()).await);
        let ctx = store.get(id).await.unwrap();
        assert_eq!(ctx.turns.len(), MAX_CONVERSATION_TURNS);
    }

    #[tokio::test]
    async fn unknown_thread_is_none_and_add_fails() {
        let store = ConversationStore::new();
        let id = Uuid::new_v4();
        assert!(store.get(id).await.is_none());
        assert!(!store.add_turn(id, Role::User, "x", TurnMeta::default()).await);
    }

    #[tokio::test]
    async fn expired_thread_vanishes_on_access() {
        let store = ConversationStore::new();
        let id = store.create("chat", &serde_json::json!({}), None).await;
        {
            let threads = store.threads.read().await;
            let handle = threads.get(&id).unwrap();
            let mut ctx = handle.lock().await;
            ctx.last_activity_at = SystemTime::now() - (crate::THREAD_TTL + Duration::from_secs(5));
        }
        assert!(store.get(id).await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn concurrent_appends_serialise_per_thread() {
        let store = Arc::new(ConversationStore::new());
        let id = store.create("chat", &serde_json::json!({}), None).await;
        let mut handles = Vec::new();
        for i in 0..10 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .add_turn(id, Role::User, format!("turn-{i}"), TurnMeta::default())
                    .await
            }));
        }
        for h in handles {
            assert!(h.await.unwrap());
        }
        let ctx = store.get(id).await.unwrap();
        assert_eq!(ctx.turns.len(), 10);
        // Timestamps are non-decreasing in append order.
        for pair in ctx.turns.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }
}

//! Thread and turn data model.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hard cap on turns per thread; appends beyond it are refused.
pub const MAX_CONVERSATION_TURNS: usize = 20;

/// Idle lifetime of a thread; expired threads vanish lazily on access.
pub const THREAD_TTL: Duration = Duration::from_secs(3 * 3600);

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The MCP client (the driving agent).
    User,
    /// A model response produced through a tool.
    Assistant,
}

/// Optional attribution attached to a turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnMeta {
    /// Tool that produced or received the turn.
    pub tool_name: Option<String>,
    /// Model that generated an assistant turn.
    pub model_name: Option<String>,
    /// Provider that served the model.
    pub model_provider: Option<String>,
    /// Absolute file paths referenced by this turn.
    pub files: Vec<String>,
    /// Absolute image paths referenced by this turn.
    pub images: Vec<String>,
}

/// One immutable conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Author role.
    pub role: Role,
    /// Turn body.
    pub content: String,
    /// Append time.
    pub timestamp: SystemTime,
    /// Attribution and file references.
    #[serde(flatten)]
    pub meta: TurnMeta,
}

/// A conversation thread owned by the [`crate::ConversationStore`].
///
/// Handlers only ever receive cloned snapshots; mutation goes through the
/// store's append-only operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadContext {
    /// Thread id, returned to clients as the continuation id.
    pub id: Uuid,
    /// Tool that created the thread.
    pub tool_name: String,
    /// Ordered turns, oldest first.
    pub turns: Vec<Turn>,
    /// Arguments from the first call, transient keys stripped.
    pub initial_context: serde_json::Value,
    /// Parent thread for chained conversations; traversal is manual.
    pub parent_thread_id: Option<Uuid>,
    /// Creation time.
    pub created_at: SystemTime,
    /// Last mutation or read-for-continuation time; drives the TTL.
    pub last_activity_at: SystemTime,
}

impl ThreadContext {
    /// Whether the thread has outlived [`THREAD_TTL`] as of `now`.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        now.duration_since(self.last_activity_at)
            .map(|idle| idle > THREAD_TTL)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freshly_touched_thread_is_live() {
        let now = SystemTime::now();
        let ctx = ThreadContext {
            id: Uuid::new_v4(),
            tool_name: "chat".into(),
            turns: vec![],
            initial_context: serde_json::json!({}),
            parent_thread_id: None,
            created_at: now,
            last_activity_at: now,
        };
        assert!(!ctx.is_expired(now));
        assert!(ctx.is_expired(now + THREAD_TTL + Duration::from_secs(1)));
    }
}

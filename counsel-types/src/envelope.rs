//! The uniform response envelope returned for success and failure alike.

use serde::{Deserialize, Serialize};

/// How the `content` field of a [`ToolOutput`] should be interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// Plain prose.
    #[default]
    Text,
    /// A JSON document serialised into the content string.
    Json,
    /// Markdown prose.
    Markdown,
}

/// The single payload shape every tool call returns.
///
/// Clients parse one envelope for both success and error paths: free-form
/// messages live under `content`, machine-consumable context under
/// `metadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Outcome marker, e.g. `"success"`, `"error"`, `"code_too_large"`.
    pub status: String,
    /// Human-readable body.
    pub content: String,
    /// Interpretation of `content`.
    #[serde(default)]
    pub content_type: ContentType,
    /// Structured context for programmatic consumers.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
    /// Continuation id offered to the caller, when a thread exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_id: Option<String>,
}

impl ToolOutput {
    /// A `success` envelope with plain-text content.
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            status: "success".into(),
            content: content.into(),
            content_type: ContentType::Text,
            metadata: serde_json::Value::Null,
            continuation_id: None,
        }
    }

    /// An `error` envelope with plain-text content.
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            status: "error".into(),
            content: content.into(),
            content_type: ContentType::Text,
            metadata: serde_json::Value::Null,
            continuation_id: None,
        }
    }

    /// Attach structured metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Attach a continuation id.
    pub fn with_continuation(mut self, id: impl Into<String>) -> Self {
        self.continuation_id = Some(id.into());
        self
    }
}

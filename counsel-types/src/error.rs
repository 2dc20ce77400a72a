//! Error types for all counsel crates.

use std::path::PathBuf;
use std::time::Duration;

/// Errors from LLM provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    // Retryable errors
    /// Network-level error (connection reset, DNS failure, etc.).
    #[error("network error: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// Rate limited by the provider.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimit {
        /// Suggested retry delay, if provided by the API.
        retry_after: Option<Duration>,
    },
    /// Request exceeded the per-category wall-clock deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    /// Provider service is temporarily unavailable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    // Terminal errors
    /// Authentication/authorization failure.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// Malformed or invalid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Requested model does not exist at this provider.
    #[error("model not found: {0}")]
    ModelNotFound(String),
    /// The call was cancelled via its cancellation token.
    #[error("cancelled")]
    Cancelled,

    /// Any other provider error.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl ProviderError {
    /// Whether this error is likely transient and the request can be retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_)
                | Self::RateLimit { .. }
                | Self::Timeout(_)
                | Self::ServiceUnavailable(_)
        )
    }
}

/// Errors from sandboxed file access.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    /// A relative path was supplied where an absolute one is required.
    #[error("relative paths are not supported, provide an absolute path: {0}")]
    RelativePath(PathBuf),
    /// The resolved path lands in a denied location.
    #[error("access to system directory denied: {0}")]
    DeniedPath(PathBuf),
    /// The path contains a traversal or encoding attack pattern.
    #[error("suspicious path rejected: {0}")]
    SuspiciousPath(PathBuf),
    /// The path is a user home directory root.
    #[error("cannot scan entire home directory: {0}")]
    HomeDirectoryRoot(PathBuf),
    /// The file exceeds the configured size cap.
    #[error("file too large: {path} ({size} bytes, max {max})")]
    TooLarge {
        /// Offending file.
        path: PathBuf,
        /// Observed size in bytes.
        size: u64,
        /// Configured cap in bytes.
        max: u64,
    },
    /// The read was cancelled via its cancellation token.
    #[error("cancelled")]
    Cancelled,
    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from token estimation.
#[derive(Debug, thiserror::Error)]
pub enum EstimateError {
    /// The target model cannot process this file type; the caller must
    /// decide; partial inclusion is not performed.
    #[error("model {model} cannot process {kind} content: {path}")]
    UnsupportedContentType {
        /// The resolved model name.
        model: String,
        /// Detected content kind (e.g. `"audio"`, `"binary"`).
        kind: String,
        /// Offending file.
        path: PathBuf,
    },
    /// PDF could not be parsed for page geometry.
    #[error("pdf parse failed for {path}: {reason}")]
    PdfParse {
        /// Offending file.
        path: PathBuf,
        /// Parser diagnostic.
        reason: String,
    },
    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the request handler as structured envelopes.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// Malformed arguments, missing required field, or a step-1
    /// precondition not met.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Tool name not present in the (possibly filtered) catalogue.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    /// `continuation_id` absent from the store or expired.
    #[error("{0}")]
    UnknownContinuation(String),
    /// Resolved model not registered with any enabled provider.
    #[error("{0}")]
    ModelUnavailable(String),
    /// Expert response was expected to be JSON but was not.
    #[error("expert response was not valid JSON: {0}")]
    ExpertParse(String),
    /// Upstream provider failure.
    #[error("provider failure: {0}")]
    Provider(#[from] ProviderError),
    /// File access failure.
    #[error("file error: {0}")]
    File(#[from] FileError),
    /// Token estimation failure.
    #[error("estimate error: {0}")]
    Estimate(#[from] EstimateError),
    /// All other unexpected conditions.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors raised while reading environment configuration at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No provider API key or custom endpoint was configured.
    #[error("no provider configured: {0}")]
    NoProviders(String),
    /// An environment variable held an unusable value.
    #[error("invalid value for {name}: {reason}")]
    InvalidValue {
        /// Variable name.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(ProviderError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(ProviderError::RateLimit { retry_after: None }.is_retryable());
        assert!(!ProviderError::Authentication("bad key".into()).is_retryable());
        assert!(!ProviderError::Cancelled.is_retryable());
    }

    #[test]
    fn file_error_display_names_the_path() {
        let err = FileError::RelativePath(PathBuf::from("src/main.rs"));
        assert!(err.to_string().contains("src/main.rs"));
    }
}

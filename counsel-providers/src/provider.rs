//! The object-safe provider abstraction.

use std::time::Duration;

use async_trait::async_trait;
use counsel_types::{
    GenerationRequest, GenerationResponse, ModelCapabilities, ProviderError, ToolCategory,
};
use tokio_util::sync::CancellationToken;

/// Default wall-clock deadline for a provider call by tool category.
pub fn timeout_for(category: ToolCategory) -> Duration {
    match category {
        ToolCategory::FastResponse => Duration::from_secs(30),
        ToolCategory::ExtendedReasoning => Duration::from_secs(180),
    }
}

/// A configured upstream model provider.
///
/// Implementations answer capability questions synchronously from static
/// tables; only [`generate`](ModelProvider::generate) performs I/O. The
/// model names a provider claims are already filtered by any configured
/// allow-list.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Stable provider identifier (e.g. `"openai"`, `"custom"`).
    fn name(&self) -> &str;

    /// Models this provider will serve, canonical names only.
    fn known_models(&self) -> Vec<String>;

    /// Whether this provider claims the given model name or alias.
    fn supports_model(&self, model: &str) -> bool;

    /// Capability descriptor for a claimed model.
    fn capabilities(&self, model: &str) -> Option<ModelCapabilities>;

    /// Preferred model for a tool category, used by `auto` resolution.
    fn preferred_model(&self, category: ToolCategory) -> Option<String>;

    /// Run one generation, honouring the deadline and the cancellation
    /// token. Cancellation must surface as [`ProviderError::Cancelled`],
    /// the deadline as [`ProviderError::Timeout`].
    async fn generate(
        &self,
        request: &GenerationRequest,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<GenerationResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn _assert_object_safe(_: Arc<dyn ModelProvider>) {}

    #[test]
    fn extended_reasoning_gets_the_long_deadline() {
        assert!(timeout_for(ToolCategory::ExtendedReasoning) > timeout_for(ToolCategory::FastResponse));
    }
}

//! `model[:option]` parsing and resolution to a concrete provider.

use std::sync::Arc;

use counsel_cache::{ValidationCache, Verdict};
use counsel_types::{ModelCapabilities, ToolCategory};
use tracing::{debug, info};

use crate::provider::ModelProvider;
use crate::registry::ProviderRegistry;

/// Aggregator suffixes that stay part of the model name rather than being
/// split off as an option.
const AGGREGATOR_SUFFIXES: &[&str] = &["free", "beta", "preview", "extended", "nitro"];

/// Parse `name[:option]` syntax.
///
/// URL-bearing strings are never split; vendor-prefixed names keep a known
/// aggregator flavour (`openai/gpt-4o:free`) as part of the name; anything
/// else splits on the first colon.
pub fn parse_model_option(model_string: &str) -> (String, Option<String>) {
    let trimmed = model_string.trim();
    if trimmed.contains("://") || !trimmed.contains(':') {
        return (trimmed.to_string(), None);
    }

    if trimmed.contains('/') && trimmed.matches(':').count() == 1 {
        let (name, suffix) = trimmed.split_once(':').unwrap_or((trimmed, ""));
        let flavour = suffix.trim().to_ascii_lowercase();
        if AGGREGATOR_SUFFIXES.contains(&flavour.as_str()) {
            return (trimmed.to_string(), None);
        }
        return (name.trim().to_string(), Some(suffix.trim().to_string()));
    }

    let (name, option) = trimmed.split_once(':').unwrap_or((trimmed, ""));
    (name.trim().to_string(), Some(option.trim().to_string()))
}

/// Re-emit a parsed `(name, option)` pair.
pub fn format_model_option(name: &str, option: Option<&str>) -> String {
    match option {
        Some(option) => format!("{name}:{option}"),
        None => name.to_string(),
    }
}

/// A model resolved for one request: concrete name, optional flavour, the
/// owning provider handle, and its capabilities.
#[derive(Clone)]
pub struct ResolvedModel {
    /// Concrete model name (never `auto`).
    pub name: String,
    /// Option split off the input, e.g. a consensus stance or local tag.
    pub option: Option<String>,
    /// Non-owning handle into the provider registry.
    pub provider: Arc<dyn ModelProvider>,
    /// Capability descriptor for the resolved model.
    pub capabilities: ModelCapabilities,
}

impl std::fmt::Debug for ResolvedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedModel")
            .field("name", &self.name)
            .field("option", &self.option)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// Resolves logical model names against the registry, caching `auto`
/// resolutions and availability verdicts.
pub struct ModelResolver {
    registry: Arc<ProviderRegistry>,
    validation: Arc<ValidationCache>,
}

impl ModelResolver {
    /// Create a resolver over the registry and the shared validation cache.
    pub fn new(registry: Arc<ProviderRegistry>, validation: Arc<ValidationCache>) -> Self {
        Self {
            registry,
            validation,
        }
    }

    /// The underlying registry handle.
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Resolve `auto` to a concrete model for the tool's category.
    pub fn resolve_auto(&self, tool_name: &str, category: ToolCategory) -> String {
        if let Some(model) = self.validation.get_resolution(tool_name, category) {
            debug!(tool = tool_name, model, "auto resolution cache hit");
            return model;
        }
        let model = self.registry.preferred_fallback_model(category);
        self.validation
            .put_resolution(tool_name, category, model.clone());
        info!(tool = tool_name, category = category.as_str(), model, "auto mode resolved");
        model
    }

    /// Resolve a caller-supplied model string into a provider-backed
    /// [`ResolvedModel`], or a diagnostic message naming what is
    /// configured.
    ///
    /// Verdicts (positive and negative) are cached per `(model, tool)`;
    /// a cache hit returns the recorded outcome without consulting the
    /// registry.
    pub fn resolve(
        &self,
        model_string: &str,
        tool_name: &str,
        category: ToolCategory,
    ) -> Result<ResolvedModel, String> {
        let (mut name, option) = parse_model_option(model_string);
        if name.eq_ignore_ascii_case("auto") {
            name = self.resolve_auto(tool_name, category);
        }

        if let Some(verdict) = self.validation.get_availability(&name, tool_name) {
            if !verdict.is_available {
                return Err(verdict
                    .error_message
                    .unwrap_or_else(|| format!("Model '{name}' is not available")));
            }
            // Positive verdict: the provider lookup below is a pure map
            // walk, cheap enough to redo for the handle.
        }

        let Some(provider) = self.registry.provider_for_model(&name) else {
            let message = self.unavailable_message(&name, tool_name, category);
            self.validation.put_availability(
                &name,
                tool_name,
                Verdict {
                    is_available: false,
                    error_message: Some(message.clone()),
                    provider_name: None,
                },
            );
            return Err(message);
        };

        let capabilities = provider
            .capabilities(&name)
            .unwrap_or_else(ModelCapabilities::conservative);
        self.validation.put_availability(
            &name,
            tool_name,
            Verdict {
                is_available: true,
                error_message: None,
                provider_name: Some(provider.name().to_string()),
            },
        );

        Ok(ResolvedModel {
            name,
            option,
            provider,
            capabilities,
        })
    }

    fn unavailable_message(&self, model: &str, tool_name: &str, category: ToolCategory) -> String {
        let available: Vec<String> = self
            .registry
            .available_models()
            .into_iter()
            .map(|(model, _)| model)
            .collect();
        let suggested = self.registry.preferred_fallback_model(category);
        format!(
            "Model '{model}' is not available with current API keys. \
             Available models: {}. Suggested model for {tool_name}: '{suggested}' \
             (category: {})",
            available.join(", "),
            category.as_str()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ProviderSettings;

    fn resolver() -> ModelResolver {
        let mut settings = ProviderSettings::default();
        settings.openai_api_key = Some("sk-test".into());
        let registry = Arc::new(ProviderRegistry::from_settings(&settings).unwrap());
        ModelResolver::new(registry, Arc::new(ValidationCache::new()))
    }

    #[test]
    fn plain_names_pass_through() {
        assert_eq!(parse_model_option("o3"), ("o3".into(), None));
        assert_eq!(parse_model_option("  flash  "), ("flash".into(), None));
    }

    #[test]
    fn options_split_on_first_colon() {
        assert_eq!(
            parse_model_option("llama3.2:latest"),
            ("llama3.2".into(), Some("latest".into()))
        );
        assert_eq!(
            parse_model_option("o3:for"),
            ("o3".into(), Some("for".into()))
        );
    }

    #[test]
    fn aggregator_flavours_stay_in_the_name() {
        assert_eq!(
            parse_model_option("openai/gpt-4o:free"),
            ("openai/gpt-4o:free".into(), None)
        );
        assert_eq!(
            parse_model_option("openai/gpt-4o:for"),
            ("openai/gpt-4o".into(), Some("for".into()))
        );
    }

    #[test]
    fn urls_are_never_split() {
        assert_eq!(
            parse_model_option("http://localhost:11434"),
            ("http://localhost:11434".into(), None)
        );
    }

    #[test]
    fn parse_then_format_is_identity() {
        for input in ["o3", "llama3.2:latest", "openai/gpt-4o:free", "flash"] {
            let (name, option) = parse_model_option(input);
            assert_eq!(format_model_option(&name, option.as_deref()), input);
        }
    }

    #[test]
    fn auto_resolves_by_category_and_caches() {
        let r = resolver();
        let model = r.resolve_auto("debug", ToolCategory::ExtendedReasoning);
        assert_eq!(model, "o3");
        // Second call is served from the cache.
        assert_eq!(r.resolve_auto("debug", ToolCategory::ExtendedReasoning), "o3");
    }

    #[test]
    fn unknown_model_yields_diagnostic_with_suggestions() {
        let r = resolver();
        let err = r
            .resolve("made-up-model", "debug", ToolCategory::ExtendedReasoning)
            .unwrap_err();
        assert!(err.contains("made-up-model"));
        assert!(err.contains("Available models"));
        assert!(err.contains("o3"));
        // Negative verdict is cached.
        let err2 = r
            .resolve("made-up-model", "debug", ToolCategory::ExtendedReasoning)
            .unwrap_err();
        assert_eq!(err, err2);
    }

    #[test]
    fn resolve_attaches_capabilities_and_provider() {
        let r = resolver();
        let resolved = r
            .resolve("auto", "chat", ToolCategory::FastResponse)
            .unwrap();
        assert_eq!(resolved.name, "o4-mini");
        assert_eq!(resolved.provider.name(), "openai");
        assert_eq!(resolved.capabilities.context_window, 200_000);
        assert!(resolved.option.is_none());
    }
}

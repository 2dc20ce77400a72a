//! Environment-driven provider detection and the priority-ordered registry.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use counsel_types::{
    ConfigError, GenerationRequest, GenerationResponse, ModelCapabilities, ProviderError,
    ToolCategory,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::catalog::{self, ModelEntry};
use crate::http::OpenAiCompatClient;
use crate::provider::ModelProvider;

const GOOGLE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const XAI_BASE_URL: &str = "https://api.x.ai/v1";
const DIAL_BASE_URL: &str = "https://core.dialx.ai/v1";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_CUSTOM_MODEL: &str = "llama3.2";

/// Raw provider configuration, normally read from the environment.
///
/// Kept as a plain struct so tests can construct configurations without
/// touching process env vars.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    /// `GEMINI_API_KEY`.
    pub gemini_api_key: Option<String>,
    /// `OPENAI_API_KEY`.
    pub openai_api_key: Option<String>,
    /// `XAI_API_KEY`.
    pub xai_api_key: Option<String>,
    /// `DIAL_API_KEY`.
    pub dial_api_key: Option<String>,
    /// `OPENROUTER_API_KEY`.
    pub openrouter_api_key: Option<String>,
    /// `CUSTOM_API_URL`; enables the custom endpoint when set.
    pub custom_api_url: Option<String>,
    /// `CUSTOM_API_KEY`; empty is valid (local endpoints).
    pub custom_api_key: String,
    /// `CUSTOM_MODEL_NAME`.
    pub custom_model_name: String,
    /// `<PROVIDER>_ALLOWED_MODELS` allow-lists, keyed by provider name.
    pub allowed_models: HashMap<String, HashSet<String>>,
}

impl ProviderSettings {
    /// Read the settings from process environment variables.
    pub fn from_env() -> Self {
        let mut allowed_models = HashMap::new();
        for provider in ["google", "openai", "xai", "dial", "openrouter", "custom"] {
            let var = format!("{}_ALLOWED_MODELS", provider.to_ascii_uppercase());
            if let Ok(value) = std::env::var(&var) {
                let set: HashSet<String> = value
                    .split(',')
                    .map(|m| m.trim().to_ascii_lowercase())
                    .filter(|m| !m.is_empty())
                    .collect();
                if !set.is_empty() {
                    allowed_models.insert(provider.to_string(), set);
                }
            }
        }
        Self {
            gemini_api_key: std::env::var("GEMINI_API_KEY").ok(),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            xai_api_key: std::env::var("XAI_API_KEY").ok(),
            dial_api_key: std::env::var("DIAL_API_KEY").ok(),
            openrouter_api_key: std::env::var("OPENROUTER_API_KEY").ok(),
            custom_api_url: std::env::var("CUSTOM_API_URL").ok(),
            custom_api_key: std::env::var("CUSTOM_API_KEY").unwrap_or_default(),
            custom_model_name: std::env::var("CUSTOM_MODEL_NAME")
                .unwrap_or_else(|_| DEFAULT_CUSTOM_MODEL.to_string()),
            allowed_models,
        }
    }
}

/// A key counts only when present, non-empty, and not the placeholder the
/// sample configuration ships with.
fn real_key(value: &Option<String>) -> Option<String> {
    let value = value.as_deref()?.trim();
    if value.is_empty() {
        return None;
    }
    if value.starts_with("your_") && value.ends_with("_here") {
        return None;
    }
    Some(value.to_string())
}

/// Table-backed provider sharing the OpenAI-compatible wire client.
struct TableProvider {
    name: &'static str,
    entries: Vec<ModelEntry>,
    allowed: Option<HashSet<String>>,
    client: OpenAiCompatClient,
}

impl TableProvider {
    fn canonical(&self, model: &str) -> Option<&ModelEntry> {
        let lower = model.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|e| e.name == lower || e.aliases.contains(&lower.as_str()))
    }

    fn allows(&self, canonical_name: &str) -> bool {
        match &self.allowed {
            Some(set) => set.contains(canonical_name),
            None => true,
        }
    }
}

#[async_trait]
impl ModelProvider for TableProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn known_models(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| self.allows(e.name))
            .map(|e| e.name.to_string())
            .collect()
    }

    fn supports_model(&self, model: &str) -> bool {
        self.canonical(model).is_some_and(|e| self.allows(e.name))
    }

    fn capabilities(&self, model: &str) -> Option<ModelCapabilities> {
        let entry = self.canonical(model)?;
        self.allows(entry.name).then(|| entry.caps.clone())
    }

    fn preferred_model(&self, category: ToolCategory) -> Option<String> {
        let preferred = catalog::preferred(self.name, category)?;
        self.supports_model(preferred).then(|| preferred.to_string())
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<GenerationResponse, ProviderError> {
        let mut request = request.clone();
        if let Some(entry) = self.canonical(&request.model_name) {
            request.model_name = entry.name.to_string();
        }
        self.client.generate(&request, timeout, cancel).await
    }
}

/// The OpenRouter aggregator: claims any vendor-prefixed model name.
struct OpenRouterProvider {
    allowed: Option<HashSet<String>>,
    client: OpenAiCompatClient,
}

impl OpenRouterProvider {
    fn allows(&self, model: &str) -> bool {
        match &self.allowed {
            Some(set) => set.contains(&model.to_ascii_lowercase()),
            None => true,
        }
    }
}

#[async_trait]
impl ModelProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    fn known_models(&self) -> Vec<String> {
        match &self.allowed {
            Some(set) => {
                let mut models: Vec<String> = set.iter().cloned().collect();
                models.sort();
                models
            }
            None => vec![
                "anthropic/claude-sonnet-4".into(),
                "openai/gpt-4o".into(),
                "openai/o3".into(),
                "google/gemini-2.5-flash".into(),
            ],
        }
    }

    fn supports_model(&self, model: &str) -> bool {
        model.contains('/') && self.allows(model)
    }

    fn capabilities(&self, model: &str) -> Option<ModelCapabilities> {
        if !self.supports_model(model) {
            return None;
        }
        Some(catalog::openrouter_known(model).unwrap_or_else(ModelCapabilities::conservative))
    }

    fn preferred_model(&self, category: ToolCategory) -> Option<String> {
        let preferred = catalog::preferred("openrouter", category)?;
        self.supports_model(preferred).then(|| preferred.to_string())
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<GenerationResponse, ProviderError> {
        self.client.generate(request, timeout, cancel).await
    }
}

/// A single OpenAI-compatible endpoint serving one configured model
/// (Ollama, vLLM, LM Studio, enterprise gateways).
struct CustomProvider {
    model_name: String,
    client: OpenAiCompatClient,
}

#[async_trait]
impl ModelProvider for CustomProvider {
    fn name(&self) -> &str {
        "custom"
    }

    fn known_models(&self) -> Vec<String> {
        vec![self.model_name.clone()]
    }

    fn supports_model(&self, model: &str) -> bool {
        model.eq_ignore_ascii_case(&self.model_name)
    }

    fn capabilities(&self, model: &str) -> Option<ModelCapabilities> {
        self.supports_model(model)
            .then(ModelCapabilities::conservative)
    }

    fn preferred_model(&self, _category: ToolCategory) -> Option<String> {
        Some(self.model_name.clone())
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<GenerationResponse, ProviderError> {
        self.client.generate(request, timeout, cancel).await
    }
}

/// Priority-ordered set of enabled providers.
///
/// Lookup walks providers in registration order, so native APIs answer for
/// their models before the custom endpoint, which answers before the
/// OpenRouter catch-all.
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn ModelProvider>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers.len())
            .finish()
    }
}

impl ProviderRegistry {
    /// Build the registry from settings, enforcing the priority order and
    /// the at-least-one-provider startup requirement.
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, ConfigError> {
        let mut providers: Vec<Arc<dyn ModelProvider>> = Vec::new();
        let mut enabled: Vec<&str> = Vec::new();

        // 1. Native APIs, most direct first.
        if let Some(key) = real_key(&settings.gemini_api_key) {
            providers.push(Arc::new(TableProvider {
                name: "google",
                entries: catalog::google_models(),
                allowed: settings.allowed_models.get("google").cloned(),
                client: OpenAiCompatClient::new("google", GOOGLE_BASE_URL, key),
            }));
            enabled.push("google");
        }
        if let Some(key) = real_key(&settings.openai_api_key) {
            providers.push(Arc::new(TableProvider {
                name: "openai",
                entries: catalog::openai_models(),
                allowed: settings.allowed_models.get("openai").cloned(),
                client: OpenAiCompatClient::new("openai", OPENAI_BASE_URL, key),
            }));
            enabled.push("openai");
        }
        if let Some(key) = real_key(&settings.xai_api_key) {
            providers.push(Arc::new(TableProvider {
                name: "xai",
                entries: catalog::xai_models(),
                allowed: settings.allowed_models.get("xai").cloned(),
                client: OpenAiCompatClient::new("xai", XAI_BASE_URL, key),
            }));
            enabled.push("xai");
        }
        if let Some(key) = real_key(&settings.dial_api_key) {
            providers.push(Arc::new(TableProvider {
                name: "dial",
                entries: catalog::dial_models(),
                allowed: settings.allowed_models.get("dial").cloned(),
                client: OpenAiCompatClient::new("dial", DIAL_BASE_URL, key),
            }));
            enabled.push("dial");
        }

        // 2. Custom endpoint for local/private models. The key may be
        // empty; Ollama-style endpoints accept unauthenticated calls.
        if let Some(url) = settings.custom_api_url.as_deref().filter(|u| !u.trim().is_empty()) {
            let model_name = if settings.custom_model_name.is_empty() {
                DEFAULT_CUSTOM_MODEL.to_string()
            } else {
                settings.custom_model_name.clone()
            };
            providers.push(Arc::new(CustomProvider {
                model_name,
                client: OpenAiCompatClient::new("custom", url, settings.custom_api_key.clone()),
            }));
            enabled.push("custom");
        }

        // 3. OpenRouter last, as the catch-all.
        if let Some(key) = real_key(&settings.openrouter_api_key) {
            providers.push(Arc::new(OpenRouterProvider {
                allowed: settings.allowed_models.get("openrouter").cloned(),
                client: OpenAiCompatClient::new("openrouter", OPENROUTER_BASE_URL, key),
            }));
            enabled.push("openrouter");
        }

        if providers.is_empty() {
            return Err(ConfigError::NoProviders(
                "set GEMINI_API_KEY, OPENAI_API_KEY, XAI_API_KEY, DIAL_API_KEY, \
                 OPENROUTER_API_KEY, or CUSTOM_API_URL"
                    .into(),
            ));
        }

        info!(providers = ?enabled, "provider registry configured");
        Ok(Self { providers })
    }

    /// Registry over explicit providers, for tests and embedding.
    pub fn with_providers(providers: Vec<Arc<dyn ModelProvider>>) -> Self {
        Self { providers }
    }

    /// First provider claiming the model, in priority order.
    pub fn provider_for_model(&self, model: &str) -> Option<Arc<dyn ModelProvider>> {
        self.providers
            .iter()
            .find(|p| p.supports_model(model))
            .cloned()
    }

    /// All `(model, provider)` pairs visible to clients, priority order,
    /// first claim wins.
    pub fn available_models(&self) -> Vec<(String, String)> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut out = Vec::new();
        for provider in &self.providers {
            for model in provider.known_models() {
                if seen.insert(model.clone()) {
                    out.push((model, provider.name().to_string()));
                }
            }
        }
        out
    }

    /// Preferred concrete model for a category, used by `auto` mode.
    pub fn preferred_fallback_model(&self, category: ToolCategory) -> String {
        for provider in &self.providers {
            if let Some(model) = provider.preferred_model(category) {
                return model;
            }
        }
        // Some provider exists (construction guarantees it); fall back to
        // whatever it lists first.
        self.providers
            .iter()
            .flat_map(|p| p.known_models())
            .next()
            .unwrap_or_else(|| "gemini-2.5-flash".to_string())
    }

    /// Enabled provider names, priority order.
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with(f: impl FnOnce(&mut ProviderSettings)) -> ProviderSettings {
        let mut s = ProviderSettings::default();
        f(&mut s);
        s
    }

    #[test]
    fn no_keys_means_no_registry() {
        let err = ProviderRegistry::from_settings(&ProviderSettings::default()).unwrap_err();
        assert!(matches!(err, ConfigError::NoProviders(_)));
    }

    #[test]
    fn placeholder_keys_are_ignored() {
        let s = settings_with(|s| {
            s.openai_api_key = Some("your_openai_api_key_here".into());
        });
        assert!(ProviderRegistry::from_settings(&s).is_err());
    }

    #[test]
    fn custom_endpoint_counts_with_empty_key() {
        let s = settings_with(|s| {
            s.custom_api_url = Some("http://localhost:11434/v1".into());
        });
        let registry = ProviderRegistry::from_settings(&s).unwrap();
        assert_eq!(registry.provider_names(), vec!["custom"]);
        assert!(registry.provider_for_model("llama3.2").is_some());
    }

    #[test]
    fn native_apis_outrank_openrouter() {
        let s = settings_with(|s| {
            s.openai_api_key = Some("sk-test".into());
            s.openrouter_api_key = Some("or-test".into());
        });
        let registry = ProviderRegistry::from_settings(&s).unwrap();
        assert_eq!(registry.provider_names(), vec!["openai", "openrouter"]);
        // Bare name goes native; vendor-prefixed goes to the aggregator.
        assert_eq!(registry.provider_for_model("o3").unwrap().name(), "openai");
        assert_eq!(
            registry.provider_for_model("openai/o3").unwrap().name(),
            "openrouter"
        );
    }

    #[test]
    fn aliases_resolve_to_canonical_models() {
        let s = settings_with(|s| {
            s.gemini_api_key = Some("gk".into());
        });
        let registry = ProviderRegistry::from_settings(&s).unwrap();
        let provider = registry.provider_for_model("flash").unwrap();
        assert_eq!(provider.name(), "google");
        assert_eq!(
            provider.capabilities("flash").unwrap().context_window,
            1_048_576
        );
    }

    #[test]
    fn allow_list_hides_other_models() {
        let s = settings_with(|s| {
            s.openai_api_key = Some("sk-test".into());
            s.allowed_models
                .insert("openai".into(), HashSet::from(["o3".to_string()]));
        });
        let registry = ProviderRegistry::from_settings(&s).unwrap();
        assert!(registry.provider_for_model("o3").is_some());
        assert!(registry.provider_for_model("gpt-4o").is_none());
        let models = registry.available_models();
        assert_eq!(models, vec![("o3".to_string(), "openai".to_string())]);
    }

    #[test]
    fn preferred_fallback_follows_priority_order() {
        let s = settings_with(|s| {
            s.gemini_api_key = Some("gk".into());
            s.openai_api_key = Some("sk".into());
        });
        let registry = ProviderRegistry::from_settings(&s).unwrap();
        assert_eq!(
            registry.preferred_fallback_model(ToolCategory::ExtendedReasoning),
            "gemini-2.5-pro"
        );
        assert_eq!(
            registry.preferred_fallback_model(ToolCategory::FastResponse),
            "gemini-2.5-flash"
        );
    }
}

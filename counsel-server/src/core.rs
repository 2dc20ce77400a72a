//! The single struct holding every process-wide store.

use std::sync::Arc;

use counsel_budget::TokenEstimator;
use counsel_cache::CacheManager;
use counsel_conversation::ConversationStore;
use counsel_providers::{ModelResolver, ProviderRegistry, ProviderSettings};
use counsel_tools::ToolEnv;
use counsel_types::ConfigError;
use counsel_workflow::WorkflowEngine;

use crate::catalogue::Catalogue;
use crate::config::ServerConfig;

/// Process-wide state: configuration, the tool environment (resolver,
/// store, estimator, caches), the workflow engine, and the catalogue.
///
/// Handlers receive this explicitly; nothing in the core is a global.
pub struct Core {
    /// Environment-derived configuration.
    pub config: ServerConfig,
    /// Shared services tools execute against.
    pub env: ToolEnv,
    /// The workflow state machine.
    pub engine: WorkflowEngine,
    /// The advertised tool set.
    pub catalogue: Catalogue,
}

impl Core {
    /// Assemble a core over an already-built provider registry.
    pub fn new(config: ServerConfig, registry: Arc<ProviderRegistry>) -> Self {
        let caches = Arc::new(CacheManager::new());
        let env = ToolEnv {
            resolver: Arc::new(ModelResolver::new(registry, caches.validation())),
            store: Arc::new(ConversationStore::new()),
            estimator: TokenEstimator::new(caches.token()),
            caches,
        };
        let catalogue = Catalogue::build(&config.disabled_tools);
        Self {
            config,
            env,
            engine: WorkflowEngine::new(),
            catalogue,
        }
    }

    /// Assemble a core entirely from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = ServerConfig::from_env()?;
        let registry = Arc::new(ProviderRegistry::from_settings(&ProviderSettings::from_env())?);
        Ok(Self::new(config, registry))
    }
}

#![deny(missing_docs)]
//! Provider registry and model resolution for counsel.
//!
//! Providers are detected from environment keys at startup and registered
//! in a fixed priority order: native APIs first, then a custom
//! OpenAI-compatible endpoint, then the OpenRouter aggregator as the
//! catch-all. A logical model name (including the `auto` sentinel) resolves
//! through the registry into a concrete provider handle plus a
//! [`counsel_types::ModelCapabilities`] descriptor, with validation
//! verdicts cached between requests.

mod catalog;
mod http;
mod provider;
mod registry;
mod resolver;

pub use http::OpenAiCompatClient;
pub use provider::{timeout_for, ModelProvider};
pub use registry::{ProviderRegistry, ProviderSettings};
pub use resolver::{format_model_option, parse_model_option, ModelResolver, ResolvedModel};

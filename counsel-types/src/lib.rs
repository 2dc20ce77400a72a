#![deny(missing_docs)]
//! Core types shared by every counsel crate.
//!
//! Defines the model-capability descriptors, the abstract provider
//! request/response pair, the uniform [`ToolOutput`] envelope, and the
//! error taxonomy used across the request pipeline.

mod envelope;
mod error;
mod model;

pub use envelope::{ContentType, ToolOutput};
pub use error::{ConfigError, EstimateError, FileError, ProviderError, RequestError};
pub use model::{
    Confidence, GenerationRequest, GenerationResponse, ModelCapabilities, ThinkingMode,
    TokenUsage, TokenizerKind, ToolCategory,
};

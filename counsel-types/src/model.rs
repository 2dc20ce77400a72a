//! Model capabilities and the abstract provider request/response pair.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which kind of model a tool prefers when the caller asks for `auto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    /// Latency-sensitive tools that favour cheap, quick models.
    FastResponse,
    /// Investigation tools that favour deep-reasoning models.
    ExtendedReasoning,
}

impl ToolCategory {
    /// Stable lowercase name used in cache keys and diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            ToolCategory::FastResponse => "fast_response",
            ToolCategory::ExtendedReasoning => "extended_reasoning",
        }
    }
}

/// Tokeniser a model's provider exposes for text estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerKind {
    /// tiktoken `o200k_base` (GPT-4o / o3 / o4 families).
    TiktokenO200k,
    /// tiktoken `cl100k_base` (GPT-3.5 / GPT-4 families).
    TiktokenCl100k,
    /// No tokeniser available; estimate as `len / 4`.
    Ratio4,
    /// Provider counts tokens itself; estimate locally as `len / 4`.
    ProviderSpecific,
}

/// Static capability descriptor for a concrete model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    /// Total token capacity of the model's context window.
    pub context_window: usize,
    /// Maximum tokens the model may generate in one response.
    pub max_output_tokens: usize,
    /// Whether the model accepts image inputs.
    pub supports_images: bool,
    /// Whether the model supports an extended-thinking mode.
    pub supports_extended_thinking: bool,
    /// Whether the model supports function/tool calling.
    pub supports_function_calling: bool,
    /// Tokeniser used for local token estimation.
    pub tokenizer: TokenizerKind,
}

impl ModelCapabilities {
    /// Conservative descriptor for models nothing is known about
    /// (e.g. arbitrary names served by a custom endpoint).
    pub fn conservative() -> Self {
        Self {
            context_window: 200_000,
            max_output_tokens: 8_192,
            supports_images: false,
            supports_extended_thinking: false,
            supports_function_calling: true,
            tokenizer: TokenizerKind::Ratio4,
        }
    }
}

/// Depth of reasoning requested from a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThinkingMode {
    /// Minimal deliberation.
    Minimal,
    /// Light deliberation.
    Low,
    /// Balanced deliberation.
    #[default]
    Medium,
    /// Deep deliberation; the default for expert analysis.
    High,
    /// Maximum deliberation the model supports.
    Max,
}

/// Caller-reported confidence in a workflow assessment.
///
/// Ordered from least to most certain; `Certain` short-circuits expert
/// analysis for the tools that honour it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Still forming a picture.
    Exploring,
    /// Early hunches.
    #[default]
    Low,
    /// A plausible assessment backed by some evidence.
    Medium,
    /// A strong assessment backed by concrete evidence.
    High,
    /// Very strong evidence, minor unknowns remain.
    VeryHigh,
    /// Nearly confirmed.
    AlmostCertain,
    /// Fully confirmed locally; no external validation needed.
    Certain,
}

impl Confidence {
    /// The snake_case wire form.
    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::Exploring => "exploring",
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
            Confidence::VeryHigh => "very_high",
            Confidence::AlmostCertain => "almost_certain",
            Confidence::Certain => "certain",
        }
    }
}

/// A single generation request to an abstract provider.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// Concrete model name (already resolved; never `auto`).
    pub model_name: String,
    /// The main prompt body.
    pub prompt: String,
    /// Optional system prompt; empty string means none.
    pub system_prompt: String,
    /// Sampling temperature in `[0, 1]`.
    pub temperature: f32,
    /// Requested reasoning depth.
    pub thinking_mode: ThinkingMode,
    /// Cap on generated tokens; `None` lets the provider decide.
    pub max_output_tokens: Option<usize>,
    /// Absolute paths of images to attach, for vision-capable models.
    pub images: Vec<PathBuf>,
}

/// Token accounting returned by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt.
    pub input_tokens: usize,
    /// Tokens generated.
    pub output_tokens: usize,
}

/// A completed generation from a provider.
#[derive(Debug, Clone)]
pub struct GenerationResponse {
    /// The generated text.
    pub content: String,
    /// Model that produced the response (as reported by the provider).
    pub model_name: String,
    /// Provider identifier (e.g. `"openai"`, `"custom"`).
    pub provider_name: String,
    /// Token accounting, when the provider reports it.
    pub usage: TokenUsage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_orders_from_exploring_to_certain() {
        assert!(Confidence::Exploring < Confidence::Low);
        assert!(Confidence::AlmostCertain < Confidence::Certain);
        assert!(Confidence::Medium < Confidence::VeryHigh);
    }

    #[test]
    fn confidence_serde_round_trip() {
        for c in [
            Confidence::Exploring,
            Confidence::VeryHigh,
            Confidence::AlmostCertain,
            Confidence::Certain,
        ] {
            let s = serde_json::to_string(&c).unwrap();
            assert_eq!(s, format!("\"{}\"", c.as_str()));
            let back: Confidence = serde_json::from_str(&s).unwrap();
            assert_eq!(back, c);
        }
    }

    #[test]
    fn conservative_capabilities_use_ratio_tokenizer() {
        let caps = ModelCapabilities::conservative();
        assert_eq!(caps.context_window, 200_000);
        assert_eq!(caps.tokenizer, TokenizerKind::Ratio4);
    }
}

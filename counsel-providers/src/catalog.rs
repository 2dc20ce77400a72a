//! Static capability tables for the known provider families.

use counsel_types::{ModelCapabilities, TokenizerKind, ToolCategory};

/// One model row: canonical name, aliases, and capabilities.
pub(crate) struct ModelEntry {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub caps: ModelCapabilities,
}

fn caps(
    context_window: usize,
    max_output_tokens: usize,
    supports_images: bool,
    supports_extended_thinking: bool,
    tokenizer: TokenizerKind,
) -> ModelCapabilities {
    ModelCapabilities {
        context_window,
        max_output_tokens,
        supports_images,
        supports_extended_thinking,
        supports_function_calling: true,
        tokenizer,
    }
}

pub(crate) fn google_models() -> Vec<ModelEntry> {
    vec![
        ModelEntry {
            name: "gemini-2.5-pro",
            aliases: &["pro", "gemini-pro"],
            caps: caps(1_048_576, 65_536, true, true, TokenizerKind::ProviderSpecific),
        },
        ModelEntry {
            name: "gemini-2.5-flash",
            aliases: &["flash", "gemini-flash"],
            caps: caps(1_048_576, 65_536, true, true, TokenizerKind::ProviderSpecific),
        },
    ]
}

pub(crate) fn openai_models() -> Vec<ModelEntry> {
    vec![
        ModelEntry {
            name: "o3",
            aliases: &[],
            caps: caps(200_000, 100_000, true, true, TokenizerKind::TiktokenO200k),
        },
        ModelEntry {
            name: "o3-mini",
            aliases: &[],
            caps: caps(200_000, 100_000, false, true, TokenizerKind::TiktokenO200k),
        },
        ModelEntry {
            name: "o4-mini",
            aliases: &["mini"],
            caps: caps(200_000, 100_000, true, true, TokenizerKind::TiktokenO200k),
        },
        ModelEntry {
            name: "gpt-4o",
            aliases: &[],
            caps: caps(128_000, 16_384, true, false, TokenizerKind::TiktokenO200k),
        },
        ModelEntry {
            name: "gpt-4.1",
            aliases: &[],
            caps: caps(1_047_576, 32_768, true, false, TokenizerKind::TiktokenCl100k),
        },
    ]
}

pub(crate) fn xai_models() -> Vec<ModelEntry> {
    vec![
        ModelEntry {
            name: "grok-4",
            aliases: &["grok"],
            caps: caps(256_000, 65_536, true, true, TokenizerKind::Ratio4),
        },
        ModelEntry {
            name: "grok-3",
            aliases: &[],
            caps: caps(131_072, 32_768, false, false, TokenizerKind::Ratio4),
        },
    ]
}

pub(crate) fn dial_models() -> Vec<ModelEntry> {
    // DIAL proxies a mixed fleet; only the commonly-deployed ids are listed.
    vec![
        ModelEntry {
            name: "o3",
            aliases: &[],
            caps: caps(200_000, 100_000, true, true, TokenizerKind::TiktokenO200k),
        },
        ModelEntry {
            name: "gpt-4o",
            aliases: &[],
            caps: caps(128_000, 16_384, true, false, TokenizerKind::TiktokenO200k),
        },
        ModelEntry {
            name: "gemini-2.5-pro",
            aliases: &[],
            caps: caps(1_048_576, 65_536, true, true, TokenizerKind::ProviderSpecific),
        },
    ]
}

/// Capabilities for well-known aggregator ids; everything else served via
/// OpenRouter gets the conservative default.
pub(crate) fn openrouter_known(model: &str) -> Option<ModelCapabilities> {
    let base = match model {
        "openai/gpt-4o" => caps(128_000, 16_384, true, false, TokenizerKind::TiktokenO200k),
        "openai/o3" => caps(200_000, 100_000, true, true, TokenizerKind::TiktokenO200k),
        "anthropic/claude-sonnet-4" => {
            caps(200_000, 64_000, true, true, TokenizerKind::Ratio4)
        }
        "google/gemini-2.5-flash" => {
            caps(1_048_576, 65_536, true, true, TokenizerKind::ProviderSpecific)
        }
        _ => return None,
    };
    Some(base)
}

/// Category preference per provider family, consulted in registry priority
/// order during `auto` resolution.
pub(crate) fn preferred(provider: &str, category: ToolCategory) -> Option<&'static str> {
    match (provider, category) {
        ("google", ToolCategory::ExtendedReasoning) => Some("gemini-2.5-pro"),
        ("google", ToolCategory::FastResponse) => Some("gemini-2.5-flash"),
        ("openai", ToolCategory::ExtendedReasoning) => Some("o3"),
        ("openai", ToolCategory::FastResponse) => Some("o4-mini"),
        ("xai", ToolCategory::ExtendedReasoning) => Some("grok-4"),
        ("xai", ToolCategory::FastResponse) => Some("grok-3"),
        ("dial", ToolCategory::ExtendedReasoning) => Some("o3"),
        ("dial", ToolCategory::FastResponse) => Some("gpt-4o"),
        ("openrouter", ToolCategory::ExtendedReasoning) => Some("anthropic/claude-sonnet-4"),
        ("openrouter", ToolCategory::FastResponse) => Some("openai/gpt-4o"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_family_uses_o200k() {
        let models = openai_models();
        let o3 = models.iter().find(|m| m.name == "o3").unwrap();
        assert_eq!(o3.caps.tokenizer, TokenizerKind::TiktokenO200k);
        let gpt41 = models.iter().find(|m| m.name == "gpt-4.1").unwrap();
        assert_eq!(gpt41.caps.tokenizer, TokenizerKind::TiktokenCl100k);
    }

    #[test]
    fn gemini_models_have_million_token_windows() {
        for m in google_models() {
            assert!(m.caps.context_window >= 1_000_000);
        }
    }

    #[test]
    fn unknown_openrouter_models_are_not_in_the_table() {
        assert!(openrouter_known("somelab/some-model").is_none());
        assert!(openrouter_known("openai/gpt-4o").is_some());
    }
}

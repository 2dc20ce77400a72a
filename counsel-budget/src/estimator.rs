//! Text token estimation with tokenizer selection and caching.

use std::sync::Arc;

use counsel_cache::TokenCache;
use counsel_types::TokenizerKind;
use once_cell::sync::Lazy;
use tiktoken_rs::CoreBPE;
use tracing::debug;

/// Conservative context window assumed for unknown models.
pub const DEFAULT_CONTEXT_WINDOW: usize = 200_000;

// BPE construction is expensive; build each encoding once per process.
static O200K: Lazy<Option<CoreBPE>> = Lazy::new(|| tiktoken_rs::o200k_base().ok());
static CL100K: Lazy<Option<CoreBPE>> = Lazy::new(|| tiktoken_rs::cl100k_base().ok());

/// Estimates token counts for text, routed through the token cache.
///
/// The ratio heuristic (`len / 4`) is monotone under concatenation;
/// pruning paths use it so they may rely on
/// `estimate(a + b) >= estimate(a)`. The tiktoken paths count real tokens
/// and are used where accuracy beats monotonicity.
#[derive(Clone)]
pub struct TokenEstimator {
    cache: Arc<TokenCache>,
}

impl TokenEstimator {
    /// Create an estimator over the shared token cache.
    pub fn new(cache: Arc<TokenCache>) -> Self {
        Self { cache }
    }

    /// Estimator with a private cache, for tests and standalone use.
    pub fn standalone() -> Self {
        Self {
            cache: Arc::new(TokenCache::new()),
        }
    }

    /// Estimate tokens for `text` as the named model would count them.
    pub fn estimate_text(&self, text: &str, model_name: &str, tokenizer: TokenizerKind) -> usize {
        self.cache
            .get_or_compute(text, model_name, |t| count_tokens(t, tokenizer))
    }

    /// Estimate with the ratio heuristic only (model-agnostic callers).
    pub fn estimate_plain(&self, text: &str) -> usize {
        self.cache
            .get_or_compute(text, "default", |t| t.len() / 4)
    }
}

fn count_tokens(text: &str, tokenizer: TokenizerKind) -> usize {
    let bpe = match tokenizer {
        TokenizerKind::TiktokenO200k => O200K.as_ref(),
        TokenizerKind::TiktokenCl100k => CL100K.as_ref(),
        TokenizerKind::Ratio4 | TokenizerKind::ProviderSpecific => None,
    };
    match bpe {
        Some(bpe) => bpe.encode_with_special_tokens(text).len(),
        None => {
            if matches!(
                tokenizer,
                TokenizerKind::TiktokenO200k | TokenizerKind::TiktokenCl100k
            ) {
                debug!("tiktoken encoding unavailable, falling back to ratio estimate");
            }
            text.len() / 4
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ratio_estimate_is_len_over_four() {
        let est = TokenEstimator::standalone();
        assert_eq!(est.estimate_text("abcdefgh", "m", TokenizerKind::Ratio4), 2);
        assert_eq!(est.estimate_text("abc", "m", TokenizerKind::Ratio4), 0);
    }

    #[test]
    fn estimate_is_cached_per_model() {
        let est = TokenEstimator::standalone();
        let a = est.estimate_text("hello world", "m1", TokenizerKind::Ratio4);
        let b = est.estimate_text("hello world", "m1", TokenizerKind::Ratio4);
        assert_eq!(a, b);
    }

    #[test]
    fn tiktoken_estimate_counts_real_tokens() {
        // Skip silently if the embedded encodings failed to build.
        if O200K.is_none() {
            return;
        }
        let est = TokenEstimator::standalone();
        let tokens = est.estimate_text(
            "The quick brown fox jumps over the lazy dog.",
            "o3",
            TokenizerKind::TiktokenO200k,
        );
        assert!(tokens > 0 && tokens < 20);
    }

    proptest! {
        // estimate(a ++ b) >= estimate(a) and >= estimate(b)
        #[test]
        fn ratio_estimate_is_monotone(a in ".{0,200}", b in ".{0,200}") {
            let est = TokenEstimator::standalone();
            let joined = format!("{a}{b}");
            let e_ab = est.estimate_text(&joined, "m", TokenizerKind::Ratio4);
            let e_a = est.estimate_text(&a, "m", TokenizerKind::Ratio4);
            let e_b = est.estimate_text(&b, "m", TokenizerKind::Ratio4);
            prop_assert!(e_ab >= e_a);
            prop_assert!(e_ab >= e_b);
        }
    }
}

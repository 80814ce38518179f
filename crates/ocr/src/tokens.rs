use std::collections::HashMap;
use std::path::PathBuf;

/// Counts language-model tokens in a string.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;

    /// Name of the encoding, for diagnostics.
    fn name(&self) -> &str;
}

// ── Approximate counter (last resort) ────────────────────────────────────────

/// Character-ratio estimate: one token per `chars_per_token` characters, rounded up.
#[derive(Debug, Clone)]
pub struct ApproxCounter {
    chars_per_token: usize,
}

impl ApproxCounter {
    pub fn new(chars_per_token: usize) -> Self {
        Self { chars_per_token: chars_per_token.max(1) }
    }
}

impl Default for ApproxCounter {
    fn default() -> Self {
        Self::new(4)
    }
}

impl TokenCounter for ApproxCounter {
    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.chars_per_token)
    }

    fn name(&self) -> &str {
        "approx"
    }
}

// ── tiktoken encodings (default) ──────────────────────────────────────────────

pub mod bpe {
    use super::{ApproxCounter, TokenCounter};
    use tiktoken_rs::CoreBPE;

    /// Counts tokens with an OpenAI BPE encoding.
    pub struct TiktokenCounter {
        bpe: CoreBPE,
        name: String,
    }

    impl TiktokenCounter {
        pub fn cl100k() -> anyhow::Result<Self> {
            Ok(Self { bpe: tiktoken_rs::cl100k_base()?, name: "cl100k_base".to_string() })
        }

        pub fn for_model(model: &str) -> anyhow::Result<Self> {
            Ok(Self { bpe: tiktoken_rs::get_bpe_from_model(model)?, name: model.to_string() })
        }
    }

    impl TokenCounter for TiktokenCounter {
        fn count(&self, text: &str) -> usize {
            self.bpe.encode_ordinary(text).len()
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    /// Encoding of `model`, then `cl100k_base`, then the character estimate.
    pub fn for_model(model: &str) -> Box<dyn TokenCounter> {
        if let Ok(counter) = TiktokenCounter::for_model(model) {
            return Box::new(counter);
        }
        tracing::warn!("model '{model}' not found, using cl100k_base encoding");
        match TiktokenCounter::cl100k() {
            Ok(counter) => Box::new(counter),
            Err(e) => {
                tracing::warn!("cl100k_base failed to load ({e}), estimating tokens");
                Box::new(ApproxCounter::default())
            }
        }
    }
}

// ── Hugging Face tokenizer (optional, gated behind `hf-tokenizer` feature) ────

#[cfg(feature = "hf-tokenizer")]
pub mod hf {
    use super::{ApproxCounter, TokenCounter};
    use std::path::Path;
    use tokenizers::tokenizer::Tokenizer;

    pub struct HfTokenCounter {
        tokenizer: Tokenizer,
        name: String,
    }

    impl HfTokenCounter {
        pub fn from_file(path: &Path, name: &str) -> Result<Self, String> {
            let tokenizer = Tokenizer::from_file(path).map_err(|e| e.to_string())?;
            Ok(Self { tokenizer, name: name.to_string() })
        }
    }

    impl TokenCounter for HfTokenCounter {
        fn count(&self, text: &str) -> usize {
            match self.tokenizer.encode(text, false) {
                Ok(encoding) => encoding.len(),
                Err(e) => {
                    tracing::warn!("tokenizer {} failed, estimating: {e}", self.name);
                    ApproxCounter::default().count(text)
                }
            }
        }

        fn name(&self) -> &str {
            &self.name
        }
    }
}

/// Model assumed when none is configured; it maps to `cl100k_base`.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Pick the counter for `model`.
///
/// A model listed in `tokenizers` loads that tokenizer file. Otherwise the
/// model's tiktoken encoding is used; unknown models get `cl100k_base`, and
/// [`ApproxCounter`] only when no encoding loads at all.
pub fn counter_for_model(
    model: Option<&str>,
    tokenizers: &HashMap<String, PathBuf>,
) -> Box<dyn TokenCounter> {
    let model = model.unwrap_or(DEFAULT_MODEL);
    match tokenizers.get(model) {
        Some(path) => load_tokenizer(model, path),
        None => bpe::for_model(model),
    }
}

#[cfg(feature = "hf-tokenizer")]
fn load_tokenizer(model: &str, path: &std::path::Path) -> Box<dyn TokenCounter> {
    match hf::HfTokenCounter::from_file(path, model) {
        Ok(counter) => Box::new(counter),
        Err(e) => {
            tracing::warn!("failed to load tokenizer {}: {e}", path.display());
            bpe::for_model(model)
        }
    }
}

#[cfg(not(feature = "hf-tokenizer"))]
fn load_tokenizer(model: &str, path: &std::path::Path) -> Box<dyn TokenCounter> {
    tracing::warn!(
        "tokenizer for '{model}' at {} needs the `hf-tokenizer` feature",
        path.display()
    );
    bpe::for_model(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approx_rounds_up() {
        let c = ApproxCounter::default();
        assert_eq!(c.count(""), 0);
        assert_eq!(c.count("abcd"), 1);
        assert_eq!(c.count("abcde"), 2);
    }

    #[test]
    fn approx_counts_characters_not_bytes() {
        let c = ApproxCounter::new(1);
        assert_eq!(c.count("éé"), 2);
    }

    #[test]
    fn zero_ratio_is_clamped() {
        assert_eq!(ApproxCounter::new(0).count("abc"), 3);
    }

    #[test]
    fn unknown_model_resolves_to_cl100k() {
        let counter = counter_for_model(Some("gpt-unknown"), &HashMap::new());
        assert_eq!(counter.name(), "cl100k_base");
        assert_eq!(counter.count("hello world"), 2);
    }

    #[test]
    fn no_model_uses_default_encoding() {
        let counter = counter_for_model(None, &HashMap::new());
        assert_eq!(counter.name(), DEFAULT_MODEL);
        assert_eq!(counter.count(""), 0);
    }

    #[test]
    fn known_model_uses_its_own_encoding() {
        let counter = counter_for_model(Some("gpt-4"), &HashMap::new());
        assert_eq!(counter.name(), "gpt-4");
        assert_eq!(counter.count("hello world"), 2);
    }

    #[test]
    fn digits_cost_more_than_the_estimate() {
        // cl100k splits digit runs into groups of at most three
        let counter = counter_for_model(None, &HashMap::new());
        let text = "05/11/2019 -1204,33 05/11/2019 -1204,33";
        assert!(counter.count(text) > ApproxCounter::default().count(text));
    }

    #[test]
    fn missing_tokenizer_file_falls_back_to_bpe() {
        let mut map = HashMap::new();
        map.insert("gpt-4".to_string(), PathBuf::from("/nonexistent/tokenizer.json"));
        let counter = counter_for_model(Some("gpt-4"), &map);
        assert_eq!(counter.name(), "gpt-4");
    }
}

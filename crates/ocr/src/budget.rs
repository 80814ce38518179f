use crate::tokens::TokenCounter;

/// How an over-budget transcript is shortened.
pub trait TruncationStrategy: Send + Sync {
    fn truncate(&self, text: &str, max_tokens: usize, counter: &dyn TokenCounter) -> String;
}

/// Keep the first `max_tokens` *characters*.
///
/// The threshold is in tokens but the cut is in characters, so the result is
/// not guaranteed to fit the budget for encodings with many characters per
/// token. Downstream consumers are tuned to this behaviour.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharPrefix;

impl TruncationStrategy for CharPrefix {
    fn truncate(&self, text: &str, max_tokens: usize, _counter: &dyn TokenCounter) -> String {
        char_prefix(text, max_tokens).to_string()
    }
}

/// Keep the longest character prefix whose token count fits the budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenFit;

impl TruncationStrategy for TokenFit {
    fn truncate(&self, text: &str, max_tokens: usize, counter: &dyn TokenCounter) -> String {
        let total = text.chars().count();
        let (mut lo, mut hi) = (0usize, total);
        // Largest n with count(prefix(n)) <= max_tokens; counts grow with n.
        while lo < hi {
            let mid = lo + (hi - lo).div_ceil(2);
            if counter.count(char_prefix(text, mid)) <= max_tokens {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        char_prefix(text, lo).to_string()
    }
}

/// Cap `text` at `max_tokens` as measured by `count_tokens`, cutting by characters.
pub fn limit(text: &str, max_tokens: usize, count_tokens: impl Fn(&str) -> usize) -> String {
    if count_tokens(text) <= max_tokens {
        return text.to_string();
    }
    char_prefix(text, max_tokens).to_string()
}

fn char_prefix(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

/// A token budget bound to a counter and a truncation strategy.
pub struct Budget {
    max_tokens: usize,
    counter: Box<dyn TokenCounter>,
    strategy: Box<dyn TruncationStrategy>,
}

impl Budget {
    pub fn new(max_tokens: usize, counter: Box<dyn TokenCounter>) -> Self {
        Self { max_tokens, counter, strategy: Box::new(CharPrefix) }
    }

    pub fn with_strategy(mut self, strategy: Box<dyn TruncationStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Returns the (possibly shortened) text and whether it was cut.
    pub fn enforce(&self, text: String) -> (String, bool) {
        let tokens = self.counter.count(&text);
        if tokens <= self.max_tokens {
            return (text, false);
        }
        tracing::info!(
            "transcript has {tokens} {} tokens, over budget of {}; truncating",
            self.counter.name(),
            self.max_tokens
        );
        (self.strategy.truncate(&text, self.max_tokens, self.counter.as_ref()), true)
    }
}

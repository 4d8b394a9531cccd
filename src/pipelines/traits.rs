use serde::{Deserialize, Serialize};

/// A backend's verdict on a text, in the backend's own label vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawClassification {
    pub label: String,
    /// Probability of `label`, expected in `[0, 1]`.
    pub confidence: f32,
}

impl RawClassification {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Length bounds for a generated summary, counted in the summarizer's tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryBounds {
    pub min_len: usize,
    pub max_len: usize,
}

impl SummaryBounds {
    pub fn new(min_len: usize, max_len: usize) -> anyhow::Result<Self> {
        anyhow::ensure!(max_len > 0, "summary max length must be positive");
        anyhow::ensure!(
            min_len <= max_len,
            "summary min length {min_len} exceeds max length {max_len}"
        );
        Ok(Self { min_len, max_len })
    }
}

impl Default for SummaryBounds {
    fn default() -> Self {
        Self {
            min_len: 40,
            max_len: 150,
        }
    }
}

/// Summary text plus how many backend tokens were generated for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub text: String,
    pub tokens: usize,
}

/// Sentiment classification capability.
///
/// Implementations must be deterministic for fixed weights: the same text
/// always yields the same label and confidence. Input that does not fit the
/// backend's window is an error, never silently truncated.
pub trait TextClassifier: Send {
    fn classify(&mut self, text: &str) -> anyhow::Result<RawClassification>;

    /// Labels this backend can emit, when known (its `id2label`).
    fn labels(&self) -> Vec<String> {
        Vec::new()
    }

    /// Release heavyweight resources. Called once at shutdown.
    fn release(&mut self) {}
}

/// Abstractive summarization capability.
///
/// Decoding must not sample, so identical input gives identical output.
/// Input that does not fit the backend's window is an error, never silently
/// truncated.
pub trait TextSummarizer: Send {
    fn summarize(&mut self, text: &str, bounds: SummaryBounds) -> anyhow::Result<Summary>;

    /// Release heavyweight resources. Called once at shutdown.
    fn release(&mut self) {}
}

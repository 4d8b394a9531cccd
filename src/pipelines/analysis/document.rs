use serde::Serialize;

use crate::core::DecodeError;
use crate::pipelines::labels::Sentiment;

/// Validated request text. Construction guarantees UTF-8 and at least one
/// non-whitespace character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    text: String,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Result<Self, DecodeError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(DecodeError::Empty);
        }
        Ok(Self { text })
    }

    /// Decodes uploaded bytes. A leading UTF-8 byte order mark is dropped.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let text = std::str::from_utf8(bytes).map_err(|e| DecodeError::InvalidUtf8 {
            offset: e.valid_up_to(),
        })?;
        Self::new(text)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// Canonical outcome of analyzing one [`Document`]. Both fields are always
/// present; there is no partially populated result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    sentiment: Sentiment,
    confidence: f32,
    summary: String,
}

impl AnalysisResult {
    /// Returns `None` when `confidence` is outside `[0, 1]` or the summary is blank.
    pub fn new(sentiment: Sentiment, confidence: f32, summary: impl Into<String>) -> Option<Self> {
        let summary = summary.into();
        if !(0.0..=1.0).contains(&confidence) || summary.trim().is_empty() {
            return None;
        }
        Some(Self {
            sentiment,
            confidence,
            summary,
        })
    }

    pub fn sentiment(&self) -> &Sentiment {
        &self.sentiment
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }
}

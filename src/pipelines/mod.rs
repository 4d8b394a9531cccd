//! Inference capabilities and the analysis pipeline built on them.

pub mod analysis;
pub mod labels;
pub mod traits;
pub mod utils;

pub use labels::{LabelMap, LabelPreset, Polarity, Sentiment};
pub use traits::{RawClassification, Summary, SummaryBounds, TextClassifier, TextSummarizer};

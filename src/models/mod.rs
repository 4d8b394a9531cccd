//! Candle-backed inference backends.
//!
//! - [`SequenceClassifier`] - BERT or DistilBERT classification head, implements
//!   [`TextClassifier`](crate::pipelines::TextClassifier)
//! - [`T5Summarizer`] - T5 encoder-decoder with greedy decoding, implements
//!   [`TextSummarizer`](crate::pipelines::TextSummarizer)

pub mod sequence_classifier;
pub mod t5_summarizer;

pub use sequence_classifier::{Architecture, SequenceClassifier};
pub use t5_summarizer::{SummarizerParams, T5Summarizer};

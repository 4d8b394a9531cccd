//! Deterministic fake backends and a recording mail transport.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use document_agent::core::{DeliveryTransportError, SmtpSettings};
use document_agent::delivery::{MailTransport, OutgoingMail};
use document_agent::pipelines::analysis::{AnalysisPipeline, AnalysisPipelineBuilder};
use document_agent::pipelines::labels::LabelPreset;
use document_agent::pipelines::traits::{
    RawClassification, Summary, SummaryBounds, TextClassifier, TextSummarizer,
};

pub const AMAZING: &str = "The product was amazing and exceeded expectations.";

/// Scores text by a small keyword list, speaking the `LABEL_i` vocabulary.
pub struct KeywordClassifier;

impl TextClassifier for KeywordClassifier {
    fn classify(&mut self, text: &str) -> anyhow::Result<RawClassification> {
        let lower = text.to_lowercase();
        let positive = ["amazing", "great", "exceeded", "love"]
            .iter()
            .filter(|w| lower.contains(*w))
            .count();
        let negative = ["terrible", "awful", "broken", "hate"]
            .iter()
            .filter(|w| lower.contains(*w))
            .count();
        let label = if positive >= negative { "LABEL_1" } else { "LABEL_0" };
        let margin = positive.abs_diff(negative) as f32;
        Ok(RawClassification::new(label, 0.5 + 0.49 * (margin / (margin + 1.0))))
    }

    fn labels(&self) -> Vec<String> {
        vec!["LABEL_0".to_string(), "LABEL_1".to_string()]
    }
}

/// Returns the first `max_len` words, one token per word.
pub struct LeadSummarizer;

impl TextSummarizer for LeadSummarizer {
    fn summarize(&mut self, text: &str, bounds: SummaryBounds) -> anyhow::Result<Summary> {
        let words: Vec<&str> = text.split_whitespace().take(bounds.max_len).collect();
        Ok(Summary {
            text: words.join(" "),
            tokens: words.len(),
        })
    }
}

pub struct FailingSummarizer;

impl TextSummarizer for FailingSummarizer {
    fn summarize(&mut self, _text: &str, _bounds: SummaryBounds) -> anyhow::Result<Summary> {
        anyhow::bail!("CUDA error: out of memory")
    }
}

pub fn pipeline() -> AnalysisPipeline {
    AnalysisPipelineBuilder::new()
        .classifier(KeywordClassifier)
        .summarizer(LeadSummarizer)
        .labels(LabelPreset::IndexedBinary)
        .bounds(SummaryBounds::new(1, 20).unwrap())
        .build()
        .unwrap()
}

pub fn failing_pipeline() -> AnalysisPipeline {
    AnalysisPipelineBuilder::new()
        .classifier(KeywordClassifier)
        .summarizer(FailingSummarizer)
        .build()
        .unwrap()
}

#[derive(Clone, Default)]
pub struct RecordingTransport {
    pub calls: Arc<AtomicUsize>,
    pub sent: Arc<Mutex<Vec<OutgoingMail>>>,
    pub fail_with: Option<DeliveryTransportError>,
}

impl RecordingTransport {
    pub fn failing(err: DeliveryTransportError) -> Self {
        Self {
            fail_with: Some(err),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MailTransport for RecordingTransport {
    fn send(&self, mail: &OutgoingMail) -> Result<(), DeliveryTransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(mail.clone());
        match &self.fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

pub fn smtp_settings() -> SmtpSettings {
    SmtpSettings {
        username: Some("reports@example.com".to_string()),
        password: Some("app-password".to_string()),
        ..SmtpSettings::default()
    }
}

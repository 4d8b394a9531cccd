use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::document::{AnalysisResult, Document};
use crate::core::{InferenceError, Stage};
use crate::pipelines::labels::{LabelMap, Sentiment};
use crate::pipelines::traits::{
    RawClassification, Summary, SummaryBounds, TextClassifier, TextSummarizer,
};

/// How the two independent inference stages are scheduled within a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageExecution {
    #[default]
    Sequential,
    /// Classification runs on a scoped thread while summarization runs on
    /// the calling worker; the request waits for both.
    Concurrent,
}

/// Composes classification and summarization into one atomic analysis.
///
/// Backends are loaded once and shared by every worker. Each sits behind its
/// own lock, so concurrent requests are serialized per backend while the
/// classifier and summarizer remain free to run at the same time.
pub struct AnalysisPipeline {
    pub(crate) classifier: Mutex<Box<dyn TextClassifier>>,
    pub(crate) summarizer: Mutex<Box<dyn TextSummarizer>>,
    pub(crate) labels: LabelMap,
    pub(crate) bounds: SummaryBounds,
    pub(crate) execution: StageExecution,
}

impl AnalysisPipeline {
    /// Runs both stages and assembles the canonical result. Fails as a whole
    /// if either stage fails; a stage failure never yields a partial result.
    pub fn analyze(&self, document: &Document) -> Result<AnalysisResult, InferenceError> {
        let text = document.text();
        debug!(chars = text.len(), execution = ?self.execution, "analyzing document");

        let (classification, summary) = match self.execution {
            StageExecution::Sequential => {
                let classification = self.classify(text)?;
                let summary = self.summarize(text)?;
                (classification, summary)
            }
            StageExecution::Concurrent => std::thread::scope(|scope| {
                let classification = scope.spawn(|| self.classify(text));
                let summary = self.summarize(text);
                let classification = classification.join().unwrap_or_else(|_| {
                    Err(InferenceError::backend(
                        Stage::Classification,
                        &anyhow::anyhow!("classifier worker panicked"),
                    ))
                });
                // Classification errors are reported first when both fail.
                Ok::<_, InferenceError>((classification?, summary?))
            })?,
        };

        let sentiment = self.labels.normalize(&classification.label);
        if let Sentiment::Unmapped(raw) = &sentiment {
            warn!(label = %raw, "classifier label has no canonical mapping");
        }

        let result = AnalysisResult::new(sentiment, classification.confidence, summary.text)
            .ok_or_else(|| {
                InferenceError::malformed(Stage::Summarization, "result failed validation")
            })?;
        info!(
            sentiment = %result.sentiment(),
            confidence = result.confidence(),
            summary_tokens = summary.tokens,
            "document analyzed"
        );
        Ok(result)
    }

    fn classify(&self, text: &str) -> Result<RawClassification, InferenceError> {
        let mut classifier = self.classifier.lock().unwrap_or_else(|poisoned| {
            warn!("classifier lock was poisoned; reusing the backend");
            PoisonError::into_inner(poisoned)
        });
        let raw = contain_panic(Stage::Classification, || classifier.classify(text)).map_err(|e| {
            warn!(error = %format!("{e:#}"), "classifier failed");
            InferenceError::backend(Stage::Classification, &e)
        })?;

        if !(0.0..=1.0).contains(&raw.confidence) {
            return Err(InferenceError::malformed(
                Stage::Classification,
                format!("confidence {} is outside [0, 1]", raw.confidence),
            ));
        }
        debug!(label = %raw.label, confidence = raw.confidence, "classification done");
        Ok(raw)
    }

    fn summarize(&self, text: &str) -> Result<Summary, InferenceError> {
        let mut summarizer = self.summarizer.lock().unwrap_or_else(|poisoned| {
            warn!("summarizer lock was poisoned; reusing the backend");
            PoisonError::into_inner(poisoned)
        });
        let summary = contain_panic(Stage::Summarization, || {
            summarizer.summarize(text, self.bounds)
        })
        .map_err(|e| {
            warn!(error = %format!("{e:#}"), "summarizer failed");
            InferenceError::backend(Stage::Summarization, &e)
        })?;

        if summary.text.trim().is_empty() {
            return Err(InferenceError::malformed(
                Stage::Summarization,
                "backend returned an empty summary",
            ));
        }
        if summary.tokens > self.bounds.max_len {
            return Err(InferenceError::malformed(
                Stage::Summarization,
                format!(
                    "summary of {} tokens exceeds the requested maximum of {}",
                    summary.tokens, self.bounds.max_len
                ),
            ));
        }
        if summary.tokens < self.bounds.min_len {
            warn!(
                tokens = summary.tokens,
                min_len = self.bounds.min_len,
                "summary shorter than requested minimum"
            );
        }
        debug!(tokens = summary.tokens, "summarization done");
        Ok(summary)
    }

    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    pub fn bounds(&self) -> SummaryBounds {
        self.bounds
    }

    pub fn execution(&self) -> StageExecution {
        self.execution
    }

    /// Releases backend resources. The pipeline cannot be used afterwards.
    pub fn shutdown(self) {
        self.classifier
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .release();
        self.summarizer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .release();
        info!("analysis backends released");
    }
}

/// Runs one backend call, turning a panic inside it into an ordinary error
/// so it fails only the current request. The backend lock is held across
/// the call and is released normally afterwards.
fn contain_panic<T>(
    stage: Stage,
    call: impl FnOnce() -> anyhow::Result<T>,
) -> anyhow::Result<T> {
    catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Err(anyhow::anyhow!("{stage} backend panicked: {detail}"))
    })
}

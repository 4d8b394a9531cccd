use std::sync::Mutex;

use super::pipeline::{AnalysisPipeline, StageExecution};
use crate::core::AppConfig;
use crate::models::{SequenceClassifier, T5Summarizer};
use crate::pipelines::labels::{LabelMap, LabelPreset};
use crate::pipelines::traits::{SummaryBounds, TextClassifier, TextSummarizer};

/// Builder for configuring and constructing an [`AnalysisPipeline`].
///
/// Backends are injected already loaded, either directly with
/// `.classifier(..)` / `.summarizer(..)` or from configuration with
/// [`AnalysisPipelineBuilder::from_config`], which downloads and loads the
/// candle models.
pub struct AnalysisPipelineBuilder {
    classifier: Option<Box<dyn TextClassifier>>,
    summarizer: Option<Box<dyn TextSummarizer>>,
    labels: LabelMap,
    bounds: SummaryBounds,
    execution: StageExecution,
}

impl AnalysisPipelineBuilder {
    pub fn new() -> Self {
        Self {
            classifier: None,
            summarizer: None,
            labels: LabelMap::preset(LabelPreset::IndexedBinary),
            bounds: SummaryBounds::default(),
            execution: StageExecution::default(),
        }
    }

    /// Loads both backends described by `config` onto its configured device.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let device = config.device.resolve()?;
        tracing::info!(device = ?device, "loading analysis backends");

        let classifier = SequenceClassifier::load(&config.classifier.backend(), &device).await?;
        let summarizer = T5Summarizer::load(
            &config.summarizer.backend(),
            config.summarizer.params(),
            &device,
        )
        .await?;

        Ok(Self::new()
            .classifier(classifier)
            .summarizer(summarizer)
            .labels(config.classifier.labels.to_map())
            .bounds(config.summarizer.bounds()?)
            .execution(config.execution))
    }

    pub fn classifier(mut self, classifier: impl TextClassifier + 'static) -> Self {
        self.classifier = Some(Box::new(classifier));
        self
    }

    pub fn summarizer(mut self, summarizer: impl TextSummarizer + 'static) -> Self {
        self.summarizer = Some(Box::new(summarizer));
        self
    }

    /// Sets the label table used to normalize classifier output.
    pub fn labels(mut self, labels: impl Into<LabelMap>) -> Self {
        self.labels = labels.into();
        self
    }

    pub fn bounds(mut self, bounds: SummaryBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn execution(mut self, execution: StageExecution) -> Self {
        self.execution = execution;
        self
    }

    /// Run classification and summarization in parallel within a request.
    pub fn concurrent(self) -> Self {
        self.execution(StageExecution::Concurrent)
    }

    pub fn build(self) -> anyhow::Result<AnalysisPipeline> {
        let classifier = self
            .classifier
            .ok_or_else(|| anyhow::anyhow!("no classifier backend configured"))?;
        let summarizer = self
            .summarizer
            .ok_or_else(|| anyhow::anyhow!("no summarizer backend configured"))?;

        let backend_labels = classifier.labels();
        let missing = self
            .labels
            .missing(backend_labels.iter().map(String::as_str));
        if !missing.is_empty() {
            tracing::warn!(
                ?missing,
                "label table does not cover every classifier label; these will be reported as unmapped"
            );
        }

        Ok(AnalysisPipeline {
            classifier: Mutex::new(classifier),
            summarizer: Mutex::new(summarizer),
            labels: self.labels,
            bounds: self.bounds,
            execution: self.execution,
        })
    }
}

impl Default for AnalysisPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipelines::traits::{RawClassification, Summary};

    struct Noop;

    impl TextClassifier for Noop {
        fn classify(&mut self, _text: &str) -> anyhow::Result<RawClassification> {
            Ok(RawClassification::new("LABEL_0", 1.0))
        }
    }

    impl TextSummarizer for Noop {
        fn summarize(&mut self, text: &str, _bounds: SummaryBounds) -> anyhow::Result<Summary> {
            Ok(Summary {
                text: text.to_string(),
                tokens: 1,
            })
        }
    }

    #[test]
    fn build_requires_both_backends() {
        assert!(AnalysisPipelineBuilder::new().classifier(Noop).build().is_err());
        assert!(AnalysisPipelineBuilder::new().summarizer(Noop).build().is_err());
        assert!(AnalysisPipelineBuilder::new()
            .classifier(Noop)
            .summarizer(Noop)
            .build()
            .is_ok());
    }

    #[test]
    fn builder_settings_reach_pipeline() {
        let pipeline = AnalysisPipelineBuilder::new()
            .classifier(Noop)
            .summarizer(Noop)
            .labels(LabelPreset::Sst2)
            .bounds(SummaryBounds::new(5, 10).unwrap())
            .concurrent()
            .build()
            .unwrap();
        assert_eq!(pipeline.execution(), StageExecution::Concurrent);
        assert_eq!(pipeline.bounds(), SummaryBounds::new(5, 10).unwrap());
        assert_eq!(pipeline.labels(), &LabelMap::preset(LabelPreset::Sst2));
    }
}

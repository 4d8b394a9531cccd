// Integration tests against real Hugging Face checkpoints.
// Run with `cargo test -- --ignored`.

use document_agent::core::AppConfig;
use document_agent::pipelines::analysis::{AnalysisPipelineBuilder, Document};
use document_agent::pipelines::utils::DeviceRequest;
use document_agent::pipelines::Sentiment;

fn cpu_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.device = DeviceRequest::Cpu;
    config.summarizer.min_length = 5;
    config.summarizer.max_length = 40;
    config
}

#[tokio::test]
#[ignore = "downloads model weights from the Hugging Face Hub"]
async fn positive_review_end_to_end() -> anyhow::Result<()> {
    let config = cpu_config();
    let pipeline = AnalysisPipelineBuilder::from_config(&config).await?.build()?;

    let document = Document::new("The product was amazing and exceeded expectations.")?;
    let result = pipeline.analyze(&document)?;

    assert_eq!(result.sentiment(), &Sentiment::Positive);
    assert!(result.confidence() > 0.5);
    assert!(!result.summary().trim().is_empty());
    Ok(())
}

#[tokio::test]
#[ignore = "downloads model weights from the Hugging Face Hub"]
async fn analysis_is_deterministic() -> anyhow::Result<()> {
    let pipeline = AnalysisPipelineBuilder::from_config(&cpu_config())
        .await?
        .build()?;
    let document = Document::new(
        "The delivery was late and the packaging was damaged, but support resolved it quickly.",
    )?;

    let first = pipeline.analyze(&document)?;
    let second = pipeline.analyze(&document)?;
    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
#[ignore = "downloads model weights from the Hugging Face Hub"]
async fn oversized_input_fails_instead_of_truncating() -> anyhow::Result<()> {
    let pipeline = AnalysisPipelineBuilder::from_config(&cpu_config())
        .await?
        .build()?;
    let document = Document::new("word ".repeat(4_000))?;
    assert!(pipeline.analyze(&document).is_err());
    Ok(())
}

#[tokio::test]
#[ignore = "downloads model weights from the Hugging Face Hub"]
async fn distilbert_sst2_checkpoint_loads() -> anyhow::Result<()> {
    use document_agent::core::LabelConfig;
    use document_agent::models::{Architecture, SequenceClassifier};
    use document_agent::pipelines::{LabelPreset, TextClassifier};

    let mut config = cpu_config();
    config.classifier.model = "distilbert/distilbert-base-uncased-finetuned-sst-2-english".into();
    config.classifier.tokenizer = Some("distilbert/distilbert-base-uncased".into());
    config.classifier.labels = LabelConfig::Preset(LabelPreset::Sst2);

    let classifier =
        SequenceClassifier::load(&config.classifier.backend(), &candle_core::Device::Cpu).await?;
    assert_eq!(classifier.architecture(), Architecture::DistilBert);
    assert_eq!(classifier.labels(), vec!["NEGATIVE", "POSITIVE"]);

    let pipeline = AnalysisPipelineBuilder::from_config(&config).await?.build()?;
    let document = Document::new("The product was amazing and exceeded expectations.")?;
    assert_eq!(pipeline.analyze(&document)?.sentiment(), &Sentiment::Positive);
    Ok(())
}

//! Encoder sequence classifiers.
//!
//! Two checkpoint layouts are understood, picked from `config.json`:
//!
//! - `BertForSequenceClassification`: encoder under `bert.*`, the pooler
//!   (`bert.pooler.dense`, tanh over the `[CLS]` state) and a linear
//!   `classifier`.
//! - `DistilBertForSequenceClassification`: encoder under `distilbert.*`, then
//!   `pre_classifier` with ReLU over the `[CLS]` state and a linear
//!   `classifier`.
//!
//! Confidence is the softmax probability of the winning class.

use std::collections::HashMap;

use anyhow::{Error as E, Result};
use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{self, BertModel};
use candle_transformers::models::distilbert::{self, DistilBertModel};
use serde::Deserialize;
use tokenizers::Tokenizer;

use crate::loaders::{load_tokenizer, BackendSpec, ModelFiles};
use crate::pipelines::traits::{RawClassification, TextClassifier};

/// Encoder family of a classification checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    Bert,
    DistilBert,
}

impl Architecture {
    fn prefix(self) -> &'static str {
        match self {
            Architecture::Bert => "bert",
            Architecture::DistilBert => "distilbert",
        }
    }
}

/// Classification metadata carried alongside the encoder config.
#[derive(Debug, Deserialize)]
struct HeadConfig {
    #[serde(default)]
    model_type: Option<String>,
    #[serde(default)]
    architectures: Vec<String>,
    /// BERT's name for the model width; DistilBERT calls it `dim`.
    #[serde(default)]
    hidden_size: Option<usize>,
    #[serde(default)]
    dim: Option<usize>,
    max_position_embeddings: usize,
    #[serde(default)]
    id2label: Option<HashMap<String, String>>,
    #[serde(default)]
    num_labels: Option<usize>,
}

impl HeadConfig {
    /// `model_type` decides; older exports only list `architectures`.
    fn architecture(&self) -> Result<Architecture> {
        let from_name = |name: &str| match name.to_ascii_lowercase().as_str() {
            "bert" => Some(Architecture::Bert),
            "distilbert" => Some(Architecture::DistilBert),
            _ => None,
        };
        if let Some(model_type) = &self.model_type {
            return from_name(model_type).ok_or_else(|| {
                E::msg(format!(
                    "unsupported classifier model_type {model_type:?}; expected bert or distilbert"
                ))
            });
        }
        for name in &self.architectures {
            if name.starts_with("DistilBert") {
                return Ok(Architecture::DistilBert);
            }
            if name.starts_with("Bert") {
                return Ok(Architecture::Bert);
            }
        }
        // Configs without either field predate both keys and are BERT.
        Ok(Architecture::Bert)
    }

    fn width(&self) -> Result<usize> {
        self.hidden_size
            .or(self.dim)
            .ok_or_else(|| E::msg("config has neither hidden_size nor dim"))
    }

    /// Labels ordered by class index. Checkpoints exported without names get
    /// `LABEL_<i>`, matching what `transformers` generates.
    fn ordered_labels(&self) -> Result<Vec<String>> {
        match &self.id2label {
            Some(map) if !map.is_empty() => {
                let mut indexed = map
                    .iter()
                    .map(|(id, label)| {
                        id.parse::<usize>()
                            .map(|id| (id, label.clone()))
                            .map_err(|_| E::msg(format!("non-numeric id2label key {id:?}")))
                    })
                    .collect::<Result<Vec<_>>>()?;
                indexed.sort_by_key(|(id, _)| *id);
                for (position, (id, _)) in indexed.iter().enumerate() {
                    anyhow::ensure!(position == *id, "id2label is missing class {position}");
                }
                Ok(indexed.into_iter().map(|(_, label)| label).collect())
            }
            _ => Ok((0..self.num_labels.unwrap_or(2))
                .map(|i| format!("LABEL_{i}"))
                .collect()),
        }
    }
}

enum Encoder {
    Bert { model: BertModel, pooler: Linear },
    DistilBert { model: DistilBertModel, pre_classifier: Linear },
}

pub struct SequenceClassifier {
    architecture: Architecture,
    encoder: Encoder,
    classifier: Linear,
    tokenizer: Tokenizer,
    device: Device,
    id2label: Vec<String>,
    max_positions: usize,
}

impl SequenceClassifier {
    /// Fetches (or locates) the backend files and loads them onto `device`.
    pub async fn load(backend: &BackendSpec, device: &Device) -> Result<Self> {
        let files = backend.fetch().await?;
        Self::from_files(&files, device)
    }

    pub fn from_files(files: &ModelFiles, device: &Device) -> Result<Self> {
        let config_content = files.read_config()?;
        let head: HeadConfig = serde_json::from_str(&config_content)
            .map_err(|e| E::msg(format!("Failed to parse classifier config: {e}")))?;
        let architecture = head.architecture()?;
        let width = head.width()?;
        let id2label = head.ordered_labels()?;

        let vb = if files.is_safetensors() {
            unsafe {
                VarBuilder::from_mmaped_safetensors(&[files.weights.clone()], DType::F32, device)?
            }
        } else {
            VarBuilder::from_pth(&files.weights, DType::F32, device)?
        };

        let encoder_vb = vb.pp(architecture.prefix());
        let encoder = match architecture {
            Architecture::Bert => {
                let config: bert::Config = serde_json::from_str(&config_content)
                    .map_err(|e| E::msg(format!("Failed to parse model config: {e}")))?;
                Encoder::Bert {
                    model: BertModel::load(encoder_vb.clone(), &config)?,
                    pooler: candle_nn::linear(width, width, encoder_vb.pp("pooler").pp("dense"))?,
                }
            }
            Architecture::DistilBert => {
                let config: distilbert::Config = serde_json::from_str(&config_content)
                    .map_err(|e| E::msg(format!("Failed to parse model config: {e}")))?;
                Encoder::DistilBert {
                    model: DistilBertModel::load(encoder_vb, &config)?,
                    pre_classifier: candle_nn::linear(width, width, vb.pp("pre_classifier"))?,
                }
            }
        };
        let classifier = candle_nn::linear(width, id2label.len(), vb.pp("classifier"))?;
        let tokenizer = load_tokenizer(&files.tokenizer)?;

        tracing::info!(
            architecture = ?architecture,
            classes = id2label.len(),
            window = head.max_position_embeddings,
            "sequence classifier loaded"
        );

        Ok(Self {
            architecture,
            encoder,
            classifier,
            tokenizer,
            device: device.clone(),
            id2label,
            max_positions: head.max_position_embeddings,
        })
    }

    pub fn architecture(&self) -> Architecture {
        self.architecture
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn predict(&self, text: &str) -> Result<RawClassification> {
        // Tokenize
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| E::msg(format!("Tokenization error: {e}")))?;
        let token_ids = encoding.get_ids();
        anyhow::ensure!(
            token_ids.len() <= self.max_positions,
            "input is {} tokens but the classifier window is {}",
            token_ids.len(),
            self.max_positions
        );

        // Prepare tensors
        let input_ids = Tensor::new(token_ids, &self.device)?.unsqueeze(0)?;
        let attention_mask = Tensor::new(encoding.get_attention_mask(), &self.device)?;

        // Forward pass, then reduce the [CLS] state
        let features = match &self.encoder {
            Encoder::Bert { model, pooler } => {
                let token_type_ids = input_ids.zeros_like()?;
                let attention_mask = attention_mask.unsqueeze(0)?;
                let sequence_output =
                    model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
                let cls = sequence_output.i((.., 0))?;
                pooler.forward(&cls)?.tanh()?
            }
            Encoder::DistilBert {
                model,
                pre_classifier,
            } => {
                // DistilBERT takes the inverse: nonzero marks a hidden position.
                let hidden = attention_mask
                    .eq(0u32)?
                    .reshape((1, 1, 1, token_ids.len()))?;
                let sequence_output = model.forward(&input_ids, &hidden)?;
                let cls = sequence_output.i((.., 0))?;
                pre_classifier.forward(&cls)?.relu()?
            }
        };
        let logits = self.classifier.forward(&features)?;

        let probabilities = candle_nn::ops::softmax(&logits, 1)?
            .squeeze(0)?
            .to_vec1::<f32>()?;
        let (index, confidence) = probabilities
            .iter()
            .copied()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .ok_or_else(|| E::msg("classifier produced no logits"))?;
        let label = self
            .id2label
            .get(index)
            .ok_or_else(|| E::msg(format!("Predicted ID '{index}' not found in id2label map")))?
            .clone();

        Ok(RawClassification { label, confidence })
    }
}

impl TextClassifier for SequenceClassifier {
    fn classify(&mut self, text: &str) -> Result<RawClassification> {
        self.predict(text)
    }

    fn labels(&self) -> Vec<String> {
        self.id2label.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head(json: &str) -> HeadConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn id2label_is_ordered_by_class_index() {
        let config = head(
            r#"{"hidden_size": 8, "max_position_embeddings": 512,
                "id2label": {"2": "positive", "0": "negative", "1": "neutral"}}"#,
        );
        assert_eq!(
            config.ordered_labels().unwrap(),
            vec!["negative", "neutral", "positive"]
        );
    }

    #[test]
    fn unnamed_heads_get_indexed_labels() {
        let config = head(r#"{"hidden_size": 8, "max_position_embeddings": 512}"#);
        assert_eq!(config.ordered_labels().unwrap(), vec!["LABEL_0", "LABEL_1"]);

        let config =
            head(r#"{"hidden_size": 8, "max_position_embeddings": 512, "num_labels": 3}"#);
        assert_eq!(config.ordered_labels().unwrap().len(), 3);
    }

    #[test]
    fn architecture_comes_from_model_type() {
        let config = head(
            r#"{"model_type": "distilbert", "dim": 768, "max_position_embeddings": 512,
                "architectures": ["DistilBertForSequenceClassification"],
                "id2label": {"0": "NEGATIVE", "1": "POSITIVE"}}"#,
        );
        assert_eq!(config.architecture().unwrap(), Architecture::DistilBert);
        assert_eq!(config.width().unwrap(), 768);
        assert_eq!(config.ordered_labels().unwrap(), vec!["NEGATIVE", "POSITIVE"]);

        let config = head(
            r#"{"model_type": "bert", "hidden_size": 8, "max_position_embeddings": 512}"#,
        );
        assert_eq!(config.architecture().unwrap(), Architecture::Bert);
        assert_eq!(config.width().unwrap(), 8);
    }

    #[test]
    fn architecture_falls_back_to_class_names() {
        let config = head(
            r#"{"dim": 16, "max_position_embeddings": 512,
                "architectures": ["DistilBertForSequenceClassification"]}"#,
        );
        assert_eq!(config.architecture().unwrap(), Architecture::DistilBert);

        let config = head(r#"{"hidden_size": 8, "max_position_embeddings": 512}"#);
        assert_eq!(config.architecture().unwrap(), Architecture::Bert);
    }

    #[test]
    fn unsupported_model_type_is_rejected() {
        let config = head(
            r#"{"model_type": "roberta", "hidden_size": 8, "max_position_embeddings": 514}"#,
        );
        let err = config.architecture().unwrap_err();
        assert!(err.to_string().contains("roberta"));

        let config = head(r#"{"model_type": "bert", "max_position_embeddings": 512}"#);
        assert!(config.width().is_err());
    }

    #[test]
    fn gaps_in_id2label_are_rejected() {
        let config = head(
            r#"{"hidden_size": 8, "max_position_embeddings": 512,
                "id2label": {"0": "NEGATIVE", "2": "POSITIVE"}}"#,
        );
        assert!(config.ordered_labels().is_err());
    }
}

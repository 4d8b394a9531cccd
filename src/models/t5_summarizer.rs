//! T5 abstractive summarizer with greedy decoding.

use anyhow::{Error as E, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::t5::{Config, T5ForConditionalGeneration};
use tokenizers::Tokenizer;

use crate::loaders::{load_tokenizer, BackendSpec, ModelFiles};
use crate::pipelines::traits::{Summary, SummaryBounds, TextSummarizer};

/// Decoding settings for [`T5Summarizer`].
#[derive(Debug, Clone)]
pub struct SummarizerParams {
    /// Task prefix prepended to the document.
    pub prefix: String,
    /// Longest tokenized input accepted; longer documents are rejected.
    pub max_input_tokens: usize,
    pub repeat_penalty: f32,
    pub repeat_last_n: usize,
}

impl Default for SummarizerParams {
    fn default() -> Self {
        Self {
            prefix: "summarize: ".to_string(),
            max_input_tokens: 512,
            repeat_penalty: 1.0,
            repeat_last_n: 64,
        }
    }
}

pub struct T5Summarizer {
    model: T5ForConditionalGeneration,
    config: Config,
    tokenizer: Tokenizer,
    device: Device,
    params: SummarizerParams,
}

impl T5Summarizer {
    pub async fn load(backend: &BackendSpec, params: SummarizerParams, device: &Device) -> Result<Self> {
        let files = backend.fetch().await?;
        Self::from_files(&files, params, device)
    }

    pub fn from_files(files: &ModelFiles, params: SummarizerParams, device: &Device) -> Result<Self> {
        let config_content = files.read_config()?;
        let config: Config = serde_json::from_str(&config_content)
            .map_err(|e| E::msg(format!("Failed to parse model config: {e}")))?;

        let vb = if files.is_safetensors() {
            unsafe {
                VarBuilder::from_mmaped_safetensors(&[files.weights.clone()], DType::F32, device)?
            }
        } else {
            VarBuilder::from_pth(&files.weights, DType::F32, device)?
        };
        let model = T5ForConditionalGeneration::load(vb, &config)?;
        let tokenizer = load_tokenizer(&files.tokenizer)?;

        tracing::info!(
            max_input_tokens = params.max_input_tokens,
            "t5 summarizer loaded"
        );

        Ok(Self {
            model,
            config,
            tokenizer,
            device: device.clone(),
            params,
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    fn generate(&mut self, input_ids: &Tensor, bounds: SummaryBounds) -> Result<Vec<u32>> {
        let encoder_output = self.model.encode(input_ids)?;
        let eos = self.config.eos_token_id as u32;
        let start = self
            .config
            .decoder_start_token_id
            .unwrap_or(self.config.pad_token_id) as u32;

        let mut generated: Vec<u32> = Vec::with_capacity(bounds.max_len);
        while generated.len() < bounds.max_len {
            let decoder_ids = match generated.last() {
                // With the KV cache only the newest token is fed back.
                Some(&last) if self.config.use_cache => Tensor::new(&[last], &self.device)?,
                _ => {
                    let mut ids = Vec::with_capacity(generated.len() + 1);
                    ids.push(start);
                    ids.extend_from_slice(&generated);
                    Tensor::new(ids.as_slice(), &self.device)?
                }
            }
            .unsqueeze(0)?;

            let logits = self
                .model
                .decode(&decoder_ids, &encoder_output)?
                .squeeze(0)?
                .to_dtype(DType::F32)?;
            let start_at = generated.len().saturating_sub(self.params.repeat_last_n);
            let penalty_context = &generated[start_at..];
            let logits = if self.params.repeat_penalty <= 1. || penalty_context.is_empty() {
                logits
            } else {
                candle_transformers::utils::apply_repeat_penalty(
                    &logits,
                    self.params.repeat_penalty,
                    penalty_context,
                )?
            };

            let mut scores = logits.to_vec1::<f32>()?;
            if generated.len() < bounds.min_len {
                if let Some(score) = scores.get_mut(eos as usize) {
                    *score = f32::NEG_INFINITY;
                }
            }
            let next = argmax(&scores)?;
            if next == eos {
                break;
            }
            generated.push(next);
        }
        Ok(generated)
    }
}

fn argmax(scores: &[f32]) -> Result<u32> {
    scores
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(index, _)| index as u32)
        .ok_or_else(|| E::msg("decoder produced empty logits"))
}

impl TextSummarizer for T5Summarizer {
    fn summarize(&mut self, text: &str, bounds: SummaryBounds) -> Result<Summary> {
        let prompt = format!("{}{}", self.params.prefix, text);
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| E::msg(format!("Tokenization error: {e}")))?;
        let token_ids = encoding.get_ids();
        anyhow::ensure!(
            token_ids.len() <= self.params.max_input_tokens,
            "input is {} tokens but the summarizer accepts at most {}",
            token_ids.len(),
            self.params.max_input_tokens
        );
        let input_ids = Tensor::new(token_ids, &self.device)?.unsqueeze(0)?;

        self.model.clear_kv_cache();
        let generated = self.generate(&input_ids, bounds);
        self.model.clear_kv_cache();
        let generated = generated?;

        let text = self
            .tokenizer
            .decode(&generated, true)
            .map_err(|e| E::msg(format!("Detokenization error: {e}")))?;
        Ok(Summary {
            text: text.trim().to_string(),
            tokens: generated.len(),
        })
    }

    fn release(&mut self) {
        self.model.clear_kv_cache();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_picks_highest_score() {
        assert_eq!(argmax(&[0.1, 2.5, -1.0, 2.4]).unwrap(), 1);
    }

    #[test]
    fn argmax_skips_suppressed_tokens() {
        assert_eq!(argmax(&[f32::NEG_INFINITY, -3.0, -4.0]).unwrap(), 1);
    }

    #[test]
    fn argmax_rejects_empty_logits() {
        assert!(argmax(&[]).is_err());
    }
}

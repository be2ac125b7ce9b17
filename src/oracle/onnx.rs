// Local ONNX sentiment oracle using a 3-class RoBERTa sentiment model.
//
// Runs entirely on the local CPU: no API calls, no network dependency.
// The model emits logits for (negative, neutral, positive); softmax turns
// them into probabilities and compound = positive - negative.
//
// Model: Xenova/twitter-roberta-base-sentiment-latest (quantized ONNX export)

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::debug;

use super::traits::{Polarity, PolarityOracle, TokenWeights};
use super::NEGATION_MARKER;
use crate::analysis::normalize::runs;

/// Labels output by the sentiment model, in the order the model returns them.
const LABEL_ORDER: [&str; 3] = ["negative", "neutral", "positive"];

/// Longest token sequence fed to the model; RoBERTa's position limit.
const MAX_SEQ_LEN: usize = 512;

/// RoBERTa pad token id.
const PAD_ID: i64 = 1;

/// Local ONNX-based sentiment oracle. Holds the model session and tokenizer
/// behind Arc<Mutex> so inference can run on spawn_blocking.
pub struct OnnxSentimentOracle {
    // ort::Session::run takes &mut self, hence the Mutex
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
}

impl OnnxSentimentOracle {
    /// Load the ONNX model and tokenizer from the given directory.
    ///
    /// Expects `model_quantized.onnx` and `tokenizer.json` in `model_dir`.
    /// Call `download::download_model()` first if they don't exist.
    pub fn load(model_dir: &Path) -> Result<Self> {
        let model_path = model_dir.join(super::download::MODEL_FILE);
        let tokenizer_path = model_dir.join(super::download::TOKENIZER_FILE);

        if !model_path.exists() {
            anyhow::bail!(
                "Model file not found: {}\nRun `peertone download-model` to download it.",
                model_path.display()
            );
        }
        if !tokenizer_path.exists() {
            anyhow::bail!(
                "Tokenizer file not found: {}\nRun `peertone download-model` to download it.",
                tokenizer_path.display()
            );
        }

        let session = Session::builder()
            .context("Failed to create ONNX session builder")?
            .commit_from_file(&model_path)
            .with_context(|| format!("Failed to load ONNX model from {}", model_path.display()))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;

        debug!("Loaded ONNX sentiment model from {}", model_dir.display());

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
        })
    }
}

#[async_trait]
impl PolarityOracle for OnnxSentimentOracle {
    /// Tokenize and run one forward pass on a blocking thread.
    async fn score(&self, text: &str, _overlay: &TokenWeights) -> Result<Polarity> {
        let surface = surface_form(text);
        if surface.trim().is_empty() {
            return Ok(Polarity::neutral());
        }

        let session = Arc::clone(&self.session);
        let tokenizer = Arc::clone(&self.tokenizer);

        tokio::task::spawn_blocking(move || {
            let encoding = tokenizer
                .encode(surface.as_str(), true)
                .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;

            let seq_len = encoding.get_ids().len().min(MAX_SEQ_LEN);
            let mut input_ids: Vec<i64> = encoding.get_ids()[..seq_len]
                .iter()
                .map(|&id| id as i64)
                .collect();
            let mut attention_mask: Vec<i64> = encoding.get_attention_mask()[..seq_len]
                .iter()
                .map(|&m| m as i64)
                .collect();
            if input_ids.is_empty() {
                input_ids.push(PAD_ID);
                attention_mask.push(0);
            }

            let shape = [1i64, input_ids.len() as i64];
            let input_ids_tensor = Tensor::from_array((shape, input_ids))
                .context("Failed to create input_ids tensor")?;
            let attention_mask_tensor = Tensor::from_array((shape, attention_mask))
                .context("Failed to create attention_mask tensor")?;

            let logits = {
                let mut session = session
                    .lock()
                    .map_err(|e| anyhow::anyhow!("Session lock poisoned: {}", e))?;

                let outputs = session
                    .run(ort::inputs! {
                        "input_ids" => input_ids_tensor,
                        "attention_mask" => attention_mask_tensor
                    })
                    .context("ONNX inference failed")?;

                // Output shape: [1, 3] raw logits
                let (_shape, data) = outputs[0]
                    .try_extract_tensor::<f32>()
                    .context("Failed to extract output tensor")?;

                data.iter().map(|&x| x as f64).collect::<Vec<f64>>()
            };

            if logits.len() < LABEL_ORDER.len() {
                anyhow::bail!(
                    "Sentiment model returned {} logits, expected {}",
                    logits.len(),
                    LABEL_ORDER.len()
                );
            }

            let probs = softmax(&logits[..LABEL_ORDER.len()]);
            let polarity = Polarity::from_probabilities(probs[0], probs[1], probs[2]);

            debug!(
                compound = polarity.compound,
                text_preview = %crate::output::truncate_chars(&surface, 50),
                "ONNX scored text"
            );

            Ok(polarity)
        })
        .await
        .context("spawn_blocking panicked")?
    }

    fn name(&self) -> &'static str {
        "onnx"
    }
}

/// Render normalized text back into plain words for a subword tokenizer:
/// negation markers are dropped and canonical tokens lose their underscores.
pub fn surface_form(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (is_word, run) in runs(text) {
        if is_word {
            let word = run.strip_prefix(NEGATION_MARKER).unwrap_or(run);
            out.push_str(&word.replace('_', " "));
        } else {
            out.push_str(run);
        }
    }
    out
}

/// Numerically stable softmax.
fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

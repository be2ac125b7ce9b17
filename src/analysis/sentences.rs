// Sentence analyzer: per-sentence oracle scores reduced to count / mean / min.

use anyhow::Result;

use super::models::SentenceStats;
use crate::oracle::traits::{PolarityOracle, TokenWeights};

/// Split on `.`, `?` or `!` followed by whitespace. The terminal mark stays
/// with its sentence; empty pieces are dropped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if matches!(c, '.' | '?' | '!') {
            if let Some(&(next_i, next_c)) = chars.peek() {
                if next_c.is_whitespace() {
                    sentences.push(&text[start..next_i]);
                    start = next_i;
                }
            }
        }
    }
    sentences.push(&text[start..]);

    sentences
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Score each sentence and summarize. Empty text yields `{0, 0.0, 0.0}`.
pub async fn sentence_stats(
    oracle: &dyn PolarityOracle,
    text: &str,
    overlay: &TokenWeights,
) -> Result<SentenceStats> {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return Ok(SentenceStats::default());
    }

    let mut compounds = Vec::with_capacity(sentences.len());
    for sentence in &sentences {
        compounds.push(oracle.score(sentence, overlay).await?.compound);
    }

    Ok(summarize(&compounds))
}

fn summarize(compounds: &[f64]) -> SentenceStats {
    if compounds.is_empty() {
        return SentenceStats::default();
    }
    let sum: f64 = compounds.iter().sum();
    let min = compounds.iter().cloned().fold(f64::INFINITY, f64::min);
    SentenceStats {
        count: compounds.len(),
        avg_compound: sum / compounds.len() as f64,
        min_compound: min,
    }
}

// Per-comment orchestrator.
//
// Fixed stage order:
//   normalize -> sentence stats -> whole-text oracle -> contrast rebalance
//   -> sentence rescue -> toxicity override -> target bias -> label
//   -> disparity
//
// The result is a pure function of the input, the heuristics, the label
// policy and the oracle. Nothing is shared between items.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use super::models::{AnalysisResult, CommentInput, Label};
use super::normalize::{char_count, normalize, word_count};
use super::rules::Heuristics;
use super::{bias, contrast, disparity, label::LabelPolicy, label::score_from_compound, sentences, toxicity};
use crate::oracle::traits::PolarityOracle;

/// The configured scoring engine. Cheap to clone; everything inside is shared
/// and read-only.
#[derive(Clone)]
pub struct Engine {
    oracle: Arc<dyn PolarityOracle>,
    heuristics: Arc<Heuristics>,
    label_policy: LabelPolicy,
}

impl Engine {
    pub fn new(
        oracle: Arc<dyn PolarityOracle>,
        heuristics: Arc<Heuristics>,
        label_policy: LabelPolicy,
    ) -> Self {
        Self {
            oracle,
            heuristics,
            label_policy,
        }
    }

    pub fn oracle_name(&self) -> &'static str {
        self.oracle.name()
    }

    pub fn label_policy(&self) -> LabelPolicy {
        self.label_policy
    }

    pub fn heuristics(&self) -> &Heuristics {
        &self.heuristics
    }

    /// Score one comment. Errors come only from the oracle; parse problems
    /// in the declared score just switch disparity detection off.
    pub async fn analyze(&self, input: &CommentInput) -> Result<AnalysisResult> {
        let trimmed = input.text.trim();
        let h = self.heuristics.as_ref();

        let declared = match disparity::declared_score(input) {
            Ok(declared) => declared,
            Err(e) => {
                debug!(error = %e, "Skipping disparity detection");
                None
            }
        };

        if trimmed.is_empty() {
            let d = disparity::evaluate(
                Label::Neutral,
                0.0,
                0.0,
                declared,
                &h.bands,
                h.disparity_policy,
            );
            return Ok(AnalysisResult {
                disparity: d.flagged,
                disparity_reason: d.reason,
                suggest_confirm: d.suggest_confirm,
                id: input.id.clone(),
                ..AnalysisResult::neutral()
            });
        }

        let normalized = normalize(trimmed, h);
        let overlay = &normalized.overlay;

        let stats = sentences::sentence_stats(self.oracle.as_ref(), &normalized.text, overlay)
            .await
            .context("Sentence scoring failed")?;

        let whole = self
            .oracle
            .score(&normalized.text, overlay)
            .await
            .context("Whole-text scoring failed")?;

        let mut compound =
            contrast::rebalance(self.oracle.as_ref(), h, &normalized.text, whole.compound, overlay)
                .await
                .context("Contrast scoring failed")?;
        compound = contrast::rescue_blend(compound, stats.min_compound);

        let toxic = toxicity::is_toxic(trimmed, h);
        let (forced, overridden) = toxicity::apply_override(compound, toxic);
        compound = forced;

        let label = if overridden {
            Label::Toxic
        } else {
            let label = self.label_policy.label(compound);
            let author = bias::authorship(input.target, &normalized.text);
            compound = bias::adjust(compound, label, author);
            self.label_policy.label(compound)
        };

        let compound = compound.clamp(-1.0, 1.0);
        let score = score_from_compound(compound);

        let d = disparity::evaluate(
            label,
            compound,
            stats.min_compound,
            declared,
            &h.bands,
            h.disparity_policy,
        );

        debug!(
            label = %label,
            compound,
            toxic,
            disparity = d.flagged,
            text_preview = %crate::output::truncate_chars(trimmed, 50),
            "Scored comment"
        );

        Ok(AnalysisResult {
            label,
            score,
            confidence: score,
            compound,
            pos: whole.pos,
            neu: whole.neu,
            neg: whole.neg,
            toxic,
            word_count: word_count(trimmed),
            char_count: char_count(trimmed),
            sentence_stats: stats,
            matched_tokens: normalized.matched_tokens,
            negation_used: normalized.negation_used,
            disparity: d.flagged,
            disparity_reason: d.reason,
            suggest_confirm: d.suggest_confirm,
            id: input.id.clone(),
            error: None,
        })
    }
}

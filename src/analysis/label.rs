// Label mapping. Two interchangeable policies: threshold the derived [0, 1]
// score, or threshold the raw compound. The toxic label is assigned by the
// toxicity override and never comes out of here.

use super::models::Label;

/// Score at or above which a comment reads positive.
pub const POS_THR: f64 = 0.62;
/// Score at or below which a comment reads negative.
pub const NEG_THR: f64 = 0.44;
/// Compound at or above which a comment reads positive.
pub const POS_C: f64 = 0.05;
/// Compound at or below which a comment reads negative.
pub const NEG_C: f64 = -0.05;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LabelPolicy {
    /// Threshold `score = (compound + 1) / 2`
    ScoreBand { pos_thr: f64, neg_thr: f64 },
    /// Threshold the compound directly
    Compound { pos_c: f64, neg_c: f64 },
}

impl LabelPolicy {
    pub fn default_score_band() -> Self {
        LabelPolicy::ScoreBand {
            pos_thr: POS_THR,
            neg_thr: NEG_THR,
        }
    }

    pub fn default_compound() -> Self {
        LabelPolicy::Compound {
            pos_c: POS_C,
            neg_c: NEG_C,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LabelPolicy::ScoreBand { .. } => "band",
            LabelPolicy::Compound { .. } => "compound",
        }
    }

    pub fn label(&self, compound: f64) -> Label {
        match *self {
            LabelPolicy::ScoreBand { pos_thr, neg_thr } => {
                let score = score_from_compound(compound);
                if score >= pos_thr {
                    Label::Positive
                } else if score <= neg_thr {
                    Label::Negative
                } else {
                    Label::Neutral
                }
            }
            LabelPolicy::Compound { pos_c, neg_c } => {
                if compound >= pos_c {
                    Label::Positive
                } else if compound <= neg_c {
                    Label::Negative
                } else {
                    Label::Neutral
                }
            }
        }
    }
}

/// Map a compound in [-1, 1] to a score in [0, 1].
pub fn score_from_compound(compound: f64) -> f64 {
    ((compound + 1.0) / 2.0).clamp(0.0, 1.0)
}

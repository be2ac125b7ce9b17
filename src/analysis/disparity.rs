// Disparity detection: does the declared numeric score contradict the tone
// of the comment?
//
// The bands and cutoffs are fixed constants calibrated against how
// instructors read the 5-25 score range. Changing them changes which
// comments get flagged.

use anyhow::Result;
use serde_json::Value;

use super::models::{CommentInput, Label};

pub const SCORE_MIN_DEFAULT: f64 = 5.0;
pub const SCORE_MAX_DEFAULT: f64 = 25.0;

pub const LOW_BAND_MIN: f64 = 5.0;
pub const LOW_BAND_MAX: f64 = 10.0;
pub const HIGH_BAND_MIN: f64 = 20.0;
pub const HIGH_BAND_MAX: f64 = 25.0;

/// High score flagged when some sentence is at or below this compound.
pub const HIGH_BAND_SENTENCE_MAX: f64 = -0.50;
/// Low score flagged when the overall compound is at or above this.
pub const LOW_BAND_COMPOUND_MIN: f64 = 0.45;

/// Inclusive score bands that are checked against the comment's tone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBands {
    pub low: (f64, f64),
    pub high: (f64, f64),
}

impl Default for ScoreBands {
    fn default() -> Self {
        Self {
            low: (LOW_BAND_MIN, LOW_BAND_MAX),
            high: (HIGH_BAND_MIN, HIGH_BAND_MAX),
        }
    }
}

impl ScoreBands {
    pub fn is_low(&self, score: f64) -> bool {
        self.low.0 <= score && score <= self.low.1
    }

    pub fn is_high(&self, score: f64) -> bool {
        self.high.0 <= score && score <= self.high.1
    }
}

/// Which rules run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisparityPolicy {
    /// Label-only rules: low+positive, high+negative/toxic
    Basic,
    /// Basic plus the sentence-minimum and strong-compound rules
    Extended,
}

/// The declared score, parsed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeclaredScore {
    pub total: f64,
    pub min: f64,
    pub max: f64,
}

/// Outcome of disparity detection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Disparity {
    pub flagged: bool,
    pub reason: Option<String>,
    pub suggest_confirm: bool,
}

impl Disparity {
    pub fn none() -> Self {
        Self::default()
    }
}

/// Parse the declared score of an item.
///
/// `Ok(None)` when no total was sent. `Err` when any of the three fields is
/// present but not a finite number (numeric strings are accepted).
pub fn declared_score(input: &CommentInput) -> Result<Option<DeclaredScore>> {
    let Some(total) = input.score_total.as_ref() else {
        return Ok(None);
    };
    let total = parse_number(total, "score_total")?;
    let min = match input.score_min.as_ref() {
        Some(v) => parse_number(v, "score_min")?,
        None => SCORE_MIN_DEFAULT,
    };
    let max = match input.score_max.as_ref() {
        Some(v) => parse_number(v, "score_max")?,
        None => SCORE_MAX_DEFAULT,
    };
    Ok(Some(DeclaredScore { total, min, max }))
}

fn parse_number(value: &Value, field: &str) -> Result<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(n) if n.is_finite() => Ok(n),
        _ => anyhow::bail!("{field} is not a number: {value}"),
    }
}

/// Evaluate every rule in order; matching reasons are joined into one message.
pub fn evaluate(
    label: Label,
    compound: f64,
    min_sentence: f64,
    declared: Option<DeclaredScore>,
    bands: &ScoreBands,
    policy: DisparityPolicy,
) -> Disparity {
    let Some(declared) = declared else {
        return Disparity::none();
    };
    let total = declared.total;
    let low = bands.is_low(total);
    let high = bands.is_high(total);

    let mut reasons: Vec<String> = Vec::new();

    if low && label == Label::Positive {
        reasons.push(format!(
            "Total score {total} is low and the comment reads {label}."
        ));
    }
    if high && matches!(label, Label::Negative | Label::Toxic) {
        reasons.push(format!(
            "Total score {total} is high and the comment reads {label}."
        ));
    }
    if policy == DisparityPolicy::Extended {
        if high && min_sentence <= HIGH_BAND_SENTENCE_MAX {
            reasons.push(format!(
                "Total score {total} is high but at least one sentence is strongly negative \
                 (min compound {min_sentence:.2})."
            ));
        }
        if low && compound >= LOW_BAND_COMPOUND_MIN {
            reasons.push(format!(
                "Total score {total} is low but the overall tone is strongly positive \
                 (compound {compound:.2})."
            ));
        }
    }

    if reasons.is_empty() {
        return Disparity::none();
    }
    Disparity {
        flagged: true,
        reason: Some(reasons.join(" ")),
        suggest_confirm: true,
    }
}

// Contrast rebalancing and the sentence-rescue blend.
//
// "Good work overall, but deadlines slipped" is mostly about the tail, so
// the tail's polarity dominates once a contrast conjunction is found. The
// exception is a severe front clause ("unresponsive ... but nice"), which
// keeps control of the result.

use anyhow::Result;

use super::rules::Heuristics;
use crate::oracle::traits::{PolarityOracle, TokenWeights};

/// Front clause at or below this compound can dominate the tail.
pub const FRONT_SEVERE_MAX: f64 = -0.35;
pub const FRONT_DOMINANT_WEIGHT: f64 = 0.70;
pub const FRONT_TAIL_WEIGHT: f64 = 0.30;
/// Ceiling on the tail's contribution when the front dominates.
pub const FRONT_TAIL_CAP: f64 = 0.20;

/// Tail marker count at which the tail is treated as firmly negative.
pub const TAIL_HEAVY_MARKERS: usize = 3;
pub const TAIL_HEAVY_WEIGHT: f64 = 0.97;
pub const TAIL_HEAVY_BASE_WEIGHT: f64 = 0.03;
/// Ceiling on a heavy tail's compound.
pub const TAIL_HEAVY_CAP: f64 = -0.2;
pub const TAIL_WEIGHT: f64 = 0.95;
pub const TAIL_BASE_WEIGHT: f64 = 0.05;
/// Tail compound below this counts as negative even without markers.
pub const TAIL_NEGATIVE_BELOW: f64 = -0.05;

/// Rescue triggers when some sentence is at or below this compound...
pub const RESCUE_SENTENCE_MAX: f64 = -0.45;
/// ...while the blended compound is still above this.
pub const RESCUE_COMPOUND_ABOVE: f64 = -0.25;
pub const RESCUE_KEEP_WEIGHT: f64 = 0.65;
pub const RESCUE_SENTENCE_WEIGHT: f64 = 0.35;

/// A comment split at its first contrast conjunction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContrastSplit<'a> {
    pub front: &'a str,
    pub cue: &'a str,
    pub tail: &'a str,
}

/// Split at the first contrast conjunction (whole word, any case).
pub fn split_contrast<'a>(text: &'a str, heuristics: &Heuristics) -> Option<ContrastSplit<'a>> {
    let m = heuristics.contrast_pattern.find(text)?;
    Some(ContrastSplit {
        front: text[..m.start()].trim(),
        cue: m.as_str(),
        tail: text[m.end()..].trim(),
    })
}

/// Rebalance the whole-text compound `base` around a contrast clause.
/// Without a conjunction, or with nothing after it, `base` is returned as is.
pub async fn rebalance(
    oracle: &dyn PolarityOracle,
    heuristics: &Heuristics,
    text: &str,
    base: f64,
    overlay: &TokenWeights,
) -> Result<f64> {
    let Some(split) = split_contrast(text, heuristics) else {
        return Ok(base);
    };
    if split.tail.is_empty() {
        return Ok(base);
    }

    let front = oracle.score(split.front, overlay).await?.compound;
    let tail = oracle.score(split.tail, overlay).await?.compound;

    let front_is_critical = words(split.front)
        .any(|w| heuristics.critical_negative.contains(w.to_lowercase().as_str()));
    let markers = words(split.tail)
        .filter(|w| heuristics.tail_markers.contains(&w.to_lowercase()))
        .count();

    Ok(blend(front, tail, base, front_is_critical, markers))
}

/// The arithmetic of `rebalance`, separated from the oracle calls.
pub fn blend(front: f64, tail: f64, base: f64, front_is_critical: bool, markers: usize) -> f64 {
    if front <= FRONT_SEVERE_MAX && front_is_critical {
        return FRONT_DOMINANT_WEIGHT * front + FRONT_TAIL_WEIGHT * tail.min(FRONT_TAIL_CAP);
    }
    if markers >= TAIL_HEAVY_MARKERS {
        return TAIL_HEAVY_WEIGHT * tail.min(TAIL_HEAVY_CAP) + TAIL_HEAVY_BASE_WEIGHT * base;
    }
    if markers >= 1 || tail < TAIL_NEGATIVE_BELOW {
        return TAIL_WEIGHT * tail + TAIL_BASE_WEIGHT * base;
    }
    base
}

/// Pull the compound toward one strongly negative sentence so it is not
/// diluted by the rest of the comment.
pub fn rescue_blend(compound: f64, min_sentence: f64) -> f64 {
    if min_sentence <= RESCUE_SENTENCE_MAX && compound > RESCUE_COMPOUND_ABOVE {
        RESCUE_KEEP_WEIGHT * compound + RESCUE_SENTENCE_WEIGHT * min_sentence
    } else {
        compound
    }
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
}

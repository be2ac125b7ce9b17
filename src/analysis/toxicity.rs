// Toxicity override: explicit toxic vocabulary in the original text forces
// the toxic label. The compound is pulled down to TOXIC_COMPOUND unless it is
// already at least that negative.

use super::rules::Heuristics;

/// Compound a toxic comment is forced down to.
pub const TOXIC_COMPOUND: f64 = -0.6;

/// True when the untransformed text contains a toxic word.
pub fn is_toxic(original: &str, heuristics: &Heuristics) -> bool {
    heuristics.toxic_pattern.is_match(original)
}

/// Returns the (possibly forced) compound and whether the toxic label applies.
pub fn apply_override(compound: f64, toxic: bool) -> (f64, bool) {
    if toxic {
        (compound.min(TOXIC_COMPOUND), true)
    } else {
        (compound, false)
    }
}

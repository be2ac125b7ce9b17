// Target bias: a small nudge on positive comments depending on whether the
// author is writing about themselves or a teammate. Peer praise is taken
// slightly down, self-reports slightly up.

use super::models::{Label, Target};

/// Added to a positive self-report's compound.
pub const SELF_NUDGE: f64 = 0.02;
/// Added to a positive peer comment's compound.
pub const PEER_NUDGE: f64 = -0.03;

const FIRST_PERSON: &[&str] = &["i", "me", "my", "mine", "myself"];
const THIRD_PERSON: &[&str] = &[
    "he", "she", "him", "her", "his", "hers", "himself", "herself", "they", "them", "their",
    "theirs", "themselves",
];

/// Decide who the comment is about. The declared target wins; otherwise
/// the majority of first- vs third-person pronouns decides, and a tie
/// leaves it unknown.
pub fn authorship(target: Option<Target>, normalized: &str) -> Option<Target> {
    if target.is_some() {
        return target;
    }

    let mut first = 0usize;
    let mut third = 0usize;
    for word in normalized
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let word = word.to_lowercase();
        if FIRST_PERSON.contains(&word.as_str()) {
            first += 1;
        } else if THIRD_PERSON.contains(&word.as_str()) {
            third += 1;
        }
    }

    match first.cmp(&third) {
        std::cmp::Ordering::Greater => Some(Target::SelfReport),
        std::cmp::Ordering::Less => Some(Target::Peer),
        std::cmp::Ordering::Equal => None,
    }
}

/// Nudge `compound` when the current label is positive. Non-positive
/// labels and unknown authorship leave it unchanged.
pub fn adjust(compound: f64, label: Label, author: Option<Target>) -> f64 {
    if label != Label::Positive {
        return compound;
    }
    let nudged = match author {
        Some(Target::SelfReport) => compound + SELF_NUDGE,
        Some(Target::Peer) => compound + PEER_NUDGE,
        None => compound,
    };
    nudged.clamp(-1.0, 1.0)
}

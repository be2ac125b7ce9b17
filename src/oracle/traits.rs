// Polarity oracle trait: the swap-ready abstraction.
//
// Every stage of the scoring pipeline talks to the oracle through this trait
// only. The in-process lexicon scorer is the default; a local ONNX sentiment
// transformer and a remote HTTP scorer are drop-in alternatives.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

/// Polarity of a single text span.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Polarity {
    /// Overall polarity in [-1, 1]
    pub compound: f64,
    /// Share of positive signal (0.0 to 1.0)
    pub pos: f64,
    /// Share of neutral signal (0.0 to 1.0)
    pub neu: f64,
    /// Share of negative signal (0.0 to 1.0)
    pub neg: f64,
}

impl Polarity {
    /// A span with no polarity signal at all.
    pub fn neutral() -> Self {
        Self {
            compound: 0.0,
            pos: 0.0,
            neu: 1.0,
            neg: 0.0,
        }
    }

    /// Build from a (negative, neutral, positive) probability triple.
    /// The compound is the positive minus the negative probability.
    pub fn from_probabilities(neg: f64, neu: f64, pos: f64) -> Self {
        Self {
            compound: (pos - neg).clamp(-1.0, 1.0),
            pos,
            neu,
            neg,
        }
    }
}

/// Token weights injected for one item only (e.g. percentage-aware phrase
/// tokens whose weight depends on the captured number). Never shared across
/// items, so the oracle's own lexicon stays immutable.
pub type TokenWeights = HashMap<String, f64>;

/// Trait for scoring the polarity of a text span. Async because remote
/// oracles need HTTP calls and local transformer inference is offloaded
/// to a blocking thread.
#[async_trait]
pub trait PolarityOracle: Send + Sync {
    /// Score one text span. `overlay` holds item-scoped token weights;
    /// oracles without a lexicon ignore it.
    async fn score(&self, text: &str, overlay: &TokenWeights) -> Result<Polarity>;

    /// Short identifier reported by the health endpoint and logs.
    fn name(&self) -> &'static str;
}

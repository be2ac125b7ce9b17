// In-process lexicon polarity scorer.
//
// Sums per-token valences (roughly -4 to +4), applies booster words and
// exclamation emphasis, then squashes the sum into [-1, 1]. The base word list
// is small and evaluation-oriented; domain phrase tokens and weak-negative
// vocabulary are layered on top once at startup via `with_extensions`.
//
// Negation is not detected here. The text normalizer marks negated words with
// NEGATION_MARKER and this scorer flips their valence, so "not good" arrives
// as "not neg_good" and scores as a single negative unit.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use super::traits::{Polarity, PolarityOracle, TokenWeights};
use super::NEGATION_MARKER;

/// Valence multiplier for a negation-marked token.
const NEGATION_SCALAR: f64 = -0.74;

/// Valence added (or removed) by a booster word directly before a sentiment word.
const BOOSTER_INCREMENT: f64 = 0.293;

/// Emphasis added per exclamation mark, capped at EXCLAMATION_CAP marks.
const EXCLAMATION_INCREMENT: f64 = 0.292;
const EXCLAMATION_CAP: usize = 4;

/// Squashing constant: compound = s / sqrt(s^2 + ALPHA).
const ALPHA: f64 = 15.0;

/// How far back a booster can reach, with the damping applied at each distance.
const BOOSTER_DAMPING: [f64; 3] = [1.0, 0.95, 0.9];

const BASE_LEXICON: &[(&str, f64)] = &[
    // positive
    ("good", 1.9),
    ("great", 3.1),
    ("excellent", 2.7),
    ("amazing", 2.8),
    ("awesome", 3.1),
    ("fantastic", 2.6),
    ("outstanding", 3.0),
    ("impressive", 2.3),
    ("best", 3.2),
    ("nice", 1.8),
    ("fine", 0.8),
    ("well", 1.1),
    ("helpful", 1.7),
    ("supportive", 2.1),
    ("reliable", 1.9),
    ("responsive", 1.3),
    ("dedicated", 1.8),
    ("hardworking", 1.6),
    ("proactive", 1.5),
    ("organized", 1.2),
    ("efficient", 1.8),
    ("valuable", 2.1),
    ("creative", 1.9),
    ("friendly", 2.2),
    ("kind", 2.4),
    ("clear", 1.6),
    ("talented", 2.3),
    ("skilled", 1.5),
    ("strong", 2.3),
    ("positive", 2.6),
    ("happy", 2.7),
    ("love", 3.2),
    ("enjoyed", 2.3),
    ("thanks", 1.9),
    ("thank", 1.5),
    ("appreciate", 2.6),
    ("appreciated", 2.3),
    ("contributed", 1.0),
    ("contribution", 1.0),
    ("committed", 1.1),
    ("willing", 1.1),
    ("easy", 1.9),
    // negative
    ("bad", -2.5),
    ("poor", -2.1),
    ("terrible", -2.1),
    ("awful", -2.0),
    ("horrible", -2.5),
    ("worst", -3.1),
    ("lazy", -2.0),
    ("rude", -2.0),
    ("annoying", -1.7),
    ("disappointing", -2.2),
    ("disappointed", -1.9),
    ("careless", -1.6),
    ("unhelpful", -1.8),
    ("unprofessional", -1.7),
    ("disrespectful", -1.9),
    ("sloppy", -1.7),
    ("confusing", -1.4),
    ("slow", -1.0),
    ("fail", -2.5),
    ("failed", -2.3),
    ("failure", -2.3),
    ("missed", -1.2),
    ("absent", -1.2),
    ("ignored", -1.3),
    ("wrong", -2.1),
    ("angry", -2.3),
    ("useless", -1.8),
    ("worthless", -1.9),
    ("stupid", -2.4),
    ("idiot", -2.3),
    ("moron", -2.2),
    ("loser", -2.4),
    ("garbage", -1.9),
    ("trash", -1.8),
    ("hate", -2.7),
    ("toxic", -2.3),
];

const BOOSTERS: &[(&str, f64)] = &[
    ("absolutely", BOOSTER_INCREMENT),
    ("completely", BOOSTER_INCREMENT),
    ("extremely", BOOSTER_INCREMENT),
    ("highly", BOOSTER_INCREMENT),
    ("incredibly", BOOSTER_INCREMENT),
    ("really", BOOSTER_INCREMENT),
    ("so", BOOSTER_INCREMENT),
    ("super", BOOSTER_INCREMENT),
    ("totally", BOOSTER_INCREMENT),
    ("very", BOOSTER_INCREMENT),
    ("especially", BOOSTER_INCREMENT),
    ("particularly", BOOSTER_INCREMENT),
    ("slightly", -BOOSTER_INCREMENT),
    ("somewhat", -BOOSTER_INCREMENT),
    ("partly", -BOOSTER_INCREMENT),
    ("kinda", -BOOSTER_INCREMENT),
    ("marginally", -BOOSTER_INCREMENT),
];

/// Lexicon-based polarity oracle. Immutable after construction.
#[derive(Debug, Clone)]
pub struct LexiconOracle {
    lexicon: HashMap<String, f64>,
    boosters: HashMap<&'static str, f64>,
}

impl Default for LexiconOracle {
    fn default() -> Self {
        Self::with_extensions(std::iter::empty())
    }
}

impl LexiconOracle {
    /// Build the base lexicon and layer `extensions` on top. Later entries
    /// override earlier ones, so domain weights win over base words.
    pub fn with_extensions<I>(extensions: I) -> Self
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        let mut lexicon: HashMap<String, f64> = BASE_LEXICON
            .iter()
            .map(|(word, v)| (word.to_string(), *v))
            .collect();
        for (token, weight) in extensions {
            lexicon.insert(token.to_lowercase(), weight);
        }

        Self {
            lexicon,
            boosters: BOOSTERS.iter().copied().collect(),
        }
    }

    /// Number of entries in the lexicon (base words plus extensions).
    pub fn len(&self) -> usize {
        self.lexicon.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lexicon.is_empty()
    }

    /// Synchronous scoring. The trait method delegates here.
    pub fn polarity(&self, text: &str, overlay: &TokenWeights) -> Polarity {
        let tokens: Vec<String> = text
            .split_whitespace()
            .map(|raw| {
                raw.trim_matches(|c: char| !c.is_alphanumeric() && c != '_')
                    .to_lowercase()
            })
            .filter(|t| !t.is_empty())
            .collect();

        let mut valences = Vec::with_capacity(tokens.len());
        for (i, token) in tokens.iter().enumerate() {
            let mut v = self.valence(token, overlay);
            if v != 0.0 {
                v = self.apply_boosters(&tokens, i, v);
            }
            valences.push(v);
        }

        let exclamations = text.matches('!').count().min(EXCLAMATION_CAP);
        let emphasis = exclamations as f64 * EXCLAMATION_INCREMENT;

        let mut sum: f64 = valences.iter().sum();
        if sum > 0.0 {
            sum += emphasis;
        } else if sum < 0.0 {
            sum -= emphasis;
        }

        if valences.iter().all(|v| *v == 0.0) {
            return Polarity::neutral();
        }

        let mut pos_sum = 0.0;
        let mut neg_sum = 0.0;
        let mut neu_count = 0.0;
        for v in &valences {
            if *v > 0.0 {
                pos_sum += v + 1.0;
            } else if *v < 0.0 {
                neg_sum += v - 1.0;
            } else {
                neu_count += 1.0;
            }
        }
        if pos_sum > neg_sum.abs() {
            pos_sum += emphasis;
        } else if pos_sum < neg_sum.abs() {
            neg_sum -= emphasis;
        }

        let total = pos_sum + neg_sum.abs() + neu_count;
        Polarity {
            compound: normalize(sum),
            pos: pos_sum / total,
            neu: neu_count / total,
            neg: neg_sum.abs() / total,
        }
    }

    fn valence(&self, token: &str, overlay: &TokenWeights) -> f64 {
        if let Some(v) = self.lookup(token, overlay) {
            return v;
        }
        match token.strip_prefix(NEGATION_MARKER) {
            Some(base) => self
                .lookup(base, overlay)
                .map(|v| v * NEGATION_SCALAR)
                .unwrap_or(0.0),
            None => 0.0,
        }
    }

    fn lookup(&self, token: &str, overlay: &TokenWeights) -> Option<f64> {
        overlay
            .get(token)
            .or_else(|| self.lexicon.get(token))
            .copied()
    }

    /// Scale `v` by booster words in the up-to-three tokens before `index`.
    fn apply_boosters(&self, tokens: &[String], index: usize, mut v: f64) -> f64 {
        for (distance, damping) in BOOSTER_DAMPING.iter().enumerate() {
            let Some(prev_index) = index.checked_sub(distance + 1) else {
                break;
            };
            let prev = &tokens[prev_index];
            let prev = prev.strip_prefix(NEGATION_MARKER).unwrap_or(prev);
            if let Some(&increment) = self.boosters.get(prev) {
                let scaled = increment * damping;
                v += if v > 0.0 { scaled } else { -scaled };
            }
        }
        v
    }
}

#[async_trait]
impl PolarityOracle for LexiconOracle {
    async fn score(&self, text: &str, overlay: &TokenWeights) -> Result<Polarity> {
        Ok(self.polarity(text, overlay))
    }

    fn name(&self) -> &'static str {
        "lexicon"
    }
}

/// Squash an unbounded valence sum into [-1, 1].
fn normalize(sum: f64) -> f64 {
    (sum / (sum * sum + ALPHA).sqrt()).clamp(-1.0, 1.0)
}

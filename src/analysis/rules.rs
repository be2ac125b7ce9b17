// Immutable scoring configuration: the ordered phrase table, the domain
// lexicon weights, and the vocabularies the post-processing stages match on.
//
// Built once at startup and shared behind Arc. The phrase table is ordered:
// each rule runs on the previous rule's output, so a rule can only see text
// that earlier rules left behind (or produced).

use std::collections::HashSet;

use anyhow::{Context, Result};
use regex_lite::Regex;

use super::disparity::{DisparityPolicy, ScoreBands};

/// What a phrase rule writes in place of its match.
#[derive(Debug, Clone, Copy)]
pub enum RuleKind {
    /// Structural rewrite that other rules build on. Its output is not a
    /// canonical token and carries no weight. `$1`-style expansion applies.
    Rewrite { replacement: &'static str },
    /// A fixed canonical token with a fixed lexicon weight.
    Canonical { token: &'static str, weight: f64 },
    /// A token that embeds the captured percentage (first capture group),
    /// `{prefix}{n}{suffix}`, weighted at match time by `weight_fn(n)`.
    Percentage {
        prefix: &'static str,
        suffix: &'static str,
        weight_fn: fn(f64) -> f64,
    },
}

/// One entry of the ordered phrase table.
#[derive(Debug, Clone)]
pub struct PhraseRule {
    pub pattern: Regex,
    pub kind: RuleKind,
}

impl PhraseRule {
    fn new(pattern: &str, kind: RuleKind) -> Result<Self> {
        let pattern = Regex::new(&format!("(?i){pattern}"))
            .with_context(|| format!("Invalid phrase rule pattern: {pattern}"))?;
        Ok(Self { pattern, kind })
    }

    /// True when the rule can emit `token`.
    pub fn declares(&self, token: &str) -> bool {
        match self.kind {
            RuleKind::Rewrite { .. } => false,
            RuleKind::Canonical { token: t, .. } => t == token,
            RuleKind::Percentage { prefix, suffix, .. } => token
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_suffix(suffix))
                .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit())),
        }
    }
}

/// Share of the work one member of a typical four-person team would do.
pub const FAIR_SHARE_PCT: f64 = 25.0;
/// Percentage points per unit of lexicon weight.
pub const PCT_POINTS_PER_UNIT: f64 = 15.0;
/// Largest magnitude a percentage token can carry.
pub const PCT_WEIGHT_CAP: f64 = 3.6;

/// Monotonic weight for "did N% of the work": penalty below a fair share,
/// bonus above it.
pub fn work_share_weight(pct: f64) -> f64 {
    ((pct - FAIR_SHARE_PCT) / PCT_POINTS_PER_UNIT).clamp(-PCT_WEIGHT_CAP, PCT_WEIGHT_CAP)
}

/// The phrase table in application order. Patterns are case-insensitive.
const PHRASE_TABLE: &[(&str, RuleKind)] = &[
    (
        r"\b(\d{1,3})\s*(?:%|percent\b)",
        RuleKind::Rewrite { replacement: "${1}pct" },
    ),
    (
        r"\b(?:can\s+)?create\s+challenges\b",
        RuleKind::Canonical { token: "create_challenges", weight: -3.1 },
    ),
    (
        r"\b(?:dominate|dominates|dominating)\s+discussions?\b",
        RuleKind::Canonical { token: "dominate_discussions", weight: -3.0 },
    ),
    (
        r"\brush\s+through\s+tasks?\b",
        RuleKind::Canonical { token: "rush_through_tasks", weight: -2.7 },
    ),
    (
        r"\bminor\s+misunderstandings?\b",
        RuleKind::Canonical { token: "minor_misunderstandings", weight: -1.8 },
    ),
    (
        r"\b(?:in)?consistenc(?:y|ies)\b",
        RuleKind::Canonical { token: "inconsistencies", weight: -2.4 },
    ),
    (
        r"\bstrong\s+opinions\b",
        RuleKind::Canonical { token: "strong_opinions", weight: -1.4 },
    ),
    (
        r"\btime\s+management\s+could\s+improve\b",
        RuleKind::Canonical { token: "time_mgmt_could_improve", weight: -2.6 },
    ),
    (
        r"\bdelays?\s+in\s+completing\b",
        RuleKind::Canonical { token: "delays_in_completing", weight: -2.8 },
    ),
    (
        r"\baffect(?:s|ed)?\s+overall\s+progress\b",
        RuleKind::Canonical { token: "affects_overall_progress", weight: -2.6 },
    ),
    (
        r"\bneeds?\s+improvement\b",
        RuleKind::Canonical { token: "needs_improvement", weight: -2.9 },
    ),
    (
        r"\broom\s+for\s+improvement\b",
        RuleKind::Canonical { token: "room_for_improvement", weight: -2.2 },
    ),
    (
        r"\bdid\s+most\s+of\s+the\s+work(?:\s+(?:for|within)\s+(?:the\s+)?(?:team|group))?\b",
        RuleKind::Canonical { token: "did_most_of_work", weight: 3.1 },
    ),
    (
        r"\bi\s+did\s+a\s+lot\s+(?:for|of)\s+(?:the\s+)?team\b",
        RuleKind::Canonical { token: "did_a_lot_for_team", weight: 2.8 },
    ),
    (
        r"\bgood\s+job\b",
        RuleKind::Canonical { token: "good_job", weight: 2.3 },
    ),
    (
        r"\bdid\s+not\s+do\s+much(?:\s+at\s+all)?\b",
        RuleKind::Canonical { token: "did_not_do_much", weight: -3.2 },
    ),
    (
        r"\bdid\s+not\s+contribut(?:e|ed)\s+at\s+all\b",
        RuleKind::Canonical { token: "did_not_contribute_at_all", weight: -3.6 },
    ),
    (
        r"\balways\s+unavailable\b",
        RuleKind::Canonical { token: "always_unavailable", weight: -3.0 },
    ),
    // Only matches text produced by the percent rewrite at the top.
    (
        r"\bdid\s+(?:only\s+|about\s+|around\s+|roughly\s+)?(\d{1,3})pct\s+of\s+the\s+(?:work|project|tasks?)\b",
        RuleKind::Percentage {
            prefix: "did_",
            suffix: "pct_of_work",
            weight_fn: work_share_weight,
        },
    ),
];

/// Weak-negative vocabulary common in peer feedback, plus words that mark a
/// teammate as critically absent.
const DOMAIN_WEIGHTS: &[(&str, f64)] = &[
    ("concern", -2.6),
    ("concerns", -2.6),
    ("issue", -2.6),
    ("issues", -2.6),
    ("problem", -2.9),
    ("problems", -2.9),
    ("challenge", -2.6),
    ("challenges", -2.6),
    ("difficult", -2.1),
    ("difficulty", -2.1),
    ("difficulties", -2.1),
    ("delay", -2.5),
    ("delayed", -2.5),
    ("late", -2.5),
    ("inconsistent", -2.6),
    ("inconsistency", -2.6),
    ("struggle", -2.7),
    ("struggles", -2.7),
    ("unreliable", -3.0),
    ("unresponsive", -3.0),
    ("absenteeism", -3.0),
    ("lack", -2.4),
    ("lacking", -2.4),
    ("insufficient", -2.6),
    ("inflexible", -2.8),
    ("dominating", -2.8),
    ("dominant", -2.6),
    ("needs", -1.2),
    ("improvement", -1.2),
    ("improve", -1.2),
    ("improving", -1.0),
    ("blocking", -2.9),
    ("obstructive", -3.2),
    ("conflict", -2.9),
    ("frustrating", -3.0),
    ("frustration", -3.0),
];

/// Explicit toxic vocabulary, matched on the original text.
const TOXIC_WORDS: &[&str] = &[
    "dumbass", "idiot", "stupid", "moron", "useless", "garbage", "trash", "loser", "worthless",
    "asshole", "bitch", "fuck", "shit", "hate", "toxic",
];

/// Concessive conjunctions that split a comment into front and tail.
const CONTRAST_WORDS: &[&str] = &["but", "however", "although", "though", "yet", "while", "despite"];

/// Tokens that make a negative front clause outweigh any tail.
const CRITICAL_NEGATIVE: &[&str] = &[
    "unresponsive",
    "absenteeism",
    "always_unavailable",
    "did_not_contribute_at_all",
];

/// Negative-topic words counted in a contrast tail. Negative canonical
/// tokens are added on top of these.
const TAIL_MARKERS: &[&str] = &[
    "challenge",
    "challenges",
    "problem",
    "problems",
    "concern",
    "concerns",
    "delay",
    "delays",
    "delayed",
    "inflexible",
    "issue",
    "issues",
    "struggle",
    "struggles",
];

/// Words that start a negation window.
pub const NEGATORS: &[&str] = &["not", "never", "no", "rarely", "hardly", "seldom", "scarcely", "barely"];

/// Words whose consecutive runs are capped.
pub const INTENSIFIERS: &[&str] = &["very", "extremely", "super", "really"];

/// Longest run of intensifiers kept.
pub const INTENSIFIER_CAP: usize = 2;

/// Word tokens tagged after each negator.
pub const NEGATION_WINDOW: usize = 3;

/// Everything the pipeline needs besides the oracle. Immutable.
#[derive(Debug)]
pub struct Heuristics {
    pub phrase_rules: Vec<PhraseRule>,
    pub toxic_pattern: Regex,
    pub contrast_pattern: Regex,
    pub critical_negative: HashSet<&'static str>,
    pub tail_markers: HashSet<String>,
    pub bands: ScoreBands,
    pub disparity_policy: DisparityPolicy,
}

impl Heuristics {
    /// Compile the rule table and vocabularies.
    pub fn new() -> Result<Self> {
        let phrase_rules = PHRASE_TABLE
            .iter()
            .map(|(pattern, kind)| PhraseRule::new(pattern, *kind))
            .collect::<Result<Vec<_>>>()?;

        let mut tail_markers: HashSet<String> =
            TAIL_MARKERS.iter().map(|w| w.to_string()).collect();
        for rule in &phrase_rules {
            if let RuleKind::Canonical { token, weight } = rule.kind {
                if weight < 0.0 {
                    tail_markers.insert(token.to_string());
                }
            }
        }

        Ok(Self {
            phrase_rules,
            toxic_pattern: word_alternation(TOXIC_WORDS).context("Invalid toxic vocabulary")?,
            contrast_pattern: word_alternation(CONTRAST_WORDS)
                .context("Invalid contrast vocabulary")?,
            critical_negative: CRITICAL_NEGATIVE.iter().copied().collect(),
            tail_markers,
            bands: ScoreBands::default(),
            disparity_policy: DisparityPolicy::Extended,
        })
    }

    /// Use a different disparity rule set.
    pub fn with_disparity_policy(mut self, policy: DisparityPolicy) -> Self {
        self.disparity_policy = policy;
        self
    }

    /// Fixed token weights the lexicon oracle is extended with at startup:
    /// the domain vocabulary, then every fixed-weight canonical token.
    pub fn lexicon_extensions(&self) -> Vec<(String, f64)> {
        let mut extensions: Vec<(String, f64)> = DOMAIN_WEIGHTS
            .iter()
            .map(|(word, weight)| (word.to_string(), *weight))
            .collect();
        for rule in &self.phrase_rules {
            if let RuleKind::Canonical { token, weight } = rule.kind {
                extensions.push((token.to_string(), weight));
            }
        }
        extensions
    }

    /// True when some rule in the table can emit `token`.
    pub fn declares_token(&self, token: &str) -> bool {
        self.phrase_rules.iter().any(|rule| rule.declares(token))
    }
}

/// `\b(w1|w2|...)\b`, case-insensitive.
fn word_alternation(words: &[&str]) -> Result<Regex> {
    Ok(Regex::new(&format!(r"(?i)\b(?:{})\b", words.join("|")))?)
}

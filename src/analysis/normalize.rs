// Text normalizer: intensifier capping, ordered phrase rewriting, and
// negation scope widening, in that order.
//
// Word and character counts are taken from the trimmed original text and
// never from anything this module produces.

use std::collections::BTreeSet;

use regex_lite::{Captures, NoExpand};

use super::rules::{Heuristics, RuleKind, INTENSIFIERS, INTENSIFIER_CAP, NEGATION_WINDOW, NEGATORS};
use crate::oracle::traits::TokenWeights;
use crate::oracle::NEGATION_MARKER;

/// Text ready for the oracle, plus what the rewriting found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedText {
    pub text: String,
    /// Canonical tokens declared by the phrase table and present after rewriting
    pub matched_tokens: BTreeSet<String>,
    /// True when at least one word was negation-marked
    pub negation_used: bool,
    /// Match-time weights for percentage tokens, scoped to this text
    pub overlay: TokenWeights,
}

/// Run every normalization step over already-trimmed text.
pub fn normalize(text: &str, heuristics: &Heuristics) -> NormalizedText {
    let capped = cap_intensifiers(text, INTENSIFIER_CAP);
    let (rewritten, matched_tokens, overlay) = rewrite_phrases(&capped, heuristics);
    let (text, negation_used) = widen_negation(&rewritten, NEGATION_WINDOW);
    NormalizedText {
        text,
        matched_tokens,
        negation_used,
        overlay,
    }
}

/// Count maximal runs of word characters (letters, digits, underscore).
pub fn word_count(text: &str) -> usize {
    let mut count = 0;
    let mut in_word = false;
    for c in text.chars() {
        let word_char = is_word_char(c);
        if word_char && !in_word {
            count += 1;
        }
        in_word = word_char;
    }
    count
}

/// Count characters (not bytes).
pub fn char_count(text: &str) -> usize {
    text.chars().count()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_intensifier(token: &str) -> bool {
    let bare = token.trim_matches(|c: char| !is_word_char(c));
    INTENSIFIERS.iter().any(|i| i.eq_ignore_ascii_case(bare))
}

/// Truncate each consecutive run of intensifier words to its first `cap`
/// occurrences. Tokens are whitespace-separated and re-joined with one space.
pub fn cap_intensifiers(text: &str, cap: usize) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut run = 0;
    for token in text.split_whitespace() {
        if is_intensifier(token) {
            run += 1;
            if run > cap {
                continue;
            }
        } else {
            run = 0;
        }
        kept.push(token);
    }
    kept.join(" ")
}

/// Apply the phrase table in order. Each rule sees the previous rule's output.
///
/// Returns the rewritten text, the canonical tokens still present at the end,
/// and the weights of any percentage tokens emitted.
pub fn rewrite_phrases(
    text: &str,
    heuristics: &Heuristics,
) -> (String, BTreeSet<String>, TokenWeights) {
    let mut current = text.to_string();
    let mut emitted: BTreeSet<String> = BTreeSet::new();
    let mut overlay = TokenWeights::new();

    for rule in &heuristics.phrase_rules {
        if !rule.pattern.is_match(&current) {
            continue;
        }
        current = match rule.kind {
            RuleKind::Rewrite { replacement } => rule
                .pattern
                .replace_all(&current, replacement)
                .into_owned(),
            RuleKind::Canonical { token, .. } => {
                emitted.insert(token.to_string());
                rule.pattern
                    .replace_all(&current, NoExpand(token))
                    .into_owned()
            }
            RuleKind::Percentage {
                prefix,
                suffix,
                weight_fn,
            } => rule
                .pattern
                .replace_all(&current, |caps: &Captures<'_>| {
                    let digits = caps.get(1).map(|m| m.as_str()).unwrap_or("0");
                    let pct = digits.parse::<f64>().unwrap_or(0.0);
                    let token = format!("{prefix}{digits}{suffix}");
                    overlay.insert(token.clone(), weight_fn(pct));
                    emitted.insert(token.clone());
                    token
                })
                .into_owned(),
        };
    }

    // A later rule may have consumed an earlier token; keep what survived.
    let present: BTreeSet<&str> = current
        .split(|c: char| !is_word_char(c))
        .filter(|w| !w.is_empty())
        .collect();
    let matched: BTreeSet<String> = emitted
        .into_iter()
        .filter(|t| present.contains(t.as_str()) && heuristics.declares_token(t))
        .collect();
    overlay.retain(|token, _| matched.contains(token));

    (current, matched, overlay)
}

/// Prefix up to `window` word tokens after each negator with NEGATION_MARKER.
///
/// Text is split into word and non-word runs. Non-word runs (spaces,
/// punctuation) neither consume nor reset the window. A negator restarts the
/// window and is not itself marked.
pub fn widen_negation(text: &str, window: usize) -> (String, bool) {
    let mut out = String::with_capacity(text.len() + 16);
    let mut remaining = 0usize;
    let mut used = false;

    for (is_word, run) in runs(text) {
        if !is_word {
            out.push_str(run);
            continue;
        }
        if NEGATORS.iter().any(|n| n.eq_ignore_ascii_case(run)) {
            remaining = window;
            out.push_str(run);
        } else if remaining > 0 {
            out.push_str(NEGATION_MARKER);
            out.push_str(run);
            remaining -= 1;
            used = true;
        } else {
            out.push_str(run);
        }
    }

    (out, used)
}

/// Split text into maximal word / non-word runs, tagged with `is_word`.
pub(crate) fn runs(text: &str) -> Vec<(bool, &str)> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut current: Option<bool> = None;
    for (i, c) in text.char_indices() {
        let word = is_word_char(c);
        match current {
            Some(kind) if kind == word => {}
            Some(kind) => {
                out.push((kind, &text[start..i]));
                start = i;
                current = Some(word);
            }
            None => current = Some(word),
        }
    }
    if let Some(kind) = current {
        out.push((kind, &text[start..]));
    }
    out
}

// Composition tests: the full scoring pipeline and batch runner over the
// in-process lexicon oracle.
//
// These exercise the data flow between stages:
//   Normalizer -> Sentences -> Oracle -> Contrast -> Rescue -> Toxicity
//   -> Bias -> Label -> Disparity
// without any network calls or model files.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use peertone::analysis::batch::{run_batch, BatchOptions};
use peertone::analysis::label::{score_from_compound, LabelPolicy};
use peertone::analysis::models::{CommentInput, Label, Target};
use peertone::analysis::pipeline::Engine;
use peertone::analysis::rules::Heuristics;
use peertone::oracle::lexicon::LexiconOracle;
use peertone::oracle::traits::{Polarity, PolarityOracle, TokenWeights};

fn lexicon_engine(policy: LabelPolicy) -> Engine {
    let heuristics = Arc::new(Heuristics::new().expect("heuristics compile"));
    let oracle = LexiconOracle::with_extensions(heuristics.lexicon_extensions());
    Engine::new(Arc::new(oracle), heuristics, policy)
}

fn engine() -> Engine {
    lexicon_engine(LabelPolicy::default_score_band())
}

// ============================================================
// Concrete scenarios
// ============================================================

#[tokio::test]
async fn empty_text_is_neutral() {
    let r = engine().analyze(&CommentInput::new("")).await.unwrap();
    assert_eq!(r.label, Label::Neutral);
    assert_eq!(r.score, 0.5);
    assert_eq!(r.compound, 0.0);
    assert_eq!(r.word_count, 0);
    assert_eq!(r.sentence_stats.count, 0);
    assert!(!r.disparity);
}

#[tokio::test]
async fn whitespace_only_text_is_empty() {
    let input = CommentInput::new("   \n\t ").with_score_total(22);
    let r = engine().analyze(&input).await.unwrap();
    assert_eq!(r.label, Label::Neutral);
    assert_eq!(r.char_count, 0);
    assert!(!r.disparity, "neutral never contradicts a score");
}

#[tokio::test]
async fn toxic_comment_with_high_score_is_flagged() {
    let input = CommentInput::new("You are useless and did not contribute at all.")
        .with_score_total(22);
    let r = engine().analyze(&input).await.unwrap();
    assert_eq!(r.label, Label::Toxic);
    assert!(r.toxic);
    assert!(r.compound <= -0.6);
    assert!(r.matched_tokens.contains("did_not_contribute_at_all"));
    assert!(r.disparity);
    assert!(r.suggest_confirm);
    let reason = r.disparity_reason.unwrap();
    assert!(reason.starts_with("Total score 22 is high and the comment reads toxic."));
}

#[tokio::test]
async fn strong_praise_with_low_score_is_flagged() {
    let input = CommentInput::new("She did most of the work for the team.").with_score_total(8);
    let r = engine().analyze(&input).await.unwrap();
    assert_eq!(r.label, Label::Positive);
    assert!(r.matched_tokens.contains("did_most_of_work"));
    assert!(r.disparity);
    assert!(r.suggest_confirm);
    assert!(r
        .disparity_reason
        .unwrap()
        .starts_with("Total score 8 is low and the comment reads positive."));
}

#[tokio::test]
async fn contrast_tail_pulls_compound_negative() {
    let input = CommentInput::new("Good job overall, but there were delays in completing tasks.")
        .with_score_total(15);
    let r = engine().analyze(&input).await.unwrap();

    let whole_only = engine()
        .analyze(&CommentInput::new(
            "Good job overall, there were delays in completing tasks.",
        ))
        .await
        .unwrap();

    assert!(r.matched_tokens.contains("good_job"));
    assert!(r.matched_tokens.contains("delays_in_completing"));
    assert!(
        r.compound < whole_only.compound,
        "contrast should lean on the tail: {} vs {}",
        r.compound,
        whole_only.compound
    );
    assert_eq!(r.label, Label::Negative);
    assert!(!r.disparity, "15 is outside both bands");
    assert!(r.disparity_reason.is_none());
}

#[tokio::test]
async fn batch_skips_disparity_for_non_numeric_score() {
    let items = vec![
        json!({"id": 1, "text": "fine", "score_total": "abc"}),
        json!({"id": 2, "text": "great job", "score_total": 7}),
    ];
    let results = run_batch(Arc::new(engine()), items, &BatchOptions::default()).await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, Some(json!(1)));
    assert_eq!(results[1].id, Some(json!(2)));

    assert!(!results[0].disparity);
    assert!(results[0].error.is_none(), "bad score is not an item error");

    assert_eq!(results[1].label, Label::Positive);
    assert!(results[1].disparity);
}

// ============================================================
// Properties
// ============================================================

const SAMPLES: &[&str] = &[
    "",
    "fine",
    "Great teammate!!!!!!",
    "very very very very very",
    "not not not not good",
    "He did 100% of the work. I did nothing.",
    "She was always unavailable but the slides were nice.",
    "Unresponsive for weeks, but friendly when present.",
    "Concerns, issues, problems, delays: however the demo was amazing.",
    "I hate this idiot",
    "Thanks!",
    "ok.",
];

#[tokio::test]
async fn score_is_always_derived_from_compound() {
    for policy in [LabelPolicy::default_score_band(), LabelPolicy::default_compound()] {
        let engine = lexicon_engine(policy);
        for text in SAMPLES {
            let r = engine.analyze(&CommentInput::new(*text)).await.unwrap();
            assert!((0.0..=1.0).contains(&r.score), "{text}: score {}", r.score);
            assert!((-1.0..=1.0).contains(&r.compound), "{text}: compound {}", r.compound);
            assert_eq!(r.score, score_from_compound(r.compound), "{text}");
            assert_eq!(r.confidence, r.score);
        }
    }
}

#[tokio::test]
async fn scoring_is_reproducible() {
    let engine = engine();
    for text in SAMPLES {
        let input = CommentInput::new(*text).with_score_total(9).with_id("x");
        let a = engine.analyze(&input).await.unwrap();
        let b = engine.analyze(&input).await.unwrap();
        assert_eq!(a, b, "{text}");
        assert_eq!(a.compound.to_bits(), b.compound.to_bits());
    }
}

#[tokio::test]
async fn negated_praise_scores_lower() {
    let engine = engine();
    let plain = engine
        .analyze(&CommentInput::new("The report was good."))
        .await
        .unwrap();
    let negated = engine
        .analyze(&CommentInput::new("The report was not good."))
        .await
        .unwrap();
    assert!(negated.negation_used);
    assert!(!plain.negation_used);
    assert!(negated.compound < plain.compound);
    assert!(negated.compound < 0.0);
}

#[tokio::test]
async fn toxic_vocabulary_always_labels_toxic() {
    let engine = engine();
    for text in ["What an idiot", "Great work, stupid though", "garbage garbage garbage"] {
        let r = engine.analyze(&CommentInput::new(text)).await.unwrap();
        assert_eq!(r.label, Label::Toxic, "{text}");
        assert!(r.compound <= -0.6, "{text}");
    }
}

#[tokio::test]
async fn counts_come_from_original_text() {
    let text = "  He did 10% of the work, not much else.  ";
    let r = engine().analyze(&CommentInput::new(text)).await.unwrap();
    assert_eq!(r.word_count, 9);
    assert_eq!(r.char_count, text.trim().chars().count());
}

#[tokio::test]
async fn work_share_percentage_drives_polarity() {
    let engine = engine();
    let low = engine
        .analyze(&CommentInput::new("He did 5% of the work."))
        .await
        .unwrap();
    let high = engine
        .analyze(&CommentInput::new("He did 80% of the work."))
        .await
        .unwrap();
    assert!(low.compound < 0.0);
    assert!(high.compound > 0.0);
    assert!(low.matched_tokens.contains("did_5pct_of_work"));
    assert!(high.matched_tokens.contains("did_80pct_of_work"));
}

#[tokio::test]
async fn peer_target_nudges_praise_down() {
    let engine = engine();
    let text = "Helpful and reliable teammate";
    let own = engine
        .analyze(&CommentInput::new(text).with_target(Target::SelfReport))
        .await
        .unwrap();
    let peer = engine
        .analyze(&CommentInput::new(text).with_target(Target::Peer))
        .await
        .unwrap();
    assert_eq!(own.label, Label::Positive);
    assert!(peer.compound < own.compound);
    assert!((own.compound - peer.compound - 0.05).abs() < 1e-9);
}

#[tokio::test]
async fn severe_front_clause_keeps_control() {
    let r = engine()
        .analyze(&CommentInput::new(
            "He was unresponsive all term but the final slides were great",
        ))
        .await
        .unwrap();
    assert!(r.compound < 0.0, "compound {}", r.compound);
}

// ============================================================
// Batch runner
// ============================================================

/// Oracle that fails, stalls, or panics depending on a marker word, and
/// otherwise defers to the lexicon.
struct FlakyOracle {
    inner: LexiconOracle,
}

#[async_trait]
impl PolarityOracle for FlakyOracle {
    async fn score(&self, text: &str, overlay: &TokenWeights) -> Result<Polarity> {
        if text.contains("explode") {
            anyhow::bail!("oracle unavailable");
        }
        if text.contains("stall") {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        if text.contains("crash") {
            panic!("oracle crashed");
        }
        self.inner.score(text, overlay).await
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}

fn flaky_engine() -> Arc<Engine> {
    let heuristics = Arc::new(Heuristics::new().expect("heuristics compile"));
    let inner = LexiconOracle::with_extensions(heuristics.lexicon_extensions());
    Arc::new(Engine::new(
        Arc::new(FlakyOracle { inner }),
        heuristics,
        LabelPolicy::default_score_band(),
    ))
}

#[tokio::test]
async fn batch_preserves_order_and_ids() {
    let items: Vec<_> = (0..50)
        .map(|i| {
            let text = if i % 2 == 0 { "great work" } else { "poor effort" };
            json!({"id": format!("c{i}"), "text": text})
        })
        .collect();
    let options = BatchOptions {
        concurrency: 8,
        ..BatchOptions::default()
    };
    let results = run_batch(Arc::new(engine()), items, &options).await;

    assert_eq!(results.len(), 50);
    for (i, r) in results.iter().enumerate() {
        assert_eq!(r.id, Some(json!(format!("c{i}"))));
        let expected = if i % 2 == 0 {
            Label::Positive
        } else {
            Label::Negative
        };
        assert_eq!(r.label, expected, "item {i}");
    }
}

#[tokio::test]
async fn batch_isolates_failing_items() {
    let items = vec![
        json!({"id": "a", "text": "great work"}),
        json!({"id": "b", "text": "this will explode"}),
        json!({"id": "c", "text": "this will stall"}),
        json!({"id": "d", "text": "this will crash"}),
        json!({"id": "e", "text": 42}),
        json!("not an object"),
        json!({"id": "g", "text": "poor effort"}),
    ];
    let options = BatchOptions {
        item_timeout: Duration::from_millis(200),
        ..BatchOptions::default()
    };
    let results = run_batch(flaky_engine(), items, &options).await;

    assert_eq!(results.len(), 7);

    assert_eq!(results[0].label, Label::Positive);
    assert!(results[0].error.is_none());

    for i in 1..6 {
        let r = &results[i];
        assert!(r.is_error(), "item {i} should carry an error");
        assert_eq!(r.label, Label::Neutral);
        assert_eq!(r.score, 0.5);
        assert!(!r.disparity);
    }
    assert!(results[1].error.as_deref().unwrap().contains("oracle unavailable"));
    assert!(results[2].error.as_deref().unwrap().contains("timed out"));
    assert_eq!(results[4].id, Some(json!("e")));
    assert!(results[5].id.is_none());

    assert_eq!(results[6].label, Label::Negative);
    assert_eq!(results[6].id, Some(json!("g")));
}

#[tokio::test]
async fn batch_truncates_to_item_limit() {
    let items: Vec<_> = (0..12).map(|i| json!({"id": i, "text": "fine"})).collect();
    let options = BatchOptions {
        max_items: 10,
        ..BatchOptions::default()
    };
    let results = run_batch(Arc::new(engine()), items, &options).await;
    assert_eq!(results.len(), 10);
    assert_eq!(results[9].id, Some(json!(9)));
}

#[tokio::test]
async fn empty_batch_returns_no_results() {
    let results = run_batch(Arc::new(engine()), Vec::new(), &BatchOptions::default()).await;
    assert!(results.is_empty());
}

// ============================================================
// Transformer path: fixed probability triples, compound cutoffs
// ============================================================

/// Answers every span with the same class probabilities, like a 3-class
/// sentiment model that always sees the same thing.
struct FixedOracle {
    neg: f64,
    neu: f64,
    pos: f64,
}

#[async_trait]
impl PolarityOracle for FixedOracle {
    async fn score(&self, _text: &str, _overlay: &TokenWeights) -> Result<Polarity> {
        Ok(Polarity::from_probabilities(self.neg, self.neu, self.pos))
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

fn transformer_engine(neg: f64, neu: f64, pos: f64) -> Engine {
    let heuristics = Arc::new(Heuristics::new().expect("heuristics compile"));
    Engine::new(
        Arc::new(FixedOracle { neg, neu, pos }),
        heuristics,
        LabelPolicy::default_compound(),
    )
}

const PLAIN: &str = "Submitted the report on time.";

#[tokio::test]
async fn transformer_triple_flows_into_result() {
    let r = transformer_engine(0.1, 0.3, 0.6)
        .analyze(&CommentInput::new(PLAIN))
        .await
        .unwrap();

    assert_eq!(r.label, Label::Positive);
    assert!((r.compound - 0.5).abs() < 1e-9);
    assert!((r.score - 0.75).abs() < 1e-9);
    assert_eq!(r.score, score_from_compound(r.compound));
    assert_eq!(r.confidence, r.score);
    assert_eq!((r.neg, r.neu, r.pos), (0.1, 0.3, 0.6));
    assert_eq!(r.sentence_stats.count, 1);
    assert!((r.sentence_stats.min_compound - 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn transformer_compound_cutoffs_are_inclusive() {
    let cases = [
        ((0.0, 0.95, 0.05), Label::Positive),
        ((0.2, 0.6, 0.2), Label::Neutral),
        ((0.05, 0.95, 0.0), Label::Negative),
        ((0.52, 0.45, 0.03), Label::Negative),
    ];
    for ((neg, neu, pos), expected) in cases {
        let r = transformer_engine(neg, neu, pos)
            .analyze(&CommentInput::new(PLAIN))
            .await
            .unwrap();
        assert_eq!(r.label, expected, "triple ({neg}, {neu}, {pos})");
        assert_eq!(r.score, score_from_compound(r.compound));
    }
}

#[tokio::test]
async fn compound_policy_labels_what_score_band_calls_neutral() {
    // compound 0.1: score 0.55 sits below the band's positive threshold
    let oracle = || FixedOracle {
        neg: 0.0,
        neu: 0.9,
        pos: 0.1,
    };
    let heuristics = Arc::new(Heuristics::new().unwrap());
    let band = Engine::new(
        Arc::new(oracle()),
        heuristics.clone(),
        LabelPolicy::default_score_band(),
    );
    let compound = Engine::new(Arc::new(oracle()), heuristics, LabelPolicy::default_compound());

    let input = CommentInput::new(PLAIN);
    assert_eq!(band.analyze(&input).await.unwrap().label, Label::Neutral);
    assert_eq!(compound.analyze(&input).await.unwrap().label, Label::Positive);
}

#[tokio::test]
async fn transformer_peer_nudge_can_drop_below_cutoff() {
    // 0.06 is positive; the peer nudge brings it to 0.03, under pos_c
    let r = transformer_engine(0.0, 0.94, 0.06)
        .analyze(&CommentInput::new(PLAIN).with_target(Target::Peer))
        .await
        .unwrap();
    assert_eq!(r.label, Label::Neutral);
    assert!((r.compound - 0.03).abs() < 1e-9);
}

#[tokio::test]
async fn transformer_positive_low_score_is_flagged() {
    let r = transformer_engine(0.1, 0.3, 0.6)
        .analyze(&CommentInput::new(PLAIN).with_score_total(7.0))
        .await
        .unwrap();
    assert_eq!(r.label, Label::Positive);
    assert!(r.disparity);
    assert!(r.suggest_confirm);
}

// Request and result records for the scoring pipeline.
//
// CommentInput is built per batch item from raw JSON so that a malformed
// item fails alone. AnalysisResult serializes in a fixed field order; the
// web layer signs those exact bytes.

use std::collections::BTreeSet;
use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Final tone label for a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Positive,
    Neutral,
    Negative,
    Toxic,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Positive => "positive",
            Label::Neutral => "neutral",
            Label::Negative => "negative",
            Label::Toxic => "toxic",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who the comment is about, as declared by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The author evaluating their own contribution
    SelfReport,
    /// The author evaluating a teammate
    Peer,
}

impl Target {
    /// Parse the wire value ("self" or "peer", case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "self" => Some(Target::SelfReport),
            "peer" => Some(Target::Peer),
            _ => None,
        }
    }
}

/// One comment to score.
///
/// The score fields are kept as raw JSON: parsing them is part of disparity
/// detection, and an unparsable value only disables that stage.
#[derive(Debug, Clone, Default)]
pub struct CommentInput {
    /// Opaque client identifier, echoed back unchanged when present
    pub id: Option<Value>,
    pub text: String,
    pub score_total: Option<Value>,
    pub score_min: Option<Value>,
    pub score_max: Option<Value>,
    pub target: Option<Target>,
}

impl CommentInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_score_total(mut self, score_total: impl Into<Value>) -> Self {
        self.score_total = Some(score_total.into());
        self
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    /// Build an input from one element of the request's `items` array.
    ///
    /// A missing or null `text` is treated as empty text. A non-object item
    /// or a non-string `text` is an error for this item only.
    pub fn from_value(raw: &Value) -> Result<Self> {
        let Some(obj) = raw.as_object() else {
            anyhow::bail!("item must be a JSON object");
        };

        let text = match obj.get("text") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => anyhow::bail!("text must be a string, got {}", json_type(other)),
        };

        let target = obj
            .get("target")
            .and_then(Value::as_str)
            .and_then(Target::parse);

        Ok(Self {
            id: obj.get("id").cloned(),
            text,
            score_total: non_null(obj.get("score_total")),
            score_min: non_null(obj.get("score_min")),
            score_max: non_null(obj.get("score_max")),
            target,
        })
    }
}

fn non_null(value: Option<&Value>) -> Option<Value> {
    value.filter(|v| !v.is_null()).cloned()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Per-sentence polarity summary.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SentenceStats {
    pub count: usize,
    pub avg_compound: f64,
    pub min_compound: f64,
}

/// Scored comment. Field order is the wire order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub label: Label,
    /// (compound + 1) / 2, clamped to [0, 1]
    pub score: f64,
    /// Same value as `score`; the plugin reads this field
    pub confidence: f64,
    pub compound: f64,
    pub pos: f64,
    pub neu: f64,
    pub neg: f64,
    pub toxic: bool,
    pub word_count: usize,
    pub char_count: usize,
    pub sentence_stats: SentenceStats,
    pub matched_tokens: BTreeSet<String>,
    pub negation_used: bool,
    pub disparity: bool,
    pub disparity_reason: Option<String>,
    pub suggest_confirm: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Present only when this item could not be scored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisResult {
    /// The fixed result for a comment with no text.
    pub fn neutral() -> Self {
        Self {
            label: Label::Neutral,
            score: 0.5,
            confidence: 0.5,
            compound: 0.0,
            pos: 0.0,
            neu: 1.0,
            neg: 0.0,
            toxic: false,
            word_count: 0,
            char_count: 0,
            sentence_stats: SentenceStats::default(),
            matched_tokens: BTreeSet::new(),
            negation_used: false,
            disparity: false,
            disparity_reason: None,
            suggest_confirm: false,
            id: None,
            error: None,
        }
    }

    /// Conservative neutral entry for an item that failed to score.
    /// Counts are still taken from the text when it is available.
    pub fn failed(id: Option<Value>, text: Option<&str>, error: impl Into<String>) -> Self {
        let trimmed = text.unwrap_or("").trim();
        Self {
            word_count: super::normalize::word_count(trimmed),
            char_count: super::normalize::char_count(trimmed),
            id,
            error: Some(error.into()),
            ..Self::neutral()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Body of every /analyze response, including token-gate rejections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub ok: bool,
    pub results: Vec<AnalysisResult>,
}

impl AnalyzeResponse {
    pub fn rejected() -> Self {
        Self {
            ok: false,
            results: Vec::new(),
        }
    }
}

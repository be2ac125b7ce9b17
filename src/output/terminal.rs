// Colored terminal output for scored comments.
//
// The `score` and `batch` commands delegate here; JSON output bypasses this
// module entirely.

use colored::Colorize;

use crate::analysis::models::{AnalysisResult, Label};

/// Display one scored comment with its breakdown.
pub fn display_result(text: &str, result: &AnalysisResult) {
    println!("\n{}", "=== Comment Tone ===".bold());
    println!("  \"{}\"", super::truncate_chars(text.trim(), 140).dimmed());
    println!();

    println!(
        "  Label: {}   Score: {:.3}   Compound: {:+.3}",
        colorize_label(result.label),
        result.score,
        result.compound
    );
    println!(
        "  pos {:.2}  neu {:.2}  neg {:.2}",
        result.pos, result.neu, result.neg
    );
    println!(
        "  Sentences: {}  (avg {:+.3}, min {:+.3})  Words: {}  Chars: {}",
        result.sentence_stats.count,
        result.sentence_stats.avg_compound,
        result.sentence_stats.min_compound,
        result.word_count,
        result.char_count
    );

    if !result.matched_tokens.is_empty() {
        let tokens: Vec<&str> = result.matched_tokens.iter().map(String::as_str).collect();
        println!("  Matched phrases: {}", tokens.join(", ").cyan());
    }
    if result.negation_used {
        println!("  Negation: {}", "widened".yellow());
    }
    if result.toxic {
        println!("  {} abusive language detected", "!!".red().bold());
    }

    if result.disparity {
        let reason = result.disparity_reason.as_deref().unwrap_or("");
        println!("\n  {} {}", "Disparity:".bright_red().bold(), reason);
        if result.suggest_confirm {
            println!("  {}", "Ask the evaluator to confirm this score.".dimmed());
        }
    }

    if let Some(err) = &result.error {
        println!("\n  {} {}", "Error:".red().bold(), err);
    }
}

/// Display a batch as a compact table followed by a label summary.
pub fn display_batch(results: &[AnalysisResult]) {
    if results.is_empty() {
        println!("No items to score.");
        return;
    }

    println!(
        "\n{}",
        format!("=== Batch Results ({} items) ===", results.len()).bold()
    );
    println!();

    println!(
        "  {:>4}  {:<16} {:<9} {:>6}  {:>8}  {:<9}",
        "#".dimmed(),
        "Id".dimmed(),
        "Label".dimmed(),
        "Score".dimmed(),
        "Compound".dimmed(),
        "Disparity".dimmed(),
    );
    println!("  {}", "-".repeat(62).dimmed());

    for (i, result) in results.iter().enumerate() {
        let id = result
            .id
            .as_ref()
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| "-".to_string());
        let flag = if result.is_error() {
            "error".red().to_string()
        } else if result.disparity {
            "yes".bright_red().to_string()
        } else {
            "".to_string()
        };

        println!(
            "  {:>4}. {:<16} {:<9} {:>6.3}  {:>+8.3}  {}",
            i + 1,
            super::truncate_chars(&id, 13),
            colorize_label(result.label),
            result.score,
            result.compound,
            flag,
        );
    }

    println!();

    let count = |label: Label| results.iter().filter(|r| r.label == label).count();
    let flagged = results.iter().filter(|r| r.disparity).count();
    let errors = results.iter().filter(|r| r.is_error()).count();

    println!(
        "  {} positive  {} neutral  {} negative  {} toxic",
        count(Label::Positive).to_string().green(),
        count(Label::Neutral),
        count(Label::Negative).to_string().bright_red(),
        count(Label::Toxic).to_string().red().bold(),
    );
    if flagged > 0 {
        println!("  {} {} score/comment disparities", "!".bright_red(), flagged);
    }
    if errors > 0 {
        println!("  {} {} items could not be scored", "~".yellow(), errors);
    }
}

/// Colorize a tone label.
fn colorize_label(label: Label) -> colored::ColoredString {
    let s = label.as_str();
    match label {
        Label::Positive => s.green(),
        Label::Neutral => s.normal(),
        Label::Negative => s.bright_red(),
        Label::Toxic => s.red().bold(),
    }
}

// Batch runner: scores items concurrently on a bounded pool and returns
// results in input order.
//
// Each item runs in its own tokio task behind a timeout, so a malformed item,
// a failed oracle call, a timeout, or even a panic yields an error-tagged
// neutral entry for that item and nothing else.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{info, warn};

use super::models::{AnalysisResult, CommentInput};
use super::pipeline::Engine;

/// Items processed per request unless configured otherwise.
pub const DEFAULT_MAX_BATCH: usize = 2000;

/// Limits applied to one batch.
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    pub max_items: usize,
    pub concurrency: usize,
    pub item_timeout: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_items: DEFAULT_MAX_BATCH,
            concurrency: 4,
            item_timeout: Duration::from_secs(30),
        }
    }
}

/// Score raw request items. Output length equals the number of items kept
/// (at most `max_items`) and position `i` always belongs to input `i`.
pub async fn run_batch(
    engine: Arc<Engine>,
    mut items: Vec<Value>,
    options: &BatchOptions,
) -> Vec<AnalysisResult> {
    if items.len() > options.max_items {
        warn!(
            received = items.len(),
            kept = options.max_items,
            "Batch exceeds item limit, extra items dropped"
        );
        items.truncate(options.max_items);
    }

    let item_timeout = options.item_timeout;

    // `buffered` (not `buffer_unordered`) yields in submission order.
    let results: Vec<AnalysisResult> = stream::iter(items)
        .map(|raw| {
            let engine = Arc::clone(&engine);
            let id = raw.get("id").cloned();
            let text = raw.get("text").and_then(Value::as_str).map(str::to_string);
            async move {
                let handle = tokio::spawn(async move { score_item(&engine, raw, item_timeout).await });
                match handle.await {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(error = %e, "Item task failed");
                        AnalysisResult::failed(id, text.as_deref(), "internal error while scoring item")
                    }
                }
            }
        })
        .buffered(options.concurrency.max(1))
        .collect()
        .await;

    let failed = results.iter().filter(|r| r.is_error()).count();
    let flagged = results.iter().filter(|r| r.disparity).count();
    info!(
        items = results.len(),
        failed,
        disparities = flagged,
        "Batch scored"
    );

    results
}

/// Score one raw item, converting every failure into an error-tagged entry.
async fn score_item(engine: &Engine, raw: Value, timeout: Duration) -> AnalysisResult {
    let input = match CommentInput::from_value(&raw) {
        Ok(input) => input,
        Err(e) => {
            warn!(error = %e, "Rejected batch item");
            let text = raw.get("text").and_then(Value::as_str);
            return AnalysisResult::failed(raw.get("id").cloned(), text, format!("{e:#}"));
        }
    };

    match tokio::time::timeout(timeout, engine.analyze(&input)).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            warn!(error = %e, "Failed to score item");
            AnalysisResult::failed(input.id.clone(), Some(&input.text), format!("{e:#}"))
        }
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs_f64(), "Item scoring timed out");
            AnalysisResult::failed(
                input.id.clone(),
                Some(&input.text),
                format!("scoring timed out after {:.1}s", timeout.as_secs_f64()),
            )
        }
    }
}

// Polarity oracles: trait-based abstraction for swappable sentiment sources.
//
// The PolarityOracle trait defines the interface. LexiconOracle is the
// in-process default; OnnxSentimentOracle and RemoteOracle back the
// transformer engine strategy. The scoring pipeline never knows which one
// it is talking to.

pub mod download;
pub mod lexicon;
pub mod onnx;
pub mod remote;
pub mod traits;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::analysis::rules::Heuristics;
use crate::config::{Config, EngineStrategy};

/// Prefix the normalizer puts on words inside a negation window.
pub const NEGATION_MARKER: &str = "neg_";

/// Build the oracle selected by the configured engine strategy.
///
/// The lexicon oracle is extended with the heuristics' phrase-token and
/// weak-negative weights here, once, and is never mutated afterwards.
pub fn create_oracle(
    config: &Config,
    heuristics: &Heuristics,
) -> Result<Arc<dyn traits::PolarityOracle>> {
    match config.engine {
        EngineStrategy::LexiconHeuristic => {
            let oracle = lexicon::LexiconOracle::with_extensions(heuristics.lexicon_extensions());
            info!(entries = oracle.len(), "Using in-process lexicon oracle");
            Ok(Arc::new(oracle))
        }
        EngineStrategy::TransformerHeuristic => match &config.oracle_url {
            Some(url) => {
                info!(url = %url, "Using remote transformer oracle");
                Ok(Arc::new(remote::RemoteOracle::new(url, config.oracle_timeout)?))
            }
            None => {
                info!("Using local ONNX sentiment oracle");
                Ok(Arc::new(onnx::OnnxSentimentOracle::load(&config.model_dir)?))
            }
        },
    }
}

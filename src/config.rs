use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::analysis::label::LabelPolicy;

/// Which pipeline flavour to run. Both share every post-processing stage;
/// they differ only in the polarity oracle behind them and the default
/// label policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStrategy {
    /// In-process lexicon oracle (default): deterministic, no model files
    LexiconHeuristic,
    /// 3-class sentiment transformer, local ONNX or a remote endpoint
    TransformerHeuristic,
}

impl EngineStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineStrategy::LexiconHeuristic => "lexicon",
            EngineStrategy::TransformerHeuristic => "transformer",
        }
    }

    /// The label policy used when PEERTONE_LABEL_POLICY is unset.
    pub fn default_label_policy(&self) -> LabelPolicy {
        match self {
            EngineStrategy::LexiconHeuristic => LabelPolicy::default_score_band(),
            EngineStrategy::TransformerHeuristic => LabelPolicy::default_compound(),
        }
    }
}

/// Central configuration loaded from environment variables.
///
/// Secrets come from env vars only. The .env file is loaded automatically
/// at startup via dotenvy.
pub struct Config {
    pub engine: EngineStrategy,
    pub label_policy: LabelPolicy,
    /// Directory containing the ONNX model files
    pub model_dir: PathBuf,
    /// Remote transformer endpoint; when set it replaces the local ONNX model
    pub oracle_url: Option<String>,
    pub oracle_timeout: Duration,
    /// Upper bound on the time spent scoring one batch item
    pub item_timeout: Duration,
    /// Items beyond this count are dropped from a request
    pub max_batch: usize,
    /// Items scored concurrently within one batch
    pub concurrency: usize,
    pub bind: String,
    pub port: u16,
    /// Shared token checked against X-API-Token (gate disabled when empty)
    pub api_token: String,
    /// CA public key (base64url) that client certificates must chain to;
    /// request verification is disabled when empty
    pub ca_public_key: String,
    /// Server Ed25519 seed (base64url) for response signatures
    pub server_private_key: String,
    /// CA-issued server certificate JSON, sent verbatim in X-SPE-Server-Cert
    pub server_cert: String,
    /// CA signature over `server_cert`
    pub server_cert_sig: String,
}

impl Default for Config {
    /// Lexicon engine, no secrets, local bind. Used by tests and as the
    /// baseline `load()` overrides.
    fn default() -> Self {
        Self {
            engine: EngineStrategy::LexiconHeuristic,
            label_policy: LabelPolicy::default_score_band(),
            model_dir: crate::oracle::download::default_model_dir(),
            oracle_url: None,
            oracle_timeout: Duration::from_secs(10),
            item_timeout: Duration::from_secs(30),
            max_batch: crate::analysis::batch::DEFAULT_MAX_BATCH,
            concurrency: 4,
            bind: "127.0.0.1".to_string(),
            port: 8000,
            api_token: String::new(),
            ca_public_key: String::new(),
            server_private_key: String::new(),
            server_cert: String::new(),
            server_cert_sig: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables. Everything has a default.
    pub fn load() -> Result<Self> {
        let engine = match env::var("PEERTONE_ENGINE").as_deref() {
            Ok("transformer") => EngineStrategy::TransformerHeuristic,
            // "lexicon" or unset both default to the lexicon engine
            _ => EngineStrategy::LexiconHeuristic,
        };

        let label_policy = match env::var("PEERTONE_LABEL_POLICY").as_deref() {
            Ok("band") => LabelPolicy::default_score_band(),
            Ok("compound") => LabelPolicy::default_compound(),
            _ => engine.default_label_policy(),
        };

        let model_dir = env::var("PEERTONE_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| crate::oracle::download::default_model_dir());

        let concurrency = match env::var("PEERTONE_CONCURRENCY") {
            Ok(v) => v
                .parse::<usize>()
                .context("PEERTONE_CONCURRENCY must be a positive integer")?
                .max(1),
            Err(_) => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        };

        Ok(Self {
            engine,
            label_policy,
            model_dir,
            oracle_url: env::var("PEERTONE_ORACLE_URL")
                .ok()
                .filter(|u| !u.trim().is_empty()),
            oracle_timeout: Duration::from_secs(parse_env("PEERTONE_ORACLE_TIMEOUT_SECS", 10)?),
            item_timeout: Duration::from_secs(parse_env("PEERTONE_ITEM_TIMEOUT_SECS", 30)?),
            max_batch: parse_env("PEERTONE_MAX_BATCH", crate::analysis::batch::DEFAULT_MAX_BATCH)?,
            concurrency,
            bind: env::var("PEERTONE_BIND").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_env("PORT", 8000)?,
            api_token: env::var("PEERTONE_API_TOKEN")
                .unwrap_or_default()
                .trim()
                .to_string(),
            ca_public_key: env_trimmed("PEERTONE_CA_PUB_B64"),
            server_private_key: env_trimmed("PEERTONE_SERVER_PRIV_B64"),
            server_cert: env_trimmed("PEERTONE_SERVER_CERT_JSON"),
            server_cert_sig: env_trimmed("PEERTONE_SERVER_CERT_SIG"),
        })
    }

    /// Validate that the chosen engine has what it needs.
    /// Transformer without a remote URL needs the ONNX model files on disk.
    pub fn require_oracle(&self) -> Result<()> {
        match self.engine {
            EngineStrategy::LexiconHeuristic => Ok(()),
            EngineStrategy::TransformerHeuristic => {
                if self.oracle_url.is_none()
                    && !crate::oracle::download::model_files_present(&self.model_dir)
                {
                    anyhow::bail!(
                        "ONNX model files not found in {}\n\
                         Run `peertone download-model` to download them.\n\
                         Or set PEERTONE_ORACLE_URL to use a remote oracle instead.",
                        self.model_dir.display()
                    );
                }
                Ok(())
            }
        }
    }
}

fn env_trimmed(name: &str) -> String {
    env::var(name).unwrap_or_default().trim().to_string()
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("{name} has an invalid value: {v:?}")),
        Err(_) => Ok(default),
    }
}

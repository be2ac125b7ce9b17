use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use tracing::{error, info};

use peertone::analysis::batch::{run_batch, BatchOptions};
use peertone::analysis::models::{AnalyzeResponse, CommentInput, Target};
use peertone::analysis::pipeline::Engine;
use peertone::analysis::rules::Heuristics;
use peertone::config::{Config, EngineStrategy};

/// Peertone: tone scoring for peer-evaluation comments.
///
/// Labels each comment positive, neutral, negative, or toxic and flags
/// comments whose tone contradicts the numeric score that came with them.
#[derive(Parser)]
#[command(name = "peertone", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP scoring service
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(long)]
        port: Option<u16>,

        /// Address to bind (overrides PEERTONE_BIND)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Score a single comment
    Score {
        /// The comment text
        text: String,

        /// Declared total score to check for disparity (e.g. 8)
        #[arg(long)]
        score_total: Option<f64>,

        /// Who the comment is about: "self" or "peer"
        #[arg(long)]
        target: Option<String>,

        /// Print the result as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Score a JSON file of items ({"items": [...]} or a bare array)
    Batch {
        /// Path to the JSON file
        file: PathBuf,

        /// Print the {ok, results} response instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Download the ONNX sentiment model for the transformer engine
    DownloadModel,

    /// Generate a CA plus server and plugin certificates for request signing
    #[cfg(feature = "web")]
    Keygen,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("peertone=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, bind } => {
            let mut config = Config::load()?;
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(bind) = bind {
                config.bind = bind;
            }
            run_serve(config).await?;
        }

        Commands::Score {
            text,
            score_total,
            target,
            json,
        } => {
            let config = Config::load()?;
            let engine = build_engine(&config)?;

            let mut input = CommentInput::new(text.clone());
            if let Some(total) = score_total {
                input = input.with_score_total(total);
            }
            if let Some(raw) = target.as_deref() {
                let target = Target::parse(raw)
                    .with_context(|| format!("Unknown target '{raw}' (expected self or peer)"))?;
                input = input.with_target(target);
            }

            let result = engine.analyze(&input).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                peertone::output::terminal::display_result(&text, &result);
            }
        }

        Commands::Batch { file, json } => {
            let config = Config::load()?;
            let engine = Arc::new(build_engine(&config)?);

            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let payload: Value = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not valid JSON", file.display()))?;
            let items = match payload {
                Value::Array(items) => items,
                Value::Object(mut map) => match map.remove("items") {
                    Some(Value::Array(items)) => items,
                    _ => anyhow::bail!("Expected an 'items' array in {}", file.display()),
                },
                _ => anyhow::bail!("Expected an 'items' array in {}", file.display()),
            };

            let options = BatchOptions {
                max_items: config.max_batch,
                concurrency: config.concurrency,
                item_timeout: config.item_timeout,
            };

            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("  {spinner} {msg} [{elapsed_precise}]")
                    .context("Invalid progress template")?,
            );
            pb.set_message(format!("Scoring {} comments...", items.len()));
            pb.enable_steady_tick(Duration::from_millis(120));

            let results = run_batch(engine, items, &options).await;
            pb.finish_and_clear();

            if json {
                let response = AnalyzeResponse { ok: true, results };
                println!("{}", serde_json::to_string(&response)?);
            } else {
                peertone::output::terminal::display_batch(&results);
            }
        }

        Commands::DownloadModel => {
            let config = Config::load()?;
            let model_dir = &config.model_dir;

            println!("Downloading ONNX sentiment model...");
            println!("  Destination: {}", model_dir.display());

            peertone::oracle::download::download_model(model_dir).await?;

            println!("\n{}", "Model downloaded successfully.".bold());
            println!("Set PEERTONE_ENGINE=transformer to score with it.");
        }

        #[cfg(feature = "web")]
        Commands::Keygen => print_keys()?,
    }

    Ok(())
}

/// Build the scoring engine for the configured strategy.
fn build_engine(config: &Config) -> Result<Engine> {
    config.require_oracle()?;
    let heuristics = Arc::new(Heuristics::new()?);
    let oracle = peertone::oracle::create_oracle(config, &heuristics)?;
    info!(
        engine = config.engine.as_str(),
        oracle = oracle.name(),
        label_policy = config.label_policy.as_str(),
        "Scoring engine ready"
    );
    Ok(Engine::new(oracle, heuristics, config.label_policy))
}

/// Start the service. An engine that fails to build leaves the server up
/// with /analyze answering 503.
#[cfg(feature = "web")]
async fn run_serve(config: Config) -> Result<()> {
    let engine = match build_engine(&config) {
        Ok(engine) => Some(Arc::new(engine)),
        Err(e) => {
            error!("Polarity oracle unavailable: {e:#}");
            if config.engine == EngineStrategy::TransformerHeuristic {
                eprintln!(
                    "{}",
                    "Run `peertone download-model` or set PEERTONE_ORACLE_URL.".dimmed()
                );
            }
            None
        }
    };
    peertone::web::run_server(config, engine).await
}

/// Print fresh key material: env lines for the service, PHP defines for
/// the plugin.
#[cfg(feature = "web")]
fn print_keys() -> Result<()> {
    use peertone::web::auth;

    let keys = auth::generate_keys(auth::unix_now() + auth::CERT_TTL_SECS)?;

    println!("{}", "Service (.env)".bold());
    println!("PEERTONE_CA_PUB_B64={}", keys.ca_public);
    println!("PEERTONE_SERVER_PRIV_B64={}", keys.server_private);
    println!("PEERTONE_SERVER_CERT_JSON='{}'", keys.server_cert);
    println!("PEERTONE_SERVER_CERT_SIG={}", keys.server_cert_sig);

    println!("\n{}", "Plugin (ca_helpers.php)".bold());
    println!("define('SPE_CA_PUB_B64',         '{}');", keys.ca_public);
    println!("define('SPE_CLIENT_PRIV_B64',    '{}');", keys.client_private);
    println!("define('SPE_CLIENT_CERT_JSON',   '{}');", keys.client_cert);
    println!("define('SPE_CLIENT_CERT_SIG',    '{}');", keys.client_cert_sig);
    println!("define('SPE_SERVER_CERT_JSON',   '{}');", keys.server_cert);
    println!("define('SPE_SERVER_CERT_SIG',    '{}');", keys.server_cert_sig);

    eprintln!(
        "\n{}",
        "Keep the private seeds secret. Certificates expire in one year.".dimmed()
    );
    Ok(())
}

#[cfg(not(feature = "web"))]
async fn run_serve(_config: Config) -> Result<()> {
    error!("peertone was built without the `web` feature");
    anyhow::bail!("Rebuild with `--features web` to run the HTTP service.")
}

// Remote HTTP polarity oracle.
//
// Posts `{"text": ...}` to a sentiment endpoint and accepts either a
// `{"compound": c}` body or a `{"neg", "neu", "pos"}` probability triple.
// Every call carries an explicit timeout so a slow oracle fails one item,
// never the whole batch.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::onnx::surface_form;
use super::traits::{Polarity, PolarityOracle, TokenWeights};

/// Remote transformer oracle reached over HTTP.
pub struct RemoteOracle {
    client: Client,
    url: String,
}

impl RemoteOracle {
    /// Create a client for `url` with a per-request `timeout`.
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for remote oracle")?;
        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PolarityOracle for RemoteOracle {
    async fn score(&self, text: &str, _overlay: &TokenWeights) -> Result<Polarity> {
        let surface = surface_form(text);
        let request = OracleRequest { text: &surface };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .context("Failed to call remote oracle")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Remote oracle returned {}: {}", status, body);
        }

        let body: OracleResponse = response
            .json()
            .await
            .context("Failed to parse remote oracle response")?;

        let polarity = body.into_polarity()?;
        debug!(
            compound = polarity.compound,
            text_preview = %crate::output::truncate_chars(&surface, 50),
            "Remote oracle scored text"
        );
        Ok(polarity)
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

#[derive(Serialize)]
struct OracleRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OracleResponse {
    compound: Option<f64>,
    neg: Option<f64>,
    neu: Option<f64>,
    pos: Option<f64>,
}

impl OracleResponse {
    fn into_polarity(self) -> Result<Polarity> {
        match (self.neg, self.neu, self.pos, self.compound) {
            (Some(neg), Some(neu), Some(pos), compound) => {
                let mut p = Polarity::from_probabilities(neg, neu, pos);
                if let Some(c) = compound.filter(|c| c.is_finite()) {
                    p.compound = c.clamp(-1.0, 1.0);
                }
                Ok(p)
            }
            (_, _, _, Some(c)) if c.is_finite() => {
                let c = c.clamp(-1.0, 1.0);
                Ok(Polarity {
                    compound: c,
                    pos: c.max(0.0),
                    neu: 1.0 - c.abs(),
                    neg: (-c).max(0.0),
                })
            }
            _ => anyhow::bail!("Remote oracle response has neither compound nor neg/neu/pos"),
        }
    }
}

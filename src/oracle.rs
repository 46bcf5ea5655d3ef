use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::OracleConfig;

/// One (label, confidence) answer from a text classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub score: f64,
}

impl Prediction {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// A model that maps text to a single labelled confidence score.
#[async_trait]
pub trait TextClassifier: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &str;

    async fn classify(&self, text: &str) -> Result<Prediction>;
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

/// Text-classification endpoints answer either with a flat list of labels
/// or with one list per input.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Batched(Vec<Vec<LabelScore>>),
    Single(Vec<LabelScore>),
}

impl InferenceResponse {
    fn into_labels(self) -> Vec<LabelScore> {
        match self {
            InferenceResponse::Batched(batches) => batches.into_iter().next().unwrap_or_default(),
            InferenceResponse::Single(labels) => labels,
        }
    }
}

/// Classifier backed by a Hugging Face compatible text-classification
/// endpoint. The HTTP client is built once and reused for every message.
pub struct InferenceClient {
    name: String,
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl InferenceClient {
    pub fn new(name: &str, config: &OracleConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .with_context(|| format!("Failed to build HTTP client for {} oracle", name))?;
        let endpoint = config.endpoint();

        info!(
            "{} oracle configured: model={}, url={}",
            name, config.model, endpoint
        );

        Ok(Self {
            name: name.to_string(),
            client,
            endpoint,
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl TextClassifier for InferenceClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn classify(&self, text: &str) -> Result<Prediction> {
        debug!("Sending {} request to {}", self.name, self.endpoint);

        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&InferenceRequest { inputs: text });
        if !self.api_key.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to call {} oracle", self.name))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "{} oracle error ({}): {}",
                self.name,
                status,
                error_message(&body)
            );
        }

        let parsed: InferenceResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} oracle response", self.name))?;

        top_prediction(parsed.into_labels())
            .with_context(|| format!("Unusable {} oracle response", self.name))
    }
}

#[derive(Debug, Deserialize)]
struct InferenceError {
    error: String,
}

/// The `error` field of a JSON error body, or the raw body otherwise.
fn error_message(body: &str) -> String {
    serde_json::from_str::<InferenceError>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.to_string())
}

/// Pick the highest-scoring label, rejecting scores outside [0, 1].
fn top_prediction(labels: Vec<LabelScore>) -> Result<Prediction> {
    if let Some(bad) = labels.iter().find(|l| !(0.0..=1.0).contains(&l.score)) {
        anyhow::bail!("score {} for label '{}' is outside [0, 1]", bad.score, bad.label);
    }
    labels
        .into_iter()
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .map(|l| Prediction::new(l.label, l.score))
        .context("response contained no labels")
}

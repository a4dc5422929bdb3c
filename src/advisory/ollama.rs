//! Ollama-backed evaluators

use crate::advisory::facets::{judgment_prompt, Facet};
use crate::advisory::{EvaluationRequest, Evaluator, Opinion};
use crate::error::{AdvisoryError, AdvisoryResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Vote key of the final aggregator
pub const AGGREGATOR_NAME: &str = "risk_agent";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Minimal client for the Ollama `/api/generate` endpoint
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    /// Send one non-streaming completion request and return the raw text
    pub async fn generate(&self, prompt: &str) -> AdvisoryResult<String> {
        let response = self
            .http
            .post(self.generate_url())
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdvisoryError::Request(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AdvisoryError::MalformedOutput(e.to_string()))?;

        debug!(model = %self.model, chars = body.response.len(), "Ollama completion received");
        Ok(body.response)
    }
}

/// Facet evaluator asking the model for a SUSPICIOUS/NORMAL opinion
pub struct LlmEvaluator {
    facet: Facet,
    client: OllamaClient,
}

impl LlmEvaluator {
    pub fn new(facet: Facet, client: OllamaClient) -> Self {
        Self { facet, client }
    }
}

#[async_trait]
impl Evaluator for LlmEvaluator {
    fn name(&self) -> &str {
        self.facet.agent_name()
    }

    async fn evaluate(&self, request: &EvaluationRequest<'_>) -> AdvisoryResult<Opinion> {
        let prompt = self.facet.prompt(request.transaction);
        let text = self.client.generate(&prompt).await?;
        Ok(Opinion::new(self.name(), text))
    }
}

/// Final aggregator asking the model for a FRAUD/LEGITIMATE verdict
pub struct LlmAggregator {
    client: OllamaClient,
}

impl LlmAggregator {
    pub fn new(client: OllamaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Evaluator for LlmAggregator {
    fn name(&self) -> &str {
        AGGREGATOR_NAME
    }

    async fn evaluate(&self, request: &EvaluationRequest<'_>) -> AdvisoryResult<Opinion> {
        let prompt = judgment_prompt(request.transaction, request.prior_opinions);
        let text = self.client.generate(&prompt).await?;
        Ok(Opinion::new(AGGREGATOR_NAME, text))
    }
}

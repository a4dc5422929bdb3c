//! Composition of facet evaluators and the final aggregator

use crate::advisory::facets::Facet;
use crate::advisory::ollama::{LlmAggregator, LlmEvaluator, OllamaClient};
use crate::advisory::verdict::{derive_verdict, AdvisoryVerdict};
use crate::advisory::{EvaluationRequest, Evaluator, Opinion};
use crate::config::AdvisoryConfig;
use crate::error::AdvisoryResult;
use crate::metrics::DecisionMetrics;
use crate::types::transaction::Transaction;
use futures::future::try_join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Ordered facet evaluators plus one aggregator.
///
/// A deliberation is a single attempt: the first evaluator error aborts it.
pub struct AdvisoryPanel {
    evaluators: Vec<Arc<dyn Evaluator>>,
    aggregator: Arc<dyn Evaluator>,
    metrics: Option<Arc<DecisionMetrics>>,
}

impl AdvisoryPanel {
    /// Create a panel with no facet evaluators yet
    pub fn new(aggregator: Arc<dyn Evaluator>) -> Self {
        Self {
            evaluators: Vec::new(),
            aggregator,
            metrics: None,
        }
    }

    /// Default Ollama-backed panel: amount, behavior and location facets
    /// followed by the risk aggregator.
    pub fn with_ollama(config: &AdvisoryConfig) -> Self {
        let client = OllamaClient::new(&config.ollama_url, &config.model);

        let panel = Facet::ALL.iter().fold(
            Self::new(Arc::new(LlmAggregator::new(client.clone()))),
            |panel, &facet| panel.with_evaluator(Arc::new(LlmEvaluator::new(facet, client.clone()))),
        );

        info!(
            ollama_url = %config.ollama_url,
            model = %config.model,
            evaluators = ?panel.evaluator_names(),
            "Advisory panel initialized"
        );

        panel
    }

    /// Append a facet evaluator
    pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluators.push(evaluator);
        self
    }

    /// Record per-evaluator latency into `metrics`
    pub fn with_metrics(mut self, metrics: Arc<DecisionMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Facet evaluator names in panel order, followed by the aggregator
    pub fn evaluator_names(&self) -> Vec<&str> {
        self.evaluators
            .iter()
            .map(|e| e.name())
            .chain(std::iter::once(self.aggregator.name()))
            .collect()
    }

    /// Run every facet evaluator concurrently, then the aggregator over their
    /// opinions, and translate the result into a verdict.
    pub async fn deliberate(&self, tx: &Transaction) -> AdvisoryResult<AdvisoryVerdict> {
        let request = EvaluationRequest::new(tx);

        let opinions = try_join_all(
            self.evaluators
                .iter()
                .map(|evaluator| self.consult(evaluator.as_ref(), &request)),
        )
        .await?;

        let judgment = self
            .consult(
                self.aggregator.as_ref(),
                &request.with_prior_opinions(&opinions),
            )
            .await?;

        let verdict = derive_verdict(&opinions, &judgment)?;

        debug!(
            transaction_id = %tx.transaction_id,
            is_fraud = verdict.is_fraud,
            votes = ?verdict.agent_votes,
            "Advisory deliberation complete"
        );

        Ok(verdict)
    }

    async fn consult(
        &self,
        evaluator: &dyn Evaluator,
        request: &EvaluationRequest<'_>,
    ) -> AdvisoryResult<Opinion> {
        let start = Instant::now();
        let result = evaluator.evaluate(request).await;

        if let Some(metrics) = &self.metrics {
            metrics.record_evaluator_time(evaluator.name(), start.elapsed());
        }

        match result {
            // Vote keys always follow the evaluator's registered name
            Ok(opinion) => Ok(Opinion::new(evaluator.name(), opinion.text)),
            Err(e) => {
                warn!(
                    evaluator = %evaluator.name(),
                    transaction_id = %request.transaction.transaction_id,
                    error = %e,
                    "Evaluator failed"
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::AdvisoryError;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Evaluator that replies with a fixed text or error, optionally after a
    /// delay, or panics
    pub struct ScriptedEvaluator {
        name: String,
        reply: AdvisoryResult<String>,
        delay: Option<Duration>,
        panic_with: Option<String>,
    }

    impl ScriptedEvaluator {
        pub fn replying(name: &str, text: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                reply: Ok(text.to_string()),
                delay: None,
                panic_with: None,
            })
        }

        pub fn failing(name: &str, error: AdvisoryError) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                reply: Err(error),
                delay: None,
                panic_with: None,
            })
        }

        pub fn slow(name: &str, text: &str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                reply: Ok(text.to_string()),
                delay: Some(delay),
                panic_with: None,
            })
        }

        pub fn panicking(name: &str, message: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                reply: Ok(String::new()),
                delay: None,
                panic_with: Some(message.to_string()),
            })
        }
    }

    #[async_trait]
    impl Evaluator for ScriptedEvaluator {
        fn name(&self) -> &str {
            &self.name
        }

        async fn evaluate(&self, _request: &EvaluationRequest<'_>) -> AdvisoryResult<Opinion> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(message) = &self.panic_with {
                panic!("{}", message);
            }
            self.reply
                .clone()
                .map(|text| Opinion::new(self.name.as_str(), text))
        }
    }

    /// Panel of three facet evaluators with the given replies and an aggregator
    pub fn panel(amount: &str, behavior: &str, location: &str, judgment: &str) -> AdvisoryPanel {
        AdvisoryPanel::new(ScriptedEvaluator::replying("risk_agent", judgment))
            .with_evaluator(ScriptedEvaluator::replying("amount_agent", amount))
            .with_evaluator(ScriptedEvaluator::replying("behavior_agent", behavior))
            .with_evaluator(ScriptedEvaluator::replying("location_agent", location))
    }
}

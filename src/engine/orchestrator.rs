//! Decision orchestrator: advisory attempt with rule-based fallback

use crate::advisory::{AdvisoryPanel, AdvisoryVerdict};
use crate::config::AppConfig;
use crate::engine::policy::PolicyGate;
use crate::engine::rules::RuleScorer;
use crate::error::{AdvisoryError, AdvisoryResult, EngineError};
use crate::store::AnalysisStore;
use crate::types::prediction::{AnalysisResponse, Prediction, FALLBACK_VOTER};
use crate::types::transaction::Transaction;
use futures::FutureExt;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Turns transactions into predictions and actions.
///
/// Holds no per-call state; share it between workers behind an `Arc`.
pub struct DecisionEngine {
    scorer: RuleScorer,
    advisory: Option<AdvisoryPanel>,
    advisory_timeout: Duration,
    store: Option<Arc<dyn AnalysisStore>>,
    policy: PolicyGate,
}

impl DecisionEngine {
    /// Create a rule-only engine from configuration.
    ///
    /// Attach an advisory panel and a store with the `with_*` builders.
    pub fn new(config: &AppConfig) -> Self {
        Self {
            scorer: RuleScorer::new(),
            advisory: None,
            advisory_timeout: Duration::from_millis(config.advisory.timeout_ms),
            store: None,
            policy: PolicyGate::new(config.detection.threshold),
        }
    }

    pub fn with_advisory(mut self, panel: AdvisoryPanel) -> Self {
        self.advisory = Some(panel);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn AnalysisStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn policy(&self) -> &PolicyGate {
        &self.policy
    }

    pub fn has_advisory(&self) -> bool {
        self.advisory.is_some()
    }

    /// Analyze a transaction.
    ///
    /// Fails only when the transaction is invalid. Advisory failures and
    /// timeouts fall back to the rule-based scorer; persistence runs in the
    /// background and never affects the result.
    pub async fn analyze(&self, tx: &Transaction) -> Result<Prediction, EngineError> {
        tx.validate()?;

        let start = Instant::now();

        let advisory = match &self.advisory {
            Some(panel) => Some(self.consult(panel, tx).await),
            None => None,
        };

        let (is_fraud, confidence_score, risk_factors, agent_votes) = match advisory {
            Some(Ok(verdict)) => (
                verdict.is_fraud,
                verdict.confidence,
                verdict.risk_factors,
                verdict.agent_votes,
            ),
            Some(Err(e)) => {
                warn!(
                    transaction_id = %tx.transaction_id,
                    error = %e,
                    "Advisory panel failed, falling back to rule-based scoring"
                );
                self.fallback(tx)
            }
            None => self.fallback(tx),
        };

        let prediction = Prediction {
            transaction_id: tx.transaction_id.clone(),
            is_fraud,
            confidence_score,
            risk_factors,
            agent_votes,
            processing_time_ms: start.elapsed().as_millis() as u64,
        };

        debug!(
            transaction_id = %prediction.transaction_id,
            is_fraud = prediction.is_fraud,
            confidence = prediction.confidence_score,
            fallback = prediction.is_fallback(),
            processing_time_ms = prediction.processing_time_ms,
            "Analysis complete"
        );

        self.persist(tx, &prediction);

        Ok(prediction)
    }

    /// Analyze a transaction and apply the policy gate
    pub async fn evaluate(&self, tx: &Transaction) -> Result<AnalysisResponse, EngineError> {
        let prediction = self.analyze(tx).await?;
        let (action, _) = self.policy.decide(&prediction);

        info!(
            transaction_id = %prediction.transaction_id,
            action = %action,
            is_fraud = prediction.is_fraud,
            confidence = prediction.confidence_score,
            "Decision made"
        );

        Ok(AnalysisResponse::new(prediction, action))
    }

    /// One bounded deliberation. Panics inside evaluators count as advisory
    /// failures.
    async fn consult(&self, panel: &AdvisoryPanel, tx: &Transaction) -> AdvisoryResult<AdvisoryVerdict> {
        let deliberation = AssertUnwindSafe(panel.deliberate(tx)).catch_unwind();

        match tokio::time::timeout(self.advisory_timeout, deliberation).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(AdvisoryError::Panicked(panic_message(panic.as_ref()))),
            Err(_) => Err(AdvisoryError::Timeout(self.advisory_timeout.as_millis() as u64)),
        }
    }

    fn fallback(&self, tx: &Transaction) -> (bool, f64, Vec<String>, BTreeMap<String, bool>) {
        let score = self.scorer.score(tx);

        let mut agent_votes = BTreeMap::new();
        agent_votes.insert(FALLBACK_VOTER.to_string(), score.is_fraud);

        (score.is_fraud, score.confidence, score.risk_factors, agent_votes)
    }

    /// Hand the result to the store without waiting for it
    fn persist(&self, tx: &Transaction, prediction: &Prediction) {
        let Some(store) = self.store.clone() else {
            return;
        };

        let tx = tx.clone();
        let prediction = prediction.clone();

        tokio::spawn(async move {
            if let Err(e) = store.record(&tx, &prediction).await {
                error!(
                    transaction_id = %prediction.transaction_id,
                    error = %e,
                    "Failed to persist analysis"
                );
            }
        });
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisory::panel::testing::{panel, ScriptedEvaluator};
    use crate::types::prediction::Action;
    use crate::types::transaction::TransactionType;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    fn config(threshold: f64, timeout_ms: u64) -> AppConfig {
        let mut config = AppConfig::default();
        config.detection.threshold = threshold;
        config.advisory.timeout_ms = timeout_ms;
        config
    }

    fn purchase(amount: f64) -> Transaction {
        Transaction::new("tx_test", "user_123", amount, TransactionType::Purchase)
    }

    fn failing_panel(error: AdvisoryError) -> AdvisoryPanel {
        AdvisoryPanel::new(ScriptedEvaluator::replying("risk_agent", "FRAUD"))
            .with_evaluator(ScriptedEvaluator::failing("amount_agent", error))
    }

    /// Forwards every record to a channel
    struct ChannelStore(mpsc::UnboundedSender<(String, String)>);

    #[async_trait]
    impl AnalysisStore for ChannelStore {
        async fn record(&self, tx: &Transaction, prediction: &Prediction) -> anyhow::Result<()> {
            let _ = self
                .0
                .send((tx.transaction_id.clone(), prediction.transaction_id.clone()));
            Ok(())
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl AnalysisStore for BrokenStore {
        async fn record(&self, _tx: &Transaction, _prediction: &Prediction) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    fn assert_rule_verdict(prediction: &Prediction, is_fraud: bool, confidence: f64, factors: &[&str]) {
        assert_eq!(prediction.is_fraud, is_fraud);
        assert_eq!(prediction.confidence_score, confidence);
        assert_eq!(prediction.risk_factors, factors);
        assert_eq!(prediction.agent_votes.len(), 1);
        assert_eq!(prediction.agent_votes[FALLBACK_VOTER], is_fraud);
    }

    #[tokio::test]
    async fn test_high_amount_approved_below_threshold() {
        let engine = DecisionEngine::new(&config(0.7, 1000));

        let response = engine.evaluate(&purchase(15000.0)).await.unwrap();

        assert_rule_verdict(&response.prediction, true, 0.6, &["High amount transaction"]);
        assert_eq!(response.action, Action::Approve);
        assert_eq!(response.message, "Transaction approved");
    }

    #[tokio::test]
    async fn test_ordinary_purchase_approved() {
        let engine = DecisionEngine::new(&config(0.7, 1000));

        let response = engine.evaluate(&purchase(2500.0)).await.unwrap();

        assert_rule_verdict(&response.prediction, false, 0.3, &[]);
        assert_eq!(response.action, Action::Approve);
    }

    #[tokio::test]
    async fn test_round_number_declined_at_lower_threshold() {
        let engine = DecisionEngine::new(&config(0.5, 1000));

        let response = engine.evaluate(&purchase(6000.0)).await.unwrap();

        assert_rule_verdict(&response.prediction, true, 0.6, &["Round number pattern"]);
        assert_eq!(response.action, Action::Decline);
        assert_eq!(response.message, "Transaction declined due to fraud risk");
    }

    #[tokio::test]
    async fn test_advisory_failure_matches_rule_scorer() {
        let tx = purchase(15000.0);
        let rule_only = DecisionEngine::new(&config(0.7, 1000));
        let with_failing = DecisionEngine::new(&config(0.7, 1000)).with_advisory(failing_panel(
            AdvisoryError::Request("connection refused".to_string()),
        ));

        let expected = rule_only.evaluate(&tx).await.unwrap();
        let actual = with_failing.evaluate(&tx).await.unwrap();

        assert_rule_verdict(&actual.prediction, true, 0.6, &["High amount transaction"]);
        assert_eq!(actual.prediction.is_fraud, expected.prediction.is_fraud);
        assert_eq!(actual.prediction.risk_factors, expected.prediction.risk_factors);
        assert_eq!(actual.prediction.agent_votes, expected.prediction.agent_votes);
        assert_eq!(actual.action, expected.action);
    }

    #[tokio::test]
    async fn test_malformed_advisory_output_falls_back() {
        let engine = DecisionEngine::new(&config(0.7, 1000))
            .with_advisory(panel("NORMAL", "NORMAL", "NORMAL", "no idea"));

        let prediction = engine.analyze(&purchase(2500.0)).await.unwrap();

        assert!(prediction.is_fallback());
        assert_rule_verdict(&prediction, false, 0.3, &[]);
    }

    #[tokio::test]
    async fn test_empty_advisory_output_falls_back() {
        let engine = DecisionEngine::new(&config(0.7, 1000))
            .with_advisory(panel("", "NORMAL", "NORMAL", "FRAUD"));

        let prediction = engine.analyze(&purchase(6000.0)).await.unwrap();
        assert_rule_verdict(&prediction, true, 0.6, &["Round number pattern"]);
    }

    #[tokio::test]
    async fn test_panicking_evaluator_falls_back() {
        let panicking_panel = AdvisoryPanel::new(ScriptedEvaluator::replying("risk_agent", "LEGITIMATE"))
            .with_evaluator(ScriptedEvaluator::panicking("amount_agent", "evaluator bug"));
        let engine = DecisionEngine::new(&config(0.7, 1000)).with_advisory(panicking_panel);

        let prediction = engine.analyze(&purchase(15000.0)).await.unwrap();

        assert!(prediction.is_fallback());
        assert_rule_verdict(&prediction, true, 0.6, &["High amount transaction"]);
    }

    #[tokio::test]
    async fn test_panicking_aggregator_falls_back() {
        let panicking_panel = AdvisoryPanel::new(ScriptedEvaluator::panicking("risk_agent", "bad verdict"))
            .with_evaluator(ScriptedEvaluator::replying("amount_agent", "NORMAL"));
        let engine = DecisionEngine::new(&config(0.7, 1000)).with_advisory(panicking_panel);

        let prediction = engine.analyze(&purchase(2500.0)).await.unwrap();
        assert_rule_verdict(&prediction, false, 0.3, &[]);
    }

    #[tokio::test]
    async fn test_evaluator_named_fallback_never_counts_as_advisory() {
        let impostor_panel = AdvisoryPanel::new(ScriptedEvaluator::replying("risk_agent", "LEGITIMATE"))
            .with_evaluator(ScriptedEvaluator::replying(FALLBACK_VOTER, "NORMAL"));
        let engine = DecisionEngine::new(&config(0.7, 1000)).with_advisory(impostor_panel);

        let prediction = engine.analyze(&purchase(15000.0)).await.unwrap();

        // The fallback key only ever carries the rule scorer's verdict
        assert_rule_verdict(&prediction, true, 0.6, &["High amount transaction"]);
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&"owned".to_string()), "owned");
        assert_eq!(panic_message(&42_u8), "unknown panic");
    }

    #[tokio::test]
    async fn test_slow_advisory_times_out() {
        let slow_panel = AdvisoryPanel::new(ScriptedEvaluator::replying("risk_agent", "LEGITIMATE"))
            .with_evaluator(ScriptedEvaluator::slow(
                "amount_agent",
                "NORMAL",
                Duration::from_millis(500),
            ));
        let engine = DecisionEngine::new(&config(0.7, 20)).with_advisory(slow_panel);

        let started = Instant::now();
        let prediction = engine.analyze(&purchase(15000.0)).await.unwrap();

        assert!(started.elapsed() < Duration::from_millis(500));
        assert_rule_verdict(&prediction, true, 0.6, &["High amount transaction"]);
    }

    #[tokio::test]
    async fn test_advisory_verdict_used_when_available() {
        let engine = DecisionEngine::new(&config(0.7, 1000)).with_advisory(panel(
            "SUSPICIOUS: unusual amount",
            "NORMAL",
            "NORMAL",
            "FRAUD",
        ));

        let response = engine.evaluate(&purchase(2500.0)).await.unwrap();
        let prediction = &response.prediction;

        assert!(!prediction.is_fallback());
        assert!(prediction.is_fraud);
        assert_eq!(prediction.confidence_score, 0.8);
        assert_eq!(
            prediction.risk_factors,
            vec!["Suspicious patterns detected", "Unusual behavior"]
        );
        assert_eq!(prediction.agent_votes.len(), 4);
        assert_eq!(response.action, Action::Decline);
    }

    #[tokio::test]
    async fn test_confident_legitimate_goes_to_review() {
        let engine = DecisionEngine::new(&config(0.1, 1000))
            .with_advisory(panel("NORMAL", "NORMAL", "NORMAL", "LEGITIMATE"));

        let response = engine.evaluate(&purchase(40.0)).await.unwrap();

        assert!(!response.prediction.is_fraud);
        assert_eq!(response.action, Action::Review);
    }

    #[tokio::test]
    async fn test_processing_time_measured() {
        let slow_panel = AdvisoryPanel::new(ScriptedEvaluator::slow(
            "risk_agent",
            "LEGITIMATE",
            Duration::from_millis(30),
        ));
        let engine = DecisionEngine::new(&config(0.7, 1000)).with_advisory(slow_panel);

        let prediction = engine.analyze(&purchase(10.0)).await.unwrap();
        assert!(prediction.processing_time_ms >= 30);
    }

    #[tokio::test]
    async fn test_invalid_transaction_rejected() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let engine = DecisionEngine::new(&config(0.7, 1000)).with_store(Arc::new(ChannelStore(sender)));

        let err = engine.analyze(&purchase(-1.0)).await.unwrap_err();

        assert!(matches!(err, EngineError::Validation(_)));
        drop(engine);
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_prediction_is_persisted() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let engine = DecisionEngine::new(&config(0.7, 1000)).with_store(Arc::new(ChannelStore(sender)));

        engine.analyze(&purchase(15000.0)).await.unwrap();

        let (tx_id, prediction_id) = receiver.recv().await.unwrap();
        assert_eq!(tx_id, "tx_test");
        assert_eq!(prediction_id, "tx_test");
    }

    #[tokio::test]
    async fn test_store_failure_is_swallowed() {
        let engine = DecisionEngine::new(&config(0.7, 1000)).with_store(Arc::new(BrokenStore));

        let prediction = engine.analyze(&purchase(15000.0)).await.unwrap();
        assert!(prediction.is_fraud);

        // Let the background write run and fail
        tokio::task::yield_now().await;
    }

    #[tokio::test]
    async fn test_analyze_is_repeatable() {
        let engine = DecisionEngine::new(&config(0.7, 1000));
        let tx = purchase(7000.0);

        let first = engine.analyze(&tx).await.unwrap();
        let second = engine.analyze(&tx).await.unwrap();

        assert_eq!(first.is_fraud, second.is_fraud);
        assert_eq!(first.risk_factors, second.risk_factors);
        assert_eq!(first.agent_votes, second.agent_votes);
    }
}

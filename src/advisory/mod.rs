//! Best-effort advisory panel.
//!
//! A set of independent evaluators each judge one facet of a transaction and
//! an aggregator makes the final call. Evaluators and the aggregator share
//! one capability, [`Evaluator`], so the panel composition is data rather
//! than code.

pub mod facets;
pub mod ollama;
pub mod panel;
pub mod verdict;

use crate::error::AdvisoryResult;
use crate::types::transaction::Transaction;
use async_trait::async_trait;

pub use facets::Facet;
pub use ollama::{LlmAggregator, LlmEvaluator, OllamaClient};
pub use panel::AdvisoryPanel;
pub use verdict::{derive_verdict, AdvisoryVerdict};

/// Free-text output of one evaluator
#[derive(Debug, Clone, PartialEq)]
pub struct Opinion {
    /// Name of the evaluator that produced it
    pub evaluator: String,
    pub text: String,
}

impl Opinion {
    pub fn new(evaluator: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            evaluator: evaluator.into(),
            text: text.into(),
        }
    }
}

/// Input to an evaluator.
///
/// Facet evaluators receive no prior opinions; the aggregator receives every
/// facet opinion in panel order.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationRequest<'a> {
    pub transaction: &'a Transaction,
    pub prior_opinions: &'a [Opinion],
}

impl<'a> EvaluationRequest<'a> {
    pub fn new(transaction: &'a Transaction) -> Self {
        Self {
            transaction,
            prior_opinions: &[],
        }
    }

    pub fn with_prior_opinions(mut self, prior_opinions: &'a [Opinion]) -> Self {
        self.prior_opinions = prior_opinions;
        self
    }
}

/// One member of the advisory panel
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Name used as the vote key for this evaluator
    fn name(&self) -> &str;

    async fn evaluate(&self, request: &EvaluationRequest<'_>) -> AdvisoryResult<Opinion>;
}

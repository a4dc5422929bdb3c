//! Prediction and decision data structures

use crate::error::EngineError;
use crate::types::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Vote key used when the rule-based fallback produced the verdict
pub const FALLBACK_VOTER: &str = "fallback";

/// Structured verdict for one transaction.
///
/// Built exactly once per analysis and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub transaction_id: String,

    pub is_fraud: bool,

    /// Confidence in the verdict (0.0 - 1.0)
    pub confidence_score: f64,

    /// Human-readable reasons, in detection order
    pub risk_factors: Vec<String>,

    /// Evaluator name -> vote, for auditability only
    pub agent_votes: BTreeMap<String, bool>,

    /// Wall-clock analysis duration, floored to milliseconds
    pub processing_time_ms: u64,
}

impl Prediction {
    /// Whether the verdict came from the rule-based fallback path
    pub fn is_fallback(&self) -> bool {
        self.agent_votes.contains_key(FALLBACK_VOTER)
    }
}

/// Operational action recommended for a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Approve,
    Review,
    Decline,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Approve => "approve",
            Action::Review => "review",
            Action::Decline => "decline",
        }
    }

    /// Operator-facing message attached to the action
    pub fn message(&self) -> &'static str {
        match self {
            Action::Approve => "Transaction approved",
            Action::Review => "Transaction flagged for manual review",
            Action::Decline => "Transaction declined due to fraud risk",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Envelope accepted on the transaction subject
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub transaction: Transaction,
}

/// Full analysis result returned to the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub transaction_id: String,
    pub prediction: Prediction,
    pub action: Action,
    pub message: String,
}

impl AnalysisResponse {
    pub fn new(prediction: Prediction, action: Action) -> Self {
        Self {
            transaction_id: prediction.transaction_id.clone(),
            prediction,
            action,
            message: action.message().to_string(),
        }
    }
}

/// Error body returned when a request cannot be analyzed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable kind: `validation_failed` or `analysis_failed`
    pub error: String,
    pub detail: String,
}

impl From<&EngineError> for ErrorResponse {
    fn from(err: &EngineError) -> Self {
        let detail = match err {
            EngineError::Validation(detail) | EngineError::Analysis(detail) => detail.clone(),
        };
        Self {
            error: err.kind().to_string(),
            detail,
        }
    }
}

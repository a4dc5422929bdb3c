//! Deterministic rule-based scorer.
//!
//! Used as the fallback whenever the advisory panel is unavailable, and as the
//! baseline verdict the rest of the engine is tested against.

use crate::types::transaction::Transaction;

/// Amount above which a transaction is always flagged
pub const HIGH_AMOUNT_LIMIT: f64 = 10_000.0;

/// Smallest amount the round-number rule applies to
pub const ROUND_NUMBER_FLOOR: f64 = 5_000.0;

/// Granularity of the round-number rule
pub const ROUND_NUMBER_STEP: f64 = 1_000.0;

pub const FRAUD_CONFIDENCE: f64 = 0.6;
pub const LEGITIMATE_CONFIDENCE: f64 = 0.3;

pub const HIGH_AMOUNT_FACTOR: &str = "High amount transaction";
pub const ROUND_NUMBER_FACTOR: &str = "Round number pattern";

/// Outcome of the rule set for one transaction
#[derive(Debug, Clone, PartialEq)]
pub struct RuleScore {
    pub is_fraud: bool,
    pub confidence: f64,
    pub risk_factors: Vec<String>,
}

/// Pure transaction -> verdict scorer with fixed rules.
///
/// Confidence does not grow with the number of rules fired: any hit yields
/// 0.6, no hit yields 0.3.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleScorer;

impl RuleScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, tx: &Transaction) -> RuleScore {
        let mut risk_factors = Vec::new();

        if tx.amount > HIGH_AMOUNT_LIMIT {
            risk_factors.push(HIGH_AMOUNT_FACTOR.to_string());
        }

        if tx.amount % ROUND_NUMBER_STEP == 0.0 && tx.amount >= ROUND_NUMBER_FLOOR {
            risk_factors.push(ROUND_NUMBER_FACTOR.to_string());
        }

        let is_fraud = !risk_factors.is_empty();
        let confidence = if is_fraud {
            FRAUD_CONFIDENCE
        } else {
            LEGITIMATE_CONFIDENCE
        };

        RuleScore {
            is_fraud,
            confidence,
            risk_factors,
        }
    }
}

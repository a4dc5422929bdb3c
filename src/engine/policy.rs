//! Threshold-driven mapping from prediction to operational action

use crate::types::prediction::{Action, Prediction};

/// Map a prediction to an action under `threshold`.
///
/// Confidence at or above the threshold always needs attention: a fraud
/// verdict is declined and a legitimate one goes to manual review. Only
/// low-confidence predictions are auto-approved.
pub fn decide(prediction: &Prediction, threshold: f64) -> (Action, &'static str) {
    let action = if prediction.confidence_score >= threshold {
        if prediction.is_fraud {
            Action::Decline
        } else {
            Action::Review
        }
    } else {
        Action::Approve
    };

    (action, action.message())
}

/// Policy gate bound to a configured threshold
#[derive(Debug, Clone, Copy)]
pub struct PolicyGate {
    threshold: f64,
}

impl PolicyGate {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn decide(&self, prediction: &Prediction) -> (Action, &'static str) {
        decide(prediction, self.threshold)
    }
}

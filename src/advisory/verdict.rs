//! Translation of free-text panel output into a structured verdict.
//!
//! The evaluators answer in natural language, so this is marker and phrase
//! scanning rather than parsing. Everything text-dependent lives here so the
//! orchestrator only ever sees an `AdvisoryVerdict`.

use crate::advisory::Opinion;
use crate::error::{AdvisoryError, AdvisoryResult};
use crate::types::prediction::FALLBACK_VOTER;
use std::collections::BTreeMap;

/// Marker in the final judgment that flags the transaction
pub const FRAUD_MARKER: &str = "FRAUD";

/// Marker in the final judgment for a clean transaction
pub const LEGITIMATE_MARKER: &str = "LEGITIMATE";

/// Marker in a facet opinion that counts as a suspicious vote (case-sensitive)
pub const SUSPICIOUS_MARKER: &str = "SUSPICIOUS";

pub const FRAUD_CONFIDENCE: f64 = 0.8;
pub const LEGITIMATE_CONFIDENCE: f64 = 0.2;

/// Lowercase phrase -> risk factor reported when the phrase appears anywhere
const INDICATORS: &[(&str, &str)] = &[
    ("suspicious", "Suspicious patterns detected"),
    ("unusual", "Unusual behavior"),
];

/// Structured verdict derived from one panel deliberation
#[derive(Debug, Clone, PartialEq)]
pub struct AdvisoryVerdict {
    pub is_fraud: bool,
    pub confidence: f64,
    pub risk_factors: Vec<String>,
    pub agent_votes: BTreeMap<String, bool>,
}

/// Derive the verdict from the facet opinions and the final judgment.
///
/// Fails on empty output from any evaluator, on an evaluator named after the
/// reserved fallback vote key, and on a judgment that carries neither the
/// fraud nor the legitimate marker.
pub fn derive_verdict(opinions: &[Opinion], judgment: &Opinion) -> AdvisoryResult<AdvisoryVerdict> {
    for opinion in opinions.iter().chain(std::iter::once(judgment)) {
        if opinion.evaluator == FALLBACK_VOTER {
            return Err(AdvisoryError::MalformedOutput(format!(
                "evaluator name {:?} is reserved",
                FALLBACK_VOTER
            )));
        }
        if opinion.text.trim().is_empty() {
            return Err(AdvisoryError::EmptyOutput(opinion.evaluator.clone()));
        }
    }

    let judgment_upper = judgment.text.to_uppercase();
    let is_fraud = judgment_upper.contains(FRAUD_MARKER);
    if !is_fraud && !judgment_upper.contains(LEGITIMATE_MARKER) {
        return Err(AdvisoryError::MalformedOutput(format!(
            "{} gave no {} or {} verdict",
            judgment.evaluator, FRAUD_MARKER, LEGITIMATE_MARKER
        )));
    }

    let combined = opinions
        .iter()
        .chain(std::iter::once(judgment))
        .map(|opinion| opinion.text.to_lowercase())
        .collect::<Vec<_>>()
        .join("\n");

    let risk_factors = INDICATORS
        .iter()
        .filter(|(phrase, _)| combined.contains(phrase))
        .map(|(_, factor)| factor.to_string())
        .collect();

    let mut agent_votes: BTreeMap<String, bool> = opinions
        .iter()
        .map(|opinion| {
            (
                opinion.evaluator.clone(),
                opinion.text.contains(SUSPICIOUS_MARKER),
            )
        })
        .collect();
    agent_votes.insert(judgment.evaluator.clone(), is_fraud);

    Ok(AdvisoryVerdict {
        is_fraud,
        confidence: if is_fraud {
            FRAUD_CONFIDENCE
        } else {
            LEGITIMATE_CONFIDENCE
        },
        risk_factors,
        agent_votes,
    })
}

//! Scoring, orchestration and policy

pub mod orchestrator;
pub mod policy;
pub mod rules;

pub use orchestrator::DecisionEngine;
pub use policy::{decide, PolicyGate};
pub use rules::{RuleScore, RuleScorer};

//! Fraud Decision Engine Library
//!
//! Scores financial transactions for fraud risk and maps each verdict to an
//! approve / review / decline action. A panel of LLM evaluators is consulted
//! when available; a deterministic rule-based scorer answers otherwise.

pub mod advisory;
pub mod config;
pub mod consumer;
pub mod engine;
pub mod error;
pub mod health;
pub mod metrics;
pub mod producer;
pub mod store;
pub mod types;

pub use advisory::AdvisoryPanel;
pub use config::AppConfig;
pub use consumer::TransactionConsumer;
pub use engine::{DecisionEngine, PolicyGate, RuleScorer};
pub use error::{AdvisoryError, EngineError};
pub use producer::DecisionProducer;
pub use store::{AnalysisStore, SqliteAnalysisStore};
pub use types::{Action, AnalysisResponse, Prediction, Transaction, TransactionType};

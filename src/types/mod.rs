//! Type definitions for the fraud decision engine

pub mod prediction;
pub mod transaction;

pub use prediction::{Action, AnalysisRequest, AnalysisResponse, ErrorResponse, Prediction};
pub use transaction::{Transaction, TransactionType};

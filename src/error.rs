//! Error types for the decision engine and its advisory layer

use thiserror::Error;

/// Errors the engine may surface to its caller.
///
/// Advisory and persistence failures are recovered internally and never
/// appear here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Analysis failed: {0}")]
    Analysis(String),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn analysis(msg: impl Into<String>) -> Self {
        Self::Analysis(msg.into())
    }

    /// Machine-readable kind used in error replies
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation_failed",
            EngineError::Analysis(_) => "analysis_failed",
        }
    }
}

/// Failures of the advisory panel. Always triggers the rule-based fallback.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdvisoryError {
    #[error("Advisory panel timed out after {0}ms")]
    Timeout(u64),

    #[error("Advisory request failed: {0}")]
    Request(String),

    #[error("Malformed advisory output: {0}")]
    MalformedOutput(String),

    #[error("Evaluator {0} returned empty output")]
    EmptyOutput(String),

    #[error("Advisory panel panicked: {0}")]
    Panicked(String),
}

impl From<reqwest::Error> for AdvisoryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AdvisoryError::MalformedOutput(e.to_string())
        } else {
            AdvisoryError::Request(e.to_string())
        }
    }
}

pub type AdvisoryResult<T> = std::result::Result<T, AdvisoryError>;

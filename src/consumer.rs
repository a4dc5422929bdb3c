//! NATS message consumer for incoming transactions

use crate::error::EngineError;
use crate::types::prediction::AnalysisRequest;
use crate::types::transaction::Transaction;
use anyhow::Result;
use async_nats::{Client, Subscriber};
use serde_json::Value;
use tracing::info;

/// Decode a message payload into a transaction.
///
/// Accepts either a bare transaction or an `{"transaction": ...}` envelope.
/// Anything else is a validation failure carrying the decoder's reason.
pub fn parse_transaction(payload: &[u8]) -> Result<Transaction, EngineError> {
    let malformed =
        |e: serde_json::Error| EngineError::validation(format!("Malformed transaction payload: {}", e));

    let value: Value = serde_json::from_slice(payload).map_err(malformed)?;

    if value.get("transaction").is_some() {
        serde_json::from_value::<AnalysisRequest>(value)
            .map(|request| request.transaction)
            .map_err(malformed)
    } else {
        serde_json::from_value::<Transaction>(value).map_err(malformed)
    }
}

/// Consumer for receiving transactions from NATS
pub struct TransactionConsumer {
    client: Client,
    subject: String,
}

impl TransactionConsumer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Subscribe to the transaction subject
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = self.client.subscribe(self.subject.clone()).await?;
        info!(subject = %self.subject, "Subscribed to transaction subject");
        Ok(subscriber)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

//! NATS publisher for decisions and error replies

use crate::types::prediction::{AnalysisResponse, ErrorResponse};
use anyhow::Result;
use async_nats::{Client, Subject};
use serde::Serialize;
use tracing::debug;

/// Publishes analysis responses to the decision subject and answers
/// request/reply callers
#[derive(Clone)]
pub struct DecisionProducer {
    client: Client,
    subject: String,
}

impl DecisionProducer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Publish a decision to the decision subject
    pub async fn publish(&self, response: &AnalysisResponse) -> Result<()> {
        let payload = serde_json::to_vec(response)?;

        self.client
            .publish(self.subject.clone(), payload.into())
            .await?;

        debug!(
            transaction_id = %response.transaction_id,
            action = %response.action,
            "Published decision"
        );

        Ok(())
    }

    /// Answer the caller of a request, if the message asked for a reply
    pub async fn reply(&self, reply_to: Option<&Subject>, response: &AnalysisResponse) -> Result<()> {
        self.send_reply(reply_to, response).await
    }

    /// Answer the caller of a request with an error body
    pub async fn reply_error(&self, reply_to: Option<&Subject>, error: &ErrorResponse) -> Result<()> {
        self.send_reply(reply_to, error).await
    }

    async fn send_reply<T: Serialize>(&self, reply_to: Option<&Subject>, body: &T) -> Result<()> {
        let Some(reply_to) = reply_to else {
            return Ok(());
        };

        let payload = serde_json::to_vec(body)?;
        self.client.publish(reply_to.clone(), payload.into()).await?;
        Ok(())
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

//! Liveness responder on the health subject

use anyhow::Result;
use async_nats::Client;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const SERVICE_NAME: &str = "Fraud Decision Engine";

/// Body of a health reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    pub advisory_enabled: bool,
    pub timestamp: DateTime<Utc>,
}

impl HealthStatus {
    pub fn healthy(advisory_enabled: bool) -> Self {
        Self {
            status: "healthy".to_string(),
            service: SERVICE_NAME.to_string(),
            advisory_enabled,
            timestamp: Utc::now(),
        }
    }
}

/// Answers every request on the health subject with a `HealthStatus`
pub struct HealthResponder {
    client: Client,
    subject: String,
    advisory_enabled: bool,
}

impl HealthResponder {
    pub fn new(client: Client, subject: &str, advisory_enabled: bool) -> Self {
        Self {
            client,
            subject: subject.to_string(),
            advisory_enabled,
        }
    }

    /// Serve health requests until the subscription closes
    pub async fn run(self) -> Result<()> {
        let mut subscription = self.client.subscribe(self.subject.clone()).await?;
        info!(subject = %self.subject, "Health responder listening");

        while let Some(message) = subscription.next().await {
            let Some(reply_to) = message.reply else {
                continue;
            };

            let payload = serde_json::to_vec(&HealthStatus::healthy(self.advisory_enabled))?;
            if let Err(e) = self.client.publish(reply_to, payload.into()).await {
                warn!(error = %e, "Failed to answer health request");
            }
        }

        Ok(())
    }
}

//! Append-only persistence of analyzed transactions and their predictions

use crate::config::StorageConfig;
use crate::types::prediction::Prediction;
use crate::types::transaction::Transaction;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

const CREATE_TRANSACTIONS: &str = r#"
CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    transaction_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    amount REAL NOT NULL,
    transaction_type TEXT NOT NULL,
    merchant TEXT,
    location TEXT,
    timestamp TEXT NOT NULL,
    metadata TEXT NOT NULL
)
"#;

const CREATE_FRAUD_ANALYSIS: &str = r#"
CREATE TABLE IF NOT EXISTS fraud_analysis (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    transaction_id TEXT NOT NULL,
    is_fraud INTEGER NOT NULL,
    confidence_score REAL NOT NULL,
    risk_factors TEXT NOT NULL,
    agent_votes TEXT NOT NULL,
    processing_time_ms INTEGER NOT NULL,
    analyzed_at TEXT NOT NULL
)
"#;

/// Write-only sink for analysis results.
///
/// Records are appended; nothing is ever updated in place.
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    async fn record(&self, transaction: &Transaction, prediction: &Prediction) -> Result<()>;
}

/// SQLite-backed analysis store
pub struct SqliteAnalysisStore {
    pool: SqlitePool,
}

impl SqliteAnalysisStore {
    /// Open (creating if needed) the database and ensure the schema exists
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)
            .with_context(|| format!("Invalid database URL {}", config.database_url))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database {}", config.database_url))?;

        let store = Self { pool };
        store.create_tables().await?;

        info!(database_url = %config.database_url, "Analysis store ready");
        Ok(store)
    }

    async fn create_tables(&self) -> Result<()> {
        for statement in [CREATE_TRANSACTIONS, CREATE_FRAUD_ANALYSIS] {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to create tables")?;
        }
        Ok(())
    }
}

#[async_trait]
impl AnalysisStore for SqliteAnalysisStore {
    async fn record(&self, transaction: &Transaction, prediction: &Prediction) -> Result<()> {
        let metadata = serde_json::to_string(&transaction.metadata.clone().unwrap_or_default())?;
        let risk_factors = serde_json::to_string(&prediction.risk_factors)?;
        let agent_votes = serde_json::to_string(&prediction.agent_votes)?;
        let processing_time_ms = i64::try_from(prediction.processing_time_ms).unwrap_or(i64::MAX);

        let mut db_tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO transactions \
             (transaction_id, user_id, amount, transaction_type, merchant, location, timestamp, metadata) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&transaction.transaction_id)
        .bind(&transaction.user_id)
        .bind(transaction.amount)
        .bind(transaction.transaction_type.as_str())
        .bind(&transaction.merchant)
        .bind(&transaction.location)
        .bind(transaction.timestamp)
        .bind(&metadata)
        .execute(&mut *db_tx)
        .await
        .context("Failed to insert transaction")?;

        sqlx::query(
            "INSERT INTO fraud_analysis \
             (transaction_id, is_fraud, confidence_score, risk_factors, agent_votes, processing_time_ms, analyzed_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&prediction.transaction_id)
        .bind(prediction.is_fraud)
        .bind(prediction.confidence_score)
        .bind(&risk_factors)
        .bind(&agent_votes)
        .bind(processing_time_ms)
        .bind(Utc::now())
        .execute(&mut *db_tx)
        .await
        .context("Failed to insert fraud analysis")?;

        db_tx.commit().await?;

        debug!(transaction_id = %prediction.transaction_id, "Analysis persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::transaction::TransactionType;
    use std::collections::BTreeMap;

    async fn memory_store() -> SqliteAnalysisStore {
        SqliteAnalysisStore::connect(&StorageConfig {
            enabled: true,
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
        })
        .await
        .unwrap()
    }

    fn prediction(transaction_id: &str) -> Prediction {
        let mut agent_votes = BTreeMap::new();
        agent_votes.insert("fallback".to_string(), true);
        Prediction {
            transaction_id: transaction_id.to_string(),
            is_fraud: true,
            confidence_score: 0.6,
            risk_factors: vec!["High amount transaction".to_string()],
            agent_votes,
            processing_time_ms: 4,
        }
    }

    async fn count(store: &SqliteAnalysisStore, table: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&store.pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_record_persists_both_rows() {
        let store = memory_store().await;
        let tx = Transaction::new("tx_1", "user_123", 15000.0, TransactionType::Purchase)
            .with_merchant("Online Store")
            .with_metadata("device", serde_json::json!("mobile"));

        store.record(&tx, &prediction("tx_1")).await.unwrap();

        assert_eq!(count(&store, "transactions").await, 1);
        assert_eq!(count(&store, "fraud_analysis").await, 1);

        let (risk_factors, agent_votes): (String, String) = sqlx::query_as(
            "SELECT risk_factors, agent_votes FROM fraud_analysis WHERE transaction_id = ?",
        )
        .bind("tx_1")
        .fetch_one(&store.pool)
        .await
        .unwrap();

        assert_eq!(risk_factors, r#"["High amount transaction"]"#);
        assert_eq!(agent_votes, r#"{"fallback":true}"#);
    }

    #[tokio::test]
    async fn test_repeated_analysis_is_appended() {
        let store = memory_store().await;
        let tx = Transaction::new("tx_1", "user_123", 100.0, TransactionType::Deposit);

        store.record(&tx, &prediction("tx_1")).await.unwrap();
        store.record(&tx, &prediction("tx_1")).await.unwrap();

        assert_eq!(count(&store, "fraud_analysis").await, 2);
    }

    #[tokio::test]
    async fn test_unopenable_database_rejected() {
        let result = SqliteAnalysisStore::connect(&StorageConfig {
            enabled: true,
            database_url: "sqlite:///nonexistent-fraud-dir/nested/fraud.db".to_string(),
            max_connections: 1,
        })
        .await;

        assert!(result.is_err());
    }
}

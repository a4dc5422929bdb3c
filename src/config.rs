//! Configuration management for the fraud decision engine

use anyhow::{ensure, Context, Result};
use config::{Config, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default location of the TOML configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Default bound on one advisory deliberation, in milliseconds.
///
/// A panel makes one model call per facet plus one for the aggregator, which
/// does not fit the 500 ms response budget some deployments set through
/// `MAX_RESPONSE_TIME`. Such a setting is honored, but then nearly every
/// analysis takes the rule-based path.
pub const DEFAULT_ADVISORY_TIMEOUT_MS: u64 = 5000;

/// Environment variables that override individual keys, applied last
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("FRAUD_THRESHOLD", "detection.threshold"),
    ("MAX_RESPONSE_TIME", "advisory.timeout_ms"),
    ("OLLAMA_URL", "advisory.ollama_url"),
    ("OLLAMA_MODEL", "advisory.model"),
    ("DATABASE_URL", "storage.database_url"),
    ("NATS_URL", "nats.url"),
];

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub detection: DetectionConfig,
    pub advisory: AdvisoryConfig,
    pub storage: StorageConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming transactions
    pub transaction_subject: String,
    /// Subject every analysis response is published to
    pub decision_subject: String,
    /// Subject answered by the health responder
    pub health_subject: String,
}

/// Decision configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Confidence at or above which a prediction is declined or reviewed
    pub threshold: f64,
}

/// LLM advisory panel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisoryConfig {
    /// When false, every analysis uses the rule-based scorer
    pub enabled: bool,
    /// Base URL of the Ollama server
    pub ollama_url: String,
    /// Model name passed to Ollama
    pub model: String,
    /// Upper bound for one full panel deliberation, in milliseconds
    pub timeout_ms: u64,
}

/// Persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub enabled: bool,
    /// sqlx connection string, e.g. `sqlite://fraud_detection.db`
    pub database_url: String,
    pub max_connections: u32,
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum number of transactions analyzed concurrently
    pub workers: usize,
    /// Seconds between metrics summaries (0 disables the reporter)
    pub metrics_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from the default file plus environment overrides
    pub fn load() -> Result<Self> {
        let path = std::env::var("FRAUD_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path plus environment overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Layer defaults, the optional file at `path`, then the variables
    /// resolved through `env`.
    pub fn load_with_env<P, F>(path: P, env: F) -> Result<Self>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let defaults =
            Config::try_from(&AppConfig::default()).context("Failed to encode default configuration")?;

        let mut builder = Config::builder()
            .add_source(defaults)
            .add_source(File::from(path.as_ref()).required(false));

        for &(var, key) in ENV_OVERRIDES {
            builder = builder
                .set_override_option(key, env(var))
                .with_context(|| format!("Failed to apply {} override", var))?;
        }

        let config: AppConfig = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot operate with
    pub fn validate(&self) -> Result<()> {
        ensure!(
            (0.0..=1.0).contains(&self.detection.threshold),
            "detection.threshold must be within [0, 1], got {}",
            self.detection.threshold
        );
        ensure!(self.pipeline.workers > 0, "pipeline.workers must be at least 1");
        ensure!(
            self.advisory.timeout_ms > 0,
            "advisory.timeout_ms must be greater than 0"
        );
        ensure!(
            self.storage.max_connections > 0,
            "storage.max_connections must be at least 1"
        );
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                transaction_subject: "transactions".to_string(),
                decision_subject: "fraud.decisions".to_string(),
                health_subject: "fraud.health".to_string(),
            },
            detection: DetectionConfig { threshold: 0.7 },
            advisory: AdvisoryConfig {
                enabled: true,
                ollama_url: "http://localhost:11434".to_string(),
                model: "llama2".to_string(),
                timeout_ms: DEFAULT_ADVISORY_TIMEOUT_MS,
            },
            storage: StorageConfig {
                enabled: true,
                database_url: "sqlite://fraud_detection.db".to_string(),
                max_connections: 4,
            },
            pipeline: PipelineConfig {
                workers: 4,
                metrics_interval_secs: 30,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.detection.threshold, 0.7);
        assert_eq!(config.advisory.model, "llama2");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load_with_env("does/not/exist.toml", no_env).unwrap();
        assert_eq!(config.detection.threshold, 0.7);
        assert_eq!(config.pipeline.workers, 4);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("fraud-config-{}.toml", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[detection]\nthreshold = 0.5\n\n[pipeline]\nworkers = 8").unwrap();

        let config = AppConfig::load_with_env(&path, no_env).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.detection.threshold, 0.5);
        assert_eq!(config.pipeline.workers, 8);
        // Untouched sections keep their defaults
        assert_eq!(config.advisory.timeout_ms, DEFAULT_ADVISORY_TIMEOUT_MS);
    }

    #[test]
    fn test_response_budget_override() {
        let config = AppConfig::load_with_env("does/not/exist.toml", |key| {
            (key == "MAX_RESPONSE_TIME").then(|| "500".to_string())
        })
        .unwrap();

        assert_eq!(DEFAULT_ADVISORY_TIMEOUT_MS, 5000);
        assert_eq!(config.advisory.timeout_ms, 500);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("FRAUD_THRESHOLD", "0.55"),
            ("MAX_RESPONSE_TIME", "750"),
            ("OLLAMA_MODEL", "mistral"),
        ]
        .into_iter()
        .collect();

        let config = AppConfig::load_with_env("does/not/exist.toml", |key| {
            vars.get(key).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(config.detection.threshold, 0.55);
        assert_eq!(config.advisory.timeout_ms, 750);
        assert_eq!(config.advisory.model, "mistral");
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let result = AppConfig::load_with_env("does/not/exist.toml", |key| {
            (key == "FRAUD_THRESHOLD").then(|| "1.5".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = AppConfig::default();
        config.pipeline.workers = 0;
        assert!(config.validate().is_err());
    }
}

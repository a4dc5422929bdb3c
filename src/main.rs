//! Fraud Decision Engine - Main Entry Point
//!
//! Consumes transactions from NATS, scores them through the advisory panel or
//! the rule-based fallback, and publishes one decision per transaction.

use anyhow::Result;
use async_nats::Message;
use fraud_decision_engine::{
    advisory::AdvisoryPanel,
    config::{AppConfig, LoggingConfig},
    consumer::{parse_transaction, TransactionConsumer},
    engine::DecisionEngine,
    error::EngineError,
    health::HealthResponder,
    metrics::{DecisionMetrics, MetricsReporter},
    producer::DecisionProducer,
    store::{AnalysisStore, SqliteAnalysisStore},
    types::ErrorResponse,
};
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration (optional path as first argument)
    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };

    init_logging(&config.logging)?;

    info!("Starting Fraud Decision Engine");
    info!("Fraud threshold set to: {}", config.detection.threshold);

    let metrics = Arc::new(DecisionMetrics::new());

    let mut engine = DecisionEngine::new(&config);

    if config.storage.enabled {
        match SqliteAnalysisStore::connect(&config.storage).await {
            Ok(store) => {
                let store: Arc<dyn AnalysisStore> = Arc::new(store);
                engine = engine.with_store(store);
            }
            Err(e) => {
                warn!(error = %e, "Analysis store unavailable, running without persistence");
            }
        }
    }

    if config.advisory.enabled {
        let panel = AdvisoryPanel::with_ollama(&config.advisory).with_metrics(metrics.clone());
        info!(
            model = %config.advisory.model,
            timeout_ms = config.advisory.timeout_ms,
            "Advisory panel enabled: {:?}",
            panel.evaluator_names()
        );
        engine = engine.with_advisory(panel);
    } else {
        info!("Advisory panel disabled, using rule-based scoring only");
    }

    let engine = Arc::new(engine);

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = TransactionConsumer::new(client.clone(), &config.nats.transaction_subject);
    let producer = Arc::new(DecisionProducer::new(
        client.clone(),
        &config.nats.decision_subject,
    ));

    let health = HealthResponder::new(
        client.clone(),
        &config.nats.health_subject,
        engine.has_advisory(),
    );
    tokio::spawn(async move {
        if let Err(e) = health.run().await {
            error!(error = %e, "Health responder stopped");
        }
    });

    if config.pipeline.metrics_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.pipeline.metrics_interval_secs);
        tokio::spawn(reporter.start());
    }

    let num_workers = config.pipeline.workers;
    info!(
        "Starting transaction processing loop with {} parallel workers",
        num_workers
    );
    info!("Listening on subject: {}", consumer.subject());
    info!("Publishing decisions to: {}", producer.subject());

    // Semaphore to limit concurrent analyses
    let semaphore = Arc::new(Semaphore::new(num_workers));
    let processed_count = Arc::new(AtomicU64::new(0));

    let mut subscription = consumer.subscribe().await?;

    loop {
        let message = tokio::select! {
            message = subscription.next() => match message {
                Some(message) => message,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        };

        let permit = semaphore.clone().acquire_owned().await?;

        let engine = engine.clone();
        let producer = producer.clone();
        let metrics = metrics.clone();
        let processed_count = processed_count.clone();

        tokio::spawn(async move {
            handle_message(message, engine, &producer, &metrics).await;

            let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
            if count % 100 == 0 {
                let processing_stats = metrics.get_processing_stats();
                info!(
                    processed = count,
                    throughput = format!("{:.1} tx/s", metrics.get_throughput()),
                    avg_latency_us = processing_stats.mean_us,
                    "Processing milestone"
                );
            }

            drop(permit);
        });
    }

    // Wait for in-flight analyses
    let _drained = semaphore.acquire_many(num_workers as u32).await?;

    info!("Engine shutting down...");
    metrics.print_summary();

    Ok(())
}

/// Analyze one message and deliver the outcome
async fn handle_message(
    message: Message,
    engine: Arc<DecisionEngine>,
    producer: &DecisionProducer,
    metrics: &DecisionMetrics,
) {
    let start = Instant::now();
    let reply_to = message.reply.as_ref();

    let result = match parse_transaction(&message.payload) {
        // A panic while scoring surfaces as an analysis failure
        Ok(transaction) => {
            match tokio::spawn(async move { engine.evaluate(&transaction).await }).await {
                Ok(result) => result,
                Err(e) => Err(EngineError::analysis(e.to_string())),
            }
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(response) => {
            metrics.record_analysis(start.elapsed(), &response.prediction);
            metrics.record_action(response.action);

            if let Err(e) = producer.reply(reply_to, &response).await {
                error!(
                    transaction_id = %response.transaction_id,
                    error = %e,
                    "Failed to reply with decision"
                );
            }
            if let Err(e) = producer.publish(&response).await {
                error!(
                    transaction_id = %response.transaction_id,
                    error = %e,
                    "Failed to publish decision"
                );
            }

            debug!(
                transaction_id = %response.transaction_id,
                processing_time_us = start.elapsed().as_micros(),
                "Transaction processed"
            );
        }
        Err(e) => {
            if matches!(e, EngineError::Validation(_)) {
                metrics.record_validation_failure();
            }
            warn!(error = %e, "Transaction rejected");

            if let Err(e) = producer.reply_error(reply_to, &ErrorResponse::from(&e)).await {
                error!(error = %e, "Failed to reply with error");
            }
        }
    }
}

fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!("fraud_decision_engine={}", config.level))?,
    };

    match config.format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        _ => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    Ok(())
}

//! Test Transaction Producer
//!
//! Generates and publishes test transactions to NATS for engine testing.
//! Pass `--quick-test` to send the canned high-value purchase as a request and
//! print the decision that comes back.

use fraud_decision_engine::types::{AnalysisRequest, Transaction, TransactionType};
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

const MERCHANTS: &[&str] = &[
    "Corner Grocery",
    "City Coffee",
    "Fuel Express",
    "Online Store",
    "Book Nook",
    "Pharmacy Plus",
];

const LOCATIONS: &[&str] = &[
    "New York, NY",
    "Chicago, IL",
    "Austin, TX",
    "Seattle, WA",
    "Miami, FL",
];

/// The sample used for a quick end-to-end check
fn quick_test_transaction() -> Transaction {
    Transaction::new(
        format!("tx_{}", uuid::Uuid::new_v4().simple()),
        "user_123",
        15000.0,
        TransactionType::Purchase,
    )
    .with_merchant("Online Store")
    .with_location("New York, NY")
    .with_metadata("device", serde_json::json!("mobile"))
    .with_metadata("ip", serde_json::json!("192.168.1.1"))
}

/// Transaction generator for testing
struct TransactionGenerator {
    rng: rand::rngs::ThreadRng,
    transaction_counter: u64,
}

impl TransactionGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            transaction_counter: 0,
        }
    }

    /// Everyday purchase well below every rule threshold
    fn generate_legitimate(&mut self) -> Transaction {
        let amount = (self.rng.gen_range(5.0..800.0_f64) * 100.0).round() / 100.0;
        let transaction_type = if self.rng.gen_bool(0.8) {
            TransactionType::Purchase
        } else {
            TransactionType::Deposit
        };

        self.base(amount, transaction_type)
    }

    /// High-value or round-number movement that trips the fallback rules
    fn generate_suspicious(&mut self) -> Transaction {
        let amount = if self.rng.gen_bool(0.5) {
            self.rng.gen_range(10_001.0..50_000.0_f64).round()
        } else {
            self.rng.gen_range(5..10) as f64 * 1000.0
        };
        let transaction_type = *self.random_choice(&[
            TransactionType::Transfer,
            TransactionType::Withdrawal,
            TransactionType::Purchase,
        ]);

        let ip = format!(
            "{}.{}.{}.{}",
            self.rng.gen_range(1..255),
            self.rng.gen_range(0..255),
            self.rng.gen_range(0..255),
            self.rng.gen_range(1..255)
        );

        self.base(amount, transaction_type)
            .with_metadata("device", serde_json::json!("unknown"))
            .with_metadata("ip", serde_json::json!(ip))
    }

    fn base(&mut self, amount: f64, transaction_type: TransactionType) -> Transaction {
        self.transaction_counter += 1;

        let user_id = format!("user_{}", self.rng.gen_range(1..500));
        let merchant = *self.random_choice(MERCHANTS);
        let location = *self.random_choice(LOCATIONS);

        Transaction::new(
            format!("tx_{:012}", self.transaction_counter),
            user_id,
            amount,
            transaction_type,
        )
        .with_merchant(merchant)
        .with_location(location)
    }

    fn random_choice<'a, T>(&mut self, choices: &'a [T]) -> &'a T {
        &choices[self.rng.gen_range(0..choices.len())]
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_producer=info".parse()?),
        )
        .init();

    info!("Starting Test Transaction Producer");

    let mut args: Vec<String> = std::env::args().collect();
    let quick_test = args.iter().any(|arg| arg == "--quick-test");
    args.retain(|arg| arg != "--quick-test");

    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("transactions");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let fraud_rate: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.1);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        fraud_rate = fraud_rate,
        delay_ms = delay_ms,
        quick_test = quick_test,
        "Configuration loaded"
    );

    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, fraud_rate, delay_ms).await;
        }
    };

    if quick_test {
        return run_quick_test(&client, subject).await;
    }

    let mut generator = TransactionGenerator::new();
    let mut rng = rand::thread_rng();

    info!("Starting to publish {} transactions...", count);

    let mut legitimate_count = 0;
    let mut suspicious_count = 0;

    for i in 0..count {
        let transaction = if rng.gen_bool(fraud_rate) {
            suspicious_count += 1;
            generator.generate_suspicious()
        } else {
            legitimate_count += 1;
            generator.generate_legitimate()
        };

        let payload = serde_json::to_vec(&transaction)?;

        client.publish(subject.to_string(), payload.into()).await?;

        if (i + 1) % 10 == 0 {
            info!(
                "Published {}/{} transactions ({} legitimate, {} suspicious)",
                i + 1,
                count,
                legitimate_count,
                suspicious_count
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! Published {} transactions ({} legitimate, {} suspicious)",
        count, legitimate_count, suspicious_count
    );

    Ok(())
}

/// Send the canned sample as a request and print the engine's answer
async fn run_quick_test(client: &async_nats::Client, subject: &str) -> anyhow::Result<()> {
    let request = AnalysisRequest {
        transaction: quick_test_transaction(),
    };
    let payload = serde_json::to_vec(&request)?;

    info!(
        transaction_id = %request.transaction.transaction_id,
        "Sending quick-test transaction"
    );

    let reply = client.request(subject.to_string(), payload.into()).await?;
    let body: serde_json::Value = serde_json::from_slice(&reply.payload)?;

    info!("Decision:\n{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

async fn run_dry_mode(count: u64, fraud_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = TransactionGenerator::new();
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let transaction = if rng.gen_bool(fraud_rate) {
            generator.generate_suspicious()
        } else {
            generator.generate_legitimate()
        };

        let json = serde_json::to_string_pretty(&transaction)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample transaction {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}

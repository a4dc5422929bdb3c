//! Decision statistics for the fraud decision engine.

use crate::types::prediction::{Action, Prediction};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector shared by all workers
pub struct DecisionMetrics {
    /// Total predictions produced
    pub analyses_processed: AtomicU64,
    /// Predictions produced by the rule-based fallback
    pub fallbacks: AtomicU64,
    /// Requests rejected before scoring
    pub validation_failures: AtomicU64,
    actions: RwLock<HashMap<Action, u64>>,
    /// Analysis times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Per-evaluator latency (in microseconds)
    evaluator_times: RwLock<HashMap<String, Vec<u64>>>,
    /// Confidence score distribution buckets
    confidence_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
}

impl DecisionMetrics {
    pub fn new() -> Self {
        Self {
            analyses_processed: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
            validation_failures: AtomicU64::new(0),
            actions: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            evaluator_times: RwLock::new(HashMap::new()),
            confidence_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a produced prediction
    pub fn record_analysis(&self, processing_time: Duration, prediction: &Prediction) {
        self.analyses_processed.fetch_add(1, Ordering::Relaxed);

        if prediction.is_fallback() {
            self.fallbacks.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Bound memory: keep the most recent half once full
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        let bucket = (prediction.confidence_score.clamp(0.0, 1.0) * 10.0).min(9.0) as usize;
        if let Ok(mut buckets) = self.confidence_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Record the action the policy gate chose
    pub fn record_action(&self, action: Action) {
        if let Ok(mut actions) = self.actions.write() {
            *actions.entry(action).or_insert(0) += 1;
        }
    }

    pub fn record_validation_failure(&self) {
        self.validation_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one evaluator call, successful or not
    pub fn record_evaluator_time(&self, evaluator: &str, duration: Duration) {
        if let Ok(mut times) = self.evaluator_times.write() {
            let evaluator_times = times.entry(evaluator.to_string()).or_default();
            evaluator_times.push(duration.as_micros() as u64);
            if evaluator_times.len() > 1000 {
                evaluator_times.drain(0..500);
            }
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let sorted = match self.processing_times.read() {
            Ok(times) if !times.is_empty() => {
                let mut sorted = times.clone();
                sorted.sort_unstable();
                sorted
            }
            _ => return ProcessingStats::default(),
        };

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[percentile_index(count, 0.95)],
            p99_us: sorted[percentile_index(count, 0.99)],
            max_us: sorted[count - 1],
        }
    }

    /// Get per-evaluator latency statistics
    pub fn get_evaluator_stats(&self) -> HashMap<String, EvaluatorStats> {
        let Ok(times) = self.evaluator_times.read() else {
            return HashMap::new();
        };

        times
            .iter()
            .filter(|(_, samples)| !samples.is_empty())
            .map(|(evaluator, samples)| {
                let mut sorted = samples.clone();
                sorted.sort_unstable();
                let count = sorted.len();

                (
                    evaluator.clone(),
                    EvaluatorStats {
                        calls: count as u64,
                        mean_us: sorted.iter().sum::<u64>() / count as u64,
                        p50_us: sorted[count / 2],
                        p99_us: sorted[percentile_index(count, 0.99)],
                    },
                )
            })
            .collect()
    }

    /// Share of predictions produced by the fallback path (0.0 - 1.0)
    pub fn get_fallback_rate(&self) -> f64 {
        let total = self.analyses_processed.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        self.fallbacks.load(Ordering::Relaxed) as f64 / total as f64
    }

    /// Get current throughput (analyses per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.analyses_processed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_confidence_distribution(&self) -> [u64; 10] {
        self.confidence_buckets
            .read()
            .map(|buckets| *buckets)
            .unwrap_or([0; 10])
    }

    pub fn get_action_count(&self, action: Action) -> u64 {
        self.actions
            .read()
            .ok()
            .and_then(|actions| actions.get(&action).copied())
            .unwrap_or(0)
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let total = self.analyses_processed.load(Ordering::Relaxed);
        let processing = self.get_processing_stats();

        info!("==================== FRAUD DECISION ENGINE SUMMARY ====================");
        info!(
            "Analyses: {}  |  Throughput: {:.1}/s  |  Rejected (invalid): {}",
            total,
            self.get_throughput(),
            self.validation_failures.load(Ordering::Relaxed)
        );
        info!(
            "Fallback rate: {:.1}%  ({} rule-based verdicts)",
            self.get_fallback_rate() * 100.0,
            self.fallbacks.load(Ordering::Relaxed)
        );
        info!(
            "Processing time (us): mean={} p50={} p95={} p99={} max={}",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us, processing.max_us
        );

        for action in [Action::Approve, Action::Review, Action::Decline] {
            let count = self.get_action_count(action);
            let pct = if total > 0 {
                count as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            info!("  {:8}: {:>6} ({:>5.1}%)", action, count, pct);
        }

        info!("Confidence distribution:");
        let distribution = self.get_confidence_distribution();
        let bucket_total: u64 = distribution.iter().sum();
        for (i, &count) in distribution.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let pct = count as f64 / bucket_total as f64 * 100.0;
            info!(
                "  {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                "#".repeat(((pct / 5.0) as usize).min(20))
            );
        }

        let evaluator_stats = self.get_evaluator_stats();
        if !evaluator_stats.is_empty() {
            info!("Evaluator latency (us):");
            for (evaluator, stats) in &evaluator_stats {
                info!(
                    "  {}: mean={} p50={} p99={} (calls={})",
                    evaluator, stats.mean_us, stats.p50_us, stats.p99_us, stats.calls
                );
            }
        }
        info!("=======================================================================");
    }
}

impl Default for DecisionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn percentile_index(count: usize, quantile: f64) -> usize {
    ((count as f64 * quantile) as usize).min(count - 1)
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Evaluator-specific statistics
#[derive(Debug)]
pub struct EvaluatorStats {
    pub calls: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p99_us: u64,
}

/// Periodic summary printer
pub struct MetricsReporter {
    metrics: Arc<DecisionMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<DecisionMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

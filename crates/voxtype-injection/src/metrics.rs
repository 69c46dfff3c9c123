//! # Metrics for the text injection crate.
//!
//! Lightweight per-strategy counters and latency aggregates fed by the
//! orchestrator. Recording only: the strategy order is fixed per request and
//! is never re-ranked from these numbers.

use std::collections::HashMap;

use crate::error::InjectionError;
use crate::types::StrategyId;

/// Keep the last N latency samples per strategy for rough percentile views.
const LATENCY_SAMPLES_CAPACITY: usize = 64;

/// Performance counters for a single strategy.
#[derive(Default, Clone, Debug)]
pub struct StrategyMetrics {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub sum_latency_ms: f64,
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,
    /// Bounded reservoir of the most recent latency samples.
    pub samples_ms: Vec<f64>,
}

impl StrategyMetrics {
    pub fn mean_latency_ms(&self) -> f64 {
        let completed = self.successes + self.failures;
        if completed == 0 {
            0.0
        } else {
            self.sum_latency_ms / completed as f64
        }
    }
}

/// Aggregate metrics for the whole injection system.
#[derive(Default, Clone, Debug)]
pub struct InjectionMetrics {
    /// Total injection attempts initiated (per strategy, not per request).
    pub total_attempts: u64,
    /// Total successful injections.
    pub total_successes: u64,
    /// Failure counts keyed by error kind.
    pub failures_by_kind: HashMap<String, u64>,
    /// Per-strategy breakdown.
    pub strategy_metrics: HashMap<StrategyId, StrategyMetrics>,
}

/// Sink receiving injection metrics, so the core can emit without being tied
/// to one aggregation backend.
pub trait MetricsSink: Send {
    /// Called when an attempt on a strategy starts.
    fn emit_start(&mut self, strategy: StrategyId);

    /// Called when a strategy successfully completes an injection.
    fn emit_success(&mut self, strategy: StrategyId, latency_ms: f64);

    /// Called when a strategy fails an injection attempt.
    fn emit_fail(&mut self, strategy: StrategyId, latency_ms: f64, err: &InjectionError);
}

impl MetricsSink for InjectionMetrics {
    fn emit_start(&mut self, strategy: StrategyId) {
        self.total_attempts += 1;
        self.strategy_metrics.entry(strategy).or_default().attempts += 1;
    }

    fn emit_success(&mut self, strategy: StrategyId, latency_ms: f64) {
        self.total_successes += 1;
        let sm = self.strategy_metrics.entry(strategy).or_default();
        sm.successes += 1;
        sm.sum_latency_ms += latency_ms;

        if sm.min_latency_ms == 0.0 || latency_ms < sm.min_latency_ms {
            sm.min_latency_ms = latency_ms;
        }
        if latency_ms > sm.max_latency_ms {
            sm.max_latency_ms = latency_ms;
        }

        if sm.samples_ms.len() == LATENCY_SAMPLES_CAPACITY {
            sm.samples_ms.remove(0);
        }
        sm.samples_ms.push(latency_ms);
    }

    fn emit_fail(&mut self, strategy: StrategyId, latency_ms: f64, err: &InjectionError) {
        let sm = self.strategy_metrics.entry(strategy).or_default();
        sm.failures += 1;
        sm.sum_latency_ms += latency_ms;

        *self
            .failures_by_kind
            .entry(err.kind().to_string())
            .or_default() += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_updates_counters_and_samples() {
        let mut metrics = InjectionMetrics::default();
        metrics.emit_start(StrategyId::VirtualKeyboard);
        metrics.emit_success(StrategyId::VirtualKeyboard, 2.5);

        assert_eq!(metrics.total_attempts, 1);
        assert_eq!(metrics.total_successes, 1);
        let sm = &metrics.strategy_metrics[&StrategyId::VirtualKeyboard];
        assert_eq!(sm.successes, 1);
        assert_eq!(sm.samples_ms, vec![2.5]);
        assert!((sm.mean_latency_ms() - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn failures_aggregate_by_error_kind() {
        let mut metrics = InjectionMetrics::default();
        metrics.emit_start(StrategyId::Ydotool);
        metrics.emit_fail(
            StrategyId::Ydotool,
            12.0,
            &InjectionError::ToolNotFound { tool: "ydotool" },
        );
        metrics.emit_start(StrategyId::Ydotool);
        metrics.emit_fail(StrategyId::Ydotool, 3.0, &InjectionError::Timeout(3000));

        assert_eq!(metrics.failures_by_kind["ToolNotFound"], 1);
        assert_eq!(metrics.failures_by_kind["Timeout"], 1);
        assert_eq!(metrics.strategy_metrics[&StrategyId::Ydotool].failures, 2);
    }

    #[test]
    fn sample_reservoir_is_bounded() {
        let mut metrics = InjectionMetrics::default();
        for i in 0..(LATENCY_SAMPLES_CAPACITY + 10) {
            metrics.emit_success(StrategyId::Wtype, i as f64);
        }
        let sm = &metrics.strategy_metrics[&StrategyId::Wtype];
        assert_eq!(sm.samples_ms.len(), LATENCY_SAMPLES_CAPACITY);
        // Oldest samples dropped first.
        assert_eq!(sm.samples_ms[0], 10.0);
    }
}

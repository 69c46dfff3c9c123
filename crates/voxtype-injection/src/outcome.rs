//! # Outcome types for the text injection crate.
//!
//! One [`StrategyResult`] is recorded per strategy attempt; the ordered list
//! is returned inside [`InjectionOutcome`] for diagnostics even on success.

use serde::{Deserialize, Serialize};

use crate::types::StrategyId;

/// Result of a single strategy attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyResult {
    /// Which strategy was attempted.
    pub strategy: StrategyId,
    /// Whether the attempt delivered the text.
    pub success: bool,
    /// Wall-clock duration of the attempt in milliseconds.
    pub latency_ms: f64,
    /// Error description when the attempt failed.
    pub error: Option<String>,
}

/// The result of one full injection request.
///
/// `success == false` means every strategy, including the escalation chain,
/// failed; the caller must then surface the text to the user rather than
/// lose it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectionOutcome {
    pub success: bool,
    /// Attempt history in execution order. The last entry is the successful
    /// strategy when `success` is true.
    pub attempts: Vec<StrategyResult>,
}

impl InjectionOutcome {
    /// Outcome for an empty or whitespace-only request: success with zero
    /// attempts and zero observable side effects.
    pub fn noop() -> Self {
        Self {
            success: true,
            attempts: Vec::new(),
        }
    }

    /// The strategy that delivered the text, if any.
    pub fn winning_strategy(&self) -> Option<StrategyId> {
        self.attempts
            .iter()
            .find(|a| a.success)
            .map(|a| a.strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_outcome_has_no_attempts() {
        let outcome = InjectionOutcome::noop();
        assert!(outcome.success);
        assert!(outcome.attempts.is_empty());
        assert!(outcome.winning_strategy().is_none());
    }

    #[test]
    fn winning_strategy_is_first_success() {
        let outcome = InjectionOutcome {
            success: true,
            attempts: vec![
                StrategyResult {
                    strategy: StrategyId::VirtualKeyboard,
                    success: false,
                    latency_ms: 1.2,
                    error: Some("connection refused".into()),
                },
                StrategyResult {
                    strategy: StrategyId::ClipboardPaste,
                    success: true,
                    latency_ms: 48.0,
                    error: None,
                },
            ],
        };
        assert_eq!(outcome.winning_strategy(), Some(StrategyId::ClipboardPaste));
    }

    #[test]
    fn outcome_serializes_to_json() {
        let outcome = InjectionOutcome::noop();
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"success\":true"));
    }
}

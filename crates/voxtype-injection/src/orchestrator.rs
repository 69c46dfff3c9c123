//! # Strategy Orchestrator
//!
//! Consumes the capability report, attempts strategies in a fixed priority
//! order with per-attempt isolation, and escalates to the privileged chain
//! only after every polite strategy has failed. At most one injection runs
//! at a time per process; concurrent callers wait on the single-flight lock
//! so keystrokes never interleave and the clipboard snapshot is never
//! overwritten mid-cycle.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::detection::CapabilityDetector;
use crate::error::InjectionError;
use crate::metrics::{InjectionMetrics, MetricsSink};
use crate::outcome::{InjectionOutcome, StrategyResult};
use crate::types::{redact_text, InjectionConfig, InjectionRequest, StrategyId};
use crate::TextInjector;

/// Orchestrates ranked injection strategies for one process.
pub struct StrategyOrchestrator {
    config: InjectionConfig,
    detector: Arc<CapabilityDetector>,
    /// Boxed strategies in fixed priority order. Built once from the
    /// detection report; never re-ranked from runtime outcomes.
    injectors: Vec<Box<dyn TextInjector>>,
    /// Single-flight lock serializing `inject` calls.
    flight: tokio::sync::Mutex<()>,
    metrics: Arc<Mutex<InjectionMetrics>>,
}

impl StrategyOrchestrator {
    /// Build an orchestrator from the detector's capability report.
    pub async fn new(config: InjectionConfig, detector: Arc<CapabilityDetector>) -> Self {
        let report = detector.detect().await;
        let injectors = Self::build_strategy_chain(&config, &report.profile.preferred_order, |s| {
            report.is_available(s)
        });

        let names: Vec<&str> = injectors.iter().map(|i| i.backend_name()).collect();
        info!(strategies = ?names, "strategy chain assembled");
        if injectors.is_empty() {
            warn!("no injection strategy available in this environment");
        }

        Self {
            config,
            detector,
            injectors,
            flight: tokio::sync::Mutex::new(()),
            metrics: Arc::new(Mutex::new(InjectionMetrics::default())),
        }
    }

    /// Instantiate injectors for the preferred order, keeping only strategies
    /// the detector reported as available, then append the escalation chain.
    fn build_strategy_chain(
        config: &InjectionConfig,
        preferred_order: &[StrategyId],
        available: impl Fn(StrategyId) -> bool,
    ) -> Vec<Box<dyn TextInjector>> {
        let mut chain: Vec<Box<dyn TextInjector>> = Vec::new();

        for &strategy in preferred_order {
            if !available(strategy) {
                continue;
            }
            if let Some(injector) = Self::instantiate(config, strategy) {
                chain.push(injector);
            }
        }

        // Privileged escalation always ranks last.
        if available(StrategyId::UnsafeEscalation) {
            if let Some(injector) = Self::instantiate(config, StrategyId::UnsafeEscalation) {
                chain.push(injector);
            }
        }

        chain
    }

    #[allow(unused_variables)]
    fn instantiate(config: &InjectionConfig, strategy: StrategyId) -> Option<Box<dyn TextInjector>> {
        match strategy {
            #[cfg(feature = "wayland-vk")]
            StrategyId::VirtualKeyboard => Some(Box::new(
                crate::virtual_keyboard::VirtualKeyboardClient::new(config.clone()),
            )),
            #[cfg(feature = "wl_clipboard")]
            StrategyId::ClipboardPaste => Some(Box::new(
                crate::clipboard_paste_injector::ClipboardPasteInjector::new(config.clone()),
            )),
            #[cfg(feature = "wtype")]
            StrategyId::Wtype => Some(Box::new(crate::wtype_injector::WtypeInjector::new(
                config.clone(),
            ))),
            #[cfg(feature = "ydotool")]
            StrategyId::Ydotool => Some(Box::new(crate::ydotool_injector::YdotoolInjector::new(
                config.clone(),
            ))),
            #[cfg(feature = "xdotool")]
            StrategyId::Xdotool => Some(Box::new(crate::xdotool_injector::XdotoolInjector::new(
                config.clone(),
            ))),
            #[cfg(feature = "enigo")]
            StrategyId::Enigo => Some(Box::new(crate::enigo_injector::EnigoInjector::new(
                config.clone(),
            ))),
            #[cfg(feature = "unsafe-escalation")]
            StrategyId::UnsafeEscalation => Some(Box::new(
                crate::unsafe_escalation::UnsafeEscalation::new(config.clone()),
            )),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    /// Outer guard for one strategy attempt. The native client bounds itself
    /// (its only slow phase is the lazy connect); everything else gets an
    /// attempt-local timeout on top of its internal one.
    fn attempt_budget(&self, strategy: StrategyId) -> Option<Duration> {
        match strategy {
            StrategyId::VirtualKeyboard => None,
            StrategyId::UnsafeEscalation => {
                Some(Duration::from_millis(self.config.escalation_timeout_ms + 500))
            }
            _ => Some(Duration::from_millis(self.config.per_tool_timeout_ms + 500)),
        }
    }

    /// Deliver one request to the focused window.
    ///
    /// Strategies run strictly sequentially in their fixed order; the first
    /// success short-circuits. The full attempt history is returned even on
    /// success. A total failure reports `success: false` with one result per
    /// attempted strategy; the caller must then surface the text to the user
    /// rather than lose it.
    pub async fn inject(&self, request: &InjectionRequest) -> InjectionOutcome {
        let text = request.text.as_str();

        // Empty or whitespace-only text is a no-op with zero side effects.
        if text.trim().is_empty() {
            return InjectionOutcome::noop();
        }

        let _guard = self.flight.lock().await;

        debug!(
            text = %redact_text(text, self.config.redact_logs),
            strategies = self.injectors.len(),
            "injection started"
        );

        let mut attempts = Vec::new();

        for injector in &self.injectors {
            let strategy = injector.strategy_id();

            if !injector.is_available().await {
                debug!(%strategy, "strategy unavailable at attempt time, skipping");
                attempts.push(StrategyResult {
                    strategy,
                    success: false,
                    latency_ms: 0.0,
                    error: Some("unavailable at attempt time".to_string()),
                });
                continue;
            }

            if let Ok(mut m) = self.metrics.lock() {
                m.emit_start(strategy);
            }

            let start = Instant::now();
            let result = match self.attempt_budget(strategy) {
                Some(budget) => match tokio::time::timeout(budget, injector.inject_text(text)).await
                {
                    Ok(inner) => inner,
                    Err(_) => Err(InjectionError::Timeout(budget.as_millis() as u64)),
                },
                None => injector.inject_text(text).await,
            };
            let latency_ms = start.elapsed().as_secs_f64() * 1_000.0;

            match result {
                Ok(()) => {
                    if let Ok(mut m) = self.metrics.lock() {
                        m.emit_success(strategy, latency_ms);
                    }
                    info!(
                        %strategy,
                        latency_ms,
                        attempt = attempts.len() + 1,
                        chars = text.len(),
                        "injection succeeded"
                    );
                    attempts.push(StrategyResult {
                        strategy,
                        success: true,
                        latency_ms,
                        error: None,
                    });
                    return InjectionOutcome {
                        success: true,
                        attempts,
                    };
                }
                Err(e) => {
                    if let Ok(mut m) = self.metrics.lock() {
                        m.emit_fail(strategy, latency_ms, &e);
                    }
                    debug!(%strategy, latency_ms, error = %e, "strategy failed, falling through");
                    attempts.push(StrategyResult {
                        strategy,
                        success: false,
                        latency_ms,
                        error: Some(e.to_string()),
                    });
                    // Proceed to the next strategy with the full, original
                    // text. If a native dispatch failed partway through, the
                    // characters already delivered are not deduplicated; see
                    // the documented duplicate-character edge case.
                }
            }
        }

        error!(
            attempts = attempts.len(),
            "all injection strategies failed; caller must surface the text to the user"
        );
        InjectionOutcome {
            success: false,
            attempts,
        }
    }

    /// Convenience wrapper building the request inline.
    pub async fn inject_text(&self, text: &str) -> InjectionOutcome {
        self.inject(&InjectionRequest::new(text)).await
    }

    /// Blocking wrapper for synchronous callers. Must not be invoked from
    /// inside an async runtime.
    pub fn inject_blocking(&self, text: &str) -> InjectionOutcome {
        match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime.block_on(self.inject_text(text)),
            Err(e) => {
                error!("failed to build blocking runtime: {}", e);
                InjectionOutcome {
                    success: false,
                    attempts: vec![],
                }
            }
        }
    }

    /// Shared metrics handle for external monitoring.
    pub fn metrics(&self) -> Arc<Mutex<InjectionMetrics>> {
        self.metrics.clone()
    }

    /// The detector this orchestrator was built from.
    pub fn detector(&self) -> &Arc<CapabilityDetector> {
        &self.detector
    }

    /// Release strategy resources, including the native protocol connection.
    /// Call at process shutdown.
    pub fn shutdown(self) {
        // Dropping the chain tears down the virtual-keyboard connection via
        // its Drop impl, releasing the compositor socket.
        drop(self.injectors);
        debug!("orchestrator shut down");
    }

    #[cfg(test)]
    pub(crate) fn with_injectors_for_tests(
        config: InjectionConfig,
        injectors: Vec<Box<dyn TextInjector>>,
    ) -> Self {
        Self {
            config,
            detector: Arc::new(CapabilityDetector::new(InjectionConfig::default())),
            injectors,
            flight: tokio::sync::Mutex::new(()),
            metrics: Arc::new(Mutex::new(InjectionMetrics::default())),
        }
    }
}

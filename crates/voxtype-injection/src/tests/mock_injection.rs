//! Mock injectors for exercising orchestrator behavior without touching a
//! display server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::InjectionError;
use crate::types::StrategyId;
use crate::TextInjector;

/// What a mock does when asked to inject.
#[derive(Clone)]
pub enum MockBehavior {
    Succeed,
    Fail(String),
    /// Sleep, then succeed. Used for timeout and single-flight tests.
    SucceedAfter(Duration),
    /// Simulate a partial native dispatch: some characters were delivered
    /// before the connection dropped.
    FailAfterPartialDelivery { delivered: String, error: String },
}

/// Shared log of observable mock events, in order.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn new_event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub struct MockInjector {
    pub strategy: StrategyId,
    pub name: &'static str,
    pub available: bool,
    pub behavior: MockBehavior,
    pub log: EventLog,
}

impl MockInjector {
    pub fn new(strategy: StrategyId, name: &'static str, behavior: MockBehavior) -> Self {
        Self {
            strategy,
            name,
            available: true,
            behavior,
            log: new_event_log(),
        }
    }

    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = log;
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    fn record(&self, message: String) {
        self.log.lock().unwrap().push(message);
    }
}

#[async_trait]
impl TextInjector for MockInjector {
    fn strategy_id(&self) -> StrategyId {
        self.strategy
    }

    fn backend_name(&self) -> &'static str {
        self.name
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn inject_text(&self, text: &str) -> Result<(), InjectionError> {
        self.record(format!("{}:start:{}", self.name, text));
        let result = match &self.behavior {
            MockBehavior::Succeed => Ok(()),
            MockBehavior::Fail(message) => Err(InjectionError::Other(message.clone())),
            MockBehavior::SucceedAfter(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(())
            }
            MockBehavior::FailAfterPartialDelivery { delivered, error } => {
                self.record(format!("{}:delivered:{}", self.name, delivered));
                Err(InjectionError::Connection(error.clone()))
            }
        };
        self.record(format!(
            "{}:end:{}",
            self.name,
            if result.is_ok() { "ok" } else { "err" }
        ));
        result
    }
}

//! Enigo adapter: cross-platform input simulation (opt-in).
//!
//! Covers the OS-native SendInput-style path on platforms without a display
//! server we drive directly.

use async_trait::async_trait;
use tracing::info;

use crate::error::InjectionError;
use crate::types::{InjectionConfig, StrategyId};
use crate::TextInjector;

/// Enigo injector for synthetic text entry through the OS input APIs.
pub struct EnigoInjector {
    config: InjectionConfig,
}

impl EnigoInjector {
    pub fn new(config: InjectionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TextInjector for EnigoInjector {
    fn strategy_id(&self) -> StrategyId {
        StrategyId::Enigo
    }

    fn backend_name(&self) -> &'static str {
        "enigo"
    }

    async fn is_available(&self) -> bool {
        if !self.config.allow_enigo {
            return false;
        }
        cfg!(any(target_os = "windows", target_os = "macos"))
            || std::env::var_os("DISPLAY").is_some()
            || std::env::var_os("WAYLAND_DISPLAY").is_some()
    }

    async fn inject_text(&self, text: &str) -> Result<(), InjectionError> {
        if text.is_empty() {
            return Ok(());
        }

        // Enigo holds a platform connection that is not Send; build it per
        // call inside a blocking task.
        let owned = text.to_string();
        let result = tokio::task::spawn_blocking(move || {
            use enigo::{Enigo, Keyboard, Settings};

            let mut enigo = Enigo::new(&Settings::default())
                .map_err(|e| InjectionError::Other(format!("enigo init failed: {e}")))?;
            enigo
                .text(&owned)
                .map_err(|e| InjectionError::Other(format!("enigo text entry failed: {e}")))
        })
        .await
        .map_err(|e| InjectionError::Other(format!("enigo task failed: {e}")))?;

        result?;
        info!("typed {} chars via enigo", text.len());
        Ok(())
    }

    fn backend_info(&self) -> Vec<(&'static str, String)> {
        vec![
            ("type", "input-simulation library".to_string()),
            ("platform", "cross-platform".to_string()),
        ]
    }
}

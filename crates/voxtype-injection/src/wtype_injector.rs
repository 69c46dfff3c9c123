//! wtype adapter: type simulation for wlroots-family compositors.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::InjectionError;
use crate::subprocess::which;
use crate::types::{InjectionConfig, StrategyId};
use crate::TextInjector;

/// Wtype injector for synthetic typing on wlroots compositors.
pub struct WtypeInjector {
    config: InjectionConfig,
}

impl WtypeInjector {
    pub fn new(config: InjectionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TextInjector for WtypeInjector {
    fn strategy_id(&self) -> StrategyId {
        StrategyId::Wtype
    }

    fn backend_name(&self) -> &'static str {
        "wtype"
    }

    async fn is_available(&self) -> bool {
        std::env::var_os("WAYLAND_DISPLAY").is_some() && which("wtype").await.is_some()
    }

    async fn inject_text(&self, text: &str) -> Result<(), InjectionError> {
        if text.is_empty() {
            return Ok(());
        }

        let budget = self.config.per_tool_timeout_ms;
        let output = timeout(
            Duration::from_millis(budget),
            tokio::process::Command::new("wtype")
                .arg(text)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| InjectionError::Timeout(budget))?
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                InjectionError::ToolNotFound { tool: "wtype" }
            } else {
                InjectionError::ToolExecution {
                    tool: "wtype",
                    message: e.to_string(),
                }
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("wtype exited {}: {}", output.status, stderr.trim());
            return Err(InjectionError::ToolExecution {
                tool: "wtype",
                message: stderr.trim().to_string(),
            });
        }

        info!("typed {} chars via wtype", text.len());
        Ok(())
    }

    fn backend_info(&self) -> Vec<(&'static str, String)> {
        vec![
            ("type", "external type-simulation tool".to_string()),
            ("platform", "Wayland (wlroots compositors)".to_string()),
        ]
    }
}

//! xdotool adapter: X11 typing, also useful for XWayland windows.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::info;

use crate::error::InjectionError;
use crate::subprocess::which;
use crate::types::{InjectionConfig, StrategyId};
use crate::TextInjector;

/// Xdotool injector for X11 sessions and XWayland-hosted windows.
pub struct XdotoolInjector {
    config: InjectionConfig,
}

impl XdotoolInjector {
    pub fn new(config: InjectionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TextInjector for XdotoolInjector {
    fn strategy_id(&self) -> StrategyId {
        StrategyId::Xdotool
    }

    fn backend_name(&self) -> &'static str {
        "xdotool"
    }

    async fn is_available(&self) -> bool {
        std::env::var_os("DISPLAY").is_some() && which("xdotool").await.is_some()
    }

    async fn inject_text(&self, text: &str) -> Result<(), InjectionError> {
        if text.is_empty() {
            return Ok(());
        }

        let budget = self.config.per_tool_timeout_ms;
        let output = timeout(
            Duration::from_millis(budget),
            tokio::process::Command::new("xdotool")
                .args(["type", "--delay", "12", text])
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| InjectionError::Timeout(budget))?
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                InjectionError::ToolNotFound { tool: "xdotool" }
            } else {
                InjectionError::ToolExecution {
                    tool: "xdotool",
                    message: e.to_string(),
                }
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InjectionError::ToolExecution {
                tool: "xdotool",
                message: stderr.trim().to_string(),
            });
        }

        info!("typed {} chars via xdotool", text.len());
        Ok(())
    }

    fn backend_info(&self) -> Vec<(&'static str, String)> {
        vec![
            ("type", "X11 automation tool".to_string()),
            ("platform", "X11 / XWayland".to_string()),
        ]
    }
}

//! # Clipboard-paste strategy
//!
//! Saves the clipboard, writes the dictated text into it, triggers a paste
//! key combination through whichever combo-capable tool is present, then
//! restores the prior clipboard with bounded retries. Restoration is
//! best-effort and never part of the injection success criterion.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{debug, info, trace};

use crate::clipboard::ClipboardRelay;
use crate::constants::PASTE_STABILIZE_DELAY_MS;
use crate::error::InjectionError;
use crate::subprocess::which;
use crate::types::{InjectionConfig, StrategyId};
use crate::TextInjector;

/// Paste key combinations, tried in order against the available tools.
const PASTE_COMBOS: &[(&str, &[&str])] = &[
    ("ydotool", &["key", "ctrl+v"]),
    ("wtype", &["-M", "ctrl", "-k", "v", "-m", "ctrl"]),
    ("xdotool", &["key", "ctrl+v"]),
];

/// Combo injector: clipboard write followed by a simulated paste.
pub struct ClipboardPasteInjector {
    config: InjectionConfig,
    relay: ClipboardRelay,
}

impl ClipboardPasteInjector {
    pub fn new(config: InjectionConfig) -> Self {
        Self {
            relay: ClipboardRelay::new(config.clone()),
            config,
        }
    }

    async fn trigger_paste(&self) -> Result<&'static str, InjectionError> {
        let budget = self.config.per_tool_timeout_ms;
        let mut last_error = None;

        for (tool, args) in PASTE_COMBOS {
            if which(tool).await.is_none() {
                continue;
            }

            let result = timeout(
                Duration::from_millis(budget),
                tokio::process::Command::new(tool)
                    .args(*args)
                    .kill_on_drop(true)
                    .output(),
            )
            .await;

            match result {
                Ok(Ok(output)) if output.status.success() => {
                    debug!("paste triggered via {}", tool);
                    return Ok(tool);
                }
                Ok(Ok(output)) => {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    last_error = Some(format!("{tool}: {}", stderr.trim()));
                }
                Ok(Err(e)) => last_error = Some(format!("{tool}: {e}")),
                Err(_) => last_error = Some(format!("{tool}: timed out after {budget}ms")),
            }
        }

        Err(InjectionError::ToolExecution {
            tool: "paste-combo",
            message: last_error.unwrap_or_else(|| "no paste-capable tool found".to_string()),
        })
    }
}

#[async_trait]
impl TextInjector for ClipboardPasteInjector {
    fn strategy_id(&self) -> StrategyId {
        StrategyId::ClipboardPaste
    }

    fn backend_name(&self) -> &'static str {
        "clipboard-paste"
    }

    async fn is_available(&self) -> bool {
        let has_display = std::env::var_os("WAYLAND_DISPLAY").is_some()
            || std::env::var_os("DISPLAY").is_some();
        if !has_display {
            return false;
        }
        for (tool, _) in PASTE_COMBOS {
            if which(tool).await.is_some() {
                return true;
            }
        }
        false
    }

    async fn inject_text(&self, text: &str) -> Result<(), InjectionError> {
        if text.is_empty() {
            return Ok(());
        }

        // Save must precede the clipboard write; single-flight in the
        // orchestrator guarantees no second snapshot overlaps this one.
        let snapshot = self.relay.save().await;

        self.relay.set(text).await?;
        trace!("clipboard set with {} chars", text.len());
        tokio::time::sleep(Duration::from_millis(PASTE_STABILIZE_DELAY_MS)).await;

        let paste_result = self.trigger_paste().await;

        if self.config.restore_clipboard {
            // Let the target application consume the selection first.
            tokio::time::sleep(Duration::from_millis(self.config.clipboard_restore_delay_ms))
                .await;
            self.relay.restore(&snapshot).await;
        }

        let tool = paste_result?;
        info!("injected {} chars via clipboard paste ({})", text.len(), tool);
        Ok(())
    }

    fn backend_info(&self) -> Vec<(&'static str, String)> {
        vec![
            ("type", "clipboard + simulated paste".to_string()),
            ("platform", "Linux (Wayland/X11)".to_string()),
            (
                "description",
                "saves clipboard, writes text, pastes, restores".to_string(),
            ),
        ]
    }
}

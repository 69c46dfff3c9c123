//! # Privileged escalation chain
//!
//! Runs only after every polite strategy has failed, so dictated text is
//! never silently dropped on machines with unusual permission setups. Each
//! step logs a loud warning. Elevation uses `sudo -n` (non-interactive) and
//! gives up immediately where no cached credentials exist.
//!
//! Steps, in order:
//! 1. re-launch the ydotoold input daemon elevated, then retry ydotool
//! 2. write a one-shot script trying each tool and run it elevated
//! 3. aggressively cycle paste key-combinations around a clipboard write
//! 4. temporarily relax /dev/uinput permissions, inject, restore them
//! 5. try xdotool even under Wayland (works for XWayland windows)

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::clipboard::ClipboardRelay;
use crate::error::InjectionError;
use crate::types::{InjectionConfig, StrategyId};
use crate::TextInjector;

const STEP_TIMEOUT_MS: u64 = 2_000;

/// Last-resort injector that escalates through privileged mechanisms.
pub struct UnsafeEscalation {
    config: InjectionConfig,
    relay: ClipboardRelay,
}

impl UnsafeEscalation {
    pub fn new(config: InjectionConfig) -> Self {
        Self {
            relay: ClipboardRelay::new(config.clone()),
            config,
        }
    }

    async fn run_quiet(cmd: &str, args: &[&str]) -> bool {
        let result = timeout(
            Duration::from_millis(STEP_TIMEOUT_MS),
            tokio::process::Command::new(cmd)
                .args(args)
                .stdin(std::process::Stdio::null())
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null())
                .kill_on_drop(true)
                .status(),
        )
        .await;
        matches!(result, Ok(Ok(status)) if status.success())
    }

    /// Step 1: make sure the input daemon is running, elevating if needed,
    /// then retry ydotool with and without elevation.
    async fn relaunch_input_daemon(&self, text: &str) -> bool {
        warn!("escalation step 1: re-launching ydotoold elevated");

        let daemon_running = Self::run_quiet("pgrep", &["-x", "ydotoold"]).await;
        if !daemon_running {
            let spawned = tokio::process::Command::new("sudo")
                .args(["-n", "ydotoold"])
                .stdin(std::process::Stdio::null())
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null())
                .spawn()
                .is_ok();
            if spawned {
                tokio::time::sleep(Duration::from_millis(500)).await;
            } else {
                debug!("could not spawn elevated ydotoold");
            }
        }

        if Self::run_quiet("ydotool", &["type", text]).await {
            return true;
        }
        Self::run_quiet("sudo", &["-n", "ydotool", "type", text]).await
    }

    /// Step 2: one-shot elevated script trying each available tool.
    async fn run_oneshot_script(&self, text: &str) -> bool {
        warn!("escalation step 2: running one-shot elevated injection script");

        let escaped = text.replace('\'', "'\"'\"'");
        let script = format!(
            "#!/bin/sh\n\
             if command -v ydotool >/dev/null 2>&1; then\n\
             \x20   ydotool type '{escaped}'\n\
             elif command -v wtype >/dev/null 2>&1; then\n\
             \x20   wtype '{escaped}'\n\
             elif command -v xdotool >/dev/null 2>&1; then\n\
             \x20   DISPLAY=${{DISPLAY:-:0}} xdotool type '{escaped}'\n\
             else\n\
             \x20   exit 1\n\
             fi\n"
        );

        let file = match tempfile::Builder::new().suffix(".sh").tempfile() {
            Ok(mut f) => {
                if f.write_all(script.as_bytes()).is_err() {
                    return false;
                }
                f
            }
            Err(e) => {
                debug!("could not stage escalation script: {}", e);
                return false;
            }
        };

        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o755);
            if std::fs::set_permissions(file.path(), perms).is_err() {
                return false;
            }
        }

        let path = file.path().to_string_lossy().to_string();
        Self::run_quiet("sudo", &["-n", &path]).await
        // The NamedTempFile is removed when `file` drops here.
    }

    /// Step 3: clipboard write plus every paste combination we know,
    /// including elevated ones.
    async fn aggressive_clipboard(&self, text: &str) -> bool {
        warn!("escalation step 3: aggressive clipboard paste cycling");

        let snapshot = self.relay.save().await;
        if self.relay.set(text).await.is_err() {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        let combos: &[(&str, &[&str])] = &[
            ("wtype", &["-M", "ctrl", "-k", "v", "-m", "ctrl"]),
            ("ydotool", &["key", "ctrl+v"]),
            ("sudo", &["-n", "ydotool", "key", "ctrl+v"]),
            ("xdotool", &["key", "ctrl+v"]),
            ("wtype", &["-M", "shift", "-k", "Insert", "-m", "shift"]),
        ];

        let mut pasted = false;
        for (cmd, args) in combos {
            if Self::run_quiet(cmd, args).await {
                pasted = true;
                break;
            }
        }

        if self.config.restore_clipboard {
            tokio::time::sleep(Duration::from_millis(self.config.clipboard_restore_delay_ms))
                .await;
            self.relay.restore(&snapshot).await;
        }
        pasted
    }

    /// Step 4: relax /dev/uinput permissions, inject, then restore them.
    /// Permissions are restored regardless of the injection result.
    async fn uinput_permission_cycle(&self, text: &str) -> bool {
        if !std::path::Path::new("/dev/uinput").exists() {
            return false;
        }
        warn!("escalation step 4: temporarily relaxing /dev/uinput permissions");

        let relaxed = Self::run_quiet("sudo", &["-n", "chmod", "666", "/dev/uinput"]).await;
        let injected = Self::run_quiet("ydotool", &["type", text]).await;

        if relaxed {
            let restored = Self::run_quiet("sudo", &["-n", "chmod", "600", "/dev/uinput"]).await;
            if !restored {
                warn!("failed to restore /dev/uinput permissions");
            }
        }
        injected
    }

    /// Step 5: xdotool despite the Wayland session; reaches XWayland windows.
    async fn xdotool_anyway(&self, text: &str) -> bool {
        warn!("escalation step 5: trying xdotool under Wayland (XWayland only)");

        let display = std::env::var("DISPLAY").unwrap_or_else(|_| ":0".to_string());
        let result = timeout(
            Duration::from_millis(STEP_TIMEOUT_MS),
            tokio::process::Command::new("xdotool")
                .args(["type", text])
                .env("DISPLAY", display)
                .stdin(std::process::Stdio::null())
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null())
                .kill_on_drop(true)
                .status(),
        )
        .await;
        matches!(result, Ok(Ok(status)) if status.success())
    }
}

#[async_trait]
impl TextInjector for UnsafeEscalation {
    fn strategy_id(&self) -> StrategyId {
        StrategyId::UnsafeEscalation
    }

    fn backend_name(&self) -> &'static str {
        "unsafe-escalation"
    }

    async fn is_available(&self) -> bool {
        self.config.allow_unsafe_escalation
    }

    async fn inject_text(&self, text: &str) -> Result<(), InjectionError> {
        if text.is_empty() {
            return Ok(());
        }

        warn!("all polite injection strategies failed; entering privileged escalation chain");

        if self.relaunch_input_daemon(text).await {
            return Ok(());
        }
        if self.run_oneshot_script(text).await {
            return Ok(());
        }
        if self.aggressive_clipboard(text).await {
            return Ok(());
        }
        if self.uinput_permission_cycle(text).await {
            return Ok(());
        }
        if self.xdotool_anyway(text).await {
            return Ok(());
        }

        Err(InjectionError::Permission(
            "all escalation steps failed; text could not be delivered".to_string(),
        ))
    }

    fn backend_info(&self) -> Vec<(&'static str, String)> {
        vec![
            ("type", "privileged last-resort chain".to_string()),
            ("steps", "5".to_string()),
            (
                "description",
                "daemon relaunch, one-shot script, paste cycling, uinput chmod, xdotool"
                    .to_string(),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_by_config() {
        let config = InjectionConfig {
            allow_unsafe_escalation: false,
            ..Default::default()
        };
        let chain = UnsafeEscalation::new(config);
        assert!(!chain.is_available().await);
    }

    #[tokio::test]
    async fn empty_text_is_noop() {
        let chain = UnsafeEscalation::new(InjectionConfig::default());
        assert!(chain.inject_text("").await.is_ok());
    }
}

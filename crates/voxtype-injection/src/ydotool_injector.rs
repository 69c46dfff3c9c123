//! ydotool adapter: uinput-backed typing through the ydotoold daemon.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::error::InjectionError;
use crate::subprocess::which;
use crate::types::{InjectionConfig, StrategyId};
use crate::TextInjector;

/// Path of the ydotoold control socket for the current user.
pub fn socket_path() -> String {
    let uid = std::env::var("UID").unwrap_or_else(|_| "1000".to_string());
    format!("/run/user/{}/.ydotool_socket", uid)
}

/// Check the daemon socket without spawning anything.
pub fn daemon_socket_present() -> bool {
    std::path::Path::new(&socket_path()).exists()
}

/// Check write access to /dev/uinput, which the daemon needs.
pub fn check_uinput_access() -> Result<(), InjectionError> {
    use std::fs::OpenOptions;

    match OpenOptions::new().write(true).open("/dev/uinput") {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(InjectionError::Permission(
                "/dev/uinput access denied; add your user to the 'input' group \
                 (sudo usermod -a -G input $USER) and start ydotoold"
                    .to_string(),
            ))
        }
        Err(e) => Err(InjectionError::Other(format!(
            "/dev/uinput check failed: {e}"
        ))),
    }
}

/// Ydotool injector for synthetic key events via uinput.
pub struct YdotoolInjector {
    config: InjectionConfig,
}

impl YdotoolInjector {
    pub fn new(config: InjectionConfig) -> Self {
        Self { config }
    }

    async fn run_ydotool(&self, args: &[&str]) -> Result<(), InjectionError> {
        let budget = self.config.per_tool_timeout_ms;
        let output = timeout(
            Duration::from_millis(budget),
            tokio::process::Command::new("ydotool")
                .args(args)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| InjectionError::Timeout(budget))?
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                InjectionError::ToolNotFound { tool: "ydotool" }
            } else {
                InjectionError::ToolExecution {
                    tool: "ydotool",
                    message: e.to_string(),
                }
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InjectionError::ToolExecution {
                tool: "ydotool",
                message: stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TextInjector for YdotoolInjector {
    fn strategy_id(&self) -> StrategyId {
        StrategyId::Ydotool
    }

    fn backend_name(&self) -> &'static str {
        "ydotool"
    }

    async fn is_available(&self) -> bool {
        if which("ydotool").await.is_none() {
            return false;
        }
        if !daemon_socket_present() {
            warn!(
                "ydotool socket not found at {}, daemon may not be running",
                socket_path()
            );
            return false;
        }
        true
    }

    async fn inject_text(&self, text: &str) -> Result<(), InjectionError> {
        if text.is_empty() {
            return Ok(());
        }

        self.run_ydotool(&["type", "--delay", "10", text]).await?;
        info!("typed {} chars via ydotool", text.len());
        Ok(())
    }

    fn backend_info(&self) -> Vec<(&'static str, String)> {
        vec![
            ("type", "uinput daemon CLI".to_string()),
            ("socket", socket_path()),
            ("platform", "Linux (Wayland or X11)".to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_path_uses_uid() {
        let path = socket_path();
        assert!(path.starts_with("/run/user/"));
        assert!(path.ends_with(".ydotool_socket"));
    }
}

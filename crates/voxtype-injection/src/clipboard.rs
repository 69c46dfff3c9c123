//! # Clipboard relay
//!
//! Saves and restores clipboard contents around paste-based strategies.
//! Wayland sessions use wl-clipboard-rs directly; X11 sessions fall back to
//! the `xclip` pair. Exactly one snapshot may be in flight per process at a
//! time; the orchestrator's single-flight discipline enforces this.

use std::io::Read;

use tracing::{debug, warn};
use wl_clipboard_rs::copy::{MimeType as CopyMime, Options as CopyOptions, Source as CopySource};
use wl_clipboard_rs::paste::{get_contents, ClipboardType, MimeType as PasteMime, Seat};

use crate::constants::{
    CLIPBOARD_RESTORE_BACKOFF_MS, CLIPBOARD_RESTORE_RETRIES, CLIPBOARD_TOOL_TIMEOUT_MS,
};
use crate::error::InjectionError;
use crate::subprocess::{run_tool_with_stdin_timeout, run_tool_with_timeout};
use crate::types::InjectionConfig;

/// Snapshot of clipboard contents taken before a paste-based injection.
///
/// `content: None` means the clipboard was empty or unreadable when saved;
/// "nothing to restore" is a valid state, not an error.
#[derive(Debug, Clone)]
pub struct ClipboardSnapshot {
    pub content: Option<String>,
}

/// Saves and restores clipboard contents around paste-based strategies.
pub struct ClipboardRelay {
    _config: InjectionConfig,
}

impl ClipboardRelay {
    pub fn new(config: InjectionConfig) -> Self {
        Self { _config: config }
    }

    fn on_wayland() -> bool {
        std::env::var_os("WAYLAND_DISPLAY").is_some()
    }

    fn on_x11() -> bool {
        std::env::var_os("DISPLAY").is_some()
    }

    /// Read the current clipboard into a snapshot. Read failures (empty
    /// clipboard, no owner, locked selection) yield `content: None` rather
    /// than an error.
    pub async fn save(&self) -> ClipboardSnapshot {
        if Self::on_wayland() {
            let content = tokio::task::spawn_blocking(|| {
                match get_contents(ClipboardType::Regular, Seat::Unspecified, PasteMime::Text) {
                    Ok((mut pipe, _mime)) => {
                        let mut buf = String::new();
                        pipe.read_to_string(&mut buf).ok().map(|_| buf)
                    }
                    Err(_) => None,
                }
            })
            .await
            .ok()
            .flatten();

            if let Some(ref c) = content {
                debug!("saved clipboard snapshot ({} chars)", c.len());
            } else {
                debug!("clipboard empty or unreadable, nothing to restore later");
            }
            return ClipboardSnapshot { content };
        }

        if Self::on_x11() {
            let content = run_tool_with_timeout(
                "xclip",
                &["-selection", "clipboard", "-o"],
                CLIPBOARD_TOOL_TIMEOUT_MS,
            )
            .await
            .ok();
            return ClipboardSnapshot { content };
        }

        ClipboardSnapshot { content: None }
    }

    /// Overwrite the clipboard with the dictated text.
    pub async fn set(&self, text: &str) -> Result<(), InjectionError> {
        if Self::on_wayland() {
            let bytes = text.as_bytes().to_vec();
            return tokio::task::spawn_blocking(move || {
                let opts = CopyOptions::new();
                opts.copy(CopySource::Bytes(bytes.into()), CopyMime::Text)
                    .map_err(|e| InjectionError::ClipboardState(e.to_string()))
            })
            .await
            .map_err(|e| InjectionError::Other(format!("clipboard task failed: {e}")))?;
        }

        if Self::on_x11() {
            return run_tool_with_stdin_timeout(
                "xclip",
                &["-selection", "clipboard"],
                text.as_bytes(),
                CLIPBOARD_TOOL_TIMEOUT_MS,
            )
            .await
            .map_err(InjectionError::from);
        }

        Err(InjectionError::ClipboardState(
            "no display server for clipboard access".to_string(),
        ))
    }

    /// Restore a previously saved snapshot, retrying with a short backoff.
    ///
    /// Returns whether restoration succeeded. Failure is logged but never
    /// fails the surrounding injection; by the time restore runs, the
    /// dictated text may already have been delivered.
    pub async fn restore(&self, snapshot: &ClipboardSnapshot) -> bool {
        let Some(content) = snapshot.content.as_ref() else {
            debug!("no clipboard snapshot to restore");
            return true;
        };

        for attempt in 1..=CLIPBOARD_RESTORE_RETRIES {
            match self.set(content).await {
                Ok(()) => {
                    debug!(
                        "restored clipboard ({} chars) on attempt {}",
                        content.len(),
                        attempt
                    );
                    return true;
                }
                Err(e) => {
                    debug!("clipboard restore attempt {} failed: {}", attempt, e);
                    if attempt < CLIPBOARD_RESTORE_RETRIES {
                        tokio::time::sleep(std::time::Duration::from_millis(
                            CLIPBOARD_RESTORE_BACKOFF_MS * attempt as u64,
                        ))
                        .await;
                    }
                }
            }
        }

        warn!(
            "clipboard restore failed after {} attempts; prior contents lost",
            CLIPBOARD_RESTORE_RETRIES
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn restore_of_empty_snapshot_is_trivially_true() {
        let relay = ClipboardRelay::new(InjectionConfig::default());
        let snapshot = ClipboardSnapshot { content: None };
        assert!(relay.restore(&snapshot).await);
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn save_without_display_yields_empty_snapshot() {
        let saved_wl = std::env::var_os("WAYLAND_DISPLAY");
        let saved_x = std::env::var_os("DISPLAY");
        std::env::remove_var("WAYLAND_DISPLAY");
        std::env::remove_var("DISPLAY");

        let relay = ClipboardRelay::new(InjectionConfig::default());
        let snapshot = relay.save().await;
        assert!(snapshot.content.is_none());

        if let Some(v) = saved_wl {
            std::env::set_var("WAYLAND_DISPLAY", v);
        }
        if let Some(v) = saved_x {
            std::env::set_var("DISPLAY", v);
        }
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn set_without_display_is_clipboard_state_error() {
        let saved_wl = std::env::var_os("WAYLAND_DISPLAY");
        let saved_x = std::env::var_os("DISPLAY");
        std::env::remove_var("WAYLAND_DISPLAY");
        std::env::remove_var("DISPLAY");

        let relay = ClipboardRelay::new(InjectionConfig::default());
        let err = relay.set("text").await.unwrap_err();
        assert!(matches!(err, InjectionError::ClipboardState(_)));

        if let Some(v) = saved_wl {
            std::env::set_var("WAYLAND_DISPLAY", v);
        }
        if let Some(v) = saved_x {
            std::env::set_var("DISPLAY", v);
        }
    }
}

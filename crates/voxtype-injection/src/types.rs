//! # Core Data Types for Text Injection
//!
//! Strategy identification, injection requests, and the configuration struct
//! that is typically deserialized from a TOML file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants;

/// Enumeration of all injection strategies known to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyId {
    /// Native Wayland virtual-keyboard protocol client. Lowest latency, no
    /// external process dependency.
    VirtualKeyboard,
    /// Set the clipboard with the text and trigger a paste action.
    ClipboardPaste,
    /// Simulate typing via the `wtype` tool (wlroots compositors).
    Wtype,
    /// Simulate typing via the `ydotool` uinput daemon CLI.
    Ydotool,
    /// Simulate typing via `xdotool` (X11 or XWayland windows).
    Xdotool,
    /// Input simulation through the enigo library (opt-in).
    Enigo,
    /// Privileged last-resort chain. Loud, side-effect heavy, always ranked
    /// last.
    UnsafeEscalation,
}

impl std::fmt::Display for StrategyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StrategyId::VirtualKeyboard => "virtual-keyboard",
            StrategyId::ClipboardPaste => "clipboard-paste",
            StrategyId::Wtype => "wtype",
            StrategyId::Ydotool => "ydotool",
            StrategyId::Xdotool => "xdotool",
            StrategyId::Enigo => "enigo",
            StrategyId::UnsafeEscalation => "unsafe-escalation",
        };
        write!(f, "{}", name)
    }
}

/// A single injection request. Immutable once created; consumed by exactly
/// one `inject` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectionRequest {
    /// The finalized text to deliver to the focused window.
    pub text: String,
    /// When the request was created.
    pub requested_at: DateTime<Utc>,
}

impl InjectionRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            requested_at: Utc::now(),
        }
    }
}

/// Configuration for the text injection system.
/// This struct is typically deserialized from a configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectionConfig {
    /// Rank clipboard-paste strategies above process-spawn keystroke tools.
    #[serde(default = "default_true")]
    pub prefer_clipboard_paste: bool,

    /// Whether the privileged escalation chain may run after every polite
    /// strategy has failed.
    #[serde(default = "default_true")]
    pub allow_unsafe_escalation: bool,

    /// Whether to allow the enigo input-simulation library.
    #[serde(default = "default_false")]
    pub allow_enigo: bool,

    /// Keyboard layout identifier uploaded to the compositor ("us").
    #[serde(default = "default_layout")]
    pub keyboard_layout: String,

    /// Per-attempt timeout for process-spawn strategies, in milliseconds.
    #[serde(default = "default_tool_timeout_ms")]
    pub per_tool_timeout_ms: u64,

    /// Per-attempt timeout for the escalation chain, in milliseconds.
    #[serde(default = "default_escalation_timeout_ms")]
    pub escalation_timeout_ms: u64,

    /// Whether to restore the clipboard content after a paste-based injection.
    #[serde(default = "default_true")]
    pub restore_clipboard: bool,

    /// Delay before restoring the saved clipboard, in milliseconds.
    #[serde(default = "default_restore_delay_ms")]
    pub clipboard_restore_delay_ms: u64,

    /// Whether to redact text content in logs for privacy.
    #[serde(default = "default_true")]
    pub redact_logs: bool,
}

fn default_false() -> bool {
    false
}

fn default_true() -> bool {
    true
}

fn default_layout() -> String {
    "us".to_string()
}

fn default_tool_timeout_ms() -> u64 {
    constants::TOOL_ATTEMPT_TIMEOUT_MS
}

fn default_escalation_timeout_ms() -> u64 {
    constants::ESCALATION_ATTEMPT_TIMEOUT_MS
}

fn default_restore_delay_ms() -> u64 {
    constants::CLIPBOARD_RESTORE_DELAY_MS
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            prefer_clipboard_paste: default_true(),
            allow_unsafe_escalation: default_true(),
            allow_enigo: default_false(),
            keyboard_layout: default_layout(),
            per_tool_timeout_ms: default_tool_timeout_ms(),
            escalation_timeout_ms: default_escalation_timeout_ms(),
            restore_clipboard: default_true(),
            clipboard_restore_delay_ms: default_restore_delay_ms(),
            redact_logs: default_true(),
        }
    }
}

/// Redact text content for privacy-first logging.
///
/// Uses a fast, stable std hasher so raw dictation text never reaches logs
/// unless redaction is explicitly disabled.
pub fn redact_text(text: &str, redact: bool) -> String {
    if redact {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let hash = hasher.finish();
        format!("len={} hash={:08x}", text.len(), hash & 0xFFFF_FFFF)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = InjectionConfig::default();
        assert!(config.prefer_clipboard_paste);
        assert!(config.allow_unsafe_escalation);
        assert!(!config.allow_enigo);
        assert_eq!(config.keyboard_layout, "us");
        assert!(config.redact_logs);
    }

    #[test]
    fn config_serde_defaults_from_empty_json() {
        let config: InjectionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.per_tool_timeout_ms, constants::TOOL_ATTEMPT_TIMEOUT_MS);
        assert!(config.restore_clipboard);
    }

    #[test]
    fn redaction_hides_content() {
        let redacted = redact_text("secret dictation", true);
        assert!(!redacted.contains("secret"));
        assert!(redacted.contains("len=16"));
        assert_eq!(redact_text("plain", false), "plain");
    }

    #[test]
    fn strategy_id_display_names() {
        assert_eq!(StrategyId::VirtualKeyboard.to_string(), "virtual-keyboard");
        assert_eq!(StrategyId::UnsafeEscalation.to_string(), "unsafe-escalation");
    }
}

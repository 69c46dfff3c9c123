//! # Voxtype Text Injection Library
//!
//! This crate delivers finalized dictation text into whatever application
//! window currently holds input focus. It detects the display-server
//! environment once per process, ranks the available injection strategies,
//! and degrades through increasingly invasive fallbacks so that dictated
//! text is never silently dropped.
//!
//! ## Strategy Support Matrix
//!
//! | Strategy           | Platform        | Mechanism                        | Status |
//! |--------------------|-----------------|----------------------------------|--------|
//! | Virtual keyboard   | Wayland         | zwp_virtual_keyboard_v1 protocol | Stable |
//! | Clipboard paste    | Wayland/X11     | wl-clipboard-rs / xclip + combo  | Stable |
//! | wtype              | wlroots Wayland | External type-simulation tool    | Stable |
//! | ydotool            | Linux           | uinput daemon CLI                | Stable |
//! | xdotool            | X11 / XWayland  | X11 automation tool              | Stable |
//! | Enigo              | Cross-platform  | Input-simulation library         | Beta   |
//! | Unsafe escalation  | Linux           | Privileged last-resort chain     | Stable |
//!
//! ## Features
//!
//! - `wayland-vk`: native Wayland virtual-keyboard protocol client
//! - `wl_clipboard`: clipboard save/set/restore via wl-clipboard-rs
//! - `ydotool` / `wtype` / `xdotool`: external CLI adapters
//! - `enigo`: cross-platform input simulation
//! - `unsafe-escalation`: privileged last-resort chain
//! - `all-backends` / `linux-desktop`: convenience bundles

pub mod constants;
pub mod detection;
pub mod diagnostics;
pub mod error;
pub mod keymap;
pub mod metrics;
pub mod orchestrator;
pub mod outcome;
pub mod subprocess;
pub mod types;

// Individual injector modules with feature gates
#[cfg(feature = "wayland-vk")]
pub mod virtual_keyboard;

#[cfg(feature = "wl_clipboard")]
pub mod clipboard;

#[cfg(feature = "wl_clipboard")]
pub mod clipboard_paste_injector;

#[cfg(feature = "wtype")]
pub mod wtype_injector;

#[cfg(feature = "ydotool")]
pub mod ydotool_injector;

#[cfg(feature = "xdotool")]
pub mod xdotool_injector;

#[cfg(feature = "enigo")]
pub mod enigo_injector;

#[cfg(feature = "unsafe-escalation")]
pub mod unsafe_escalation;

#[cfg(test)]
mod tests;

// Re-export key components for easy access
pub use detection::{Capability, CapabilityDetector, CompositorKind, CompositorProfile, DetectionReport};
pub use diagnostics::get_setup_instructions;
pub use error::{ClipboardError, InjectionError};
pub use metrics::{InjectionMetrics, MetricsSink, StrategyMetrics};
pub use orchestrator::StrategyOrchestrator;
pub use outcome::{InjectionOutcome, StrategyResult};
pub use types::{InjectionConfig, InjectionRequest, StrategyId};

/// Trait defining the core text injection interface.
///
/// Each concrete strategy (native protocol client, external-tool adapter,
/// clipboard paste, escalation chain) implements this trait; the
/// [`StrategyOrchestrator`] iterates a priority-ordered list of boxed
/// implementations and stops at the first success.
#[async_trait::async_trait]
pub trait TextInjector: Send + Sync {
    /// Stable identifier for this strategy, used in attempt logs and metrics.
    fn strategy_id(&self) -> StrategyId;

    /// Human-readable backend name for logs and diagnostics.
    fn backend_name(&self) -> &'static str;

    /// Check if the injector is available and functional.
    async fn is_available(&self) -> bool;

    /// Inject text into the currently focused application.
    async fn inject_text(&self, text: &str) -> Result<(), InjectionError>;

    /// Backend-specific configuration information for diagnostics.
    fn backend_info(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}

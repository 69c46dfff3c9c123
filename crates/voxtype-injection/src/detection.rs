//! # Environment and capability detection
//!
//! Classifies the compositor from environment signals (with a process-list
//! fallback), probes each injection mechanism independently, and caches the
//! result for the process lifetime. A probe failure never raises; it yields
//! an unavailable capability carrying a diagnostic reason.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constants::SUBPROCESS_PROBE_TIMEOUT_MS;
use crate::subprocess::{quick_subprocess_ok, which};
use crate::types::{InjectionConfig, StrategyId};

/// Known compositor families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompositorKind {
    Gnome,
    Kde,
    Sway,
    Hyprland,
    River,
    Wayfire,
    Weston,
    Unknown,
}

impl CompositorKind {
    /// wlroots-based compositors implement the virtual-keyboard protocol and
    /// work well with wtype.
    pub fn is_wlroots(self) -> bool {
        matches!(
            self,
            CompositorKind::Sway
                | CompositorKind::Hyprland
                | CompositorKind::River
                | CompositorKind::Wayfire
        )
    }
}

impl std::fmt::Display for CompositorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CompositorKind::Gnome => "GNOME",
            CompositorKind::Kde => "KDE",
            CompositorKind::Sway => "Sway",
            CompositorKind::Hyprland => "Hyprland",
            CompositorKind::River => "River",
            CompositorKind::Wayfire => "Wayfire",
            CompositorKind::Weston => "Weston",
            CompositorKind::Unknown => "Unknown",
        };
        write!(f, "{}", name)
    }
}

/// Session type derived from environment signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionKind {
    Wayland,
    X11,
    Unknown,
}

/// Read-only profile of the detected compositor, including its preferred
/// strategy ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositorProfile {
    pub kind: CompositorKind,
    pub session: SessionKind,
    pub preferred_order: Vec<StrategyId>,
}

/// Availability of a single injection mechanism.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    pub strategy: StrategyId,
    pub available: bool,
    pub reason: String,
}

/// Snapshot produced by one detection pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionReport {
    pub profile: CompositorProfile,
    pub capabilities: Vec<Capability>,
}

impl DetectionReport {
    pub fn capability(&self, strategy: StrategyId) -> Option<&Capability> {
        self.capabilities.iter().find(|c| c.strategy == strategy)
    }

    pub fn is_available(&self, strategy: StrategyId) -> bool {
        self.capability(strategy).map_or(false, |c| c.available)
    }
}

/// Classify the session from the session-type variable and display sockets.
pub fn classify_session(session_type: &str, has_wayland_display: bool, has_x_display: bool) -> SessionKind {
    match session_type {
        "wayland" => SessionKind::Wayland,
        "x11" => SessionKind::X11,
        _ if has_wayland_display => SessionKind::Wayland,
        _ if has_x_display => SessionKind::X11,
        _ => SessionKind::Unknown,
    }
}

/// Classify the compositor from desktop-identity strings. Pure function so
/// the mapping is unit-testable without touching the process environment.
pub fn classify_compositor(desktop: &str, session: &str) -> CompositorKind {
    let desktop = desktop.to_lowercase();
    let session = session.to_lowercase();

    let checks = [
        (desktop.contains("gnome") || session.contains("gnome") || desktop.contains("ubuntu"), CompositorKind::Gnome),
        (desktop.contains("kde") || desktop.contains("plasma"), CompositorKind::Kde),
        (desktop.contains("sway") || session.contains("sway"), CompositorKind::Sway),
        (desktop.contains("hyprland"), CompositorKind::Hyprland),
        (desktop.contains("river"), CompositorKind::River),
        (desktop.contains("wayfire"), CompositorKind::Wayfire),
        (desktop.contains("weston"), CompositorKind::Weston),
    ];

    for (matched, kind) in checks {
        if matched {
            return kind;
        }
    }
    CompositorKind::Unknown
}

/// Build the preferred strategy order for a profile.
///
/// The native protocol client always ranks first where the session could
/// support it. Clipboard-paste ranks above process-spawn keystroke tools by
/// default (configurable). The escalation chain is appended by the
/// orchestrator, never here.
pub fn preferred_order(
    kind: CompositorKind,
    session: SessionKind,
    config: &InjectionConfig,
) -> Vec<StrategyId> {
    let mut order = Vec::new();

    if session == SessionKind::Wayland {
        order.push(StrategyId::VirtualKeyboard);
    }

    // wlroots compositors respond best to wtype; elsewhere ydotool is the
    // stronger keystroke tool.
    let keystroke: &[StrategyId] = if kind.is_wlroots() {
        &[StrategyId::Wtype, StrategyId::Ydotool, StrategyId::Xdotool]
    } else {
        &[StrategyId::Ydotool, StrategyId::Wtype, StrategyId::Xdotool]
    };

    if config.prefer_clipboard_paste {
        order.push(StrategyId::ClipboardPaste);
        order.extend_from_slice(keystroke);
    } else {
        order.extend_from_slice(keystroke);
        order.push(StrategyId::ClipboardPaste);
    }

    if config.allow_enigo {
        order.push(StrategyId::Enigo);
    }

    order
}

/// Capability detector with a process-lifetime cache.
///
/// Constructed once at startup and shared by reference; the cache is
/// invalidated only through [`CapabilityDetector::redetect`].
pub struct CapabilityDetector {
    config: InjectionConfig,
    cached: Mutex<Option<Arc<DetectionReport>>>,
}

impl CapabilityDetector {
    pub fn new(config: InjectionConfig) -> Self {
        Self {
            config,
            cached: Mutex::new(None),
        }
    }

    /// Detect the environment, returning the cached report when present.
    pub async fn detect(&self) -> Arc<DetectionReport> {
        if let Some(report) = self.cached.lock().clone() {
            return report;
        }
        self.redetect().await
    }

    /// Force a fresh detection pass, replacing the cache.
    pub async fn redetect(&self) -> Arc<DetectionReport> {
        let report = Arc::new(self.probe_all().await);
        info!(
            compositor = %report.profile.kind,
            session = ?report.profile.session,
            available = report
                .capabilities
                .iter()
                .filter(|c| c.available)
                .count(),
            "capability detection complete"
        );
        *self.cached.lock() = Some(report.clone());
        report
    }

    async fn probe_all(&self) -> DetectionReport {
        let session_type = std::env::var("XDG_SESSION_TYPE").unwrap_or_default();
        let has_wayland = std::env::var_os("WAYLAND_DISPLAY").is_some();
        let has_x = std::env::var_os("DISPLAY").is_some();
        let desktop = std::env::var("XDG_CURRENT_DESKTOP").unwrap_or_default();
        let desktop_session = std::env::var("DESKTOP_SESSION").unwrap_or_default();

        let session = classify_session(&session_type.to_lowercase(), has_wayland, has_x);

        let mut kind = classify_compositor(&desktop, &desktop_session);
        if kind == CompositorKind::Unknown && std::env::var_os("HYPRLAND_INSTANCE_SIGNATURE").is_some() {
            kind = CompositorKind::Hyprland;
        }
        if kind == CompositorKind::Unknown && std::env::var_os("SWAYSOCK").is_some() {
            kind = CompositorKind::Sway;
        }
        if kind == CompositorKind::Unknown {
            kind = Self::classify_from_process_list().await;
        }
        debug!(compositor = %kind, "compositor classified");

        let capabilities = self.probe_capabilities(session, has_wayland, has_x).await;

        DetectionReport {
            profile: CompositorProfile {
                kind,
                session,
                preferred_order: preferred_order(kind, session, &self.config),
            },
            capabilities,
        }
    }

    /// Fallback classification when no environment signal identifies the
    /// compositor: look for a known compositor process.
    async fn classify_from_process_list() -> CompositorKind {
        let candidates = [
            ("gnome-shell", CompositorKind::Gnome),
            ("kwin_wayland", CompositorKind::Kde),
            ("sway", CompositorKind::Sway),
            ("Hyprland", CompositorKind::Hyprland),
            ("river", CompositorKind::River),
            ("wayfire", CompositorKind::Wayfire),
            ("weston", CompositorKind::Weston),
        ];
        for (process, kind) in candidates {
            if Self::pgrep_matches(process).await {
                return kind;
            }
        }
        CompositorKind::Unknown
    }

    async fn pgrep_matches(process: &str) -> bool {
        crate::subprocess::run_tool_with_timeout(
            "pgrep",
            &["-x", process],
            SUBPROCESS_PROBE_TIMEOUT_MS,
        )
        .await
        .map(|out| !out.trim().is_empty())
        .unwrap_or(false)
    }

    async fn probe_capabilities(
        &self,
        session: SessionKind,
        has_wayland: bool,
        has_x: bool,
    ) -> Vec<Capability> {
        let mut capabilities = Vec::new();

        capabilities.push(Self::probe_native_protocol(session).await);
        capabilities.push(Self::probe_clipboard_paste(has_wayland, has_x).await);
        capabilities.push(Self::probe_tool(StrategyId::Wtype, "wtype", has_wayland).await);
        capabilities.push(Self::probe_ydotool().await);
        capabilities.push(Self::probe_tool(StrategyId::Xdotool, "xdotool", has_x).await);
        capabilities.push(self.probe_enigo());
        capabilities.push(Capability {
            strategy: StrategyId::UnsafeEscalation,
            available: self.config.allow_unsafe_escalation,
            reason: if self.config.allow_unsafe_escalation {
                "enabled as last resort".to_string()
            } else {
                "disabled by configuration".to_string()
            },
        });

        capabilities
    }

    async fn probe_native_protocol(session: SessionKind) -> Capability {
        if session != SessionKind::Wayland {
            return Capability {
                strategy: StrategyId::VirtualKeyboard,
                available: false,
                reason: "not a Wayland session".to_string(),
            };
        }

        #[cfg(feature = "wayland-vk")]
        {
            // The probe opens and closes a transient connection; run it off
            // the async executor.
            let result = tokio::task::spawn_blocking(crate::virtual_keyboard::probe_virtual_keyboard)
                .await
                .unwrap_or_else(|e| Err(format!("probe task failed: {e}")));
            match result {
                Ok(()) => Capability {
                    strategy: StrategyId::VirtualKeyboard,
                    available: true,
                    reason: "compositor advertises zwp_virtual_keyboard_manager_v1".to_string(),
                },
                Err(reason) => Capability {
                    strategy: StrategyId::VirtualKeyboard,
                    available: false,
                    reason,
                },
            }
        }

        #[cfg(not(feature = "wayland-vk"))]
        {
            Capability {
                strategy: StrategyId::VirtualKeyboard,
                available: false,
                reason: "compiled without wayland-vk support".to_string(),
            }
        }
    }

    async fn probe_clipboard_paste(has_wayland: bool, has_x: bool) -> Capability {
        let clipboard_ok = if has_wayland {
            which("wl-copy").await.is_some()
                && quick_subprocess_ok("wl-paste", &["--version"], SUBPROCESS_PROBE_TIMEOUT_MS)
                    .await
        } else if has_x {
            which("xclip").await.is_some()
        } else {
            false
        };

        if !clipboard_ok {
            return Capability {
                strategy: StrategyId::ClipboardPaste,
                available: false,
                reason: "no clipboard tool (wl-copy/wl-paste or xclip) on PATH".to_string(),
            };
        }

        let paste_tool = if which("ydotool").await.is_some() {
            Some("ydotool")
        } else if which("wtype").await.is_some() {
            Some("wtype")
        } else if which("xdotool").await.is_some() {
            Some("xdotool")
        } else {
            None
        };

        match paste_tool {
            Some(tool) => Capability {
                strategy: StrategyId::ClipboardPaste,
                available: true,
                reason: format!("clipboard tools present, paste via {tool}"),
            },
            None => Capability {
                strategy: StrategyId::ClipboardPaste,
                available: false,
                reason: "no paste-capable tool (ydotool/wtype/xdotool) on PATH".to_string(),
            },
        }
    }

    async fn probe_tool(strategy: StrategyId, tool: &'static str, session_ok: bool) -> Capability {
        if !session_ok {
            return Capability {
                strategy,
                available: false,
                reason: "required display session absent".to_string(),
            };
        }
        match which(tool).await {
            Some(path) => Capability {
                strategy,
                available: true,
                reason: format!("found at {path}"),
            },
            None => Capability {
                strategy,
                available: false,
                reason: format!("{tool} not found on PATH"),
            },
        }
    }

    async fn probe_ydotool() -> Capability {
        #[cfg(feature = "ydotool")]
        {
            if which("ydotool").await.is_none() {
                return Capability {
                    strategy: StrategyId::Ydotool,
                    available: false,
                    reason: "ydotool not found on PATH".to_string(),
                };
            }
            if !crate::ydotool_injector::daemon_socket_present() {
                return Capability {
                    strategy: StrategyId::Ydotool,
                    available: false,
                    reason: format!(
                        "daemon socket missing at {}",
                        crate::ydotool_injector::socket_path()
                    ),
                };
            }
            if let Err(e) = crate::ydotool_injector::check_uinput_access() {
                return Capability {
                    strategy: StrategyId::Ydotool,
                    available: false,
                    reason: e.to_string(),
                };
            }
            Capability {
                strategy: StrategyId::Ydotool,
                available: true,
                reason: "binary, daemon socket, and uinput access present".to_string(),
            }
        }

        #[cfg(not(feature = "ydotool"))]
        {
            Capability {
                strategy: StrategyId::Ydotool,
                available: false,
                reason: "compiled without ydotool support".to_string(),
            }
        }
    }

    fn probe_enigo(&self) -> Capability {
        #[cfg(feature = "enigo")]
        {
            if self.config.allow_enigo {
                return Capability {
                    strategy: StrategyId::Enigo,
                    available: true,
                    reason: "enabled by configuration".to_string(),
                };
            }
            Capability {
                strategy: StrategyId::Enigo,
                available: false,
                reason: "disabled by configuration".to_string(),
            }
        }

        #[cfg(not(feature = "enigo"))]
        {
            Capability {
                strategy: StrategyId::Enigo,
                available: false,
                reason: "compiled without enigo support".to_string(),
            }
        }
    }
}

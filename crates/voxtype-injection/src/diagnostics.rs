//! # Setup diagnostics
//!
//! Human-readable report of the detected environment plus install commands
//! for missing tools. Consumed by onboarding and CLI surfaces; never fails,
//! detection problems degrade to "unknown" entries.

use crate::detection::{CapabilityDetector, CompositorKind, DetectionReport, SessionKind};
use crate::types::StrategyId;

/// Render setup instructions from a detection report.
pub fn render_setup_instructions(report: &DetectionReport) -> String {
    let mut out = Vec::new();
    out.push("# Text Injection Setup".to_string());
    out.push(String::new());

    match report.profile.session {
        SessionKind::Wayland => {}
        SessionKind::X11 => {
            out.push("You are running an X11 session; xdotool covers typing there.".to_string());
            out.push(String::new());
        }
        SessionKind::Unknown => {
            out.push(
                "No display session detected. Injection requires Wayland or X11.".to_string(),
            );
            out.push(String::new());
        }
    }

    out.push(format!("Detected compositor: {}", report.profile.kind));
    out.push(format!("Session: {:?}", report.profile.session));
    out.push(String::new());

    out.push("Strategies:".to_string());
    for cap in &report.capabilities {
        let status = if cap.available { "available" } else { "missing" };
        out.push(format!("  {:<18} {:<10} {}", cap.strategy.to_string(), status, cap.reason));
    }

    if !report.is_available(StrategyId::Ydotool) {
        out.push(String::new());
        out.push("## Install ydotool (recommended):".to_string());
        out.push("```bash".to_string());
        out.push("sudo apt install ydotool  # or your package manager".to_string());
        out.push("sudo usermod -a -G input $USER".to_string());
        out.push("# Log out and back in for the group change, then start the daemon:".to_string());
        out.push("ydotoold &".to_string());
        out.push("```".to_string());
    }

    if report.profile.kind.is_wlroots() && !report.is_available(StrategyId::Wtype) {
        out.push(String::new());
        out.push("## Install wtype (for wlroots compositors):".to_string());
        out.push("```bash".to_string());
        out.push("sudo apt install wtype  # or build from source".to_string());
        out.push("```".to_string());
    }

    if !report.is_available(StrategyId::ClipboardPaste) {
        out.push(String::new());
        out.push("## Install wl-clipboard:".to_string());
        out.push("```bash".to_string());
        out.push("sudo apt install wl-clipboard".to_string());
        out.push("```".to_string());
    }

    if report.profile.kind == CompositorKind::Gnome
        && !report.is_available(StrategyId::VirtualKeyboard)
    {
        out.push(String::new());
        out.push(
            "Note: GNOME's compositor does not expose the virtual-keyboard protocol; \
             the clipboard and ydotool paths are used instead."
                .to_string(),
        );
    }

    out.join("\n")
}

/// Produce setup instructions from the live environment. Never fails.
pub async fn get_setup_instructions(detector: &CapabilityDetector) -> String {
    let report = detector.detect().await;
    render_setup_instructions(&report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{Capability, CompositorProfile};

    fn report_with(kind: CompositorKind, caps: Vec<Capability>) -> DetectionReport {
        DetectionReport {
            profile: CompositorProfile {
                kind,
                session: SessionKind::Wayland,
                preferred_order: vec![StrategyId::VirtualKeyboard],
            },
            capabilities: caps,
        }
    }

    #[test]
    fn renders_compositor_and_capabilities() {
        let report = report_with(
            CompositorKind::Sway,
            vec![Capability {
                strategy: StrategyId::VirtualKeyboard,
                available: true,
                reason: "compositor advertises zwp_virtual_keyboard_manager_v1".to_string(),
            }],
        );
        let text = render_setup_instructions(&report);
        assert!(text.contains("Detected compositor: Sway"));
        assert!(text.contains("virtual-keyboard"));
        assert!(text.contains("available"));
    }

    #[test]
    fn suggests_ydotool_install_when_missing() {
        let report = report_with(
            CompositorKind::Gnome,
            vec![Capability {
                strategy: StrategyId::Ydotool,
                available: false,
                reason: "ydotool not found on PATH".to_string(),
            }],
        );
        let text = render_setup_instructions(&report);
        assert!(text.contains("Install ydotool"));
        assert!(text.contains("usermod -a -G input"));
    }

    #[test]
    fn suggests_wtype_for_wlroots_only() {
        let missing_wtype = vec![Capability {
            strategy: StrategyId::Wtype,
            available: false,
            reason: "wtype not found on PATH".to_string(),
        }];
        let sway = render_setup_instructions(&report_with(CompositorKind::Sway, missing_wtype.clone()));
        assert!(sway.contains("Install wtype"));

        let gnome = render_setup_instructions(&report_with(CompositorKind::Gnome, missing_wtype));
        assert!(!gnome.contains("Install wtype"));
    }
}

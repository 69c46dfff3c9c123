//! # Timeout and Budget Constants
//!
//! Centralizes the timing knobs for the injection system so behavior can be
//! tuned from a single location. Per-request values can be overridden through
//! [`crate::types::InjectionConfig`]; these are the defaults.

// --- Native protocol ---
/// Soft latency budget for a native virtual-keyboard dispatch. Exceeding it
/// logs a warning; it is a performance signal, not a failure.
pub const NATIVE_LATENCY_BUDGET_MS: u64 = 5;

// --- Per-strategy attempt timeouts ---
/// Timeout for a single process-spawn strategy attempt (wtype, ydotool, ...).
pub const TOOL_ATTEMPT_TIMEOUT_MS: u64 = 3_000;

/// Timeout for the privileged escalation chain, which may spawn several
/// processes in sequence.
pub const ESCALATION_ATTEMPT_TIMEOUT_MS: u64 = 5_000;

// --- Subprocess timeouts ---
/// Timeout for quick-probing a subprocess for availability (e.g. `which wtype`).
/// Must be short so capability detection stays fast.
pub const SUBPROCESS_PROBE_TIMEOUT_MS: u64 = 150;

/// Timeout for running a clipboard tool like `wl-paste` or `xclip`.
pub const CLIPBOARD_TOOL_TIMEOUT_MS: u64 = 400;

// --- Clipboard relay ---
/// How many times to retry restoring the saved clipboard snapshot.
pub const CLIPBOARD_RESTORE_RETRIES: u32 = 3;

/// Backoff between clipboard restore retries.
pub const CLIPBOARD_RESTORE_BACKOFF_MS: u64 = 50;

/// Delay after setting the clipboard before triggering the paste action,
/// giving the compositor time to propagate the new selection.
pub const PASTE_STABILIZE_DELAY_MS: u64 = 20;

/// Delay after the paste action before restoring the prior clipboard, so the
/// target application has read the selection first.
pub const CLIPBOARD_RESTORE_DELAY_MS: u64 = 300;

//! # Error types for the text injection crate.
//!
//! Every strategy-level failure is converted into one of these variants and
//! captured in a [`crate::outcome::StrategyResult`]; nothing propagates as an
//! unhandled fault out of an injection call.

use serde::Serialize;
use thiserror::Error;

/// The primary error type for text injection operations.
#[derive(Debug, Error, Serialize)]
pub enum InjectionError {
    /// The compositor or display server could not be reached.
    #[error("cannot reach display server: {0}")]
    Connection(String),

    /// The compositor sent a malformed or unexpected protocol response.
    #[error("compositor protocol error: {0}")]
    Protocol(String),

    /// A required external binary is absent from PATH.
    #[error("{tool} not found on PATH")]
    ToolNotFound { tool: &'static str },

    /// An external tool ran but exited non-zero or misbehaved.
    #[error("{tool} failed: {message}")]
    ToolExecution { tool: &'static str, message: String },

    /// Access to a device, socket, or clipboard was denied.
    #[error("permission denied: {0}")]
    Permission(String),

    /// The clipboard could not be saved or restored consistently.
    #[error("clipboard state error: {0}")]
    ClipboardState(String),

    /// A strategy attempt exceeded its local time budget.
    #[error("operation timed out after {0}ms")]
    Timeout(u64),

    /// A catch-all for other failures, including capability-absent outcomes
    /// discovered at attempt time.
    #[error("{0}")]
    Other(String),
}

impl InjectionError {
    /// Short variant name used as a metrics aggregation key.
    pub fn kind(&self) -> &'static str {
        match self {
            InjectionError::Connection(_) => "Connection",
            InjectionError::Protocol(_) => "Protocol",
            InjectionError::ToolNotFound { .. } => "ToolNotFound",
            InjectionError::ToolExecution { .. } => "ToolExecution",
            InjectionError::Permission(_) => "Permission",
            InjectionError::ClipboardState(_) => "ClipboardState",
            InjectionError::Timeout(_) => "Timeout",
            InjectionError::Other(_) => "Other",
        }
    }
}

/// Errors that can occur during clipboard tool operations.
#[derive(Debug, Error)]
pub enum ClipboardError {
    /// Failed to launch the clipboard utility.
    #[error("failed to launch clipboard tool: {0}")]
    Launch(String),

    /// The clipboard operation timed out.
    #[error("clipboard operation timed out")]
    Timeout,

    /// The content read from the clipboard was not valid UTF-8.
    #[error("clipboard content is not valid UTF-8")]
    InvalidUtf8,

    /// An I/O error occurred while interacting with the tool.
    #[error("I/O error during clipboard operation: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ClipboardError> for InjectionError {
    fn from(err: ClipboardError) -> Self {
        match err {
            ClipboardError::Timeout => {
                InjectionError::Timeout(crate::constants::CLIPBOARD_TOOL_TIMEOUT_MS)
            }
            other => InjectionError::ClipboardState(other.to_string()),
        }
    }
}

//! # Robust Subprocess Execution
//!
//! Helpers for running external commands with strict timeouts so no tool can
//! hang the injection pipeline. Critical for potentially unreliable
//! command-line tools like `wl-paste`, `xclip`, or `ydotool`.

use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::error::ClipboardError;

/// Runs a command and captures its stdout, with a strict timeout.
///
/// If the command takes longer than the given budget it is killed (via
/// `kill_on_drop`) and `ClipboardError::Timeout` is returned.
pub async fn run_tool_with_timeout(
    cmd: &str,
    args: &[&str],
    ms: u64,
) -> Result<String, ClipboardError> {
    let mut command = tokio::process::Command::new(cmd);
    command
        .args(args)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true);

    let child = command
        .spawn()
        .map_err(|e| ClipboardError::Launch(e.to_string()))?;

    match tokio::time::timeout(Duration::from_millis(ms), child.wait_with_output()).await {
        Ok(Ok(output)) => {
            if output.status.success() {
                String::from_utf8(output.stdout).map_err(|_| ClipboardError::InvalidUtf8)
            } else {
                Err(ClipboardError::Launch(format!(
                    "{} exited with status {}",
                    cmd, output.status
                )))
            }
        }
        Ok(Err(e)) => Err(ClipboardError::Io(e)),
        Err(_) => Err(ClipboardError::Timeout),
    }
}

/// Runs a command, writes data to its stdin, and waits for completion, with
/// a strict timeout split between the write and the wait.
///
/// Used for sink-style tools like `wl-copy` or `xclip -i`.
pub async fn run_tool_with_stdin_timeout(
    cmd: &str,
    args: &[&str],
    input: &[u8],
    ms: u64,
) -> Result<(), ClipboardError> {
    let mut command = tokio::process::Command::new(cmd);
    command
        .args(args)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .map_err(|e| ClipboardError::Launch(e.to_string()))?;

    if let Some(mut stdin) = child.stdin.take() {
        match tokio::time::timeout(Duration::from_millis(ms / 2), stdin.write_all(input)).await {
            Ok(Ok(_)) => {
                // Drop stdin to signal EOF to the child process.
                drop(stdin);
            }
            _ => return Err(ClipboardError::Timeout),
        }
    }

    match tokio::time::timeout(Duration::from_millis(ms.saturating_sub(ms / 2)), child.wait()).await
    {
        Ok(Ok(status)) => {
            if status.success() {
                Ok(())
            } else {
                Err(ClipboardError::Launch(format!(
                    "{} exited with status {}",
                    cmd, status
                )))
            }
        }
        Ok(Err(e)) => Err(ClipboardError::Io(e)),
        Err(_) => Err(ClipboardError::Timeout),
    }
}

/// Quickly checks whether a command can be spawned at all, killing it
/// immediately. Used to verify tool presence without doing real work.
pub async fn quick_subprocess_ok(cmd: &str, args: &[&str], budget_ms: u64) -> bool {
    let cmd_str = cmd.to_string();
    let args_owned: Vec<String> = args.iter().map(|s| s.to_string()).collect();

    let check = async move {
        let mut child = tokio::process::Command::new(&cmd_str)
            .args(&args_owned)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .ok()?;

        // The command only needs to spawn; kill it and reap the zombie.
        child.start_kill().ok()?;
        child.wait().await.ok()?;
        Some(())
    };

    matches!(
        tokio::time::timeout(Duration::from_millis(budget_ms), check).await,
        Ok(Some(()))
    )
}

/// Resolve a binary on PATH via `which`. Returns the resolved path on
/// success.
pub async fn which(tool: &str) -> Option<String> {
    let output = run_tool_with_timeout(
        "which",
        &[tool],
        crate::constants::SUBPROCESS_PROBE_TIMEOUT_MS,
    )
    .await
    .ok()?;
    let path = output.trim();
    if path.is_empty() {
        None
    } else {
        Some(path.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_tool_captures_stdout() {
        let out = run_tool_with_timeout("echo", &["hello"], 2_000).await.unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn run_tool_times_out() {
        let err = run_tool_with_timeout("sleep", &["5"], 50).await.unwrap_err();
        assert!(matches!(err, ClipboardError::Timeout));
    }

    #[tokio::test]
    async fn run_tool_missing_binary_is_launch_error() {
        let err = run_tool_with_timeout("definitely-not-a-real-tool-xyz", &[], 500)
            .await
            .unwrap_err();
        assert!(matches!(err, ClipboardError::Launch(_)));
    }

    #[tokio::test]
    async fn stdin_tool_roundtrip() {
        // `cat` with stdin redirected to /dev/null-style sink still exits 0.
        let result = run_tool_with_stdin_timeout("cat", &[], b"data", 2_000).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn which_finds_common_tool() {
        assert!(which("sh").await.is_some());
        assert!(which("definitely-not-a-real-tool-xyz").await.is_none());
    }
}

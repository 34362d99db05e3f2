//! Child process runner shared by the shell-based channels

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use hu_core::{CommandResult, SPAWN_FAILURE_CODE};
use tokio::process::Command;

/// Run `<program> -c <command>` and collect its normalized result.
///
/// Never fails: spawn and wait errors become `(-1, "ERROR: ...")`. When the
/// deadline passes the child is killed and the result is a spawn failure.
pub(crate) async fn run_shell(program: &Path, command: &str, timeout: Duration) -> CommandResult {
    let child = Command::new(program)
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let child = match child {
        Ok(child) => child,
        Err(e) => {
            tracing::debug!("Failed to spawn {}: {}", program.display(), e);
            return CommandResult::spawn_failure(e);
        }
    };

    // Dropping the wait future on timeout drops the child, which kills it
    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            CommandResult::from_streams(exit_code(output.status), &output.stdout, &output.stderr)
        }
        Ok(Err(e)) => CommandResult::spawn_failure(e),
        Err(_) => {
            tracing::warn!("{} -c timed out after {:?}", program.display(), timeout);
            CommandResult::spawn_failure(format!("command timed out after {:?}", timeout))
        }
    }
}

/// Exit code of a finished process; `128 + signal` when killed by a signal.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    SPAWN_FAILURE_CODE
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const LONG: Duration = Duration::from_secs(30);

    fn sh() -> PathBuf {
        PathBuf::from("sh")
    }

    #[tokio::test]
    async fn test_true_and_false() {
        assert_eq!(run_shell(&sh(), "true", LONG).await, CommandResult::new(0, ""));
        assert_eq!(run_shell(&sh(), "false", LONG).await, CommandResult::new(1, ""));
    }

    #[tokio::test]
    async fn test_explicit_exit_code() {
        let result = run_shell(&sh(), "exit 7", LONG).await;
        assert_eq!(result.exit_code, 7);
    }

    #[tokio::test]
    async fn test_stdout_before_stderr() {
        let result = run_shell(&sh(), "echo err >&2; echo out", LONG).await;
        assert_eq!(result.output, "out\nerr");
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_failure() {
        let result = run_shell(Path::new("/nonexistent/definitely-not-su"), "id", LONG).await;
        assert_eq!(result.exit_code, SPAWN_FAILURE_CODE);
        assert!(result.output.starts_with("ERROR: "));
    }

    #[tokio::test]
    async fn test_nul_byte_is_spawn_failure() {
        let result = run_shell(&sh(), "echo a\0b", LONG).await;
        assert_eq!(result.exit_code, SPAWN_FAILURE_CODE);
        assert!(result.output.starts_with("ERROR: "));
    }

    #[tokio::test]
    async fn test_empty_command_succeeds() {
        let result = run_shell(&sh(), "", LONG).await;
        assert_eq!(result, CommandResult::new(0, ""));
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let result = run_shell(&sh(), "sleep 10", Duration::from_millis(100)).await;
        assert_eq!(result.exit_code, SPAWN_FAILURE_CODE);
        assert!(result.output.contains("timed out"));
    }
}

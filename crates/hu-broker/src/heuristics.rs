//! Exit-code inference for channels that do not report one
//!
//! Both rules look only at the text a command printed, so they are wrong
//! in predictable ways:
//!
//! - loopback: a command that prints a line without the word "success"
//!   (`getprop ro.build.version.sdk` prints `29`) is reported as exit 1.
//! - escalation: a command that fails silently, or prints its error
//!   without one of the known markers, is reported as exit 0.
//!
//! Channels only fall back to these when no native exit status exists.

/// Markers that flag escalation output as an error (matched case-insensitively)
const ESCALATION_ERROR_MARKERS: &[&str] = &[
    "error:",
    "exception",
    "failure",
    "not found",
    "permission denied",
];

/// Infer the exit code of a command run over loopback ADB.
///
/// Empty output, or output mentioning "success" anywhere, is exit 0
/// (`pm` prints `Success`). Everything else is exit 1.
pub fn infer_loopback_exit_code(output: &str) -> i32 {
    let trimmed = output.trim();
    if trimmed.is_empty() || trimmed.to_ascii_lowercase().contains("success") {
        0
    } else {
        1
    }
}

/// Infer the exit code of a command run through the escalation service.
///
/// Empty output is exit 0, output carrying an error marker is exit 1,
/// anything else is exit 0.
pub fn infer_escalation_exit_code(output: &str) -> i32 {
    let lowered = output.trim().to_ascii_lowercase();
    if lowered.is_empty() {
        return 0;
    }
    if ESCALATION_ERROR_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        1
    } else {
        0
    }
}

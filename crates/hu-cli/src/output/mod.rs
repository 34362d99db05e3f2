//! Output formatting utilities for the CLI
//!
//! This module provides functions for formatting broker results for the
//! terminal, including the channel availability table, and colored
//! status messages.

use tabled::{settings::Style, Table, Tabled};

use hu_broker::packages::BatchReport;
use hu_broker::ChannelReport;
use hu_core::{Execution, ExecutionChannel, Outcome};

/// Format a channel probe report as an ASCII table
///
/// The channel `run_smart` would pick is marked in the last column.
///
/// # Arguments
/// * `report` - Probe results, most preferred channel first
/// * `loopback_endpoint` - `host:port` shown next to the loopback row
pub fn format_report(report: &ChannelReport, loopback_endpoint: &str) -> String {
    #[derive(Tabled)]
    struct ChannelRow {
        #[tabled(rename = "CHANNEL")]
        channel: String,
        #[tabled(rename = "MECHANISM")]
        mechanism: String,
        #[tabled(rename = "AVAILABLE")]
        available: String,
        #[tabled(rename = "SELECTED")]
        selected: String,
    }

    let selected = report.selected();
    let rows: Vec<ChannelRow> = report
        .channels
        .iter()
        .map(|status| {
            let mechanism = if status.channel == ExecutionChannel::LoopbackNetwork {
                format!("{} ({})", status.channel.description(), loopback_endpoint)
            } else {
                status.channel.description().to_string()
            };
            ChannelRow {
                channel: status.channel.to_string(),
                mechanism,
                available: if status.available { "yes" } else { "no" }.to_string(),
                selected: if status.channel == selected { "*" } else { "" }.to_string(),
            }
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Format an execution as `exit=<code>` followed by its output
pub fn format_execution(execution: &Execution) -> String {
    let result = &execution.result;
    let status = match result.outcome() {
        Outcome::SpawnFailure => format!("exit={} (not run)", result.exit_code),
        Outcome::Success | Outcome::CommandFailure(_) => format!("exit={}", result.exit_code),
    };
    if result.output.is_empty() {
        status
    } else {
        format!("{}\n{}", status, result.output)
    }
}

/// Format a batch report with a one-line summary
pub fn format_batch(report: &BatchReport) -> String {
    format!(
        "{}{} {}: {} ok, {} failed, {} skipped",
        report,
        report.action,
        plural(report.entries.len(), "package"),
        report.succeeded(),
        report.failed(),
        report.skipped()
    )
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{} {}", count, noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

/// Print a success message in green with a checkmark prefix
///
/// Outputs to stdout with green coloring for positive feedback to the user.
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix
///
/// Outputs to stderr with red coloring for error feedback to the user.
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow with a warning symbol prefix
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan with an info symbol prefix
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

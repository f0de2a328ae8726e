//! Console record formatting for terminal display.

use codeplayer_core::LogRecord;

use crate::colors;

/// Shown in place of an empty console.
pub const EMPTY_CONSOLE: &str = "No console output yet...";

/// Format one record: `[HH:MM:SS] <marker> <message>`.
///
/// Continuation lines of multi-line messages (pretty-printed objects) are
/// indented under the message.
pub fn format_record(record: &LogRecord) -> String {
    let prefix = format!("[{}] {} ", record.timestamp, colors::marker(record.kind));
    let indent = " ".repeat(prefix.chars().count());
    let message = record.message.replace('\n', &format!("\n{indent}"));
    format!(
        "{}[{}]{} {}{} {}{}",
        colors::DIM,
        record.timestamp,
        colors::RESET,
        colors::for_kind(record.kind),
        colors::marker(record.kind),
        message,
        colors::RESET
    )
}

/// Print the whole console.
pub fn print_logs(logs: &[LogRecord]) {
    if logs.is_empty() {
        println!("{}{}{}", colors::DIM, EMPTY_CONSOLE, colors::RESET);
        return;
    }
    for record in logs {
        println!("{}", format_record(record));
    }
}

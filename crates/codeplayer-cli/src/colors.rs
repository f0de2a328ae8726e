//! Terminal colors for CLI output.

use std::io::{self, Write};

use codeplayer_core::LogKind;

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const BLUE: &str = "\x1b[34m";
pub const CYAN: &str = "\x1b[36m";
pub const RED: &str = "\x1b[31m";

/// Color for a console record. Plain logs use the terminal default.
pub fn for_kind(kind: LogKind) -> &'static str {
    match kind {
        LogKind::Error => RED,
        LogKind::Warn => YELLOW,
        LogKind::Info => BLUE,
        LogKind::Log => "",
    }
}

/// Marker printed ahead of a console record.
pub fn marker(kind: LogKind) -> &'static str {
    match kind {
        LogKind::Error => "✖",
        LogKind::Warn => "⚠",
        LogKind::Info => "ℹ",
        LogKind::Log => "›",
    }
}

#[inline]
pub fn flush_stdout() {
    io::stdout().flush().ok();
}

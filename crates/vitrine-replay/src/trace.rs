//! Replay trace records and their output formats.

use std::io::{self, Write};

use serde::Serialize;

/// Observable state of one menu after a step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuSnapshot {
    pub id: String,
    /// Logical state, or `"unbound"`.
    pub state: String,
    /// Structural attribute present on the container.
    pub open: bool,
    /// `hidden` present on the panel.
    pub hidden: bool,
    pub opacity: f32,
    pub offset_y: f32,
    /// Panel accepts pointer input.
    pub interactive: bool,
}

/// One line of the trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceRecord {
    pub step: usize,
    pub at_ms: u64,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_prevented: Option<bool>,
    pub menus: Vec<MenuSnapshot>,
}

/// Write one JSON object per record.
pub fn write_jsonl(records: &[TraceRecord], mut out: impl Write) -> io::Result<()> {
    for record in records {
        serde_json::to_writer(&mut out, record)?;
        out.write_all(b"\n")?;
    }
    out.flush()
}

/// Write a compact human-readable rendition.
pub fn write_text(records: &[TraceRecord], mut out: impl Write) -> io::Result<()> {
    for record in records {
        write!(out, "{:>3} {:>6}ms {:<14}", record.step, record.at_ms, record.action)?;
        for menu in &record.menus {
            let marker = if menu.open { "+" } else { "-" };
            write!(out, " {}{}={}", marker, menu.id, menu.state)?;
        }
        if record.default_prevented == Some(true) {
            write!(out, " (default prevented)")?;
        }
        writeln!(out)?;
    }
    out.flush()
}

//! Output formatting: JSON, YAML and tables.
//!
//! Console replies and command results are documents; `--output` picks
//! how they are written. Table mode only changes the inventory and status
//! documents, everything else falls back to pretty JSON.

use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use lapbridge_core::{InventorySnapshot, ReaderStatus, TagEntry};

use crate::cli::{ColorMode, OutputFormat};

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render any serializable document in the chosen format.
pub fn render_document<T: Serialize + ?Sized>(format: OutputFormat, data: &T) -> String {
    match format {
        OutputFormat::Json | OutputFormat::Table => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
    }
}

/// Inventory document, or a summary line plus a tag table.
pub fn render_inventory(format: OutputFormat, snapshot: &InventorySnapshot, color: bool) -> String {
    if format != OutputFormat::Table {
        return render_document(format, snapshot);
    }

    let stream = if snapshot.update_enabled {
        paint("streaming", color, true)
    } else {
        paint("stopped", color, false)
    };
    let mut out = format!(
        "{} tags, {} flushes, {stream}",
        snapshot.count, snapshot.n_inventories
    );
    if let Some(ref ts) = snapshot.timestamp {
        out.push_str(&format!(", last flush {ts}"));
    }
    if !snapshot.tags.is_empty() {
        let rows: Vec<TagRow> = snapshot.tags.iter().map(TagRow::from).collect();
        out.push('\n');
        out.push_str(&render_table(&rows));
    }
    out
}

/// Status document, or a two-line summary.
pub fn render_status(format: OutputFormat, status: &ReaderStatus, color: bool) -> String {
    if format != OutputFormat::Table {
        return render_document(format, status);
    }
    let connected = if status.connected {
        paint("connected", color, true)
    } else {
        paint("disconnected", color, false)
    };
    match status.last_error {
        Some(ref err) => format!("reader: {connected}\nlast error: {err}"),
        None => format!("reader: {connected}"),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
    let _ = stdout.flush();
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: Serialize + ?Sized>(data: &T, compact: bool) -> String {
    let rendered = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    rendered.unwrap_or_else(|e| serialization_failure(&e))
}

fn render_yaml<T: Serialize + ?Sized>(data: &T) -> String {
    serde_yaml::to_string(data)
        .map(|s| s.trim_end().to_owned())
        .unwrap_or_else(|e| serialization_failure(&e))
}

fn serialization_failure(err: &dyn std::fmt::Display) -> String {
    serde_json::json!({ "error": format!("serialization failed: {err}") }).to_string()
}

fn paint(text: &str, color: bool, good: bool) -> String {
    match (color, good) {
        (false, _) => text.to_owned(),
        (true, true) => text.green().to_string(),
        (true, false) => text.red().to_string(),
    }
}

// ── Tag table ────────────────────────────────────────────────────────

#[derive(Tabled)]
struct TagRow {
    #[tabled(rename = "EPC")]
    epc: String,
    #[tabled(rename = "Ant")]
    antenna: u8,
    #[tabled(rename = "RSSI")]
    rssi: i8,
    #[tabled(rename = "Phase")]
    phase: i16,
    #[tabled(rename = "Seen")]
    seen: u32,
    #[tabled(rename = "First")]
    first: String,
    #[tabled(rename = "Last")]
    last: String,
}

impl From<&TagEntry> for TagRow {
    fn from(tag: &TagEntry) -> Self {
        Self {
            epc: tag.identifier.to_hex(),
            antenna: tag.antenna_id,
            rssi: tag.signal_strength,
            phase: tag.phase,
            seen: tag.times_seen,
            first: clock(tag.first_seen_time),
            last: clock(tag.last_seen_time),
        }
    }
}

fn clock(at: DateTime<Utc>) -> String {
    at.format("%H:%M:%S%.3f").to_string()
}

//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Output is formatted consistently and respects the quiet flag.
//! When `--json` is enabled, output is machine-readable JSON.

use std::fmt::Display;

use serde::Serialize;

use crate::core::entry::StoredEntry;
use crate::ledger::{AuditReport, Equipment, InventorySnapshot};
use crate::schedule::ScheduledRoast;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print a debug message (only in debug mode).
pub fn debug(message: impl Display, verbosity: Verbosity) {
    if verbosity == Verbosity::Debug {
        eprintln!("[debug] {}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Print a warning message (respects quiet mode).
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        eprintln!("warning: {}", message);
    }
}

/// Print a value as pretty JSON (always shown).
pub fn json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Format a weight in grams.
///
/// Values are shown with one decimal place; negative zero prints as zero.
pub fn format_grams(grams: f64) -> String {
    let rounded = (grams * 10.0).round() / 10.0;
    format!("{:.1}g", if rounded == 0.0 { 0.0 } else { rounded })
}

/// Format a list of items.
pub fn format_list<T: Display>(items: &[T], prefix: &str) -> String {
    items
        .iter()
        .map(|item| format!("{}{}", prefix, item))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format an inventory snapshot as two sections.
pub fn format_inventory(snapshot: &InventorySnapshot) -> String {
    let mut lines = vec!["Green coffee:".to_string()];
    if snapshot.green.is_empty() {
        lines.push("  (none)".to_string());
    }
    for row in &snapshot.green {
        let mut line = format!("  {:<28} {:>10}", row.name, format_grams(row.amount));
        let details = [row.origin.as_deref(), row.process.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(", ");
        if !details.is_empty() {
            line.push_str(&format!("  {}", details));
        }
        lines.push(line);
    }

    lines.push(String::new());
    lines.push("Roasted coffee:".to_string());
    if snapshot.roasted.is_empty() {
        lines.push("  (none)".to_string());
    }
    for row in &snapshot.roasted {
        let mut line = format!("  {:<28} {:>10}", row.name, format_grams(row.amount));
        if let Some(date) = row.roast_date {
            line.push_str(&format!("  roasted {}", date));
        }
        if let Some(days) = row.days_since_roast {
            line.push_str(&format!(" ({}d)", days));
        }
        if let Some(level) = &row.roast_level {
            line.push_str(&format!("  {}", level));
        }
        lines.push(line);
    }
    lines.join("\n")
}

/// Format one entry on a single line.
pub fn format_entry(entry: &StoredEntry) -> String {
    let name = entry.payload.coffee_name().unwrap_or("-");
    format!(
        "{}  {:<19} {:>10}  {:<24} {}",
        entry.created_at.as_datetime().format("%Y-%m-%d %H:%M"),
        entry.action_type().as_str(),
        format_grams(entry.amount_change),
        name,
        entry.entity_id
    )
}

/// Format a schedule on a single line.
pub fn format_schedule(roast: &ScheduledRoast) -> String {
    let mut line = format!(
        "{}  {:<10} {:<24} {:>10}",
        roast.scheduled_date,
        roast.state.as_str(),
        roast.coffee_name,
        format_grams(roast.green_weight)
    );
    if let Some(level) = &roast.roast_level {
        line.push_str(&format!("  {}", level));
    }
    line.push_str(&format!("  {}", roast.id));
    line
}

/// Format a piece of equipment on a single line.
pub fn format_equipment(item: &Equipment) -> String {
    let record = &item.record;
    let make = [record.brand.as_deref(), record.model.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    if make.is_empty() {
        format!("{:<24} {}", record.name, record.kind)
    } else {
        format!("{:<24} {:<12} {}", record.name, record.kind, make)
    }
}

/// Format an audit report: one line per group, then warnings.
pub fn format_audit(report: &AuditReport) -> String {
    let mut lines = Vec::new();
    for row in &report.rows {
        let mut line = format!(
            "{:<15} {:<28} {:>10}  ({} entries)",
            row.entity_type.as_str(),
            row.coffee_key,
            format_grams(row.total),
            row.entry_count
        );
        if !row.compensations.is_empty() {
            line.push_str(&format!("  {} compensated", row.compensations.len()));
        }
        lines.push(line);
    }
    if report.rows.is_empty() {
        lines.push("No inventory entries.".to_string());
    }
    if report.is_clean() {
        lines.push("No problems found.".to_string());
    } else {
        lines.push(String::new());
        lines.push(format_list(&report.warnings, "! "));
    }
    lines.join("\n")
}

//! Presentation-only formatting of engine output.
//!
//! Formatting never feeds back into the turn path: it reads an
//! [`EngineReport`] and produces a stable, serializable view. Source order
//! is the engine's discovery order, not sorted, so identical inputs render
//! identical output.

use crate::EngineReport;
use bonus_core::SourceKind;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};

/// One attributed contribution line.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SourceLine {
    pub source_kind: SourceKind,
    pub source_name: String,
    pub value: Decimal,
}

/// Total plus sources for one bonus type, in discovery order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TypeReport {
    pub total: Decimal,
    pub sources: Vec<SourceLine>,
}

/// Read-only report keyed by bonus type name.
pub type DashboardReport = BTreeMap<String, TypeReport>;

/// Build the export view of an engine report.
pub fn format(report: &EngineReport) -> DashboardReport {
    report
        .bonuses
        .iter()
        .map(|(ty, aggregate)| {
            let sources = aggregate
                .sources
                .iter()
                .map(|entry| SourceLine {
                    source_kind: entry.kind,
                    source_name: entry.display_name.clone(),
                    value: entry.value,
                })
                .collect();
            (
                ty.name().to_string(),
                TypeReport {
                    total: aggregate.total,
                    sources,
                },
            )
        })
        .collect()
}

/// JSON export of the dashboard view.
pub fn json_report(report: &EngineReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&format(report))
}

/// Render a human-readable summary. Empty types are pruned from the text
/// view only; the JSON export always carries the full enumeration.
pub fn render_text(report: &EngineReport, writer: &mut impl Write) -> io::Result<()> {
    let active: Vec<_> = report
        .bonuses
        .values()
        .filter(|aggregate| !aggregate.sources.is_empty())
        .collect();
    if active.is_empty() {
        writeln!(writer, "No active bonuses")?;
    } else {
        writeln!(writer, "Active bonuses:")?;
        for aggregate in active {
            writeln!(
                writer,
                "  {}: {}",
                aggregate.bonus_type,
                signed(aggregate.total)
            )?;
            for entry in &aggregate.sources {
                writeln!(
                    writer,
                    "    {} from {}: {}",
                    signed(entry.value),
                    entry.kind,
                    entry.display_name
                )?;
            }
        }
    }
    if !report.warnings.is_empty() {
        writeln!(writer, "Unknown sources:")?;
        for warning in &report.warnings {
            writeln!(writer, "  {} '{}'", warning.kind, warning.id)?;
        }
    }
    Ok(())
}

fn signed(value: Decimal) -> String {
    if value.is_sign_negative() {
        value.to_string()
    } else {
        format!("+{value}")
    }
}

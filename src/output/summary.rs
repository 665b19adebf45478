//! Console summary of zone durations.
//!
//! Prints the capture name and architecture, then one table per event kind:
//!
//! ```text
//! [CPU] Zones = 3
//! Zone   Count        Total          main
//! B          1 20ns (66.7%) 20ns (100.0%)
//! A          2 15ns (50.0%)  15ns (75.0%)
//! Total      3         30ns          30ns
//! ```
//!
//! `Total` percentages are relative to the grand total of all surviving
//! threads; per-thread percentages are relative to that thread's busiest zone.

use std::fmt::Write as _;
use std::io::Write as _;

use anyhow::Context;
use unicode_width::UnicodeWidthStr;

use super::Exporter;
use crate::aggregate::{Filters, ZoneSummary, aggregate, percent};
use crate::config::DurationUnit;
use crate::model::{Cpu, Gpu, TraceView};

/// Render the full console summary.
pub fn render(view: &TraceView<'_>, filters: Filters<'_>, unit: DurationUnit) -> String {
    let mut out = String::new();
    let capture = view.capture();
    writeln!(out, "[CAPTURE] Name = {}", capture.name()).unwrap();
    writeln!(out, "[CAPTURE] CpuArch = {}", capture.cpu_arch()).unwrap();

    for summary in [
        aggregate::<Cpu>(view, filters),
        aggregate::<Gpu>(view, filters),
    ] {
        writeln!(out, "[{}] Zones = {}", summary.kind, summary.event_count).unwrap();
        // A kind with no events at all gets no table.
        if summary.event_count > 0 {
            out.push_str(&render_table(&summary_cells(&summary, unit)));
        }
    }
    out
}

/// Build the table cells: header, one row per zone, then the total row.
fn summary_cells(summary: &ZoneSummary, unit: DurationUnit) -> Vec<Vec<String>> {
    let mut threads: Vec<_> = summary.threads.iter().collect();
    threads.sort_by(|a, b| a.name.cmp(&b.name));

    let with_percent = |duration: i64, whole: i64| {
        format!("{} ({:.1}%)", unit.format(duration), percent(duration, whole))
    };

    let mut rows = Vec::with_capacity(summary.zones.len() + 2);

    let mut header = vec!["Zone".to_string(), "Count".to_string(), "Total".to_string()];
    header.extend(threads.iter().map(|t| t.name.clone()));
    rows.push(header);

    for zone in &summary.zones {
        let mut row = vec![
            zone.name.clone(),
            zone.count.to_string(),
            with_percent(zone.total, summary.grand_total),
        ];
        row.extend(threads.iter().map(|t| {
            zone.duration_on(t.key)
                .map(|d| with_percent(d, t.busiest))
                .unwrap_or_default()
        }));
        rows.push(row);
    }

    let count: usize = summary.zones.iter().map(|z| z.count).sum();
    let mut total = vec![
        "Total".to_string(),
        count.to_string(),
        unit.format(summary.grand_total),
    ];
    total.extend(threads.iter().map(|t| unit.format(t.busy)));
    rows.push(total);

    rows
}

/// Lay out cells in columns. Each column is as wide as its widest cell plus a
/// separating space; the first column is left-aligned, the rest right-aligned.
fn render_table(rows: &[Vec<String>]) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..columns)
        .map(|col| {
            rows.iter()
                .filter_map(|row| row.get(col))
                .map(|cell| cell.width())
                .max()
                .unwrap_or(0)
                + 1
        })
        .collect();

    let mut out = String::new();
    for row in rows {
        let mut line = String::new();
        for (col, cell) in row.iter().enumerate() {
            let padding = " ".repeat(widths[col] - cell.width());
            if col == 0 {
                line.push_str(cell);
                line.push_str(&padding);
            } else {
                line.push_str(&padding);
                line.push_str(cell);
            }
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// Prints the summary to stdout.
pub struct SummaryExporter {
    zone_filters: Vec<String>,
    thread_filters: Vec<String>,
    unit: DurationUnit,
}

impl SummaryExporter {
    pub fn new(zone_filters: Vec<String>, thread_filters: Vec<String>, unit: DurationUnit) -> Self {
        Self {
            zone_filters,
            thread_filters,
            unit,
        }
    }

    pub fn render(&self, view: &TraceView<'_>) -> String {
        render(
            view,
            Filters::new(&self.zone_filters, &self.thread_filters),
            self.unit,
        )
    }
}

impl Exporter for SummaryExporter {
    fn name(&self) -> &'static str {
        "stdout"
    }

    fn export(&self, view: &TraceView<'_>) -> anyhow::Result<()> {
        let rendered = self.render(view);
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(rendered.as_bytes())
            .and_then(|()| stdout.flush())
            .context("Could not print summary")
    }
}

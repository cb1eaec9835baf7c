//! Plain-text rendering of page views for the terminal.

use std::fmt::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;

use crate::data::aggregate::{AggregateTable, ProgressTally};
use crate::data::model::{Dataset, DATE_PATTERN};
use crate::page::{ChartView, PageView};

const BAR_WIDTH: usize = 40;

/// Glyphs for successive progress segments; `.` marks what is left.
const SEGMENT_GLYPHS: [char; 4] = ['#', '=', '+', '*'];

/// Render a whole page: filters, charts, then up to `max_rows` rows.
pub fn render_page(view: &PageView, max_rows: usize) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "== {} ==", view.title)?;

    for (list, (_, selected)) in view.options.iter().zip(&view.selected) {
        writeln!(
            out,
            "  {}: {}  [{} options]",
            list.column,
            selected,
            list.choices().len()
        )?;
    }
    if let Some((start, end)) = view.date_range {
        writeln!(
            out,
            "  period: {} .. {}",
            start.format(DATE_PATTERN),
            end.format(DATE_PATTERN)
        )?;
    }
    writeln!(out, "  {} of {} rows", view.rows.len(), view.base_rows)?;

    for chart in &view.charts {
        writeln!(out)?;
        writeln!(out, "-- {} --", chart.title())?;
        match chart {
            ChartView::Counts { table, .. } => out.push_str(&aggregate_table(table)?),
            ChartView::Progress { tally, .. } => progress_bar(&mut out, tally)?,
            ChartView::Totals { totals, .. } => {
                writeln!(out, "rows: {}", totals.rows)?;
                writeln!(out, "{}: {}", totals.sum_column, totals.sum)?;
            }
            ChartView::Series { points, .. } => bars(&mut out, points)?,
        }
    }

    if max_rows > 0 {
        writeln!(out)?;
        writeln!(out, "-- rows --")?;
        out.push_str(&dataset_table(&view.rows, max_rows)?);
        if view.rows.len() > max_rows {
            writeln!(out, "... {} more", view.rows.len() - max_rows)?;
        }
    }
    Ok(out)
}

/// Boxed table of an aggregate with a trailing count column.
pub fn aggregate_table(table: &AggregateTable) -> Result<String> {
    let mut headers = table.columns.clone();
    headers.push("count".to_string());
    let rows = table
        .rows
        .iter()
        .map(|r| {
            r.key
                .iter()
                .cloned()
                .map(Some)
                .chain(std::iter::once(Some(r.count.to_string())))
                .collect()
        })
        .collect();
    boxed(&headers, rows)
}

/// Boxed table of the first `max_rows` rows of a dataset.
pub fn dataset_table(ds: &Dataset, max_rows: usize) -> Result<String> {
    let rows = ds
        .records
        .iter()
        .take(max_rows)
        .map(|rec| ds.column_names.iter().map(|c| rec.get(c).key()).collect())
        .collect();
    boxed(&ds.column_names, rows)
}

fn boxed(headers: &[String], rows: Vec<Vec<Option<String>>>) -> Result<String> {
    if headers.is_empty() {
        return Ok("(no columns)\n".to_string());
    }
    let schema = Arc::new(Schema::new(
        headers
            .iter()
            .map(|h| Field::new(h, DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ));
    let columns: Vec<ArrayRef> = (0..headers.len())
        .map(|i| {
            let cells: Vec<Option<String>> = rows.iter().map(|r| r[i].clone()).collect();
            Arc::new(StringArray::from(cells)) as ArrayRef
        })
        .collect();
    let batch = RecordBatch::try_new(schema, columns).context("building table")?;
    let table = pretty_format_batches(&[batch]).context("formatting table")?;
    Ok(format!("{table}\n"))
}

/// Stacked bar: one glyph run per category, `.` for the remainder.
///
/// Segment widths come from cumulative counts, so the bar never grows past
/// [`BAR_WIDTH`].
pub fn progress_bar(out: &mut String, tally: &ProgressTally) -> fmt::Result {
    let scale = tally.target.max(tally.achieved()).max(1) as f64;
    let cells = |n: u64| (((n as f64 / scale) * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);

    let mut bar = String::new();
    let mut legend = String::new();
    let mut running = 0u64;
    for (i, (label, n)) in tally.parts.iter().enumerate() {
        let glyph = SEGMENT_GLYPHS[i % SEGMENT_GLYPHS.len()];
        let from = cells(running);
        running += n;
        bar.extend(std::iter::repeat(glyph).take(cells(running) - from));
        write!(legend, "  {glyph} {label}: {n}")?;
    }
    let filled = bar.chars().count();
    bar.extend(std::iter::repeat('.').take(BAR_WIDTH.saturating_sub(filled)));

    writeln!(out, "[{bar}] {}/{}", tally.achieved(), tally.target)?;
    writeln!(out, "{legend}  . Faltando: {}", tally.remaining)
}

/// Horizontal bars scaled to the largest value.
pub fn bars(out: &mut String, points: &[(String, f64)]) -> fmt::Result {
    let max = points.iter().map(|(_, v)| *v).fold(0.0_f64, f64::max);
    let width = points.iter().map(|(l, _)| l.chars().count()).max().unwrap_or(0);
    for (label, value) in points {
        let n = if max > 0.0 {
            ((value / max) * BAR_WIDTH as f64).round().max(0.0) as usize
        } else {
            0
        };
        writeln!(out, "{label:<width$} {} {value}", "#".repeat(n))?;
    }
    Ok(())
}

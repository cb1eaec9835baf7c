use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::filter::FilterColumn;
use super::model::Dataset;
use crate::error::{DashError, Result};

/// Key of the derived total row.
pub const TOTAL: &str = "Total";

// ---------------------------------------------------------------------------
// AggregateTable
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateRow {
    /// One entry per grouping column.
    pub key: Vec<String>,
    pub count: usize,
    /// Set only on the row appended by [`AggregateTable::with_total`]; a
    /// category that happens to be called "Total" stays a data row.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub total: bool,
}

impl AggregateRow {
    pub fn new(key: Vec<String>, count: usize) -> Self {
        AggregateRow {
            key,
            count,
            total: false,
        }
    }
}

/// Count per category, one or more grouping columns wide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateTable {
    pub columns: Vec<String>,
    pub rows: Vec<AggregateRow>,
}

impl AggregateTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Count stored under the data row `key`, if that key was observed.
    pub fn get(&self, key: &[&str]) -> Option<usize> {
        self.rows
            .iter()
            .filter(|r| !r.total)
            .find(|r| r.key.len() == key.len() && r.key.iter().zip(key).all(|(a, b)| a == b))
            .map(|r| r.count)
    }

    /// Count of the derived total row, if one was appended.
    pub fn total(&self) -> Option<usize> {
        self.rows.iter().find(|r| r.total).map(|r| r.count)
    }

    /// Sum of all category counts, excluding a derived total row.
    pub fn sum(&self) -> usize {
        self.rows.iter().filter(|r| !r.total).map(|r| r.count).sum()
    }

    /// Append a `"Total"` row. Calling it twice keeps a single total row.
    pub fn with_total(mut self) -> Self {
        let sum = self.sum();
        self.rows.retain(|r| !r.total);
        let mut key = vec![TOTAL.to_string()];
        key.resize(self.columns.len().max(1), String::new());
        self.rows.push(AggregateRow {
            key,
            count: sum,
            total: true,
        });
        self
    }
}

/// Frequency of each distinct value of `column`, nulls excluded.
///
/// Rows are ordered by descending count, ties by ascending value.
pub fn value_counts(dataset: &Dataset, column: &str) -> Result<AggregateTable> {
    value_counts_by(dataset, &FilterColumn::new(column))
}

/// [`value_counts`] keyed the way `column` compares values, so accent
/// variants of a free-text column fall into one row.
pub fn value_counts_by(dataset: &Dataset, column: &FilterColumn) -> Result<AggregateTable> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for value in dataset.column(&column.name)? {
        if let Some(key) = column.key_of(value) {
            *counts.entry(key).or_default() += 1;
        }
    }

    let mut rows: Vec<AggregateRow> = counts
        .into_iter()
        .map(|(k, count)| AggregateRow::new(vec![k], count))
        .collect();
    // stable sort keeps the ascending key order among equal counts
    rows.sort_by(|a, b| b.count.cmp(&a.count));

    Ok(AggregateTable {
        columns: vec![column.name.clone()],
        rows,
    })
}

/// Count rows per observed `(a, b)` pair, ordered by pair.
///
/// Rows with a null in either column are left out; pairs that never occur
/// are not listed.
pub fn group_by_count(dataset: &Dataset, a: &str, b: &str) -> Result<AggregateTable> {
    group_by_count_by(dataset, &FilterColumn::new(a), &FilterColumn::new(b))
}

/// [`group_by_count`] with per-column comparison keys.
pub fn group_by_count_by(
    dataset: &Dataset,
    a: &FilterColumn,
    b: &FilterColumn,
) -> Result<AggregateTable> {
    dataset.require_column(&a.name)?;
    dataset.require_column(&b.name)?;

    let mut counts: BTreeMap<(String, String), usize> = BTreeMap::new();
    for rec in &dataset.records {
        if let (Some(ka), Some(kb)) = (a.key_of(rec.get(&a.name)), b.key_of(rec.get(&b.name))) {
            *counts.entry((ka, kb)).or_default() += 1;
        }
    }

    Ok(AggregateTable {
        columns: vec![a.name.clone(), b.name.clone()],
        rows: counts
            .into_iter()
            .map(|((ka, kb), count)| AggregateRow::new(vec![ka, kb], count))
            .collect(),
    })
}

// ---------------------------------------------------------------------------
// Progress toward a target
// ---------------------------------------------------------------------------

/// A named slice of a progress bar: rows whose column equals `value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub label: String,
    pub value: String,
}

impl Category {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Category {
            label: label.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressTally {
    pub target: u64,
    /// `(label, count)` per category, in declaration order.
    pub parts: Vec<(String, u64)>,
    /// `max(0, target - Σ parts)`.
    pub remaining: u64,
}

impl ProgressTally {
    pub fn new(target: u64, parts: Vec<(String, u64)>) -> Self {
        let achieved: u64 = parts.iter().map(|(_, n)| n).sum();
        ProgressTally {
            target,
            remaining: target.saturating_sub(achieved),
            parts,
        }
    }

    pub fn achieved(&self) -> u64 {
        self.parts.iter().map(|(_, n)| n).sum()
    }

    pub fn part(&self, label: &str) -> Option<u64> {
        self.parts.iter().find(|(l, _)| l == label).map(|(_, n)| *n)
    }
}

/// Tally rows of `column` against `categories` and a fixed target.
///
/// A row counts toward the first category whose value it equals, so
/// repeated category values cannot count a row twice. Rows matching no
/// category are not reported; they stay inside `remaining`.
pub fn progress_tally(
    dataset: &Dataset,
    column: &str,
    target: u64,
    categories: &[Category],
) -> Result<ProgressTally> {
    let mut counts = vec![0u64; categories.len()];
    for value in dataset.column(column)? {
        let Some(key) = value.key() else { continue };
        if let Some(i) = categories.iter().position(|c| c.value == key) {
            counts[i] += 1;
        }
    }

    let parts = categories
        .iter()
        .zip(counts)
        .map(|(c, n)| (c.label.clone(), n))
        .collect();
    Ok(ProgressTally::new(target, parts))
}

// ---------------------------------------------------------------------------
// Sheet totals and label/value series
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Totals {
    pub rows: usize,
    pub sum_column: String,
    pub sum: f64,
}

/// Row count plus the sum of a numeric column. Nulls add nothing.
pub fn totals(dataset: &Dataset, sum_column: &str) -> Result<Totals> {
    let mut sum = 0.0;
    for (row, value) in dataset.column(sum_column)?.enumerate() {
        if value.is_null() {
            continue;
        }
        sum += value.as_f64().ok_or_else(|| DashError::Parse {
            row,
            column: sum_column.to_string(),
            value: value.to_string(),
            expected: "a number",
        })?;
    }
    Ok(Totals {
        rows: dataset.len(),
        sum_column: sum_column.to_string(),
        sum,
    })
}

/// `(label, value)` per row, skipping rows where either side is missing
/// or the value is not numeric.
pub fn series(dataset: &Dataset, label_column: &str, value_column: &str) -> Result<Vec<(String, f64)>> {
    dataset.require_column(label_column)?;
    dataset.require_column(value_column)?;
    Ok(dataset
        .records
        .iter()
        .filter_map(|rec| {
            let label = rec.get(label_column).key()?;
            let value = rec.get(value_column).as_f64()?;
            Some((label, value))
        })
        .collect())
}

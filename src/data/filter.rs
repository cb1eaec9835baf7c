use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::model::{Dataset, Value};
use super::normalize::strip_diacritics;
use crate::error::{DashError, Result};

/// Wildcard selection: no constraint on the column.
pub const ALL: &str = "Todos";

// ---------------------------------------------------------------------------
// Column declarations
// ---------------------------------------------------------------------------

/// How values of a filter column are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Byte-for-byte comparison of the display form.
    #[default]
    Exact,
    /// Free-text identifier (municipality-like names): accents are stripped
    /// from both sides before comparing.
    FreeText,
}

/// A filterable column as declared by a dashboard page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterColumn {
    pub name: String,
    /// Widget caption; defaults to the column name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub kind: ColumnKind,
    /// Optional columns may be missing from some sheets; their filter then
    /// degrades to a no-op.
    #[serde(default)]
    pub optional: bool,
}

impl FilterColumn {
    pub fn new(name: impl Into<String>) -> Self {
        FilterColumn {
            name: name.into(),
            label: None,
            kind: ColumnKind::Exact,
            optional: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn free_text(mut self) -> Self {
        self.kind = ColumnKind::FreeText;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// Comparison key of a selection string.
    pub fn normalize(&self, text: &str) -> String {
        match self.kind {
            ColumnKind::Exact => text.to_string(),
            ColumnKind::FreeText => strip_diacritics(text),
        }
    }

    /// Comparison key of a cell; `None` for nulls.
    pub fn key_of(&self, value: &Value) -> Option<String> {
        value.key().map(|k| match self.kind {
            ColumnKind::Exact => k,
            ColumnKind::FreeText => strip_diacritics(&k),
        })
    }
}

// ---------------------------------------------------------------------------
// FilterSpec – the user's selections for one render cycle
// ---------------------------------------------------------------------------

/// Inclusive date window over one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub column: String,
    pub optional: bool,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(column: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        DateRange {
            column: column.into(),
            optional: false,
            start,
            end,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Selected value per filter column plus an optional date window.
///
/// Built fresh from user input on every render; selecting the same column
/// twice keeps the last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    selections: BTreeMap<String, (FilterColumn, String)>,
    date_range: Option<DateRange>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the selection for `column`.
    pub fn select(mut self, column: FilterColumn, value: impl Into<String>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: FilterColumn, value: impl Into<String>) {
        self.selections
            .insert(column.name.clone(), (column, value.into()));
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    /// Selected value for `column`, `"Todos"` when nothing was chosen.
    pub fn selected(&self, column: &str) -> &str {
        self.selections
            .get(column)
            .map(|(_, v)| v.as_str())
            .unwrap_or(ALL)
    }

    pub fn date_range(&self) -> Option<&DateRange> {
        self.date_range.as_ref()
    }

    /// Whether no selection constrains anything.
    pub fn is_unconstrained(&self) -> bool {
        self.date_range.is_none() && self.selections.values().all(|(_, v)| v == ALL)
    }
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

/// An equality constraint resolved against a concrete schema.
struct Equals<'a> {
    column: &'a FilterColumn,
    key: String,
}

/// Return the rows of `dataset` passing every constraint in `spec`.
///
/// A row passes when:
/// * every non-wildcard selection equals the row's value in that column
///   (after accent stripping for free-text columns), and
/// * its date lies inside the date window, if one is set.
///
/// Constraints are resolved against the schema first and the whole date
/// column is parsed before any row is dropped, so neither the result nor
/// the error depends on the order selections were made in.
pub fn apply(dataset: &Dataset, spec: &FilterSpec) -> Result<Dataset> {
    let mut equals = Vec::new();
    for (column, value) in spec.selections.values() {
        if value == ALL {
            continue;
        }
        if !dataset.has_column(&column.name) {
            if column.optional {
                log::warn!(
                    "filter on optional column '{}' skipped: not in this sheet",
                    column.name
                );
                continue;
            }
            return Err(DashError::missing_column(&column.name));
        }
        equals.push(Equals {
            column,
            key: column.normalize(value),
        });
    }

    let dates = match &spec.date_range {
        Some(range) if dataset.has_column(&range.column) => {
            Some((range, parse_dates(dataset, &range.column)?))
        }
        Some(range) if range.optional => {
            log::warn!(
                "date filter on optional column '{}' skipped: not in this sheet",
                range.column
            );
            None
        }
        Some(range) => return Err(DashError::missing_column(&range.column)),
        None => None,
    };

    let records = dataset
        .records
        .iter()
        .enumerate()
        .filter(|(i, rec)| {
            let equal = equals.iter().all(|eq| {
                eq.column.key_of(rec.get(&eq.column.name)).as_deref() == Some(eq.key.as_str())
            });
            let in_range = dates
                .as_ref()
                .map_or(true, |(range, parsed)| range.contains(parsed[*i]));
            equal && in_range
        })
        .map(|(_, rec)| rec.clone())
        .collect::<Vec<_>>();

    log::debug!(
        "filter kept {} of {} rows ({} equality constraints, date window: {})",
        records.len(),
        dataset.len(),
        equals.len(),
        dates.is_some()
    );
    Ok(dataset.with_records(records))
}

/// Parse every cell of `column` as a date, failing on the first bad cell.
fn parse_dates(dataset: &Dataset, column: &str) -> Result<Vec<NaiveDate>> {
    dataset
        .records
        .iter()
        .enumerate()
        .map(|(row, rec)| {
            let value = rec.get(column);
            value.as_date().ok_or_else(|| DashError::Parse {
                row,
                column: column.to_string(),
                value: value.to_string(),
                expected: "a dd/mm/yyyy date",
            })
        })
        .collect()
}

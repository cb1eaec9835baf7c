use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Serialize, Serializer};

use crate::error::{DashError, Result};

/// Day/month/year pattern used for textual dates in the source sheets.
pub const DATE_PATTERN: &str = "%d/%m/%Y";

// ---------------------------------------------------------------------------
// Value – a single cell
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value as read from a sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// Native date cell (workbook date or parquet date column).
    Date(NaiveDate),
    Null,
}

static NULL: Value = Value::Null;

// -- Manual Eq/Ord so Value can key BTreeMap/BTreeSet --

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use Value::*;
        fn discriminant(v: &Value) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
                Date(_) => 5,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            (Date(a), Date(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::String(s) => s.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Bool(b) => b.hash(state),
            Value::Date(d) => d.hash(state),
            Value::Null => {}
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::String(s) => serializer.serialize_str(s),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Date(d) => serializer.collect_str(&d.format(DATE_PATTERN)),
            Value::Null => serializer.serialize_unit(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key() {
            Some(key) => f.write_str(&key),
            None => f.write_str("<null>"),
        }
    }
}

impl Value {
    /// Textual form used for option lists and equality filters.
    ///
    /// Integral floats print without a fraction so a sheet column that
    /// arrives as `3.0` matches a selection of `"3"`. Null has no key.
    pub fn key(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 => {
                Some(format!("{}", *v as i64))
            }
            Value::Float(v) => Some(v.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Date(d) => Some(d.format(DATE_PATTERN).to_string()),
            Value::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the cell; text is parsed leniently.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Integer(i) => Some(*i as f64),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Date view of the cell. Text must match [`DATE_PATTERN`] exactly.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::String(s) => NaiveDate::parse_from_str(s.trim(), DATE_PATTERN).ok(),
            _ => None,
        }
    }

    /// Guess a typed value from raw text (CSV cells).
    ///
    /// Text becomes a number only when the number prints back as the same
    /// text, so codes like `007` or `1e2` keep their spelling.
    pub fn infer(s: &str) -> Value {
        if s.is_empty() {
            return Value::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            if i.to_string() == s {
                return Value::Integer(i);
            }
        } else if let Ok(f) = s.parse::<f64>() {
            if f.is_finite() && f.to_string() == s {
                return Value::Float(f);
            }
        }
        if s == "true" || s == "false" {
            return Value::Bool(s == "true");
        }
        Value::String(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Record – one row of a sheet
// ---------------------------------------------------------------------------

/// A single row: column name → value.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Record {
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    /// Value of `column`, or `Null` when the row does not carry it.
    pub fn get(&self, column: &str) -> &Value {
        self.fields.get(column).unwrap_or(&NULL)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Record {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Dataset – one loaded sheet
// ---------------------------------------------------------------------------

/// An immutable table of records sharing one column schema.
///
/// Operations that narrow or rewrite the table return a new `Dataset`;
/// the source is never mutated.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Dataset {
    /// Column names in source order.
    pub column_names: Vec<String>,
    /// All rows, in source order.
    pub records: Vec<Record>,
}

impl Dataset {
    /// Build a dataset, padding rows that lack a schema column with `Null`.
    pub fn new(column_names: Vec<String>, records: Vec<Record>) -> Self {
        let records = records
            .into_iter()
            .map(|mut rec| {
                for col in &column_names {
                    rec.fields.entry(col.clone()).or_insert(Value::Null);
                }
                rec
            })
            .collect();
        Dataset {
            column_names,
            records,
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_names.iter().any(|c| c == column)
    }

    /// Fail with a schema error unless `column` is part of the schema.
    pub fn require_column(&self, column: &str) -> Result<()> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(DashError::missing_column(column))
        }
    }

    /// Iterate one column's values in row order.
    pub fn column<'a>(&'a self, column: &'a str) -> Result<impl Iterator<Item = &'a Value> + 'a> {
        self.require_column(column)?;
        Ok(self.records.iter().map(move |r| r.get(column)))
    }

    /// Derive a dataset with the same schema and the given rows.
    pub fn with_records(&self, records: Vec<Record>) -> Dataset {
        Dataset {
            column_names: self.column_names.clone(),
            records,
        }
    }

    /// Replace nulls in `column` with `label`.
    ///
    /// Applied once at load time; a no-op when the column is absent.
    pub fn fill_missing(&self, column: &str, label: &str) -> Dataset {
        if !self.has_column(column) {
            return self.clone();
        }
        let records = self
            .records
            .iter()
            .map(|rec| {
                let mut rec = rec.clone();
                if let Some(v) = rec.fields.get_mut(column) {
                    if v.is_null() {
                        *v = Value::String(label.to_string());
                    }
                }
                rec
            })
            .collect();
        self.with_records(records)
    }
}

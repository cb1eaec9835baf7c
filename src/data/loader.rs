use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{DataType, Date32Type, Float32Type, Float64Type, Int32Type, Int64Type};
use calamine::{open_workbook_auto, Data, Range, Reader};
use chrono::NaiveDate;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Dataset, Record, Value};
use crate::error::{DashError, Result};

/// Extensions resolved, in order, when the source is a directory of sheets.
const SHEET_FILE_EXTENSIONS: [&str; 3] = ["csv", "json", "parquet"];

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load the sheet named `sheet` from `source`.
///
/// Supported sources:
/// * workbook file (`.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods`) – sheet by name,
///   first row is the header
/// * directory – the sheet is `<dir>/<sheet>.csv`, `.json` or `.parquet`
/// * single `.csv` / `.json` / `.parquet` file – its file stem must equal `sheet`
///
/// Fails with [`DashError::SourceNotFound`] when `source` does not exist and
/// with [`DashError::Schema`] when the sheet does not.
pub fn load(source: &Path, sheet: &str) -> Result<Dataset> {
    if !source.exists() {
        return Err(DashError::SourceNotFound(source.to_path_buf()));
    }

    let dataset = if source.is_dir() {
        let path = SHEET_FILE_EXTENSIONS
            .iter()
            .map(|ext| source.join(format!("{sheet}.{ext}")))
            .find(|p| p.is_file())
            .ok_or_else(|| missing_sheet(source, sheet))?;
        load_sheet_file(&path)?
    } else {
        match extension(source).as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => load_workbook(source, sheet)?,
            _ => {
                let stem = source.file_stem().and_then(|s| s.to_str()).unwrap_or("");
                if stem != sheet {
                    return Err(missing_sheet(source, sheet));
                }
                load_sheet_file(source)?
            }
        }
    };

    log::info!(
        "Loaded sheet '{sheet}' from {}: {} rows, columns {:?}",
        source.display(),
        dataset.len(),
        dataset.column_names
    );
    Ok(dataset)
}

/// Loaded sheets keyed by `(source, sheet)`.
///
/// Loading is idempotent, so a page view that touches the same sheet twice
/// reads it once.
#[derive(Debug, Default)]
pub struct SheetCache {
    sheets: HashMap<(PathBuf, String), Arc<Dataset>>,
}

impl SheetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load(&mut self, source: &Path, sheet: &str) -> Result<Arc<Dataset>> {
        let key = (source.to_path_buf(), sheet.to_string());
        if let Some(ds) = self.sheets.get(&key) {
            log::debug!("sheet '{sheet}' served from cache");
            return Ok(Arc::clone(ds));
        }
        let ds = Arc::new(load(source, sheet)?);
        self.sheets.insert(key, Arc::clone(&ds));
        Ok(ds)
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn missing_sheet(source: &Path, sheet: &str) -> DashError {
    DashError::Schema(format!("sheet '{sheet}' not found in {}", source.display()))
}

fn source_error(path: &Path, message: &str, source: anyhow::Error) -> DashError {
    DashError::Source {
        path: path.to_path_buf(),
        message: message.to_string(),
        source,
    }
}

/// Decode a single-sheet file, dispatching by extension.
fn load_sheet_file(path: &Path) -> Result<Dataset> {
    let decoded = match extension(path).as_str() {
        "csv" => load_csv(path),
        "json" => load_json(path),
        "parquet" | "pq" => load_parquet(path),
        other => Err(anyhow!("unsupported file extension: .{other}")),
    };
    decoded.map_err(|e| source_error(path, "decoding sheet file", e))
}

/// Make header names unique the way spreadsheet tools do: `A`, `A.1`, `A.2`.
///
/// A renamed header never reuses a name already present in the row.
fn unique_headers(raw: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut taken: BTreeSet<String> = BTreeSet::new();
    let mut suffix: BTreeMap<String, usize> = BTreeMap::new();
    raw.into_iter()
        .enumerate()
        .map(|(i, name)| {
            let name = if name.trim().is_empty() {
                format!("Unnamed: {i}")
            } else {
                name
            };
            let mut unique = name.clone();
            while taken.contains(&unique) {
                let n = suffix.entry(name.clone()).or_default();
                *n += 1;
                unique = format!("{name}.{n}");
            }
            taken.insert(unique.clone());
            unique
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Workbook loader
// ---------------------------------------------------------------------------

fn load_workbook(path: &Path, sheet: &str) -> Result<Dataset> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| source_error(path, "opening workbook", anyhow!("{e}")))?;

    if !workbook.sheet_names().iter().any(|name| name == sheet) {
        return Err(missing_sheet(path, sheet));
    }

    let range = workbook
        .worksheet_range(sheet)
        .map_err(|e| source_error(path, "reading worksheet", anyhow!("{e}")))?;
    Ok(range_to_dataset(&range))
}

/// First row is the header; fully blank rows are dropped.
fn range_to_dataset(range: &Range<Data>) -> Dataset {
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Dataset::default();
    };
    let column_names = unique_headers(header.iter().map(|cell| match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }));

    let records = rows
        .filter(|row| row.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|row| {
            column_names
                .iter()
                .enumerate()
                .map(|(i, col)| (col.clone(), row.get(i).map_or(Value::Null, cell_to_value)))
                .collect::<Record>()
        })
        .collect();

    Dataset::new(column_names, records)
}

fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Int(i) => Value::Integer(*i),
        Data::Float(f) => Value::Float(*f),
        Data::String(s) if s.is_empty() => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(d) => Value::Date(d.date()),
            None => {
                log::warn!("workbook date cell {dt:?} is out of range");
                Value::Null
            }
        },
        Data::DateTimeIso(s) => s
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .map_or_else(|| Value::String(s.clone()), Value::Date),
        Data::DurationIso(s) => Value::String(s.clone()),
        Data::Error(e) => {
            log::warn!("workbook cell holds an error value: {e:?}");
            Value::Null
        }
        Data::Empty => Value::Null,
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// Header row with column names; cell types are guessed per cell.
fn load_csv(path: &Path) -> anyhow::Result<Dataset> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let column_names = unique_headers(
        reader
            .headers()
            .context("reading CSV headers")?
            .iter()
            .map(|h| h.to_string()),
    );

    let mut records = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let rec: Record = column_names
            .iter()
            .enumerate()
            .map(|(i, col)| (col.clone(), Value::infer(record.get(i).unwrap_or(""))))
            .collect();
        records.push(rec);
    }

    Ok(Dataset::new(column_names, records))
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON, the layout of `df.to_json(orient='records')`:
///
/// ```json
/// [
///   { "Assentamento": "Alegria", "Andamento": "Concluído" },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> anyhow::Result<Dataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let rows = root.as_array().context("Expected top-level JSON array")?;

    let mut column_names: Vec<String> = Vec::new();
    let mut records = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let obj = row
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for key in obj.keys() {
            if !column_names.contains(key) {
                column_names.push(key.clone());
            }
        }
        records.push(obj.iter().map(|(k, v)| (k.clone(), json_to_value(v))).collect());
    }

    Ok(Dataset::new(column_names, records))
}

fn json_to_value(val: &JsonValue) -> Value {
    match val {
        JsonValue::String(s) if s.is_empty() => Value::Null,
        JsonValue::String(s) => Value::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Value::Float(f)
            } else {
                Value::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Null => Value::Null,
        other => Value::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Flat Parquet table: strings, integers, floats, booleans and `Date32`
/// columns. Works with files written by pandas, Polars or Arrow.
fn load_parquet(path: &Path) -> anyhow::Result<Dataset> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let column_names: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut records = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for row in 0..batch.num_rows() {
            let mut rec = Record::default();
            for (i, name) in column_names.iter().enumerate() {
                let value = extract_value(batch.column(i), row)
                    .with_context(|| format!("Row {row}: failed to read '{name}'"))?;
                rec.fields.insert(name.clone(), value);
            }
            records.push(rec);
        }
    }

    Ok(Dataset::new(column_names, records))
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_value(col: &ArrayRef, row: usize) -> anyhow::Result<Value> {
    if col.is_null(row) {
        return Ok(Value::Null);
    }
    let value = match col.data_type() {
        DataType::Utf8 => Value::String(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Value::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => Value::Integer(col.as_primitive::<Int32Type>().value(row) as i64),
        DataType::Int64 => Value::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::Float32 => Value::Float(col.as_primitive::<Float32Type>().value(row) as f64),
        DataType::Float64 => Value::Float(col.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => Value::Bool(col.as_boolean().value(row)),
        DataType::Date32 => match col.as_primitive::<Date32Type>().value_as_date(row) {
            Some(d) => Value::Date(d),
            None => bail!("date out of range"),
        },
        other => bail!("unsupported column type {other:?}"),
    };
    Ok(value)
}

//! Typed per-sample records
//!
//! Tables arrive as loosely typed delimited text. Cells are parsed into
//! [`FieldValue`]s here, against the declared schema kind where one exists,
//! so a malformed numeric field is reported at load time with the file and
//! sample it came from.

use crate::error::{ReportError, Result, SchemaError};
use crate::schema::{ColumnKind, ReportSchema, SAMPLE};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Cell contents treated as "no value"
pub const MISSING_TOKENS: &[&str] = &["", "NA", "NaN", "nan"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    /// Parse a raw cell. `Ok(None)` is a missing value; `Err` carries the
    /// declared kind the cell failed to satisfy.
    pub fn parse(raw: &str, kind: Option<ColumnKind>) -> Result<Option<Self>, ColumnKind> {
        let raw = raw.trim();
        if MISSING_TOKENS.contains(&raw) {
            return Ok(None);
        }
        let value = match kind {
            Some(ColumnKind::Text) => FieldValue::text(raw),
            Some(ColumnKind::Integer) => parse_integer(raw).ok_or(ColumnKind::Integer)?,
            Some(ColumnKind::Float) => raw
                .parse::<f64>()
                .map(FieldValue::Float)
                .map_err(|_| ColumnKind::Float)?,
            Some(ColumnKind::Boolean) => parse_bool(raw)
                .map(FieldValue::Boolean)
                .ok_or(ColumnKind::Boolean)?,
            None => Self::infer(raw),
        };
        Ok(Some(value))
    }

    fn infer(raw: &str) -> Self {
        if let Some(b) = parse_bool(raw) {
            FieldValue::Boolean(b)
        } else if let Ok(i) = raw.parse::<i64>() {
            FieldValue::Integer(i)
        } else if let Ok(f) = raw.parse::<f64>() {
            FieldValue::Float(f)
        } else {
            FieldValue::text(raw)
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.as_f64().is_some()
    }

    /// Equality with integers and floats compared by numeric value
    pub fn same_as(&self, other: &FieldValue) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Boolean(true) => f.write_str("True"),
            FieldValue::Boolean(false) => f.write_str("False"),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::text(value)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "True" | "TRUE" | "true" => Some(true),
        "False" | "FALSE" | "false" => Some(false),
        _ => None,
    }
}

fn parse_integer(raw: &str) -> Option<FieldValue> {
    if let Ok(i) = raw.parse::<i64>() {
        return Some(FieldValue::Integer(i));
    }
    // Summaries written through a float column render counts as "123.0"
    let f = raw.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(FieldValue::Integer(f as i64))
    } else {
        None
    }
}

/// All known fields for one sample. The sample id is held apart from the
/// other columns and is never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub sample: String,
    fields: BTreeMap<String, FieldValue>,
}

impl SampleRecord {
    pub fn new(sample: impl Into<String>) -> Self {
        Self {
            sample: sample.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, column: &str, value: impl Into<FieldValue>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.fields.get(column)
    }

    pub fn get_f64(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(FieldValue::as_f64)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    pub fn insert(&mut self, column: &str, value: impl Into<FieldValue>) {
        self.fields.insert(column.to_string(), value.into());
    }

    pub fn remove(&mut self, column: &str) -> Option<FieldValue> {
        self.fields.remove(column)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    /// Value of any column including `Sample`
    pub fn value(&self, column: &str) -> Option<FieldValue> {
        if column == SAMPLE {
            Some(FieldValue::text(self.sample.as_str()))
        } else {
            self.get(column).cloned()
        }
    }
}

/// Partial records produced by one pipeline stage
#[derive(Debug, Clone, PartialEq)]
pub struct StageTable {
    pub stage: String,
    pub source: PathBuf,
    /// Columns other than `Sample`, in header order
    pub columns: Vec<String>,
    pub records: Vec<SampleRecord>,
}

impl StageTable {
    pub fn new(stage: impl Into<String>, columns: Vec<String>, records: Vec<SampleRecord>) -> Self {
        Self {
            stage: stage.into(),
            source: PathBuf::new(),
            columns,
            records,
        }
    }

    /// Read a tab-delimited stage summary
    pub fn from_path<P: AsRef<Path>>(stage: &str, path: P, schema: &ReportSchema) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Self::from_reader(stage, path, file, schema)
    }

    pub fn from_reader<R: Read>(
        stage: &str,
        source: &Path,
        reader: R,
        schema: &ReportSchema,
    ) -> Result<Self> {
        let (columns, records) = read_records(reader, b'\t', schema, source)?;
        Ok(Self {
            stage: stage.to_string(),
            source: source.to_path_buf(),
            columns,
            records,
        })
    }

    pub fn samples(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.sample.as_str())
    }
}

/// One consolidated row per sample, in output column order
#[derive(Debug, Clone, PartialEq)]
pub struct MergedReport {
    /// Output columns including `Sample`
    pub columns: Vec<String>,
    pub records: Vec<SampleRecord>,
}

impl MergedReport {
    /// Read a comma-delimited merged report back in
    pub fn from_csv<P: AsRef<Path>>(path: P, schema: &ReportSchema) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Self::from_reader(path, file, schema)
    }

    pub fn from_reader<R: Read>(source: &Path, reader: R, schema: &ReportSchema) -> Result<Self> {
        let (columns, mut records) = read_records(reader, b',', schema, source)?;
        records.sort_by(|a, b| a.sample.cmp(&b.sample));
        let mut all_columns = vec![SAMPLE.to_string()];
        all_columns.extend(columns);
        Ok(Self {
            columns: all_columns,
            records,
        })
    }

    pub fn record(&self, sample: &str) -> Option<&SampleRecord> {
        self.records.iter().find(|r| r.sample == sample)
    }

    pub fn samples(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.sample.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn read_records<R: Read>(
    reader: R,
    delimiter: u8,
    schema: &ReportSchema,
    source: &Path,
) -> Result<(Vec<String>, Vec<SampleRecord>)> {
    let source_name = source.display().to_string();
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| ReportError::csv(source, e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let sample_idx = headers
        .iter()
        .position(|h| h == SAMPLE)
        .ok_or_else(|| SchemaError::MissingSampleColumn {
            column: SAMPLE.to_string(),
            source_name: source_name.clone(),
        })?;

    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for row in rdr.records() {
        let row = row.map_err(|e| ReportError::csv(source, e))?;
        let sample = row.get(sample_idx).unwrap_or("").trim().to_string();
        if sample.is_empty() {
            return Err(SchemaError::EmptySampleId {
                source_name: source_name.clone(),
            }
            .into());
        }
        if !seen.insert(sample.clone()) {
            return Err(SchemaError::DuplicateSample {
                sample,
                source_name: source_name.clone(),
            }
            .into());
        }

        let mut record = SampleRecord::new(sample);
        for (idx, column) in headers.iter().enumerate() {
            if idx == sample_idx {
                continue;
            }
            let raw = row.get(idx).unwrap_or("");
            match FieldValue::parse(raw, schema.kind_of(column)) {
                Ok(Some(value)) => record.insert(column, value),
                Ok(None) => {}
                Err(expected) => {
                    return Err(SchemaError::InvalidValue {
                        column: column.clone(),
                        sample: record.sample.clone(),
                        value: raw.to_string(),
                        expected,
                        source_name: source_name.clone(),
                    }
                    .into())
                }
            }
        }
        records.push(record);
    }

    let columns = headers
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| *idx != sample_idx)
        .map(|(_, h)| h)
        .collect();

    log::debug!("Read {} records from {}", records.len(), source_name);
    Ok((columns, records))
}

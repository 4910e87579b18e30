//! Stage summary loading
//!
//! Each pipeline stage leaves one tab-delimited summary. Inputs are read in
//! parallel; the merge orders them itself, so load order never shows up in
//! the report.

use crate::error::{ReportError, Result};
use crate::record::{FieldValue, StageTable};
use crate::schema::{self, ReportSchema};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const KRAKEN_COLUMNS: &[&str] = &[
    schema::PERCENT_STREP,
    schema::PERCENT_SPN,
    schema::SECOND_GENUS,
    schema::PERCENT_SECOND_GENUS,
    schema::PASS_KRAKEN,
];

/// Columns written by the pipeline's known stage summaries. A `_results`
/// suffix on the stage name is ignored.
pub fn known_stage_columns(stage: &str) -> Vec<&'static str> {
    match stage.strip_suffix("_results").unwrap_or(stage) {
        "quality_stats" => vec![
            schema::TOTAL_READS,
            schema::READS_REMOVED,
            schema::MEDIAN_READ_QUALITY,
            schema::AVERAGE_READ_QUALITY,
            schema::PASS_AVERAGE_READ_QUALITY,
        ],
        "quast" => vec![
            schema::CONTIGS,
            schema::N50,
            schema::ASSEMBLY_LENGTH,
            schema::GENOME_RATIO,
            schema::Z_SCORE,
        ],
        "coverage_stats" => vec![
            schema::MEDIAN_COVERAGE,
            schema::AVERAGE_COVERAGE,
            schema::PASS_COVERAGE,
        ],
        "percent_strep" | "kraken" => KRAKEN_COLUMNS.to_vec(),
        "seroba" => vec![schema::SEROTYPE],
        "typing" => {
            let mut columns = KRAKEN_COLUMNS.to_vec();
            columns.push(schema::SEROTYPE);
            columns
        }
        _ => Vec::new(),
    }
}

/// A declared stage summary and what to do when it is missing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageInput {
    pub stage: String,
    pub path: PathBuf,
    #[serde(default)]
    pub required: bool,
    /// Columns the summary provides. Known stages fill this in themselves.
    #[serde(default)]
    pub columns: Vec<String>,
    /// Values given to every sample when the stage did not run
    #[serde(default)]
    pub fallback: BTreeMap<String, FieldValue>,
    #[serde(default)]
    pub absence_comment: Option<String>,
}

impl StageInput {
    pub fn required<P: Into<PathBuf>>(stage: &str, path: P) -> Self {
        Self {
            stage: stage.to_string(),
            path: path.into(),
            required: true,
            columns: Vec::new(),
            fallback: BTreeMap::new(),
            absence_comment: None,
        }
    }

    pub fn optional<P: Into<PathBuf>>(stage: &str, path: P) -> Self {
        Self {
            required: false,
            ..Self::required(stage, path)
        }
    }

    /// Optional input named after the file stem (`coverage_stats.tsv` -> `coverage_stats`)
    pub fn from_path<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let stage = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();
        Self::optional(&stage, path)
    }

    /// Parse a command-line `STAGE=PATH` or bare `PATH` argument
    pub fn from_arg(arg: &str, required: bool) -> Self {
        let mut input = match arg.split_once('=') {
            Some((stage, path)) if !stage.is_empty() && !path.is_empty() => {
                Self::optional(stage, path)
            }
            _ => Self::from_path(arg),
        };
        input.required = required;
        input
    }

    pub fn with_fallback(mut self, column: &str, value: impl Into<FieldValue>) -> Self {
        self.fallback.insert(column.to_string(), value.into());
        self
    }

    pub fn with_absence_comment(mut self, comment: &str) -> Self {
        self.absence_comment = Some(comment.to_string());
        self
    }
}

/// An optional stage whose summary was not produced
#[derive(Debug, Clone, PartialEq)]
pub struct AbsentStage {
    pub stage: String,
    pub path: PathBuf,
    /// Declared and known columns; they are rendered with sentinels
    pub columns: Vec<String>,
    pub fallback: BTreeMap<String, FieldValue>,
    pub comment: Option<String>,
}

impl AbsentStage {
    pub fn from_input(input: &StageInput) -> Self {
        let mut columns = input.columns.clone();
        for column in known_stage_columns(&input.stage) {
            if !columns.iter().any(|c| c == column) {
                columns.push(column.to_string());
            }
        }
        Self {
            stage: input.stage.clone(),
            path: input.path.clone(),
            columns,
            fallback: input.fallback.clone(),
            comment: Some(
                input
                    .absence_comment
                    .clone()
                    .unwrap_or_else(|| format!("No {} results", input.stage)),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadedStage {
    Present(StageTable),
    Absent(AbsentStage),
}

impl LoadedStage {
    pub fn stage(&self) -> &str {
        match self {
            LoadedStage::Present(table) => &table.stage,
            LoadedStage::Absent(absent) => &absent.stage,
        }
    }
}

pub fn load_stage(input: &StageInput, schema: &ReportSchema) -> Result<LoadedStage> {
    if !input.path.exists() {
        if input.required {
            return Err(ReportError::MissingInput {
                stage: input.stage.clone(),
                path: input.path.clone(),
            });
        }
        log::warn!(
            "Optional {} summary not found at {}, using fallback values",
            input.stage,
            input.path.display()
        );
        return Ok(LoadedStage::Absent(AbsentStage::from_input(input)));
    }

    log::debug!("Loading {} summary from {}", input.stage, input.path.display());
    let table = StageTable::from_path(&input.stage, &input.path, schema)?;
    Ok(LoadedStage::Present(table))
}

/// Load every declared input, in declaration order
pub fn load_stage_tables(inputs: &[StageInput], schema: &ReportSchema) -> Result<Vec<LoadedStage>> {
    inputs
        .par_iter()
        .map(|input| load_stage(input, schema))
        .collect()
}

/// Kraken database version from the `kraken DB:` line of a version file
pub fn read_kraken_db_version<P: AsRef<Path>>(path: P) -> Result<Option<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content.lines().find_map(|line| {
        let line = line.trim();
        if !line.contains("kraken DB:") {
            return None;
        }
        line.splitn(2, ':').nth(1).map(|v| v.trim().to_string())
    }))
}

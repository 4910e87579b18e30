//! Error types for report merging and validation

use crate::schema::ColumnKind;
use std::path::PathBuf;

/// Problems that would corrupt the report schema. Always fatal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("Table {source_name} has no '{column}' column")]
    MissingSampleColumn { column: String, source_name: String },

    #[error("Required column '{column}' is absent from {context}")]
    MissingColumn { column: String, context: String },

    #[error("Sample '{sample}' appears more than once in {source_name}")]
    DuplicateSample { sample: String, source_name: String },

    #[error("Empty sample identifier in {source_name}")]
    EmptySampleId { source_name: String },

    #[error(
        "Value '{value}' in column '{column}' for sample '{sample}' of {source_name} \
         is not a valid {expected}"
    )]
    InvalidValue {
        column: String,
        sample: String,
        value: String,
        expected: ColumnKind,
        source_name: String,
    },

    #[error(
        "Stages '{first_stage}' and '{second_stage}' disagree on column '{column}' \
         for sample '{sample}'"
    )]
    ConflictingValues {
        sample: String,
        column: String,
        first_stage: String,
        second_stage: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Required {stage} input does not exist: {path:?}")]
    MissingInput { stage: String, path: PathBuf },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Could not read or write table {path:?}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Invalid sample name pattern")]
    Regex(#[from] regex::Error),

    #[error("Could not move finished report into place")]
    Persist(#[from] tempfile::PersistError),
}

impl ReportError {
    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        ReportError::Csv {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = ReportError> = std::result::Result<T, E>;

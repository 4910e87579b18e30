//! SPNtypeID report tools
//!
//! Merge and validation of the per-run reports of a *Streptococcus
//! pneumoniae* typing pipeline.
//!
//! This library provides shared functionality for:
//! - Loading per-stage summary tables into typed per-sample records
//! - Merging them into one report per run, with derived QC flags,
//!   negative-control accounting and combined comments
//! - Writing the report with display sentinels for missing values
//! - Comparing two reports within per-column tolerances

pub mod config;
pub mod error;
pub mod merge;
pub mod ntc;
pub mod qc_flags;
pub mod record;
pub mod reporting;
pub mod sample_id;
pub mod schema;
pub mod stage;
pub mod validation;

pub use config::ReportConfig;
pub use error::{ReportError, Result, SchemaError};
pub use merge::ReportMerger;
pub use record::{FieldValue, MergedReport, SampleRecord, StageTable};
pub use reporting::{ReportWriter, RunSummary};
pub use schema::{ColumnKind, ColumnSpec, ReportSchema};
pub use stage::{load_stage_tables, LoadedStage, StageInput};
pub use validation::{ReportValidator, ValidationConfig, ValidationReport};

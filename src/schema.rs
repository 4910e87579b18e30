//! Report column schema
//!
//! Column names shared by the stage summaries and the merged report, plus
//! the ordered output schemas used by the different report variants.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const SAMPLE: &str = "Sample";
pub const RUN: &str = "Run";
pub const TOTAL_READS: &str = "Total Reads";
pub const READS_REMOVED: &str = "Reads Removed";
pub const MEDIAN_READ_QUALITY: &str = "Median Read Quality";
pub const AVERAGE_READ_QUALITY: &str = "Average Read Quality";
pub const PASS_AVERAGE_READ_QUALITY: &str = "Pass Average Read Quality";
pub const CONTIGS: &str = "Contigs (#)";
pub const N50: &str = "N50";
pub const ASSEMBLY_LENGTH: &str = "Assembly Length (bp)";
pub const GENOME_RATIO: &str = "Ratio of Actual:Expected Genome Length";
pub const Z_SCORE: &str = "z-score";
pub const PASS_CONTIGS: &str = "Pass Contigs";
pub const PASS_ASSEMBLY_LENGTH: &str = "Pass Assembly Length";
pub const PASS_Z_SCORE: &str = "Pass Z Score";
pub const MEDIAN_COVERAGE: &str = "Median Coverage";
pub const AVERAGE_COVERAGE: &str = "Average Coverage";
pub const PASS_COVERAGE: &str = "Pass Coverage";
pub const PERCENT_STREP: &str = "Percent Strep";
pub const PERCENT_SPN: &str = "Percent SPN";
pub const SECOND_GENUS: &str = "SecondGenus";
pub const PERCENT_SECOND_GENUS: &str = "Percent SecondGenus";
pub const PASS_KRAKEN: &str = "Pass Kraken";
pub const SEROTYPE: &str = "Serotype";
pub const KRAKEN_DB_VERSION: &str = "Kraken Database Version";
pub const MAX_NTC_READS: &str = "Max NTC read";
pub const MAX_NTC_TARGET_READS: &str = "Max NTC SPN read";
pub const ALL_NTC_READS: &str = "All NTC reads";
pub const ALL_NTC_TARGET_READS: &str = "All NTC SPN reads";
pub const TOTAL_NTC_READS: &str = "Total NTC Reads";
pub const TOTAL_NTC_TARGET_READS: &str = "Total NTC SPN Reads";
pub const NTC_RESULT: &str = "NTC PASS/FAIL";
pub const PIPELINE_VERSION: &str = "Pipeline Version";
pub const PASS_NA: &str = "Pass NA";
pub const COMMENTS: &str = "Comments";

// Comment columns produced by the flag derivations. They never reach the
// output; they are folded into `Comments`.
pub const ASSEMBLY_LENGTH_COMMENTS: &str = "commentsAssemblyLength";
pub const Z_SCORE_COMMENTS: &str = "commentsZScore";
pub const CONTIGS_COMMENTS: &str = "commentsContigs";
pub const RUN_COMMENTS: &str = "commentsRun";

/// Comment columns written by the per-stage summaries
pub const STAGE_COMMENT_COLUMNS: &[&str] = &[
    "Quality Stats Comments",
    "QUAST Summary Comments",
    "Coverage Stats Comments",
    "Percent Strep Comments",
    "SeroBA Comments",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Text,
    Integer,
    Float,
    Boolean,
}

impl ColumnKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float)
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::Text => "text value",
            ColumnKind::Integer => "integer",
            ColumnKind::Float => "number",
            ColumnKind::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl ColumnSpec {
    pub fn new(name: &str, kind: ColumnKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: true,
        }
    }

    pub fn optional(name: &str, kind: ColumnKind) -> Self {
        Self {
            required: false,
            ..Self::new(name, kind)
        }
    }
}

/// Ordered set of output columns with their declared kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSchema {
    pub columns: Vec<ColumnSpec>,
}

impl Default for ReportSchema {
    fn default() -> Self {
        Self::canonical()
    }
}

impl ReportSchema {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self { columns }
    }

    /// Report layout for runs that include negative controls
    pub fn canonical() -> Self {
        use ColumnKind::*;
        Self::new(vec![
            ColumnSpec::new(SAMPLE, Text),
            ColumnSpec::new(RUN, Text),
            ColumnSpec::new(TOTAL_READS, Integer),
            ColumnSpec::new(READS_REMOVED, Integer),
            ColumnSpec::new(MEDIAN_READ_QUALITY, Float),
            ColumnSpec::new(AVERAGE_READ_QUALITY, Float),
            ColumnSpec::new(CONTIGS, Integer),
            ColumnSpec::new(N50, Integer),
            ColumnSpec::new(ASSEMBLY_LENGTH, Integer),
            ColumnSpec::new(GENOME_RATIO, Float),
            ColumnSpec::optional(Z_SCORE, Float),
            ColumnSpec::new(MEDIAN_COVERAGE, Float),
            ColumnSpec::new(AVERAGE_COVERAGE, Float),
            ColumnSpec::new(PERCENT_STREP, Float),
            ColumnSpec::new(PERCENT_SPN, Float),
            ColumnSpec::optional(SECOND_GENUS, Text),
            ColumnSpec::new(PERCENT_SECOND_GENUS, Float),
            ColumnSpec::new(SEROTYPE, Text),
            ColumnSpec::new(KRAKEN_DB_VERSION, Text),
            ColumnSpec::new(MAX_NTC_READS, Integer),
            ColumnSpec::new(MAX_NTC_TARGET_READS, Integer),
            ColumnSpec::new(ALL_NTC_READS, Text),
            ColumnSpec::new(ALL_NTC_TARGET_READS, Text),
            ColumnSpec::new(PIPELINE_VERSION, Text),
            ColumnSpec::new(COMMENTS, Text),
        ])
    }

    /// Report layout with pass/fail columns and a run-level NTC verdict
    pub fn without_negative_controls() -> Self {
        use ColumnKind::*;
        Self::new(vec![
            ColumnSpec::new(SAMPLE, Text),
            ColumnSpec::new(RUN, Text),
            ColumnSpec::new(TOTAL_READS, Integer),
            ColumnSpec::new(READS_REMOVED, Integer),
            ColumnSpec::new(MEDIAN_READ_QUALITY, Float),
            ColumnSpec::new(AVERAGE_READ_QUALITY, Float),
            ColumnSpec::new(PASS_AVERAGE_READ_QUALITY, Boolean),
            ColumnSpec::new(CONTIGS, Integer),
            ColumnSpec::new(N50, Integer),
            ColumnSpec::new(ASSEMBLY_LENGTH, Integer),
            ColumnSpec::new(GENOME_RATIO, Float),
            ColumnSpec::optional(Z_SCORE, Float),
            ColumnSpec::new(PASS_CONTIGS, Boolean),
            ColumnSpec::new(PASS_ASSEMBLY_LENGTH, Boolean),
            ColumnSpec::new(MEDIAN_COVERAGE, Float),
            ColumnSpec::new(AVERAGE_COVERAGE, Float),
            ColumnSpec::new(PASS_COVERAGE, Boolean),
            ColumnSpec::new(PERCENT_STREP, Float),
            ColumnSpec::new(PERCENT_SPN, Float),
            ColumnSpec::optional(SECOND_GENUS, Text),
            ColumnSpec::new(PERCENT_SECOND_GENUS, Float),
            ColumnSpec::new(PASS_KRAKEN, Boolean),
            ColumnSpec::new(SEROTYPE, Text),
            ColumnSpec::new(PASS_NA, Text),
            ColumnSpec::new(COMMENTS, Text),
            ColumnSpec::new(PIPELINE_VERSION, Text),
            ColumnSpec::new(TOTAL_NTC_READS, Text),
            ColumnSpec::new(TOTAL_NTC_TARGET_READS, Text),
            ColumnSpec::new(NTC_RESULT, Text),
        ])
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn kind_of(&self, name: &str) -> Option<ColumnKind> {
        self.column(name).map(|c| c.kind)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

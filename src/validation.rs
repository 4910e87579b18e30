//! Reproducibility validation of merged reports
//!
//! Compares a trusted baseline report against a candidate field by field.
//! Small numeric drift on configured columns is tolerated; everything else
//! that differs is reported.

use crate::config::load_json;
use crate::error::Result;
use crate::record::{FieldValue, MergedReport, SampleRecord};
use crate::schema::{self, ColumnKind, ReportSchema, SAMPLE};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Exit code for a failed comparison
pub const EXIT_DISCREPANCIES: i32 = 1;
/// Exit code when an input report cannot be read
pub const EXIT_CONFIG_ERROR: i32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ToleranceKind {
    /// Suppress when `|baseline - candidate| < below`
    AbsoluteDifference { below: f64 },
    /// Suppress when the candidate lies within `half_width` of the sample's
    /// expected average. Samples without an average are never suppressed.
    ExpectedBand {
        half_width: f64,
        #[serde(default)]
        averages: BTreeMap<String, f64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToleranceRule {
    pub column: String,
    #[serde(flatten)]
    pub kind: ToleranceKind,
}

impl ToleranceRule {
    pub fn absolute(column: &str, below: f64) -> Self {
        Self {
            column: column.to_string(),
            kind: ToleranceKind::AbsoluteDifference { below },
        }
    }

    pub fn band(column: &str, half_width: f64) -> Self {
        Self {
            column: column.to_string(),
            kind: ToleranceKind::ExpectedBand {
                half_width,
                averages: BTreeMap::new(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Text columns are read verbatim; every other column is inferred so a
    /// stray non-numeric value shows up as a type mismatch
    pub schema: ReportSchema,
    pub tolerances: Vec<ToleranceRule>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            schema: ReportSchema::canonical(),
            tolerances: vec![
                ToleranceRule::absolute(schema::ASSEMBLY_LENGTH, 1000.0),
                ToleranceRule::absolute(schema::CONTIGS, 50.0),
                ToleranceRule::band(schema::GENOME_RATIO, 0.0025),
                ToleranceRule::band(schema::Z_SCORE, 0.025),
            ],
        }
    }
}

impl ValidationConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        load_json(path)
    }

    pub fn rule_for(&self, column: &str) -> Option<&ToleranceKind> {
        self.tolerances
            .iter()
            .find(|r| r.column == column)
            .map(|r| &r.kind)
    }

    /// Set a per-sample expected average on a banded column. Returns `false`
    /// when the column has no band rule.
    pub fn set_expected_average(&mut self, column: &str, sample: &str, average: f64) -> bool {
        for rule in self.tolerances.iter_mut().filter(|r| r.column == column) {
            if let ToleranceKind::ExpectedBand { averages, .. } = &mut rule.kind {
                averages.insert(sample.to_string(), average);
                return true;
            }
        }
        false
    }

    /// Schema used to read reports for comparison
    pub fn reading_schema(&self) -> ReportSchema {
        ReportSchema::new(
            self.schema
                .columns
                .iter()
                .filter(|c| c.kind == ColumnKind::Text)
                .cloned()
                .collect(),
        )
    }

    pub fn load_report<P: AsRef<Path>>(&self, path: P) -> Result<MergedReport> {
        MergedReport::from_csv(path, &self.reading_schema())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscrepancyKind {
    ValueMismatch,
    /// One side numeric, the other present but not numeric
    TypeMismatch,
    /// A banded column differs for a sample with no expected average
    ToleranceConfigMissing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationDiff {
    pub sample: String,
    pub column: String,
    pub baseline: Option<String>,
    pub candidate: Option<String>,
    pub kind: DiscrepancyKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationOutcome {
    Pass,
    Fail,
}

impl ValidationOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            ValidationOutcome::Pass => "PASS",
            ValidationOutcome::Fail => "FAIL",
        }
    }

    pub fn exit_code(self) -> i32 {
        match self {
            ValidationOutcome::Pass => 0,
            ValidationOutcome::Fail => EXIT_DISCREPANCIES,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Differences left after tolerances, sorted by (sample, column)
    pub discrepancies: Vec<ValidationDiff>,
    /// Differences a tolerance rule accepted
    pub suppressed: Vec<ValidationDiff>,
}

impl ValidationReport {
    pub fn outcome(&self) -> ValidationOutcome {
        if self.discrepancies.is_empty() {
            ValidationOutcome::Pass
        } else {
            ValidationOutcome::Fail
        }
    }

    pub fn export_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json_content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json_content)?;
        Ok(())
    }

    /// Export to `json` when given and return the comparison's exit code.
    /// A failed export is logged; it never changes the code.
    pub fn finish<P: AsRef<Path>>(&self, json: Option<P>) -> i32 {
        if let Some(path) = json {
            let path = path.as_ref();
            match self.export_json(path) {
                Ok(()) => log::info!("Comparison saved to {}", path.display()),
                Err(e) => log::error!("Could not write comparison to {}: {}", path.display(), e),
            }
        }
        self.outcome().exit_code()
    }
}

enum Verdict {
    Same,
    Suppressed,
    Differs(DiscrepancyKind),
}

pub struct ReportValidator {
    config: ValidationConfig,
}

impl Default for ReportValidator {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}

impl ReportValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Compare every (sample, column) pair in the union of both reports
    pub fn validate(&self, baseline: &MergedReport, candidate: &MergedReport) -> ValidationReport {
        let baseline_index = index(baseline);
        let candidate_index = index(candidate);

        let samples: BTreeSet<&str> = baseline_index
            .keys()
            .chain(candidate_index.keys())
            .copied()
            .collect();
        let columns: BTreeSet<&str> = baseline
            .columns
            .iter()
            .chain(candidate.columns.iter())
            .map(String::as_str)
            .collect();

        let mut report = ValidationReport::default();
        for sample in &samples {
            let b_record = baseline_index.get(sample).copied();
            let c_record = candidate_index.get(sample).copied();
            for column in &columns {
                let b = b_record.and_then(|r| r.value(column));
                let c = c_record.and_then(|r| r.value(column));
                let verdict = self.compare(sample, column, b.as_ref(), c.as_ref());
                let diff = |kind| ValidationDiff {
                    sample: sample.to_string(),
                    column: column.to_string(),
                    baseline: b.as_ref().map(FieldValue::to_string),
                    candidate: c.as_ref().map(FieldValue::to_string),
                    kind,
                };
                match verdict {
                    Verdict::Same => {}
                    Verdict::Suppressed => {
                        log::debug!("Within tolerance: {} / {}", sample, column);
                        report.suppressed.push(diff(DiscrepancyKind::ValueMismatch));
                    }
                    Verdict::Differs(kind) => report.discrepancies.push(diff(kind)),
                }
            }
        }

        log::info!(
            "Compared {} samples across {} columns: {} discrepancies, {} within tolerance",
            samples.len(),
            columns.len(),
            report.discrepancies.len(),
            report.suppressed.len()
        );
        report
    }

    fn compare(
        &self,
        sample: &str,
        column: &str,
        baseline: Option<&FieldValue>,
        candidate: Option<&FieldValue>,
    ) -> Verdict {
        let (b, c) = match (baseline, candidate) {
            (None, None) => return Verdict::Same,
            (Some(b), Some(c)) if b.same_as(c) => return Verdict::Same,
            (Some(b), Some(c)) => (b, c),
            _ => return Verdict::Differs(DiscrepancyKind::ValueMismatch),
        };

        let (b, c) = match (b.as_f64(), c.as_f64()) {
            (Some(b), Some(c)) => (b, c),
            (None, None) => return Verdict::Differs(DiscrepancyKind::ValueMismatch),
            _ => return Verdict::Differs(DiscrepancyKind::TypeMismatch),
        };

        match self.config.rule_for(column) {
            Some(ToleranceKind::AbsoluteDifference { below }) => {
                if (b - c).abs() < *below {
                    Verdict::Suppressed
                } else {
                    Verdict::Differs(DiscrepancyKind::ValueMismatch)
                }
            }
            Some(ToleranceKind::ExpectedBand {
                half_width,
                averages,
            }) => match averages.get(sample) {
                Some(avg) if avg - half_width <= c && c <= avg + half_width => Verdict::Suppressed,
                Some(_) => Verdict::Differs(DiscrepancyKind::ValueMismatch),
                None => Verdict::Differs(DiscrepancyKind::ToleranceConfigMissing),
            },
            None => Verdict::Differs(DiscrepancyKind::ValueMismatch),
        }
    }
}

fn index(report: &MergedReport) -> BTreeMap<&str, &SampleRecord> {
    report
        .records
        .iter()
        .map(|r| (r.sample.as_str(), r))
        .collect()
}

/// Parse a `SAMPLE=VALUE` expected-average argument
pub fn parse_expected_average(arg: &str) -> Option<(String, f64)> {
    let (sample, value) = arg.split_once('=')?;
    let sample = sample.trim();
    if sample.is_empty() || sample == SAMPLE {
        return None;
    }
    let value = value.trim().parse().ok()?;
    Some((sample.to_string(), value))
}

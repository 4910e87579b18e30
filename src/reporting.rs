//! Merged report output
//!
//! Renders a [`MergedReport`] as CSV, substituting the configured display
//! sentinels for missing values, and summarizes the run's pass/fail flags.

use crate::config::Sentinels;
use crate::error::{ReportError, Result};
use crate::record::{FieldValue, MergedReport};
use crate::schema::{self, SAMPLE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

/// Writes merged reports. Missing values become sentinels here and nowhere
/// else.
pub struct ReportWriter<'a> {
    sentinels: &'a Sentinels,
}

impl<'a> ReportWriter<'a> {
    pub fn new(sentinels: &'a Sentinels) -> Self {
        Self { sentinels }
    }

    /// Display rows, header first
    pub fn rows(&self, report: &MergedReport) -> Vec<Vec<String>> {
        let mut rows = Vec::with_capacity(report.len() + 1);
        rows.push(report.columns.clone());
        for record in &report.records {
            rows.push(
                report
                    .columns
                    .iter()
                    .map(|column| self.sentinels.display(column, record.value(column).as_ref()))
                    .collect(),
            );
        }
        rows
    }

    pub fn write<W: Write>(&self, report: &MergedReport, writer: W, source: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        for row in self.rows(report) {
            wtr.write_record(&row).map_err(|e| ReportError::csv(source, e))?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Write the report to `path`. The file only appears once complete.
    pub fn write_csv<P: AsRef<Path>>(&self, report: &MergedReport, path: P) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        self.write(report, tmp.as_file_mut(), path)?;
        tmp.persist(path)?;
        log::info!("Wrote {} samples to {}", report.len(), path.display());
        Ok(())
    }
}

/// Run-level overview of a merged report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_samples: usize,
    pub passed_samples: usize,
    pub failed_samples: usize,
    pub pass_rate: f64,
    /// Failing samples per pass/fail column
    pub flag_failures: BTreeMap<String, usize>,
    pub samples_with_comments: Vec<String>,
    pub ntc_result: Option<String>,
}

impl RunSummary {
    pub fn from_report(report: &MergedReport) -> Self {
        let flag_columns: Vec<&String> = report
            .columns
            .iter()
            .filter(|c| c.starts_with("Pass "))
            .collect();

        let mut summary = RunSummary {
            total_samples: report.len(),
            ..Default::default()
        };
        for column in &flag_columns {
            summary.flag_failures.insert(column.to_string(), 0);
        }

        for record in &report.records {
            let mut passed = true;
            for column in &flag_columns {
                if record.get(column).map_or(false, |v| !is_passing(v)) {
                    passed = false;
                    if let Some(count) = summary.flag_failures.get_mut(column.as_str()) {
                        *count += 1;
                    }
                }
            }
            if passed {
                summary.passed_samples += 1;
            } else {
                summary.failed_samples += 1;
            }
            if record.contains(schema::COMMENTS) {
                summary.samples_with_comments.push(record.sample.clone());
            }
            if summary.ntc_result.is_none() {
                summary.ntc_result = record
                    .get(schema::NTC_RESULT)
                    .map(FieldValue::to_string);
            }
        }

        summary.pass_rate = if summary.total_samples > 0 {
            (summary.passed_samples as f64 / summary.total_samples as f64) * 100.0
        } else {
            0.0
        };
        summary
    }

    pub fn export_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json_content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json_content)?;
        Ok(())
    }
}

fn is_passing(value: &FieldValue) -> bool {
    match value {
        FieldValue::Boolean(b) => *b,
        FieldValue::Text(t) => t == "True" || t == "PASS",
        _ => true,
    }
}

/// Write a one-column CSV of sample names (header `Sample`)
pub fn write_sample_list<P: AsRef<Path>>(samples: &[String], path: P) -> Result<()> {
    let path = path.as_ref();
    let mut wtr = csv::Writer::from_path(path).map_err(|e| ReportError::csv(path, e))?;
    wtr.write_record([SAMPLE]).map_err(|e| ReportError::csv(path, e))?;
    for sample in samples {
        wtr.write_record([sample]).map_err(|e| ReportError::csv(path, e))?;
    }
    wtr.flush()?;
    Ok(())
}

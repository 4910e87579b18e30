//! Report configuration
//!
//! Every threshold, pattern and display sentinel the merge uses lives here
//! and is passed in explicitly. Configuration files are JSON; any field
//! left out takes its default.

use crate::error::Result;
use crate::record::FieldValue;
use crate::schema::{self, ReportSchema};
use crate::stage::StageInput;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Assembly QC limits used for the pass/fail flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyThresholds {
    pub min_length: i64,
    pub max_length: i64,
    pub max_contigs: i64,
    pub max_z_score: f64,
}

impl Default for AssemblyThresholds {
    fn default() -> Self {
        Self {
            min_length: 1_500_000,
            max_length: 2_500_000,
            max_contigs: 300,
            max_z_score: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegativeControlConfig {
    /// An NTC with this many total reads or more fails the run
    pub read_limit: u64,
    /// An NTC with this many target-organism reads or more fails the run
    pub target_read_limit: u64,
    /// Kraken taxid counted as target-organism reads
    pub target_taxid: String,
}

impl Default for NegativeControlConfig {
    fn default() -> Self {
        Self {
            read_limit: 50_000,
            target_read_limit: 100,
            target_taxid: "1300".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleIdConfig {
    pub run_name_regex: String,
    pub split_regex: String,
}

impl Default for SampleIdConfig {
    fn default() -> Self {
        Self {
            run_name_regex: r"\d{6}_[A-Z0-9]+_\d{4}_[A-Z0-9-]+".to_string(),
            split_regex: r"_S\d+".to_string(),
        }
    }
}

/// Text written in place of missing values. Only the report writer uses it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sentinels {
    pub missing: String,
    pub columns: BTreeMap<String, String>,
}

impl Default for Sentinels {
    fn default() -> Self {
        let no_ntc = "No NTC in data set".to_string();
        let columns = BTreeMap::from([
            (schema::RUN.to_string(), "NA".to_string()),
            (schema::MAX_NTC_READS.to_string(), "999999".to_string()),
            (schema::MAX_NTC_TARGET_READS.to_string(), "999999".to_string()),
            (schema::ALL_NTC_READS.to_string(), no_ntc.clone()),
            (schema::ALL_NTC_TARGET_READS.to_string(), no_ntc.clone()),
            (schema::TOTAL_NTC_READS.to_string(), no_ntc.clone()),
            (schema::TOTAL_NTC_TARGET_READS.to_string(), no_ntc),
        ]);
        Self {
            missing: String::new(),
            columns,
        }
    }
}

impl Sentinels {
    pub fn display(&self, column: &str, value: Option<&FieldValue>) -> String {
        match value {
            Some(v) => v.to_string(),
            None => self
                .columns
                .get(column)
                .unwrap_or(&self.missing)
                .clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub schema: ReportSchema,
    /// Stage summaries declared up front; more can be added on the command line
    pub stages: Vec<StageInput>,
    pub thresholds: AssemblyThresholds,
    pub negative_controls: NegativeControlConfig,
    pub sample_ids: SampleIdConfig,
    pub sentinels: Sentinels,
    /// Stage comment columns folded into `Comments`
    pub comment_columns: Vec<String>,
    /// Columns that must be populated for `Pass NA` to be true
    pub completeness_columns: Vec<String>,
    pub kraken_db_version: Option<String>,
    pub pipeline_version: Option<String>,
    /// Overrides every extracted run id when set
    pub workflow_run_name: Option<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        let comment_columns = schema::STAGE_COMMENT_COLUMNS
            .iter()
            .chain(std::iter::once(&schema::COMMENTS))
            .map(|c| c.to_string())
            .collect();
        let completeness_columns = [
            schema::CONTIGS,
            schema::ASSEMBLY_LENGTH,
            schema::N50,
            schema::MEDIAN_COVERAGE,
            schema::AVERAGE_COVERAGE,
            schema::PASS_COVERAGE,
            schema::TOTAL_READS,
            schema::READS_REMOVED,
            schema::MEDIAN_READ_QUALITY,
            schema::AVERAGE_READ_QUALITY,
            schema::PASS_AVERAGE_READ_QUALITY,
            schema::PERCENT_STREP,
            schema::PERCENT_SPN,
            schema::PERCENT_SECOND_GENUS,
            schema::PASS_KRAKEN,
            schema::SEROTYPE,
            schema::GENOME_RATIO,
            schema::PASS_CONTIGS,
            schema::PASS_ASSEMBLY_LENGTH,
        ]
        .iter()
        .map(|c| c.to_string())
        .collect();

        Self {
            schema: ReportSchema::canonical(),
            stages: Vec::new(),
            thresholds: AssemblyThresholds::default(),
            negative_controls: NegativeControlConfig::default(),
            sample_ids: SampleIdConfig::default(),
            sentinels: Sentinels::default(),
            comment_columns,
            completeness_columns,
            kraken_db_version: None,
            pipeline_version: None,
            workflow_run_name: None,
        }
    }
}

impl ReportConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        load_json(path)
    }

    pub fn is_comment_column(&self, column: &str) -> bool {
        self.comment_columns.iter().any(|c| c == column)
    }
}

pub fn load_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let thresholds = AssemblyThresholds::default();
        assert_eq!(thresholds.min_length, 1_500_000);
        assert_eq!(thresholds.max_length, 2_500_000);
        assert_eq!(thresholds.max_contigs, 300);
    }

    #[test]
    fn test_partial_json_config() {
        let json = r#"{"thresholds": {"max_contigs": 150}, "pipeline_version": "v1.3.0"}"#;
        let config: ReportConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.thresholds.max_contigs, 150);
        assert_eq!(config.thresholds.min_length, 1_500_000);
        assert_eq!(config.pipeline_version.as_deref(), Some("v1.3.0"));
        assert_eq!(config.schema, ReportSchema::canonical());
        assert!(config.stages.is_empty());
    }

    #[test]
    fn test_stage_declarations_from_json() {
        let json = r#"{"stages": [
            {"stage": "percent_strep", "path": "percent_strep_results.tsv", "required": true},
            {"stage": "seroba", "path": "seroba_results.tsv",
             "fallback": {"Serotype": "NotRun"}, "absence_comment": "SeroBA did not run"}
        ]}"#;
        let config: ReportConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.stages.len(), 2);
        assert!(config.stages[0].required);
        assert!(!config.stages[1].required);
        assert_eq!(
            config.stages[1].fallback["Serotype"],
            FieldValue::text("NotRun")
        );
    }

    #[test]
    fn test_sentinel_display() {
        let sentinels = Sentinels::default();
        assert_eq!(sentinels.display(schema::RUN, None), "NA");
        assert_eq!(sentinels.display(schema::MAX_NTC_READS, None), "999999");
        assert_eq!(sentinels.display(schema::SEROTYPE, None), "");
        assert_eq!(
            sentinels.display(schema::SEROTYPE, Some(&FieldValue::text("19F"))),
            "19F"
        );
    }

    #[test]
    fn test_comment_columns() {
        let config = ReportConfig::default();
        assert!(config.is_comment_column("SeroBA Comments"));
        assert!(config.is_comment_column(schema::COMMENTS));
        assert!(!config.is_comment_column(schema::SEROTYPE));
    }
}

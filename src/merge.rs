//! Multi-stage report merge
//!
//! Joins every stage summary on the sample id (outer join), then derives
//! the run-level and pass/fail columns, folds the comment columns into a
//! single `Comments` field and lays the result out per the report schema.

use crate::config::ReportConfig;
use crate::error::{Result, SchemaError};
use crate::ntc::{NegativeControlTotals, NtcVerdict};
use crate::qc_flags::{
    derive_assembly_length_flag, derive_contigs_flag, derive_z_score_flag, QcFlag,
};
use crate::record::{FieldValue, MergedReport, SampleRecord, StageTable};
use crate::sample_id::SampleIdRules;
use crate::schema::{self, ReportSchema, SAMPLE};
use crate::stage::{AbsentStage, LoadedStage};
use std::collections::{BTreeMap, BTreeSet};

const MISSING_DATA_WARNING: &str = "WARNING MISSING DATA";
const NO_NTC_COMMENT: &str = "No NTC in data set";

/// Comment columns produced during the merge, folded in after the stage ones
const DERIVED_COMMENT_COLUMNS: &[&str] = &[
    schema::ASSEMBLY_LENGTH_COMMENTS,
    schema::Z_SCORE_COMMENTS,
    schema::CONTIGS_COMMENTS,
    schema::RUN_COMMENTS,
];

/// Outer join of stage tables, before derivation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinedTables {
    /// Every column any input declared, `Sample` excluded
    pub columns: BTreeSet<String>,
    pub records: BTreeMap<String, SampleRecord>,
}

impl JoinedTables {
    pub fn samples(&self) -> BTreeSet<&str> {
        self.records.keys().map(String::as_str).collect()
    }
}

/// Outer join on sample id. Tables are visited in `(stage, source)` order,
/// so the result does not depend on the order they are passed in.
/// Comment-like columns defined by more than one table are combined; any
/// other column must agree across tables.
pub fn merge_all<F>(tables: &[&StageTable], is_comment_column: F) -> Result<JoinedTables>
where
    F: Fn(&str) -> bool,
{
    let mut ordered: Vec<&StageTable> = tables.to_vec();
    ordered.sort_by(|a, b| (&a.stage, &a.source).cmp(&(&b.stage, &b.source)));

    let mut joined = JoinedTables::default();
    let mut owners: BTreeMap<(String, String), String> = BTreeMap::new();

    for table in ordered {
        joined.columns.extend(table.columns.iter().cloned());

        for incoming in &table.records {
            let record = joined
                .records
                .entry(incoming.sample.clone())
                .or_insert_with(|| SampleRecord::new(incoming.sample.clone()));

            for (column, value) in incoming.fields() {
                let owner_key = (incoming.sample.clone(), column.clone());
                match record.get(column) {
                    None => {
                        record.insert(column, value.clone());
                        owners.insert(owner_key, table.stage.clone());
                    }
                    Some(existing) if is_comment_column(column) => {
                        let combined = join_comments([existing.to_string(), value.to_string()]);
                        record.insert(column, FieldValue::Text(combined));
                    }
                    Some(existing) if existing.same_as(value) => {}
                    Some(_) => {
                        return Err(SchemaError::ConflictingValues {
                            sample: incoming.sample.clone(),
                            column: column.clone(),
                            first_stage: owners.get(&owner_key).cloned().unwrap_or_default(),
                            second_stage: table.stage.clone(),
                        }
                        .into());
                    }
                }
            }
        }
    }

    log::debug!(
        "Joined {} tables into {} samples and {} columns",
        tables.len(),
        joined.records.len(),
        joined.columns.len()
    );
    Ok(joined)
}

/// `;`-joined comment text with blank and separator-only parts dropped
pub fn join_comments<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut kept = Vec::new();
    for part in parts {
        for segment in part.as_ref().split(';') {
            let segment = segment.trim();
            if !segment.is_empty() {
                kept.push(segment.to_string());
            }
        }
    }
    kept.join(";")
}

/// Remove the named comment columns from the record and return their
/// combined text
pub fn merge_comments<S: AsRef<str>>(record: &mut SampleRecord, comment_columns: &[S]) -> String {
    let parts: Vec<String> = comment_columns
        .iter()
        .filter_map(|column| record.remove(column.as_ref()))
        .map(|value| value.to_string())
        .collect();
    join_comments(parts)
}

fn append_comment(record: &mut SampleRecord, column: &str, comment: &str) {
    let combined = match record.get(column) {
        Some(existing) => join_comments([existing.to_string().as_str(), comment]),
        None => comment.to_string(),
    };
    record.insert(column, FieldValue::Text(combined));
}

fn apply_flag(record: &mut SampleRecord, flag: Option<QcFlag>, pass_column: &str, comment_column: &str) {
    if let Some(flag) = flag {
        record.insert(pass_column, flag.pass);
        if let Some(comment) = flag.comment {
            record.insert(comment_column, FieldValue::Text(comment));
        }
    }
}

fn to_integer(n: u64) -> FieldValue {
    FieldValue::Integer(i64::try_from(n).unwrap_or(i64::MAX))
}

/// Select and order the schema's columns. Every required column must have
/// been produced by some stage or derivation.
pub fn finalize(
    records: Vec<SampleRecord>,
    available: &BTreeSet<String>,
    schema: &ReportSchema,
) -> Result<MergedReport> {
    for column_spec in &schema.columns {
        let produced = column_spec.name == SAMPLE || available.contains(&column_spec.name);
        if column_spec.required && !produced {
            return Err(SchemaError::MissingColumn {
                column: column_spec.name.clone(),
                context: "merged report".to_string(),
            }
            .into());
        }
    }

    let mut seen = BTreeSet::new();
    let mut selected = Vec::with_capacity(records.len());
    for record in records {
        if record.sample.trim().is_empty() {
            return Err(SchemaError::EmptySampleId {
                source_name: "merged report".to_string(),
            }
            .into());
        }
        if !seen.insert(record.sample.clone()) {
            return Err(SchemaError::DuplicateSample {
                sample: record.sample,
                source_name: "merged report".to_string(),
            }
            .into());
        }
        let mut out = SampleRecord::new(record.sample.clone());
        for column_spec in &schema.columns {
            if column_spec.name == SAMPLE {
                continue;
            }
            if let Some(value) = record.get(&column_spec.name) {
                out.insert(&column_spec.name, value.clone());
            }
        }
        selected.push(out);
    }
    selected.sort_by(|a, b| a.sample.cmp(&b.sample));

    Ok(MergedReport {
        columns: schema.names(),
        records: selected,
    })
}

/// Builds one merged report per pipeline run
pub struct ReportMerger<'a> {
    config: &'a ReportConfig,
    id_rules: SampleIdRules,
}

impl<'a> ReportMerger<'a> {
    pub fn new(config: &'a ReportConfig) -> Result<Self> {
        Ok(Self {
            config,
            id_rules: SampleIdRules::from_config(&config.sample_ids)?,
        })
    }

    /// Merge loaded stages and negative-control totals into the final report.
    /// `negative_controls` is `None` when no control data exists for the run.
    pub fn build(
        &self,
        stages: &[LoadedStage],
        negative_controls: Option<&NegativeControlTotals>,
    ) -> Result<MergedReport> {
        let tables: Vec<&StageTable> = stages
            .iter()
            .filter_map(|s| match s {
                LoadedStage::Present(table) => Some(table),
                LoadedStage::Absent(_) => None,
            })
            .collect();
        let mut absent: Vec<&AbsentStage> = stages
            .iter()
            .filter_map(|s| match s {
                LoadedStage::Absent(absent) => Some(absent),
                LoadedStage::Present(_) => None,
            })
            .collect();
        absent.sort_by(|a, b| (&a.stage, &a.path).cmp(&(&b.stage, &b.path)));

        log::info!(
            "Merging {} stage tables ({} optional stages absent)",
            tables.len(),
            absent.len()
        );

        let JoinedTables {
            mut columns,
            records,
        } = merge_all(&tables, |c| self.config.is_comment_column(c))?;
        let mut records: Vec<SampleRecord> = records.into_values().collect();

        self.apply_absent_stages(&mut records, &mut columns, &absent);
        self.derive_flags(&mut records, &mut columns);
        self.apply_negative_controls(&mut records, &mut columns, negative_controls);
        self.apply_run_constants(&mut records, &mut columns);
        self.assign_identifiers(&mut records, &mut columns);
        self.check_completeness(&mut records, &mut columns);
        self.combine_comments(&mut records, &mut columns);

        let report = finalize(records, &columns, &self.config.schema)?;
        log::info!(
            "Merged report has {} samples and {} columns",
            report.len(),
            report.columns.len()
        );
        Ok(report)
    }

    fn apply_absent_stages(
        &self,
        records: &mut [SampleRecord],
        columns: &mut BTreeSet<String>,
        absent: &[&AbsentStage],
    ) {
        for stage in absent {
            columns.extend(stage.columns.iter().cloned());
            columns.extend(stage.fallback.keys().cloned());
            for record in records.iter_mut() {
                for (column, value) in &stage.fallback {
                    if !record.contains(column) {
                        record.insert(column, value.clone());
                    }
                }
                if let Some(comment) = &stage.comment {
                    append_comment(record, schema::RUN_COMMENTS, comment);
                }
            }
        }
    }

    fn derive_flags(&self, records: &mut [SampleRecord], columns: &mut BTreeSet<String>) {
        let thresholds = &self.config.thresholds;
        for record in records.iter_mut() {
            let length = derive_assembly_length_flag(record, thresholds.min_length, thresholds.max_length);
            let z_score = derive_z_score_flag(record, thresholds.max_z_score);
            let contigs = derive_contigs_flag(record, thresholds.max_contigs);
            apply_flag(record, length, schema::PASS_ASSEMBLY_LENGTH, schema::ASSEMBLY_LENGTH_COMMENTS);
            apply_flag(record, z_score, schema::PASS_Z_SCORE, schema::Z_SCORE_COMMENTS);
            apply_flag(record, contigs, schema::PASS_CONTIGS, schema::CONTIGS_COMMENTS);
        }
        for column in [
            schema::PASS_ASSEMBLY_LENGTH,
            schema::PASS_Z_SCORE,
            schema::PASS_CONTIGS,
        ] {
            columns.insert(column.to_string());
        }
    }

    fn apply_negative_controls(
        &self,
        records: &mut [SampleRecord],
        columns: &mut BTreeSet<String>,
        totals: Option<&NegativeControlTotals>,
    ) {
        for column in [
            schema::ALL_NTC_READS,
            schema::ALL_NTC_TARGET_READS,
            schema::TOTAL_NTC_READS,
            schema::TOTAL_NTC_TARGET_READS,
            schema::MAX_NTC_READS,
            schema::MAX_NTC_TARGET_READS,
            schema::NTC_RESULT,
        ] {
            columns.insert(column.to_string());
        }

        let totals = totals.filter(|t| !t.is_empty());
        let verdict = totals
            .map(|t| t.verdict(&self.config.negative_controls))
            .unwrap_or(NtcVerdict::Fail);
        let reports_ntc = [
            schema::ALL_NTC_READS,
            schema::TOTAL_NTC_READS,
            schema::MAX_NTC_READS,
        ]
        .iter()
        .any(|c| self.config.schema.contains(c));

        match totals {
            Some(totals) => log::info!(
                "Negative controls: {} (max reads {}, max target reads {}), {}",
                totals.total_reads.len(),
                totals.max_total_reads,
                totals.max_target_reads,
                verdict.as_str()
            ),
            None => log::warn!("No negative control data for this run"),
        }

        for record in records.iter_mut() {
            record.insert(schema::NTC_RESULT, verdict.as_str());
            match totals {
                Some(totals) => {
                    let total_reads = totals.describe_total_reads();
                    let target_reads = totals.describe_target_reads();
                    record.insert(schema::ALL_NTC_READS, total_reads.as_str());
                    record.insert(schema::TOTAL_NTC_READS, FieldValue::Text(total_reads));
                    record.insert(schema::ALL_NTC_TARGET_READS, target_reads.as_str());
                    record.insert(schema::TOTAL_NTC_TARGET_READS, FieldValue::Text(target_reads));
                    record.insert(schema::MAX_NTC_READS, to_integer(totals.max_total_reads));
                    record.insert(schema::MAX_NTC_TARGET_READS, to_integer(totals.max_target_reads));
                }
                None if reports_ntc => append_comment(record, schema::RUN_COMMENTS, NO_NTC_COMMENT),
                None => {}
            }
        }
    }

    fn apply_run_constants(&self, records: &mut [SampleRecord], columns: &mut BTreeSet<String>) {
        let constants = [
            (schema::KRAKEN_DB_VERSION, &self.config.kraken_db_version),
            (schema::PIPELINE_VERSION, &self.config.pipeline_version),
        ];
        for (column, value) in constants {
            columns.insert(column.to_string());
            if let Some(value) = value {
                for record in records.iter_mut() {
                    record.insert(column, value.as_str());
                }
            }
        }
    }

    fn assign_identifiers(&self, records: &mut [SampleRecord], columns: &mut BTreeSet<String>) {
        columns.insert(schema::RUN.to_string());
        for record in records.iter_mut() {
            let identity = self.id_rules.assign(&record.sample);
            let run = self
                .config
                .workflow_run_name
                .clone()
                .or(identity.run_id);
            log::debug!("{} -> sample {}, run {:?}", record.sample, identity.sample_id, run);
            record.sample = identity.sample_id;
            if let Some(run) = run {
                record.insert(schema::RUN, FieldValue::Text(run));
            }
        }
    }

    fn check_completeness(&self, records: &mut [SampleRecord], columns: &mut BTreeSet<String>) {
        if !self.config.schema.contains(schema::PASS_NA) {
            return;
        }
        columns.insert(schema::PASS_NA.to_string());
        let checked: Vec<&String> = self
            .config
            .completeness_columns
            .iter()
            .filter(|c| self.config.schema.contains(c))
            .collect();
        for record in records.iter_mut() {
            let complete = checked.iter().all(|c| record.contains(c));
            let value = if complete { "True" } else { MISSING_DATA_WARNING };
            record.insert(schema::PASS_NA, value);
        }
    }

    fn combine_comments(&self, records: &mut [SampleRecord], columns: &mut BTreeSet<String>) {
        let comment_columns: Vec<&str> = self
            .config
            .comment_columns
            .iter()
            .map(String::as_str)
            .chain(DERIVED_COMMENT_COLUMNS.iter().copied())
            .collect();

        for record in records.iter_mut() {
            let comments = merge_comments(record, &comment_columns);
            if !comments.is_empty() {
                record.insert(schema::COMMENTS, FieldValue::Text(comments));
            }
        }
        for column in &comment_columns {
            columns.remove(*column);
        }
        columns.insert(schema::COMMENTS.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ntc::{accumulate_negative_control_totals, KrakenRow, NegativeControlReport};
    use crate::schema::*;
    use crate::stage::StageInput;
    use std::path::PathBuf;

    fn table(stage: &str, columns: &[&str], rows: Vec<SampleRecord>) -> StageTable {
        StageTable::new(stage, columns.iter().map(|c| c.to_string()).collect(), rows)
    }

    fn quality() -> StageTable {
        table(
            "quality_stats",
            &[TOTAL_READS, READS_REMOVED, MEDIAN_READ_QUALITY, AVERAGE_READ_QUALITY, "Quality Stats Comments"],
            vec![
                SampleRecord::new("S1")
                    .with(TOTAL_READS, 1_000_000i64)
                    .with(READS_REMOVED, 1200i64)
                    .with(MEDIAN_READ_QUALITY, 36.0)
                    .with(AVERAGE_READ_QUALITY, 34.0),
                SampleRecord::new("S2")
                    .with(TOTAL_READS, 900_000i64)
                    .with(READS_REMOVED, 800i64)
                    .with(MEDIAN_READ_QUALITY, 25.0)
                    .with(AVERAGE_READ_QUALITY, 24.0)
                    .with("Quality Stats Comments", "Average read quality < 30"),
            ],
        )
    }

    fn assembly() -> StageTable {
        table(
            "quast",
            &[CONTIGS, N50, ASSEMBLY_LENGTH, GENOME_RATIO, Z_SCORE, "QUAST Summary Comments"],
            vec![
                SampleRecord::new("S1")
                    .with(CONTIGS, 80i64)
                    .with(N50, 95_000i64)
                    .with(ASSEMBLY_LENGTH, 2_100_000i64)
                    .with(GENOME_RATIO, 0.99)
                    .with(Z_SCORE, 0.05),
                SampleRecord::new("S3")
                    .with(CONTIGS, 450i64)
                    .with(N50, 9_000i64)
                    .with(ASSEMBLY_LENGTH, 1_400_000i64)
                    .with(GENOME_RATIO, 0.66)
                    .with(Z_SCORE, 2.1)
                    .with("QUAST Summary Comments", "Contig # > 300"),
            ],
        )
    }

    fn typing() -> StageTable {
        table(
            "typing",
            &[
                MEDIAN_COVERAGE,
                AVERAGE_COVERAGE,
                PERCENT_STREP,
                PERCENT_SPN,
                SECOND_GENUS,
                PERCENT_SECOND_GENUS,
                SEROTYPE,
                "SeroBA Comments",
            ],
            vec![
                SampleRecord::new("S1")
                    .with(MEDIAN_COVERAGE, 80.0)
                    .with(AVERAGE_COVERAGE, 82.0)
                    .with(PERCENT_STREP, 95.0)
                    .with(PERCENT_SPN, 90.0)
                    .with(PERCENT_SECOND_GENUS, 0.5)
                    .with(SEROTYPE, "19F")
                    .with("SeroBA Comments", "SeroBA did not detect contamination"),
                SampleRecord::new("S4")
                    .with(SEROTYPE, "3")
                    .with("SeroBA Comments", "SeroBA detected contamination"),
            ],
        )
    }

    fn typing_without_serotype() -> StageTable {
        let mut t = typing();
        t.columns.retain(|c| c != SEROTYPE);
        for r in t.records.iter_mut() {
            r.remove(SEROTYPE);
        }
        t
    }

    fn config() -> ReportConfig {
        ReportConfig {
            kraken_db_version: Some("k2_standard_20230605".to_string()),
            pipeline_version: Some("v1.3.0".to_string()),
            ..ReportConfig::default()
        }
    }

    fn present(tables: Vec<StageTable>) -> Vec<LoadedStage> {
        tables.into_iter().map(LoadedStage::Present).collect()
    }

    fn ntc_totals() -> NegativeControlTotals {
        let reports = vec![NegativeControlReport::new(
            "NTC1",
            vec![KrakenRow {
                percent: 100.0,
                clade_reads: 12,
                rank: "U".to_string(),
                taxid: "0".to_string(),
                name: "unclassified".to_string(),
            }],
        )];
        accumulate_negative_control_totals(&reports, &["NTC2".to_string()], "1300")
    }

    #[test]
    fn test_outer_join_keeps_every_sample() {
        let (q, a, t) = (quality(), assembly(), typing());
        let joined = merge_all(&[&q, &a, &t], |c| c.contains("Comments")).unwrap();
        assert_eq!(
            joined.samples().into_iter().collect::<Vec<_>>(),
            vec!["S1", "S2", "S3", "S4"]
        );
        let s4 = &joined.records["S4"];
        assert_eq!(s4.get(SEROTYPE), Some(&FieldValue::text("3")));
        assert_eq!(s4.get(TOTAL_READS), None);
    }

    #[test]
    fn test_join_is_order_independent() {
        let merger_config = config();
        let merger = ReportMerger::new(&merger_config).unwrap();
        let forward = merger
            .build(&present(vec![quality(), assembly(), typing()]), Some(&ntc_totals()))
            .unwrap();
        let reversed = merger
            .build(&present(vec![typing(), assembly(), quality()]), Some(&ntc_totals()))
            .unwrap();
        let shuffled = merger
            .build(&present(vec![assembly(), typing(), quality()]), Some(&ntc_totals()))
            .unwrap();
        assert_eq!(forward, reversed);
        assert_eq!(forward, shuffled);
    }

    #[test]
    fn test_conflicting_values_rejected() {
        let a = table("a", &[SEROTYPE], vec![SampleRecord::new("S1").with(SEROTYPE, "3")]);
        let b = table("b", &[SEROTYPE], vec![SampleRecord::new("S1").with(SEROTYPE, "19F")]);
        let err = merge_all(&[&b, &a], |_| false).unwrap_err();
        match err {
            crate::error::ReportError::Schema(SchemaError::ConflictingValues {
                first_stage,
                second_stage,
                ..
            }) => {
                assert_eq!(first_stage, "a");
                assert_eq!(second_stage, "b");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_agreeing_values_accepted() {
        let a = table("a", &[CONTIGS], vec![SampleRecord::new("S1").with(CONTIGS, 80i64)]);
        let b = table("b", &[CONTIGS], vec![SampleRecord::new("S1").with(CONTIGS, 80.0)]);
        assert!(merge_all(&[&a, &b], |_| false).is_ok());
    }

    #[test]
    fn test_colliding_comment_columns_combined() {
        let a = table("coverage", &[COMMENTS], vec![SampleRecord::new("S1").with(COMMENTS, "Low coverage")]);
        let b = table("results", &[COMMENTS], vec![SampleRecord::new("S1").with(COMMENTS, "Contamination")]);
        let joined = merge_all(&[&b, &a], |c| c == COMMENTS).unwrap();
        assert_eq!(
            joined.records["S1"].get(COMMENTS),
            Some(&FieldValue::text("Low coverage;Contamination"))
        );
    }

    #[test]
    fn test_merge_comments() {
        let mut record = SampleRecord::new("S1")
            .with("c1", "")
            .with("c2", "A")
            .with("c4", "B")
            .with(SEROTYPE, "3");
        let combined = merge_comments(&mut record, &["c1", "c2", "c3", "c4"]);
        assert_eq!(combined, "A;B");
        assert!(!record.contains("c2"));
        assert!(!record.contains("c4"));
        assert!(record.contains(SEROTYPE));
    }

    #[test]
    fn test_join_comments_trims_separators() {
        assert_eq!(join_comments([";A;", "", ";;", "B"]), "A;B");
        // Repeated text from different columns is kept
        assert_eq!(join_comments(["A", "A"]), "A;A");
        assert_eq!(join_comments(Vec::<String>::new()), "");
    }

    #[test]
    fn test_build_full_report() {
        let config = config();
        let merger = ReportMerger::new(&config).unwrap();
        let report = merger
            .build(&present(vec![quality(), assembly(), typing()]), Some(&ntc_totals()))
            .unwrap();

        assert_eq!(report.columns, ReportSchema::canonical().names());
        assert_eq!(report.samples(), vec!["S1", "S2", "S3", "S4"]);

        let s1 = report.record("S1").unwrap();
        assert_eq!(s1.get(SEROTYPE), Some(&FieldValue::text("19F")));
        assert_eq!(s1.get(KRAKEN_DB_VERSION), Some(&FieldValue::text("k2_standard_20230605")));
        assert_eq!(s1.get(PIPELINE_VERSION), Some(&FieldValue::text("v1.3.0")));
        assert_eq!(s1.get(ALL_NTC_READS), Some(&FieldValue::text("NTC1: 12, NTC2: 0")));
        assert_eq!(s1.get(MAX_NTC_READS), Some(&FieldValue::Integer(12)));
        assert_eq!(s1.get(MAX_NTC_TARGET_READS), Some(&FieldValue::Integer(0)));
        assert_eq!(
            s1.get(COMMENTS),
            Some(&FieldValue::text("SeroBA did not detect contamination"))
        );
        // Columns outside the schema are dropped
        assert!(!s1.contains(PASS_ASSEMBLY_LENGTH));
        assert!(!s1.contains("SeroBA Comments"));

        let s3 = report.record("S3").unwrap();
        assert_eq!(
            s3.get(COMMENTS),
            Some(&FieldValue::text(
                "Contig # > 300;Assembly length is less than 1500000 bp.;Contig # > 300"
            ))
        );
    }

    #[test]
    fn test_build_without_negative_controls() {
        let config = config();
        let merger = ReportMerger::new(&config).unwrap();
        let report = merger
            .build(&present(vec![quality(), assembly(), typing()]), None)
            .unwrap();
        let s1 = report.record("S1").unwrap();
        assert_eq!(s1.get(MAX_NTC_READS), None);
        assert_eq!(s1.get(ALL_NTC_READS), None);
        assert_eq!(
            s1.get(COMMENTS),
            Some(&FieldValue::text(
                "SeroBA did not detect contamination;No NTC in data set"
            ))
        );
    }

    #[test]
    fn test_build_pass_columns_variant() {
        let config = ReportConfig {
            schema: ReportSchema::without_negative_controls(),
            ..config()
        };
        let merger = ReportMerger::new(&config).unwrap();
        let quality_with_pass = {
            let mut t = quality();
            t.columns.push(PASS_AVERAGE_READ_QUALITY.to_string());
            t
        };
        let coverage = table(
            "coverage",
            &[PASS_COVERAGE],
            vec![SampleRecord::new("S1").with(PASS_COVERAGE, true)],
        );
        let kraken = table(
            "kraken",
            &[PASS_KRAKEN],
            vec![SampleRecord::new("S1").with(PASS_KRAKEN, true)],
        );
        let report = merger
            .build(
                &present(vec![quality_with_pass, assembly(), typing(), coverage, kraken]),
                None,
            )
            .unwrap();

        let s3 = report.record("S3").unwrap();
        assert_eq!(s3.get(PASS_CONTIGS), Some(&FieldValue::Boolean(false)));
        assert_eq!(s3.get(PASS_ASSEMBLY_LENGTH), Some(&FieldValue::Boolean(false)));
        assert_eq!(s3.get(PASS_NA), Some(&FieldValue::text("WARNING MISSING DATA")));
        assert_eq!(s3.get(NTC_RESULT), Some(&FieldValue::text("FAIL")));

        let s1 = report.record("S1").unwrap();
        assert_eq!(s1.get(PASS_CONTIGS), Some(&FieldValue::Boolean(true)));
    }

    #[test]
    fn test_missing_required_column_is_schema_error() {
        let config = config();
        let merger = ReportMerger::new(&config).unwrap();
        let err = merger.build(&present(vec![quality()]), None).unwrap_err();
        assert!(matches!(
            err,
            crate::error::ReportError::Schema(SchemaError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_absent_optional_stage_uses_fallback() {
        let config = config();
        let merger = ReportMerger::new(&config).unwrap();
        let seroba = StageInput::optional("seroba", PathBuf::from("missing/seroba.tsv"))
            .with_fallback(SEROTYPE, "NotRun")
            .with_absence_comment("SeroBA did not run");
        let absent = LoadedStage::Absent(AbsentStage::from_input(&seroba));
        let mut stages = present(vec![quality(), assembly(), typing_without_serotype()]);
        stages.push(absent);

        let report = merger.build(&stages, Some(&ntc_totals())).unwrap();
        let s2 = report.record("S2").unwrap();
        assert_eq!(s2.get(SEROTYPE), Some(&FieldValue::text("NotRun")));
        assert_eq!(
            s2.get(COMMENTS),
            Some(&FieldValue::text("Average read quality < 30;SeroBA did not run"))
        );
    }

    #[test]
    fn test_absent_stage_without_fallback_keeps_columns() {
        let config = config();
        let merger = ReportMerger::new(&config).unwrap();
        let seroba = StageInput::optional("seroba", PathBuf::from("missing/seroba.tsv"));
        let mut stages = present(vec![quality(), assembly(), typing_without_serotype()]);
        stages.push(LoadedStage::Absent(AbsentStage::from_input(&seroba)));

        let report = merger.build(&stages, Some(&ntc_totals())).unwrap();
        assert!(report.columns.iter().any(|c| c == SEROTYPE));
        let s2 = report.record("S2").unwrap();
        assert_eq!(s2.get(SEROTYPE), None);
        assert_eq!(
            s2.get(COMMENTS),
            Some(&FieldValue::text("Average read quality < 30;No seroba results"))
        );
    }

    #[test]
    fn test_absent_stages_are_order_independent() {
        let config = config();
        let merger = ReportMerger::new(&config).unwrap();
        let alpha = LoadedStage::Absent(AbsentStage::from_input(
            &StageInput::optional("alpha", "missing/alpha.tsv")
                .with_fallback(SECOND_GENUS, "Lactococcus")
                .with_absence_comment("alpha did not run"),
        ));
        let beta = LoadedStage::Absent(AbsentStage::from_input(
            &StageInput::optional("beta", "missing/beta.tsv")
                .with_fallback(SECOND_GENUS, "Enterococcus")
                .with_absence_comment("beta did not run"),
        ));

        let mut forward = present(vec![quality(), assembly(), typing()]);
        forward.extend([alpha.clone(), beta.clone()]);
        let mut reversed = vec![beta, alpha];
        reversed.extend(present(vec![typing(), assembly(), quality()]));

        let a = merger.build(&forward, Some(&ntc_totals())).unwrap();
        let b = merger.build(&reversed, Some(&ntc_totals())).unwrap();
        assert_eq!(a, b);

        let s2 = a.record("S2").unwrap();
        assert_eq!(s2.get(SECOND_GENUS), Some(&FieldValue::text("Lactococcus")));
        assert_eq!(
            s2.get(COMMENTS),
            Some(&FieldValue::text(
                "Average read quality < 30;alpha did not run;beta did not run"
            ))
        );
    }

    #[test]
    fn test_pass_layout_total_ntc_columns() {
        let config = ReportConfig {
            schema: ReportSchema::without_negative_controls(),
            ..config()
        };
        let merger = ReportMerger::new(&config).unwrap();
        let extra = table(
            "pass_flags",
            &[PASS_AVERAGE_READ_QUALITY, PASS_COVERAGE, PASS_KRAKEN],
            vec![SampleRecord::new("S1")
                .with(PASS_AVERAGE_READ_QUALITY, true)
                .with(PASS_COVERAGE, true)
                .with(PASS_KRAKEN, true)],
        );
        let report = merger
            .build(&present(vec![quality(), assembly(), typing(), extra]), Some(&ntc_totals()))
            .unwrap();
        assert!(report.columns.iter().any(|c| c == TOTAL_NTC_READS));
        assert!(!report.columns.iter().any(|c| c == ALL_NTC_READS));
        let s1 = report.record("S1").unwrap();
        assert_eq!(s1.get(TOTAL_NTC_READS), Some(&FieldValue::text("NTC1: 12, NTC2: 0")));
        assert_eq!(s1.get(TOTAL_NTC_TARGET_READS), Some(&FieldValue::text("NTC1: 0, NTC2: 0")));
        assert_eq!(s1.get(NTC_RESULT), Some(&FieldValue::text("PASS")));
    }

    #[test]
    fn test_identifiers_reassigned() {
        let config = ReportConfig {
            workflow_run_name: None,
            ..config()
        };
        let merger = ReportMerger::new(&config).unwrap();
        let renamed = table(
            "serotype",
            &[SEROTYPE],
            vec![
                SampleRecord::new("S9-230415_M04567_0123_000000000-KTV9P").with(SEROTYPE, "3"),
                SampleRecord::new("S8_S3_L001").with(SEROTYPE, "4"),
            ],
        );
        let mut stages = present(vec![quality(), assembly(), typing()]);
        stages.push(LoadedStage::Present(renamed));
        let report = merger.build(&stages, Some(&ntc_totals())).unwrap();

        let s9 = report.record("S9").unwrap();
        assert_eq!(
            s9.get(RUN),
            Some(&FieldValue::text("230415_M04567_0123_000000000-KTV9P"))
        );
        let s8 = report.record("S8").unwrap();
        assert_eq!(s8.get(RUN), None);
    }

    #[test]
    fn test_workflow_run_name_overrides_run() {
        let config = ReportConfig {
            workflow_run_name: Some("nightly_42".to_string()),
            ..config()
        };
        let merger = ReportMerger::new(&config).unwrap();
        let report = merger
            .build(&present(vec![quality(), assembly(), typing()]), None)
            .unwrap();
        for record in &report.records {
            assert_eq!(record.get(RUN), Some(&FieldValue::text("nightly_42")));
        }
    }
}

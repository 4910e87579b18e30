//! Negative control (NTC) accounting
//!
//! Reads Kraken reports for the no-template controls of a run, totals the
//! unclassified/root and target-organism reads per control, and decides the
//! run-level NTC verdict.

use crate::config::NegativeControlConfig;
use crate::error::{ReportError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const KRAKEN_REPORT_SUFFIX: &str = ".kraken.txt";
const EMPTY_PLACEHOLDER: &str = "Empty";

/// One line of a Kraken report
#[derive(Debug, Clone, PartialEq)]
pub struct KrakenRow {
    pub percent: f64,
    /// Reads in the clade rooted at this taxon
    pub clade_reads: u64,
    pub rank: String,
    pub taxid: String,
    pub name: String,
}

/// Kraken classification of one negative control
#[derive(Debug, Clone, PartialEq)]
pub struct NegativeControlReport {
    pub sample: String,
    pub rows: Vec<KrakenRow>,
}

impl NegativeControlReport {
    pub fn new(sample: impl Into<String>, rows: Vec<KrakenRow>) -> Self {
        Self {
            sample: sample.into(),
            rows,
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown");
        let sample = file_name
            .split(KRAKEN_REPORT_SUFFIX)
            .next()
            .unwrap_or(file_name)
            .to_string();
        let file = File::open(path)?;
        let rows = parse_kraken_report(file, path)?;
        Ok(Self { sample, rows })
    }

    /// Reads counted towards the control's total: unclassified plus root
    pub fn total_reads(&self) -> u64 {
        self.rows
            .iter()
            .filter(|r| r.rank == "U" || r.name.contains("root"))
            .map(|r| r.clade_reads)
            .sum()
    }

    pub fn target_reads(&self, target_taxid: &str) -> u64 {
        self.rows
            .iter()
            .filter(|r| r.taxid == target_taxid)
            .map(|r| r.clade_reads)
            .sum()
    }
}

pub fn parse_kraken_report<R: Read>(reader: R, source: &Path) -> Result<Vec<KrakenRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(reader);

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| ReportError::csv(source, e))?;
        if record.len() < 6 {
            log::warn!("Skipping short Kraken line in {}: {:?}", source.display(), record);
            continue;
        }
        let field = |idx: usize| record.get(idx).unwrap_or("").trim();
        let (Ok(percent), Ok(clade_reads)) = (field(0).parse::<f64>(), field(1).parse::<u64>())
        else {
            log::warn!("Skipping unparseable Kraken line in {}: {:?}", source.display(), record);
            continue;
        };
        rows.push(KrakenRow {
            percent,
            clade_reads,
            rank: field(3).to_string(),
            taxid: field(4).to_string(),
            name: field(5).to_string(),
        });
    }
    Ok(rows)
}

/// Per-control read totals across a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NegativeControlTotals {
    pub total_reads: BTreeMap<String, u64>,
    pub target_reads: BTreeMap<String, u64>,
    pub max_total_reads: u64,
    pub max_target_reads: u64,
}

impl NegativeControlTotals {
    pub fn is_empty(&self) -> bool {
        self.total_reads.is_empty()
    }

    /// `"NTC1: 12, NTC2: 0"`
    pub fn describe_total_reads(&self) -> String {
        describe(&self.total_reads)
    }

    pub fn describe_target_reads(&self) -> String {
        describe(&self.target_reads)
    }

    /// Verdict for the whole run. A run with no controls cannot pass.
    pub fn verdict(&self, config: &NegativeControlConfig) -> NtcVerdict {
        if self.is_empty() {
            return NtcVerdict::Fail;
        }
        let too_many_reads = self.total_reads.values().any(|&n| n >= config.read_limit);
        let too_many_target = self
            .target_reads
            .values()
            .any(|&n| n >= config.target_read_limit);
        if too_many_reads || too_many_target {
            NtcVerdict::Fail
        } else {
            NtcVerdict::Pass
        }
    }
}

fn describe(counts: &BTreeMap<String, u64>) -> String {
    counts
        .iter()
        .map(|(sample, n)| format!("{}: {}", sample, n))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NtcVerdict {
    Pass,
    Fail,
}

impl NtcVerdict {
    pub fn as_str(self) -> &'static str {
        match self {
            NtcVerdict::Pass => "PASS",
            NtcVerdict::Fail => "FAIL",
        }
    }
}

/// Sum each control's reads. Controls an upstream check found empty are
/// included with zero reads rather than left out.
pub fn accumulate_negative_control_totals(
    reports: &[NegativeControlReport],
    empty_samples: &[String],
    target_taxid: &str,
) -> NegativeControlTotals {
    let mut totals = NegativeControlTotals::default();

    for report in reports {
        *totals.total_reads.entry(report.sample.clone()).or_insert(0) += report.total_reads();
        *totals.target_reads.entry(report.sample.clone()).or_insert(0) +=
            report.target_reads(target_taxid);
    }

    for sample in empty_samples {
        if sample.is_empty() || sample == EMPTY_PLACEHOLDER {
            continue;
        }
        totals.total_reads.entry(sample.clone()).or_insert(0);
        totals.target_reads.entry(sample.clone()).or_insert(0);
    }

    totals.max_total_reads = totals.total_reads.values().copied().max().unwrap_or(0);
    totals.max_target_reads = totals.target_reads.values().copied().max().unwrap_or(0);

    log::debug!(
        "Accumulated {} negative controls (max reads {}, max target reads {})",
        totals.total_reads.len(),
        totals.max_total_reads,
        totals.max_target_reads
    );
    totals
}

/// Split a sample list given either as separate names or in the bracketed
/// `[a,b,c]` form produced upstream
pub fn parse_sample_list<S: AsRef<str>>(items: &[S]) -> Vec<String> {
    items
        .iter()
        .flat_map(|item| item.as_ref().split(','))
        .map(|s| {
            s.trim()
                .trim_matches(&['[', ']'][..])
                .trim()
                .trim_matches('\'')
                .trim_matches('"')
                .to_string()
        })
        .filter(|s| !s.is_empty() && s != EMPTY_PLACEHOLDER)
        .collect()
}

/// Empty samples that are negative controls
pub fn find_empty_negative_controls(empty_samples: &[String]) -> Vec<String> {
    empty_samples
        .iter()
        .filter(|s| s.to_lowercase().contains("ntc"))
        .inspect(|s| log::debug!("Empty NTC sample identified: {}", s))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn row(clade_reads: u64, rank: &str, taxid: &str, name: &str) -> KrakenRow {
        KrakenRow {
            percent: 0.0,
            clade_reads,
            rank: rank.to_string(),
            taxid: taxid.to_string(),
            name: name.to_string(),
        }
    }

    fn report(sample: &str, unclassified: u64, root: u64, target: u64) -> NegativeControlReport {
        NegativeControlReport::new(
            sample,
            vec![
                row(unclassified, "U", "0", "unclassified"),
                row(root, "R", "1", "root"),
                row(target, "F", "1300", "      Streptococcaceae"),
            ],
        )
    }

    #[test]
    fn test_report_totals() {
        let ntc = report("NTC1", 40, 60, 7);
        assert_eq!(ntc.total_reads(), 100);
        assert_eq!(ntc.target_reads("1300"), 7);
        assert_eq!(ntc.target_reads("1313"), 0);
    }

    #[test]
    fn test_accumulate_with_empty_samples() {
        let reports = vec![report("NTC1", 10, 20, 3), report("NTC2", 100, 5, 1)];
        let empty = vec!["NTC3".to_string(), "NTC4".to_string()];
        let totals = accumulate_negative_control_totals(&reports, &empty, "1300");

        assert_eq!(totals.total_reads.len(), 4);
        assert_eq!(totals.total_reads["NTC1"], 30);
        assert_eq!(totals.total_reads["NTC2"], 105);
        assert_eq!(totals.total_reads["NTC3"], 0);
        assert_eq!(totals.target_reads["NTC4"], 0);
        assert_eq!(totals.max_total_reads, 105);
        assert_eq!(totals.max_target_reads, 3);
        assert_eq!(
            totals.describe_total_reads(),
            "NTC1: 30, NTC2: 105, NTC3: 0, NTC4: 0"
        );
    }

    #[test]
    fn test_accumulate_only_empty_samples() {
        let empty = vec!["NTC1".to_string(), "Empty".to_string()];
        let totals = accumulate_negative_control_totals(&[], &empty, "1300");
        assert_eq!(totals.total_reads.len(), 1);
        assert_eq!(totals.max_total_reads, 0);
        assert_eq!(totals.max_target_reads, 0);
    }

    #[test]
    fn test_empty_sample_already_reported_is_not_zeroed() {
        let reports = vec![report("NTC1", 10, 0, 0)];
        let totals = accumulate_negative_control_totals(&reports, &["NTC1".to_string()], "1300");
        assert_eq!(totals.total_reads["NTC1"], 10);
    }

    #[test]
    fn test_verdict() {
        let config = NegativeControlConfig::default();
        let clean = accumulate_negative_control_totals(&[report("NTC1", 10, 10, 0)], &[], "1300");
        assert_eq!(clean.verdict(&config), NtcVerdict::Pass);

        let contaminated =
            accumulate_negative_control_totals(&[report("NTC1", 10, 10, 100)], &[], "1300");
        assert_eq!(contaminated.verdict(&config), NtcVerdict::Fail);

        assert_eq!(NegativeControlTotals::default().verdict(&config), NtcVerdict::Fail);
    }

    #[test]
    fn test_parse_kraken_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("NTC-1.kraken.txt");
        let mut file = File::create(&path).unwrap();
        writeln!(file, " 80.00\t800\t800\tU\t0\tunclassified").unwrap();
        writeln!(file, " 20.00\t200\t5\tR\t1\troot").unwrap();
        writeln!(file, "  1.00\t10\t0\tF\t1300\t      Streptococcaceae").unwrap();
        writeln!(file, "garbage line").unwrap();
        drop(file);

        let ntc = NegativeControlReport::from_path(&path).unwrap();
        assert_eq!(ntc.sample, "NTC-1");
        assert_eq!(ntc.rows.len(), 3);
        assert_eq!(ntc.rows[2].name, "Streptococcaceae");
        assert_eq!(ntc.total_reads(), 1000);
        assert_eq!(ntc.target_reads("1300"), 10);
    }

    #[test]
    fn test_parse_sample_list() {
        assert_eq!(
            parse_sample_list(&["[NTC1,", "SPN3,", "ntc_2]"]),
            vec!["NTC1", "SPN3", "ntc_2"]
        );
        assert_eq!(parse_sample_list(&["[Empty]"]), Vec::<String>::new());
        assert_eq!(parse_sample_list(&["NTC1"]), vec!["NTC1"]);
    }

    #[test]
    fn test_parse_sample_list_separate_names() {
        assert_eq!(parse_sample_list(&["NTC1", "NTC2"]), vec!["NTC1", "NTC2"]);
        assert_eq!(
            parse_sample_list(&["[NTC1,NTC2]", "plate2_ntc"]),
            vec!["NTC1", "NTC2", "plate2_ntc"]
        );
    }

    #[test]
    fn test_find_empty_negative_controls() {
        let samples = vec![
            "NTC1".to_string(),
            "SPN3".to_string(),
            "plate2_ntc".to_string(),
        ];
        assert_eq!(
            find_empty_negative_controls(&samples),
            vec!["NTC1", "plate2_ntc"]
        );
    }
}

//! Assembly pass/fail flags derived after the merge

use crate::record::SampleRecord;
use crate::schema::{ASSEMBLY_LENGTH, CONTIGS, Z_SCORE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QcFlag {
    pub pass: bool,
    /// Set only when the check fails
    pub comment: Option<String>,
}

impl QcFlag {
    pub fn passed() -> Self {
        Self {
            pass: true,
            comment: None,
        }
    }

    pub fn failed(comment: String) -> Self {
        Self {
            pass: false,
            comment: Some(comment),
        }
    }
}

/// `None` when the record has no assembly length
pub fn derive_assembly_length_flag(
    record: &SampleRecord,
    min_length: i64,
    max_length: i64,
) -> Option<QcFlag> {
    let length = record.get_f64(ASSEMBLY_LENGTH)?;
    let flag = if length < min_length as f64 {
        QcFlag::failed(format!("Assembly length is less than {} bp.", min_length))
    } else if length > max_length as f64 {
        QcFlag::failed(format!("Assembly length is greater than {} bp.", max_length))
    } else {
        QcFlag::passed()
    };
    Some(flag)
}

pub fn derive_z_score_flag(record: &SampleRecord, max_stdev: f64) -> Option<QcFlag> {
    let z = record.get_f64(Z_SCORE)?;
    let flag = if z.abs() > max_stdev {
        QcFlag::failed(format!(
            "Assembly z-score magnitude is greater than {}.",
            max_stdev
        ))
    } else {
        QcFlag::passed()
    };
    Some(flag)
}

pub fn derive_contigs_flag(record: &SampleRecord, max_contigs: i64) -> Option<QcFlag> {
    let contigs = record.get_f64(CONTIGS)?;
    let flag = if contigs > max_contigs as f64 {
        QcFlag::failed(format!("Contig # > {}", max_contigs))
    } else {
        QcFlag::passed()
    };
    Some(flag)
}

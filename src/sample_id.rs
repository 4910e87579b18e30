//! Sample and run identifier extraction
//!
//! Sequencer sample names either embed the run name (`SAMPLE-<run>`), or
//! carry a sample-sheet suffix (`SAMPLE_S12_L001`). A run-name match wins
//! over the suffix split.

use crate::config::SampleIdConfig;
use crate::error::Result;
use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleIdentity {
    pub sample_id: String,
    /// `None` when the name carries no run name
    pub run_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SampleIdRules {
    run_name: Regex,
    split: Regex,
}

impl SampleIdRules {
    pub fn new(run_name_regex: &str, split_regex: &str) -> Result<Self> {
        Ok(Self {
            run_name: Regex::new(run_name_regex)?,
            split: Regex::new(split_regex)?,
        })
    }

    pub fn from_config(config: &SampleIdConfig) -> Result<Self> {
        Self::new(&config.run_name_regex, &config.split_regex)
    }

    pub fn assign(&self, sample_name: &str) -> SampleIdentity {
        assign_run_and_sample_id(sample_name, &self.run_name, &self.split)
    }
}

pub fn assign_run_and_sample_id(
    sample_name: &str,
    run_name_regex: &Regex,
    split_regex: &Regex,
) -> SampleIdentity {
    if let Some(run) = run_name_regex.find(sample_name) {
        let sample_id = sample_name.split('-').next().unwrap_or(sample_name);
        return SampleIdentity {
            sample_id: sample_id.to_string(),
            run_id: Some(run.as_str().to_string()),
        };
    }

    let sample_id = split_regex.split(sample_name).next().unwrap_or(sample_name);
    SampleIdentity {
        sample_id: sample_id.to_string(),
        run_id: None,
    }
}

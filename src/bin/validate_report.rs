//! SPNtypeID Report Validation Tool
//!
//! Checks a run report against a trusted baseline within per-column
//! tolerances. Exits 0 on a match, 1 on discrepancies and 2 when a report
//! cannot be read.

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use spntypeid_report::schema::{GENOME_RATIO, Z_SCORE};
use spntypeid_report::validation::{parse_expected_average, EXIT_CONFIG_ERROR};
use spntypeid_report::{ReportValidator, ValidationConfig};
use std::path::PathBuf;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("❌ {:#}", e);
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    }
}

fn run() -> Result<i32> {
    let matches = Command::new("spntypeid-validate-report")
        .version("0.1.0")
        .about("Compare a run report against a baseline within tolerances")
        .author("Megan Johnson")
        .arg(
            Arg::new("baseline")
                .short('b')
                .long("baseline")
                .value_name("CSV")
                .help("Trusted baseline report")
                .required(true),
        )
        .arg(
            Arg::new("candidate")
                .short('t')
                .long("candidate")
                .value_name("CSV")
                .help("Report under test")
                .required(true),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("JSON")
                .help("Validation configuration with tolerance rules"),
        )
        .arg(
            Arg::new("expected_ratio")
                .long("expected-ratio")
                .value_name("SAMPLE=VALUE")
                .help("Expected genome length ratio for a sample (repeatable)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("expected_z_score")
                .long("expected-z-score")
                .value_name("SAMPLE=VALUE")
                .help("Expected assembly z-score for a sample (repeatable)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("json")
                .short('j')
                .long("json")
                .value_name("JSON")
                .help("Write the full comparison as JSON"),
        )
        .get_matches();

    // Parse arguments
    let baseline_file = PathBuf::from(matches.get_one::<String>("baseline").unwrap());
    let candidate_file = PathBuf::from(matches.get_one::<String>("candidate").unwrap());
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => ValidationConfig::from_json_file(path)
            .with_context(|| format!("Could not load configuration {}", path))?,
        None => ValidationConfig::default(),
    };
    for (id, column) in [("expected_ratio", GENOME_RATIO), ("expected_z_score", Z_SCORE)] {
        for arg in matches.get_many::<String>(id).into_iter().flatten() {
            let Some((sample, average)) = parse_expected_average(arg) else {
                anyhow::bail!("Expected SAMPLE=VALUE, got '{}'", arg);
            };
            if !config.set_expected_average(column, &sample, average) {
                anyhow::bail!("No tolerance band configured for column '{}'", column);
            }
        }
    }

    println!("🔍 SPNtypeID Report Validation Tool");
    println!("Baseline: {}", baseline_file.display());
    println!("Candidate: {}", candidate_file.display());

    let baseline = config
        .load_report(&baseline_file)
        .with_context(|| format!("Could not read baseline {}", baseline_file.display()))?;
    let candidate = config
        .load_report(&candidate_file)
        .with_context(|| format!("Could not read candidate {}", candidate_file.display()))?;

    let validator = ReportValidator::new(config);
    let result = validator.validate(&baseline, &candidate);

    let exit_code = result.finish(matches.get_one::<String>("json"));

    println!("📊 Comparison:");
    println!("  Samples: {} baseline, {} candidate", baseline.len(), candidate.len());
    println!("  Within tolerance: {}", result.suppressed.len());
    println!("  Discrepancies: {}", result.discrepancies.len());
    for diff in &result.discrepancies {
        println!(
            "  ⚠️  {} / {}: {} -> {} ({:?})",
            diff.sample,
            diff.column,
            diff.baseline.as_deref().unwrap_or("<missing>"),
            diff.candidate.as_deref().unwrap_or("<missing>"),
            diff.kind
        );
    }

    let outcome = result.outcome();
    match exit_code {
        0 => println!("✅ Validation {}", outcome.as_str()),
        _ => println!("❌ Validation {}", outcome.as_str()),
    }
    Ok(exit_code)
}

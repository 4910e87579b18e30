//! SPNtypeID Report Tool
//!
//! Merges per-stage summaries and negative-control Kraken reports into one
//! report per run

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use spntypeid_report::ntc::{
    accumulate_negative_control_totals, parse_sample_list, NegativeControlReport,
};
use spntypeid_report::stage::read_kraken_db_version;
use spntypeid_report::{
    load_stage_tables, ReportConfig, ReportMerger, ReportSchema, ReportWriter, RunSummary,
    StageInput,
};
use std::path::PathBuf;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = Command::new("spntypeid-create-report")
        .version("0.1.0")
        .about("Merge per-stage summaries into one SPNtypeID run report")
        .author("Megan Johnson")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("JSON")
                .help("Report configuration file; flags below override it"),
        )
        .arg(
            Arg::new("stage")
                .short('s')
                .long("stage")
                .value_name("[STAGE=]TSV")
                .help("Optional stage summary (repeatable)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("required_stage")
                .short('r')
                .long("required-stage")
                .value_name("[STAGE=]TSV")
                .help("Stage summary that must exist (repeatable)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("ntc_report")
                .short('n')
                .long("ntc-report")
                .value_name("KRAKEN")
                .help("Kraken report of a negative control (repeatable)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("empty_ntc")
                .long("empty-ntc")
                .value_name("SAMPLES")
                .help("Negative controls with no reads, as names or [a,b,c]")
                .num_args(1..)
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("kraken_version_file")
                .long("kraken-version-file")
                .value_name("YAML")
                .help("Version file with a 'kraken DB:' line"),
        )
        .arg(
            Arg::new("kraken_version")
                .long("kraken-version")
                .value_name("VERSION")
                .help("Kraken database version"),
        )
        .arg(
            Arg::new("pipeline_version")
                .long("pipeline-version")
                .value_name("VERSION")
                .help("Pipeline version"),
        )
        .arg(
            Arg::new("run_name")
                .long("run-name")
                .value_name("NAME")
                .help("Workflow run name used as every sample's Run"),
        )
        .arg(
            Arg::new("no_ntc_layout")
                .long("no-ntc-layout")
                .help("Use the report layout with pass/fail columns")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("min_length")
                .long("min-length")
                .value_name("BP")
                .help("Minimum assembly length"),
        )
        .arg(
            Arg::new("max_length")
                .long("max-length")
                .value_name("BP")
                .help("Maximum assembly length"),
        )
        .arg(
            Arg::new("max_contigs")
                .long("max-contigs")
                .value_name("COUNT")
                .help("Maximum contig count"),
        )
        .arg(
            Arg::new("max_z_score")
                .long("max-z-score")
                .value_name("STDEV")
                .help("Maximum assembly length z-score magnitude"),
        )
        .arg(
            Arg::new("run_name_regex")
                .long("run-name-regex")
                .value_name("REGEX")
                .help("Pattern matching a run name embedded in sample names"),
        )
        .arg(
            Arg::new("split_regex")
                .long("split-regex")
                .value_name("REGEX")
                .help("Pattern splitting the sample id from sample-sheet suffixes"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("CSV")
                .help("Output report")
                .default_value("run_report.csv"),
        )
        .arg(
            Arg::new("summary_json")
                .long("summary-json")
                .value_name("JSON")
                .help("Also write a JSON run summary"),
        )
        .get_matches();

    // Parse arguments
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => ReportConfig::from_json_file(path)
            .with_context(|| format!("Could not load configuration {}", path))?,
        None => ReportConfig::default(),
    };
    if matches.get_flag("no_ntc_layout") {
        config.schema = ReportSchema::without_negative_controls();
    }
    if let Some(v) = matches.get_one::<String>("min_length") {
        config.thresholds.min_length = v.parse()?;
    }
    if let Some(v) = matches.get_one::<String>("max_length") {
        config.thresholds.max_length = v.parse()?;
    }
    if let Some(v) = matches.get_one::<String>("max_contigs") {
        config.thresholds.max_contigs = v.parse()?;
    }
    if let Some(v) = matches.get_one::<String>("max_z_score") {
        config.thresholds.max_z_score = v.parse()?;
    }
    if let Some(v) = matches.get_one::<String>("run_name_regex") {
        config.sample_ids.run_name_regex = v.clone();
    }
    if let Some(v) = matches.get_one::<String>("split_regex") {
        config.sample_ids.split_regex = v.clone();
    }
    if let Some(v) = matches.get_one::<String>("pipeline_version") {
        config.pipeline_version = Some(v.clone());
    }
    if let Some(v) = matches.get_one::<String>("run_name") {
        config.workflow_run_name = Some(v.clone());
    }
    if let Some(v) = matches.get_one::<String>("kraken_version") {
        config.kraken_db_version = Some(v.clone());
    } else if let Some(path) = matches.get_one::<String>("kraken_version_file") {
        config.kraken_db_version = read_kraken_db_version(path)?;
    }

    if config.thresholds.min_length > config.thresholds.max_length {
        anyhow::bail!(
            "Minimum assembly length {} exceeds maximum {}",
            config.thresholds.min_length,
            config.thresholds.max_length
        );
    }

    let mut stages = config.stages.clone();
    for (id, required) in [("required_stage", true), ("stage", false)] {
        if let Some(values) = matches.get_many::<String>(id) {
            stages.extend(values.map(|v| StageInput::from_arg(v, required)));
        }
    }
    if stages.is_empty() {
        anyhow::bail!("No stage summaries given; use --stage, --required-stage or a config file");
    }

    let ntc_paths: Vec<PathBuf> = matches
        .get_many::<String>("ntc_report")
        .map(|v| v.map(PathBuf::from).collect())
        .unwrap_or_default();
    let empty_args: Vec<String> = matches
        .get_many::<String>("empty_ntc")
        .map(|v| v.cloned().collect())
        .unwrap_or_default();
    let empty_ntcs = parse_sample_list(&empty_args);
    let output_file = PathBuf::from(matches.get_one::<String>("output").unwrap());

    println!("📋 SPNtypeID Report Tool");
    println!("Stage summaries: {}", stages.len());
    println!("NTC reports: {} ({} empty)", ntc_paths.len(), empty_ntcs.len());
    println!("Output: {}", output_file.display());

    println!("🔄 Loading stage summaries...");
    let loaded = load_stage_tables(&stages, &config.schema)?;

    let negative_controls = if ntc_paths.is_empty() && empty_ntcs.is_empty() {
        None
    } else {
        let reports = ntc_paths
            .iter()
            .map(|path| {
                NegativeControlReport::from_path(path)
                    .with_context(|| format!("Could not read NTC report {}", path.display()))
            })
            .collect::<Result<Vec<_>>>()?;
        Some(accumulate_negative_control_totals(
            &reports,
            &empty_ntcs,
            &config.negative_controls.target_taxid,
        ))
    };

    println!("🧬 Merging...");
    let merger = ReportMerger::new(&config)?;
    let report = merger.build(&loaded, negative_controls.as_ref())?;

    ReportWriter::new(&config.sentinels).write_csv(&report, &output_file)?;

    let summary = RunSummary::from_report(&report);
    if let Some(path) = matches.get_one::<String>("summary_json") {
        summary.export_json(path)?;
        println!("💾 Summary saved to: {}", path);
    }

    println!("✅ Report complete!");
    println!("📊 Summary Statistics:");
    println!("  Total samples: {}", summary.total_samples);
    println!("  Passed samples: {}", summary.passed_samples);
    println!("  Failed samples: {}", summary.failed_samples);
    println!("  Samples with comments: {}", summary.samples_with_comments.len());
    if let Some(ntc) = &summary.ntc_result {
        println!("  NTC result: {}", ntc);
    }
    println!("💾 Report saved to: {}", output_file.display());

    Ok(())
}

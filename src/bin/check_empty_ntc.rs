//! SPNtypeID Empty NTC Tool
//!
//! Picks the negative controls out of the samples an upstream check found
//! empty, so the report can count them with zero reads

use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use spntypeid_report::ntc::{find_empty_negative_controls, parse_sample_list};
use spntypeid_report::reporting::write_sample_list;
use std::path::PathBuf;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = Command::new("spntypeid-check-empty-ntc")
        .version("0.1.0")
        .about("List the empty samples that are negative controls")
        .author("Megan Johnson")
        .arg(
            Arg::new("empty_samples")
                .short('e')
                .long("empty-samples")
                .value_name("SAMPLES")
                .help("Samples found empty, as names or [a,b,c]")
                .num_args(1..)
                .action(ArgAction::Append)
                .required(true),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("CSV")
                .help("Output list of empty NTC samples")
                .default_value("Empty_ntcs.csv"),
        )
        .get_matches();

    let empty_args: Vec<String> = matches
        .get_many::<String>("empty_samples")
        .map(|v| v.cloned().collect())
        .unwrap_or_default();
    let output_file = PathBuf::from(matches.get_one::<String>("output").unwrap());

    println!("🧪 SPNtypeID Empty NTC Tool");

    let empty_samples = parse_sample_list(&empty_args);
    let empty_ntcs = find_empty_negative_controls(&empty_samples);

    write_sample_list(&empty_ntcs, &output_file)?;

    println!("✅ {} of {} empty samples are NTCs", empty_ntcs.len(), empty_samples.len());
    for sample in &empty_ntcs {
        println!("  {}", sample);
    }
    println!("💾 List saved to: {}", output_file.display());

    Ok(())
}

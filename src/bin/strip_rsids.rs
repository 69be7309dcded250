//! Reset the ID column of a VCF to `.` so it can be annotated again from scratch

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use rsid_retrieval::{filter::strip_rsids_vcf, utils::ensure_parent_dirs};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "strip_rsids")]
#[command(about = "Replace every variant identifier in a VCF with '.'")]
struct Args {
    /// Input VCF file
    #[arg(long, value_name = "FILE")]
    input: PathBuf,

    /// Output VCF file
    #[arg(long, value_name = "FILE")]
    output: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();

    ensure_parent_dirs(&args.output)
        .with_context(|| format!("creating output directory for {:?}", args.output))?;

    let stats = strip_rsids_vcf(&args.input, &args.output)
        .with_context(|| format!("stripping identifiers from {:?}", args.input))?;

    println!("Processed {} variants", stats.processed);
    println!("Removed {} identifiers", stats.removed);
    println!("Output written to {}", args.output.display());
    Ok(())
}

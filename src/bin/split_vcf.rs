//! Split a VCF into one file per chromosome

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use rsid_retrieval::split::{all_chromosomes, parse_chromosome_selection, split_vcf_by_chromosome};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "split_vcf")]
#[command(about = "Split a VCF into <name>_chr<N>.vcf files, one per chromosome")]
#[command(long_about = "
split_vcf copies the header block and every data line of the selected
chromosomes into <output-dir>/<name>_chr<N>.vcf. Chromosome columns may use
any notation (16, chr16, NC_000016.10); lines are copied unchanged.
Chromosomes 1-21 are selected unless --chromosomes says otherwise.
")]
struct Args {
    /// Path to the input VCF file
    #[arg(long, value_name = "FILE")]
    input_vcf: PathBuf,

    /// Directory for the per-chromosome VCFs
    #[arg(long, value_name = "DIR")]
    output_dir: PathBuf,

    /// Chromosomes to extract (e.g. "1-21" or "1,2,3")
    #[arg(long)]
    chromosomes: Option<String>,

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

    let selection = match &args.chromosomes {
        Some(s) => parse_chromosome_selection(s).context("invalid --chromosomes")?,
        None => all_chromosomes(),
    };
    log::info!("Selected chromosomes: {:?}", selection);

    let created = split_vcf_by_chromosome(&args.input_vcf, &args.output_dir, &selection)
        .with_context(|| format!("splitting {:?}", args.input_vcf))?;

    if created.is_empty() {
        println!("No variants found on the selected chromosomes");
    }
    for path in &created {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

//! Named-liftover pipeline: modify positions, annotate rsIDs via Entrez, filter and summarize

use clap::Parser;
use env_logger::Env;
use rsid_retrieval::{
    annotate::AnnotationConfig,
    entrez::check_connection,
    filter::DEFAULT_QUALITY_THRESHOLD,
    pipeline::{PipelineOptions, PipelineOutcome, RsidProcessor},
    settings::Settings,
    transform::{NamedTransform, DEFAULT_POS_MODIFIER},
    utils::percent_progress_bar,
    RsidError, RsidResult,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rsid_retrieval")]
#[command(about = "Lift VCF positions onto chromosome 16 and annotate them with dbSNP rsIDs")]
#[command(long_about = "
rsid_retrieval converts the positions of a locus-relative VCF onto GRCh38
chromosome 16 and annotates every variant with its dbSNP reference SNP ID,
queried from NCBI Entrez.

Steps:
1. Modify positions (CES1P1-CES1 offset or CES1A2-CES1 piecewise remap)
2. Normalize the chromosome column to NC_000016.10
3. Annotate rsIDs; variants without a match get NORSID
4. Keep variants with an rsID, then those with QUAL at or above the threshold
5. Write a summary report

Everything is written to <output-dir>/<name>_results/.

NCBI requires a contact email. Pass --email, or store one with --save-email
and it is read from the settings file on later runs.
")]
struct Args {
    /// Path to the input VCF file
    #[arg(long, value_name = "FILE", required_unless_present = "test_connection")]
    input_vcf: Option<PathBuf>,

    /// Directory that receives the results folder
    #[arg(long, value_name = "DIR", required_unless_present = "test_connection")]
    output_dir: Option<PathBuf>,

    /// Contact email sent with every Entrez request
    #[arg(long)]
    email: Option<String>,

    /// Store the given email in the settings file for later runs
    #[arg(long, requires = "email")]
    save_email: bool,

    /// Settings file (defaults to $RSID_RETRIEVAL_CONFIG or ./config.json)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Type of position modification: CES1P1-CES1 or CES1A2-CES1
    #[arg(long = "type", value_name = "TYPE", default_value = "CES1P1-CES1")]
    modification: NamedTransform,

    /// Value added to each POS entry (CES1P1-CES1 only)
    #[arg(long, default_value_t = DEFAULT_POS_MODIFIER)]
    pos_modifier: u64,

    /// Worker threads for annotation
    #[arg(long)]
    workers: Option<usize>,

    /// Variants per annotation batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Use the faster preset (4 workers, 3 requests in flight, 300 ms spacing)
    #[arg(long)]
    fast: bool,

    /// Minimum QUAL for the significant-variant filter
    #[arg(long, default_value_t = DEFAULT_QUALITY_THRESHOLD)]
    quality_threshold: f64,

    /// Check that Entrez is reachable and exit
    #[arg(long)]
    test_connection: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn annotation_config(args: &Args) -> AnnotationConfig {
    let mut config = if args.fast {
        AnnotationConfig::fast()
    } else {
        AnnotationConfig::conservative()
    };
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    config
}

fn print_outcome(outcome: &PipelineOutcome) {
    for message in &outcome.messages {
        println!("{}", message);
    }

    if !outcome.files.is_empty() {
        println!();
        println!("Output files:");
        for (role, path) in &outcome.files {
            println!("  {:<18} {}", role, path.display());
        }
    }

    if let Some(summary) = &outcome.summary {
        println!();
        print!("{}", summary.to_report());
    }
}

fn run() -> RsidResult<()> {
    let args = Args::parse();

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();

    let settings_path = args.config.clone().unwrap_or_else(Settings::default_path);
    let settings = Settings::load(&settings_path)?;
    let email = settings.resolve_email(args.email.as_deref())?;

    if args.save_email {
        Settings {
            email: Some(email.clone()),
        }
        .save(&settings_path)?;
        println!("Email saved to {}", settings_path.display());
    }

    let options = PipelineOptions {
        annotation: annotation_config(&args),
        quality_threshold: args.quality_threshold,
    };
    let processor = RsidProcessor::new(&email, options)?;

    if args.test_connection {
        let (ok, message) = check_connection(processor.lookup().search());
        println!("{}", message);
        return if ok { Ok(()) } else { Err(RsidError::Remote(message)) };
    }

    let (input, output_dir) = match (&args.input_vcf, &args.output_dir) {
        (Some(input), Some(output_dir)) => (input, output_dir),
        _ => {
            return Err(RsidError::InvalidConfig(
                "--input-vcf and --output-dir are required".to_string(),
            ))
        }
    };

    log::info!("Input VCF: {:?}", input);
    log::info!("Output directory: {:?}", output_dir);
    log::info!("Modification: {} (pos modifier {})", args.modification, args.pos_modifier);
    log::info!("Querying Entrez as {}", processor.lookup().search().email());
    log::info!("Annotation: {:?}", processor.options().annotation);

    let pb = percent_progress_bar(&format!("Processing {}", input.display()));
    let observer = |percent: u8| pb.set_position(u64::from(percent));
    let outcome = processor.process_vcf(
        input,
        output_dir,
        args.modification,
        args.pos_modifier,
        Some(&observer),
    );
    pb.finish_and_clear();

    print_outcome(&outcome);

    if outcome.success {
        Ok(())
    } else {
        Err(RsidError::Pipeline(outcome.errors.join("; ")))
    }
}

/// Handle application errors and provide user-friendly messages
fn handle_error(error: RsidError) -> ! {
    match error {
        RsidError::InvalidEmail(ref msg) => {
            eprintln!("Error: Valid email address required for Entrez API: {}", msg);
            eprintln!("Pass --email, optionally with --save-email to remember it.");
        }
        RsidError::Remote(ref msg) => {
            eprintln!("Error: Entrez is not reachable: {}", msg);
            eprintln!("Please check your network connection and try again later.");
        }
        RsidError::Pipeline(ref msg) => {
            eprintln!("Error: {}", msg);
            eprintln!("Files written before the failure are listed above.");
        }
        RsidError::InvalidConfig(ref msg) => {
            eprintln!("Error: Invalid configuration: {}", msg);
            eprintln!("Please check --workers, --batch-size and --pos-modifier.");
        }
        RsidError::Json(ref e) => {
            eprintln!("Error: Settings file is not valid JSON: {}", e);
            eprintln!("Fix or delete the file and save the email again.");
        }
        ref other => {
            eprintln!("Error: {}", other);
        }
    }
    std::process::exit(1);
}

fn main() {
    if let Err(e) = run() {
        handle_error(e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rsid_retrieval::annotate::{FAST_MAX_IN_FLIGHT, FAST_WORKERS};

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from([
            "rsid_retrieval",
            "--input-vcf",
            "in.vcf",
            "--output-dir",
            "out",
        ])
        .unwrap();
        assert_eq!(args.modification, NamedTransform::Ces1p1Ces1);
        assert_eq!(args.pos_modifier, DEFAULT_POS_MODIFIER);
        assert_eq!(args.quality_threshold, DEFAULT_QUALITY_THRESHOLD);
        assert_eq!(annotation_config(&args), AnnotationConfig::conservative());
    }

    #[test]
    fn test_fast_preset_with_overrides() {
        let args = Args::try_parse_from([
            "rsid_retrieval",
            "--input-vcf",
            "in.vcf",
            "--output-dir",
            "out",
            "--type",
            "CES1A2-CES1",
            "--fast",
            "--batch-size",
            "8",
        ])
        .unwrap();
        assert_eq!(args.modification, NamedTransform::Ces1a2Ces1);

        let config = annotation_config(&args);
        assert_eq!(config.workers, FAST_WORKERS);
        assert_eq!(config.max_in_flight, FAST_MAX_IN_FLIGHT);
        assert_eq!(config.batch_size, 8);
    }

    #[test]
    fn test_required_arguments() {
        assert!(Args::try_parse_from(["rsid_retrieval", "--input-vcf", "in.vcf"]).is_err());
        assert!(Args::try_parse_from(["rsid_retrieval", "--test-connection"]).is_ok());
        assert!(Args::try_parse_from(["rsid_retrieval", "--type", "CES1-XYZ"]).is_err());
        assert!(Args::try_parse_from(["rsid_retrieval", "--test-connection", "--save-email"]).is_err());
    }
}

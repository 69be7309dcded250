//! Sandbox pipeline: custom chromosome and position equation, then rsID annotation

use clap::Parser;
use env_logger::Env;
use rsid_retrieval::{
    annotate::AnnotationConfig,
    chrom::ChromNotation,
    filter::DEFAULT_QUALITY_THRESHOLD,
    pipeline::{PipelineOptions, PipelineOutcome, RsidProcessor, SandboxRequest},
    settings::Settings,
    transform::validate_equation,
    utils::percent_progress_bar,
    RsidError, RsidResult,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rsid_sandbox")]
#[command(about = "Sandbox mode for flexible VCF processing with custom chromosomes and equations")]
#[command(long_about = "
rsid_sandbox rewrites every record onto a chromosome of your choice, maps
each position through an arithmetic equation in x, then runs the same
annotation, filtering and summary steps as rsid_retrieval.

Equations may use x, numeric literals, + - * / // % **, comparisons,
and/or/not, parentheses and conditionals ('c ? a : b' or 'a if c else b'),
e.g. 'x + 1000000' or 'x + 100 if x < 5000 else x - 100'. Results are
truncated to whole positions; a negative result rejects the equation.

Use --test-equation to try an equation on sample positions without reading
a VCF or contacting Entrez.

Everything is written to <output-dir>/<name>_sandbox_results/.
")]
struct Args {
    /// Path to the input VCF file
    #[arg(long, value_name = "FILE", required_unless_present = "test_equation")]
    input_vcf: Option<PathBuf>,

    /// Directory that receives the results folder
    #[arg(long, value_name = "DIR", required_unless_present = "test_equation")]
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

    /// Target chromosome ID (e.g. '16', 'X', 'chrX')
    #[arg(long, required_unless_present = "test_equation")]
    chromosome: Option<String>,

    /// Position equation using 'x' as the position variable (e.g. 'x + 1000000')
    #[arg(long)]
    equation: String,

    /// Output chromosome format: RefSeq, UCSC, Ensembl or numeric
    #[arg(long, default_value = "RefSeq")]
    format: ChromNotation,

    /// Test the equation on sample positions and exit
    #[arg(long)]
    test_equation: bool,

    /// Comma-separated positions for --test-equation (e.g. '100,1000,10000')
    #[arg(long, value_delimiter = ',')]
    test_positions: Vec<u64>,

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

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn annotation_config(&self) -> AnnotationConfig {
        let mut config = if self.fast {
            AnnotationConfig::fast()
        } else {
            AnnotationConfig::conservative()
        };
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        config
    }
}

fn test_equation(args: &Args) -> RsidResult<()> {
    println!("Testing equation syntax and behavior...");
    let positions = (!args.test_positions.is_empty()).then_some(args.test_positions.as_slice());
    let (_, results) = validate_equation(&args.equation, positions)?;

    println!("Equation '{}' is valid", args.equation);
    println!();
    println!("Test results:");
    for (original, modified) in results {
        println!("  {} -> {}", original, modified);
    }
    Ok(())
}

fn print_outcome(outcome: &PipelineOutcome) {
    for message in &outcome.messages {
        println!("{}", message);
    }

    if let Some(stats) = &outcome.transform {
        if let Some(mapping) = &stats.chromosome_mapping {
            println!("Chromosome mapping: {}", mapping);
        }
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

    if args.test_equation {
        return test_equation(&args);
    }

    let (input, output_dir, chromosome) = match (&args.input_vcf, &args.output_dir, &args.chromosome) {
        (Some(input), Some(output_dir), Some(chromosome)) => (input, output_dir, chromosome),
        _ => {
            return Err(RsidError::InvalidConfig(
                "--input-vcf, --output-dir and --chromosome are required".to_string(),
            ))
        }
    };

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
        annotation: args.annotation_config(),
        quality_threshold: args.quality_threshold,
    };
    let processor = RsidProcessor::new(&email, options)?;

    let request = SandboxRequest {
        chromosome_id: chromosome.clone(),
        equation: args.equation.clone(),
        notation: args.format,
    };

    log::info!("Input VCF: {:?}", input);
    log::info!("Output directory: {:?}", output_dir);
    log::info!(
        "Chromosome {} ({}), equation '{}'",
        request.chromosome_id,
        request.notation,
        request.equation
    );

    let pb = percent_progress_bar(&format!("Processing {} in sandbox mode", input.display()));
    let observer = |percent: u8| pb.set_position(u64::from(percent));
    let outcome = processor.run_sandbox_pipeline(input, output_dir, &request, Some(&observer));
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
        RsidError::InvalidExpression(ref msg) => {
            eprintln!("Error: Invalid equation: {}", msg);
            eprintln!("Use 'x' for the position, e.g. 'x + 1000000' or '(x - 500) * 2'.");
        }
        RsidError::NegativePosition { position, value } => {
            eprintln!(
                "Error: Equation produced negative position {} for input {}",
                value, position
            );
            eprintln!("Positions must stay at or above zero for every input.");
        }
        RsidError::TransformFailed { position, ref cause } => {
            eprintln!("Error: Equation failed for position {}: {}", position, cause);
        }
        RsidError::InvalidEmail(ref msg) => {
            eprintln!("Error: Valid email address required for Entrez API: {}", msg);
            eprintln!("Pass --email, optionally with --save-email to remember it.");
        }
        RsidError::Pipeline(ref msg) => {
            eprintln!("Error: {}", msg);
            eprintln!("Files written before the failure are listed above.");
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

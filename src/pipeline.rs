//! End-to-end processing pipelines
//!
//! Both pipelines run transform -> clean -> annotate -> filter -> summarize as
//! a chain of file-to-file steps inside one results directory. Failures never
//! escape as errors: every run returns a [`PipelineOutcome`] listing what was
//! done before the failing step.

use crate::annotate::{annotate_vcf, AnnotationConfig, AnnotationReport, ProgressObserver};
use crate::chrom::{format_chromosome, ChromNotation};
use crate::client::{RsidClient, RsidLookup};
use crate::entrez::EntrezSearch;
use crate::filter::{
    filter_rsids_vcf, filter_significant_rsids, generate_summary_report, Summary,
    DEFAULT_QUALITY_THRESHOLD,
};
use crate::transform::{
    format_range, transform_vcf, validate_equation, ChromTarget, NamedTransform,
    PositionTransform, TransformSpec, TransformStats,
};
use crate::utils::{vcf_base_name, Timer};
use crate::vcf::{clean_vcf, validate_vcf_file};
use crate::RsidResult;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Chromosome both named transforms map onto
pub const NAMED_TARGET_CHROMOSOME: u8 = 16;

/// Tunables shared by both pipelines
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub annotation: AnnotationConfig,
    pub quality_threshold: f64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            annotation: AnnotationConfig::default(),
            quality_threshold: DEFAULT_QUALITY_THRESHOLD,
        }
    }
}

/// Result of one pipeline run
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineOutcome {
    pub success: bool,
    pub messages: Vec<String>,
    pub errors: Vec<String>,
    /// `(role, path)` of every output the run planned, in creation order
    pub files: Vec<(String, PathBuf)>,
    pub summary: Option<Summary>,
    pub annotation: Option<AnnotationReport>,
    pub transform: Option<TransformStats>,
}

impl PipelineOutcome {
    fn failed(errors: Vec<String>) -> Self {
        Self {
            success: false,
            errors,
            ..Self::default()
        }
    }

    pub fn file(&self, role: &str) -> Option<&Path> {
        self.files
            .iter()
            .find(|(r, _)| r == role)
            .map(|(_, path)| path.as_path())
    }
}

/// Custom chromosome and equation for the sandbox pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxRequest {
    pub chromosome_id: String,
    pub equation: String,
    pub notation: ChromNotation,
}

struct NamedOutputs {
    no_rsids: PathBuf,
    final_vcf: PathBuf,
    filtered: PathBuf,
    significant: PathBuf,
    summary: PathBuf,
}

impl NamedOutputs {
    fn new(dir: &Path, base: &str) -> Self {
        Self {
            no_rsids: dir.join(format!("{}_no_rsids.vcf", base)),
            final_vcf: dir.join(format!("{}_final_annotation.vcf", base)),
            filtered: dir.join(format!("{}_filtered_rsids.vcf", base)),
            significant: dir.join(format!("{}_significant_rsids.vcf", base)),
            summary: dir.join(format!("summary_report_for_{}.txt", base)),
        }
    }

    fn manifest(&self) -> Vec<(String, PathBuf)> {
        vec![
            ("final_output_vcf".to_string(), self.final_vcf.clone()),
            ("filtered_rsids_vcf".to_string(), self.filtered.clone()),
            ("no_rsids_vcf".to_string(), self.no_rsids.clone()),
            ("significant_rsids_vcf".to_string(), self.significant.clone()),
            ("summary_report".to_string(), self.summary.clone()),
        ]
    }
}

struct SandboxOutputs {
    modified: PathBuf,
    cleaned: PathBuf,
    annotated: PathBuf,
    filtered: PathBuf,
    significant: PathBuf,
    summary: PathBuf,
}

impl SandboxOutputs {
    fn new(dir: &Path, base: &str) -> Self {
        Self {
            modified: dir.join(format!("{}_custom_modified.vcf", base)),
            cleaned: dir.join(format!("{}_cleaned.vcf", base)),
            annotated: dir.join(format!("{}_annotated.vcf", base)),
            filtered: dir.join(format!("{}_with_rsids.vcf", base)),
            significant: dir.join(format!("{}_significant.vcf", base)),
            summary: dir.join(format!("sandbox_report_{}.txt", base)),
        }
    }

    fn manifest(&self) -> Vec<(String, PathBuf)> {
        vec![
            ("modified_vcf".to_string(), self.modified.clone()),
            ("cleaned_vcf".to_string(), self.cleaned.clone()),
            ("annotated_vcf".to_string(), self.annotated.clone()),
            ("filtered_rsids_vcf".to_string(), self.filtered.clone()),
            ("significant_rsids_vcf".to_string(), self.significant.clone()),
            ("summary_report".to_string(), self.summary.clone()),
        ]
    }
}

/// Forwards progress of a sub-step into the `[start, end]` band of the whole run
struct ScaledProgress<'a> {
    inner: &'a dyn ProgressObserver,
    start: u8,
    end: u8,
}

impl ProgressObserver for ScaledProgress<'_> {
    fn on_progress(&self, percent: u8) {
        let span = u32::from(self.end.saturating_sub(self.start));
        let scaled = u32::from(self.start) + span * u32::from(percent.min(100)) / 100;
        self.inner.on_progress(scaled as u8);
    }
}

fn report(observer: Option<&dyn ProgressObserver>, value: u8) {
    if let Some(observer) = observer {
        observer.on_progress(value);
    }
}

fn ensure_output_dir(output_dir: &Path, errors: &mut Vec<String>) {
    if !output_dir.exists() {
        if let Err(e) = std::fs::create_dir_all(output_dir) {
            errors.push(format!("Cannot create output directory: {}", e));
        }
    }
}

/// Runs the pipelines against an [`RsidLookup`]
pub struct RsidProcessor<L: RsidLookup> {
    lookup: L,
    options: PipelineOptions,
}

impl RsidProcessor<RsidClient<EntrezSearch>> {
    /// Processor querying NCBI Entrez as `email`
    pub fn new(email: &str, options: PipelineOptions) -> RsidResult<Self> {
        let client = RsidClient::entrez(email, options.annotation.retry)?;
        Ok(Self::with_lookup(client, options))
    }
}

impl<L: RsidLookup> RsidProcessor<L> {
    pub fn with_lookup(lookup: L, options: PipelineOptions) -> Self {
        Self { lookup, options }
    }

    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Everything wrong with the inputs of the named pipeline, empty when usable
    pub fn validate_inputs(
        &self,
        input: &Path,
        output_dir: &Path,
        transform: NamedTransform,
        pos_modifier: u64,
    ) -> Vec<String> {
        let mut errors = Vec::new();

        if let Err(e) = validate_vcf_file(input) {
            errors.push(format!("Invalid VCF file: {}", e));
        }
        ensure_output_dir(output_dir, &mut errors);
        if let Err(e) = transform.to_transform(pos_modifier) {
            errors.push(e.to_string());
        }
        if let Err(e) = self.options.annotation.validate() {
            errors.push(e.to_string());
        }

        errors
    }

    /// Named liftover, annotation, filtering and summary
    ///
    /// Outputs go to `<output_dir>/<base>_results/`.
    pub fn process_vcf(
        &self,
        input: &Path,
        output_dir: &Path,
        transform: NamedTransform,
        pos_modifier: u64,
        observer: Option<&dyn ProgressObserver>,
    ) -> PipelineOutcome {
        let errors = self.validate_inputs(input, output_dir, transform, pos_modifier);
        if !errors.is_empty() {
            return PipelineOutcome::failed(errors);
        }

        let _timer = Timer::new("rsID retrieval pipeline");
        let base = vcf_base_name(input);
        let results_dir = output_dir.join(format!("{}_results", base));

        let outputs = NamedOutputs::new(&results_dir, &base);
        let mut outcome = PipelineOutcome {
            files: outputs.manifest(),
            ..PipelineOutcome::default()
        };

        let mut stage = "setup";
        let result = self.run_named(
            input,
            &results_dir,
            &outputs,
            &base,
            transform,
            pos_modifier,
            observer,
            &mut outcome,
            &mut stage,
        );
        finish(outcome, result, stage)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_named(
        &self,
        input: &Path,
        results_dir: &Path,
        outputs: &NamedOutputs,
        base: &str,
        transform: NamedTransform,
        pos_modifier: u64,
        observer: Option<&dyn ProgressObserver>,
        outcome: &mut PipelineOutcome,
        stage: &mut &'static str,
    ) -> RsidResult<()> {
        std::fs::create_dir_all(results_dir)?;
        let NamedOutputs {
            no_rsids,
            final_vcf,
            filtered,
            significant,
            summary: summary_path,
        } = outputs;

        *stage = "position modification";
        let spec = TransformSpec::new(transform.to_transform(pos_modifier)?);
        let stats = transform_vcf(input, &no_rsids, &spec)?;
        outcome.messages.push(format!(
            "VCF file modified successfully ({}). Output saved to {}",
            transform,
            no_rsids.display()
        ));
        outcome.transform = Some(stats);
        report(observer, 10);

        *stage = "cleaning";
        let target = format_chromosome(NAMED_TARGET_CHROMOSOME, ChromNotation::RefSeq);
        outcome
            .messages
            .push(clean_vcf(&no_rsids, &no_rsids, Some(&target))?);
        report(observer, 20);

        *stage = "annotation";
        let annotation = self.annotate(&no_rsids, &final_vcf, observer, 20, 70)?;
        outcome.messages.push(annotation.message.clone());
        outcome.annotation = Some(annotation);
        report(observer, 70);

        *stage = "rsID filtering";
        outcome.messages.push(filter_rsids_vcf(&final_vcf, &filtered)?.message);
        report(observer, 80);

        *stage = "quality filtering";
        outcome.messages.push(
            filter_significant_rsids(&filtered, &significant, self.options.quality_threshold)?.message,
        );
        report(observer, 90);

        *stage = "summary report";
        let summary = generate_summary_report(
            &final_vcf,
            &summary_path,
            Some(base),
            self.options.quality_threshold,
        )?;
        outcome.messages.push("Summary report generated successfully".to_string());
        outcome.summary = Some(summary);
        report(observer, 100);

        Ok(())
    }

    /// Custom chromosome and equation, then annotation, filtering and summary
    ///
    /// Outputs go to `<output_dir>/<base>_sandbox_results/`; the report gets a
    /// trailing section describing the custom configuration.
    pub fn run_sandbox_pipeline(
        &self,
        input: &Path,
        output_dir: &Path,
        request: &SandboxRequest,
        observer: Option<&dyn ProgressObserver>,
    ) -> PipelineOutcome {
        let mut errors = Vec::new();
        if let Err(e) = validate_vcf_file(input) {
            errors.push(format!("Invalid VCF file: {}", e));
        }
        ensure_output_dir(output_dir, &mut errors);
        if request.chromosome_id.trim().is_empty() {
            errors.push("Target chromosome must not be empty".to_string());
        }
        if let Err(e) = validate_equation(&request.equation, None) {
            errors.push(e.to_string());
        }
        if let Err(e) = self.options.annotation.validate() {
            errors.push(e.to_string());
        }
        if !errors.is_empty() {
            return PipelineOutcome::failed(errors);
        }

        let _timer = Timer::new("sandbox pipeline");
        let base = vcf_base_name(input);
        let results_dir = output_dir.join(format!("{}_sandbox_results", base));

        let outputs = SandboxOutputs::new(&results_dir, &base);
        let mut outcome = PipelineOutcome {
            files: outputs.manifest(),
            ..PipelineOutcome::default()
        };

        let mut stage = "setup";
        let result = self.run_sandbox(
            input,
            &results_dir,
            &outputs,
            &base,
            request,
            observer,
            &mut outcome,
            &mut stage,
        );
        finish(outcome, result, stage)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_sandbox(
        &self,
        input: &Path,
        results_dir: &Path,
        outputs: &SandboxOutputs,
        base: &str,
        request: &SandboxRequest,
        observer: Option<&dyn ProgressObserver>,
        outcome: &mut PipelineOutcome,
        stage: &mut &'static str,
    ) -> RsidResult<()> {
        std::fs::create_dir_all(results_dir)?;
        let SandboxOutputs {
            modified,
            cleaned,
            annotated,
            filtered,
            significant,
            summary: summary_path,
        } = outputs;
        report(observer, 10);

        *stage = "custom modification";
        let (expr, _) = validate_equation(&request.equation, None)?;
        let spec = TransformSpec::new(PositionTransform::Equation(expr))
            .with_chromosome(ChromTarget::new(&request.chromosome_id, request.notation));
        let stats = transform_vcf(input, &modified, &spec)?;
        outcome
            .messages
            .push(format!("Applied custom modification: {}", request.equation));
        if let Some(mapping) = &stats.chromosome_mapping {
            outcome.messages.push(format!("Chromosome format: {}", mapping));
        }
        report(observer, 25);

        *stage = "cleaning";
        outcome.messages.push(clean_vcf(&modified, &cleaned, None)?);
        report(observer, 35);

        *stage = "annotation";
        let annotation = self.annotate(&cleaned, &annotated, observer, 35, 75)?;
        outcome.messages.push(annotation.message.clone());
        outcome.annotation = Some(annotation);
        report(observer, 75);

        *stage = "rsID filtering";
        outcome.messages.push(filter_rsids_vcf(&annotated, &filtered)?.message);
        report(observer, 85);

        *stage = "quality filtering";
        outcome.messages.push(
            filter_significant_rsids(&filtered, &significant, self.options.quality_threshold)?.message,
        );
        report(observer, 95);

        *stage = "summary report";
        let summary = generate_summary_report(
            &annotated,
            &summary_path,
            Some(base),
            self.options.quality_threshold,
        )?;
        append_sandbox_section(&summary_path, request, &stats)?;
        outcome.messages.push("Sandbox summary report generated".to_string());
        outcome.summary = Some(summary);
        outcome.transform = Some(stats);
        report(observer, 100);

        Ok(())
    }

    fn annotate(
        &self,
        input: &Path,
        output: &Path,
        observer: Option<&dyn ProgressObserver>,
        start: u8,
        end: u8,
    ) -> RsidResult<AnnotationReport> {
        let scaled = observer.map(|inner| ScaledProgress { inner, start, end });
        annotate_vcf(
            input,
            output,
            &self.lookup,
            &self.options.annotation,
            scaled.as_ref().map(|s| s as &dyn ProgressObserver),
        )
    }
}

fn finish(mut outcome: PipelineOutcome, result: RsidResult<()>, stage: &str) -> PipelineOutcome {
    match result {
        Ok(()) => outcome.success = true,
        Err(e) => {
            log::error!("Pipeline failed during {}: {}", stage, e);
            outcome.success = false;
            outcome.errors.push(format!("{} failed: {}", stage, e));
        }
    }
    outcome
}

fn append_sandbox_section(
    report_path: &Path,
    request: &SandboxRequest,
    stats: &TransformStats,
) -> RsidResult<()> {
    let mut file = OpenOptions::new().append(true).open(report_path)?;
    writeln!(file)?;
    writeln!(file, "--- Sandbox Configuration ---")?;
    writeln!(file, "Input chromosome: {}", request.chromosome_id)?;
    writeln!(file, "Output format: {}", request.notation)?;
    writeln!(file, "Position equation: {}", request.equation)?;
    writeln!(file, "Original position range: {}", format_range(stats.original_range))?;
    writeln!(file, "Modified position range: {}", format_range(stats.modified_range))?;
    writeln!(file, "Equation test results:")?;
    for (original, modified) in &stats.test_results {
        writeln!(file, "  {} -> {}", original, modified)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{RateLimiter, RetryPolicy};
    use crate::vcf::{ParseMode, VcfTable};
    use crate::{is_rsid, NORSID};
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::tempdir;

    /// Odd positions resolve to `rs<position>`, even positions miss
    struct ParityLookup {
        queried: Mutex<Vec<(String, u64)>>,
    }

    impl ParityLookup {
        fn new() -> Self {
            Self {
                queried: Mutex::new(Vec::new()),
            }
        }
    }

    impl RsidLookup for ParityLookup {
        fn lookup(&self, chromosome: &str, position: u64, _limiter: &RateLimiter) -> RsidResult<String> {
            self.queried.lock().unwrap().push((chromosome.to_string(), position));
            if position % 2 == 1 {
                Ok(format!("rs{}", position))
            } else {
                Ok(NORSID.to_string())
            }
        }
    }

    fn options() -> PipelineOptions {
        PipelineOptions {
            annotation: AnnotationConfig {
                workers: 2,
                max_in_flight: 2,
                min_interval: Duration::ZERO,
                retry: RetryPolicy::without_backoff(5),
                sequential_delay: Duration::ZERO,
                ..AnnotationConfig::default()
            },
            quality_threshold: DEFAULT_QUALITY_THRESHOLD,
        }
    }

    const HEADER: &str = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tSAMPLE1";

    /// 10 rows: rows 2, 5 and 9 carry identifiers, the rest are "."
    fn write_input(dir: &Path) -> PathBuf {
        let mut text = format!("##fileformat=VCFv4.2\n{}\n", HEADER);
        for i in 1..=10u64 {
            let id = match i {
                2 => "rs1111",
                5 => "rs5555",
                9 => "custom9",
                _ => ".",
            };
            let qual = if i == 3 { ".".to_string() } else { (i * 5).to_string() };
            text.push_str(&format!(
                "16\t{}\t{}\tA\tT\t{}\tPASS\tDP=10\tGT\t0/1\n",
                i * 10 + 1,
                id,
                qual
            ));
        }
        let path = dir.join("sample.vcf");
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_named_pipeline_end_to_end() {
        let dir = tempdir().unwrap();
        let input = write_input(dir.path());
        let out_dir = dir.path().join("out");
        let processor = RsidProcessor::with_lookup(ParityLookup::new(), options());

        let seen = Mutex::new(Vec::new());
        let observer = |p: u8| seen.lock().unwrap().push(p);
        let outcome = processor.process_vcf(&input, &out_dir, NamedTransform::Ces1p1Ces1, 1000, Some(&observer));

        assert!(outcome.success, "{:?}", outcome.errors);
        let results_dir = out_dir.join("sample_results");
        for (_, path) in &outcome.files {
            assert!(path.starts_with(&results_dir));
            assert!(path.exists(), "{:?}", path);
        }

        let final_vcf = VcfTable::read(outcome.file("final_output_vcf").unwrap(), ParseMode::Strict).unwrap();
        let records: Vec<_> = final_vcf.records().collect();
        assert_eq!(records.len(), 10);
        for (i, record) in records.iter().enumerate() {
            let original_pos = (i as u64 + 1) * 10 + 1;
            assert_eq!(record.pos, original_pos + 1000);
            assert_eq!(record.chrom, "NC_000016.10");
            match i + 1 {
                2 => assert_eq!(record.id, "rs1111"),
                5 => assert_eq!(record.id, "rs5555"),
                9 => assert_eq!(record.id, "custom9"),
                _ => assert!(is_rsid(&record.id) || record.id == NORSID),
            }
        }
        assert_eq!(processor.lookup().queried.lock().unwrap().len(), 7);

        let filtered = VcfTable::read(outcome.file("filtered_rsids_vcf").unwrap(), ParseMode::Strict).unwrap();
        assert!(filtered.records().all(|r| r.id.starts_with("rs")));

        let summary = outcome.summary.as_ref().unwrap();
        assert_eq!(summary.total_variants, 10);
        assert_eq!(summary.with_rsid + summary.without_rsid, summary.total_variants);
        assert_eq!(summary.with_rsid, filtered.record_count());

        let progress = seen.lock().unwrap().clone();
        assert_eq!(progress.first(), Some(&10));
        assert_eq!(progress.last(), Some(&100));
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));

        let report = std::fs::read_to_string(outcome.file("summary_report").unwrap()).unwrap();
        assert!(report.starts_with("Summary Report for sample\n"));
    }

    #[test]
    fn test_named_pipeline_queries_target_chromosome() {
        let dir = tempdir().unwrap();
        let input = write_input(dir.path());
        let processor = RsidProcessor::with_lookup(ParityLookup::new(), options());

        let outcome = processor.process_vcf(&input, dir.path(), NamedTransform::Ces1a2Ces1, 0, None);
        assert!(outcome.success, "{:?}", outcome.errors);

        let queried = processor.lookup().queried.lock().unwrap().clone();
        assert!(queried.iter().all(|(chrom, _)| chrom == "NC_000016.10"));
        assert!(queried.iter().any(|(_, pos)| *pos == 55_758_218 + 11));
    }

    #[test]
    fn test_invalid_inputs_reported() {
        let dir = tempdir().unwrap();
        let processor = RsidProcessor::with_lookup(ParityLookup::new(), options());

        let outcome = processor.process_vcf(
            &dir.path().join("missing.vcf"),
            dir.path(),
            NamedTransform::Ces1p1Ces1,
            0,
            None,
        );
        assert!(!outcome.success);
        assert_eq!(outcome.errors.len(), 2);
        assert!(outcome.files.is_empty());
        assert!(processor.lookup().queried.lock().unwrap().is_empty());
    }

    #[test]
    fn test_sandbox_pipeline() {
        let dir = tempdir().unwrap();
        let input = write_input(dir.path());
        let processor = RsidProcessor::with_lookup(ParityLookup::new(), options());
        let request = SandboxRequest {
            chromosome_id: "7".to_string(),
            equation: "x * 2 + 1".to_string(),
            notation: ChromNotation::Ucsc,
        };

        let outcome = processor.run_sandbox_pipeline(&input, dir.path(), &request, None);
        assert!(outcome.success, "{:?}", outcome.errors);

        let stats = outcome.transform.as_ref().unwrap();
        assert_eq!(stats.original_range, Some((11, 101)));
        assert_eq!(stats.modified_range, Some((23, 203)));
        assert_eq!(stats.chromosome_mapping.as_deref(), Some("7 -> chr7"));

        let annotated = VcfTable::read(outcome.file("annotated_vcf").unwrap(), ParseMode::Strict).unwrap();
        assert!(annotated.records().all(|r| r.chrom == "chr7"));
        // Every transformed position is odd, so each unknown row resolves
        assert_eq!(outcome.annotation.as_ref().unwrap().annotated, 7);

        let report = std::fs::read_to_string(outcome.file("summary_report").unwrap()).unwrap();
        assert!(report.contains("\n--- Sandbox Configuration ---\n"));
        assert!(report.contains("Input chromosome: 7\n"));
        assert!(report.contains("Output format: UCSC\n"));
        assert!(report.contains("Position equation: x * 2 + 1\n"));
        assert!(report.contains("Original position range: 11 - 101\n"));
        assert!(report.contains("  100 -> 201\n"));
        assert!(outcome.file("summary_report").unwrap().ends_with("sandbox_report_sample.txt"));
    }

    #[test]
    fn test_sandbox_rejects_bad_equation() {
        let dir = tempdir().unwrap();
        let input = write_input(dir.path());
        let processor = RsidProcessor::with_lookup(ParityLookup::new(), options());
        let request = SandboxRequest {
            chromosome_id: "16".to_string(),
            equation: "__import__('os')".to_string(),
            notation: ChromNotation::RefSeq,
        };

        let outcome = processor.run_sandbox_pipeline(&input, dir.path(), &request, None);
        assert!(!outcome.success);
        assert!(outcome.errors[0].contains("Invalid equation"));
        assert!(!dir.path().join("sample_sandbox_results").exists());
    }

    #[test]
    fn test_failure_keeps_partial_manifest() {
        let dir = tempdir().unwrap();
        let input = write_input(dir.path());
        let processor = RsidProcessor::with_lookup(ParityLookup::new(), options());
        // Passes the sample positions but goes negative on the real rows
        let request = SandboxRequest {
            chromosome_id: "16".to_string(),
            equation: "x - 99".to_string(),
            notation: ChromNotation::RefSeq,
        };

        let outcome = processor.run_sandbox_pipeline(&input, dir.path(), &request, None);
        assert!(!outcome.success);
        assert!(outcome.errors[0].starts_with("custom modification failed"));
        assert_eq!(outcome.files.len(), 6);
        assert!(outcome.messages.is_empty());
    }

    #[test]
    fn test_scaled_progress() {
        let seen = Mutex::new(Vec::new());
        let inner = |p: u8| seen.lock().unwrap().push(p);
        let scaled = ScaledProgress {
            inner: &inner,
            start: 20,
            end: 70,
        };
        scaled.on_progress(0);
        scaled.on_progress(50);
        scaled.on_progress(100);
        assert_eq!(seen.lock().unwrap().clone(), vec![20, 45, 70]);
    }
}

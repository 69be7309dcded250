//! Batch rsID annotation
//!
//! Records with an unknown identifier are grouped into small batches and
//! dispatched over a bounded rayon pool. Batches complete in any order; their
//! results are keyed by the record's original index and applied only once
//! every batch has reported, so output order always equals input order. If the
//! pool cannot be used at all the same work is re-run one lookup at a time.

use crate::client::{RateLimiter, RetryPolicy, RsidLookup};
use crate::utils::{percent, Timer};
use crate::vcf::{ParseMode, VcfTable};
use crate::{is_rsid, RsidError, RsidResult, NORSID};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: usize = 2;
pub const DEFAULT_WORKERS: usize = 1;
pub const FAST_WORKERS: usize = 4;
pub const FAST_MAX_IN_FLIGHT: usize = 3;
pub const FAST_MIN_INTERVAL: Duration = Duration::from_millis(300);
pub const DEFAULT_SEQUENTIAL_DELAY: Duration = Duration::from_millis(500);

/// Configuration for one annotation run
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationConfig {
    /// Worker threads in the batch pool
    pub workers: usize,
    /// Records per batch
    pub batch_size: usize,
    /// Lookups allowed in flight at once across all workers
    pub max_in_flight: usize,
    /// Minimum spacing between requests of one worker
    pub min_interval: Duration,
    pub retry: RetryPolicy,
    /// Pause after every lookup in the sequential strategy
    pub sequential_delay: Duration,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
            max_in_flight: crate::client::DEFAULT_MAX_IN_FLIGHT,
            min_interval: crate::client::DEFAULT_MIN_INTERVAL,
            retry: RetryPolicy::default(),
            sequential_delay: DEFAULT_SEQUENTIAL_DELAY,
        }
    }
}

impl AnnotationConfig {
    /// One worker, one request in flight, 500 ms spacing
    pub fn conservative() -> Self {
        Self::default()
    }

    /// Four workers sharing three in-flight slots, 300 ms spacing
    pub fn fast() -> Self {
        Self {
            workers: FAST_WORKERS,
            max_in_flight: FAST_MAX_IN_FLIGHT,
            min_interval: FAST_MIN_INTERVAL,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> RsidResult<()> {
        if self.workers == 0 {
            return Err(RsidError::InvalidConfig(
                "workers must be at least 1".to_string(),
            ));
        }

        if self.batch_size == 0 {
            return Err(RsidError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }

        if self.max_in_flight == 0 {
            return Err(RsidError::InvalidConfig(
                "max_in_flight must be at least 1".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(RsidError::InvalidConfig(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(self.max_in_flight, self.min_interval)
    }
}

/// One record to annotate, identified by its position in the table
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationTask {
    pub index: usize,
    pub chromosome: String,
    pub position: u64,
    pub current_id: String,
}

impl AnnotationTask {
    pub fn needs_lookup(&self) -> bool {
        crate::is_unknown_id(&self.current_id)
    }
}

/// Identifier resolved for the record at `index`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationResult {
    pub index: usize,
    pub id: String,
}

impl AnnotationResult {
    fn sentinel_for(task: &AnnotationTask) -> Self {
        let id = if task.needs_lookup() {
            NORSID.to_string()
        } else {
            task.current_id.clone()
        };
        Self {
            index: task.index,
            id,
        }
    }
}

/// Receives cumulative completion as a percentage 0..=100
pub trait ProgressObserver {
    fn on_progress(&self, percent: u8);
}

impl<F: Fn(u8)> ProgressObserver for F {
    fn on_progress(&self, percent: u8) {
        self(percent)
    }
}

fn report(observer: Option<&dyn ProgressObserver>, value: u8) {
    if let Some(observer) = observer {
        observer.on_progress(value);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Strategy {
    Parallel,
    Sequential,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Parallel => f.write_str("parallel"),
            Strategy::Sequential => f.write_str("sequential"),
        }
    }
}

/// Results of one strategy, keyed by record index
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub results: HashMap<usize, String>,
    /// Batches (rows, for the sequential strategy) that fell back to [`NORSID`]
    pub failed: usize,
}

/// What an annotation run did
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationReport {
    pub total_variants: usize,
    /// Records whose identifier was unknown and therefore looked up
    pub queried: usize,
    /// Looked-up records that received an rsID
    pub annotated: usize,
    pub failed_batches: usize,
    pub strategy: Strategy,
    pub message: String,
}

/// One task per record, in table order
pub fn build_tasks(table: &VcfTable) -> Vec<AnnotationTask> {
    table
        .records()
        .enumerate()
        .map(|(index, record)| AnnotationTask {
            index,
            chromosome: record.chrom.clone(),
            position: record.pos,
            current_id: record.id.clone(),
        })
        .collect()
}

/// Split tasks into consecutive batches of `batch_size`
pub fn partition_batches(tasks: &[AnnotationTask], batch_size: usize) -> Vec<Vec<AnnotationTask>> {
    tasks
        .chunks(batch_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}

fn process_batch<L: RsidLookup + ?Sized>(
    batch: &[AnnotationTask],
    lookup: &L,
    limiter: &RateLimiter,
) -> RsidResult<Vec<AnnotationResult>> {
    batch
        .iter()
        .map(|task| {
            let id = if task.needs_lookup() {
                lookup.lookup(&task.chromosome, task.position, limiter)?
            } else {
                task.current_id.clone()
            };
            Ok(AnnotationResult {
                index: task.index,
                id,
            })
        })
        .collect()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

/// Run every batch on a pool of `config.workers` threads
///
/// A batch that errors or panics has its unknown identifiers set to
/// [`NORSID`]. An `Err` is returned only when the pool itself could not be
/// used.
pub fn annotate_parallel<L: RsidLookup + ?Sized>(
    tasks: &[AnnotationTask],
    lookup: &L,
    config: &AnnotationConfig,
    limiter: &RateLimiter,
    observer: Option<&dyn ProgressObserver>,
) -> RsidResult<BatchOutcome> {
    let batches = partition_batches(tasks, config.batch_size);
    let total_batches = batches.len();
    if total_batches == 0 {
        report(observer, 100);
        return Ok(BatchOutcome::default());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers)
        .thread_name(|i| format!("rsid-worker-{}", i))
        .build()?;

    log::info!(
        "Annotating {} batches of up to {} variants on {} worker(s)",
        total_batches,
        config.batch_size,
        config.workers
    );

    let mut batch_results: HashMap<usize, Vec<AnnotationResult>> = HashMap::with_capacity(total_batches);
    let mut failed = 0;

    pool.in_place_scope(|scope| {
        let (tx, rx) = mpsc::channel();

        for (batch_idx, batch) in batches.iter().enumerate() {
            let tx = tx.clone();
            scope.spawn(move |_| {
                let outcome =
                    panic::catch_unwind(AssertUnwindSafe(|| process_batch(batch, lookup, limiter)));
                let _ = tx.send((batch_idx, outcome));
            });
        }
        drop(tx);

        // Completion order, not submission order
        for (batch_idx, outcome) in rx {
            let batch = &batches[batch_idx];
            let results = match outcome {
                Ok(Ok(results)) => results,
                Ok(Err(e)) => {
                    log::error!("Batch {} failed: {}", batch_idx, e);
                    failed += 1;
                    batch.iter().map(AnnotationResult::sentinel_for).collect()
                }
                Err(payload) => {
                    log::error!("Batch {} panicked: {}", batch_idx, panic_message(payload.as_ref()));
                    failed += 1;
                    batch.iter().map(AnnotationResult::sentinel_for).collect()
                }
            };
            batch_results.insert(batch_idx, results);
            report(observer, percent(batch_results.len(), total_batches));
        }
    });

    if batch_results.len() != total_batches {
        return Err(RsidError::Annotation(format!(
            "only {} of {} batches reported results",
            batch_results.len(),
            total_batches
        )));
    }

    let results = batch_results
        .into_values()
        .flatten()
        .map(|result| (result.index, result.id))
        .collect();

    Ok(BatchOutcome { results, failed })
}

/// One lookup at a time on the calling thread, pausing after each lookup
pub fn annotate_sequential<L: RsidLookup + ?Sized>(
    tasks: &[AnnotationTask],
    lookup: &L,
    config: &AnnotationConfig,
    limiter: &RateLimiter,
    observer: Option<&dyn ProgressObserver>,
) -> RsidResult<BatchOutcome> {
    let total = tasks.len();
    let mut outcome = BatchOutcome {
        results: HashMap::with_capacity(total),
        failed: 0,
    };

    for (i, task) in tasks.iter().enumerate() {
        let id = if task.needs_lookup() {
            let id = match lookup.lookup(&task.chromosome, task.position, limiter) {
                Ok(id) => id,
                Err(e) => {
                    log::error!(
                        "Lookup failed for {}:{}: {}",
                        task.chromosome,
                        task.position,
                        e
                    );
                    outcome.failed += 1;
                    NORSID.to_string()
                }
            };
            thread::sleep(config.sequential_delay);
            id
        } else {
            task.current_id.clone()
        };

        outcome.results.insert(task.index, id);
        report(observer, percent(i + 1, total));
    }

    if total == 0 {
        report(observer, 100);
    }

    Ok(outcome)
}

fn with_fallback<P, S>(parallel: P, sequential: S) -> RsidResult<(BatchOutcome, Strategy)>
where
    P: FnOnce() -> RsidResult<BatchOutcome>,
    S: FnOnce() -> RsidResult<BatchOutcome>,
{
    match parallel() {
        Ok(outcome) => Ok((outcome, Strategy::Parallel)),
        Err(e) => {
            log::warn!("Parallel annotation failed ({}), falling back to sequential", e);
            let outcome = sequential().map_err(|e| {
                RsidError::Annotation(format!("sequential fallback failed: {}", e))
            })?;
            Ok((outcome, Strategy::Sequential))
        }
    }
}

/// Annotate every unknown identifier of `table` in place
pub fn annotate_table<L: RsidLookup + ?Sized>(
    table: &mut VcfTable,
    lookup: &L,
    config: &AnnotationConfig,
    observer: Option<&dyn ProgressObserver>,
) -> RsidResult<AnnotationReport> {
    config.validate()?;

    let tasks = build_tasks(table);
    let limiter = config.rate_limiter();

    let (mut outcome, strategy) = with_fallback(
        || annotate_parallel(&tasks, lookup, config, &limiter, observer),
        || annotate_sequential(&tasks, lookup, config, &limiter, observer),
    )?;

    for (index, record) in table.records_mut().enumerate() {
        if let Some(id) = outcome.results.remove(&index) {
            record.id = id;
        }
    }

    let queried = tasks.iter().filter(|t| t.needs_lookup()).count();
    let annotated = table
        .records()
        .zip(&tasks)
        .filter(|(record, task)| task.needs_lookup() && is_rsid(&record.id))
        .count();

    let total_variants = tasks.len();
    let message = match strategy {
        Strategy::Parallel => format!(
            "Parallel Entrez annotation complete. {}/{} variants annotated.",
            annotated, total_variants
        ),
        Strategy::Sequential => format!(
            "Sequential annotation complete. {}/{} variants annotated.",
            annotated, total_variants
        ),
    };

    Ok(AnnotationReport {
        total_variants,
        queried,
        annotated,
        failed_batches: outcome.failed,
        strategy,
        message,
    })
}

/// Read `input`, annotate it, write the result to `output`
pub fn annotate_vcf<P: AsRef<Path>, Q: AsRef<Path>, L: RsidLookup + ?Sized>(
    input: P,
    output: Q,
    lookup: &L,
    config: &AnnotationConfig,
    observer: Option<&dyn ProgressObserver>,
) -> RsidResult<AnnotationReport> {
    let _timer = Timer::new("rsID annotation");

    let mut table = VcfTable::read(&input, ParseMode::Strict)?;
    if table.record_count() == 0 {
        return Err(RsidError::NoDataRows(
            input.as_ref().to_string_lossy().to_string(),
        ));
    }

    let report = annotate_table(&mut table, lookup, config, observer)?;
    table.write(&output)?;

    log::info!("{}", report.message);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RsidClient;
    use crate::entrez::SnpSearch;
    use crate::vcf::VariantRecord;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Answers `rs<position>`; later positions answer sooner
    struct ScrambledLookup {
        calls: Mutex<Vec<u64>>,
    }

    impl ScrambledLookup {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl RsidLookup for ScrambledLookup {
        fn lookup(&self, _chromosome: &str, position: u64, limiter: &RateLimiter) -> RsidResult<String> {
            let _permit = limiter.acquire();
            thread::sleep(Duration::from_millis(30u64.saturating_sub(position * 2)));
            self.calls.lock().unwrap().push(position);
            Ok(format!("rs{}", position))
        }
    }

    /// Panics for one position, errors for another, misses on multiples of 5
    struct FlakyLookup {
        calls: AtomicUsize,
    }

    impl RsidLookup for FlakyLookup {
        fn lookup(&self, _chromosome: &str, position: u64, _limiter: &RateLimiter) -> RsidResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match position {
                3 => panic!("lookup exploded"),
                7 => Err(RsidError::Remote("connection reset".to_string())),
                p if p % 5 == 0 => Ok(NORSID.to_string()),
                p => Ok(format!("rs{}", p)),
            }
        }
    }

    fn test_config(workers: usize) -> AnnotationConfig {
        AnnotationConfig {
            workers,
            max_in_flight: workers,
            min_interval: Duration::ZERO,
            retry: RetryPolicy::without_backoff(5),
            sequential_delay: Duration::ZERO,
            ..AnnotationConfig::default()
        }
    }

    fn table_with_ids(ids: &[&str]) -> VcfTable {
        let mut text = String::from("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tSAMPLE\n");
        for (i, id) in ids.iter().enumerate() {
            text.push_str(&format!("16\t{}\t{}\tA\tT\t30\t\n", i + 1, id));
        }
        VcfTable::from_reader(text.as_bytes(), ParseMode::Strict).unwrap()
    }

    fn ids(table: &VcfTable) -> Vec<String> {
        table.records().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn test_config_presets_and_validation() {
        let config = AnnotationConfig::default();
        assert_eq!(config.workers, 1);
        assert_eq!(config.batch_size, 2);
        assert_eq!(config.retry.max_attempts, 5);
        assert!(config.validate().is_ok());

        let fast = AnnotationConfig::fast();
        assert_eq!(fast.workers, 4);
        assert_eq!(fast.min_interval, Duration::from_millis(300));
        assert!(fast.validate().is_ok());

        let bad = AnnotationConfig {
            batch_size: 0,
            ..AnnotationConfig::default()
        };
        assert!(matches!(bad.validate(), Err(RsidError::InvalidConfig(_))));

        let bad = AnnotationConfig {
            workers: 0,
            ..AnnotationConfig::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_partition_batches() {
        let table = table_with_ids(&[".", ".", ".", ".", "."]);
        let tasks = build_tasks(&table);
        let batches = partition_batches(&tasks, 2);

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[2].len(), 1);
        assert_eq!(batches[2][0].index, 4);
    }

    #[test]
    fn test_order_preserved_under_scrambled_completion() {
        let mut table = table_with_ids(&["."; 12]);
        let lookup = ScrambledLookup::new();

        let report = annotate_table(&mut table, &lookup, &test_config(4), None).unwrap();

        let expected: Vec<String> = (1..=12).map(|p| format!("rs{}", p)).collect();
        assert_eq!(ids(&table), expected);
        let positions: Vec<u64> = table.records().map(|r| r.pos).collect();
        assert_eq!(positions, (1..=12).collect::<Vec<u64>>());
        assert_eq!(report.strategy, Strategy::Parallel);
        assert_eq!(report.annotated, 12);
        assert_eq!(lookup.calls.lock().unwrap().len(), 12);
    }

    #[test]
    fn test_order_independent_of_configuration() {
        let mut reference = table_with_ids(&[".", "rs99", ".", ".", "NORSID", ".", "."]);
        annotate_table(&mut reference, &ScrambledLookup::new(), &test_config(1), None).unwrap();

        for workers in [2, 3, 4] {
            for batch_size in [1, 2, 3, 5] {
                let mut table = table_with_ids(&[".", "rs99", ".", ".", "NORSID", ".", "."]);
                let config = AnnotationConfig {
                    batch_size,
                    ..test_config(workers)
                };
                annotate_table(&mut table, &ScrambledLookup::new(), &config, None).unwrap();
                assert_eq!(table, reference, "workers={} batch_size={}", workers, batch_size);
            }
        }
    }

    #[test]
    fn test_known_ids_untouched() {
        let mut table = table_with_ids(&["rs42", ".", "custom", "NORSID"]);
        let lookup = ScrambledLookup::new();

        let report = annotate_table(&mut table, &lookup, &test_config(2), None).unwrap();
        assert_eq!(ids(&table), vec!["rs42", "rs2", "custom", "rs4"]);
        assert_eq!(report.queried, 2);

        let mut queried = lookup.calls.lock().unwrap().clone();
        queried.sort();
        assert_eq!(queried, vec![2, 4]);

        // Second pass finds nothing left to query
        let before = table.clone();
        let lookup = ScrambledLookup::new();
        let report = annotate_table(&mut table, &lookup, &test_config(2), None).unwrap();
        assert_eq!(table, before);
        assert_eq!(report.queried, 0);
        assert!(lookup.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_failing_batches_isolated() {
        // Batches: [1,2] [3,4] [5,6] [7,8]
        let mut table = table_with_ids(&[".", ".", ".", ".", ".", "rs6", ".", "."]);
        let lookup = FlakyLookup {
            calls: AtomicUsize::new(0),
        };

        let report = annotate_table(&mut table, &lookup, &test_config(2), None).unwrap();

        assert_eq!(
            ids(&table),
            vec!["rs1", "rs2", NORSID, NORSID, NORSID, "rs6", NORSID, NORSID]
        );
        assert_eq!(report.failed_batches, 2);
        assert_eq!(report.strategy, Strategy::Parallel);
        assert_eq!(report.annotated, 2);
    }

    #[test]
    fn test_sequential_strategy() {
        let table = table_with_ids(&[".", "rs99", "keep", ".", "."]);
        let tasks = build_tasks(&table);
        let config = test_config(1);
        let limiter = config.rate_limiter();
        let lookup = FlakyLookup {
            calls: AtomicUsize::new(0),
        };

        let seen = Mutex::new(Vec::new());
        let observer = |p: u8| seen.lock().unwrap().push(p);
        let outcome = annotate_sequential(&tasks, &lookup, &config, &limiter, Some(&observer)).unwrap();

        assert_eq!(outcome.results[&0], "rs1");
        assert_eq!(outcome.results[&1], "rs99");
        assert_eq!(outcome.results[&2], "keep");
        assert_eq!(outcome.results[&3], "rs4");
        assert_eq!(outcome.results[&4], NORSID);
        assert_eq!(seen.lock().unwrap().clone(), vec![20, 40, 60, 80, 100]);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let table = table_with_ids(&[".", "rs99", ".", ".", "NORSID"]);
        let tasks = build_tasks(&table);
        let config = test_config(3);
        let limiter = config.rate_limiter();
        let lookup = ScrambledLookup::new();

        let parallel = annotate_parallel(&tasks, &lookup, &config, &limiter, None).unwrap();
        let sequential = annotate_sequential(&tasks, &lookup, &config, &limiter, None).unwrap();
        assert_eq!(parallel.results, sequential.results);
    }

    /// Every query matches rs777
    struct AlwaysMatch;

    impl SnpSearch for AlwaysMatch {
        fn esearch(&self, _term: &str) -> RsidResult<Vec<String>> {
            Ok(vec!["777".to_string()])
        }
    }

    #[test]
    fn test_unqueryable_chromosome_keeps_batch_neighbours() {
        let text = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tSAMPLE\n\
                    16\t1\t.\tA\tT\t30\t\n\
                    chrX\t2\t.\tG\tC\t30\t\n";
        let table = VcfTable::from_reader(text.as_bytes(), ParseMode::Strict).unwrap();
        let tasks = build_tasks(&table);
        let config = test_config(1);
        let limiter = config.rate_limiter();
        let client = RsidClient::new(AlwaysMatch, RetryPolicy::without_backoff(5));

        let parallel = annotate_parallel(&tasks, &client, &config, &limiter, None).unwrap();
        let sequential = annotate_sequential(&tasks, &client, &config, &limiter, None).unwrap();

        assert_eq!(parallel.failed, 0);
        assert_eq!(parallel.results[&0], "rs777");
        assert_eq!(parallel.results[&1], NORSID);
        assert_eq!(parallel.results, sequential.results);
    }

    #[test]
    fn test_fallback_on_parallel_setup_failure() {
        let mut fallback = BatchOutcome::default();
        fallback.results.insert(0, "rs1".to_string());

        let (outcome, strategy) = with_fallback(
            || Err(RsidError::Annotation("pool unavailable".to_string())),
            || Ok(fallback.clone()),
        )
        .unwrap();
        assert_eq!(strategy, Strategy::Sequential);
        assert_eq!(outcome.results[&0], "rs1");

        let err = with_fallback(
            || Err(RsidError::Annotation("pool unavailable".to_string())),
            || Err(RsidError::Annotation("still broken".to_string())),
        )
        .unwrap_err();
        assert!(err.to_string().contains("sequential fallback failed"));
    }

    #[test]
    fn test_parallel_progress() {
        let table = table_with_ids(&["."; 8]);
        let tasks = build_tasks(&table);
        let config = test_config(4);
        let limiter = config.rate_limiter();

        let seen = Mutex::new(Vec::new());
        let observer = |p: u8| seen.lock().unwrap().push(p);
        annotate_parallel(&tasks, &ScrambledLookup::new(), &config, &limiter, Some(&observer)).unwrap();

        assert_eq!(seen.lock().unwrap().clone(), vec![25, 50, 75, 100]);
    }

    #[test]
    fn test_annotate_vcf() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("clean.vcf");
        let output = dir.path().join("annotated.vcf");
        std::fs::write(
            &input,
            "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tSAMPLE\n\
             NC_000016.10\t1\t.\tA\tT\t30\t\n\
             NC_000016.10\t2\trs77\tG\tC\t.\t\n",
        )
        .unwrap();

        let report = annotate_vcf(&input, &output, &ScrambledLookup::new(), &test_config(1), None).unwrap();
        assert_eq!(report.total_variants, 2);
        assert_eq!(report.annotated, 1);
        assert!(report.message.contains("1/2"));

        let content = std::fs::read_to_string(&output).unwrap();
        assert_eq!(
            content,
            "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tSAMPLE\n\
             NC_000016.10\t1\trs1\tA\tT\t30\t\n\
             NC_000016.10\t2\trs77\tG\tC\t.\t\n"
        );
    }

    #[test]
    fn test_annotate_vcf_without_rows() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("empty.vcf");
        std::fs::write(&input, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tSAMPLE\n").unwrap();

        let result = annotate_vcf(
            &input,
            dir.path().join("out.vcf"),
            &ScrambledLookup::new(),
            &test_config(1),
            None,
        );
        assert!(matches!(result, Err(RsidError::NoDataRows(_))));
    }

    #[test]
    fn test_task_needs_lookup() {
        let record = VariantRecord::new("16", 1, "NORSID", "A", "T", ".");
        let task = AnnotationTask {
            index: 0,
            chromosome: record.chrom,
            position: record.pos,
            current_id: record.id,
        };
        assert!(task.needs_lookup());
    }
}

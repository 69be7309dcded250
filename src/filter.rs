//! Post-annotation filtering and summary statistics

use crate::utils::vcf_base_name;
use crate::vcf::{ParseMode, VcfRow, VcfTable};
use crate::{RsidResult, MISSING};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Minimum QUAL for a variant to count as reliable
pub const DEFAULT_QUALITY_THRESHOLD: f64 = 20.0;

const FINAL_ANNOTATION_SUFFIX: &str = "_final_annotation";

/// Rows kept by a filter out of the rows it saw
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    pub kept: usize,
    pub total: usize,
    pub message: String,
}

/// Records whose identifier is an rsID
pub fn filter_rsids(table: &VcfTable) -> VcfTable {
    table.retain_records(|record| record.has_rsid())
}

/// Records with a numeric QUAL of at least `threshold`; `.` never passes
pub fn filter_significant(table: &VcfTable, threshold: f64) -> VcfTable {
    table.retain_records(|record| record.quality_value().is_some_and(|q| q >= threshold))
}

pub fn filter_rsids_vcf<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> RsidResult<FilterStats> {
    let table = VcfTable::read(&input, ParseMode::Passthrough)?;
    let filtered = filter_rsids(&table);
    filtered.write(&output)?;

    let kept = filtered.record_count();
    let total = table.record_count();
    Ok(FilterStats {
        kept,
        total,
        message: format!(
            "Found {} variants with rsIDs out of {} total variants",
            kept, total
        ),
    })
}

pub fn filter_significant_rsids<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    threshold: f64,
) -> RsidResult<FilterStats> {
    let table = VcfTable::read(&input, ParseMode::Passthrough)?;
    let significant = filter_significant(&table, threshold);
    significant.write(&output)?;

    let kept = significant.record_count();
    let total = table.record_count();
    Ok(FilterStats {
        kept,
        total,
        message: format!(
            "Found {} high-quality variants out of {} variants with rsIDs",
            kept, total
        ),
    })
}

/// Aggregate counts over a fully annotated table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub base_name: String,
    pub total_variants: usize,
    pub with_rsid: usize,
    pub without_rsid: usize,
    /// Variants with an rsID and QUAL at or above the threshold
    pub reliable_variants: usize,
    pub threshold: f64,
}

impl Summary {
    pub fn from_table(table: &VcfTable, base_name: &str, threshold: f64) -> Self {
        let total_variants = table.record_count();
        let with_rsid = table.records().filter(|r| r.has_rsid()).count();
        let reliable_variants = table
            .records()
            .filter(|r| r.has_rsid() && r.quality_value().is_some_and(|q| q >= threshold))
            .count();

        Self {
            base_name: base_name.to_string(),
            total_variants,
            with_rsid,
            without_rsid: total_variants - with_rsid,
            reliable_variants,
            threshold,
        }
    }

    /// The five-line text report
    pub fn to_report(&self) -> String {
        format!(
            "Summary Report for {}\n\
             Total variants analyzed: {}\n\
             Variants with an rsID: {}\n\
             Variants without an rsID: {}\n\
             Reliable variants (QUAL equal or higher than {}): {}\n",
            self.base_name,
            self.total_variants,
            self.with_rsid,
            self.without_rsid,
            self.threshold,
            self.reliable_variants
        )
    }
}

/// Compute a [`Summary`] of `input` and write it to `report_path`
///
/// Without an explicit `base_name` the input's file stem is used, minus any
/// `_final_annotation` suffix.
pub fn generate_summary_report<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    report_path: Q,
    base_name: Option<&str>,
    threshold: f64,
) -> RsidResult<Summary> {
    let table = VcfTable::read(&input, ParseMode::Passthrough)?;
    let base_name = match base_name {
        Some(name) => name.to_string(),
        None => {
            let stem = vcf_base_name(&input);
            stem.strip_suffix(FINAL_ANNOTATION_SUFFIX)
                .unwrap_or(&stem)
                .to_string()
        }
    };

    let summary = Summary::from_table(&table, &base_name, threshold);

    let mut writer = BufWriter::new(File::create(&report_path)?);
    writer.write_all(summary.to_report().as_bytes())?;
    writer.flush()?;

    Ok(summary)
}

/// Counts from [`strip_rsids_vcf`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StripStats {
    pub processed: usize,
    pub removed: usize,
}

fn strip_raw_line(line: &str) -> Option<String> {
    let mut fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 3 || fields[2] == MISSING {
        return None;
    }
    fields[2] = MISSING;
    Some(fields.join("\t"))
}

/// Replace every identifier with `.`, keeping everything else as is
pub fn strip_rsids(table: &mut VcfTable) -> StripStats {
    let mut stats = StripStats {
        processed: 0,
        removed: 0,
    };

    for row in table.rows.iter_mut() {
        match row {
            VcfRow::Record(record) => {
                stats.processed += 1;
                if record.id != MISSING {
                    record.id = MISSING.to_string();
                    stats.removed += 1;
                }
            }
            VcfRow::Raw(line) => {
                if line.split('\t').count() < 3 {
                    continue;
                }
                stats.processed += 1;
                if let Some(stripped) = strip_raw_line(line) {
                    *line = stripped;
                    stats.removed += 1;
                }
            }
        }
    }

    stats
}

pub fn strip_rsids_vcf<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> RsidResult<StripStats> {
    let mut table = VcfTable::read(&input, ParseMode::Passthrough)?;
    let stats = strip_rsids(&mut table);
    table.write(&output)?;

    log::info!(
        "Removed identifiers from {} of {} variants",
        stats.removed,
        stats.processed
    );
    Ok(stats)
}

//! Split a VCF into one file per autosome

use crate::chrom::{normalize_chromosome, MAX_CHROMOSOME, MIN_CHROMOSOME};
use crate::utils::{open_text_reader, validate_file_exists, vcf_base_name};
use crate::{RsidError, RsidResult};
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Parse a chromosome selection such as `1-21` or `1,2,5`
pub fn parse_chromosome_selection(selection: &str) -> RsidResult<BTreeSet<u8>> {
    let invalid = || RsidError::InvalidChromosome(selection.to_string());
    let selection = selection.trim();

    let chromosomes: BTreeSet<u8> = if let Some((start, end)) = selection.split_once('-') {
        let start: u8 = start.trim().parse().map_err(|_| invalid())?;
        let end: u8 = end.trim().parse().map_err(|_| invalid())?;
        (start..=end).collect()
    } else {
        selection
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<u8>().map_err(|_| invalid()))
            .collect::<RsidResult<_>>()?
    };

    if chromosomes.is_empty()
        || chromosomes
            .iter()
            .any(|c| !(MIN_CHROMOSOME..=MAX_CHROMOSOME).contains(c))
    {
        return Err(invalid());
    }

    Ok(chromosomes)
}

/// Every chromosome the splitter knows, 1-21
pub fn all_chromosomes() -> BTreeSet<u8> {
    (MIN_CHROMOSOME..=MAX_CHROMOSOME).collect()
}

/// Write `<base>_chr<n>.vcf` into `output_dir` for each selected chromosome present
///
/// Data lines are copied verbatim after the header block. Rows whose
/// chromosome does not normalize into `chromosomes` are skipped. Returns the
/// created paths in order of first appearance.
pub fn split_vcf_by_chromosome<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output_dir: Q,
    chromosomes: &BTreeSet<u8>,
) -> RsidResult<Vec<PathBuf>> {
    validate_file_exists(&input)?;
    std::fs::create_dir_all(&output_dir)?;

    let base = vcf_base_name(&input);
    let reader = open_text_reader(&input)?;

    let mut header: Vec<String> = Vec::new();
    let mut writers: HashMap<u8, BufWriter<File>> = HashMap::new();
    let mut created: Vec<PathBuf> = Vec::new();
    let mut skipped = 0usize;

    for line in reader.lines() {
        let line = line?;
        if line.starts_with('#') {
            header.push(line);
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }

        let chrom_field = line.split('\t').next().unwrap_or_default();
        let chrom = match normalize_chromosome(chrom_field) {
            Some(c) if chromosomes.contains(&c) => c,
            _ => {
                skipped += 1;
                continue;
            }
        };

        if !writers.contains_key(&chrom) {
            let path = output_dir.as_ref().join(format!("{}_chr{}.vcf", base, chrom));
            let mut writer = BufWriter::new(File::create(&path)?);
            for header_line in &header {
                writeln!(writer, "{}", header_line)?;
            }
            writers.insert(chrom, writer);
            created.push(path);
        }

        if let Some(writer) = writers.get_mut(&chrom) {
            writeln!(writer, "{}", line)?;
        }
    }

    for writer in writers.values_mut() {
        writer.flush()?;
    }

    if skipped > 0 {
        log::info!("Skipped {} rows outside the selected chromosomes", skipped);
    }
    Ok(created)
}

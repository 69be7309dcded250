//! Chromosome naming conventions
//!
//! Handles mapping between the notations accepted by this tool:
//! - RefSeq: NC_000016.10
//! - UCSC: chr16
//! - Ensembl / numeric: 16
//!
//! Only autosomes 1-21 are normalized; other names are opaque.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// RefSeq accession version written by [`format_chromosome`]
pub const REFSEQ_VERSION: u32 = 10;

pub const MIN_CHROMOSOME: u8 = 1;
pub const MAX_CHROMOSOME: u8 = 21;

/// Output notation for chromosome identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChromNotation {
    RefSeq,
    Ucsc,
    Ensembl,
    Numeric,
}

impl ChromNotation {
    pub const ALL: [ChromNotation; 4] = [
        ChromNotation::RefSeq,
        ChromNotation::Ucsc,
        ChromNotation::Ensembl,
        ChromNotation::Numeric,
    ];
}

impl fmt::Display for ChromNotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChromNotation::RefSeq => "RefSeq",
            ChromNotation::Ucsc => "UCSC",
            ChromNotation::Ensembl => "Ensembl",
            ChromNotation::Numeric => "numeric",
        };
        f.write_str(name)
    }
}

impl FromStr for ChromNotation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "refseq" => Ok(ChromNotation::RefSeq),
            "ucsc" => Ok(ChromNotation::Ucsc),
            "ensembl" => Ok(ChromNotation::Ensembl),
            "numeric" => Ok(ChromNotation::Numeric),
            other => Err(format!(
                "unknown chromosome format '{}' (expected RefSeq, UCSC, Ensembl or numeric)",
                other
            )),
        }
    }
}

fn strip_chr_prefix(token: &str) -> &str {
    match token.get(..3) {
        Some(prefix) if prefix.eq_ignore_ascii_case("chr") => &token[3..],
        _ => token,
    }
}

/// Resolve any supported notation to a chromosome number in 1..=21
///
/// RefSeq accessions drop their `.version` suffix and use the last run of
/// digits with leading zeros removed. Anything non-numeric or out of range is
/// `None`.
pub fn normalize_chromosome(token: &str) -> Option<u8> {
    let rest = strip_chr_prefix(token.trim());

    let is_refseq = rest
        .get(..3)
        .map(|prefix| prefix.eq_ignore_ascii_case("NC_"))
        .unwrap_or(false);

    let digits = if is_refseq {
        let accession = rest.split('.').next().unwrap_or(rest);
        let end = accession.rfind(|c: char| c.is_ascii_digit())? + 1;
        let start = accession[..end]
            .rfind(|c: char| !c.is_ascii_digit())
            .map(|i| i + 1)
            .unwrap_or(0);
        &accession[start..end]
    } else {
        rest
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() || trimmed.len() > 3 {
        return None;
    }
    let n: u8 = trimmed.parse().ok()?;
    (MIN_CHROMOSOME..=MAX_CHROMOSOME).contains(&n).then_some(n)
}

/// Write chromosome number `n` in `notation`
pub fn format_chromosome(n: u8, notation: ChromNotation) -> String {
    match notation {
        ChromNotation::RefSeq => format!("NC_{:06}.{}", n, REFSEQ_VERSION),
        ChromNotation::Ucsc => format!("chr{}", n),
        ChromNotation::Ensembl | ChromNotation::Numeric => n.to_string(),
    }
}

/// Format a caller-supplied chromosome identifier in `notation`
///
/// Identifiers outside 1-21 (X, Y, MT, 22) are formatted textually. For
/// RefSeq the non-numeric ones become `NC_0000{id}.10`, which is not a real
/// accession; kept for compatibility with existing outputs.
pub fn format_chromosome_id(id: &str, notation: ChromNotation) -> String {
    if let Some(n) = normalize_chromosome(id) {
        return format_chromosome(n, notation);
    }

    let bare = strip_chr_prefix(id.trim());
    let bare = bare.strip_prefix("NC_0000").unwrap_or(bare);
    let bare = bare.split('.').next().unwrap_or(bare);

    match notation {
        ChromNotation::RefSeq => match bare.parse::<u32>() {
            Ok(n) => format!("NC_{:06}.{}", n, REFSEQ_VERSION),
            Err(_) => format!("NC_0000{}.{}", bare, REFSEQ_VERSION),
        },
        ChromNotation::Ucsc => format!("chr{}", bare),
        ChromNotation::Ensembl | ChromNotation::Numeric => bare.to_string(),
    }
}

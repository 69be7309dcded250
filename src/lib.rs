//! # rsID Retrieval
//!
//! Converts VCF positions between coordinate systems and annotates variants
//! with dbSNP reference SNP identifiers (rsIDs) fetched from NCBI Entrez, then
//! filters and summarizes the annotated result.
//!
//! Every stage is a file-to-file transform; only the annotation stage talks to
//! the network and runs concurrently.

pub mod annotate;
pub mod chrom;
pub mod client;
pub mod entrez;
pub mod expr;
pub mod filter;
pub mod pipeline;
pub mod settings;
pub mod split;
pub mod transform;
pub mod utils;
pub mod vcf;

/// Identifier meaning "lookup attempted, no identifier found"
pub const NORSID: &str = "NORSID";

/// VCF convention for "field not provided"
pub const MISSING: &str = ".";

/// Prefix carried by every dbSNP reference identifier
pub const RSID_PREFIX: &str = "rs";

/// Returns true when an identifier still needs a lookup.
pub fn is_unknown_id(id: &str) -> bool {
    id == MISSING || id == NORSID
}

/// Returns true when an identifier is a resolved rsID.
pub fn is_rsid(id: &str) -> bool {
    id.starts_with(RSID_PREFIX)
}

/// Error types for the rsID retrieval library
#[derive(Debug, thiserror::Error)]
pub enum RsidError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("File must have .vcf extension: {0}")]
    InvalidExtension(String),

    #[error("VCF file is empty: {0}")]
    EmptyFile(String),

    #[error("VCF file has no data rows: {0}")]
    NoDataRows(String),

    #[error("VCF file missing column header line (#CHROM)")]
    MissingColumnHeader,

    #[error("Missing required column: {0}")]
    MissingRequiredColumn(String),

    #[error("Data row {row} has insufficient columns ({found} < {required})")]
    InsufficientColumns {
        row: usize,
        found: usize,
        required: usize,
    },

    #[error("Data row {row}: POS column must be numeric, got '{value}'")]
    NonNumericPosition { row: usize, value: String },

    #[error("Malformed VCF row {row}: {line}")]
    MalformedRow { row: usize, line: String },

    #[error("Invalid equation: {0}")]
    InvalidExpression(String),

    #[error("Equation failed for position {position}: {cause}")]
    TransformFailed { position: u64, cause: String },

    #[error("Equation produced negative position {value} for position {position}")]
    NegativePosition { position: u64, value: f64 },

    #[error("Invalid chromosome: {0}")]
    InvalidChromosome(String),

    #[error("Valid email address required for Entrez API, got '{0}'")]
    InvalidEmail(String),

    #[error("Remote lookup failed: {0}")]
    Remote(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Annotation failed: {0}")]
    Annotation(String),

    #[error("Pipeline failed: {0}")]
    Pipeline(String),
}

pub type RsidResult<T> = Result<T, RsidError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_ids() {
        assert!(is_unknown_id("."));
        assert!(is_unknown_id("NORSID"));
        assert!(!is_unknown_id("rs123"));
        assert!(!is_unknown_id("custom_id"));
    }

    #[test]
    fn test_is_rsid() {
        assert!(is_rsid("rs123"));
        assert!(is_rsid("rs1,rs2"));
        assert!(!is_rsid("NORSID"));
        assert!(!is_rsid("."));
    }
}

//! Position (and optionally chromosome) rewriting between coordinate systems

use crate::chrom::{format_chromosome_id, ChromNotation};
use crate::expr::Expression;
use crate::vcf::{validate_vcf_file, ParseMode, VcfRow, VcfTable};
use crate::{RsidError, RsidResult};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Offset added by the simple-offset transform unless the caller overrides it
pub const DEFAULT_POS_MODIFIER: u64 = 55_758_218;

// Two-segment remap between the CES1A2 and CES1 loci
pub const LOW_POS_THRESHOLD: u64 = 2358;
pub const HIGH_POS_THRESHOLD: u64 = 32634;
pub const BASE_OFFSET: u64 = 55_758_218;
pub const HIGH_OFFSET_BASE: u64 = 55_834_270;
pub const HIGH_OFFSET_SUBTRACT: u64 = 72_745;

/// Positions an equation is checked against before touching a file
pub const DEFAULT_TEST_POSITIONS: [u64; 4] = [100, 1000, 10000, 100000];

/// A pure `position -> position` mapping
#[derive(Debug, Clone, PartialEq)]
pub enum PositionTransform {
    /// `position + offset`
    SimpleOffset(u64),
    /// Piecewise remap; positions in `[LOW_POS_THRESHOLD, HIGH_POS_THRESHOLD]` are unchanged
    PiecewiseRemap,
    /// User-supplied equation over `x`
    Equation(Expression),
}

impl PositionTransform {
    pub fn apply(&self, position: u64) -> RsidResult<u64> {
        match self {
            PositionTransform::SimpleOffset(offset) => {
                position
                    .checked_add(*offset)
                    .ok_or_else(|| RsidError::TransformFailed {
                        position,
                        cause: "position overflow".to_string(),
                    })
            }
            PositionTransform::PiecewiseRemap => Ok(piecewise_remap(position)),
            PositionTransform::Equation(expr) => {
                let value = expr
                    .eval(position as f64)
                    .map_err(|e| RsidError::TransformFailed {
                        position,
                        cause: e.to_string(),
                    })?;
                if value < 0.0 {
                    return Err(RsidError::NegativePosition { position, value });
                }
                if !value.is_finite() || value >= u64::MAX as f64 {
                    return Err(RsidError::TransformFailed {
                        position,
                        cause: "position overflow".to_string(),
                    });
                }
                Ok(value.trunc() as u64)
            }
        }
    }
}

impl fmt::Display for PositionTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionTransform::SimpleOffset(offset) => write!(f, "x + {}", offset),
            PositionTransform::PiecewiseRemap => write!(
                f,
                "{} + x if x < {}; {} - ({} - x) if x > {}; else x",
                BASE_OFFSET, LOW_POS_THRESHOLD, HIGH_OFFSET_BASE, HIGH_OFFSET_SUBTRACT, HIGH_POS_THRESHOLD
            ),
            PositionTransform::Equation(expr) => write!(f, "{}", expr),
        }
    }
}

fn piecewise_remap(position: u64) -> u64 {
    if position < LOW_POS_THRESHOLD {
        BASE_OFFSET + position
    } else if position > HIGH_POS_THRESHOLD {
        // HIGH_OFFSET_BASE - HIGH_OFFSET_SUBTRACT > 0, so this never underflows
        HIGH_OFFSET_BASE - HIGH_OFFSET_SUBTRACT + position
    } else {
        position
    }
}

/// The two fixed liftovers offered by the standard pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NamedTransform {
    /// CES1P1 -> CES1, simple offset
    Ces1p1Ces1,
    /// CES1A2 -> CES1, piecewise remap
    Ces1a2Ces1,
}

impl NamedTransform {
    /// `pos_modifier` is only used by the offset transform and must be positive
    pub fn to_transform(self, pos_modifier: u64) -> RsidResult<PositionTransform> {
        match self {
            NamedTransform::Ces1p1Ces1 if pos_modifier == 0 => Err(RsidError::InvalidConfig(
                "Position modifier must be a positive integer for CES1P1-CES1".to_string(),
            )),
            NamedTransform::Ces1p1Ces1 => Ok(PositionTransform::SimpleOffset(pos_modifier)),
            NamedTransform::Ces1a2Ces1 => Ok(PositionTransform::PiecewiseRemap),
        }
    }
}

impl fmt::Display for NamedTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamedTransform::Ces1p1Ces1 => f.write_str("CES1P1-CES1"),
            NamedTransform::Ces1a2Ces1 => f.write_str("CES1A2-CES1"),
        }
    }
}

impl FromStr for NamedTransform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CES1P1-CES1" => Ok(NamedTransform::Ces1p1Ces1),
            "CES1A2-CES1" => Ok(NamedTransform::Ces1a2Ces1),
            other => Err(format!(
                "Invalid modification type '{}'. Must be 'CES1P1-CES1' or 'CES1A2-CES1'",
                other
            )),
        }
    }
}

/// Chromosome written into every transformed record
#[derive(Debug, Clone, PartialEq)]
pub struct ChromTarget {
    pub id: String,
    pub notation: ChromNotation,
}

impl ChromTarget {
    pub fn new(id: &str, notation: ChromNotation) -> Self {
        Self {
            id: id.to_string(),
            notation,
        }
    }

    pub fn formatted(&self) -> String {
        format_chromosome_id(&self.id, self.notation)
    }
}

/// A position transform plus an optional chromosome rewrite
#[derive(Debug, Clone, PartialEq)]
pub struct TransformSpec {
    pub transform: PositionTransform,
    pub chromosome: Option<ChromTarget>,
}

impl TransformSpec {
    pub fn new(transform: PositionTransform) -> Self {
        Self {
            transform,
            chromosome: None,
        }
    }

    pub fn with_chromosome(mut self, target: ChromTarget) -> Self {
        self.chromosome = Some(target);
        self
    }

    /// Run the transform on sample positions; any failure rejects the spec
    pub fn check(&self, test_positions: &[u64]) -> RsidResult<Vec<(u64, u64)>> {
        test_positions
            .iter()
            .map(|&pos| self.transform.apply(pos).map(|new_pos| (pos, new_pos)))
            .collect()
    }
}

/// Parse an equation and check it against sample positions
///
/// Returns the compiled equation together with each `(original, modified)` pair.
pub fn validate_equation(
    source: &str,
    test_positions: Option<&[u64]>,
) -> RsidResult<(Expression, Vec<(u64, u64)>)> {
    let expr = Expression::parse(source).map_err(|e| RsidError::InvalidExpression(e.to_string()))?;
    let positions = test_positions.unwrap_or(&DEFAULT_TEST_POSITIONS);
    let results = TransformSpec::new(PositionTransform::Equation(expr.clone())).check(positions)?;
    Ok((expr, results))
}

/// Statistics about one transformed file
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransformStats {
    pub total_variants: usize,
    pub original_range: Option<(u64, u64)>,
    pub modified_range: Option<(u64, u64)>,
    /// `input -> formatted` when the chromosome was rewritten
    pub chromosome_mapping: Option<String>,
    pub test_results: Vec<(u64, u64)>,
}

fn range(values: &[u64]) -> Option<(u64, u64)> {
    let min = values.iter().copied().min()?;
    let max = values.iter().copied().max()?;
    Some((min, max))
}

/// Format an optional range as `min - max`
pub fn format_range(range: Option<(u64, u64)>) -> String {
    match range {
        Some((min, max)) => format!("{} - {}", min, max),
        None => "n/a".to_string(),
    }
}

/// Apply `spec` to every record; nothing is changed unless every position succeeds
pub fn apply_transform(table: &VcfTable, spec: &TransformSpec) -> RsidResult<(VcfTable, TransformStats)> {
    let original: Vec<u64> = table.records().map(|r| r.pos).collect();
    let modified = original
        .iter()
        .map(|&pos| spec.transform.apply(pos))
        .collect::<RsidResult<Vec<u64>>>()?;

    let formatted_chrom = spec.chromosome.as_ref().map(|target| target.formatted());

    let mut output = table.clone();
    let mut new_positions = modified.iter();
    for row in output.rows.iter_mut() {
        if let VcfRow::Record(record) = row {
            if let Some(&pos) = new_positions.next() {
                record.pos = pos;
            }
            if let Some(chrom) = &formatted_chrom {
                record.chrom = chrom.clone();
            }
        }
    }

    let stats = TransformStats {
        total_variants: original.len(),
        original_range: range(&original),
        modified_range: range(&modified),
        chromosome_mapping: spec
            .chromosome
            .as_ref()
            .zip(formatted_chrom.as_ref())
            .map(|(target, formatted)| format!("{} -> {}", target.id, formatted)),
        test_results: Vec::new(),
    };

    Ok((output, stats))
}

/// Validate `input`, check the transform on sample positions, rewrite the whole file
pub fn transform_vcf<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    spec: &TransformSpec,
) -> RsidResult<TransformStats> {
    validate_vcf_file(&input)?;
    let test_results = spec.check(&DEFAULT_TEST_POSITIONS)?;

    let table = VcfTable::read(&input, ParseMode::Strict)?;
    let (transformed, mut stats) = apply_transform(&table, spec)?;
    transformed.write(&output)?;

    stats.test_results = test_results;
    log::info!(
        "Transformed {} variants ({}) into {:?}",
        stats.total_variants,
        spec.transform,
        output.as_ref()
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, Builder};

    const HEADER: &str = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO";

    #[test]
    fn test_piecewise_boundaries() {
        let t = PositionTransform::PiecewiseRemap;
        assert_eq!(t.apply(2357).unwrap(), 55_760_575);
        assert_eq!(t.apply(2358).unwrap(), 2358);
        assert_eq!(t.apply(32634).unwrap(), 32634);
        assert_eq!(t.apply(32635).unwrap(), 55_794_160);
        assert_eq!(t.apply(0).unwrap(), BASE_OFFSET);
        assert_eq!(t.apply(100_000).unwrap(), 55_834_270 + 100_000 - 72_745);
    }

    #[test]
    fn test_simple_offset() {
        let t = NamedTransform::Ces1p1Ces1.to_transform(DEFAULT_POS_MODIFIER).unwrap();
        assert_eq!(t.apply(1).unwrap(), 55_758_219);
        assert!(NamedTransform::Ces1p1Ces1.to_transform(0).is_err());
        assert!(PositionTransform::SimpleOffset(1).apply(u64::MAX).is_err());
    }

    #[test]
    fn test_named_transform_parse() {
        assert_eq!("CES1P1-CES1".parse::<NamedTransform>(), Ok(NamedTransform::Ces1p1Ces1));
        assert_eq!("ces1a2-ces1".parse::<NamedTransform>(), Ok(NamedTransform::Ces1a2Ces1));
        assert!("CES2-CES1".parse::<NamedTransform>().is_err());
    }

    #[test]
    fn test_validate_equation() {
        let (_, results) = validate_equation("x + 1000000", None).unwrap();
        assert_eq!(
            results,
            vec![(100, 1_000_100), (1000, 1_001_000), (10000, 1_010_000), (100000, 1_100_000)]
        );

        let (_, results) = validate_equation("x * 2", Some(&[5, 7])).unwrap();
        assert_eq!(results, vec![(5, 10), (7, 14)]);
    }

    #[test]
    fn test_validate_equation_rejects() {
        let err = validate_equation("x - 5000", None).unwrap_err();
        assert!(matches!(err, RsidError::NegativePosition { position: 100, .. }));
        assert!(err.to_string().contains("negative"));

        let err = validate_equation("1000 / (x - 1000) + 5", None).unwrap_err();
        match err {
            RsidError::TransformFailed { position, cause } => {
                assert_eq!(position, 1000);
                assert!(cause.contains("division by zero"));
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(matches!(
            validate_equation("open('/etc/passwd')", None),
            Err(RsidError::InvalidExpression(_))
        ));
        assert!(matches!(validate_equation("", None), Err(RsidError::InvalidExpression(_))));
    }

    #[test]
    fn test_equation_truncates() {
        let (expr, _) = validate_equation("x / 3", None).unwrap();
        assert_eq!(PositionTransform::Equation(expr).apply(10).unwrap(), 3);
    }

    #[test]
    fn test_equation_overflow_is_rejected() {
        let err = validate_equation("x * 1e30", None).unwrap_err();
        match err {
            RsidError::TransformFailed { position, cause } => {
                assert_eq!(position, 100);
                assert_eq!(cause, "position overflow");
            }
            other => panic!("unexpected error: {other}"),
        }

        let (expr, _) = validate_equation("x * 1e15", None).unwrap();
        assert_eq!(
            PositionTransform::Equation(expr).apply(1000).unwrap(),
            1_000_000_000_000_000_000
        );
    }

    #[test]
    fn test_apply_transform_with_chromosome() {
        let text = format!("{}\n16\t100\t.\tA\tT\t50\tPASS\tDP=1\n16\t200\trs9\tG\tC\t.\tPASS\tDP=2\n", HEADER);
        let table = VcfTable::from_reader(text.as_bytes(), ParseMode::Strict).unwrap();
        let (expr, _) = validate_equation("x + 1", None).unwrap();
        let spec = TransformSpec::new(PositionTransform::Equation(expr))
            .with_chromosome(ChromTarget::new("16", ChromNotation::Ucsc));

        let (out, stats) = apply_transform(&table, &spec).unwrap();
        let records: Vec<_> = out.records().collect();
        assert_eq!(records[0].pos, 101);
        assert_eq!(records[0].chrom, "chr16");
        assert_eq!(records[1].pos, 201);
        assert_eq!(records[1].id, "rs9");
        assert_eq!(records[1].info.as_deref(), Some("DP=2"));
        assert_eq!(stats.original_range, Some((100, 200)));
        assert_eq!(stats.modified_range, Some((101, 201)));
        assert_eq!(stats.chromosome_mapping.as_deref(), Some("16 -> chr16"));
    }

    #[test]
    fn test_transform_is_all_or_nothing() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.vcf");
        let output = dir.path().join("out.vcf");
        std::fs::write(
            &input,
            format!("{}\n16\t200000\t.\tA\tT\t50\tPASS\tDP=1\n16\t50\t.\tG\tC\t50\tPASS\tDP=1\n", HEADER),
        )
        .unwrap();

        // Passes every sample position but fails on the second real row
        let (expr, _) = validate_equation("x - 60", None).unwrap();
        let spec = TransformSpec::new(PositionTransform::Equation(expr));
        let err = transform_vcf(&input, &output, &spec).unwrap_err();

        assert!(matches!(err, RsidError::NegativePosition { position: 50, .. }));
        assert!(!output.exists());
    }

    #[test]
    fn test_transform_vcf_preserves_columns() {
        let mut input = Builder::new().suffix(".vcf").tempfile().unwrap();
        writeln!(input, "##fileformat=VCFv4.2").unwrap();
        writeln!(input, "{}", HEADER).unwrap();
        writeln!(input, "16\t2357\t.\tA\tT\t50\tPASS\tDP=1").unwrap();
        writeln!(input, "16\t5000\t.\tG\tC\t10\tq10\tDP=9").unwrap();
        let output = tempfile::NamedTempFile::new().unwrap();

        let spec = TransformSpec::new(PositionTransform::PiecewiseRemap);
        let stats = transform_vcf(input.path(), output.path(), &spec).unwrap();
        assert_eq!(stats.total_variants, 2);
        assert_eq!(stats.test_results.len(), DEFAULT_TEST_POSITIONS.len());

        let content = std::fs::read_to_string(output.path()).unwrap();
        assert_eq!(
            content,
            format!(
                "##fileformat=VCFv4.2\n{}\n16\t55760575\t.\tA\tT\t50\tPASS\tDP=1\n16\t5000\t.\tG\tC\t10\tq10\tDP=9\n",
                HEADER
            )
        );
    }
}

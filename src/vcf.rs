//! VCF file processing functionality
//!
//! Only the fixed 6-10 column subset of VCF is understood: the six core
//! columns plus optional FILTER, INFO, FORMAT and a single sample column.
//! Header lines are opaque and preserved verbatim.

use crate::utils::{has_vcf_extension, open_text_reader, validate_file_exists};
use crate::{is_rsid, is_unknown_id, RsidError, RsidResult, MISSING};
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;

/// Prefix of the column-name header line
pub const COLUMN_HEADER_PREFIX: &str = "#CHROM";

/// Columns that must be declared for an input file to validate
pub const REQUIRED_COLUMNS: [&str; 7] = ["#CHROM", "POS", "ID", "REF", "ALT", "QUAL", "FILTER"];

/// Number of leading data rows inspected by [`validate_vcf_file`]
pub const VALIDATION_SAMPLE_ROWS: usize = 3;

/// Rows with fewer fields than this are malformed
pub const MIN_FIELDS: usize = 6;

/// Column-name line of a cleaned file
pub const CANONICAL_HEADER: &str = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tSAMPLE";

const FILEFORMAT_LINE: &str = "##fileformat=VCFv4.2";

/// Semantic role of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Chrom,
    Pos,
    Id,
    Ref,
    Alt,
    Qual,
    Filter,
    Info,
    Format,
    Sample,
    Other,
}

/// Field order of the data lines in a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    columns: Vec<Column>,
}

impl ColumnLayout {
    /// Build the layout declared by a `#CHROM` line
    pub fn from_header(header_line: &str) -> RsidResult<Self> {
        let names: Vec<&str> = header_line.trim_end_matches(['\r', '\n']).split('\t').collect();
        let mut columns = Vec::with_capacity(names.len());
        let mut after_format = false;
        let mut has_sample = false;

        for name in &names {
            let column = match *name {
                "#CHROM" | "CHROM" => Column::Chrom,
                "POS" => Column::Pos,
                "ID" => Column::Id,
                "REF" => Column::Ref,
                "ALT" => Column::Alt,
                "QUAL" => Column::Qual,
                "FILTER" => Column::Filter,
                "INFO" => Column::Info,
                "FORMAT" => {
                    after_format = true;
                    columns.push(Column::Format);
                    continue;
                }
                "SAMPLE" if !has_sample => Column::Sample,
                _ if after_format && !has_sample => Column::Sample,
                _ => Column::Other,
            };
            if column == Column::Sample {
                has_sample = true;
            }
            columns.push(column);
        }

        let layout = ColumnLayout { columns };
        for (column, name) in [
            (Column::Chrom, "#CHROM"),
            (Column::Pos, "POS"),
            (Column::Id, "ID"),
            (Column::Ref, "REF"),
            (Column::Alt, "ALT"),
            (Column::Qual, "QUAL"),
        ] {
            if layout.index_of(column).is_none() {
                return Err(RsidError::MissingRequiredColumn(name.to_string()));
            }
        }

        Ok(layout)
    }

    /// Layout assumed for headerless data, by field count
    pub fn positional(num_fields: usize) -> Self {
        use Column::*;
        let columns = match num_fields {
            0..=6 => vec![Chrom, Pos, Id, Ref, Alt, Qual],
            7 => vec![Chrom, Pos, Id, Ref, Alt, Qual, Sample],
            8 => vec![Chrom, Pos, Id, Ref, Alt, Qual, Filter, Info],
            9 => vec![Chrom, Pos, Id, Ref, Alt, Qual, Filter, Info, Format],
            n => {
                let mut columns = vec![Chrom, Pos, Id, Ref, Alt, Qual, Filter, Info, Format, Sample];
                columns.resize(n, Other);
                columns
            }
        };
        ColumnLayout { columns }
    }

    /// The 7-column shape written by the cleaning step
    pub fn canonical() -> Self {
        use Column::*;
        ColumnLayout {
            columns: vec![Chrom, Pos, Id, Ref, Alt, Qual, Sample],
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn index_of(&self, column: Column) -> Option<usize> {
        self.columns.iter().position(|&c| c == column)
    }
}

/// One data line of a VCF file
#[derive(Debug, Clone, PartialEq)]
pub struct VariantRecord {
    pub chrom: String,
    pub pos: u64,
    pub id: String,
    pub ref_allele: String,
    pub alt: String,
    /// Kept as text; see [`VariantRecord::quality_value`]
    pub qual: String,
    pub filter: Option<String>,
    pub info: Option<String>,
    pub format: Option<String>,
    pub sample: Option<String>,
    /// Columns the layout does not name, in file order
    pub extra: Vec<String>,
}

impl VariantRecord {
    pub fn new(chrom: &str, pos: u64, id: &str, ref_allele: &str, alt: &str, qual: &str) -> Self {
        Self {
            chrom: chrom.to_string(),
            pos,
            id: id.to_string(),
            ref_allele: ref_allele.to_string(),
            alt: alt.to_string(),
            qual: qual.to_string(),
            filter: None,
            info: None,
            format: None,
            sample: None,
            extra: Vec::new(),
        }
    }

    /// Parse the fields of data row `row` (1-based) using `layout`
    pub fn from_fields(fields: &[&str], layout: &ColumnLayout, row: usize) -> RsidResult<Self> {
        if fields.len() < MIN_FIELDS {
            return Err(RsidError::MalformedRow {
                row,
                line: fields.join("\t"),
            });
        }

        let core = |column: Column| -> RsidResult<String> {
            layout
                .index_of(column)
                .and_then(|idx| fields.get(idx))
                .map(|s| s.to_string())
                .ok_or_else(|| RsidError::MalformedRow {
                    row,
                    line: fields.join("\t"),
                })
        };

        let pos_text = core(Column::Pos)?;
        let pos = pos_text
            .trim()
            .parse::<u64>()
            .map_err(|_| RsidError::NonNumericPosition {
                row,
                value: pos_text.clone(),
            })?;

        let mut record = VariantRecord::new(
            &core(Column::Chrom)?,
            pos,
            &core(Column::Id)?,
            &core(Column::Ref)?,
            &core(Column::Alt)?,
            &core(Column::Qual)?,
        );

        for (idx, column) in layout.columns().iter().enumerate() {
            let Some(value) = fields.get(idx).map(|s| s.to_string()) else {
                break;
            };
            match column {
                Column::Filter => record.filter = Some(value),
                Column::Info => record.info = Some(value),
                Column::Format => record.format = Some(value),
                Column::Sample => record.sample = Some(value),
                Column::Other => record.extra.push(value),
                _ => {}
            }
        }
        // Fields past the declared layout are kept too
        for value in fields.iter().skip(layout.columns().len()) {
            record.extra.push(value.to_string());
        }

        Ok(record)
    }

    /// Numeric quality; `None` for the missing sentinel or unparsable text
    pub fn quality_value(&self) -> Option<f64> {
        if self.qual == MISSING {
            return None;
        }
        self.qual.trim().parse::<f64>().ok().filter(|q| !q.is_nan())
    }

    pub fn has_unknown_id(&self) -> bool {
        is_unknown_id(&self.id)
    }

    pub fn has_rsid(&self) -> bool {
        is_rsid(&self.id)
    }

    /// Narrow to the canonical 7-column shape
    pub fn into_canonical(mut self) -> Self {
        self.filter = None;
        self.info = None;
        self.format = None;
        self.extra.clear();
        self.sample = Some(self.sample.unwrap_or_default());
        self
    }

    /// Fields in `layout` order; absent trailing optional columns are dropped
    pub fn to_fields(&self, layout: &ColumnLayout) -> Vec<String> {
        let mut extra = self.extra.iter();
        let mut fields: Vec<Option<String>> = layout
            .columns()
            .iter()
            .map(|column| match column {
                Column::Chrom => Some(self.chrom.clone()),
                Column::Pos => Some(self.pos.to_string()),
                Column::Id => Some(self.id.clone()),
                Column::Ref => Some(self.ref_allele.clone()),
                Column::Alt => Some(self.alt.clone()),
                Column::Qual => Some(self.qual.clone()),
                Column::Filter => self.filter.clone(),
                Column::Info => self.info.clone(),
                Column::Format => self.format.clone(),
                Column::Sample => self.sample.clone(),
                Column::Other => extra.next().cloned(),
            })
            .collect();
        fields.extend(extra.map(|s| Some(s.clone())));

        while matches!(fields.last(), Some(None)) {
            fields.pop();
        }
        fields
            .into_iter()
            .map(|f| f.unwrap_or_else(|| MISSING.to_string()))
            .collect()
    }

    pub fn to_line(&self, layout: &ColumnLayout) -> String {
        self.to_fields(layout).join("\t")
    }
}

/// How data rows that cannot be parsed are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Any malformed row fails the read
    Strict,
    /// Malformed rows are kept verbatim and never interpreted
    Passthrough,
}

/// A data line: parsed, or carried through untouched
#[derive(Debug, Clone, PartialEq)]
pub enum VcfRow {
    Record(VariantRecord),
    Raw(String),
}

/// Header block plus data rows of a VCF file, in file order
#[derive(Debug, Clone, PartialEq)]
pub struct VcfTable {
    /// Every line starting with `#`, verbatim
    pub header: Vec<String>,
    pub layout: ColumnLayout,
    pub rows: Vec<VcfRow>,
}

impl VcfTable {
    pub fn read<P: AsRef<Path>>(path: P, mode: ParseMode) -> RsidResult<Self> {
        let reader = open_text_reader(&path)?;
        Self::from_reader(reader, mode)
    }

    pub fn from_reader<R: BufRead>(reader: R, mode: ParseMode) -> RsidResult<Self> {
        let mut header = Vec::new();
        let mut layout: Option<ColumnLayout> = None;
        let mut pending: Vec<(usize, String)> = Vec::new();

        for line in reader.lines() {
            let line = line?;
            let line = line.trim_end_matches(['\r', '\n']);

            if line.starts_with('#') {
                if layout.is_none() && line.starts_with(COLUMN_HEADER_PREFIX) {
                    layout = Some(ColumnLayout::from_header(line)?);
                }
                header.push(line.to_string());
                continue;
            }

            if line.trim().is_empty() {
                continue;
            }

            pending.push((pending.len() + 1, line.to_string()));
        }

        let layout = layout.unwrap_or_else(|| {
            let width = pending
                .first()
                .map(|(_, l)| l.split('\t').count())
                .unwrap_or(MIN_FIELDS);
            ColumnLayout::positional(width)
        });

        let mut rows = Vec::with_capacity(pending.len());
        for (row, line) in pending {
            let fields: Vec<&str> = line.split('\t').collect();
            match VariantRecord::from_fields(&fields, &layout, row) {
                Ok(record) => rows.push(VcfRow::Record(record)),
                Err(e) if mode == ParseMode::Passthrough => {
                    log::debug!("Passing through unparsed row: {}", e);
                    rows.push(VcfRow::Raw(line));
                }
                Err(e) => return Err(e),
            }
        }

        Ok(VcfTable {
            header,
            layout,
            rows,
        })
    }

    pub fn records(&self) -> impl Iterator<Item = &VariantRecord> {
        self.rows.iter().filter_map(|row| match row {
            VcfRow::Record(record) => Some(record),
            VcfRow::Raw(_) => None,
        })
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut VariantRecord> {
        self.rows.iter_mut().filter_map(|row| match row {
            VcfRow::Record(record) => Some(record),
            VcfRow::Raw(_) => None,
        })
    }

    pub fn record_count(&self) -> usize {
        self.records().count()
    }

    /// Same header and layout, keeping only the records `keep` accepts
    pub fn retain_records<F>(&self, mut keep: F) -> VcfTable
    where
        F: FnMut(&VariantRecord) -> bool,
    {
        let rows = self
            .rows
            .iter()
            .filter(|row| matches!(row, VcfRow::Record(record) if keep(record)))
            .cloned()
            .collect();

        VcfTable {
            header: self.header.clone(),
            layout: self.layout.clone(),
            rows,
        }
    }

    /// Narrow every record to the canonical 7 columns
    ///
    /// Meta lines are kept, the column-name line is replaced by
    /// [`CANONICAL_HEADER`]. When `chromosome` is given it overwrites the
    /// chromosome of every record.
    pub fn into_canonical(self, chromosome: Option<&str>) -> VcfTable {
        let mut header: Vec<String> = self
            .header
            .into_iter()
            .filter(|line| !line.starts_with(COLUMN_HEADER_PREFIX))
            .collect();
        if !header.iter().any(|line| line.starts_with("##fileformat=")) {
            header.insert(0, FILEFORMAT_LINE.to_string());
        }
        header.push(CANONICAL_HEADER.to_string());

        let rows = self
            .rows
            .into_iter()
            .map(|row| match row {
                VcfRow::Record(record) => {
                    let mut record = record.into_canonical();
                    if let Some(chrom) = chromosome {
                        record.chrom = chrom.to_string();
                    }
                    VcfRow::Record(record)
                }
                raw => raw,
            })
            .collect();

        VcfTable {
            header,
            layout: ColumnLayout::canonical(),
            rows,
        }
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> RsidResult<()> {
        let file = File::create(path)?;
        self.write_to(BufWriter::new(file))
    }

    /// Header block first, then one tab-joined line per row
    pub fn write_to<W: Write>(&self, mut writer: W) -> RsidResult<()> {
        for line in &self.header {
            writeln!(writer, "{}", line)?;
        }

        let mut tsv = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .quote_style(csv::QuoteStyle::Never)
            .flexible(true)
            .has_headers(false)
            .from_writer(writer);

        for row in &self.rows {
            match row {
                VcfRow::Record(record) => tsv.write_record(record.to_fields(&self.layout))?,
                VcfRow::Raw(line) => tsv.write_record(line.split('\t'))?,
            }
        }
        tsv.flush()?;

        Ok(())
    }
}

/// Check that a file looks like a usable VCF before any processing
///
/// Only the first [`VALIDATION_SAMPLE_ROWS`] data rows are inspected, so a bad
/// row further down is not detected here.
pub fn validate_vcf_file<P: AsRef<Path>>(path: P) -> RsidResult<()> {
    let path = path.as_ref();
    let display = path.to_string_lossy().to_string();

    validate_file_exists(path)?;
    if !has_vcf_extension(path) {
        return Err(RsidError::InvalidExtension(display));
    }

    let reader = open_text_reader(path)?;
    let mut saw_any_line = false;
    let mut columns: Option<Vec<String>> = None;
    let mut sample: Vec<String> = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let line = line.trim_end_matches(['\r', '\n']);
        saw_any_line = true;

        if line.starts_with('#') {
            if columns.is_none() && line.starts_with(COLUMN_HEADER_PREFIX) {
                columns = Some(line.split('\t').map(|s| s.trim().to_string()).collect());
            }
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        if sample.len() < VALIDATION_SAMPLE_ROWS {
            sample.push(line.to_string());
        }
        if columns.is_some() && sample.len() >= VALIDATION_SAMPLE_ROWS {
            break;
        }
    }

    if !saw_any_line {
        return Err(RsidError::EmptyFile(display));
    }

    let columns = columns.ok_or(RsidError::MissingColumnHeader)?;
    for required in REQUIRED_COLUMNS {
        if !columns.iter().any(|c| c == required) {
            return Err(RsidError::MissingRequiredColumn(required.to_string()));
        }
    }

    if sample.is_empty() {
        return Err(RsidError::NoDataRows(display));
    }

    let pos_idx = columns.iter().position(|c| c == "POS").unwrap_or(1);
    for (i, line) in sample.iter().enumerate() {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < REQUIRED_COLUMNS.len() {
            return Err(RsidError::InsufficientColumns {
                row: i + 1,
                found: fields.len(),
                required: REQUIRED_COLUMNS.len(),
            });
        }
        let pos = fields.get(pos_idx).ok_or(RsidError::InsufficientColumns {
            row: i + 1,
            found: fields.len(),
            required: pos_idx + 1,
        })?;
        if pos.trim().parse::<u64>().is_err() {
            return Err(RsidError::NonNumericPosition {
                row: i + 1,
                value: pos.to_string(),
            });
        }
    }

    Ok(())
}

/// Narrow a VCF to the canonical 7 columns; `input` and `output` may be the same file
pub fn clean_vcf<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    chromosome: Option<&str>,
) -> RsidResult<String> {
    let table = VcfTable::read(&input, ParseMode::Strict)?;
    let count = table.record_count();
    let cleaned = table.into_canonical(chromosome);
    cleaned.write(&output)?;

    log::info!("Cleaned {} variants into {:?}", count, output.as_ref());
    Ok(format!(
        "Cleaned VCF file saved to {}",
        output.as_ref().display()
    ))
}

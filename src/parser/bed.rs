//! BED file parser with gzip support.
//!
//! Reads scalar BED files (only chromosome, start, and end are kept) and
//! vectorized BED files, whose last column holds one comma-delimited value
//! per base of the interval.

use log::debug;
use std::io::BufRead;
use std::path::Path;

use crate::error::{Error, Result};
use crate::parser::manifest::BedDescriptor;
use crate::parser::util::{is_meta_line, open_reader};
use crate::types::{GroupClass, IntervalRecord, IntervalSet};

/// Vectorized records are kept only when their length is a multiple of this.
pub const VECTOR_LENGTH_STEP: i64 = 100;

/// Build an [`IntervalSet`] from one manifest entry.
pub fn read_interval_set(desc: &BedDescriptor) -> Result<IntervalSet> {
    let reader = open_reader(&desc.path, "BED file")?;
    let parsed = parse_bed_reader(reader, &desc.path, desc.class, &desc.tissue, desc.vectorized)?;

    debug!(
        "{}: kept {} of {} records",
        desc.path.display(),
        parsed.records.len(),
        parsed.data_lines
    );

    Ok(IntervalSet {
        path: desc.path.clone(),
        class: desc.class,
        tissue: desc.tissue.clone(),
        tracks: desc.tracks.clone(),
        fasta: desc.fasta.clone(),
        vectorized: desc.vectorized,
        field_count: parsed.field_count,
        records: parsed.records,
    })
}

/// Result of parsing one BED stream.
pub struct ParsedBed {
    pub records: Vec<IntervalRecord>,
    /// Fields on the first data line.
    pub field_count: usize,
    /// Data lines seen, including records dropped by the vector filter.
    pub data_lines: usize,
}

/// Parse BED data from a reader.
pub fn parse_bed_reader<R: BufRead>(
    reader: R,
    path: &Path,
    class: GroupClass,
    tissue: &str,
    vectorized: bool,
) -> Result<ParsedBed> {
    let mut records = Vec::new();
    let mut field_count = 0;
    let mut ordinal = 0;

    for (idx, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let line = line.trim_end();
        if is_meta_line(line) {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        let line_no = idx + 1;
        let bad_line = |message: String| Error::InputFormat {
            path: path.to_path_buf(),
            line: line_no,
            message,
        };

        // Need at least 3 columns: chrom, start, end
        if fields.len() < 3 {
            return Err(bad_line(format!(
                "expected at least 3 columns, found {}",
                fields.len()
            )));
        }

        // Column headers have non-numeric coordinates
        let (start, end) = match (fields[1].parse::<i64>(), fields[2].parse::<i64>()) {
            (Ok(s), Ok(e)) => (s, e),
            _ => continue,
        };
        if start < 0 || end <= start {
            return Err(bad_line(format!("invalid interval [{}, {})", start, end)));
        }
        if vectorized && fields.len() < 4 {
            return Err(bad_line("vectorized record has no vector column".to_string()));
        }

        if field_count == 0 {
            field_count = fields.len();
        }
        let record_ordinal = ordinal;
        ordinal += 1;

        let mut record = IntervalRecord::new(
            fields[0].to_string(),
            start,
            end,
            class,
            tissue.to_string(),
            record_ordinal,
        );

        if vectorized {
            let vector = parse_vector(fields[fields.len() - 1]).map_err(bad_line)?;
            if !keep_vector(record.length(), vector.len()) {
                continue;
            }
            record.vector = Some(vector);
        }

        records.push(record);
    }

    Ok(ParsedBed {
        records,
        field_count,
        data_lines: ordinal,
    })
}

/// Parse a comma-delimited vector; missing values (`n/a`, `nan`) read as zero.
pub fn parse_vector(field: &str) -> std::result::Result<Vec<f64>, String> {
    field
        .split(',')
        .map(|v| {
            let v = v.trim();
            if v.eq_ignore_ascii_case("n/a") || v.eq_ignore_ascii_case("nan") {
                return Ok(0.0);
            }
            v.parse::<f64>()
                .map_err(|_| format!("invalid vector element '{}'", v))
        })
        .collect()
}

/// Selection rule for vectorized records: one value per base, and a length
/// that is a multiple of [`VECTOR_LENGTH_STEP`].
pub fn keep_vector(length: i64, vector_len: usize) -> bool {
    length == vector_len as i64 && length % VECTOR_LENGTH_STEP == 0
}

//! GTF file parser with gzip support.
//!
//! Only the positional fields and the gene identifier attribute matter for
//! nearest-feature mapping, so every feature line is kept flat, in file order.

use std::io::BufRead;
use std::path::Path;

use crate::error::{Error, Result};
use crate::parser::util::{is_meta_line, open_reader};

/// One GTF feature line.
#[derive(Debug, Clone, PartialEq)]
pub struct GtfFeature {
    pub chrom: String,
    /// 1-based inclusive start, as written in the file.
    pub start: i64,
    /// 1-based inclusive end, as written in the file.
    pub end: i64,
    pub gene_id: String,
    /// The nine tab-delimited fields of the line.
    pub fields: Vec<String>,
}

/// Parse a GTF file, requiring every feature to carry `gene_id_tag`.
pub fn parse_gtf(path: &Path, gene_id_tag: &str) -> Result<Vec<GtfFeature>> {
    let reader = open_reader(path, "GTF file")?;
    parse_gtf_reader(reader, path, gene_id_tag)
}

/// Parse GTF data from a reader.
pub fn parse_gtf_reader<R: BufRead>(
    reader: R,
    path: &Path,
    gene_id_tag: &str,
) -> Result<Vec<GtfFeature>> {
    let mut features = Vec::new();

    for (idx, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let line = line.trim_end();
        if is_meta_line(line) {
            continue;
        }

        let bad_line = |message: String| Error::InputFormat {
            path: path.to_path_buf(),
            line: idx + 1,
            message,
        };

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 9 {
            return Err(bad_line(format!(
                "expected 9 GTF columns, found {}",
                fields.len()
            )));
        }

        let start: i64 = fields[3]
            .parse()
            .map_err(|_| bad_line(format!("invalid start '{}'", fields[3])))?;
        let end: i64 = fields[4]
            .parse()
            .map_err(|_| bad_line(format!("invalid end '{}'", fields[4])))?;
        let gene_id = extract_attribute(fields[8], gene_id_tag)
            .ok_or_else(|| bad_line(format!("feature has no '{}' attribute", gene_id_tag)))?;

        features.push(GtfFeature {
            chrom: fields[0].to_string(),
            start,
            end,
            gene_id,
            fields: fields.iter().take(9).map(|s| s.to_string()).collect(),
        });
    }

    Ok(features)
}

/// Extract an attribute value from the GTF attributes string.
///
/// GTF attributes are in the format: key "value"; key "value"; ...
pub fn extract_attribute(attributes: &str, key: &str) -> Option<String> {
    attributes.split(';').find_map(|attr| {
        let (name, value) = attr.trim().split_once(' ')?;
        if name != key {
            return None;
        }
        Some(value.trim().trim_matches('"').to_string())
    })
}

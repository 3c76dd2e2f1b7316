//! Sequence lengths from a FASTA file (or its `.fai` index when present).

use indexmap::IndexMap;
use noodles::fasta;
use noodles::fasta::indexed_reader;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::parser::util::open_reader;

/// Read the length of every sequence, in file order.
pub fn sequence_lengths(path: &Path) -> Result<IndexMap<String, i64>> {
    Error::require_file("FASTA file", path)?;
    if fai_path(path).exists() {
        return indexed_lengths(path);
    }
    let reader = open_reader(path, "FASTA file")?;
    parse_fasta_reader(reader, path)
}

fn fai_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".fai");
    PathBuf::from(name)
}

fn utf8_name(bytes: &[u8], path: &Path, record: usize) -> Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|_| Error::InputFormat {
        path: path.to_path_buf(),
        line: record,
        message: "sequence name is not valid UTF-8".to_string(),
    })
}

/// Lengths straight from the index, without touching the sequence data.
fn indexed_lengths(path: &Path) -> Result<IndexMap<String, i64>> {
    let reader = indexed_reader::Builder::default().build_from_path(path)?;
    let mut lengths = IndexMap::new();
    for (idx, record) in reader.index().iter().enumerate() {
        let name = utf8_name(record.name(), &fai_path(path), idx + 1)?;
        lengths.insert(name, record.length() as i64);
    }
    Ok(lengths)
}

/// Measure every record; `path` is only used in error messages.
pub fn parse_fasta_reader<R: BufRead>(reader: R, path: &Path) -> Result<IndexMap<String, i64>> {
    let mut reader = fasta::Reader::new(reader);
    let mut lengths = IndexMap::new();

    for (idx, result) in reader.records().enumerate() {
        let record = result?;
        let name = utf8_name(record.definition().name(), path, idx + 1)?;
        lengths.insert(name, record.sequence().as_ref().len() as i64);
    }

    Ok(lengths)
}

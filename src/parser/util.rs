//! Utility functions for file parsing.

use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{Error, Result};

/// Open `path` for buffered reading, decompressing it when it ends in ".gz".
///
/// `role` names the file in the error reported when it does not exist.
pub fn open_reader(path: &Path, role: &'static str) -> Result<Box<dyn BufRead + Send>> {
    Error::require_file(role, path)?;
    let file = File::open(path)?;
    if path.to_string_lossy().ends_with(".gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// True for lines that carry no interval: blank, comments, and UCSC
/// `track`/`browser` directives.
pub fn is_meta_line(line: &str) -> bool {
    let line = line.trim_start();
    line.is_empty()
        || line.starts_with('#')
        || line.starts_with("track")
        || line.starts_with("browser")
}

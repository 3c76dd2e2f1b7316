//! Error type shared by every stage of the pipeline.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced while loading, resolving, or comparing interval sets.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input in {path} (line {line}): {message}")]
    InputFormat {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{role} not found: {}", path.display())]
    MissingFile { role: &'static str, path: PathBuf },

    #[error("{tool} failed: {message}")]
    Engine { tool: &'static str, message: String },

    #[error("{tool} did not finish within {limit:?}")]
    Timeout { tool: &'static str, limit: Duration },

    #[error("Cannot assemble corpus: set '{name}' has columns [{found}], expected [{expected}]")]
    SchemaMismatch {
        name: String,
        expected: String,
        found: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Fail with a `MissingFile` error unless `path` exists.
    pub fn require_file(role: &'static str, path: &std::path::Path) -> Result<()> {
        if path.exists() {
            Ok(())
        } else {
            Err(Error::MissingFile {
                role,
                path: path.to_path_buf(),
            })
        }
    }
}

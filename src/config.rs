//! Configuration and defaults for proxmap.
//!
//! A [`Config`] is built once (usually from command-line flags) and passed by
//! reference to every resolver and engine; nothing is read from global state.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::bucket::BucketScheme;
use crate::error::{Error, Result};

/// Default confidence level for interval estimation.
pub const DEFAULT_CONFIDENCE: f64 = 0.95;

/// Which implementation answers nearest-feature and signal queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// `bedtools closest` and `bigWigAverageOverBed` subprocesses.
    External,
    /// In-process scan over BED/GTF annotations and bedGraph tracks.
    Native,
}

/// Error type for parsing an engine kind from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEngineKindError;

impl fmt::Display for ParseEngineKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid engine: expected 'external' or 'native'")
    }
}

impl std::error::Error for ParseEngineKindError {}

impl FromStr for EngineKind {
    type Err = ParseEngineKindError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "external" => Ok(EngineKind::External),
            "native" => Ok(EngineKind::Native),
            _ => Err(ParseEngineKindError),
        }
    }
}

/// Region queried against signal tracks for each record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalRegion {
    /// The matched feature's start/end.
    Hit,
    /// The record's own start/end.
    Own,
}

/// Error type for parsing a signal region from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSignalRegionError;

impl fmt::Display for ParseSignalRegionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid signal region: expected 'hit' or 'self'")
    }
}

impl std::error::Error for ParseSignalRegionError {}

impl FromStr for SignalRegion {
    type Err = ParseSignalRegionError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hit" => Ok(SignalRegion::Hit),
            "self" | "own" => Ok(SignalRegion::Own),
            _ => Err(ParseSignalRegionError),
        }
    }
}

/// Configuration for a proxmap run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Distance partition shared by every set in the run.
    pub buckets: BucketScheme,
    /// Skip features that overlap the query.
    pub ignore_overlaps: bool,
    /// Worker threads (0 = one per CPU).
    pub threads: usize,
    /// Deadline for each external tool invocation.
    pub timeout: Option<Duration>,
    /// Confidence level for interval estimation, in (0, 1).
    pub confidence: f64,
    /// Field delimiter of emitted tables.
    pub delimiter: u8,
    pub engine: EngineKind,
    pub bedtools: PathBuf,
    pub bigwig_average: PathBuf,
    pub signal_region: SignalRegion,
    /// GTF attribute naming the gene of a feature.
    pub gene_id_tag: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            buckets: BucketScheme::default(),
            ignore_overlaps: true,
            threads: 1,
            timeout: None,
            confidence: DEFAULT_CONFIDENCE,
            delimiter: b',',
            engine: EngineKind::External,
            bedtools: PathBuf::from("bedtools"),
            bigwig_average: PathBuf::from("bigWigAverageOverBed"),
            signal_region: SignalRegion::Hit,
            gene_id_tag: "gene_id".to_string(),
        }
    }
}

impl Config {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the confidence level, rejecting values outside (0, 1).
    pub fn set_confidence(&mut self, ci: f64) -> Result<()> {
        if ci > 0.0 && ci < 1.0 {
            self.confidence = ci;
            Ok(())
        } else {
            Err(Error::Config(format!(
                "confidence level must lie strictly between 0 and 1, got {}",
                ci
            )))
        }
    }

    /// Set the per-call deadline in seconds (0 disables it).
    pub fn set_timeout_secs(&mut self, secs: u64) {
        self.timeout = if secs == 0 {
            None
        } else {
            Some(Duration::from_secs(secs))
        };
    }

    /// Set the output delimiter from a one-character string (`\t` accepted).
    pub fn set_delimiter(&mut self, delim: &str) -> Result<()> {
        let byte = match delim {
            "\\t" | "\t" | "tab" => b'\t',
            s if s.len() == 1 => s.as_bytes()[0],
            s => {
                return Err(Error::Config(format!(
                    "delimiter must be a single character, got '{}'",
                    s
                )))
            }
        };
        self.delimiter = byte;
        Ok(())
    }

    /// Resolve the thread count, replacing 0 with the number of CPUs.
    pub fn thread_count(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }
}

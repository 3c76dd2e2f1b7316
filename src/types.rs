//! Core data structures for proxmap.
//!
//! This module contains the interval records and sets that flow through
//! the resolvers, plus the small enums used to label and configure them.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Biological class an interval set belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupClass {
    TissueSpecific,
    Ubiquitous,
}

/// Error type for parsing a group class from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseGroupClassError(pub String);

impl fmt::Display for ParseGroupClassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid class '{}': expected 'Tissue-Specific' or 'Ubiquitous'",
            self.0
        )
    }
}

impl std::error::Error for ParseGroupClassError {}

impl FromStr for GroupClass {
    type Err = ParseGroupClassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tissue-specific" | "tissue_specific" | "ts" => Ok(GroupClass::TissueSpecific),
            "ubiquitous" | "ub" => Ok(GroupClass::Ubiquitous),
            _ => Err(ParseGroupClassError(s.to_string())),
        }
    }
}

impl GroupClass {
    /// Convert class to its canonical label.
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupClass::TissueSpecific => "Tissue-Specific",
            GroupClass::Ubiquitous => "Ubiquitous",
        }
    }
}

impl fmt::Display for GroupClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Layout of an annotation file, which decides where the matched
/// feature's coordinates sit in a combined closest-feature row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationSourceKind {
    Bed,
    Gtf,
}

/// Error type for parsing an annotation kind from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseAnnotationKindError;

impl fmt::Display for ParseAnnotationKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid annotation kind: expected 'bed' or 'gtf'")
    }
}

impl std::error::Error for ParseAnnotationKindError {}

impl FromStr for AnnotationSourceKind {
    type Err = ParseAnnotationKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bed" => Ok(AnnotationSourceKind::Bed),
            "gtf" => Ok(AnnotationSourceKind::Gtf),
            _ => Err(ParseAnnotationKindError),
        }
    }
}

impl AnnotationSourceKind {
    /// Infer the kind from a file extension (`.bed`, `.gtf`, either optionally gzipped).
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        let name = name.strip_suffix(".gz").unwrap_or(&name);
        if name.ends_with(".bed") {
            Some(AnnotationSourceKind::Bed)
        } else if name.ends_with(".gtf") {
            Some(AnnotationSourceKind::Gtf)
        } else {
            None
        }
    }

    /// Zero-based offsets of the start/end fields within the annotation's own columns.
    pub fn hit_columns(&self) -> (usize, usize) {
        match self {
            AnnotationSourceKind::Bed => (1, 2),
            AnnotationSourceKind::Gtf => (3, 4),
        }
    }
}

/// An annotation file together with its resolved layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationSource {
    pub path: PathBuf,
    pub kind: AnnotationSourceKind,
}

impl AnnotationSource {
    pub fn new(path: PathBuf, kind: AnnotationSourceKind) -> Self {
        AnnotationSource { path, kind }
    }

    /// Check the file exists and settle its kind once: an explicit kind
    /// wins, otherwise the extension decides.
    pub fn resolve(path: PathBuf, kind: Option<AnnotationSourceKind>) -> crate::error::Result<Self> {
        crate::error::Error::require_file("Annotation file", &path)?;
        let kind = match kind.or_else(|| AnnotationSourceKind::from_path(&path)) {
            Some(kind) => kind,
            None => {
                return Err(crate::error::Error::Config(format!(
                    "cannot tell whether {} is BED or GTF; pass --annot-kind",
                    path.display()
                )))
            }
        };
        Ok(AnnotationSource { path, kind })
    }

    /// Base file name, used to label output rows.
    pub fn label(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Coordinates of the matched annotation feature, as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub start: i64,
    pub end: i64,
    /// Gene identifier (GTF) or name column (BED) of the feature, when present.
    pub name: Option<String>,
}

/// Per-record signal summary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    Mean(f64),
    /// No track was configured, or the record has no region to query.
    NotApplicable,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Mean(v) => write!(f, "{}", v),
            Signal::NotApplicable => write!(f, "None"),
        }
    }
}

/// Distance reported when no feature could be paired with a record.
pub const NO_FEATURE: i64 = -1;

/// One positional record of an interval set.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalRecord {
    pub chrom: String,
    pub start: i64,
    pub end: i64,
    pub class: GroupClass,
    pub tissue: String,
    /// Per-base values, present for vectorized sources.
    pub vector: Option<Vec<f64>>,
    /// Index of this record among the data lines of its source file.
    pub ordinal: usize,
    pub hit: Option<Hit>,
    pub distance: Option<i64>,
    pub bucket: Option<usize>,
    pub signal: Option<Signal>,
    pub position_bin: Option<usize>,
}

impl IntervalRecord {
    /// Create an unresolved record.
    pub fn new(
        chrom: String,
        start: i64,
        end: i64,
        class: GroupClass,
        tissue: String,
        ordinal: usize,
    ) -> Self {
        IntervalRecord {
            chrom,
            start,
            end,
            class,
            tissue,
            vector: None,
            ordinal,
            hit: None,
            distance: None,
            bucket: None,
            signal: None,
            position_bin: None,
        }
    }

    /// Get the record length (end - start).
    pub fn length(&self) -> i64 {
        self.end - self.start
    }

    /// Attach a nearest-feature result. Distance and bucket are always set together.
    pub fn set_nearest(&mut self, hit: Option<Hit>, distance: i64, bucket: usize) {
        self.hit = hit;
        self.distance = Some(distance);
        self.bucket = Some(bucket);
    }

    /// True when a nearest feature was paired with this record.
    pub fn has_valid_distance(&self) -> bool {
        matches!(self.distance, Some(d) if d >= 0)
    }
}

/// Records from one source file sharing a class, tissue, and signal tracks.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalSet {
    pub path: PathBuf,
    pub class: GroupClass,
    pub tissue: String,
    pub tracks: Vec<PathBuf>,
    pub fasta: Option<PathBuf>,
    pub vectorized: bool,
    /// Number of tab-delimited fields per line of the source file.
    pub field_count: usize,
    pub records: Vec<IntervalRecord>,
}

impl IntervalSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

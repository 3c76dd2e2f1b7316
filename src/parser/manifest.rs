//! Manifest of BED descriptors.
//!
//! A manifest is a TOML file listing every interval file of a run with its
//! class, tissue, and optional signal tracks:
//!
//! ```toml
//! [defaults]
//! vectorized = false
//! tracks = ["genome.bw"]
//!
//! [[bed]]
//! path = "liver_ts.bed"
//! class = "Tissue-Specific"
//! tissue = "liver"
//! tracks = ["liver_rep1.bw", "liver_rep2.bw"]
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::GroupClass;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    #[serde(default)]
    defaults: RawDefaults,
    #[serde(default)]
    bed: Vec<RawEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDefaults {
    #[serde(default)]
    vectorized: bool,
    #[serde(default)]
    tracks: Vec<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEntry {
    path: PathBuf,
    class: String,
    tissue: String,
    fasta: Option<PathBuf>,
    #[serde(default)]
    tracks: Vec<PathBuf>,
    vectorized: Option<bool>,
}

/// One interval file of a run, validated and with absolute-ish paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BedDescriptor {
    pub path: PathBuf,
    pub class: GroupClass,
    pub tissue: String,
    pub fasta: Option<PathBuf>,
    pub tracks: Vec<PathBuf>,
    pub vectorized: bool,
}

/// Load and validate a manifest file.
///
/// Relative paths resolve against the manifest's directory. Every entry is
/// checked before returning, so a bad entry fails the run up front.
pub fn load_manifest(path: &Path) -> Result<Vec<BedDescriptor>> {
    Error::require_file("Manifest", path)?;
    let text = fs::read_to_string(path)?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    parse_manifest(&text, base)
}

/// Parse manifest text, resolving relative paths against `base`.
pub fn parse_manifest(text: &str, base: &Path) -> Result<Vec<BedDescriptor>> {
    let raw: RawManifest =
        toml::from_str(text).map_err(|e| Error::Config(format!("invalid manifest: {}", e)))?;

    if raw.bed.is_empty() {
        return Err(Error::Config("manifest lists no [[bed]] entries".to_string()));
    }

    let resolve = |p: &Path| -> PathBuf {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            base.join(p)
        }
    };
    let default_tracks: Vec<PathBuf> = raw.defaults.tracks.iter().map(|p| resolve(p)).collect();

    raw.bed
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let class = entry
                .class
                .parse::<GroupClass>()
                .map_err(|e| Error::Config(format!("bed entry {}: {}", i + 1, e)))?;
            if entry.tissue.trim().is_empty() {
                return Err(Error::Config(format!("bed entry {}: empty tissue", i + 1)));
            }

            let path = resolve(&entry.path);
            Error::require_file("BED file", &path)?;

            let tracks = if entry.tracks.is_empty() {
                default_tracks.clone()
            } else {
                entry.tracks.iter().map(|p| resolve(p)).collect()
            };

            Ok(BedDescriptor {
                path,
                class,
                tissue: entry.tissue,
                fasta: entry.fasta.as_deref().map(resolve),
                tracks,
                vectorized: entry.vectorized.unwrap_or(raw.defaults.vectorized),
            })
        })
        .collect()
}

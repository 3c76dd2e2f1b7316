//! Signal-averaging engines: mean value of a genome-wide track over a region.

use ahash::AHashMap;
use log::debug;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::engine::process::run_tool;
use crate::error::{Error, Result};
use crate::parser::util::{is_meta_line, open_reader};

/// Mean of a numeric track over `[start, end)` of `chrom`.
pub trait SignalEngine: Send + Sync {
    fn mean_over(&self, chrom: &str, start: i64, end: i64, track: &Path) -> Result<f64>;
}

/// `bigWigAverageOverBed <track> stdin stdout`, one region per call.
#[derive(Debug, Clone)]
pub struct BigWigAverage {
    pub binary: PathBuf,
    pub timeout: Option<Duration>,
}

impl SignalEngine for BigWigAverage {
    fn mean_over(&self, chrom: &str, start: i64, end: i64, track: &Path) -> Result<f64> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(track).arg("stdin").arg("stdout");
        let input = format!("{}\t{}\t{}\t1\n", chrom, start, end).into_bytes();

        let out = run_tool("bigWigAverageOverBed", cmd, Some(input), self.timeout)?;
        parse_average_line(&String::from_utf8_lossy(&out))
    }
}

/// The mean is the last tab-delimited field of the tool's single output line.
fn parse_average_line(out: &str) -> Result<f64> {
    let last = out.trim().rsplit('\t').next().unwrap_or("");
    last.parse::<f64>().map_err(|_| Error::Engine {
        tool: "bigWigAverageOverBed",
        message: format!("unexpected output '{}'", out.trim()),
    })
}

/// Segments of one chromosome, sorted by start: `(start, end, value)`.
type Segments = Vec<(i64, i64, f64)>;

/// A bedGraph track held in memory.
#[derive(Debug, Default)]
pub struct BedGraphTrack {
    by_chrom: AHashMap<String, Segments>,
}

impl BedGraphTrack {
    pub fn load(path: &Path) -> Result<Self> {
        let reader = open_reader(path, "Signal track")?;
        let mut by_chrom: AHashMap<String, Segments> = AHashMap::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim_end();
            if is_meta_line(line) {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            let parsed = match fields.as_slice() {
                [chrom, start, end, value, ..] => start
                    .parse::<i64>()
                    .ok()
                    .zip(end.parse::<i64>().ok())
                    .zip(value.parse::<f64>().ok())
                    .map(|((s, e), v)| (*chrom, s, e, v)),
                _ => None,
            };
            let (chrom, start, end, value) = parsed.ok_or_else(|| Error::InputFormat {
                path: path.to_path_buf(),
                line: idx + 1,
                message: "expected 'chrom start end value'".to_string(),
            })?;
            by_chrom
                .entry(chrom.to_string())
                .or_default()
                .push((start, end, value));
        }

        for segments in by_chrom.values_mut() {
            segments.sort_by_key(|s| s.0);
        }
        Ok(BedGraphTrack { by_chrom })
    }

    /// Mean over `[start, end)`, counting uncovered bases as zero.
    pub fn mean_over(&self, chrom: &str, start: i64, end: i64) -> f64 {
        if end <= start {
            return 0.0;
        }
        let Some(segments) = self.by_chrom.get(chrom) else {
            return 0.0;
        };

        let first = segments.partition_point(|s| s.1 <= start);
        let sum: f64 = segments[first..]
            .iter()
            .take_while(|s| s.0 < end)
            .map(|&(s, e, v)| {
                let overlap = e.min(end) - s.max(start);
                if overlap > 0 {
                    overlap as f64 * v
                } else {
                    0.0
                }
            })
            .sum();
        sum / (end - start) as f64
    }
}

/// In-process averaging over bedGraph tracks; each track is read once.
#[derive(Debug, Default)]
pub struct BedGraphAverage {
    cache: Mutex<AHashMap<PathBuf, Arc<BedGraphTrack>>>,
}

impl BedGraphAverage {
    pub fn new() -> Self {
        Self::default()
    }

    fn track(&self, path: &Path) -> Result<Arc<BedGraphTrack>> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(track) = cache.get(path) {
            return Ok(Arc::clone(track));
        }
        debug!("Loading bedGraph track {}", path.display());
        let track = Arc::new(BedGraphTrack::load(path)?);
        cache.insert(path.to_path_buf(), Arc::clone(&track));
        Ok(track)
    }
}

impl SignalEngine for BedGraphAverage {
    fn mean_over(&self, chrom: &str, start: i64, end: i64, track: &Path) -> Result<f64> {
        Ok(self.track(track)?.mean_over(chrom, start, end))
    }
}

//! Nearest-feature engines.
//!
//! Both engines produce the same row format: the query line's fields, the
//! matched annotation line's fields, then the unsigned distance. A query on a
//! chromosome without annotations gets placeholder annotation fields and a
//! distance of -1.

use ahash::AHashMap;
use log::debug;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::engine::process::run_tool;
use crate::error::Result;
use crate::parser::gtf::parse_gtf;
use crate::parser::util::{is_meta_line, open_reader};
use crate::types::{AnnotationSource, AnnotationSourceKind, NO_FEATURE};

/// Answers "closest non-overlapping feature, first on ties" for a whole file.
pub trait GeometryEngine: Send + Sync {
    /// Return one combined row per data line of `query`, in file order.
    fn closest(&self, query: &Path, annotation: &AnnotationSource) -> Result<Vec<String>>;
}

/// `bedtools closest -io -d -t first`.
#[derive(Debug, Clone)]
pub struct BedtoolsClosest {
    pub binary: PathBuf,
    pub ignore_overlaps: bool,
    pub timeout: Option<Duration>,
}

impl GeometryEngine for BedtoolsClosest {
    fn closest(&self, query: &Path, annotation: &AnnotationSource) -> Result<Vec<String>> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("closest");
        if self.ignore_overlaps {
            cmd.arg("-io");
        }
        cmd.args(["-d", "-t", "first", "-a"])
            .arg(query)
            .arg("-b")
            .arg(&annotation.path);

        let out = run_tool("bedtools closest", cmd, None, self.timeout)?;
        Ok(String::from_utf8_lossy(&out)
            .lines()
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// An annotation feature in 0-based half-open coordinates.
#[derive(Debug, Clone)]
struct Feature {
    start: i64,
    end: i64,
    /// Position in the annotation file; lower wins ties.
    order: usize,
    raw: String,
}

/// Features of one chromosome, sorted by start, with an index sorted by end.
#[derive(Debug, Default)]
struct ChromFeatures {
    features: Vec<Feature>,
    by_end: Vec<usize>,
}

impl ChromFeatures {
    fn finish(&mut self) {
        self.features.sort_by_key(|f| (f.start, f.order));
        let mut by_end: Vec<usize> = (0..self.features.len()).collect();
        by_end.sort_by_key(|&i| (self.features[i].end, self.features[i].order));
        self.by_end = by_end;
    }

    /// Closest feature to `[start, end)` and its bedtools-style distance.
    fn nearest(&self, start: i64, end: i64, ignore_overlaps: bool) -> Option<(&Feature, i64)> {
        let mut best: Option<(&Feature, i64)> = None;

        // Features starting at or after the query end lie downstream
        let first_down = self.features.partition_point(|f| f.start < end);

        if !ignore_overlaps {
            for f in &self.features[..first_down] {
                if f.end > start {
                    pick(&mut best, f, 0);
                }
            }
            if best.is_some() {
                return best;
            }
        }

        if let Some(first) = self.features.get(first_down) {
            for f in self.features[first_down..]
                .iter()
                .take_while(|f| f.start == first.start)
            {
                pick(&mut best, f, f.start - end + 1);
            }
        }

        // Features ending at or before the query start lie upstream
        let upstream = self.by_end.partition_point(|&i| self.features[i].end <= start);
        if upstream > 0 {
            let last_end = self.features[self.by_end[upstream - 1]].end;
            for &i in self.by_end[..upstream].iter().rev() {
                let f = &self.features[i];
                if f.end != last_end {
                    break;
                }
                pick(&mut best, f, start - f.end + 1);
            }
        }

        best
    }
}

/// Keep `f` if it is closer than the current best, or as close but earlier in the file.
fn pick<'a>(best: &mut Option<(&'a Feature, i64)>, f: &'a Feature, d: i64) {
    let better = match best {
        None => true,
        Some((b, bd)) => d < *bd || (d == *bd && f.order < b.order),
    };
    if better {
        *best = Some((f, d));
    }
}

/// In-process nearest-feature search over a BED or GTF annotation.
#[derive(Debug, Clone)]
pub struct NativeClosest {
    pub ignore_overlaps: bool,
    pub gene_id_tag: String,
}

impl NativeClosest {
    fn load(&self, annotation: &AnnotationSource) -> Result<(AHashMap<String, ChromFeatures>, usize)> {
        let mut by_chrom: AHashMap<String, ChromFeatures> = AHashMap::new();
        let mut field_count = 0;

        match annotation.kind {
            AnnotationSourceKind::Gtf => {
                field_count = 9;
                for (order, f) in parse_gtf(&annotation.path, &self.gene_id_tag)?
                    .into_iter()
                    .enumerate()
                {
                    by_chrom.entry(f.chrom).or_default().features.push(Feature {
                        start: f.start - 1,
                        end: f.end,
                        order,
                        raw: f.fields.join("\t"),
                    });
                }
            }
            AnnotationSourceKind::Bed => {
                let reader = open_reader(&annotation.path, "Annotation file")?;
                let mut order = 0;
                for line in reader.lines() {
                    let line = line?;
                    let line = line.trim_end();
                    if is_meta_line(line) {
                        continue;
                    }
                    let Some((chrom, start, end)) = split_interval(line) else {
                        continue;
                    };
                    if field_count == 0 {
                        field_count = line.split('\t').count();
                    }
                    by_chrom.entry(chrom.to_string()).or_default().features.push(Feature {
                        start,
                        end,
                        order,
                        raw: line.to_string(),
                    });
                    order += 1;
                }
            }
        }

        for chrom in by_chrom.values_mut() {
            chrom.finish();
        }
        Ok((by_chrom, field_count))
    }
}

impl GeometryEngine for NativeClosest {
    fn closest(&self, query: &Path, annotation: &AnnotationSource) -> Result<Vec<String>> {
        let (by_chrom, field_count) = self.load(annotation)?;
        debug!(
            "Loaded {} annotation chromosomes from {}",
            by_chrom.len(),
            annotation.path.display()
        );
        let missing = placeholder(annotation.kind, field_count);

        let reader = open_reader(query, "BED file")?;
        let mut rows = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let line = line.trim_end();
            if is_meta_line(line) {
                continue;
            }
            let Some((chrom, start, end)) = split_interval(line) else {
                continue;
            };

            let hit = by_chrom
                .get(chrom)
                .and_then(|c| c.nearest(start, end, self.ignore_overlaps));
            let row = match hit {
                Some((f, d)) => format!("{}\t{}\t{}", line, f.raw, d),
                None => format!("{}\t{}\t{}", line, missing, NO_FEATURE),
            };
            rows.push(row);
        }
        Ok(rows)
    }
}

/// Chromosome, start, and end of a tab-delimited interval line.
fn split_interval(line: &str) -> Option<(&str, i64, i64)> {
    let mut fields = line.split('\t');
    let chrom = fields.next()?;
    let start = fields.next()?.parse().ok()?;
    let end = fields.next()?.parse().ok()?;
    Some((chrom, start, end))
}

/// Annotation fields written when no feature could be paired.
fn placeholder(kind: AnnotationSourceKind, field_count: usize) -> String {
    let (start_col, end_col) = kind.hit_columns();
    let n = field_count.max(end_col + 1);
    (0..n)
        .map(|i| if i == start_col || i == end_col { "-1" } else { "." })
        .collect::<Vec<_>>()
        .join("\t")
}

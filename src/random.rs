//! Random interval sets for background proximity.
//!
//! A random set mirrors a template set: same number of intervals, lengths
//! resampled from the template, positions uniform over a genome whose
//! sequences are weighted by size. Output is reproducible for a given seed.

use indexmap::IndexMap;
use log::info;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::IntervalSet;

/// Seed used when the caller does not pick one.
pub const DEFAULT_SEED: u64 = 42;

/// Sequences eligible for placement, with cumulative sizes for weighted sampling.
struct GenomeModel<'a> {
    names: Vec<&'a str>,
    sizes: Vec<i64>,
    cumulative: Vec<i64>,
    total: i64,
}

impl<'a> GenomeModel<'a> {
    /// Keep sequences that can hold an interval of `min_size` bp.
    fn new(lengths: &'a IndexMap<String, i64>, min_size: i64) -> Option<Self> {
        let mut names = Vec::new();
        let mut sizes = Vec::new();
        let mut cumulative = Vec::new();
        let mut total = 0;
        for (name, size) in lengths {
            if *size >= min_size {
                total += size;
                names.push(name.as_str());
                sizes.push(*size);
                cumulative.push(total);
            }
        }
        if names.is_empty() {
            return None;
        }
        Some(GenomeModel {
            names,
            sizes,
            cumulative,
            total,
        })
    }

    /// Sample a sequence weighted by size.
    fn sample(&self, rng: &mut SmallRng) -> usize {
        let target = rng.gen_range(0..self.total);
        self.cumulative.partition_point(|&x| x <= target)
    }
}

/// One generated interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomInterval {
    pub chrom: String,
    pub start: i64,
    pub end: i64,
}

/// Generate intervals mirroring `template`, sorted by sequence order then start.
pub fn random_intervals(
    template: &IntervalSet,
    genome: &IndexMap<String, i64>,
    seed: u64,
) -> Result<Vec<RandomInterval>> {
    let lengths: Vec<i64> = template.records.iter().map(|r| r.length()).collect();
    let longest = lengths
        .iter()
        .copied()
        .max()
        .ok_or_else(|| {
            Error::Config(format!(
                "cannot randomize {}: it has no records",
                template.path.display()
            ))
        })?;
    let model = GenomeModel::new(genome, longest).ok_or_else(|| {
        Error::Config(format!(
            "no sequence is long enough for a {} bp interval",
            longest
        ))
    })?;

    let mut rng = SmallRng::seed_from_u64(seed);
    let mut placed: Vec<(usize, i64, i64)> = (0..lengths.len())
        .map(|_| {
            let len = lengths[rng.gen_range(0..lengths.len())];
            let idx = model.sample(&mut rng);
            let start = rng.gen_range(0..=model.sizes[idx] - len);
            (idx, start, start + len)
        })
        .collect();
    placed.sort_unstable();

    Ok(placed
        .into_iter()
        .map(|(idx, start, end)| RandomInterval {
            chrom: model.names[idx].to_string(),
            start,
            end,
        })
        .collect())
}

/// Write a random set mirroring `template` as a three-column BED file.
pub fn write_random_bed(
    template: &IntervalSet,
    genome: &IndexMap<String, i64>,
    seed: u64,
    path: &Path,
) -> Result<usize> {
    let intervals = random_intervals(template, genome, seed)?;
    let mut writer = BufWriter::new(File::create(path)?);
    for iv in &intervals {
        writeln!(writer, "{}\t{}\t{}", iv.chrom, iv.start, iv.end)?;
    }
    writer.flush()?;
    info!(
        "Wrote {} random intervals (seed {}) to {}",
        intervals.len(),
        seed,
        path.display()
    );
    Ok(intervals.len())
}

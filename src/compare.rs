//! Distribution comparison over a vectorized corpus.
//!
//! Two modes: per-position confidence intervals within each
//! (tissue, class, length) group, and a Wilcoxon rank-sum test between the
//! pooled values of the two classes for every pair of corpus lengths in each tissue.

use indexmap::IndexMap;
use std::collections::BTreeSet;
use log::debug;
use statrs::distribution::{ContinuousCDF, Normal};

use crate::corpus::Corpus;
use crate::output::TableRow;
use crate::parser::bed::VECTOR_LENGTH_STEP;
use crate::types::{GroupClass, IntervalRecord};

/// Percentile of sorted data, interpolating linearly between closest ranks.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let idx = (p / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = idx.floor() as usize;
            let hi = idx.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (idx - lo as f64)
        }
    }
}

/// Mean and two-sided percentile interval `(mean, upper, lower)` at level `ci`.
pub fn confidence_interval(values: &[f64], ci: f64) -> (f64, f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN, f64::NAN);
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let lower_pct = 100.0 * (1.0 - ci) / 2.0;
    let upper_pct = 100.0 * ci + lower_pct;
    (
        mean,
        percentile(&sorted, upper_pct),
        percentile(&sorted, lower_pct),
    )
}

/// Per-position estimate for one (tissue, class, length) group.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalEstimate {
    pub tissue: String,
    pub class: GroupClass,
    pub length: i64,
    /// 1-based position within the vector.
    pub index: usize,
    pub mean: f64,
    pub upper: f64,
    pub lower: f64,
}

impl TableRow for IntervalEstimate {
    fn header() -> &'static [&'static str] {
        &["Tissue", "Class", "Length", "Index", "Mu", "Upr", "Lwr"]
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.tissue.clone(),
            self.class.to_string(),
            self.length.to_string(),
            self.index.to_string(),
            self.mean.to_string(),
            self.upper.to_string(),
            self.lower.to_string(),
        ]
    }
}

/// Confidence intervals for every vector position of every group.
///
/// Groups are ordered by tissue (first appearance), then length, then class.
/// Records without a vector are ignored.
pub fn interval_estimates(corpus: &Corpus, ci: f64) -> Vec<IntervalEstimate> {
    let tissues = corpus.tissues();
    let mut groups: IndexMap<(usize, i64, GroupClass), Vec<&[f64]>> = IndexMap::new();
    for record in corpus.records() {
        if let (Some(vector), Some(t)) = (&record.vector, tissues.get_index_of(record.tissue.as_str())) {
            groups
                .entry((t, record.length(), record.class))
                .or_default()
                .push(vector.as_slice());
        }
    }
    groups.sort_keys();

    let mut rows = Vec::new();
    for ((t, length, class), vectors) in &groups {
        let width = vectors.iter().map(|v| v.len()).min().unwrap_or(0);
        debug!(
            "Estimating {} positions over {} records ({}, {}, {})",
            width,
            vectors.len(),
            tissues[*t],
            class,
            length
        );
        for j in 0..width {
            let column: Vec<f64> = vectors.iter().map(|v| v[j]).collect();
            let (mean, upper, lower) = confidence_interval(&column, ci);
            rows.push(IntervalEstimate {
                tissue: tissues[*t].to_string(),
                class: *class,
                length: *length,
                index: j + 1,
                mean,
                upper,
                lower,
            });
        }
    }
    rows
}

/// Smallest p-value ever reported.
pub const MIN_P_VALUE: f64 = 5e-324;

/// Two-sided Wilcoxon rank-sum test, normal approximation.
///
/// An undefined statistic (e.g. an empty sample) reports 1.0 and a zero
/// p-value is floored to [`MIN_P_VALUE`], so the result is always in (0, 1].
pub fn wilcox_test(x: &[f64], y: &[f64]) -> f64 {
    let p = rank_sum_p_value(x, y);
    if p.is_nan() {
        1.0
    } else if p == 0.0 {
        MIN_P_VALUE
    } else {
        p.min(1.0)
    }
}

fn rank_sum_p_value(x: &[f64], y: &[f64]) -> f64 {
    let (n1, n2) = (x.len() as f64, y.len() as f64);
    if x.is_empty() || y.is_empty() {
        return f64::NAN;
    }

    // (value, from x)
    let mut pooled: Vec<(f64, bool)> = x
        .iter()
        .map(|v| (*v, true))
        .chain(y.iter().map(|v| (*v, false)))
        .collect();
    pooled.sort_by(|a, b| a.0.total_cmp(&b.0));

    // Ties share the average of their ranks
    let mut rank_sum_x = 0.0;
    let mut i = 0;
    while i < pooled.len() {
        let mut j = i;
        while j + 1 < pooled.len() && pooled[j + 1].0 == pooled[i].0 {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        rank_sum_x += avg_rank * pooled[i..=j].iter().filter(|(_, in_x)| *in_x).count() as f64;
        i = j + 1;
    }

    let expected = n1 * (n1 + n2 + 1.0) / 2.0;
    let sd = (n1 * n2 * (n1 + n2 + 1.0) / 12.0).sqrt();
    let z = (rank_sum_x - expected) / sd;

    match Normal::new(0.0, 1.0) {
        Ok(normal) => 2.0 * normal.sf(z.abs()),
        Err(_) => f64::NAN,
    }
}

/// Significance of one Tissue-Specific length against one Ubiquitous length.
#[derive(Debug, Clone, PartialEq)]
pub struct Significance {
    pub tissue: String,
    pub ts_length: i64,
    pub ub_length: i64,
    pub p_value: f64,
}

impl TableRow for Significance {
    fn header() -> &'static [&'static str] {
        &["Tissue", "Tissue_Specific", "Ubiquitous", "PValue"]
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.tissue.clone(),
            self.ts_length.to_string(),
            self.ub_length.to_string(),
            self.p_value.to_string(),
        ]
    }
}

/// Pooled vector values per length, ascending by length.
fn pooled_by_length<'a, I>(records: I) -> IndexMap<i64, Vec<f64>>
where
    I: Iterator<Item = &'a IntervalRecord>,
{
    let mut pooled: IndexMap<i64, Vec<f64>> = IndexMap::new();
    for record in records {
        let length = record.length();
        if length % VECTOR_LENGTH_STEP != 0 {
            continue;
        }
        if let Some(vector) = &record.vector {
            pooled.entry(length).or_default().extend_from_slice(vector);
        }
    }
    pooled.sort_keys();
    pooled
}

/// Rank-sum p-values for every (tissue, TS length, UB length) combination.
///
/// Lengths come from the whole corpus, so a tissue lacking one side still gets
/// its rows; an empty pool tests as p = 1.0.
pub fn significance(corpus: &Corpus) -> Vec<Significance> {
    let lengths: BTreeSet<i64> = pooled_by_length(corpus.records().iter())
        .into_keys()
        .collect();
    let empty: Vec<f64> = Vec::new();

    let mut rows = Vec::new();
    for tissue in corpus.tissues() {
        let ts = pooled_by_length(
            corpus
                .by_tissue(tissue)
                .filter(|r| r.class == GroupClass::TissueSpecific),
        );
        let ub = pooled_by_length(
            corpus
                .by_tissue(tissue)
                .filter(|r| r.class == GroupClass::Ubiquitous),
        );
        for ts_length in &lengths {
            let ts_values = ts.get(ts_length).unwrap_or(&empty);
            for ub_length in &lengths {
                let ub_values = ub.get(ub_length).unwrap_or(&empty);
                rows.push(Significance {
                    tissue: tissue.to_string(),
                    ts_length: *ts_length,
                    ub_length: *ub_length,
                    p_value: wilcox_test(ts_values, ub_values),
                });
            }
        }
    }
    rows
}

//! Fixed-partition bucketing of distances and positions.
//!
//! Every call site that compares populations by bucket must share one
//! [`BucketScheme`], so indices line up across interval sets.

use crate::types::IntervalSet;

/// Width of one distance bucket in bp.
pub const DEFAULT_BUCKET_WIDTH: i64 = 10_000;

/// Upper limit (exclusive) of the last distance boundary in bp.
pub const DEFAULT_BUCKET_SPAN: i64 = 200_000;

/// Ascending boundaries searched with leftmost-insertion semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketScheme {
    boundaries: Vec<i64>,
}

impl Default for BucketScheme {
    /// Boundaries 0, 10 000, ..., 190 000 (values above 190 000 land in bucket 20).
    fn default() -> Self {
        BucketScheme::uniform(0, DEFAULT_BUCKET_SPAN, DEFAULT_BUCKET_WIDTH)
    }
}

impl BucketScheme {
    /// Boundaries `start, start + step, ...` strictly below `stop`.
    ///
    /// A non-positive `step` yields a scheme with the single boundary `start`.
    pub fn uniform(start: i64, stop: i64, step: i64) -> Self {
        if step <= 0 {
            return BucketScheme {
                boundaries: vec![start],
            };
        }
        let boundaries = (0..)
            .map(|i| start + i * step)
            .take_while(|b| *b < stop)
            .collect();
        BucketScheme { boundaries }
    }

    /// Boundaries `start + step, start + 2*step, ...` strictly below `stop`.
    ///
    /// Used for positional binning, where the first edge of the range is
    /// not a boundary of its own.
    pub fn positional(start: i64, stop: i64, step: i64) -> Self {
        let mut scheme = BucketScheme::uniform(start, stop, step);
        if !scheme.boundaries.is_empty() {
            scheme.boundaries.remove(0);
        }
        scheme
    }

    /// Build from explicit boundaries, which are sorted and deduplicated.
    pub fn from_boundaries(mut boundaries: Vec<i64>) -> Self {
        boundaries.sort_unstable();
        boundaries.dedup();
        BucketScheme { boundaries }
    }

    pub fn boundaries(&self) -> &[i64] {
        &self.boundaries
    }

    /// Number of distinct indices [`bucket`](Self::bucket) can return.
    pub fn bucket_count(&self) -> usize {
        self.boundaries.len() + 1
    }

    /// Leftmost insertion point of `value`: a value equal to a boundary
    /// maps to that boundary's index.
    pub fn bucket(&self, value: i64) -> usize {
        self.boundaries.partition_point(|b| *b < value)
    }

    /// Record the bin of every record's start position.
    pub fn bin_positions(&self, sets: &mut [IntervalSet]) {
        for record in sets.iter_mut().flat_map(|s| s.records.iter_mut()) {
            record.position_bin = Some(self.bucket(record.start));
        }
    }
}

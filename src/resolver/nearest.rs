//! Attach each record's nearest annotated feature, distance, and bucket.
//!
//! The geometry engine returns rows that concatenate the query line's fields
//! with the matched annotation line's fields, followed by the distance. The
//! query side's field count (taken from the set's source file) locates where
//! the annotation side begins.

use log::info;
use rayon::prelude::*;

use crate::bucket::BucketScheme;
use crate::engine::GeometryEngine;
use crate::error::{Error, Result};
use crate::parser::gtf::extract_attribute;
use crate::types::{AnnotationSource, AnnotationSourceKind, Hit, IntervalRecord, IntervalSet};

const TOOL: &str = "closest-feature engine";

/// Resolves nearest features for whole interval sets.
pub struct NearestFeatureResolver<'a> {
    engine: &'a dyn GeometryEngine,
    buckets: &'a BucketScheme,
    gene_id_tag: &'a str,
}

impl<'a> NearestFeatureResolver<'a> {
    pub fn new(engine: &'a dyn GeometryEngine, buckets: &'a BucketScheme, gene_id_tag: &'a str) -> Self {
        NearestFeatureResolver {
            engine,
            buckets,
            gene_id_tag,
        }
    }

    /// Resolve one set in place. On error the set is left untouched.
    pub fn resolve(&self, set: &mut IntervalSet, source: &AnnotationSource) -> Result<()> {
        info!(
            "Mapping {} ({} records) onto {}",
            set.path.display(),
            set.len(),
            source.label()
        );
        let rows = self.engine.closest(&set.path, source)?;

        let resolved = set
            .records
            .iter()
            .map(|record| {
                let row = rows.get(record.ordinal).ok_or_else(|| Error::Engine {
                    tool: TOOL,
                    message: format!(
                        "returned {} rows for {}, missing row {}",
                        rows.len(),
                        set.path.display(),
                        record.ordinal + 1
                    ),
                })?;
                parse_row(row, record, set.field_count, source.kind, self.gene_id_tag)
            })
            .collect::<Result<Vec<_>>>()?;

        for (record, (hit, distance)) in set.records.iter_mut().zip(resolved) {
            let bucket = self.buckets.bucket(distance);
            record.set_nearest(hit, distance, bucket);
        }
        Ok(())
    }

    /// Resolve independent sets in parallel on the current rayon pool.
    ///
    /// The first failure is returned; no set is emitted on failure.
    pub fn resolve_all(&self, sets: &mut [IntervalSet], source: &AnnotationSource) -> Result<()> {
        sets.par_iter_mut().try_for_each(|set| self.resolve(set, source))
    }
}

/// Extract hit and distance from one combined row.
///
/// Negative distances mark records with no pairable feature; they carry no hit.
fn parse_row(
    row: &str,
    record: &IntervalRecord,
    query_fields: usize,
    kind: AnnotationSourceKind,
    gene_id_tag: &str,
) -> Result<(Option<Hit>, i64)> {
    let malformed = |why: &str| Error::Engine {
        tool: TOOL,
        message: format!("{} in row '{}'", why, row),
    };

    let fields: Vec<&str> = row.split('\t').collect();
    let (start_col, end_col) = kind.hit_columns();
    if fields.len() < query_fields + end_col + 2 {
        return Err(malformed("too few fields"));
    }

    if fields[0] != record.chrom
        || fields[1].parse::<i64>().ok() != Some(record.start)
        || fields[2].parse::<i64>().ok() != Some(record.end)
    {
        return Err(malformed("query fields do not match the record"));
    }

    let distance: i64 = fields[fields.len() - 1]
        .parse()
        .map_err(|_| malformed("non-integer distance"))?;
    if distance < 0 {
        return Ok((None, distance));
    }

    let annotation = &fields[query_fields..fields.len() - 1];
    let start: i64 = annotation[start_col]
        .parse()
        .map_err(|_| malformed("non-integer feature start"))?;
    let end: i64 = annotation[end_col]
        .parse()
        .map_err(|_| malformed("non-integer feature end"))?;
    if start > end {
        return Err(malformed("feature start after feature end"));
    }

    let name = match kind {
        AnnotationSourceKind::Gtf => Some(
            annotation
                .get(8)
                .and_then(|attrs| extract_attribute(attrs, gene_id_tag))
                .ok_or_else(|| malformed(&format!("missing {} attribute", gene_id_tag)))?,
        ),
        AnnotationSourceKind::Bed => annotation
            .get(3)
            .filter(|n| !n.is_empty() && **n != ".")
            .map(|n| n.to_string()),
    };

    Ok((Some(Hit { start, end, name }), distance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GroupClass;
    use std::path::{Path, PathBuf};

    struct FailingEngine;

    impl GeometryEngine for FailingEngine {
        fn closest(&self, _: &Path, _: &AnnotationSource) -> Result<Vec<String>> {
            Err(Error::Engine {
                tool: "test",
                message: "boom".to_string(),
            })
        }
    }

    /// Answers only the first query line.
    struct TruncatingEngine;

    impl GeometryEngine for TruncatingEngine {
        fn closest(&self, _: &Path, _: &AnnotationSource) -> Result<Vec<String>> {
            Ok(vec!["chr1\t100\t200\tchr1\t500\t600\t301".to_string()])
        }
    }

    fn two_record_set() -> IntervalSet {
        let mut second = record(1000, 1100);
        second.ordinal = 1;
        IntervalSet {
            path: PathBuf::from("peaks.bed"),
            class: GroupClass::Ubiquitous,
            tissue: "liver".to_string(),
            tracks: vec![],
            fasta: None,
            vectorized: false,
            field_count: 3,
            records: vec![record(100, 200), second],
        }
    }

    fn assert_unresolved(set: &IntervalSet) {
        assert!(set
            .records
            .iter()
            .all(|r| r.distance.is_none() && r.bucket.is_none() && r.hit.is_none()));
    }

    fn record(start: i64, end: i64) -> IntervalRecord {
        IntervalRecord::new(
            "chr1".to_string(),
            start,
            end,
            GroupClass::Ubiquitous,
            "liver".to_string(),
            0,
        )
    }

    #[test]
    fn test_parse_gtf_row() {
        let row = "chr1\t100\t200\tchr1\tsrc\tgene\t300\t350\t.\t+\t.\tgene_id \"g1\";\t100";
        let (hit, d) = parse_row(row, &record(100, 200), 3, AnnotationSourceKind::Gtf, "gene_id").unwrap();
        let hit = hit.unwrap();
        assert_eq!(d, 100);
        assert_eq!((hit.start, hit.end), (300, 350));
        assert_eq!(hit.name.as_deref(), Some("g1"));
    }

    #[test]
    fn test_parse_bed_row_uses_query_field_count() {
        // Query has 4 fields, so the annotation starts at column 5
        let row = "chr1\t100\t200\tpeak\tchr1\t500\t600\tgeneB\t301";
        let (hit, d) = parse_row(row, &record(100, 200), 4, AnnotationSourceKind::Bed, "gene_id").unwrap();
        let hit = hit.unwrap();
        assert_eq!(d, 301);
        assert_eq!((hit.start, hit.end), (500, 600));
        assert_eq!(hit.name.as_deref(), Some("geneB"));
    }

    #[test]
    fn test_parse_row_sentinel() {
        let row = "chr1\t100\t200\t.\t-1\t-1\t-1";
        let (hit, d) = parse_row(row, &record(100, 200), 3, AnnotationSourceKind::Bed, "gene_id").unwrap();
        assert!(hit.is_none());
        assert_eq!(d, -1);
    }

    #[test]
    fn test_parse_row_mismatched_record() {
        let row = "chr1\t100\t250\tchr1\t500\t600\t251";
        let err = parse_row(row, &record(100, 200), 3, AnnotationSourceKind::Bed, "gene_id")
            .err()
            .unwrap();
        assert!(err.to_string().contains("do not match"));
    }

    #[test]
    fn test_parse_row_bad_distance() {
        let row = "chr1\t100\t200\tchr1\t500\t600\tfar";
        assert!(parse_row(row, &record(100, 200), 3, AnnotationSourceKind::Bed, "gene_id").is_err());
    }

    #[test]
    fn test_parse_row_too_short() {
        let row = "chr1\t100\t200\t5";
        assert!(parse_row(row, &record(100, 200), 3, AnnotationSourceKind::Gtf, "gene_id").is_err());
    }

    #[test]
    fn test_parse_gtf_row_requires_gene_id() {
        let row = "chr1\t100\t200\tchr1\tsrc\tgene\t300\t350\t.\t+\t.\tgene_name \"G1\";\t100";
        let err = parse_row(row, &record(100, 200), 3, AnnotationSourceKind::Gtf, "gene_id")
            .err()
            .unwrap();
        assert!(matches!(err, Error::Engine { .. }));
        assert!(err.to_string().contains("missing gene_id attribute"));
    }

    #[test]
    fn test_engine_failure_leaves_sets_untouched() {
        let buckets = BucketScheme::default();
        let source = AnnotationSource::new(PathBuf::from("genes.bed"), AnnotationSourceKind::Bed);
        let resolver = NearestFeatureResolver::new(&FailingEngine, &buckets, "gene_id");

        let mut set = two_record_set();
        let err = resolver.resolve(&mut set, &source).err().unwrap();
        assert!(matches!(err, Error::Engine { .. }));
        assert_unresolved(&set);

        let mut sets = vec![two_record_set(), two_record_set()];
        let err = resolver.resolve_all(&mut sets, &source).err().unwrap();
        assert!(matches!(err, Error::Engine { .. }));
        sets.iter().for_each(assert_unresolved);
    }

    #[test]
    fn test_missing_rows_leave_set_untouched() {
        let buckets = BucketScheme::default();
        let source = AnnotationSource::new(PathBuf::from("genes.bed"), AnnotationSourceKind::Bed);
        let resolver = NearestFeatureResolver::new(&TruncatingEngine, &buckets, "gene_id");

        let mut set = two_record_set();
        let err = resolver.resolve(&mut set, &source).err().unwrap();
        assert!(matches!(err, Error::Engine { .. }));
        assert!(err.to_string().contains("missing row 2"));
        assert_unresolved(&set);

        let mut sets = vec![two_record_set()];
        assert!(matches!(
            resolver.resolve_all(&mut sets, &source),
            Err(Error::Engine { .. })
        ));
        assert_unresolved(&sets[0]);
    }
}

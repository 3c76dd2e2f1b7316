//! End-to-end tests of the library pipeline with the in-process engines.
//!
//! Every fixture is written to a temporary directory, so the tests run
//! without bedtools or bigWigAverageOverBed installed.

use std::fs;
use std::path::{Path, PathBuf};

use proxmap::compare::{interval_estimates, significance, wilcox_test};
use proxmap::config::{Config, EngineKind, SignalRegion};
use proxmap::corpus::{assemble, load_corpus, load_sets};
use proxmap::engine::{geometry_engine, signal_engine};
use proxmap::parser::load_manifest;
use proxmap::resolver::{NearestFeatureResolver, SignalResolver};
use proxmap::types::{AnnotationSource, GroupClass, IntervalSet, Signal};
use proxmap::{BucketScheme, Error};

// -------------------------------------------------------------------------
// Helper functions
// -------------------------------------------------------------------------

fn native_config() -> Config {
    let mut config = Config::new();
    config.engine = EngineKind::Native;
    config
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn vector_line(chrom: &str, start: i64, len: usize, value: f64) -> String {
    format!(
        "{}\t{}\t{}\t{}\n",
        chrom,
        start,
        start + len as i64,
        vec![value.to_string(); len].join(",")
    )
}

/// Scenario A fixture: one gene at GTF 300-350 and a set with one record on
/// each side of the distance range plus one on an unannotated chromosome.
fn scenario_a(dir: &Path, manifest_extra: &str) -> (PathBuf, AnnotationSource) {
    let gtf = write(
        dir,
        "genes.gtf",
        "chr1\ttest\tgene\t300\t350\t.\t+\t.\tgene_id \"g1\"; gene_name \"G1\";\n",
    );
    write(
        dir,
        "liver.bed",
        "chr1\t100\t200\nchr1\t185000\t185100\nchr9\t10\t20\n",
    );
    let manifest = write(
        dir,
        "run.toml",
        &format!(
            "[[bed]]\npath = \"liver.bed\"\nclass = \"Tissue-Specific\"\ntissue = \"liver\"\n{}",
            manifest_extra
        ),
    );
    let source = AnnotationSource::resolve(gtf, None).unwrap();
    (manifest, source)
}

fn resolve_nearest(config: &Config, sets: &mut [IntervalSet], source: &AnnotationSource) -> proxmap::Result<()> {
    let engine = geometry_engine(config);
    NearestFeatureResolver::new(engine.as_ref(), &config.buckets, &config.gene_id_tag).resolve_all(sets, source)
}

// -------------------------------------------------------------------------
// Nearest-feature resolution
// -------------------------------------------------------------------------

#[test]
fn test_scenario_a_distances_and_buckets() {
    let dir = tempfile::tempdir().unwrap();
    let (manifest, source) = scenario_a(dir.path(), "");
    let config = native_config();

    let mut sets = load_sets(&load_manifest(&manifest).unwrap()).unwrap();
    resolve_nearest(&config, &mut sets, &source).unwrap();
    let records = &sets[0].records;

    assert_eq!(records[0].distance, Some(100));
    assert_eq!(records[0].bucket, Some(1));
    assert_eq!(records[1].distance, Some(184_651));
    assert_eq!(records[1].bucket, Some(19));

    let hit = records[0].hit.as_ref().unwrap();
    assert_eq!((hit.start, hit.end), (300, 350));
    assert_eq!(hit.name.as_deref(), Some("g1"));

    // Unannotated chromosome keeps the sentinel and no hit
    assert_eq!(records[2].distance, Some(-1));
    assert!(records[2].hit.is_none());
}

#[test]
fn test_every_record_has_valid_distance_or_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    let (manifest, source) = scenario_a(dir.path(), "");
    let config = native_config();

    let mut sets = load_sets(&load_manifest(&manifest).unwrap()).unwrap();
    resolve_nearest(&config, &mut sets, &source).unwrap();

    for record in &sets[0].records {
        match (record.distance, &record.hit) {
            (Some(d), Some(hit)) => assert!(d >= 0 && hit.start <= hit.end),
            (Some(d), None) => assert_eq!(d, -1),
            other => panic!("unresolved record: {:?}", other),
        }
        assert!(record.bucket.is_some());
    }
}

#[test]
fn test_bed_annotation_uses_query_field_count() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "peaks.bed", "chr1\t1000\t1100\tpeak1\t7\n");
    let annot = write(dir.path(), "genes.bed", "chr1\t5000\t6000\tgeneA\nchr1\t10\t20\tgeneB\n");
    let manifest = write(
        dir.path(),
        "run.toml",
        "[[bed]]\npath = \"peaks.bed\"\nclass = \"ub\"\ntissue = \"lung\"\n",
    );
    let source = AnnotationSource::resolve(annot, None).unwrap();

    let mut sets = load_sets(&load_manifest(&manifest).unwrap()).unwrap();
    assert_eq!(sets[0].field_count, 5);
    resolve_nearest(&native_config(), &mut sets, &source).unwrap();

    let record = &sets[0].records[0];
    let hit = record.hit.as_ref().unwrap();
    assert_eq!(hit.name.as_deref(), Some("geneB"));
    assert_eq!((hit.start, hit.end), (10, 20));
    assert_eq!(record.distance, Some(981));
}

#[test]
fn test_shared_buckets_across_sets() {
    let dir = tempfile::tempdir().unwrap();
    let gtf = write(dir.path(), "genes.gtf", "chr1\tt\tgene\t50001\t50100\t.\t+\t.\tgene_id \"g\";\n");
    write(dir.path(), "a.bed", "chr1\t0\t100\n");
    write(dir.path(), "b.bed", "chr1\t100000\t100100\n");
    let manifest = write(
        dir.path(),
        "run.toml",
        "[[bed]]\npath = \"a.bed\"\nclass = \"ts\"\ntissue = \"x\"\n\n\
         [[bed]]\npath = \"b.bed\"\nclass = \"ub\"\ntissue = \"x\"\n",
    );
    let source = AnnotationSource::resolve(gtf, None).unwrap();
    let mut config = native_config();
    config.threads = 2;

    let mut sets = load_sets(&load_manifest(&manifest).unwrap()).unwrap();
    resolve_nearest(&config, &mut sets, &source).unwrap();

    // 49901 bp downstream and 49901 bp upstream fall in the same bucket
    assert_eq!(sets[0].records[0].distance, Some(49_901));
    assert_eq!(sets[1].records[0].distance, Some(49_901));
    assert_eq!(sets[0].records[0].bucket, sets[1].records[0].bucket);
    assert_eq!(sets[0].records[0].bucket, Some(BucketScheme::default().bucket(49_901)));
}

// -------------------------------------------------------------------------
// Signal resolution
// -------------------------------------------------------------------------

#[test]
fn test_signal_over_hit_region() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "rep1.bedGraph", "chr1\t0\t1000\t2.0\n");
    write(dir.path(), "rep2.bedGraph", "chr1\t0\t1000\t4.0\n");
    let (manifest, source) = scenario_a(dir.path(), "tracks = [\"rep1.bedGraph\", \"rep2.bedGraph\"]\n");
    let config = native_config();

    let mut sets = load_sets(&load_manifest(&manifest).unwrap()).unwrap();
    resolve_nearest(&config, &mut sets, &source).unwrap();
    let engine = signal_engine(&config);
    SignalResolver::new(engine.as_ref(), SignalRegion::Hit)
        .resolve_all(&mut sets)
        .unwrap();

    let records = &sets[0].records;
    assert_eq!(records[0].signal, Some(Signal::Mean(3.0)));
    assert_eq!(records[1].signal, Some(Signal::Mean(3.0)));
    assert_eq!(records[2].signal, Some(Signal::NotApplicable));
}

#[test]
fn test_signal_without_tracks_is_not_applicable() {
    let dir = tempfile::tempdir().unwrap();
    let (manifest, _) = scenario_a(dir.path(), "");
    let config = native_config();

    let mut sets = load_sets(&load_manifest(&manifest).unwrap()).unwrap();
    let engine = signal_engine(&config);
    SignalResolver::new(engine.as_ref(), SignalRegion::Own)
        .resolve_all(&mut sets)
        .unwrap();

    assert!(sets[0]
        .records
        .iter()
        .all(|r| r.signal == Some(Signal::NotApplicable)));
}

#[test]
fn test_missing_track_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let (manifest, _) = scenario_a(dir.path(), "tracks = [\"absent.bedGraph\"]\n");
    let config = native_config();

    let mut sets = load_sets(&load_manifest(&manifest).unwrap()).unwrap();
    let engine = signal_engine(&config);
    let err = SignalResolver::new(engine.as_ref(), SignalRegion::Own)
        .resolve_all(&mut sets)
        .err()
        .unwrap();

    assert!(matches!(err, Error::MissingFile { role: "Signal track", .. }));
    assert!(err.to_string().contains("absent.bedGraph"));
}

// -------------------------------------------------------------------------
// Corpus assembly and comparison
// -------------------------------------------------------------------------

#[test]
fn test_scenario_b_vector_filter() {
    let dir = tempfile::tempdir().unwrap();
    let content = format!(
        "{}{}",
        vector_line("chr1", 0, 200, 1.0),
        vector_line("chr1", 1000, 150, 1.0)
    );
    write(dir.path(), "vec.bed", &content);
    let manifest = write(
        dir.path(),
        "run.toml",
        "[defaults]\nvectorized = true\n\n[[bed]]\npath = \"vec.bed\"\nclass = \"ts\"\ntissue = \"liver\"\n",
    );

    let corpus = load_corpus(&manifest).unwrap();
    assert_eq!(corpus.len(), 1);
    assert_eq!(corpus.records()[0].length(), 200);
    assert_eq!(corpus.records()[0].vector.as_ref().map(|v| v.len()), Some(200));
}

#[test]
fn test_corpus_round_trip_by_tissue() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "liver.bed", "chr1\t500\t600\nchr1\t100\t200\n");
    write(dir.path(), "lung.bed", "chr2\t10\t20\n");
    let manifest = write(
        dir.path(),
        "run.toml",
        "[[bed]]\npath = \"liver.bed\"\nclass = \"ts\"\ntissue = \"liver\"\n\n\
         [[bed]]\npath = \"lung.bed\"\nclass = \"ts\"\ntissue = \"lung\"\n",
    );

    let sets = load_sets(&load_manifest(&manifest).unwrap()).unwrap();
    let originals = sets.clone();
    let corpus = assemble(sets).unwrap();

    for set in &originals {
        let rebuilt: Vec<_> = corpus.by_tissue(&set.tissue).cloned().collect();
        assert_eq!(rebuilt, set.records);
    }
}

#[test]
fn test_estimates_and_significance_from_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let ts = format!(
        "{}{}{}",
        vector_line("chr1", 0, 100, 1.0),
        vector_line("chr1", 1000, 100, 3.0),
        vector_line("chr1", 2000, 100, 5.0)
    );
    write(dir.path(), "ts.bed", &ts);
    write(dir.path(), "ub.bed", &vector_line("chr1", 0, 100, 0.5));
    let manifest = write(
        dir.path(),
        "run.toml",
        "[defaults]\nvectorized = true\n\n\
         [[bed]]\npath = \"ts.bed\"\nclass = \"ts\"\ntissue = \"liver\"\n\n\
         [[bed]]\npath = \"ub.bed\"\nclass = \"ub\"\ntissue = \"liver\"\n",
    );
    let corpus = load_corpus(&manifest).unwrap();

    let estimates = interval_estimates(&corpus, 0.95);
    assert_eq!(estimates.len(), 200);
    let first = &estimates[0];
    assert_eq!(first.class, GroupClass::TissueSpecific);
    assert_eq!(first.index, 1);
    assert!((first.mean - 3.0).abs() < 1e-9);
    assert!((first.lower - 1.1).abs() < 1e-9);
    assert!((first.upper - 4.9).abs() < 1e-9);

    let tests = significance(&corpus);
    assert_eq!(tests.len(), 1);
    assert_eq!((tests[0].ts_length, tests[0].ub_length), (100, 100));
    assert!(tests[0].p_value > 0.0 && tests[0].p_value < 1e-10);
}

#[test]
fn test_wilcox_identical_samples_is_one() {
    let p = wilcox_test(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]);
    assert!((p - 1.0).abs() < 1e-12);
    assert!(wilcox_test(&[], &[]) == 1.0);
}

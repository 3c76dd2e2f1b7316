//! Per-record signal: the unweighted mean across a set's tracks of each
//! track's mean over the record's region.

use log::info;
use rayon::prelude::*;
use std::path::PathBuf;

use crate::config::SignalRegion;
use crate::engine::SignalEngine;
use crate::error::{Error, Result};
use crate::types::{IntervalRecord, IntervalSet, Signal};

/// Resolves signals for whole interval sets.
pub struct SignalResolver<'a> {
    engine: &'a dyn SignalEngine,
    region: SignalRegion,
}

impl<'a> SignalResolver<'a> {
    pub fn new(engine: &'a dyn SignalEngine, region: SignalRegion) -> Self {
        SignalResolver { engine, region }
    }

    /// Resolve one set in place.
    ///
    /// Every track must exist before any query runs, and a single failed
    /// query fails the whole set; a mean over a subset of replicates is
    /// never reported.
    pub fn resolve(&self, set: &mut IntervalSet) -> Result<()> {
        if set.tracks.is_empty() {
            for record in &mut set.records {
                record.signal = Some(Signal::NotApplicable);
            }
            return Ok(());
        }
        for track in &set.tracks {
            Error::require_file("Signal track", track)?;
        }

        info!(
            "Averaging {} tracks over {} records of {}",
            set.tracks.len(),
            set.len(),
            set.path.display()
        );
        let signals = self.signals(&set.records, &set.tracks)?;
        for (record, signal) in set.records.iter_mut().zip(signals) {
            record.signal = Some(signal);
        }
        Ok(())
    }

    /// Resolve independent sets in parallel on the current rayon pool.
    pub fn resolve_all(&self, sets: &mut [IntervalSet]) -> Result<()> {
        sets.par_iter_mut().try_for_each(|set| self.resolve(set))
    }

    /// Region to query for a record, if it has one.
    fn region_of(&self, record: &IntervalRecord) -> Option<(i64, i64)> {
        match self.region {
            SignalRegion::Own => Some((record.start, record.end)),
            SignalRegion::Hit => record
                .hit
                .as_ref()
                .filter(|_| record.has_valid_distance())
                .map(|h| (h.start, h.end)),
        }
    }

    fn signals(&self, records: &[IntervalRecord], tracks: &[PathBuf]) -> Result<Vec<Signal>> {
        let regions: Vec<Option<(i64, i64)>> = records.iter().map(|r| self.region_of(r)).collect();
        let n_tracks = tracks.len();

        // One query per (record, track) pair, collected in index order
        let means = (0..records.len() * n_tracks)
            .into_par_iter()
            .map(|k| {
                let (i, t) = (k / n_tracks, k % n_tracks);
                match regions[i] {
                    Some((start, end)) => self
                        .engine
                        .mean_over(&records[i].chrom, start, end, &tracks[t])
                        .map(Some),
                    None => Ok(None),
                }
            })
            .collect::<Result<Vec<Option<f64>>>>()?;

        Ok(means
            .chunks(n_tracks)
            .map(|per_track| {
                let values: Vec<f64> = per_track.iter().flatten().copied().collect();
                if values.len() == n_tracks {
                    Signal::Mean(values.iter().sum::<f64>() / n_tracks as f64)
                } else {
                    Signal::NotApplicable
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GroupClass, Hit};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns the track's file stem parsed as a number, plus the region start.
    struct StemEngine {
        calls: AtomicUsize,
    }

    impl SignalEngine for StemEngine {
        fn mean_over(&self, _chrom: &str, start: i64, _end: i64, track: &Path) -> Result<f64> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let stem: f64 = track.file_stem().unwrap().to_string_lossy().parse().unwrap();
            Ok(stem + start as f64)
        }
    }

    struct FailingEngine;

    impl SignalEngine for FailingEngine {
        fn mean_over(&self, _: &str, _: i64, _: i64, _: &Path) -> Result<f64> {
            Err(Error::Engine {
                tool: "test",
                message: "boom".to_string(),
            })
        }
    }

    fn set_with_tracks(dir: &Path, tracks: &[&str]) -> IntervalSet {
        let tracks: Vec<PathBuf> = tracks
            .iter()
            .map(|t| {
                let p = dir.join(t);
                std::fs::write(&p, "").unwrap();
                p
            })
            .collect();
        let mut with_hit = IntervalRecord::new("chr1".into(), 100, 200, GroupClass::Ubiquitous, "liver".into(), 0);
        with_hit.set_nearest(Some(Hit { start: 10, end: 20, name: None }), 81, 1);
        let mut no_hit = IntervalRecord::new("chrX".into(), 300, 400, GroupClass::Ubiquitous, "liver".into(), 1);
        no_hit.set_nearest(None, -1, 0);

        IntervalSet {
            path: dir.join("set.bed"),
            class: GroupClass::Ubiquitous,
            tissue: "liver".into(),
            tracks,
            fasta: None,
            vectorized: false,
            field_count: 3,
            records: vec![with_hit, no_hit],
        }
    }

    #[test]
    fn test_no_tracks_is_not_applicable() {
        let dir = tempfile::tempdir().unwrap();
        let mut set = set_with_tracks(dir.path(), &[]);
        let engine = StemEngine { calls: AtomicUsize::new(0) };
        SignalResolver::new(&engine, SignalRegion::Hit).resolve(&mut set).unwrap();

        assert!(set.records.iter().all(|r| r.signal == Some(Signal::NotApplicable)));
        assert_eq!(engine.calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_mean_across_tracks_over_hit_region() {
        let dir = tempfile::tempdir().unwrap();
        let mut set = set_with_tracks(dir.path(), &["1.bw", "3.bw"]);
        let engine = StemEngine { calls: AtomicUsize::new(0) };
        SignalResolver::new(&engine, SignalRegion::Hit).resolve(&mut set).unwrap();

        // (1 + 10 + 3 + 10) / 2
        assert_eq!(set.records[0].signal, Some(Signal::Mean(12.0)));
        assert_eq!(set.records[1].signal, Some(Signal::NotApplicable));
        assert_eq!(engine.calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_own_region() {
        let dir = tempfile::tempdir().unwrap();
        let mut set = set_with_tracks(dir.path(), &["2.bw"]);
        let engine = StemEngine { calls: AtomicUsize::new(0) };
        SignalResolver::new(&engine, SignalRegion::Own).resolve(&mut set).unwrap();

        assert_eq!(set.records[0].signal, Some(Signal::Mean(102.0)));
        assert_eq!(set.records[1].signal, Some(Signal::Mean(302.0)));
    }

    #[test]
    fn test_missing_track_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut set = set_with_tracks(dir.path(), &["1.bw"]);
        set.tracks.push(dir.path().join("absent.bw"));
        let engine = StemEngine { calls: AtomicUsize::new(0) };

        let err = SignalResolver::new(&engine, SignalRegion::Hit)
            .resolve(&mut set)
            .err()
            .unwrap();
        assert!(err.to_string().contains("absent.bw"));
        assert_eq!(engine.calls.load(Ordering::Relaxed), 0);
        assert!(set.records[0].signal.is_none());
    }

    #[test]
    fn test_engine_failure_leaves_set_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut set = set_with_tracks(dir.path(), &["1.bw"]);
        let err = SignalResolver::new(&FailingEngine, SignalRegion::Own)
            .resolve(&mut set)
            .err()
            .unwrap();
        assert!(matches!(err, Error::Engine { .. }));
        assert!(set.records.iter().all(|r| r.signal.is_none()));
    }
}

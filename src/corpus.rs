//! Corpus assembly: every record of a run in one uniform table.
//!
//! [`load_corpus`] is the single entry point for consumers that start from a
//! manifest; [`assemble`] folds already-resolved sets.

use indexmap::IndexSet;
use log::info;
use rayon::prelude::*;
use std::path::Path;

use crate::error::{Error, Result};
use crate::output::Column;
use crate::parser::{load_manifest, read_interval_set, BedDescriptor};
use crate::types::{GroupClass, IntervalRecord, IntervalSet};

/// Row-concatenation of interval sets. Read-only after assembly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Corpus {
    columns: Vec<Column>,
    records: Vec<IntervalRecord>,
}

impl Corpus {
    /// Columns shared by every record.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn records(&self) -> &[IntervalRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records of one tissue, in assembly order.
    pub fn by_tissue<'a>(&'a self, tissue: &'a str) -> impl Iterator<Item = &'a IntervalRecord> + 'a {
        self.records.iter().filter(move |r| r.tissue == tissue)
    }

    /// Records of one class, in assembly order.
    pub fn by_class(&self, class: GroupClass) -> impl Iterator<Item = &IntervalRecord> + '_ {
        self.records.iter().filter(move |r| r.class == class)
    }

    /// Distinct tissues in order of first appearance.
    pub fn tissues(&self) -> IndexSet<&str> {
        self.records.iter().map(|r| r.tissue.as_str()).collect()
    }
}

/// Columns a set carries, derived from what has been resolved on it.
pub fn columns_of(set: &IntervalSet) -> Vec<Column> {
    let mut columns = vec![
        Column::Chr,
        Column::Start,
        Column::End,
        Column::Len,
        Column::Tissue,
        Column::Class,
    ];
    if set.vectorized {
        columns.push(Column::Vector);
    }
    if let Some(first) = set.records.first() {
        if first.distance.is_some() {
            columns.extend([Column::Dist, Column::Inter, Column::HitStart, Column::HitEnd]);
        }
        if first.signal.is_some() {
            columns.push(Column::Signal);
        }
        if first.position_bin.is_some() {
            columns.push(Column::Bin);
        }
    }
    columns
}

fn join_headers(columns: &[Column]) -> String {
    columns
        .iter()
        .map(|c| c.header())
        .collect::<Vec<_>>()
        .join(",")
}

/// Concatenate sets in input order, keeping each set's record order.
///
/// Every non-empty set must carry the same columns; records are not
/// deduplicated.
pub fn assemble(sets: Vec<IntervalSet>) -> Result<Corpus> {
    let mut columns: Option<Vec<Column>> = None;
    let mut records = Vec::with_capacity(sets.iter().map(|s| s.len()).sum());

    for set in sets {
        if set.is_empty() {
            continue;
        }
        let found = columns_of(&set);
        match &columns {
            None => columns = Some(found),
            Some(expected) if *expected != found => {
                return Err(Error::SchemaMismatch {
                    name: set.path.display().to_string(),
                    expected: join_headers(expected),
                    found: join_headers(&found),
                });
            }
            Some(_) => {}
        }
        records.extend(set.records);
    }

    Ok(Corpus {
        columns: columns.unwrap_or_default(),
        records,
    })
}

/// Read every described set, in manifest order.
pub fn load_sets(descriptors: &[BedDescriptor]) -> Result<Vec<IntervalSet>> {
    let sets = descriptors
        .par_iter()
        .map(read_interval_set)
        .collect::<Result<Vec<_>>>()?;
    info!(
        "Loaded {} records from {} BED files",
        sets.iter().map(|s| s.len()).sum::<usize>(),
        sets.len()
    );
    Ok(sets)
}

/// Build one corpus straight from a manifest.
pub fn load_corpus(manifest: &Path) -> Result<Corpus> {
    let descriptors = load_manifest(manifest)?;
    assemble(load_sets(&descriptors)?)
}

//! proxmap - nearest-feature mapping and distribution comparison for genomic intervals.
//!
//! This library maps interval records (from BED files) to their nearest
//! annotated feature (from a GTF or another BED file), buckets the distance,
//! optionally averages genome-wide signal tracks over the matched region, and
//! compares per-base value distributions between Tissue-Specific and
//! Ubiquitous interval sets.
//!
//! # Features
//!
//! - Parse scalar and vectorized BED, GTF, and FASTA files (with gzip support)
//! - Describe a run's interval files in one TOML manifest
//! - Resolve nearest features with `bedtools closest` or an in-process engine
//! - Average `bigWigAverageOverBed` or bedGraph signal over hit regions
//! - Confidence intervals and Wilcoxon rank-sum tests over assembled corpora
//!
//! # Example
//!
//! ```ignore
//! use proxmap::config::Config;
//! use proxmap::corpus::{assemble, load_sets};
//! use proxmap::engine::geometry_engine;
//! use proxmap::parser::load_manifest;
//! use proxmap::resolver::NearestFeatureResolver;
//! use proxmap::types::AnnotationSource;
//! use std::path::PathBuf;
//!
//! let config = Config::default();
//! let source = AnnotationSource::resolve(PathBuf::from("genes.gtf"), None)?;
//! let mut sets = load_sets(&load_manifest("run.toml".as_ref())?)?;
//!
//! let engine = geometry_engine(&config);
//! NearestFeatureResolver::new(engine.as_ref(), &config.buckets, &config.gene_id_tag)
//!     .resolve_all(&mut sets, &source)?;
//! let corpus = assemble(sets)?;
//! ```

pub mod bucket;
pub mod compare;
pub mod config;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod output;
pub mod parser;
pub mod random;
pub mod resolver;
pub mod types;

pub use bucket::BucketScheme;
pub use config::Config;
pub use corpus::{assemble, load_corpus, Corpus};
pub use error::{Error, Result};
pub use types::{AnnotationSource, AnnotationSourceKind, GroupClass, IntervalRecord, IntervalSet, Signal};

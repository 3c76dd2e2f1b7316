//! Parsers for genomic file formats and the run manifest.

pub mod bed;
pub mod fasta;
pub mod gtf;
pub mod manifest;
pub mod util;

pub use bed::{parse_bed_reader, read_interval_set};
pub use fasta::sequence_lengths;
pub use gtf::{parse_gtf, GtfFeature};
pub use manifest::{load_manifest, parse_manifest, BedDescriptor};

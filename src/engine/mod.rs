//! Engines answering nearest-feature and signal queries.
//!
//! The resolvers only see the [`GeometryEngine`] and [`SignalEngine`] traits;
//! [`Config::engine`](crate::config::Config) picks the implementation.

pub mod closest;
pub mod process;
pub mod signal;

pub use closest::{BedtoolsClosest, GeometryEngine, NativeClosest};
pub use signal::{BedGraphAverage, BigWigAverage, SignalEngine};

use crate::config::{Config, EngineKind};

/// Build the nearest-feature engine selected by `config`.
pub fn geometry_engine(config: &Config) -> Box<dyn GeometryEngine> {
    match config.engine {
        EngineKind::External => Box::new(BedtoolsClosest {
            binary: config.bedtools.clone(),
            ignore_overlaps: config.ignore_overlaps,
            timeout: config.timeout,
        }),
        EngineKind::Native => Box::new(NativeClosest {
            ignore_overlaps: config.ignore_overlaps,
            gene_id_tag: config.gene_id_tag.clone(),
        }),
    }
}

/// Build the signal-averaging engine selected by `config`.
pub fn signal_engine(config: &Config) -> Box<dyn SignalEngine> {
    match config.engine {
        EngineKind::External => Box::new(BigWigAverage {
            binary: config.bigwig_average.clone(),
            timeout: config.timeout,
        }),
        EngineKind::Native => Box::new(BedGraphAverage::new()),
    }
}

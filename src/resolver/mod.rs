//! Resolvers that append nearest-feature and signal columns to interval sets.

pub mod nearest;
pub mod signal;

pub use nearest::NearestFeatureResolver;
pub use signal::SignalResolver;

// Base trait and utilities for source-specific normalizers
pub mod base;

pub mod npi;
pub mod places;

pub use base::{MetricsNormalizer, NormalizerUtils, SourceNormalizer};
pub use npi::NpiNormalizer;
pub use places::PlacesNormalizer;

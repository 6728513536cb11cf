//! Feature extraction from segmented recordings

pub mod extractor;
pub mod spectral;
pub mod statistics;

pub use extractor::{FeatureExtractor, NUM_SCALAR_FEATURES};
pub use spectral::BandPowerEstimator;

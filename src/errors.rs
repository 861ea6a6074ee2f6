use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, LandCoverError>;

#[derive(thiserror::Error, Debug)]
pub enum LandCoverError {
    #[error("Could not open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unsupported raster format: {0}")]
    Format(String),
    #[error(transparent)]
    Tiff(#[from] tiff::TiffError),
    #[cfg(feature = "gdal")]
    #[error(transparent)]
    Gdal(#[from] gdal::errors::GdalError),
    #[error("Dimensions do not match: {0}")]
    Dimension(String),
    #[error("Coordinate ({x}, {y}) is outside of band {band}")]
    CoordinateOutOfRange { band: String, x: f64, y: f64 },
    #[error("Geo transform is not invertible")]
    SingularTransform,
    #[error("Geo transform coefficients must be finite, got {0:?}")]
    NonFiniteTransform([f64; 6]),
    #[error(transparent)]
    Training(#[from] TrainingError),
    #[error("Classifier has not been trained")]
    ModelNotTrained,
    #[error("Feature vector has {found} values, model was trained on {expected}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("Feature {feature} has symbol {symbol} outside of the model domain 0..{symbols}")]
    SymbolOutOfDomain {
        feature: usize,
        symbol: u16,
        symbols: usize,
    },
    #[error("{0} is not supported by this classifier")]
    Unsupported(&'static str),
    #[error("Band {0} is not loaded")]
    MissingBand(String),
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
    #[error("Worker loading {0} panicked")]
    WorkerPanicked(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TrainingError {
    #[error("Training set is empty")]
    EmptySampleSet,
    #[error("Sample {index} has {found} features, expected {expected}")]
    RaggedSamples {
        index: usize,
        expected: usize,
        found: usize,
    },
    #[error("Sample {index} feature {feature} has symbol {symbol} outside of 0..{symbols}")]
    SymbolOutOfDomain {
        index: usize,
        feature: usize,
        symbol: u16,
        symbols: usize,
    },
}

/// Non-fatal outcome of a contrast stretch that was skipped.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StretchWarning {
    #[error("Histogram is empty, no contrast enhancement applied")]
    EmptyHistogram,
    #[error("Degenerate cutoffs ({min_cut}, {max_cut}), no contrast enhancement applied")]
    Degenerate { min_cut: i64, max_cut: i64 },
}

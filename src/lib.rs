//! Land cover classification of multi band satellite imagery.
//!
//! Bands are decoded from georeferenced rasters, contrast enhanced and kept
//! in a [LayerCollection]. Feature vectors gathered at world positions train
//! a [Classifier] which then labels whole rasters.

mod buffer;
pub mod classifier;
pub mod components;
pub mod config;
pub mod coordinator;
mod errors;
pub mod features;

pub use buffer::{PixelBuffer, PixelDomain};
pub use classifier::{
    predict_raster, ClassLabel, Classifier, ConfusionMatrix, LabelRaster, LandCoverClassifier,
    NaiveBayesClassifier,
};
pub use components::{
    load, BandFile, ContrastStretcher, Cutoffs, GeoTransform, Layer, LayerCollection, RasterBand,
    RgbComposite, StretchMode,
};
pub use config::{
    BandRequest, ClassifierConfig, CoordinatorConfig, Engine, LoadOptions, NaiveBayesOptions,
    RgbChannel,
};
pub use coordinator::{BatchReport, ConcurrencyCoordinator, InteractionSignal};
pub use errors::{LandCoverError, Result, StretchWarning, TrainingError};
pub use features::{FeatureSchema, FeatureVector, LabeledSample, TrainingPoint};

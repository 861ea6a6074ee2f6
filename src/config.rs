//! Serializable options for loading bands and building classifiers.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{
    components::stretch::{
        ContrastStretcher, StretchMode, DEFAULT_HIGH_PERCENTILE, DEFAULT_LOW_PERCENTILE,
        DEFAULT_PARTITION_SIZE,
    },
    errors::{LandCoverError, Result},
};

/// Decoder used to read band files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    #[default]
    Tiff,
    /// Requires the `gdal` feature.
    Gdal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RgbChannel {
    Red,
    Green,
    Blue,
}

impl RgbChannel {
    /// Byte offset inside a BGRA pixel.
    pub fn bgra_offset(self) -> usize {
        match self {
            RgbChannel::Blue => 0,
            RgbChannel::Green => 1,
            RgbChannel::Red => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    pub engine: Engine,
    pub contrast_enhancement: bool,
    /// Percentile cutoffs suit imagery, min/max suits elevation models.
    pub stretch: StretchMode,
    pub low_percentile: f64,
    pub high_percentile: f64,
    /// Pixels rescaled per parallel task.
    pub partition_size: usize,
    pub is_feature: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            engine: Engine::default(),
            contrast_enhancement: true,
            stretch: StretchMode::default(),
            low_percentile: DEFAULT_LOW_PERCENTILE,
            high_percentile: DEFAULT_HIGH_PERCENTILE,
            partition_size: DEFAULT_PARTITION_SIZE,
            is_feature: true,
        }
    }
}

impl LoadOptions {
    pub fn stretcher(&self) -> Result<ContrastStretcher> {
        Ok(ContrastStretcher::new(self.low_percentile, self.high_percentile)?
            .with_partition_size(self.partition_size)
            .with_mode(self.stretch))
    }
}

/// One band to load in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandRequest {
    /// Display name, the layer collection is ordered by it.
    pub name: String,
    pub path: PathBuf,
    /// Position of the band in feature vectors.
    pub band_number: usize,
    #[serde(default)]
    pub options: LoadOptions,
    /// Contributes this band to the RGB composite.
    #[serde(default)]
    pub rgb_channel: Option<RgbChannel>,
}

impl BandRequest {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, band_number: usize) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            band_number,
            options: LoadOptions::default(),
            rgb_channel: None,
        }
    }

    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_rgb_channel(mut self, channel: RgbChannel) -> Self {
        self.rgb_channel = Some(channel);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NaiveBayesOptions {
    /// Distinct symbols per feature, at most 65536.
    pub symbols: usize,
    /// Additive smoothing applied to every frequency cell, 1 is Laplace.
    pub smoothing: f64,
}

impl Default for NaiveBayesOptions {
    fn default() -> Self {
        Self {
            symbols: 1 << 16,
            smoothing: 1.,
        }
    }
}

impl NaiveBayesOptions {
    pub fn validate(&self) -> Result<()> {
        if !(1..=1 << 16).contains(&self.symbols) {
            return Err(LandCoverError::InvalidOptions(format!(
                "symbol domain must hold between 1 and 65536 values, got {}",
                self.symbols
            )));
        }
        if !self.smoothing.is_finite() || self.smoothing < 0. {
            return Err(LandCoverError::InvalidOptions(format!(
                "smoothing must be a finite non negative number, got {}",
                self.smoothing
            )));
        }
        Ok(())
    }
}

/// Classifier backend, chosen once at configuration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierConfig {
    NaiveBayes(NaiveBayesOptions),
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig::NaiveBayes(NaiveBayesOptions::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Loader threads, defaults to one per core.
    pub workers: Option<usize>,
    /// Prefix of the loader thread names.
    pub thread_name: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            workers: None,
            thread_name: "band-loader".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn band_request_defaults() {
        let request: BandRequest =
            serde_json::from_str(r#"{"name": "B02", "path": "/data/B02.tif", "band_number": 2}"#)
                .unwrap();
        assert_eq!(request, BandRequest::new("B02", "/data/B02.tif", 2));
        assert!(request.options.contrast_enhancement);
        assert!(request.options.is_feature);
    }

    #[rstest]
    fn partial_load_options() {
        let options: LoadOptions = serde_json::from_str(
            r#"{"engine": "gdal", "contrast_enhancement": false, "low_percentile": 0.05}"#,
        )
        .unwrap();
        assert_eq!(options.engine, Engine::Gdal);
        assert!(!options.contrast_enhancement);
        assert_eq!(options.low_percentile, 0.05);
        assert_eq!(options.high_percentile, DEFAULT_HIGH_PERCENTILE);
        assert_eq!(options.stretch, StretchMode::Percentile);
    }

    #[rstest]
    fn min_max_stretch_reaches_stretcher() {
        let options: LoadOptions = serde_json::from_str(r#"{"stretch": "min_max"}"#).unwrap();
        assert_eq!(options.stretch, StretchMode::MinMax);
        assert_eq!(options.stretcher().unwrap().mode(), StretchMode::MinMax);
    }

    #[rstest]
    fn classifier_config_is_tagged() {
        let config: ClassifierConfig =
            serde_json::from_str(r#"{"kind": "naive_bayes", "symbols": 4096}"#).unwrap();
        assert_eq!(
            config,
            ClassifierConfig::NaiveBayes(NaiveBayesOptions {
                symbols: 4096,
                smoothing: 1.
            })
        );
    }

    #[rstest]
    fn coordinator_config_defaults() {
        let config: CoordinatorConfig = serde_json::from_str(r#"{"workers": 2}"#).unwrap();
        assert_eq!(config.workers, Some(2));
        assert_eq!(config.thread_name, "band-loader");
    }

    #[rstest]
    #[case(0, 1.)]
    #[case(65537, 1.)]
    #[case(256, -1.)]
    #[case(256, f64::NAN)]
    fn invalid_naive_bayes_options(#[case] symbols: usize, #[case] smoothing: f64) {
        let options = NaiveBayesOptions { symbols, smoothing };
        assert!(matches!(options.validate(), Err(LandCoverError::InvalidOptions(_))));
    }
}

//! Categorical Naive Bayes over 16 bit band intensities.
//!
//! Every feature is treated as a symbol in `0..symbols` and modeled by its
//! per class frequency, smoothed additively. With the default smoothing of 1
//! this is Laplace's rule, so symbols unseen during training keep a small
//! non zero likelihood.

use std::sync::Arc;

use itertools::Itertools;
use log::{debug, info};

use crate::{
    classifier::{ClassLabel, LandCoverClassifier, ModelSlot},
    config::NaiveBayesOptions,
    errors::{LandCoverError, Result, TrainingError},
    features::{FeatureVector, LabeledSample},
};

/// Frequencies fitted from one training set.
#[derive(Debug)]
pub struct NaiveBayesModel {
    classes: Vec<ClassLabel>,
    features: usize,
    symbols: usize,
    smoothing: f64,
    log_priors: Vec<f64>,
    /// `ln(samples of class + smoothing * symbols)`
    log_denominators: Vec<f64>,
    /// Indexed by class, feature, then symbol.
    counts: Vec<u32>,
}

impl NaiveBayesModel {
    pub fn fit(
        options: &NaiveBayesOptions,
        samples: &[LabeledSample],
    ) -> std::result::Result<Self, TrainingError> {
        let features = samples
            .first()
            .ok_or(TrainingError::EmptySampleSet)?
            .features
            .len();
        let symbols = options.symbols;
        for (index, sample) in samples.iter().enumerate() {
            if sample.features.len() != features {
                return Err(TrainingError::RaggedSamples {
                    index,
                    expected: features,
                    found: sample.features.len(),
                });
            }
            if let Some((feature, &symbol)) = sample
                .features
                .iter()
                .find_position(|&&symbol| symbol as usize >= symbols)
            {
                return Err(TrainingError::SymbolOutOfDomain {
                    index,
                    feature,
                    symbol,
                    symbols,
                });
            }
        }

        let classes = samples
            .iter()
            .map(|sample| sample.label)
            .sorted()
            .dedup()
            .collect_vec();
        let mut class_totals = vec![0u64; classes.len()];
        let mut counts = vec![0u32; classes.len() * features * symbols];
        for sample in samples {
            let class = classes.partition_point(|label| *label < sample.label);
            class_totals[class] += 1;
            let offset = class * features * symbols;
            for (feature, &symbol) in sample.features.iter().enumerate() {
                counts[offset + feature * symbols + symbol as usize] += 1;
            }
        }

        let total = samples.len() as f64;
        let log_priors = class_totals
            .iter()
            .map(|&count| (count as f64 / total).ln())
            .collect();
        let log_denominators = class_totals
            .iter()
            .map(|&count| (count as f64 + options.smoothing * symbols as f64).ln())
            .collect();
        Ok(Self {
            classes,
            features,
            symbols,
            smoothing: options.smoothing,
            log_priors,
            log_denominators,
            counts,
        })
    }

    /// Classes seen during training, ascending.
    pub fn classes(&self) -> &[ClassLabel] {
        &self.classes
    }

    pub fn features(&self) -> usize {
        self.features
    }

    pub fn symbols(&self) -> usize {
        self.symbols
    }

    /// Unnormalized log posterior of each class, in [NaiveBayesModel::classes]
    /// order.
    pub fn log_posteriors(&self, features: &FeatureVector) -> Result<Vec<f64>> {
        if features.len() != self.features {
            return Err(LandCoverError::DimensionMismatch {
                expected: self.features,
                found: features.len(),
            });
        }
        if let Some((feature, &symbol)) = features
            .iter()
            .find_position(|&&symbol| symbol as usize >= self.symbols)
        {
            return Err(LandCoverError::SymbolOutOfDomain {
                feature,
                symbol,
                symbols: self.symbols,
            });
        }

        Ok((0..self.classes.len())
            .map(|class| {
                let offset = class * self.features * self.symbols;
                let log_denominator = self.log_denominators[class];
                self.log_priors[class]
                    + features
                        .iter()
                        .enumerate()
                        .map(|(feature, &symbol)| {
                            let count = self.counts[offset + feature * self.symbols + symbol as usize];
                            (count as f64 + self.smoothing).ln() - log_denominator
                        })
                        .sum::<f64>()
            })
            .collect())
    }

    /// Index of the most probable class with its posterior probability.
    fn decide(&self, features: &FeatureVector) -> Result<(usize, f64)> {
        let scores = self.log_posteriors(features)?;
        // Strict comparison keeps the lowest label on ties.
        let (best, max) = scores
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |(best, max), (class, &score)| {
                if score > max {
                    (class, score)
                } else {
                    (best, max)
                }
            });
        if max == f64::NEG_INFINITY {
            return Ok((best, 1. / scores.len() as f64));
        }
        let normalizer: f64 = scores.iter().map(|score| (score - max).exp()).sum();
        Ok((best, 1. / normalizer))
    }
}

/// Classifier whose model can be retrained while predictions run.
#[derive(Debug)]
pub struct NaiveBayesClassifier {
    options: NaiveBayesOptions,
    slot: ModelSlot<NaiveBayesModel>,
}

impl NaiveBayesClassifier {
    pub fn new(options: NaiveBayesOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            slot: ModelSlot::default(),
        })
    }

    pub fn options(&self) -> &NaiveBayesOptions {
        &self.options
    }

    pub fn model(&self) -> Option<Arc<NaiveBayesModel>> {
        self.slot.current()
    }

    fn trained_model(&self) -> Result<Arc<NaiveBayesModel>> {
        self.slot.current().ok_or(LandCoverError::ModelNotTrained)
    }
}

impl LandCoverClassifier for NaiveBayesClassifier {
    fn train(&self, samples: &[LabeledSample]) -> Result<()> {
        let model = self
            .slot
            .replace_with(|| Ok(NaiveBayesModel::fit(&self.options, samples)?))?;
        info!(
            "trained naive bayes on {} samples: {} classes, {} features",
            samples.len(),
            model.classes.len(),
            model.features
        );
        debug!("classes {:?}", model.classes);
        Ok(())
    }

    fn predict(&self, features: &FeatureVector) -> Result<ClassLabel> {
        let model = self.trained_model()?;
        let (class, _) = model.decide(features)?;
        Ok(model.classes[class])
    }

    fn predict_probability(&self, features: &FeatureVector) -> Result<f64> {
        let (_, probability) = self.trained_model()?.decide(features)?;
        Ok(probability)
    }

    fn feature_count(&self) -> Option<usize> {
        self.slot.current().map(|model| model.features)
    }

    fn is_trained(&self) -> bool {
        self.slot.current().is_some()
    }
}

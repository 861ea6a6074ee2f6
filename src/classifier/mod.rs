pub mod naive_bayes;
pub mod prediction;

use std::{
    fmt::{Debug, Display},
    sync::{Arc, Mutex, PoisonError, RwLock},
};

use serde::{Deserialize, Serialize};

use crate::{
    config::ClassifierConfig,
    errors::Result,
    features::{FeatureVector, LabeledSample},
};

pub use naive_bayes::{NaiveBayesClassifier, NaiveBayesModel};
pub use prediction::{predict_raster, ConfusionMatrix, LabelRaster};

/// Land cover class as chosen by the user when picking training points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassLabel(pub u16);

impl Display for ClassLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "class {}", self.0)
    }
}

/// Supervised per pixel classifier.
///
/// Implementations take `&self` everywhere: training swaps the model
/// atomically, so predictions may run from any thread while a new model is
/// being fitted and always see either the old or the new one.
#[ambassador::delegatable_trait]
pub trait LandCoverClassifier: Send + Sync {
    /// Fits a new model. On error the previous model stays in place.
    fn train(&self, samples: &[LabeledSample]) -> Result<()>;
    /// Most probable class of `features`.
    fn predict(&self, features: &FeatureVector) -> Result<ClassLabel>;
    /// Posterior probability of the class [LandCoverClassifier::predict]
    /// returns.
    fn predict_probability(&self, features: &FeatureVector) -> Result<f64>;
    /// Vector length of the current model.
    fn feature_count(&self) -> Option<usize>;
    fn is_trained(&self) -> bool;
}

#[derive(ambassador::Delegate, Debug)]
#[delegate(LandCoverClassifier)]
pub enum Classifier {
    NaiveBayes(NaiveBayesClassifier),
}

impl Classifier {
    pub fn from_config(config: &ClassifierConfig) -> Result<Self> {
        match config {
            ClassifierConfig::NaiveBayes(options) => {
                Ok(Self::NaiveBayes(NaiveBayesClassifier::new(options.clone())?))
            }
        }
    }
}

/// Holds the current model of a classifier.
pub(crate) struct ModelSlot<M> {
    model: RwLock<Option<Arc<M>>>,
    training: Mutex<()>,
}

impl<M> Default for ModelSlot<M> {
    fn default() -> Self {
        Self {
            model: RwLock::new(None),
            training: Mutex::new(()),
        }
    }
}

impl<M: Debug> Debug for ModelSlot<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ModelSlot").field(&self.current()).finish()
    }
}

impl<M> ModelSlot<M> {
    pub(crate) fn current(&self) -> Option<Arc<M>> {
        self.model
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Runs `fit` with training exclusive, then publishes its model.
    pub(crate) fn replace_with<F>(&self, fit: F) -> Result<Arc<M>>
    where
        F: FnOnce() -> Result<M>,
    {
        let _training = self.training.lock().unwrap_or_else(PoisonError::into_inner);
        let model = Arc::new(fit()?);
        *self.model.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&model));
        Ok(model)
    }
}

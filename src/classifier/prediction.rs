use itertools::Itertools;
use log::info;
use rayon::prelude::*;

use crate::{
    classifier::{ClassLabel, LandCoverClassifier},
    components::{layers::LayerCollection, transforms::GeoTransform},
    errors::{LandCoverError, Result},
    features::{FeatureSchema, LabeledSample},
};

/// Predicted classes over the grid of the first feature band.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelRaster {
    shape: (usize, usize),
    transform: GeoTransform,
    /// `None` where a pixel centre falls outside one of the feature bands.
    labels: Box<[Option<ClassLabel>]>,
}

impl LabelRaster {
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn labels(&self) -> &[Option<ClassLabel>] {
        &self.labels
    }

    pub fn get(&self, col: usize, row: usize) -> Option<ClassLabel> {
        if col >= self.shape.0 || row >= self.shape.1 {
            return None;
        }
        self.labels[row * self.shape.0 + col]
    }

    /// Number of classified pixels.
    pub fn classified(&self) -> usize {
        self.labels.iter().flatten().count()
    }
}

/// Classifies every pixel of the reference band, rows in parallel.
pub fn predict_raster<C>(
    classifier: &C,
    schema: &FeatureSchema,
    layers: &LayerCollection,
) -> Result<LabelRaster>
where
    C: LandCoverClassifier + ?Sized,
{
    if !classifier.is_trained() {
        return Err(LandCoverError::ModelNotTrained);
    }
    let bound = schema.bind(layers)?;
    let reference = bound.reference();
    let (width, height) = reference.shape();

    let rows = (0..height)
        .into_par_iter()
        .map(|row| {
            (0..width)
                .map(|col| match bound.assemble((col, row)) {
                    Ok(features) => classifier.predict(&features).map(Some),
                    Err(LandCoverError::CoordinateOutOfRange { .. }) => Ok(None),
                    Err(error) => Err(error),
                })
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    let raster = LabelRaster {
        shape: (width, height),
        transform: *reference.transform(),
        labels: rows.into_iter().flatten().collect(),
    };
    info!(
        "classified {} of {} pixels",
        raster.classified(),
        width * height
    );
    Ok(raster)
}

/// Tallies of actual against predicted classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    classes: Vec<ClassLabel>,
    /// Row major, rows are actual classes.
    counts: Vec<usize>,
}

impl ConfusionMatrix {
    /// Builds the matrix from `(actual, predicted)` pairs.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (ClassLabel, ClassLabel)>,
    {
        let pairs = pairs.into_iter().collect_vec();
        let classes = pairs
            .iter()
            .flat_map(|&(actual, predicted)| [actual, predicted])
            .sorted()
            .dedup()
            .collect_vec();
        let size = classes.len();
        let mut counts = vec![0; size * size];
        for (actual, predicted) in pairs {
            let row = classes.partition_point(|label| *label < actual);
            let col = classes.partition_point(|label| *label < predicted);
            counts[row * size + col] += 1;
        }
        Self { classes, counts }
    }

    /// Predicts every sample and compares with its label.
    pub fn evaluate<C>(classifier: &C, samples: &[LabeledSample]) -> Result<Self>
    where
        C: LandCoverClassifier + ?Sized,
    {
        let pairs = samples
            .par_iter()
            .map(|sample| Ok((sample.label, classifier.predict(&sample.features)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_pairs(pairs))
    }

    pub fn classes(&self) -> &[ClassLabel] {
        &self.classes
    }

    fn index(&self, label: ClassLabel) -> Option<usize> {
        self.classes.binary_search(&label).ok()
    }

    pub fn count(&self, actual: ClassLabel, predicted: ClassLabel) -> usize {
        match (self.index(actual), self.index(predicted)) {
            (Some(row), Some(col)) => self.counts[row * self.classes.len() + col],
            _ => 0,
        }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    fn diagonal(&self) -> usize {
        (0..self.classes.len())
            .map(|index| self.counts[index * self.classes.len() + index])
            .sum()
    }

    fn row_total(&self, row: usize) -> usize {
        let size = self.classes.len();
        self.counts[row * size..(row + 1) * size].iter().sum()
    }

    fn col_total(&self, col: usize) -> usize {
        let size = self.classes.len();
        (0..size).map(|row| self.counts[row * size + col]).sum()
    }

    /// Share of correct predictions, `None` when empty.
    pub fn accuracy(&self) -> Option<f64> {
        let total = self.total();
        (total > 0).then(|| self.diagonal() as f64 / total as f64)
    }

    /// Cohen's kappa. `None` when empty or when chance agreement is total.
    pub fn kappa(&self) -> Option<f64> {
        let total = self.total() as f64;
        let observed = self.accuracy()?;
        let expected = (0..self.classes.len())
            .map(|index| self.row_total(index) as f64 * self.col_total(index) as f64)
            .sum::<f64>()
            / (total * total);
        (expected < 1.).then(|| (observed - expected) / (1. - expected))
    }

    /// Share of pixels predicted as `label` that are `label`.
    pub fn precision(&self, label: ClassLabel) -> Option<f64> {
        let index = self.index(label)?;
        let predicted = self.col_total(index);
        (predicted > 0).then(|| self.count(label, label) as f64 / predicted as f64)
    }

    /// Share of pixels of `label` that were predicted as such.
    pub fn recall(&self, label: ClassLabel) -> Option<f64> {
        let index = self.index(label)?;
        let actual = self.row_total(index);
        (actual > 0).then(|| self.count(label, label) as f64 / actual as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classifier::NaiveBayesClassifier,
        components::{band::tests::band_from, layers::Layer},
        config::NaiveBayesOptions,
        features::FeatureVector,
    };
    use rstest::rstest;

    fn assert_close(left: f64, right: f64) {
        assert!((left - right).abs() < 1e-9, "{left} != {right}");
    }

    const WATER: ClassLabel = ClassLabel(1);
    const FOREST: ClassLabel = ClassLabel(2);
    const ROCK: ClassLabel = ClassLabel(3);

    #[rstest]
    fn raster_prediction_covers_reference_grid() {
        let mut layers = LayerCollection::new();
        let grid = [0., 10., 0., 20., 0., -10.];
        layers.insert_sorted(Layer::new("B02", 2, band_from((3, 2), vec![1u16, 1, 9, 1, 9, 9], grid)));
        // Only covers the western two columns.
        layers.insert_sorted(Layer::new("B03", 3, band_from((2, 2), vec![1u16, 1, 1, 9], grid)));

        let classifier = NaiveBayesClassifier::new(NaiveBayesOptions {
            symbols: 16,
            smoothing: 1.,
        })
        .unwrap();
        classifier
            .train(&[
                LabeledSample::new([1, 1], WATER),
                LabeledSample::new([9, 9], FOREST),
            ])
            .unwrap();

        let schema = FeatureSchema::snapshot(&layers);
        let raster = predict_raster(&classifier, &schema, &layers).unwrap();
        assert_eq!(raster.shape(), (3, 2));
        assert_eq!(raster.transform().to_gdal(), grid);
        assert_eq!(raster.get(0, 0), Some(WATER));
        assert_eq!(raster.get(1, 1), Some(FOREST));
        assert_eq!(raster.get(2, 0), None);
        assert_eq!(raster.get(2, 1), None);
        assert_eq!(raster.classified(), 4);
    }

    #[rstest]
    fn raster_prediction_needs_model() {
        let classifier = NaiveBayesClassifier::new(NaiveBayesOptions::default()).unwrap();
        assert!(matches!(
            predict_raster(&classifier, &FeatureSchema::default(), &LayerCollection::new()),
            Err(LandCoverError::ModelNotTrained)
        ));
    }

    #[rstest]
    fn confusion_matrix_metrics() {
        let matrix = ConfusionMatrix::from_pairs([
            (WATER, WATER),
            (WATER, WATER),
            (WATER, FOREST),
            (FOREST, FOREST),
            (FOREST, FOREST),
            (FOREST, FOREST),
            (ROCK, FOREST),
            (ROCK, ROCK),
        ]);
        assert_eq!(matrix.classes(), [WATER, FOREST, ROCK]);
        assert_eq!(matrix.total(), 8);
        assert_eq!(matrix.count(WATER, FOREST), 1);
        assert_eq!(matrix.count(FOREST, WATER), 0);
        assert_eq!(matrix.count(ClassLabel(7), WATER), 0);
        assert_close(matrix.accuracy().unwrap(), 6. / 8.);
        assert_close(matrix.precision(FOREST).unwrap(), 3. / 5.);
        assert_close(matrix.recall(WATER).unwrap(), 2. / 3.);
        assert_close(matrix.recall(ROCK).unwrap(), 1. / 2.);
        assert_eq!(matrix.precision(ClassLabel(7)), None);

        // Chance agreement: (3*2 + 3*5 + 2*1) / 64
        let expected = 23. / 64.;
        assert_close(matrix.kappa().unwrap(), (6. / 8. - expected) / (1. - expected));
    }

    #[rstest]
    fn empty_and_uniform_matrices() {
        let empty = ConfusionMatrix::from_pairs(Vec::new());
        assert_eq!(empty.accuracy(), None);
        assert_eq!(empty.kappa(), None);

        let uniform = ConfusionMatrix::from_pairs([(ROCK, ROCK), (ROCK, ROCK)]);
        assert_close(uniform.accuracy().unwrap(), 1.);
        assert_eq!(uniform.kappa(), None);
    }

    #[rstest]
    fn evaluate_on_training_set() {
        let classifier = NaiveBayesClassifier::new(NaiveBayesOptions {
            symbols: 16,
            smoothing: 1.,
        })
        .unwrap();
        let samples = [
            LabeledSample::new([1, 1], WATER),
            LabeledSample::new([2, 1], WATER),
            LabeledSample::new([9, 9], FOREST),
        ];
        classifier.train(&samples).unwrap();
        let matrix = ConfusionMatrix::evaluate(&classifier, &samples).unwrap();
        assert_eq!(matrix.accuracy(), Some(1.));
        assert!(matches!(
            ConfusionMatrix::evaluate(
                &classifier,
                &[LabeledSample::new(FeatureVector::from([1]), WATER)]
            ),
            Err(LandCoverError::DimensionMismatch { .. })
        ));
    }
}

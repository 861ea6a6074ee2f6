//! Per pixel feature vectors drawn from the bands flagged as features.

use geo::Coord;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use shrinkwraprs::Shrinkwrap;

use crate::{
    classifier::ClassLabel,
    components::{band::RasterBand, layers::LayerCollection},
    errors::{LandCoverError, Result},
};

/// Intensities of one pixel, one per feature band.
#[derive(Shrinkwrap, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureVector(Box<[u16]>);

impl From<Vec<u16>> for FeatureVector {
    fn from(value: Vec<u16>) -> Self {
        Self(value.into_boxed_slice())
    }
}

impl<const N: usize> From<[u16; N]> for FeatureVector {
    fn from(value: [u16; N]) -> Self {
        Self(Box::from(value))
    }
}

impl FromIterator<u16> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = u16>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledSample {
    pub features: FeatureVector,
    pub label: ClassLabel,
}

impl LabeledSample {
    pub fn new(features: impl Into<FeatureVector>, label: ClassLabel) -> Self {
        Self {
            features: features.into(),
            label,
        }
    }
}

/// A world position picked for training, with its class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingPoint {
    pub world: Coord,
    pub label: ClassLabel,
}

impl TrainingPoint {
    pub fn new(x: f64, y: f64, label: ClassLabel) -> Self {
        Self {
            world: Coord { x, y },
            label,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureBand {
    pub name: String,
    pub band_number: usize,
}

/// Feature bands captured when a classification session starts.
///
/// Later changes to the layers' feature flags do not affect an existing
/// schema, so vectors keep the length the model was trained on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeatureSchema(Box<[FeatureBand]>);

impl FeatureSchema {
    /// Bands flagged as features, by ascending band number.
    pub fn snapshot(layers: &LayerCollection) -> Self {
        Self(
            layers
                .iter()
                .filter(|layer| layer.is_feature)
                .map(|layer| FeatureBand {
                    name: layer.name.clone(),
                    band_number: layer.band_number,
                })
                .sorted_by(|lhs, rhs| {
                    lhs.band_number
                        .cmp(&rhs.band_number)
                        .then_with(|| lhs.name.cmp(&rhs.name))
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn bands(&self) -> impl Iterator<Item = &FeatureBand> {
        self.0.iter()
    }

    /// Resolves the schema's bands in `layers`.
    pub fn bind<'a>(&self, layers: &'a LayerCollection) -> Result<BoundSchema<'a>> {
        if self.is_empty() {
            return Err(LandCoverError::Dimension(
                "no band is selected as feature".to_string(),
            ));
        }
        let bands = self
            .bands()
            .map(|feature| {
                layers
                    .get(&feature.name)
                    .map(|layer| (layer.name.as_str(), &layer.band))
                    .ok_or_else(|| LandCoverError::MissingBand(feature.name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(BoundSchema(bands))
    }

    /// Vector at `pixel` of the first feature band's grid.
    pub fn assemble(&self, layers: &LayerCollection, pixel: (usize, usize)) -> Result<FeatureVector> {
        self.bind(layers)?.assemble(pixel)
    }

    pub fn assemble_world(&self, layers: &LayerCollection, world: Coord) -> Result<FeatureVector> {
        self.bind(layers)?.assemble_world(world)
    }

    pub fn training_set(
        &self,
        layers: &LayerCollection,
        points: &[TrainingPoint],
    ) -> Result<Vec<LabeledSample>> {
        let bound = self.bind(layers)?;
        points
            .iter()
            .map(|point| {
                Ok(LabeledSample {
                    features: bound.assemble_world(point.world)?,
                    label: point.label,
                })
            })
            .collect()
    }
}

/// A [FeatureSchema] resolved against loaded layers.
#[derive(Debug)]
pub struct BoundSchema<'a>(Vec<(&'a str, &'a RasterBand)>);

impl<'a> BoundSchema<'a> {
    /// Band whose pixel grid [BoundSchema::assemble] addresses.
    pub fn reference(&self) -> &'a RasterBand {
        self.0[0].1
    }

    pub fn assemble(&self, pixel: (usize, usize)) -> Result<FeatureVector> {
        let (name, reference) = self.0[0];
        if !reference.contains(pixel.0, pixel.1) {
            return Err(LandCoverError::CoordinateOutOfRange {
                band: name.to_string(),
                x: pixel.0 as f64,
                y: pixel.1 as f64,
            });
        }
        let world = reference
            .transform()
            .pixel_to_world(pixel.0 as f64 + 0.5, pixel.1 as f64 + 0.5);
        self.assemble_world(world)
    }

    pub fn assemble_world(&self, world: Coord) -> Result<FeatureVector> {
        self.0
            .iter()
            .map(|(name, band)| {
                band.pixel_at(world)?
                    .and_then(|(col, row)| band.symbol(col, row))
                    .ok_or_else(|| LandCoverError::CoordinateOutOfRange {
                        band: name.to_string(),
                        x: world.x,
                        y: world.y,
                    })
            })
            .collect()
    }
}

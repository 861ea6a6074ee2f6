use std::{fmt::Debug, path::PathBuf};

use log::debug;

use crate::components::band::RasterBand;

/// A loaded band as shown to the user.
#[derive(Debug)]
pub struct Layer {
    pub name: String,
    pub path: Option<PathBuf>,
    /// Position of the band in feature vectors.
    pub band_number: usize,
    pub band: RasterBand,
    pub is_feature: bool,
    pub is_visible: bool,
}

impl Layer {
    pub fn new(name: impl Into<String>, band_number: usize, band: RasterBand) -> Self {
        Self {
            name: name.into(),
            path: None,
            band_number,
            band,
            is_feature: true,
            is_visible: false,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_feature(mut self, is_feature: bool) -> Self {
        self.is_feature = is_feature;
        self
    }
}

/// Layers ordered by name.
#[derive(Default)]
pub struct LayerCollection(Vec<Layer>);

impl Debug for LayerCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl LayerCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts after every layer whose name sorts before or equal to
    /// `layer.name`, comparing bytes.
    pub fn insert_sorted(&mut self, layer: Layer) -> usize {
        let index = self
            .0
            .partition_point(|existing| existing.name.as_bytes() <= layer.name.as_bytes());
        debug!("inserting layer {} at {index}", layer.name);
        self.0.insert(index, layer);
        index
    }

    /// Takes the layer out, releasing its pixels once the caller drops it.
    pub fn remove(&mut self, name: &str) -> Option<Layer> {
        let index = self.0.iter().position(|layer| layer.name == name)?;
        Some(self.0.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<&Layer> {
        self.0.iter().find(|layer| layer.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Layer> {
        self.0.iter_mut().find(|layer| layer.name == name)
    }

    /// Returns whether a layer named `name` exists.
    pub fn set_feature(&mut self, name: &str, is_feature: bool) -> bool {
        self.get_mut(name)
            .map(|layer| layer.is_feature = is_feature)
            .is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|layer| layer.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::components::band::tests::band_from;
    use rstest::rstest;

    pub(crate) fn layer(name: &str, band_number: usize) -> Layer {
        Layer::new(name, band_number, band_from((1, 1), vec![0u16], [0., 1., 0., 0., 0., -1.]))
    }

    #[rstest]
    fn layers_are_sorted_by_name() {
        let mut layers = LayerCollection::new();
        for name in ["B08", "B02", "DEM", "B11", "B04"] {
            layers.insert_sorted(layer(name, 0));
        }
        assert_eq!(
            layers.names().collect::<Vec<_>>(),
            ["B02", "B04", "B08", "B11", "DEM"]
        );
    }

    #[rstest]
    fn ordinal_comparison_puts_uppercase_first() {
        let mut layers = LayerCollection::new();
        layers.insert_sorted(layer("slope", 0));
        layers.insert_sorted(layer("Slope", 1));
        assert_eq!(layers.insert_sorted(layer("Slope", 2)), 1);
        assert_eq!(
            layers.iter().map(|layer| layer.band_number).collect::<Vec<_>>(),
            [1, 2, 0]
        );
    }

    #[rstest]
    fn remove_and_flags() {
        let mut layers = LayerCollection::new();
        layers.insert_sorted(layer("B02", 2));
        layers.insert_sorted(layer("B03", 3));
        assert!(layers.set_feature("B03", false));
        assert!(!layers.set_feature("B04", false));
        assert!(!layers.get("B03").unwrap().is_feature);

        let removed = layers.remove("B02").unwrap();
        assert_eq!(removed.band_number, 2);
        assert!(layers.remove("B02").is_none());
        assert_eq!(layers.len(), 1);
    }
}

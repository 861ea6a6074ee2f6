use geo::Coord;

use crate::{
    buffer::{PixelBuffer, PixelDomain},
    components::{histogram::BandStatistics, stretch::Cutoffs, transforms::GeoTransform},
    errors::{LandCoverError, Result},
};

/// A decoded band: pixels, statistics and georeferencing.
#[derive(Debug)]
pub struct RasterBand {
    shape: (usize, usize),
    buffer: PixelBuffer,
    statistics: Option<BandStatistics>,
    transform: GeoTransform,
    projection: Option<String>,
    cutoffs: Option<Cutoffs>,
    stretched: bool,
}

impl RasterBand {
    /// `shape` is `(width, height)`.
    pub fn new(
        shape: (usize, usize),
        buffer: PixelBuffer,
        transform: GeoTransform,
        projection: Option<String>,
    ) -> Result<Self> {
        let (width, height) = shape;
        if buffer.len() != width * height {
            return Err(LandCoverError::Dimension(format!(
                "{width}x{height} band can not hold {} pixels",
                buffer.len()
            )));
        }
        Ok(Self {
            shape,
            buffer,
            statistics: None,
            transform,
            projection,
            cutoffs: None,
            stretched: false,
        })
    }

    pub(crate) fn set_statistics(&mut self, statistics: Option<BandStatistics>) {
        self.statistics = statistics;
    }

    pub(crate) fn set_cutoffs(&mut self, cutoffs: Option<Cutoffs>) {
        self.cutoffs = cutoffs;
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut PixelBuffer {
        &mut self.buffer
    }

    pub(crate) fn mark_stretched(&mut self) {
        self.stretched = true;
    }

    pub fn width(&self) -> usize {
        self.shape.0
    }

    pub fn height(&self) -> usize {
        self.shape.1
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn domain(&self) -> PixelDomain {
        self.buffer.domain()
    }

    pub fn stride(&self) -> usize {
        self.domain().stride(self.width())
    }

    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    pub fn into_buffer(self) -> PixelBuffer {
        self.buffer
    }

    pub fn statistics(&self) -> Option<&BandStatistics> {
        self.statistics.as_ref()
    }

    pub fn min(&self) -> Option<f64> {
        self.statistics.as_ref().map(|statistics| statistics.min)
    }

    pub fn max(&self) -> Option<f64> {
        self.statistics.as_ref().map(|statistics| statistics.max)
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn projection(&self) -> Option<&str> {
        self.projection.as_deref()
    }

    /// Cut values computed at load time, whether or not they were applied.
    pub fn cutoffs(&self) -> Option<Cutoffs> {
        self.cutoffs
    }

    pub fn is_stretched(&self) -> bool {
        self.stretched
    }

    pub fn upper_left(&self) -> Coord {
        self.transform.upper_left()
    }

    pub fn bottom_right(&self) -> Coord {
        self.transform.bottom_right(self.shape)
    }

    pub fn contains(&self, col: usize, row: usize) -> bool {
        col < self.width() && row < self.height()
    }

    pub fn value(&self, col: usize, row: usize) -> Option<f64> {
        if !self.contains(col, row) {
            return None;
        }
        self.buffer.value(row * self.width() + col)
    }

    /// Discrete intensity used as a classification feature.
    ///
    /// Stretched float bands are scaled from `[0, 1]` to the full `u16`
    /// range, raw float bands are rounded and clamped.
    pub fn symbol(&self, col: usize, row: usize) -> Option<u16> {
        let value = self.value(col, row)?;
        let value = match (self.domain(), self.stretched) {
            (PixelDomain::Float32, true) => value * u16::MAX as f64,
            _ => value,
        };
        if value.is_nan() {
            return Some(0);
        }
        Some(value.round().clamp(0., u16::MAX as f64) as u16)
    }

    /// Pixel holding `world`, if any.
    pub fn pixel_at(&self, world: Coord) -> Result<Option<(usize, usize)>> {
        let pixel = self.transform.world_to_pixel(world)?;
        let (col, row) = (pixel.x.floor(), pixel.y.floor());
        if !col.is_finite() || !row.is_finite() || col < 0. || row < 0. {
            return Ok(None);
        }
        let (col, row) = (col as usize, row as usize);
        Ok(self.contains(col, row).then_some((col, row)))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rstest::rstest;

    pub(crate) fn band_from(
        shape: (usize, usize),
        buffer: impl Into<PixelBuffer>,
        coefficients: [f64; 6],
    ) -> RasterBand {
        RasterBand::new(
            shape,
            buffer.into(),
            GeoTransform::from_gdal(coefficients).unwrap(),
            None,
        )
        .unwrap()
    }

    #[rstest]
    fn buffer_length_must_match_shape() {
        let result = RasterBand::new(
            (3, 3),
            PixelBuffer::from(vec![0u16; 8]),
            GeoTransform::identity(),
            None,
        );
        assert!(matches!(result, Err(LandCoverError::Dimension(_))));
    }

    #[rstest]
    fn values_are_row_major() {
        let band = band_from((3, 2), vec![1u16, 2, 3, 4, 5, 6], [0., 1., 0., 0., 0., 1.]);
        assert_eq!(band.value(2, 0), Some(3.));
        assert_eq!(band.value(0, 1), Some(4.));
        assert_eq!(band.value(3, 0), None);
        assert_eq!(band.stride(), 6);
    }

    #[rstest]
    fn world_coordinates_map_to_pixels() {
        let band = band_from((4, 4), vec![0u8; 16], [100., 10., 0., 200., 0., -10.]);
        assert_eq!(band.pixel_at(Coord { x: 105., y: 195. }).unwrap(), Some((0, 0)));
        assert_eq!(band.pixel_at(Coord { x: 139.9, y: 160.1 }).unwrap(), Some((3, 3)));
        assert_eq!(band.pixel_at(Coord { x: 140., y: 195. }).unwrap(), None);
        assert_eq!(band.pixel_at(Coord { x: 99., y: 195. }).unwrap(), None);
        assert_eq!(band.upper_left(), Coord { x: 100., y: 200. });
        assert_eq!(band.bottom_right(), Coord { x: 140., y: 160. });
    }

    #[rstest]
    fn float_symbols_depend_on_stretch() {
        let mut band = band_from((2, 1), vec![0.5f32, 1200.4], [0., 1., 0., 0., 0., 1.]);
        assert_eq!(band.symbol(0, 0), Some(1));
        assert_eq!(band.symbol(1, 0), Some(1200));
        band.mark_stretched();
        assert_eq!(band.symbol(0, 0), Some(32768));
    }
}

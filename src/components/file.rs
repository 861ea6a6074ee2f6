use std::{fmt::Debug, path::Path};

use crate::{buffer::PixelBuffer, components::transforms::GeoTransform, errors::Result};

/// A raster file whose first band can be decoded into memory.
pub trait BandFile: Debug + Sized {
    fn open<P: AsRef<Path>>(path: P) -> Result<Self>;
    fn description(&self) -> String;
    /// `(width, height)` in pixels.
    fn shape(&self) -> (usize, usize);
    fn projection(&self) -> Option<String>;
    fn transform(&self) -> Result<GeoTransform>;
    fn read_buffer(&mut self) -> Result<PixelBuffer>;
}

use std::path::{Path, PathBuf};

use crate::{
    buffer::PixelBuffer,
    components::{file::BandFile, transforms::GeoTransform},
    errors::{LandCoverError, Result},
};

fn open_error(path: &Path, source: std::io::Error) -> LandCoverError {
    LandCoverError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// GeoTIFF decoding in pure Rust.
pub mod tiff_engine {
    use super::*;
    use std::{fmt::Debug, fs, io::BufReader};
    use tiff::{
        decoder::{Decoder, DecodingResult},
        tags::Tag,
        ColorType,
    };

    /// GDAL's default transform for rasters without georeferencing.
    const IDENTITY: [f64; 6] = [0., 1., 0., 0., 0., 1.];

    pub struct TiffFile {
        path: PathBuf,
        decoder: Decoder<BufReader<fs::File>>,
        shape: (usize, usize),
        coefficients: [f64; 6],
        projection: Option<String>,
    }

    impl Debug for TiffFile {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("TiffFile")
                .field("path", &self.path)
                .field("shape", &self.shape)
                .field("coefficients", &self.coefficients)
                .finish()
        }
    }

    fn f64_tag(decoder: &mut Decoder<BufReader<fs::File>>, tag: Tag) -> Result<Option<Vec<f64>>> {
        Ok(decoder
            .find_tag(tag)?
            .map(|value| value.into_f64_vec())
            .transpose()?)
    }

    /// Reads the affine coefficients from either the model transformation
    /// or the pixel scale and tie point tags.
    fn geo_coefficients(decoder: &mut Decoder<BufReader<fs::File>>) -> Result<[f64; 6]> {
        if let Some(matrix) = f64_tag(decoder, Tag::ModelTransformationTag)? {
            if matrix.len() >= 8 {
                return Ok([matrix[3], matrix[0], matrix[1], matrix[7], matrix[4], matrix[5]]);
            }
        }
        let scale = f64_tag(decoder, Tag::ModelPixelScaleTag)?;
        let tiepoint = f64_tag(decoder, Tag::ModelTiepointTag)?;
        match (scale, tiepoint) {
            (Some(scale), Some(tiepoint)) if scale.len() >= 2 && tiepoint.len() >= 6 => {
                let (col, row, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
                Ok([x - col * scale[0], scale[0], 0., y + row * scale[1], 0., -scale[1]])
            }
            _ => Ok(IDENTITY),
        }
    }

    impl BandFile for TiffFile {
        fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
            let path = path.as_ref();
            let file = fs::File::open(path).map_err(|source| open_error(path, source))?;
            let mut decoder = Decoder::new(BufReader::new(file))?;
            let (width, height) = decoder.dimensions()?;
            let coefficients = geo_coefficients(&mut decoder)?;
            let projection = decoder
                .find_tag(Tag::GeoAsciiParamsTag)?
                .map(|value| value.into_string())
                .transpose()?
                .map(|ascii| ascii.trim_end_matches(['|', '\0']).to_string())
                .filter(|ascii| !ascii.is_empty());
            Ok(TiffFile {
                path: path.to_path_buf(),
                decoder,
                shape: (width as usize, height as usize),
                coefficients,
                projection,
            })
        }

        fn description(&self) -> String {
            file_name(&self.path)
        }

        fn shape(&self) -> (usize, usize) {
            self.shape
        }

        fn projection(&self) -> Option<String> {
            self.projection.clone()
        }

        fn transform(&self) -> Result<GeoTransform> {
            GeoTransform::from_gdal(self.coefficients)
        }

        fn read_buffer(&mut self) -> Result<PixelBuffer> {
            match self.decoder.colortype()? {
                ColorType::Gray(_) => (),
                other => {
                    return Err(LandCoverError::Format(format!(
                        "{} has color type {other:?}, expected a single grayscale band",
                        self.description()
                    )))
                }
            }
            match self.decoder.read_image()? {
                DecodingResult::U8(data) => Ok(PixelBuffer::from(data)),
                DecodingResult::U16(data) => Ok(PixelBuffer::from(data)),
                DecodingResult::F32(data) => Ok(PixelBuffer::from(data)),
                _ => Err(LandCoverError::Format(format!(
                    "{} has an unsupported sample type",
                    self.description()
                ))),
            }
        }
    }
}

/// Decoding through GDAL, for every driver it ships with.
#[cfg(feature = "gdal")]
pub mod gdal_engine {
    use super::*;
    use gdal::{
        raster::{GdalDataType, GdalType, RasterBand as GdalRasterBand},
        Dataset as GdalDataset,
    };

    #[derive(Debug)]
    pub struct GdalFile {
        path: PathBuf,
        dataset: GdalDataset,
    }

    fn read_as<T: GdalType + Copy>(band: &GdalRasterBand, size: (usize, usize)) -> Result<Vec<T>> {
        let buffer = band.read_as::<T>((0, 0), size, size, None)?;
        Ok(buffer.into_shape_and_vec().1)
    }

    impl BandFile for GdalFile {
        fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
            let path = path.as_ref();
            if !path.exists() {
                return Err(open_error(
                    path,
                    std::io::Error::from(std::io::ErrorKind::NotFound),
                ));
            }
            Ok(GdalFile {
                path: path.to_path_buf(),
                dataset: GdalDataset::open(path)?,
            })
        }

        fn description(&self) -> String {
            file_name(&self.path)
        }

        fn shape(&self) -> (usize, usize) {
            self.dataset.raster_size()
        }

        fn projection(&self) -> Option<String> {
            Some(self.dataset.projection()).filter(|projection| !projection.is_empty())
        }

        fn transform(&self) -> Result<GeoTransform> {
            GeoTransform::from_gdal(self.dataset.geo_transform()?)
        }

        fn read_buffer(&mut self) -> Result<PixelBuffer> {
            let band = self.dataset.rasterband(1)?;
            let size = band.size();
            match band.band_type() {
                GdalDataType::UInt8 => Ok(PixelBuffer::from(read_as::<u8>(&band, size)?)),
                GdalDataType::UInt16 => Ok(PixelBuffer::from(read_as::<u16>(&band, size)?)),
                GdalDataType::Float32 => Ok(PixelBuffer::from(read_as::<f32>(&band, size)?)),
                other => Err(LandCoverError::Format(format!(
                    "{} has unsupported data type {other:?}",
                    self.description()
                ))),
            }
        }
    }
}

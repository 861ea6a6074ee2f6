use log::{debug, info, warn};
use std::path::Path;

use crate::{
    components::{
        band::RasterBand,
        composite::ChannelPlane,
        engines::tiff_engine::TiffFile,
        file::BandFile,
        histogram::BandStatistics,
        stretch::Cutoffs,
    },
    config::{Engine, LoadOptions, RgbChannel},
    errors::{LandCoverError, Result, StretchWarning},
};

/// Output of a single band load.
#[derive(Debug)]
pub struct LoadedBand {
    pub band: RasterBand,
    /// Set when a requested enhancement had to be skipped.
    pub warning: Option<StretchWarning>,
    pub plane: Option<ChannelPlane>,
}

/// Loads the first band of `path` with the engine named in `options`.
pub fn load<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Result<LoadedBand> {
    load_channel(path, options, None)
}

/// Like [load], additionally extracting an 8 bit plane for `channel` from
/// the pixels as decoded, before any band enhancement.
pub fn load_channel<P: AsRef<Path>>(
    path: P,
    options: &LoadOptions,
    channel: Option<RgbChannel>,
) -> Result<LoadedBand> {
    match options.engine {
        Engine::Tiff => load_with::<TiffFile, _>(path, options, channel),
        #[cfg(feature = "gdal")]
        Engine::Gdal => {
            load_with::<crate::components::engines::gdal_engine::GdalFile, _>(path, options, channel)
        }
        #[cfg(not(feature = "gdal"))]
        Engine::Gdal => Err(LandCoverError::Format(
            "the gdal engine requires the `gdal` feature".to_string(),
        )),
    }
}

pub fn load_with<F: BandFile, P: AsRef<Path>>(
    path: P,
    options: &LoadOptions,
    channel: Option<RgbChannel>,
) -> Result<LoadedBand> {
    let stretcher = options.stretcher()?;
    let mut file = F::open(&path)?;
    debug!("decoding {file:?}");
    let buffer = file.read_buffer()?;
    let mut band = RasterBand::new(file.shape(), buffer, file.transform()?, file.projection())?;

    let statistics = BandStatistics::scan(band.buffer());
    let checked = statistics
        .as_ref()
        .map_or(Err(StretchWarning::EmptyHistogram), |statistics| {
            stretcher.band_cutoffs(statistics)
        });
    band.set_statistics(statistics);
    band.set_cutoffs(match checked {
        Ok(cutoffs) => Some(cutoffs),
        Err(StretchWarning::Degenerate { min_cut, max_cut }) => Some(Cutoffs { min_cut, max_cut }),
        Err(StretchWarning::EmptyHistogram) => None,
    });

    let plane = match (channel, checked) {
        (Some(channel), Ok(cutoffs)) => Some(ChannelPlane::stretched(channel, &band, cutoffs)),
        _ => None,
    };

    let mut warning = None;
    if options.contrast_enhancement || channel.is_some() {
        match checked {
            Ok(cutoffs) if options.contrast_enhancement => {
                if stretcher.apply(band.buffer_mut(), cutoffs).is_ok() {
                    band.mark_stretched();
                }
            }
            Ok(_) => (),
            Err(skipped) => {
                warn!("{}: {skipped}", file.description());
                warning = Some(skipped);
            }
        }
    }

    info!(
        "loaded {} ({}x{} {:?}, cutoffs {:?}, stretched {})",
        file.description(),
        band.width(),
        band.height(),
        band.domain(),
        band.cutoffs(),
        band.is_stretched()
    );
    Ok(LoadedBand {
        band,
        warning,
        plane,
    })
}

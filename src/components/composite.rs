use rayon::prelude::*;

use crate::{
    components::{band::RasterBand, stretch::Cutoffs, transforms::GeoTransform},
    config::RgbChannel,
    errors::{LandCoverError, Result},
};

/// One color channel of the composite, stretched to 8 bits.
#[derive(Debug)]
pub struct ChannelPlane {
    pub channel: RgbChannel,
    pub shape: (usize, usize),
    pub transform: GeoTransform,
    pub data: Box<[u8]>,
}

impl ChannelPlane {
    pub fn stretched(channel: RgbChannel, band: &RasterBand, cutoffs: Cutoffs) -> Self {
        let min = cutoffs.min_cut as f64;
        let range = (cutoffs.max_cut as f64 - cutoffs.min_cut as f64).max(1.);
        let buffer = band.buffer();
        let data = (0..buffer.len())
            .into_par_iter()
            .map(|index| {
                let value = buffer.value(index).unwrap_or(min);
                ((value - min) / range * u8::MAX as f64)
                    .clamp(0., u8::MAX as f64)
                    .round() as u8
            })
            .collect::<Vec<u8>>()
            .into_boxed_slice();
        Self {
            channel,
            shape: band.shape(),
            transform: *band.transform(),
            data,
        }
    }
}

/// Opaque BGRA image built from up to three channel planes.
#[derive(Debug)]
pub struct RgbComposite {
    pub shape: (usize, usize),
    pub transform: GeoTransform,
    pub bgra: Box<[u8]>,
}

impl RgbComposite {
    /// Channels without a plane stay black. The first plane sets shape and
    /// transform.
    pub fn from_planes<'a, I>(planes: I) -> Result<Option<Self>>
    where
        I: IntoIterator<Item = &'a ChannelPlane>,
    {
        let planes = planes.into_iter().collect::<Vec<_>>();
        let Some(first) = planes.first() else {
            return Ok(None);
        };
        if let Some(plane) = planes.iter().find(|plane| plane.shape != first.shape) {
            return Err(LandCoverError::Dimension(format!(
                "{:?} channel is {:?}, composite is {:?}",
                plane.channel, plane.shape, first.shape
            )));
        }
        let (width, height) = first.shape;
        let mut bgra = vec![0u8; width * height * 4].into_boxed_slice();
        bgra.par_chunks_mut(4).enumerate().for_each(|(index, pixel)| {
            for plane in &planes {
                pixel[plane.channel.bgra_offset()] = plane.data[index];
            }
            pixel[3] = u8::MAX;
        });
        Ok(Some(Self {
            shape: first.shape,
            transform: first.transform,
            bgra,
        }))
    }

    pub fn stride(&self) -> usize {
        self.shape.0 * 4
    }

    pub fn pixel(&self, col: usize, row: usize) -> Option<[u8; 4]> {
        let offset = (row * self.shape.0 + col) * 4;
        (col < self.shape.0 && row < self.shape.1)
            .then(|| [self.bgra[offset], self.bgra[offset + 1], self.bgra[offset + 2], self.bgra[offset + 3]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::band::tests::band_from;
    use rstest::rstest;

    const GRID: [f64; 6] = [0., 1., 0., 2., 0., -1.];

    fn plane(channel: RgbChannel, values: Vec<u16>) -> ChannelPlane {
        let band = band_from((2, 1), values, GRID);
        ChannelPlane::stretched(channel, &band, Cutoffs { min_cut: 0, max_cut: 100 })
    }

    #[rstest]
    fn planes_fill_bgra_offsets() {
        let composite = RgbComposite::from_planes(&[
            plane(RgbChannel::Red, vec![100, 0]),
            plane(RgbChannel::Blue, vec![50, 200]),
        ])
        .unwrap()
        .unwrap();
        assert_eq!(composite.pixel(0, 0), Some([128, 0, 255, 255]));
        assert_eq!(composite.pixel(1, 0), Some([255, 0, 0, 255]));
        assert_eq!(composite.pixel(2, 0), None);
        assert_eq!(composite.stride(), 8);
        assert_eq!(composite.transform.to_gdal(), GRID);
    }

    #[rstest]
    fn mismatched_planes_are_rejected() {
        let small = plane(RgbChannel::Green, vec![1, 2]);
        let band = band_from((1, 1), vec![1u16], GRID);
        let single = ChannelPlane::stretched(RgbChannel::Red, &band, Cutoffs { min_cut: 0, max_cut: 1 });
        assert!(matches!(
            RgbComposite::from_planes(&[small, single]),
            Err(LandCoverError::Dimension(_))
        ));
        assert!(RgbComposite::from_planes(&Vec::<ChannelPlane>::new()).unwrap().is_none());
    }
}

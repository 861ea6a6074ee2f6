use std::collections::BTreeMap;

use log::warn;

use crate::buffer::PixelBuffer;

/// Widest float histogram kept, matching the `u16` symbol domain.
pub const MAX_FLOAT_BUCKETS: i64 = 1 << 16;

/// Unit-width histogram whose first bucket holds the value `min`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Histogram {
    min: i64,
    counts: Vec<u64>,
}

impl Histogram {
    pub fn new(min: i64, counts: Vec<u64>) -> Self {
        Self { min, counts }
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Intensity represented by bucket `index`.
    pub fn bucket_value(&self, index: usize) -> i64 {
        self.min + index as i64
    }
}

/// Min, max and histogram of a band, gathered in a single pass.
#[derive(Debug, Clone, PartialEq)]
pub struct BandStatistics {
    pub min: f64,
    pub max: f64,
    pub histogram: Histogram,
}

impl BandStatistics {
    /// Scans every pixel once. Returns `None` for a buffer without any
    /// finite pixel.
    ///
    /// Float pixels at `±f32::MAX`, the usual GeoTIFF nodata value, are
    /// skipped like NaN. A float band spanning more than
    /// [MAX_FLOAT_BUCKETS] keeps its min and max with an empty histogram.
    pub fn scan(buffer: &PixelBuffer) -> Option<Self> {
        match buffer {
            PixelBuffer::UInt8(data) => Self::scan_integer(data.iter().map(|v| *v as usize), 1 << 8),
            PixelBuffer::UInt16(data) => {
                Self::scan_integer(data.iter().map(|v| *v as usize), 1 << 16)
            }
            PixelBuffer::Float32(data) => Self::scan_float(data),
        }
    }

    fn scan_integer(values: impl Iterator<Item = usize>, domain_size: usize) -> Option<Self> {
        let mut counts = vec![0u64; domain_size];
        let (mut min, mut max) = (usize::MAX, usize::MIN);
        for value in values {
            counts[value] += 1;
            min = min.min(value);
            max = max.max(value);
        }
        if min > max {
            return None;
        }
        let histogram = Histogram::new(min as i64, counts[min..=max].to_vec());
        Some(Self {
            min: min as f64,
            max: max as f64,
            histogram,
        })
    }

    fn scan_float(data: &[f32]) -> Option<Self> {
        let mut buckets = BTreeMap::<i64, u64>::new();
        let (mut min, mut max) = (f64::INFINITY, f64::NEG_INFINITY);
        let valid = data
            .iter()
            .filter(|v| v.is_finite() && v.abs() < f32::MAX)
            .map(|v| *v as f64);
        for value in valid {
            *buckets.entry(value.floor() as i64).or_default() += 1;
            min = min.min(value);
            max = max.max(value);
        }
        let (first, last) = (*buckets.keys().next()?, *buckets.keys().next_back()?);
        if last.checked_sub(first).map_or(true, |span| span >= MAX_FLOAT_BUCKETS) {
            warn!("float band spans {min}..{max}, histogram left empty");
            return Some(Self {
                min,
                max,
                histogram: Histogram::new(first, Vec::new()),
            });
        }
        let counts = (first..=last)
            .map(|bucket| buckets.get(&bucket).copied().unwrap_or(0))
            .collect();
        Some(Self {
            min,
            max,
            histogram: Histogram::new(first, counts),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn integer_scan_trims_to_observed_range() {
        let buffer = PixelBuffer::from(vec![5u16, 7, 7, 9, 5, 5]);
        let statistics = BandStatistics::scan(&buffer).unwrap();
        assert_eq!((statistics.min, statistics.max), (5., 9.));
        assert_eq!(statistics.histogram.min(), 5);
        assert_eq!(statistics.histogram.counts(), &[3, 0, 2, 0, 1]);
        assert_eq!(statistics.histogram.total(), 6);
    }

    #[rstest]
    fn float_scan_buckets_by_floor_and_skips_nan() {
        let buffer = PixelBuffer::from(vec![-1.5f32, 0.2, 0.7, f32::NAN, 2.9]);
        let statistics = BandStatistics::scan(&buffer).unwrap();
        assert_eq!((statistics.min, statistics.max), (-1.5, 2.9f32 as f64));
        assert_eq!(statistics.histogram.min(), -2);
        assert_eq!(statistics.histogram.counts(), &[1, 0, 2, 0, 1]);
        assert_eq!(statistics.histogram.bucket_value(4), 2);
    }

    #[rstest]
    fn float_nodata_pixels_are_skipped() {
        let buffer = PixelBuffer::from(vec![-f32::MAX, 12.5, 13.5, f32::MAX]);
        let statistics = BandStatistics::scan(&buffer).unwrap();
        assert_eq!((statistics.min, statistics.max), (12.5, 13.5));
        assert_eq!(statistics.histogram.min(), 12);
        assert_eq!(statistics.histogram.counts(), &[1, 1]);
    }

    #[rstest]
    #[case(vec![0f32, 1e9])]
    #[case(vec![-3e38f32, 0.])]
    fn wide_float_band_keeps_extremes_only(#[case] values: Vec<f32>) {
        let (low, high) = (values[0] as f64, values[1] as f64);
        let statistics = BandStatistics::scan(&PixelBuffer::from(values)).unwrap();
        assert_eq!((statistics.min, statistics.max), (low, high));
        assert!(statistics.histogram.is_empty());
    }

    #[rstest]
    fn empty_buffer_has_no_statistics() {
        assert_eq!(BandStatistics::scan(&PixelBuffer::from(Vec::<u8>::new())), None);
        assert_eq!(BandStatistics::scan(&PixelBuffer::from(vec![f32::NAN])), None);
    }
}

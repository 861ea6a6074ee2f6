use log::{debug, warn};
use num_traits::{NumCast, ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::{
    buffer::{par_map_in_place, PixelBuffer},
    components::histogram::{BandStatistics, Histogram},
    errors::{LandCoverError, Result, StretchWarning},
};

pub const DEFAULT_LOW_PERCENTILE: f64 = 0.02;
pub const DEFAULT_HIGH_PERCENTILE: f64 = 0.98;
pub const DEFAULT_PARTITION_SIZE: usize = 1 << 16;

/// Intensities mapped to the bottom and top of the output range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cutoffs {
    pub min_cut: i64,
    pub max_cut: i64,
}

impl Cutoffs {
    pub fn is_degenerate(&self) -> bool {
        self.max_cut <= self.min_cut
    }
}

/// First buckets whose cumulative count reaches `low` and `high` of all pixels.
///
/// `None` if the histogram holds no pixel.
pub fn compute_cutoffs(histogram: &Histogram, low: f64, high: f64) -> Option<Cutoffs> {
    let total = histogram.total();
    if total == 0 {
        return None;
    }
    let (low_threshold, high_threshold) = (total as f64 * low, total as f64 * high);
    let (mut min_cut, mut max_cut) = (None, None);
    let mut cumulative = 0u64;
    for (bucket, count) in histogram.counts().iter().enumerate() {
        cumulative += count;
        if min_cut.is_none() && cumulative as f64 >= low_threshold {
            min_cut = Some(histogram.bucket_value(bucket));
        }
        if max_cut.is_none() && cumulative as f64 >= high_threshold {
            max_cut = Some(histogram.bucket_value(bucket));
            break;
        }
    }
    let last = histogram.bucket_value(histogram.counts().len().saturating_sub(1));
    Some(Cutoffs {
        min_cut: min_cut.unwrap_or(last),
        max_cut: max_cut.unwrap_or(last),
    })
}

/// How a band's cutoffs are picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StretchMode {
    /// Histogram percentiles, robust to a few outlier pixels.
    #[default]
    Percentile,
    /// The band's own extremes, for elevation models and other bands whose
    /// full range matters.
    MinMax,
}

/// Percentile or min/max contrast enhancement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContrastStretcher {
    mode: StretchMode,
    low_percentile: f64,
    high_percentile: f64,
    partition_size: usize,
}

impl Default for ContrastStretcher {
    fn default() -> Self {
        Self {
            mode: StretchMode::default(),
            low_percentile: DEFAULT_LOW_PERCENTILE,
            high_percentile: DEFAULT_HIGH_PERCENTILE,
            partition_size: DEFAULT_PARTITION_SIZE,
        }
    }
}

impl ContrastStretcher {
    pub fn new(low_percentile: f64, high_percentile: f64) -> Result<Self> {
        if !(0. ..=1.).contains(&low_percentile)
            || !(0. ..=1.).contains(&high_percentile)
            || low_percentile >= high_percentile
        {
            return Err(LandCoverError::InvalidOptions(format!(
                "percentiles must satisfy 0 <= low < high <= 1, got {low_percentile} and {high_percentile}"
            )));
        }
        Ok(Self {
            low_percentile,
            high_percentile,
            ..Default::default()
        })
    }

    /// Number of pixels rescaled by one parallel task.
    pub fn with_partition_size(mut self, partition_size: usize) -> Self {
        self.partition_size = partition_size.max(1);
        self
    }

    pub fn with_mode(mut self, mode: StretchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> StretchMode {
        self.mode
    }

    /// Percentile cutoffs of `histogram`, whatever the mode.
    pub fn cutoffs(&self, histogram: &Histogram) -> std::result::Result<Cutoffs, StretchWarning> {
        let cutoffs = compute_cutoffs(histogram, self.low_percentile, self.high_percentile)
            .ok_or(StretchWarning::EmptyHistogram)?;
        checked(cutoffs)
    }

    /// Cutoffs of a scanned band under the stretcher's mode. Min/max cutoffs
    /// round outwards to whole intensities.
    pub fn band_cutoffs(
        &self,
        statistics: &BandStatistics,
    ) -> std::result::Result<Cutoffs, StretchWarning> {
        match self.mode {
            StretchMode::Percentile => self.cutoffs(&statistics.histogram),
            StretchMode::MinMax => checked(Cutoffs {
                min_cut: statistics.min.floor() as i64,
                max_cut: statistics.max.ceil() as i64,
            }),
        }
    }

    /// Linearly maps `[min_cut, max_cut]` onto the full range of the buffer's
    /// domain, clamping everything outside. Degenerate cutoffs leave the
    /// buffer untouched.
    pub fn apply(
        &self,
        buffer: &mut PixelBuffer,
        cutoffs: Cutoffs,
    ) -> std::result::Result<(), StretchWarning> {
        if let Err(skipped) = checked(cutoffs) {
            warn!("skipping contrast enhancement with cutoffs {cutoffs:?}");
            return Err(skipped);
        }
        let min = cutoffs.min_cut as f64;
        let range = cutoffs.max_cut as f64 - cutoffs.min_cut as f64;
        let domain_max = buffer.domain().max_value();
        let scale = move |value: f64| ((value - min) / range * domain_max).clamp(0., domain_max);
        debug!(
            "stretching {} pixels of {:?} to {cutoffs:?}",
            buffer.len(),
            buffer.domain()
        );
        let partition_size = self.partition_size;
        match buffer {
            PixelBuffer::UInt8(data) => rescale(data, partition_size, |v| scale(v).round()),
            PixelBuffer::UInt16(data) => rescale(data, partition_size, |v| scale(v).round()),
            PixelBuffer::Float32(data) => rescale(data, partition_size, scale),
        }
        Ok(())
    }
}

fn checked(cutoffs: Cutoffs) -> std::result::Result<Cutoffs, StretchWarning> {
    if cutoffs.is_degenerate() {
        return Err(StretchWarning::Degenerate {
            min_cut: cutoffs.min_cut,
            max_cut: cutoffs.max_cut,
        });
    }
    Ok(cutoffs)
}

/// Pixels whose rescaled value does not fit `T` are left as they were.
fn rescale<T, F>(data: &mut [T], partition_size: usize, scale: F)
where
    T: Copy + Send + Sync + ToPrimitive + NumCast,
    F: Fn(f64) -> f64 + Send + Sync,
{
    par_map_in_place(data, partition_size, |value| {
        value
            .to_f64()
            .map(&scale)
            .and_then(<T as NumCast>::from)
            .unwrap_or(value)
    });
}

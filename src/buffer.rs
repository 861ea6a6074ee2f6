use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Numeric domain of a band's pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelDomain {
    UInt8,
    UInt16,
    /// Normalized to `[0, 1]` once stretched.
    Float32,
}

impl PixelDomain {
    pub fn byte_width(self) -> usize {
        match self {
            PixelDomain::UInt8 => 1,
            PixelDomain::UInt16 => 2,
            PixelDomain::Float32 => 4,
        }
    }

    /// Bytes per row of a band `width` pixels wide.
    pub fn stride(self, width: usize) -> usize {
        (width * self.byte_width() * 8 + 7) / 8
    }

    /// Upper bound of the stretched output range.
    pub fn max_value(self) -> f64 {
        match self {
            PixelDomain::UInt8 => u8::MAX as f64,
            PixelDomain::UInt16 => u16::MAX as f64,
            PixelDomain::Float32 => 1.0,
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(self, PixelDomain::Float32)
    }
}

/// Row-major pixels of a single band.
///
/// Not `Clone`: a buffer has exactly one owner at a time, first the
/// worker that decoded it, then the coordinator and the layer it commits.
#[derive(Debug, PartialEq)]
pub enum PixelBuffer {
    UInt8(Box<[u8]>),
    UInt16(Box<[u16]>),
    Float32(Box<[f32]>),
}

impl From<Vec<u8>> for PixelBuffer {
    fn from(value: Vec<u8>) -> Self {
        PixelBuffer::UInt8(value.into_boxed_slice())
    }
}

impl From<Vec<u16>> for PixelBuffer {
    fn from(value: Vec<u16>) -> Self {
        PixelBuffer::UInt16(value.into_boxed_slice())
    }
}

impl From<Vec<f32>> for PixelBuffer {
    fn from(value: Vec<f32>) -> Self {
        PixelBuffer::Float32(value.into_boxed_slice())
    }
}

impl PixelBuffer {
    pub fn domain(&self) -> PixelDomain {
        match self {
            PixelBuffer::UInt8(_) => PixelDomain::UInt8,
            PixelBuffer::UInt16(_) => PixelDomain::UInt16,
            PixelBuffer::Float32(_) => PixelDomain::Float32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PixelBuffer::UInt8(data) => data.len(),
            PixelBuffer::UInt16(data) => data.len(),
            PixelBuffer::Float32(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn byte_len(&self) -> usize {
        self.len() * self.domain().byte_width()
    }

    /// Value at `index` widened to `f64`.
    pub fn value(&self, index: usize) -> Option<f64> {
        match self {
            PixelBuffer::UInt8(data) => data.get(index).map(|v| *v as f64),
            PixelBuffer::UInt16(data) => data.get(index).map(|v| *v as f64),
            PixelBuffer::Float32(data) => data.get(index).map(|v| *v as f64),
        }
    }

    pub fn as_u16(&self) -> Option<&[u16]> {
        match self {
            PixelBuffer::UInt16(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            PixelBuffer::Float32(data) => Some(data),
            _ => None,
        }
    }
}

/// Rewrites every element of `data` with `f`, one rayon task per partition.
pub(crate) fn par_map_in_place<T, F>(data: &mut [T], partition_size: usize, f: F)
where
    T: Copy + Send + Sync,
    F: Fn(T) -> T + Send + Sync,
{
    data.par_chunks_mut(partition_size.max(1))
        .for_each(|partition| partition.iter_mut().for_each(|value| *value = f(*value)));
}

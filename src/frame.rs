//! Raw sensor frames, corrected frames, and the processing
//! step between them.
//!
//! A [`RawFrame`] is what a transport hands back: little
//! endian 16-bit samples at the sensor's native size,
//! status columns included. [`correct`] turns it into a
//! [`Frame`]: the variant's border is cropped, status bits
//! masked, and the flat-field table (if any) applied.
//! Processing never mutates its inputs and gives identical
//! output for identical inputs.

use std::fmt;

use byteordered::ByteOrdered;
use ndarray::{s, Array2, ArrayView2};
use serde_derive::*;

use crate::{
    calibration::Calibration,
    error::{Error, ReadError, Result},
    variant::CameraVariant,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Geometry {
    pub width: usize,
    pub height: usize,
}

impl Geometry {
    pub const fn new(width: usize, height: usize) -> Self {
        Geometry { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    fn of<T>(array: &Array2<T>) -> Self {
        let (height, width) = array.dim();
        Geometry { width, height }
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One unprocessed frame as read off the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub geometry: Geometry,
    /// Row-major, little-endian `u16` samples.
    pub data: Vec<u8>,
}

impl RawFrame {
    pub fn from_samples(geometry: Geometry, samples: &[u16]) -> Self {
        let mut data = Vec::with_capacity(samples.len() * 2);
        for sample in samples {
            data.extend_from_slice(&sample.to_le_bytes());
        }
        RawFrame { geometry, data }
    }

    /// Decode the payload into a `height x width` array.
    fn samples(&self) -> Result<Array2<u16>> {
        let Geometry { width, height } = self.geometry;
        let count = self.geometry.pixel_count();
        if self.data.len() != 2 * count {
            return Err(ReadError::Protocol(format!(
                "{} frame should carry {} bytes, got {}",
                self.geometry,
                2 * count,
                self.data.len()
            ))
            .into());
        }

        let mut rdr = ByteOrdered::le(&self.data[..]);
        let mut samples = Vec::with_capacity(count);
        for _ in 0..count {
            let sample = rdr
                .read_u16()
                .map_err(|e| ReadError::Protocol(e.to_string()))?;
            samples.push(sample);
        }
        Array2::from_shape_vec((height, width), samples)
            .map_err(|e| ReadError::Protocol(e.to_string()).into())
    }
}

/// A corrected frame: `height x width` samples in row-major
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pixels: Array2<u16>,
}

impl Frame {
    pub fn geometry(&self) -> Geometry {
        Geometry::of(&self.pixels)
    }

    pub fn pixels(&self) -> &Array2<u16> {
        &self.pixels
    }

    pub fn to_vec(&self) -> Vec<u16> {
        self.pixels.iter().copied().collect()
    }

    /// Copy the frame into `out` in row-major order and
    /// return the number of samples written. Nothing is
    /// written if `out` is too short.
    pub fn copy_to(&self, out: &mut [u16]) -> Result<usize> {
        let required = self.pixels.len();
        if out.len() < required {
            return Err(Error::BufferTooSmall {
                required,
                capacity: out.len(),
            });
        }
        match self.pixels.as_slice() {
            Some(slice) => out[..required].copy_from_slice(slice),
            None => {
                for (dst, src) in out.iter_mut().zip(self.pixels.iter()) {
                    *dst = *src;
                }
            }
        }
        Ok(required)
    }
}

/// Crop the variant's border off and mask status bits.
fn normalize(variant: CameraVariant, raw: ArrayView2<u16>) -> Result<Array2<u16>> {
    let (height, width) = raw.dim();
    let raw_geometry = Geometry { width, height };
    let border = variant.border();
    let inner = border.inner(raw_geometry).ok_or_else(|| {
        Error::from(ReadError::Protocol(format!(
            "{} frame is too small for a {} sensor",
            raw_geometry, variant
        )))
    })?;

    let mask = variant.sample_mask();
    let active = raw.slice(s![
        border.top..border.top + inner.height,
        border.left..border.left + inner.width
    ]);
    Ok(active.mapv(|v| v & mask))
}

/// Turn a raw frame into a corrected one.
///
/// If `expected` is given, the cropped frame must have that
/// geometry; a different size is reported as
/// [`Error::GeometryMismatch`], never cropped or padded to
/// fit.
pub fn correct(
    raw: &RawFrame,
    variant: CameraVariant,
    calibration: &Calibration,
    expected: Option<Geometry>,
) -> Result<Frame> {
    let samples = raw.samples()?;
    let normalized = normalize(variant, samples.view())?;
    let actual = Geometry::of(&normalized);
    if let Some(expected) = expected {
        if expected != actual {
            return Err(Error::GeometryMismatch { expected, actual });
        }
    }

    let pixels = match calibration {
        Calibration::NoCorrection => normalized,
        Calibration::Table(table) => table.apply(variant, normalized.view())?,
    };
    Ok(Frame { pixels })
}

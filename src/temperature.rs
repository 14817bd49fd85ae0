//! Raw counts to temperature, and where a frame is hottest
//! and coldest.

use serde_derive::*;

use crate::frame::Frame;

const CELSIUS_OFFSET: f64 = 273.15;

/// Linear approximation from corrected counts to degrees
/// Celsius: `counts * scale - offset`.
///
/// The defaults are a rough fit (counts to Kelvin at
/// `0.04 K` per count); an absolute calibration curve should
/// override them through the config file.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct TemperatureModel {
    pub scale: f64,
    pub offset: f64,
}

impl Default for TemperatureModel {
    fn default() -> Self {
        TemperatureModel {
            scale: 0.04,
            offset: CELSIUS_OFFSET,
        }
    }
}

impl TemperatureModel {
    #[inline]
    pub fn to_celsius(&self, counts: u16) -> f64 {
        f64::from(counts) * self.scale - self.offset
    }
}

/// An extreme sample and its position in the frame.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Hotspot {
    pub celsius: f64,
    pub row: usize,
    pub col: usize,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Hotspots {
    pub min: Hotspot,
    pub max: Hotspot,
}

impl Hotspots {
    /// Coldest and hottest pixels of `frame`. Ties go to the
    /// first pixel in row-major order. `None` for an empty
    /// frame.
    pub fn from_frame(frame: &Frame, model: &TemperatureModel) -> Option<Self> {
        let mut iter = frame.pixels().indexed_iter();
        let (first, &val) = iter.next()?;
        let (mut min, mut max) = ((first, val), (first, val));
        for (idx, &val) in iter {
            if val < min.1 {
                min = (idx, val);
            }
            if val > max.1 {
                max = (idx, val);
            }
        }

        let spot = |((row, col), counts): ((usize, usize), u16)| Hotspot {
            celsius: model.to_celsius(counts),
            row,
            col,
        };
        Some(Hotspots {
            min: spot(min),
            max: spot(max),
        })
    }
}

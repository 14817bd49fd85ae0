//! Camera variants and their raw frame layout.

use std::{convert::TryFrom, fmt, str::FromStr};

use anyhow::{bail, Error, Result};
use serde_derive::*;

use crate::frame::Geometry;

/// Border cropped off a raw sensor frame before it becomes
/// part of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Border {
    pub left: usize,
    pub right: usize,
    pub top: usize,
    pub bottom: usize,
}

impl Border {
    /// Geometry left after cropping a `raw` frame, or `None`
    /// if the frame is not larger than the border.
    pub fn inner(&self, raw: Geometry) -> Option<Geometry> {
        let width = raw.width.checked_sub(self.left + self.right)?;
        let height = raw.height.checked_sub(self.top + self.bottom)?;
        if width == 0 || height == 0 {
            return None;
        }
        Some(Geometry { width, height })
    }
}

/// The supported camera models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CameraVariant {
    /// Seek Compact / CompactXR.
    Compact,
    /// Seek CompactPRO.
    Pro,
}

impl CameraVariant {
    /// Decode the numeric code used across the C ABI.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(CameraVariant::Compact),
            1 => Some(CameraVariant::Pro),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            CameraVariant::Compact => 0,
            CameraVariant::Pro => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CameraVariant::Compact => "seek",
            CameraVariant::Pro => "seekpro",
        }
    }

    /// Size of the frames the sensor sends, status columns
    /// and rows included.
    pub fn raw_geometry(self) -> Geometry {
        match self {
            CameraVariant::Compact => Geometry::new(208, 156),
            CameraVariant::Pro => Geometry::new(342, 260),
        }
    }

    pub fn border(self) -> Border {
        match self {
            // two trailing status columns
            CameraVariant::Compact => Border {
                left: 0,
                right: 2,
                top: 0,
                bottom: 0,
            },
            CameraVariant::Pro => Border {
                left: 1,
                right: 21,
                top: 4,
                bottom: 16,
            },
        }
    }

    /// Bits of a raw sample that carry the measurement; the
    /// Pro uses the top two bits for status flags.
    pub fn sample_mask(self) -> u16 {
        match self {
            CameraVariant::Compact => 0xffff,
            CameraVariant::Pro => 0x3fff,
        }
    }

    /// Largest value a corrected sample may take.
    pub fn max_sample(self) -> u16 {
        self.sample_mask()
    }
}

impl fmt::Display for CameraVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CameraVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "seek" | "seekcompact" | "compactxr" | "compact" => CameraVariant::Compact,
            "seekpro" | "compactpro" | "pro" => CameraVariant::Pro,
            _ => bail!("unsupported camera type: {:?}", s),
        })
    }
}

impl TryFrom<String> for CameraVariant {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<CameraVariant> for String {
    fn from(v: CameraVariant) -> String {
        v.name().to_string()
    }
}

//! Flat-field calibration.
//!
//! A calibration is either absent ([`Calibration::NoCorrection`])
//! or a per-pixel table of offsets and gains. Corrected
//! samples are computed as
//!
//! ```text
//! out = clamp(round((raw - offset) * gain), 0, max_sample)
//! ```
//!
//! Two on-disk formats are understood, told apart by their
//! leading bytes:
//!
//! - a 16-bit grayscale PNG holding a flat-field frame `f`
//!   (what the Seek tools save). It yields `offset = f - 0x4000`
//!   and unit gains, so the correction is `raw + 0x4000 - f`.
//! - a `TCAL` table, all little endian:
//!   - 0x00: magic `"TCAL"`
//!   - 0x04: u16 version = 1
//!   - 0x06: u16 width
//!   - 0x08: u16 height
//!   - 0x0a: u16 reserved, must be 0
//!   - 0x0c: f32[width * height] offsets, row-major
//!   - ....: f32[width * height] gains, row-major

use std::{
    fs,
    io::{Cursor, Write},
    path::Path,
    sync::Arc,
};

use anyhow::{bail, ensure, Context, Result};
use byteordered::ByteOrdered;
use log::debug;
use ndarray::{Array2, ArrayView2, Zip};

use crate::{
    error::Error,
    frame::Geometry,
    parse::{parse_many, Parseable},
    variant::CameraVariant,
};

const PNG_SIGNATURE: &[u8; 8] = b"\x89PNG\r\n\x1a\n";
const TCAL_MAGIC: &[u8; 4] = b"TCAL";
const TCAL_VERSION: u16 = 1;
const TCAL_HEADER_LEN: usize = 12;

/// Level the flat-field frame is normalized to.
const FLAT_FIELD_LEVEL: f32 = 16384.;

declare_parseable_record! {
    struct TcalHeader {
        magic: [u8; 4],
        version: u16,
        width: u16,
        height: u16,
        reserved: u16,
    }
}

/// Calibration of one session; shared read-only across
/// reads.
#[derive(Debug, Clone)]
pub enum Calibration {
    NoCorrection,
    Table(Arc<CalibrationTable>),
}

impl Calibration {
    pub fn is_correcting(&self) -> bool {
        matches!(self, Calibration::Table(_))
    }

    pub fn geometry(&self) -> Option<Geometry> {
        match self {
            Calibration::NoCorrection => None,
            Calibration::Table(table) => Some(table.geometry()),
        }
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Calibration::NoCorrection
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationTable {
    offsets: Array2<f32>,
    gains: Array2<f32>,
}

impl CalibrationTable {
    /// Build a table from `height x width` offsets and gains.
    pub fn new(offsets: Array2<f32>, gains: Array2<f32>) -> Result<Self> {
        ensure!(
            offsets.dim() == gains.dim(),
            "offset table is {:?} but gain table is {:?}",
            offsets.dim(),
            gains.dim()
        );
        ensure!(!offsets.is_empty(), "calibration table is empty");
        ensure!(
            offsets.iter().all(|v| v.is_finite()),
            "non-finite calibration offset"
        );
        ensure!(
            gains.iter().all(|v| v.is_finite()),
            "non-finite calibration gain"
        );
        Ok(CalibrationTable { offsets, gains })
    }

    /// Table that leaves every sample unchanged.
    pub fn identity(geometry: Geometry) -> Self {
        let shape = (geometry.height, geometry.width);
        CalibrationTable {
            offsets: Array2::zeros(shape),
            gains: Array2::ones(shape),
        }
    }

    /// Table derived from a flat-field frame.
    pub fn from_flat_field(flat: ArrayView2<u16>) -> Result<Self> {
        let offsets = flat.mapv(|f| f32::from(f) - FLAT_FIELD_LEVEL);
        let gains = Array2::ones(flat.dim());
        Self::new(offsets, gains)
    }

    pub fn geometry(&self) -> Geometry {
        let (height, width) = self.offsets.dim();
        Geometry::new(width, height)
    }

    pub fn offsets(&self) -> &Array2<f32> {
        &self.offsets
    }

    pub fn gains(&self) -> &Array2<f32> {
        &self.gains
    }

    pub(crate) fn apply(
        &self,
        variant: CameraVariant,
        frame: ArrayView2<u16>,
    ) -> crate::error::Result<Array2<u16>> {
        let (height, width) = frame.dim();
        let actual = Geometry::new(width, height);
        if actual != self.geometry() {
            return Err(Error::GeometryMismatch {
                expected: self.geometry(),
                actual,
            });
        }

        let max = f32::from(variant.max_sample());
        Ok(Zip::from(frame)
            .and(&self.offsets)
            .and(&self.gains)
            .par_map_collect(move |&raw, &offset, &gain| {
                let val = ((f32::from(raw) - offset) * gain).round();
                val.max(0.).min(max) as u16
            }))
    }

    /// Serialize as a `TCAL` table.
    pub fn write_tcal<W: Write>(&self, writer: W) -> Result<()> {
        let Geometry { width, height } = self.geometry();
        ensure!(
            width <= u16::MAX as usize && height <= u16::MAX as usize,
            "table of {} does not fit a TCAL header",
            self.geometry()
        );

        let mut wtr = ByteOrdered::le(writer);
        wtr.write_all(TCAL_MAGIC)?;
        wtr.write_u16(TCAL_VERSION)?;
        wtr.write_u16(width as u16)?;
        wtr.write_u16(height as u16)?;
        wtr.write_u16(0)?;
        for val in self.offsets.iter().chain(self.gains.iter()) {
            wtr.write_f32(*val)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Load the calibration at `path`.
///
/// A missing or empty path means no correction. A path
/// that cannot be read or parsed is an error.
pub fn load(path: Option<&Path>) -> Result<Calibration> {
    let path = match path {
        Some(path) if !path.as_os_str().is_empty() => path,
        _ => {
            debug!("no flat-field calibration configured");
            return Ok(Calibration::NoCorrection);
        }
    };

    let bytes =
        fs::read(path).with_context(|| format!("reading calibration `{}`", path.display()))?;
    let table =
        parse_table(&bytes).with_context(|| format!("parsing calibration `{}`", path.display()))?;
    debug!(
        "loaded {} calibration table from {}",
        table.geometry(),
        path.display()
    );
    Ok(Calibration::Table(Arc::new(table)))
}

fn parse_table(bytes: &[u8]) -> Result<CalibrationTable> {
    if bytes.starts_with(PNG_SIGNATURE) {
        parse_flat_field_png(bytes)
    } else if bytes.starts_with(TCAL_MAGIC) {
        parse_tcal(bytes)
    } else {
        bail!("unrecognized calibration format")
    }
}

fn parse_flat_field_png(bytes: &[u8]) -> Result<CalibrationTable> {
    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::IDENTITY);
    let (info, mut reader) = decoder.read_info()?;
    ensure!(
        info.color_type == png::ColorType::Grayscale && info.bit_depth == png::BitDepth::Sixteen,
        "flat-field must be 16-bit grayscale, found {:?} / {:?}",
        info.color_type,
        info.bit_depth
    );

    let mut buf = vec![0; info.buffer_size()];
    reader.next_frame(&mut buf)?;

    let width = info.width as usize;
    let height = info.height as usize;
    let samples: Vec<u16> = parse_many(&mut ByteOrdered::be(&buf[..]), width * height)
        .context("reading flat-field samples")?;
    let flat = Array2::from_shape_vec((height, width), samples)?;
    CalibrationTable::from_flat_field(flat.view())
}

fn parse_tcal(bytes: &[u8]) -> Result<CalibrationTable> {
    let mut rdr = ByteOrdered::le(bytes);
    let hdr = TcalHeader::parse(&mut rdr)?;
    ensure!(&hdr.magic == TCAL_MAGIC, "unexpected signature in TCAL header");
    ensure!(
        hdr.version == TCAL_VERSION,
        "unsupported TCAL version: {}",
        hdr.version
    );
    ensure!(
        hdr.reserved == 0,
        "reserved TCAL header field is {:#06x}, expected 0",
        hdr.reserved
    );

    let width = hdr.width as usize;
    let height = hdr.height as usize;
    ensure!(width > 0 && height > 0, "TCAL table has zero size");

    let count = width * height;
    let expected = TCAL_HEADER_LEN + 2 * count * 4;
    ensure!(
        bytes.len() == expected,
        "TCAL {}x{} table should be {} bytes, found {}",
        width,
        height,
        expected,
        bytes.len()
    );

    let offsets: Vec<f32> = parse_many(&mut rdr, count).context("reading offsets")?;
    let gains: Vec<f32> = parse_many(&mut rdr, count).context("reading gains")?;
    CalibrationTable::new(
        Array2::from_shape_vec((height, width), offsets)?,
        Array2::from_shape_vec((height, width), gains)?,
    )
}

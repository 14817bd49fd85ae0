//! Acquisition pipeline for Seek Compact / Pro thermal
//! cameras.
//!
//! The crate owns a camera session end to end: it loads the
//! flat-field [calibration], opens the [device] through a
//! [transport], fixes the frame geometry from a warm-up
//! read, and serves corrected 16-bit [frame]s until the
//! session is closed.
//!
//! # Usage
//!
//! ```rust
//! # fn test_compile() -> anyhow::Result<()> {
//! use thermal_capture::{AcquisitionPipeline, CameraVariant};
//!
//! let mut camera = AcquisitionPipeline::open(CameraVariant::Compact, None)?;
//! let (width, height) = camera.dimensions()?;
//! let mut buf = vec![0u16; width * height];
//! camera.read_into(&mut buf)?;
//! camera.close();
//! # Ok(())
//! # }
//! ```
//!
//! Sessions can also be managed through opaque handles via
//! [`SessionManager`], which is what the C ABI in [`ffi`]
//! uses.
//!
//! ## Failures
//!
//! Every failure to open unwinds fully: no half-open
//! session is ever returned. Once open, a
//! [timeout](ReadError::Timeout) can simply be retried,
//! while a [lost transport](ReadError::TransportLost)
//! latches the session and every later read fails with
//! [`Error::SessionClosed`].

#[macro_use]
mod parse;

pub mod calibration;
pub mod config;
pub mod device;
pub mod error;
pub mod ffi;
pub mod frame;
pub mod manager;
pub mod pipeline;
pub mod stats;
pub mod temperature;
pub mod transport;
pub mod variant;

pub mod cli;

pub use crate::calibration::{Calibration, CalibrationTable};
pub use crate::error::{Error, OpenError, ReadError, Result};
pub use crate::frame::{Frame, Geometry, RawFrame};
pub use crate::manager::{Handle, SessionManager};
pub use crate::pipeline::AcquisitionPipeline;
pub use crate::temperature::TemperatureModel;
pub use crate::variant::CameraVariant;

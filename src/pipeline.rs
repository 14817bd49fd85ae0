//! A single acquisition session: device, calibration, and
//! the frame geometry they agreed on.

use std::path::Path;

use log::{debug, error, info, warn};

use crate::{
    calibration::{self, Calibration},
    device::DeviceSession,
    error::{Error, ReadError, Result},
    frame::{correct, Frame, Geometry},
    transport::{Connector, SyntheticConnector},
    variant::CameraVariant,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    Ready,
    /// The transport was lost; nothing more will be read.
    Failed,
    Closed,
}

/// Owns one open camera and serves corrected frames from it.
///
/// Construction either yields a pipeline whose geometry is
/// known (from a warm-up frame), or an error with every
/// acquired resource already released.
pub struct AcquisitionPipeline {
    device: DeviceSession,
    calibration: Calibration,
    geometry: Geometry,
    state: PipelineState,
}

impl AcquisitionPipeline {
    /// Open a camera through the synthetic development
    /// transport.
    pub fn open(variant: CameraVariant, calibration_path: Option<&Path>) -> Result<Self> {
        Self::open_with(&SyntheticConnector, variant, calibration_path)
    }

    pub fn open_with(
        connector: &dyn Connector,
        variant: CameraVariant,
        calibration_path: Option<&Path>,
    ) -> Result<Self> {
        let calibration = calibration::load(calibration_path).map_err(|e| {
            error!("could not load calibration: {:#}", e);
            Error::Config(e)
        })?;
        let mut device = DeviceSession::open(variant, connector)?;

        // The first frame fixes the geometry for the session.
        let warm_up = device
            .read_raw()
            .map_err(Error::from)
            .and_then(|raw| correct(&raw, variant, &calibration, calibration.geometry()));
        let geometry = match warm_up {
            Ok(frame) => frame.geometry(),
            Err(e) => {
                warn!("warm-up read on {} camera failed: {}", variant, e);
                device.close();
                return Err(e);
            }
        };
        debug!(
            "{} camera streaming {} frames (calibrated: {})",
            variant,
            geometry,
            calibration.is_correcting()
        );

        Ok(AcquisitionPipeline {
            device,
            calibration,
            geometry,
            state: PipelineState::Ready,
        })
    }

    pub fn variant(&self) -> CameraVariant {
        self.device.variant()
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// `(width, height)` of the frames this session serves.
    pub fn dimensions(&self) -> Result<(usize, usize)> {
        match self.state {
            PipelineState::Closed => Err(Error::SessionClosed),
            _ => Ok((self.geometry.width, self.geometry.height)),
        }
    }

    /// Whether a later read may still succeed.
    pub fn is_usable(&self) -> bool {
        self.state == PipelineState::Ready
    }

    /// Read and correct the next frame.
    pub fn read_frame(&mut self) -> Result<Frame> {
        if self.state != PipelineState::Ready {
            return Err(Error::SessionClosed);
        }

        let raw = match self.device.read_raw() {
            Ok(raw) => raw,
            Err(e) => return Err(self.read_failed(e)),
        };
        correct(&raw, self.variant(), &self.calibration, Some(self.geometry))
    }

    /// Read the next frame straight into `out`; returns the
    /// number of samples written.
    ///
    /// A buffer shorter than one frame is rejected before any
    /// I/O, so no frame is consumed and `out` is untouched.
    pub fn read_into(&mut self, out: &mut [u16]) -> Result<usize> {
        let required = self.geometry.pixel_count();
        if self.state == PipelineState::Ready && out.len() < required {
            return Err(Error::BufferTooSmall {
                required,
                capacity: out.len(),
            });
        }
        self.read_frame()?.copy_to(out)
    }

    fn read_failed(&mut self, err: ReadError) -> Error {
        if err.is_terminal() {
            error!(
                "{} camera lost, closing session: {}",
                self.variant(),
                err
            );
            self.state = PipelineState::Failed;
            self.device.close();
        } else {
            warn!("{} camera read failed: {}", self.variant(), err);
        }
        Error::Read(err)
    }

    /// Release the camera. Idempotent.
    pub fn close(&mut self) {
        if self.state != PipelineState::Closed {
            info!("closing {} pipeline", self.variant());
        }
        self.device.close();
        self.state = PipelineState::Closed;
    }
}

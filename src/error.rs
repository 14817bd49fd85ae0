//! Error taxonomy of the acquisition pipeline.
//!
//! Loaders inside the crate work with [`anyhow`]; the
//! session boundary reports the typed [`Error`] so that
//! callers (and the C ABI) can tell a retriable timeout
//! from a lost camera.

use std::fmt;

use crate::frame::Geometry;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure to bring up a device session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenError {
    /// No camera of the requested variant is attached.
    DeviceNotFound,
    /// The device exists but could not be claimed
    /// (permissions, already in use).
    ClaimFailed(String),
    /// The device answered the handshake with a firmware
    /// we do not speak.
    UnsupportedFirmware(String),
}

impl fmt::Display for OpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenError::DeviceNotFound => write!(f, "device not found"),
            OpenError::ClaimFailed(msg) => write!(f, "could not claim device: {}", msg),
            OpenError::UnsupportedFirmware(msg) => write!(f, "unsupported firmware: {}", msg),
        }
    }
}

impl std::error::Error for OpenError {}

/// Failure of a single transport transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// No frame arrived in time. The session is still usable.
    Timeout,
    /// The link to the camera is gone; the session must be
    /// reopened.
    TransportLost(String),
    /// The camera answered with something that is not a
    /// well-formed frame.
    Protocol(String),
}

impl ReadError {
    /// Whether the session can keep reading after this error.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReadError::TransportLost(_))
    }
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::Timeout => write!(f, "timed out waiting for frame"),
            ReadError::TransportLost(msg) => write!(f, "transport lost: {}", msg),
            ReadError::Protocol(msg) => write!(f, "protocol error: {}", msg),
        }
    }
}

impl std::error::Error for ReadError {}

#[derive(Debug)]
pub enum Error {
    /// Calibration path or content is unusable.
    Config(anyhow::Error),
    Open(OpenError),
    Read(ReadError),
    /// Frame geometry differs from the one established at
    /// open (or from the calibration table).
    GeometryMismatch { expected: Geometry, actual: Geometry },
    /// Caller buffer cannot hold a full frame.
    BufferTooSmall { required: usize, capacity: usize },
    InvalidHandle,
    /// The session was closed or latched after a lost
    /// transport.
    SessionClosed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(err) => write!(f, "calibration error: {:#}", err),
            Error::Open(err) => write!(f, "open failed: {}", err),
            Error::Read(err) => write!(f, "read failed: {}", err),
            Error::GeometryMismatch { expected, actual } => write!(
                f,
                "geometry mismatch: expected {}, got {}",
                expected, actual
            ),
            Error::BufferTooSmall { required, capacity } => write!(
                f,
                "buffer too small: need {} samples, have {}",
                required, capacity
            ),
            Error::InvalidHandle => write!(f, "invalid handle"),
            Error::SessionClosed => write!(f, "session closed"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(err) => {
                let source: &(dyn std::error::Error + 'static) = &**err;
                Some(source)
            }
            Error::Open(err) => Some(err),
            Error::Read(err) => Some(err),
            _ => None,
        }
    }
}

impl From<OpenError> for Error {
    fn from(err: OpenError) -> Self {
        Error::Open(err)
    }
}

impl From<ReadError> for Error {
    fn from(err: ReadError) -> Self {
        Error::Read(err)
    }
}

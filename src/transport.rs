//! Transport abstraction for camera sessions.
//!
//! A [`Transport`] is one claimed link to one camera: it
//! answers a handshake and then hands out raw frames, one
//! blocking transaction at a time. A [`Connector`] finds
//! and claims a camera of a given variant. The USB protocol
//! itself lives behind these traits; the crate ships
//!
//! - [`SyntheticConnector`]: a development camera producing
//!   moving gradients, for work without hardware.
//! - [`ScriptedConnector`]: plays back a fixed script of
//!   frames and failures, and counts the I/O it performs.
//! - [`NoDeviceConnector`]: never finds a camera.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use itertools::iproduct;

use crate::{
    error::{OpenError, ReadError},
    frame::{Geometry, RawFrame},
    variant::CameraVariant,
};

/// One claimed link to a camera.
pub trait Transport: Send {
    /// Bring the camera into streaming mode.
    fn handshake(&mut self) -> Result<(), OpenError>;

    /// Block until the next raw frame arrives.
    fn read_frame(&mut self) -> Result<RawFrame, ReadError>;

    /// Release the link. Called at most once.
    fn close(&mut self);
}

/// Finds and claims cameras.
pub trait Connector: Send + Sync {
    fn connect(&self, variant: CameraVariant) -> Result<Box<dyn Transport>, OpenError>;
}

pub struct NoDeviceConnector;

impl Connector for NoDeviceConnector {
    fn connect(&self, _variant: CameraVariant) -> Result<Box<dyn Transport>, OpenError> {
        Err(OpenError::DeviceNotFound)
    }
}

/// Connector for [`SyntheticTransport`]s; always succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyntheticConnector;

impl Connector for SyntheticConnector {
    fn connect(&self, variant: CameraVariant) -> Result<Box<dyn Transport>, OpenError> {
        Ok(Box::new(SyntheticTransport::new(variant)))
    }
}

/// Development camera: a gradient that rotates a little on
/// every frame, at the variant's raw sensor size.
#[derive(Debug)]
pub struct SyntheticTransport {
    geometry: Geometry,
    phase: f32,
}

impl SyntheticTransport {
    pub fn new(variant: CameraVariant) -> Self {
        SyntheticTransport {
            geometry: variant.raw_geometry(),
            phase: 0.,
        }
    }
}

fn ramp(idx: usize, len: usize) -> f32 {
    if len < 2 {
        0.
    } else {
        idx as f32 * f32::from(u16::MAX) / (len - 1) as f32
    }
}

impl Transport for SyntheticTransport {
    fn handshake(&mut self) -> Result<(), OpenError> {
        Ok(())
    }

    fn read_frame(&mut self) -> Result<RawFrame, ReadError> {
        let Geometry { width, height } = self.geometry;
        let (sin, cos) = self.phase.sin_cos();
        let samples: Vec<u16> = iproduct!(0..height, 0..width)
            .map(|(row, col)| {
                let val = ramp(col, width) * sin + ramp(row, height) * cos;
                val.max(0.).min(f32::from(u16::MAX)) as u16
            })
            .collect();
        self.phase += 0.1;
        Ok(RawFrame::from_samples(self.geometry, &samples))
    }

    fn close(&mut self) {}
}

/// Counters shared between a [`ScriptedTransport`] and the
/// test observing it.
#[derive(Debug, Clone, Default)]
pub struct TransportProbe {
    reads: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl TransportProbe {
    /// Number of read transactions attempted.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of times the transport was closed.
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Transport playing back a fixed sequence of read results.
///
/// Once the script runs out it repeats the idle frame if one
/// was given, and reports a lost transport otherwise.
#[derive(Debug)]
pub struct ScriptedTransport {
    steps: VecDeque<Result<RawFrame, ReadError>>,
    idle: Option<RawFrame>,
    handshake: Result<(), OpenError>,
    probe: TransportProbe,
}

impl ScriptedTransport {
    pub fn new<I>(steps: I) -> Self
    where
        I: IntoIterator<Item = Result<RawFrame, ReadError>>,
    {
        ScriptedTransport {
            steps: steps.into_iter().collect(),
            idle: None,
            handshake: Ok(()),
            probe: TransportProbe::default(),
        }
    }

    /// Transport returning `frame` forever.
    pub fn repeating(frame: RawFrame) -> Self {
        Self::new(None).then_repeat(frame)
    }

    pub fn then_repeat(mut self, frame: RawFrame) -> Self {
        self.idle = Some(frame);
        self
    }

    pub fn failing_handshake(mut self, err: OpenError) -> Self {
        self.handshake = Err(err);
        self
    }

    pub fn probe(&self) -> TransportProbe {
        self.probe.clone()
    }
}

impl Transport for ScriptedTransport {
    fn handshake(&mut self) -> Result<(), OpenError> {
        self.handshake.clone()
    }

    fn read_frame(&mut self) -> Result<RawFrame, ReadError> {
        self.probe.reads.fetch_add(1, Ordering::SeqCst);
        match self.steps.pop_front() {
            Some(step) => step,
            None => self
                .idle
                .clone()
                .ok_or_else(|| ReadError::TransportLost("script exhausted".into())),
        }
    }

    fn close(&mut self) {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Connector handing out prepared transports in order; once
/// they are used up no device is found.
#[derive(Debug, Default)]
pub struct ScriptedConnector {
    queue: Mutex<VecDeque<Result<ScriptedTransport, OpenError>>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a transport; returns its probe.
    pub fn push(&self, transport: ScriptedTransport) -> TransportProbe {
        let probe = transport.probe();
        self.lock().push_back(Ok(transport));
        probe
    }

    /// Make the next connect attempt fail with `err`.
    pub fn push_failure(&self, err: OpenError) {
        self.lock().push_back(Err(err));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<ScriptedTransport, OpenError>>> {
        self.queue
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Connector for ScriptedConnector {
    fn connect(&self, _variant: CameraVariant) -> Result<Box<dyn Transport>, OpenError> {
        match self.lock().pop_front() {
            Some(Ok(transport)) => Ok(Box::new(transport)),
            Some(Err(err)) => Err(err),
            None => Err(OpenError::DeviceNotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> RawFrame {
        RawFrame::from_samples(Geometry::new(2, 1), &[1, 2])
    }

    #[test]
    fn synthetic_frames_move() {
        let mut transport = SyntheticTransport::new(CameraVariant::Compact);
        let first = transport.read_frame().unwrap();
        let second = transport.read_frame().unwrap();
        assert_eq!(first.geometry, Geometry::new(208, 156));
        assert_eq!(first.data.len(), 208 * 156 * 2);
        assert_ne!(first.data, second.data);
    }

    #[test]
    fn script_plays_in_order_then_idles() {
        let mut transport =
            ScriptedTransport::new(vec![Err(ReadError::Timeout), Ok(tiny())]).then_repeat(tiny());
        let probe = transport.probe();
        assert_eq!(transport.read_frame(), Err(ReadError::Timeout));
        assert_eq!(transport.read_frame(), Ok(tiny()));
        assert_eq!(transport.read_frame(), Ok(tiny()));
        assert_eq!(probe.reads(), 3);
    }

    #[test]
    fn exhausted_script_loses_transport() {
        let mut transport = ScriptedTransport::new(vec![Ok(tiny())]);
        assert!(transport.read_frame().is_ok());
        assert!(matches!(
            transport.read_frame(),
            Err(ReadError::TransportLost(_))
        ));
    }

    #[test]
    fn connector_hands_out_in_order() {
        let connector = ScriptedConnector::new();
        connector.push_failure(OpenError::ClaimFailed("busy".into()));
        connector.push(ScriptedTransport::repeating(tiny()));

        assert_eq!(
            connector.connect(CameraVariant::Pro).err(),
            Some(OpenError::ClaimFailed("busy".into()))
        );
        assert!(connector.connect(CameraVariant::Pro).is_ok());
        assert_eq!(
            connector.connect(CameraVariant::Pro).err(),
            Some(OpenError::DeviceNotFound)
        );
    }
}

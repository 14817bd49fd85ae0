//! Lifecycle of one camera session.
//!
//! ```text
//! Unopened -> Opening -> Open -> Closed
//!                 \_______________/
//! ```
//!
//! `Opening` only exists inside [`DeviceSession::open`]; a
//! failed handshake closes the transport before the error
//! is returned, so callers only ever see `Open` or `Closed`.

use log::{debug, info, warn};

use crate::{
    error::{OpenError, ReadError},
    frame::RawFrame,
    transport::{Connector, Transport},
    variant::CameraVariant,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unopened,
    Opening,
    Open,
    Closed,
}

pub struct DeviceSession {
    variant: CameraVariant,
    state: SessionState,
    transport: Option<Box<dyn Transport>>,
}

impl DeviceSession {
    /// A session that was never opened. Reading from it
    /// fails; closing it is a no-op.
    pub fn unopened(variant: CameraVariant) -> Self {
        DeviceSession {
            variant,
            state: SessionState::Unopened,
            transport: None,
        }
    }

    /// Claim a camera through `connector` and run its
    /// handshake.
    pub fn open(variant: CameraVariant, connector: &dyn Connector) -> Result<Self, OpenError> {
        let mut session = Self::unopened(variant);
        session.state = SessionState::Opening;

        let mut transport = connector.connect(variant).map_err(|e| {
            warn!("no {} camera: {}", variant, e);
            e
        })?;
        if let Err(e) = transport.handshake() {
            warn!("{} handshake failed: {}", variant, e);
            transport.close();
            return Err(e);
        }

        session.transport = Some(transport);
        session.state = SessionState::Open;
        info!("opened {} camera", variant);
        Ok(session)
    }

    pub fn variant(&self) -> CameraVariant {
        self.variant
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    /// One blocking read of the next raw frame.
    pub fn read_raw(&mut self) -> Result<RawFrame, ReadError> {
        match self.transport.as_mut() {
            Some(transport) if self.state == SessionState::Open => transport.read_frame(),
            _ => Err(ReadError::TransportLost(format!(
                "{} session is not open",
                self.variant
            ))),
        }
    }

    /// Release the transport. Safe to call any number of
    /// times, in any state.
    pub fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
            info!("closed {} camera", self.variant);
        } else {
            debug!("{} session already closed", self.variant);
        }
        self.state = SessionState::Closed;
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.close();
    }
}

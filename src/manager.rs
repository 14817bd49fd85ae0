//! Handle table over acquisition pipelines.
//!
//! Callers hold opaque [`Handle`] tokens instead of
//! references. Tokens are never reused, so a closed handle
//! stays invalid forever and cannot reach someone else's
//! session.

use std::{
    collections::HashMap,
    fmt,
    num::NonZeroU64,
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock},
};

use log::debug;

use crate::{
    error::{Error, Result},
    pipeline::AcquisitionPipeline,
    transport::Connector,
    variant::CameraVariant,
};

/// Opaque token naming an open session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(NonZeroU64);

impl Handle {
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Handle)
    }

    pub fn into_raw(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type Slot = Arc<Mutex<AcquisitionPipeline>>;

struct Table {
    last: u64,
    slots: HashMap<Handle, Slot>,
}

/// Opens, tracks and closes pipelines on behalf of callers.
///
/// The table lock is only held to look up, insert or remove
/// a session; I/O happens under the session's own lock, so
/// sessions of different handles never wait on each other.
pub struct SessionManager {
    connector: RwLock<Arc<dyn Connector>>,
    table: Mutex<Table>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionManager {
    pub fn new(connector: Box<dyn Connector>) -> Self {
        SessionManager {
            connector: RwLock::new(Arc::from(connector)),
            table: Mutex::new(Table {
                last: 0,
                slots: HashMap::new(),
            }),
        }
    }

    /// Use `connector` for sessions opened from now on.
    /// Sessions already open keep their camera.
    pub fn set_connector(&self, connector: Box<dyn Connector>) {
        *self
            .connector
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::from(connector);
    }

    pub fn open(&self, variant: CameraVariant, calibration_path: Option<&Path>) -> Result<Handle> {
        let connector = self
            .connector
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let pipeline =
            AcquisitionPipeline::open_with(connector.as_ref(), variant, calibration_path)?;

        let mut table = lock(&self.table);
        table.last += 1;
        let handle = Handle::from_raw(table.last).ok_or(Error::InvalidHandle)?;
        table.slots.insert(handle, Arc::new(Mutex::new(pipeline)));
        debug!("{} camera registered as {}", variant, handle);
        Ok(handle)
    }

    fn slot(&self, handle: Handle) -> Result<Slot> {
        lock(&self.table)
            .slots
            .get(&handle)
            .cloned()
            .ok_or(Error::InvalidHandle)
    }

    pub fn dimensions(&self, handle: Handle) -> Result<(usize, usize)> {
        let slot = self.slot(handle)?;
        let pipeline = lock(&slot);
        pipeline.dimensions()
    }

    /// Read the next frame of `handle` into `out`.
    pub fn read_frame(&self, handle: Handle, out: &mut [u16]) -> Result<usize> {
        let slot = self.slot(handle)?;
        let mut pipeline = lock(&slot);
        pipeline.read_into(out)
    }

    /// Forget `handle` and release its camera. Unknown and
    /// already closed handles are ignored.
    ///
    /// A read running concurrently on the same handle keeps
    /// the session alive until it returns; the camera is
    /// released when that read lets go of it.
    pub fn close(&self, handle: Handle) {
        let slot = lock(&self.table).slots.remove(&handle);
        match slot {
            Some(slot) => {
                if let Ok(mut pipeline) = slot.try_lock() {
                    pipeline.close();
                }
                debug!("released {}", handle);
            }
            None => debug!("close of unknown handle {}", handle),
        }
    }

    /// Number of open sessions.
    pub fn len(&self) -> usize {
        lock(&self.table).slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        let slots: Vec<_> = lock(&self.table).slots.drain().collect();
        for (_, slot) in slots {
            lock(&slot).close();
        }
    }
}

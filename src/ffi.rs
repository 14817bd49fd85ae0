//! Flat C ABI over a process-wide [`SessionManager`].
//!
//! Mirrors `include/thermal_capture.h`. Handles are opaque
//! integers (`0` is the null handle), never addresses, so a
//! stale or forged handle is rejected instead of being
//! dereferenced. Panics are caught at every entry point.

use std::{
    env,
    ffi::CStr,
    os::raw::{c_char, c_int},
    panic::{catch_unwind, AssertUnwindSafe},
    path::Path,
    slice,
};

use lazy_static::lazy_static;
use log::{error, warn};

use crate::{
    error::Error,
    manager::{Handle, SessionManager},
    transport::{Connector, NoDeviceConnector, SyntheticConnector},
    variant::CameraVariant,
};

/// Raw handle type of the C ABI.
#[allow(non_camel_case_types)]
pub type seek_handle_t = u64;

pub const SEEK_ERR_INVALID_ARGS: c_int = -1;
pub const SEEK_ERR_READ: c_int = -2;
pub const SEEK_ERR_BUFFER_TOO_SMALL: c_int = -3;

/// Environment variable choosing the default backend.
pub const BACKEND_ENV: &str = "THERMAL_CAPTURE_BACKEND";

fn connector_for(backend: Option<&str>) -> Box<dyn Connector> {
    match backend {
        Some("none") => Box::new(NoDeviceConnector),
        Some("synthetic") => Box::new(SyntheticConnector),
        Some(other) => {
            warn!("unknown {} `{}`, using synthetic camera", BACKEND_ENV, other);
            Box::new(SyntheticConnector)
        }
        None => {
            warn!(
                "{} not set: sessions will read the synthetic camera, not hardware",
                BACKEND_ENV
            );
            Box::new(SyntheticConnector)
        }
    }
}

lazy_static! {
    static ref MANAGER: SessionManager =
        SessionManager::new(connector_for(env::var(BACKEND_ENV).ok().as_deref()));
}

/// Replace the connector used by later `seek_open` calls.
pub fn install_connector(connector: Box<dyn Connector>) {
    MANAGER.set_connector(connector);
}

/// Map an error onto the `seek_read_frame` return codes.
pub fn error_code(err: &Error) -> c_int {
    match err {
        Error::InvalidHandle => SEEK_ERR_INVALID_ARGS,
        Error::BufferTooSmall { .. } => SEEK_ERR_BUFFER_TOO_SMALL,
        Error::Config(_)
        | Error::Open(_)
        | Error::Read(_)
        | Error::GeometryMismatch { .. }
        | Error::SessionClosed => SEEK_ERR_READ,
    }
}

fn guarded<T>(name: &str, fallback: T, f: impl FnOnce() -> T) -> T {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        error!("panic in {}", name);
        fallback
    })
}

/// Open a camera. `camera_type` is `0` (Compact) or `1`
/// (Pro); `ffc_path` may be null or empty for no
/// calibration. Returns `0` on any failure.
///
/// # Safety
///
/// `ffc_path` must be null or point to a NUL-terminated
/// string.
#[no_mangle]
pub unsafe extern "C" fn seek_open(camera_type: c_int, ffc_path: *const c_char) -> seek_handle_t {
    guarded("seek_open", 0, || {
        let variant = match CameraVariant::from_code(camera_type) {
            Some(variant) => variant,
            None => {
                warn!("seek_open: unknown camera type {}", camera_type);
                return 0;
            }
        };

        let path = if ffc_path.is_null() {
            None
        } else {
            match CStr::from_ptr(ffc_path).to_str() {
                Ok(path) => Some(path),
                Err(_) => {
                    warn!("seek_open: calibration path is not valid UTF-8");
                    return 0;
                }
            }
        };

        match MANAGER.open(variant, path.map(Path::new)) {
            Ok(handle) => handle.into_raw(),
            Err(e) => {
                error!("seek_open: {}", e);
                0
            }
        }
    })
}

/// Close a camera. Null, unknown and already closed handles
/// are ignored.
#[no_mangle]
pub extern "C" fn seek_close(handle: seek_handle_t) {
    guarded("seek_close", (), || {
        if let Some(handle) = Handle::from_raw(handle) {
            MANAGER.close(handle);
        }
    })
}

/// Store the frame size of `handle`. Returns `1` on success
/// and `0` on failure.
///
/// # Safety
///
/// `width` and `height` must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn seek_get_dimensions(
    handle: seek_handle_t,
    width: *mut c_int,
    height: *mut c_int,
) -> c_int {
    guarded("seek_get_dimensions", 0, || {
        if width.is_null() || height.is_null() {
            return 0;
        }
        let dims = Handle::from_raw(handle)
            .ok_or(Error::InvalidHandle)
            .and_then(|h| MANAGER.dimensions(h));
        match dims {
            Ok((w, h)) => {
                *width = w as c_int;
                *height = h as c_int;
                1
            }
            Err(_) => 0,
        }
    })
}

/// Read the next frame of `handle` into `out_buffer`.
///
/// Returns the number of samples written, or
/// [`SEEK_ERR_INVALID_ARGS`], [`SEEK_ERR_READ`] or
/// [`SEEK_ERR_BUFFER_TOO_SMALL`]. The buffer contents are
/// unspecified on failure.
///
/// # Safety
///
/// `out_buffer` must be null or valid for `capacity` writes
/// of `uint16_t`.
#[no_mangle]
pub unsafe extern "C" fn seek_read_frame(
    handle: seek_handle_t,
    out_buffer: *mut u16,
    capacity: c_int,
) -> c_int {
    guarded("seek_read_frame", SEEK_ERR_READ, || {
        let handle = match Handle::from_raw(handle) {
            Some(handle) if !out_buffer.is_null() && capacity > 0 => handle,
            _ => return SEEK_ERR_INVALID_ARGS,
        };
        let out = slice::from_raw_parts_mut(out_buffer, capacity as usize);
        match MANAGER.read_frame(handle, out) {
            Ok(count) => count as c_int,
            Err(e) => error_code(&e),
        }
    })
}

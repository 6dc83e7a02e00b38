//! Conversion of the engine's out-of-band error slot into typed errors.
//!
//! The engine reports failure with a sentinel return value (null handle, `-1`
//! extent, non-zero status) and leaves a message in a per-thread slot that
//! the next native call overwrites. Every helper here must therefore run
//! directly after the call it checks, with no native call in between.

use std::ffi::{c_void, CStr};
use std::os::raw::c_int;

use crate::bridge::handle::NativeHandle;
use crate::error::{Error, Result, MISSING_DIAGNOSTIC};
use crate::sys::{DisposeFn, NativeApi};

/// Read and clear the calling thread's error slot.
pub fn take_last_error(api: &NativeApi) -> Option<String> {
    // Safety: the getter takes no arguments; the returned string is valid
    // until the next native call, and we copy it out before making one.
    unsafe {
        let raw = (api.get_and_reset_last_err)();
        if raw.is_null() {
            None
        } else {
            Some(CStr::from_ptr(raw).to_string_lossy().into_owned())
        }
    }
}

/// Diagnostic for a call that just returned its failure sentinel.
pub fn failure_message(api: &NativeApi) -> String {
    take_last_error(api).unwrap_or_else(|| MISSING_DIAGNOSTIC.to_string())
}

/// Turn the return value of a handle-producing call into an owned handle, or
/// into the error built by `on_failure` from the engine's diagnostic.
///
/// # Safety
/// `raw` must be the value just returned by a call into `api`, and `dispose`
/// must be the matching release function of that engine.
pub unsafe fn adopt_handle<F>(
    api: &NativeApi,
    raw: *mut c_void,
    dispose: DisposeFn,
    kind: &'static str,
    on_failure: F,
) -> Result<NativeHandle>
where
    F: FnOnce(String) -> Error,
{
    match NativeHandle::from_raw(raw, dispose, kind) {
        Some(handle) => Ok(handle),
        None => Err(on_failure(failure_message(api))),
    }
}

/// Check a status-returning call (`0` is success).
pub fn check_status(api: &NativeApi, status: c_int, call: &'static str) -> Result<()> {
    if status == 0 {
        Ok(())
    } else {
        Err(Error::Native {
            call,
            message: failure_message(api),
        })
    }
}

/// Check a call returning a non-negative extent (`-1` on failure).
pub fn check_extent(api: &NativeApi, value: i64, call: &'static str) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::Native {
        call,
        message: failure_message(api),
    })
}

/// Clear a diagnostic left over from an earlier, unchecked call so it cannot
/// be attributed to the next failure. In strict mode a leftover diagnostic is
/// an error instead.
pub fn discard_stale(api: &NativeApi, strict: bool) -> Result<()> {
    match take_last_error(api) {
        Some(message) if strict => Err(Error::Native {
            call: "get_and_reset_last_err",
            message: format!("stale diagnostic in error slot: {}", message),
        }),
        Some(message) => {
            log::warn!("discarding stale diagnostic from engine '{}': {}", api.name, message);
            Ok(())
        }
        None => Ok(()),
    }
}

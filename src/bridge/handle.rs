use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;

use crate::error::{Error, Result};
use crate::sys::DisposeFn;

/// An owned reference to a resource living inside the native engine.
///
/// A `NativeHandle` can only be built from a non-null pointer, so the null
/// failure sentinel never reaches a wrapper. Release goes through the
/// engine's dispose function exactly once: `release` empties the handle and
/// later calls (including the one from `Drop`) do nothing.
pub struct NativeHandle {
    raw: Option<NonNull<c_void>>,
    dispose: DisposeFn,
    kind: &'static str,
}

impl NativeHandle {
    /// Take ownership of `raw`. Returns `None` for the null sentinel.
    ///
    /// # Safety
    /// `raw` must be a live handle returned by the engine that `dispose`
    /// belongs to, and nothing else may release it.
    pub unsafe fn from_raw(raw: *mut c_void, dispose: DisposeFn, kind: &'static str) -> Option<Self> {
        NonNull::new(raw).map(|raw| Self {
            raw: Some(raw),
            dispose,
            kind,
        })
    }

    /// Raw pointer for passing into a native call.
    pub fn as_ptr(&self) -> Result<*mut c_void> {
        self.raw
            .map(NonNull::as_ptr)
            .ok_or(Error::Disposed(self.kind))
    }

    /// Whether the handle has been released.
    pub fn is_released(&self) -> bool {
        self.raw.is_none()
    }

    /// Kind of resource, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Release the native resource. Returns `true` if this call released it.
    pub fn release(&mut self) -> bool {
        match self.raw.take() {
            Some(raw) => {
                log::trace!("releasing {} handle {:p}", self.kind, raw);
                // Safety: `raw` came from the engine owning `dispose` and has
                // not been released before since `take` emptied the slot.
                unsafe { (self.dispose)(raw.as_ptr()) };
                true
            }
            None => false,
        }
    }
}

impl Drop for NativeHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.raw {
            Some(raw) => write!(f, "NativeHandle({}, {:p})", self.kind, raw),
            None => write!(f, "NativeHandle({}, released)", self.kind),
        }
    }
}

// The engine's handles are plain heap references; moving ownership to another
// thread is fine. Shared use is not synchronized, so no `Sync`.
unsafe impl Send for NativeHandle {}

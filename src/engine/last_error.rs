//! Per-thread error slot of the reference engine.

use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
    // Keeps the most recently returned message alive until the next read.
    static RETURNED: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Store a diagnostic in the calling thread's slot, replacing any previous one.
pub fn set_last_error(message: impl Into<String>) {
    let message = message.into().replace('\0', " ");
    let cstr = CString::new(message).unwrap_or_default();
    LAST_ERROR.with(|cell| {
        *cell.borrow_mut() = Some(cstr);
    });
}

/// Current diagnostic without clearing it.
pub fn peek_last_error() -> Option<String> {
    LAST_ERROR.with(|cell| {
        cell.borrow()
            .as_ref()
            .map(|msg| msg.to_string_lossy().into_owned())
    })
}

/// Empty the calling thread's slot.
pub fn clear_last_error() {
    LAST_ERROR.with(|cell| {
        *cell.borrow_mut() = None;
    });
}

pub(crate) unsafe extern "C" fn get_and_reset_last_err() -> *const c_char {
    let taken = LAST_ERROR.with(|cell| cell.borrow_mut().take());
    RETURNED.with(|cell| {
        let mut returned = cell.borrow_mut();
        *returned = taken;
        match returned.as_ref() {
            Some(msg) => msg.as_ptr(),
            None => ptr::null(),
        }
    })
}

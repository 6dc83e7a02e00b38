//! Raw foreign-call surface of a native tensor engine.
//!
//! Everything here is `unsafe` and mirrors the C ABI exactly. The safe
//! wrappers in [`crate::ops`] are the only intended callers.

use std::ffi::c_void;
use std::fmt;
use std::os::raw::{c_char, c_int};

#[cfg(feature = "libtorch")]
pub mod libtorch;

/// Opaque handle to a native operator instance.
pub type ModuleHandle = *mut c_void;

/// Opaque handle the engine uses to address an operator polymorphically
/// ("any module") inside composite containers.
pub type AnyModuleHandle = *mut c_void;

/// Opaque handle to a native tensor.
pub type TensorHandle = *mut c_void;

/// `ctor(sizes, length, out boxed) -> module`. Null on failure.
pub type CtorFn =
    unsafe extern "C" fn(sizes: *const i64, length: c_int, boxed: *mut AnyModuleHandle) -> ModuleHandle;

/// `forward(module, input) -> tensor`. Null on failure.
pub type ForwardFn = unsafe extern "C" fn(module: ModuleHandle, input: TensorHandle) -> TensorHandle;

/// Release of a single handle. Must not fail.
pub type DisposeFn = unsafe extern "C" fn(handle: *mut c_void);

/// Read and clear the calling thread's error slot. Null when empty; otherwise
/// the string stays valid until the next native call on the same thread.
pub type LastErrorFn = unsafe extern "C" fn() -> *const c_char;

/// `tensor_from_f32(data, sizes, ndim) -> tensor`. Copies `data`. Null on failure.
pub type TensorFromF32Fn =
    unsafe extern "C" fn(data: *const f32, sizes: *const i64, ndim: c_int) -> TensorHandle;

/// Number of dimensions, `-1` on failure.
pub type TensorNdimFn = unsafe extern "C" fn(tensor: TensorHandle) -> i64;

/// Extent of one dimension, `-1` on failure.
pub type TensorSizeFn = unsafe extern "C" fn(tensor: TensorHandle, dim: i64) -> i64;

/// Copy `len` elements out of a tensor. Returns 0 on success.
pub type TensorCopyF32Fn = unsafe extern "C" fn(tensor: TensorHandle, out: *mut f32, len: usize) -> c_int;

/// Construction and forward entry points of one operator type.
#[derive(Clone, Copy)]
pub struct OperatorEntry {
    /// Operator name, e.g. `AdaptiveAvgPool3d`
    pub name: &'static str,
    /// Number of spatial dimensions the output-size configuration describes
    pub rank: usize,
    pub ctor: CtorFn,
    pub forward: ForwardFn,
}

impl fmt::Debug for OperatorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorEntry")
            .field("name", &self.name)
            .field("rank", &self.rank)
            .finish()
    }
}

/// Function table of one native engine.
///
/// Tables are `'static`; wrappers keep a reference to the table that created
/// their handles so that every later call (including release) goes back to
/// the same engine.
pub struct NativeApi {
    /// Engine name used in diagnostics
    pub name: &'static str,
    pub get_and_reset_last_err: LastErrorFn,
    pub module_dispose: DisposeFn,
    pub any_module_dispose: DisposeFn,
    pub tensor_dispose: DisposeFn,
    pub tensor_from_f32: TensorFromF32Fn,
    pub tensor_ndimension: TensorNdimFn,
    pub tensor_size: TensorSizeFn,
    pub tensor_copy_f32: TensorCopyF32Fn,
    /// Operators this engine can construct
    pub operators: &'static [OperatorEntry],
}

impl NativeApi {
    /// Identity comparison: two tables are the same engine only if they are the same static.
    pub fn same_engine(&self, other: &NativeApi) -> bool {
        std::ptr::eq(self, other)
    }
}

impl fmt::Debug for NativeApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeApi")
            .field("name", &self.name)
            .field("operators", &self.operators)
            .finish()
    }
}

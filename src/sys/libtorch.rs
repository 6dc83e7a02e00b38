//! `LibTorchSharp` bindings.
//!
//! Declarations match the exported `THS*` C entry points. Calls that the
//! bridge needs but the library does not export in the same shape (creating a
//! float tensor from host memory, copying it back) are composed here from
//! `THSTensor_zeros`, `THSTensor_numel` and `THSTensor_data`.

use std::cell::RefCell;
use std::ffi::{c_void, CString};
use std::os::raw::{c_char, c_int};
use std::ptr;

use super::{AnyModuleHandle, ModuleHandle, NativeApi, OperatorEntry, TensorHandle};

/// `c10::ScalarType::Float`
const SCALAR_TYPE_FLOAT32: i8 = 6;
/// `c10::DeviceType::CPU`
const DEVICE_TYPE_CPU: c_int = 0;

#[link(name = "LibTorchSharp")]
extern "C" {
    pub fn THSTorch_get_and_reset_last_err() -> *const c_char;

    pub fn THSNN_Module_dispose(module: ModuleHandle);
    pub fn THSNN_AnyModule_dispose(module: AnyModuleHandle);

    pub fn THSNN_AdaptiveAvgPool1d_ctor(
        sizes: *const i64,
        length: c_int,
        boxed: *mut AnyModuleHandle,
    ) -> ModuleHandle;
    pub fn THSNN_AdaptiveAvgPool1d_forward(module: ModuleHandle, tensor: TensorHandle) -> TensorHandle;

    pub fn THSNN_AdaptiveAvgPool2d_ctor(
        sizes: *const i64,
        length: c_int,
        boxed: *mut AnyModuleHandle,
    ) -> ModuleHandle;
    pub fn THSNN_AdaptiveAvgPool2d_forward(module: ModuleHandle, tensor: TensorHandle) -> TensorHandle;

    pub fn THSNN_AdaptiveAvgPool3d_ctor(
        sizes: *const i64,
        length: c_int,
        boxed: *mut AnyModuleHandle,
    ) -> ModuleHandle;
    pub fn THSNN_AdaptiveAvgPool3d_forward(module: ModuleHandle, tensor: TensorHandle) -> TensorHandle;

    pub fn THSTensor_dispose(tensor: TensorHandle);
    pub fn THSTensor_zeros(
        sizes: *const i64,
        length: c_int,
        scalar_type: i8,
        device_type: c_int,
        device_index: c_int,
        requires_grad: bool,
    ) -> TensorHandle;
    pub fn THSTensor_ndimension(tensor: TensorHandle) -> i64;
    pub fn THSTensor_size(tensor: TensorHandle, dim: i64) -> i64;
    pub fn THSTensor_numel(tensor: TensorHandle) -> i64;
    pub fn THSTensor_data(tensor: TensorHandle) -> *mut c_void;
}

thread_local! {
    // Diagnostics raised by the shims below, which cannot write to the
    // library's own error slot.
    static SHIM_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
    static SHIM_RETURNED: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_shim_error(message: String) {
    let message = CString::new(message.replace('\0', " ")).unwrap_or_default();
    SHIM_ERROR.with(|cell| *cell.borrow_mut() = Some(message));
}

/// Move a pending shim diagnostic into the returned slot. Null when none.
fn take_shim_error() -> *const c_char {
    let taken = SHIM_ERROR.with(|cell| cell.borrow_mut().take());
    SHIM_RETURNED.with(|cell| {
        let mut returned = cell.borrow_mut();
        *returned = taken;
        returned.as_ref().map_or(ptr::null(), |message| message.as_ptr())
    })
}

/// Read and clear both slots. A shim diagnostic is always the most recent
/// failure, so it takes precedence over the library's.
unsafe extern "C" fn get_and_reset_last_err() -> *const c_char {
    let native = THSTorch_get_and_reset_last_err();
    let shim = take_shim_error();
    if shim.is_null() {
        native
    } else {
        shim
    }
}

unsafe extern "C" fn tensor_from_f32(data: *const f32, sizes: *const i64, ndim: c_int) -> TensorHandle {
    let tensor = THSTensor_zeros(sizes, ndim, SCALAR_TYPE_FLOAT32, DEVICE_TYPE_CPU, 0, false);
    if tensor.is_null() {
        return ptr::null_mut();
    }

    let numel = THSTensor_numel(tensor);
    if numel < 0 {
        THSTensor_dispose(tensor);
        set_shim_error(format!("tensor_from_f32: invalid element count {}", numel));
        return ptr::null_mut();
    }
    if numel > 0 {
        let dst = THSTensor_data(tensor) as *mut f32;
        if dst.is_null() || data.is_null() {
            THSTensor_dispose(tensor);
            set_shim_error("tensor_from_f32: null source or destination buffer".to_string());
            return ptr::null_mut();
        }
        ptr::copy_nonoverlapping(data, dst, numel as usize);
    }
    tensor
}

unsafe extern "C" fn tensor_copy_f32(tensor: TensorHandle, out: *mut f32, len: usize) -> c_int {
    let numel = THSTensor_numel(tensor);
    if numel < 0 || numel as usize != len {
        set_shim_error(format!(
            "tensor_copy_f32: destination holds {} elements but tensor has {}",
            len, numel
        ));
        return -1;
    }
    if len == 0 {
        return 0;
    }

    let src = THSTensor_data(tensor) as *const f32;
    if src.is_null() || out.is_null() {
        set_shim_error("tensor_copy_f32: null source or destination buffer".to_string());
        return -1;
    }

    ptr::copy_nonoverlapping(src, out, len);
    0
}

static LIBTORCH_OPERATORS: [OperatorEntry; 3] = [
    OperatorEntry {
        name: "AdaptiveAvgPool1d",
        rank: 1,
        ctor: THSNN_AdaptiveAvgPool1d_ctor,
        forward: THSNN_AdaptiveAvgPool1d_forward,
    },
    OperatorEntry {
        name: "AdaptiveAvgPool2d",
        rank: 2,
        ctor: THSNN_AdaptiveAvgPool2d_ctor,
        forward: THSNN_AdaptiveAvgPool2d_forward,
    },
    OperatorEntry {
        name: "AdaptiveAvgPool3d",
        rank: 3,
        ctor: THSNN_AdaptiveAvgPool3d_ctor,
        forward: THSNN_AdaptiveAvgPool3d_forward,
    },
];

/// Function table for `LibTorchSharp`.
pub static LIBTORCH_API: NativeApi = NativeApi {
    name: "libtorch",
    get_and_reset_last_err,
    module_dispose: THSNN_Module_dispose,
    any_module_dispose: THSNN_AnyModule_dispose,
    tensor_dispose: THSTensor_dispose,
    tensor_from_f32,
    tensor_ndimension: THSTensor_ndimension,
    tensor_size: THSTensor_size,
    tensor_copy_f32,
    operators: &LIBTORCH_OPERATORS,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn test_shim_error_is_read_once() {
        set_shim_error("tensor_copy_f32: destination holds 3 elements but tensor has 4".to_string());

        let raw = take_shim_error();
        assert!(!raw.is_null());
        let message = unsafe { CStr::from_ptr(raw) }.to_str().unwrap();
        assert!(message.contains("destination holds 3 elements"));

        assert!(take_shim_error().is_null());
    }
}

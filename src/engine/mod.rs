//! In-process reference engine.
//!
//! Implements the same C ABI a native tensor library exports: opaque heap
//! handles, sentinel return values and a per-thread error slot. It is the
//! default backend and the engine the test-suite drives. Tensors are dense
//! `f32` arrays on the CPU.

mod kernels;
mod last_error;
mod storage;

use std::ffi::c_void;
use std::os::raw::{c_char, c_int};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::slice;

use ndarray::{ArrayD, IxDyn};

use crate::sys::{AnyModuleHandle, ModuleHandle, NativeApi, OperatorEntry, TensorHandle};

pub use last_error::{clear_last_error, peek_last_error, set_last_error};
pub use storage::live_objects;

use storage::{NativeModule, NativeTensor};

/// Run an entry point body, turning `Err` and panics into the engine's
/// failure convention: the message goes to the error slot and `failed` is
/// returned.
fn guarded<T, F>(call: &str, failed: T, body: F) -> T
where
    F: FnOnce() -> Result<T, String>,
{
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(value)) => value,
        Ok(Err(message)) => {
            set_last_error(message);
            failed
        }
        Err(_) => {
            set_last_error(format!("{}: internal error", call));
            failed
        }
    }
}

unsafe fn construct_adaptive_avg_pool(
    name: &'static str,
    rank: usize,
    sizes: *const i64,
    length: c_int,
    boxed: *mut AnyModuleHandle,
) -> ModuleHandle {
    guarded(name, ptr::null_mut(), || {
        if boxed.is_null() {
            return Err(format!("{}: boxed module out-parameter is null", name));
        }
        *boxed = ptr::null_mut();

        let length = usize::try_from(length).map_err(|_| format!("{}: negative output_size length {}", name, length))?;
        let requested: &[i64] = if length == 0 {
            &[]
        } else if sizes.is_null() {
            return Err(format!("{}: output_size pointer is null", name));
        } else {
            slice::from_raw_parts(sizes, length)
        };

        if requested.len() != rank {
            return Err(format!(
                "{}: output_size must have {} elements, got {}",
                name,
                rank,
                requested.len()
            ));
        }
        if requested.iter().any(|&size| size <= 0) {
            return Err(format!(
                "{}: elements of output_size must be greater than 0, got {:?}",
                name, requested
            ));
        }

        let (module, any) = storage::module_into_handles(NativeModule {
            name,
            output_size: requested.iter().map(|&size| size as usize).collect(),
        });
        *boxed = any;
        Ok(module)
    })
}

unsafe fn forward_adaptive_avg_pool(name: &'static str, module: ModuleHandle, input: TensorHandle) -> TensorHandle {
    guarded(name, ptr::null_mut(), || {
        let module = storage::module_ref(module)?;
        let input = storage::tensor_ref(input)?;
        let data = kernels::adaptive_avg_pool(module.name, input.data.view(), &module.output_size)?;
        Ok(storage::tensor_into_handle(NativeTensor { data }))
    })
}

unsafe extern "C" fn adaptive_avg_pool1d_ctor(
    sizes: *const i64,
    length: c_int,
    boxed: *mut AnyModuleHandle,
) -> ModuleHandle {
    construct_adaptive_avg_pool("adaptive_avg_pool1d", 1, sizes, length, boxed)
}

unsafe extern "C" fn adaptive_avg_pool1d_forward(module: ModuleHandle, input: TensorHandle) -> TensorHandle {
    forward_adaptive_avg_pool("adaptive_avg_pool1d", module, input)
}

unsafe extern "C" fn adaptive_avg_pool2d_ctor(
    sizes: *const i64,
    length: c_int,
    boxed: *mut AnyModuleHandle,
) -> ModuleHandle {
    construct_adaptive_avg_pool("adaptive_avg_pool2d", 2, sizes, length, boxed)
}

unsafe extern "C" fn adaptive_avg_pool2d_forward(module: ModuleHandle, input: TensorHandle) -> TensorHandle {
    forward_adaptive_avg_pool("adaptive_avg_pool2d", module, input)
}

unsafe extern "C" fn adaptive_avg_pool3d_ctor(
    sizes: *const i64,
    length: c_int,
    boxed: *mut AnyModuleHandle,
) -> ModuleHandle {
    construct_adaptive_avg_pool("adaptive_avg_pool3d", 3, sizes, length, boxed)
}

unsafe extern "C" fn adaptive_avg_pool3d_forward(module: ModuleHandle, input: TensorHandle) -> TensorHandle {
    forward_adaptive_avg_pool("adaptive_avg_pool3d", module, input)
}

unsafe extern "C" fn module_dispose(handle: *mut c_void) {
    storage::release_module(handle);
}

unsafe extern "C" fn any_module_dispose(handle: *mut c_void) {
    storage::release_any_module(handle);
}

unsafe extern "C" fn tensor_dispose(handle: *mut c_void) {
    storage::release_tensor(handle);
}

unsafe extern "C" fn get_and_reset_last_err() -> *const c_char {
    last_error::get_and_reset_last_err()
}

unsafe extern "C" fn tensor_from_f32(data: *const f32, sizes: *const i64, ndim: c_int) -> TensorHandle {
    guarded("tensor_from_f32", ptr::null_mut(), || {
        let ndim = usize::try_from(ndim).map_err(|_| format!("tensor_from_f32: negative rank {}", ndim))?;
        let sizes: &[i64] = if ndim == 0 {
            &[]
        } else if sizes.is_null() {
            return Err("tensor_from_f32: sizes pointer is null".to_string());
        } else {
            slice::from_raw_parts(sizes, ndim)
        };

        let shape = sizes
            .iter()
            .map(|&size| usize::try_from(size).map_err(|_| format!("tensor_from_f32: negative dimension in {:?}", sizes)))
            .collect::<Result<Vec<usize>, String>>()?;
        let numel: usize = shape.iter().product();

        let values = if numel == 0 {
            Vec::new()
        } else if data.is_null() {
            return Err("tensor_from_f32: data pointer is null".to_string());
        } else {
            slice::from_raw_parts(data, numel).to_vec()
        };

        let data = ArrayD::from_shape_vec(IxDyn(&shape), values).map_err(|e| e.to_string())?;
        Ok(storage::tensor_into_handle(NativeTensor { data }))
    })
}

unsafe extern "C" fn tensor_ndimension(tensor: TensorHandle) -> i64 {
    guarded("tensor_ndimension", -1, || {
        let tensor = storage::tensor_ref(tensor)?;
        Ok(tensor.data.ndim() as i64)
    })
}

unsafe extern "C" fn tensor_size(tensor: TensorHandle, dim: i64) -> i64 {
    guarded("tensor_size", -1, || {
        let tensor = storage::tensor_ref(tensor)?;
        let ndim = tensor.data.ndim() as i64;
        let wrapped = if dim < 0 { dim + ndim } else { dim };
        if wrapped < 0 || wrapped >= ndim {
            return Err(format!(
                "Dimension out of range (expected to be in range of [{}, {}], but got {})",
                -ndim,
                ndim - 1,
                dim
            ));
        }
        Ok(tensor.data.shape()[wrapped as usize] as i64)
    })
}

unsafe extern "C" fn tensor_copy_f32(tensor: TensorHandle, out: *mut f32, len: usize) -> c_int {
    guarded("tensor_copy_f32", -1, || {
        let tensor = storage::tensor_ref(tensor)?;
        if tensor.data.len() != len {
            return Err(format!(
                "tensor_copy_f32: destination holds {} elements but tensor has {}",
                len,
                tensor.data.len()
            ));
        }
        if len == 0 {
            return Ok(0);
        }
        if out.is_null() {
            return Err("tensor_copy_f32: destination pointer is null".to_string());
        }

        let out = slice::from_raw_parts_mut(out, len);
        for (dst, &src) in out.iter_mut().zip(tensor.data.iter()) {
            *dst = src;
        }
        Ok(0)
    })
}

/// Function table of the reference engine, for building test doubles with
/// struct-update syntax. Use [`REFERENCE_API`] for real work: engine identity
/// is the address of the static.
pub const REFERENCE_TABLE: NativeApi = NativeApi {
    name: "reference",
    get_and_reset_last_err,
    module_dispose,
    any_module_dispose,
    tensor_dispose,
    tensor_from_f32,
    tensor_ndimension,
    tensor_size,
    tensor_copy_f32,
    operators: &[
        OperatorEntry {
            name: "AdaptiveAvgPool1d",
            rank: 1,
            ctor: adaptive_avg_pool1d_ctor,
            forward: adaptive_avg_pool1d_forward,
        },
        OperatorEntry {
            name: "AdaptiveAvgPool2d",
            rank: 2,
            ctor: adaptive_avg_pool2d_ctor,
            forward: adaptive_avg_pool2d_forward,
        },
        OperatorEntry {
            name: "AdaptiveAvgPool3d",
            rank: 3,
            ctor: adaptive_avg_pool3d_ctor,
            forward: adaptive_avg_pool3d_forward,
        },
    ],
};

/// The reference engine.
pub static REFERENCE_API: NativeApi = REFERENCE_TABLE;

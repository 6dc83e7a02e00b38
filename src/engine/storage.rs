//! Objects owned by the reference engine and the raw handles that point at them.

use std::cell::Cell;
use std::ffi::c_void;
use std::sync::Arc;

use ndarray::ArrayD;

thread_local! {
    static LIVE_OBJECTS: Cell<isize> = const { Cell::new(0) };
}

/// Net number of engine objects created minus released on the calling thread.
///
/// Handles released on a different thread than the one that created them
/// show up as an imbalance on both threads.
pub fn live_objects() -> isize {
    LIVE_OBJECTS.with(Cell::get)
}

fn track(delta: isize) {
    LIVE_OBJECTS.with(|live| live.set(live.get() + delta));
}

/// A dense `f32` tensor.
#[derive(Debug)]
pub(crate) struct NativeTensor {
    pub data: ArrayD<f32>,
}

/// A configured adaptive average pooling operator.
#[derive(Debug)]
pub(crate) struct NativeModule {
    pub name: &'static str,
    pub output_size: Vec<usize>,
}

/// Type-erased view of an operator, as stored in composite containers.
#[derive(Debug)]
pub(crate) struct AnyModule {
    // Only held to keep the operator alive while a container owns it.
    #[allow(dead_code)]
    pub module: Arc<NativeModule>,
}

pub(crate) fn tensor_into_handle(tensor: NativeTensor) -> *mut c_void {
    track(1);
    Box::into_raw(Box::new(tensor)) as *mut c_void
}

pub(crate) fn module_into_handles(module: NativeModule) -> (*mut c_void, *mut c_void) {
    let module = Arc::new(module);
    let any = Box::new(AnyModule {
        module: Arc::clone(&module),
    });
    track(2);
    (Arc::into_raw(module) as *mut c_void, Box::into_raw(any) as *mut c_void)
}

/// # Safety
/// `handle` must be null or a live tensor handle of this engine.
pub(crate) unsafe fn tensor_ref<'a>(handle: *mut c_void) -> Result<&'a NativeTensor, String> {
    (handle as *const NativeTensor)
        .as_ref()
        .ok_or_else(|| "tensor handle is null".to_string())
}

/// # Safety
/// `handle` must be null or a live module handle of this engine.
pub(crate) unsafe fn module_ref<'a>(handle: *mut c_void) -> Result<&'a NativeModule, String> {
    (handle as *const NativeModule)
        .as_ref()
        .ok_or_else(|| "module handle is null".to_string())
}

/// # Safety
/// `handle` must be null or a live tensor handle of this engine, released once.
pub(crate) unsafe fn release_tensor(handle: *mut c_void) {
    if !handle.is_null() {
        drop(Box::from_raw(handle as *mut NativeTensor));
        track(-1);
    }
}

/// # Safety
/// `handle` must be null or a live module handle of this engine, released once.
pub(crate) unsafe fn release_module(handle: *mut c_void) {
    if !handle.is_null() {
        drop(Arc::from_raw(handle as *const NativeModule));
        track(-1);
    }
}

/// # Safety
/// `handle` must be null or a live boxed module handle of this engine, released once.
pub(crate) unsafe fn release_any_module(handle: *mut c_void) {
    if !handle.is_null() {
        drop(Box::from_raw(handle as *mut AnyModule));
        track(-1);
    }
}

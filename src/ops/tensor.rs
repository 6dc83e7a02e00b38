use std::fmt;

use ndarray::{ArrayD, ErrorKind, IxDyn, ShapeError};

use crate::bridge::{adopt_handle, check_extent, check_status, discard_stale, NativeHandle, StableArray};
use crate::config::BridgeOptions;
use crate::error::{Error, Result};
use crate::sys::{NativeApi, TensorHandle};

/// Shape of a tensor
pub type Shape = Vec<usize>;

/// Number of elements in `shape`, failing instead of wrapping on overflow.
fn element_count(shape: &[usize]) -> Result<usize> {
    shape
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| ShapeError::from_kind(ErrorKind::Overflow).into())
}

/// A tensor owned by a native engine.
///
/// The wrapper exclusively owns its handle. Operators borrow tensors as
/// inputs and return new tensors; releasing happens on [`Tensor::dispose`]
/// or when the wrapper goes out of scope.
pub struct Tensor {
    api: &'static NativeApi,
    handle: NativeHandle,
    strict: bool,
}

impl Tensor {
    pub(crate) fn from_handle(api: &'static NativeApi, handle: NativeHandle, strict: bool) -> Self {
        Self { api, handle, strict }
    }

    /// Copy an array into a tensor on the default engine.
    pub fn from_array(array: &ArrayD<f32>) -> Result<Self> {
        Self::from_array_in(BridgeOptions::default().api()?, array)
    }

    /// Copy an array into a tensor on `api`.
    pub fn from_array_in(api: &'static NativeApi, array: &ArrayD<f32>) -> Result<Self> {
        let standard = array.as_standard_layout();
        let data = standard
            .as_slice()
            .ok_or_else(|| ShapeError::from_kind(ErrorKind::IncompatibleLayout))?;
        Self::create(api, data, array.shape(), false)
    }

    /// Copy an array into a tensor on the engine selected by `options`.
    pub fn from_array_with(options: &BridgeOptions, array: &ArrayD<f32>) -> Result<Self> {
        let mut tensor = Self::from_array_in(options.api()?, array)?;
        tensor.strict = options.strict_error_channel;
        Ok(tensor)
    }

    /// Create a tensor on the default engine from row-major data.
    pub fn from_slice(data: &[f32], shape: &[usize]) -> Result<Self> {
        Self::from_slice_in(BridgeOptions::default().api()?, data, shape)
    }

    /// Create a tensor on `api` from row-major data.
    pub fn from_slice_in(api: &'static NativeApi, data: &[f32], shape: &[usize]) -> Result<Self> {
        if element_count(shape)? != data.len() {
            return Err(ShapeError::from_kind(ErrorKind::IncompatibleShape).into());
        }
        Self::create(api, data, shape, false)
    }

    fn create(api: &'static NativeApi, data: &[f32], shape: &[usize], strict: bool) -> Result<Self> {
        let sizes = StableArray::collect(shape.iter().map(|&d| d as i64));
        discard_stale(api, strict)?;

        let raw = sizes.with_raw(|psizes, ndim| unsafe { (api.tensor_from_f32)(data.as_ptr(), psizes, ndim) });
        let handle = unsafe {
            adopt_handle(api, raw, api.tensor_dispose, "tensor", |message| Error::Native {
                call: "tensor_from_f32",
                message,
            })
        }?;

        log::trace!("created tensor {:?} on '{}'", shape, api.name);
        Ok(Self::from_handle(api, handle, strict))
    }

    /// Engine owning this tensor
    pub fn api(&self) -> &'static NativeApi {
        self.api
    }

    /// Raw handle for passing to native calls.
    pub fn as_raw(&self) -> Result<TensorHandle> {
        self.handle.as_ptr()
    }

    /// Number of dimensions
    pub fn dim(&self) -> Result<usize> {
        let raw = self.as_raw()?;
        discard_stale(self.api, self.strict)?;
        let ndim = unsafe { (self.api.tensor_ndimension)(raw) };
        check_extent(self.api, ndim, "tensor_ndimension")
    }

    /// Extents of all dimensions
    pub fn shape(&self) -> Result<Shape> {
        let raw = self.as_raw()?;
        let ndim = self.dim()?;

        (0..ndim)
            .map(|d| {
                let size = unsafe { (self.api.tensor_size)(raw, d as i64) };
                check_extent(self.api, size, "tensor_size")
            })
            .collect()
    }

    /// Total number of elements
    pub fn numel(&self) -> Result<usize> {
        element_count(&self.shape()?)
    }

    /// Copy the tensor's contents into an array.
    pub fn to_array(&self) -> Result<ArrayD<f32>> {
        let raw = self.as_raw()?;
        let shape = self.shape()?;
        let len = element_count(&shape)?;

        let mut data = vec![0.0f32; len];
        discard_stale(self.api, self.strict)?;
        let status = unsafe { (self.api.tensor_copy_f32)(raw, data.as_mut_ptr(), len) };
        check_status(self.api, status, "tensor_copy_f32")?;

        Ok(ArrayD::from_shape_vec(IxDyn(&shape), data)?)
    }

    /// Release the native tensor. Later calls do nothing.
    pub fn dispose(&mut self) {
        self.handle.release();
    }

    /// Whether the tensor has been released
    pub fn is_disposed(&self) -> bool {
        self.handle.is_released()
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor {{ engine: {:?}, handle: {:?} }}", self.api.name, self.handle)
    }
}

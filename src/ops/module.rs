use std::fmt;
use std::ptr;

use crate::bridge::error_channel::{adopt_handle, discard_stale, take_last_error};
use crate::bridge::{NativeHandle, StableArray};
use crate::config::BridgeOptions;
use crate::error::{Error, Result};
use crate::ops::registry::OperatorRegistry;
use crate::ops::tensor::Tensor;
use crate::sys::{AnyModuleHandle, ModuleHandle, NativeApi, OperatorEntry};

/// Anything that maps one input tensor to a new output tensor.
pub trait Forward {
    fn forward(&self, input: &Tensor) -> Result<Tensor>;
}

/// A native operator instance.
///
/// Holds the operational handle used for `forward` and the boxed handle the
/// engine uses to address the operator inside composite containers. Both are
/// created by one constructor call and released together.
///
/// States: constructed, then disposed. Every operation on a disposed module
/// fails with [`Error::Disposed`] before reaching the engine.
pub struct Module {
    api: &'static NativeApi,
    entry: &'static OperatorEntry,
    output_size: Vec<i64>,
    handle: NativeHandle,
    boxed: NativeHandle,
    strict: bool,
}

impl Module {
    /// Construct operator `name` on `api` with the given output size.
    ///
    /// The configuration is passed through unvalidated; the engine decides
    /// whether its length and values are acceptable.
    pub fn construct<'a>(
        api: &'static NativeApi,
        name: &str,
        output_size: impl Into<StableArray<'a>>,
    ) -> Result<Self> {
        Self::construct_impl(api, name, output_size.into(), false)
    }

    /// Construct operator `name` on the engine selected by `options`.
    pub fn construct_with<'a>(
        options: &BridgeOptions,
        name: &str,
        output_size: impl Into<StableArray<'a>>,
    ) -> Result<Self> {
        Self::construct_impl(options.api()?, name, output_size.into(), options.strict_error_channel)
    }

    fn construct_impl(api: &'static NativeApi, name: &str, sizes: StableArray<'_>, strict: bool) -> Result<Self> {
        let entry = OperatorRegistry::new(api).require(name)?;
        discard_stale(api, strict)?;

        let mut boxed_raw: AnyModuleHandle = ptr::null_mut();
        let raw = sizes.with_raw(|psizes, len| unsafe { (entry.ctor)(psizes, len, &mut boxed_raw) });

        // The diagnostic is read here, before any release call can overwrite it.
        let handle = unsafe {
            adopt_handle(api, raw, api.module_dispose, entry.name, |message| Error::Construction {
                operator: entry.name,
                message,
            })
        };
        let boxed = unsafe { NativeHandle::from_raw(boxed_raw, api.any_module_dispose, entry.name) };

        let handle = handle?;
        let boxed = match boxed {
            Some(boxed) => boxed,
            None => {
                let message = take_last_error(api)
                    .unwrap_or_else(|| "constructor returned no boxed module handle".to_string());
                return Err(Error::Construction {
                    operator: entry.name,
                    message,
                });
            }
        };

        log::debug!(
            "constructed {} with output size {:?} on '{}'",
            entry.name,
            sizes.as_slice(),
            api.name
        );

        Ok(Self {
            api,
            entry,
            output_size: sizes.as_slice().to_vec(),
            handle,
            boxed,
            strict,
        })
    }

    /// Run the operator on `input`, returning a new tensor.
    ///
    /// `input` is only borrowed for the duration of the call.
    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let module = self.as_raw()?;

        if !self.api.same_engine(input.api()) {
            return Err(Error::BackendMismatch {
                expected: self.api.name,
                found: input.api().name,
            });
        }
        let tensor = input.as_raw()?;
        discard_stale(self.api, self.strict)?;

        log::trace!("{} forward on '{}'", self.entry.name, self.api.name);
        let raw = unsafe { (self.entry.forward)(module, tensor) };

        let output = unsafe {
            adopt_handle(self.api, raw, self.api.tensor_dispose, "tensor", |message| Error::Compute {
                operator: self.entry.name,
                message,
            })
        }?;
        Ok(Tensor::from_handle(self.api, output, self.strict))
    }

    /// Release both native handles. Later calls do nothing.
    pub fn dispose(&mut self) {
        let released = self.handle.release() | self.boxed.release();
        if released {
            log::debug!("disposed {}", self.entry.name);
        }
    }

    /// Whether the module has been released
    pub fn is_disposed(&self) -> bool {
        self.handle.is_released()
    }

    /// Operator name, e.g. `AdaptiveAvgPool3d`
    pub fn name(&self) -> &'static str {
        self.entry.name
    }

    /// Number of spatial dimensions the operator works on
    pub fn rank(&self) -> usize {
        self.entry.rank
    }

    /// Output size the module was constructed with
    pub fn output_size(&self) -> &[i64] {
        &self.output_size
    }

    /// Engine owning this module
    pub fn api(&self) -> &'static NativeApi {
        self.api
    }

    /// Operational handle for direct native calls.
    pub fn as_raw(&self) -> Result<ModuleHandle> {
        self.handle.as_ptr().map_err(|_| Error::Disposed(self.entry.name))
    }

    /// Boxed ("any module") handle, for handing the operator to a native
    /// composite container. Never used for direct invocation.
    pub fn boxed_handle(&self) -> Result<AnyModuleHandle> {
        self.boxed.as_ptr().map_err(|_| Error::Disposed(self.entry.name))
    }
}

impl Forward for Module {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        Module::forward(self, input)
    }
}

impl Drop for Module {
    fn drop(&mut self) {
        if !self.is_disposed() {
            log::debug!("{} released on drop", self.entry.name);
        }
        self.dispose();
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_disposed() {
            write!(f, "{}(disposed)", self.entry.name)
        } else {
            write!(f, "{}(output_size={:?})", self.entry.name, self.output_size)
        }
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("operator", &self.entry.name)
            .field("engine", &self.api.name)
            .field("output_size", &self.output_size)
            .field("handle", &self.handle)
            .field("boxed", &self.boxed)
            .finish()
    }
}

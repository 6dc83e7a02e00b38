//! Adaptive average pooling operators.
//!
//! Each operator reduces the trailing spatial dimensions of a
//! `(C, spatial...)` or `(N, C, spatial...)` input to a fixed output size,
//! whatever the input size. Batch and channel dimensions are preserved.

use std::fmt;

use crate::bridge::StableArray;
use crate::config::BridgeOptions;
use crate::error::Result;
use crate::ops::functional;
use crate::ops::module::{Forward, Module};
use crate::ops::tensor::Tensor;
use crate::sys::NativeApi;

macro_rules! adaptive_avg_pool {
    (
        $(#[$meta:meta])*
        $module:ident, $function:ident, $name:literal, $rank:literal
    ) => {
        $(#[$meta])*
        pub struct $module {
            inner: Module,
        }

        impl $module {
            /// Native operator name
            pub const NAME: &'static str = $name;
            /// Number of spatial dimensions in the output size
            pub const RANK: usize = $rank;

            /// Construct on the default engine.
            pub fn new<'a>(output_size: impl Into<StableArray<'a>>) -> Result<Self> {
                Self::new_with(&BridgeOptions::default(), output_size)
            }

            /// Construct on the engine selected by `options`.
            pub fn new_with<'a>(options: &BridgeOptions, output_size: impl Into<StableArray<'a>>) -> Result<Self> {
                Module::construct_with(options, Self::NAME, output_size).map(|inner| Self { inner })
            }

            /// Construct on `api`.
            pub fn new_in<'a>(api: &'static NativeApi, output_size: impl Into<StableArray<'a>>) -> Result<Self> {
                Module::construct(api, Self::NAME, output_size).map(|inner| Self { inner })
            }

            /// Pool `input` to the configured output size.
            pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
                self.inner.forward(input)
            }

            /// Release the native operator. Later calls do nothing.
            pub fn dispose(&mut self) {
                self.inner.dispose();
            }

            pub fn is_disposed(&self) -> bool {
                self.inner.is_disposed()
            }

            pub fn output_size(&self) -> &[i64] {
                self.inner.output_size()
            }

            /// Underlying module, e.g. for handing to a container.
            pub fn module(&self) -> &Module {
                &self.inner
            }

            pub fn into_module(self) -> Module {
                self.inner
            }
        }

        impl Forward for $module {
            fn forward(&self, input: &Tensor) -> Result<Tensor> {
                self.inner.forward(input)
            }
        }

        impl fmt::Display for $module {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.inner, f)
            }
        }

        impl fmt::Debug for $module {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(&self.inner, f)
            }
        }

        /// Stateless form: builds the operator on the input's engine, applies
        /// it once and releases it.
        pub fn $function<'a>(x: &Tensor, output_size: impl Into<StableArray<'a>>) -> Result<Tensor> {
            functional::apply($module::NAME, x, output_size)
        }
    };
}

adaptive_avg_pool! {
    /// 1D adaptive average pooling over `(C, L)` or `(N, C, L)` inputs.
    AdaptiveAvgPool1d, adaptive_avg_pool1d, "AdaptiveAvgPool1d", 1
}

adaptive_avg_pool! {
    /// 2D adaptive average pooling over `(C, H, W)` or `(N, C, H, W)` inputs.
    AdaptiveAvgPool2d, adaptive_avg_pool2d, "AdaptiveAvgPool2d", 2
}

adaptive_avg_pool! {
    /// 3D adaptive average pooling over `(C, D, H, W)` or `(N, C, D, H, W)`
    /// inputs. The output size is given as `[D, H, W]`.
    AdaptiveAvgPool3d, adaptive_avg_pool3d, "AdaptiveAvgPool3d", 3
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{self, REFERENCE_API};
    use crate::error::Error;
    use ndarray::{Array, IxDyn};

    #[test]
    fn test_pool3d_output_shape() {
        let input = Tensor::from_array(&Array::zeros(IxDyn(&[2, 3, 8, 14, 14]))).unwrap();
        let pool = AdaptiveAvgPool3d::new(&[4i64, 7, 7]).unwrap();

        let output = pool.forward(&input).unwrap();
        assert_eq!(output.shape().unwrap(), vec![2, 3, 4, 7, 7]);
        assert_eq!(pool.to_string(), "AdaptiveAvgPool3d(output_size=[4, 7, 7])");
    }

    #[test]
    fn test_pool2d_values() {
        let input = Tensor::from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], &[1, 1, 2, 4]).unwrap();
        let output = adaptive_avg_pool2d(&input, &[1i64, 2]).unwrap();

        let values: Vec<f32> = output.to_array().unwrap().iter().copied().collect();
        assert_eq!(values, vec![3.5, 5.5]);
    }

    #[test]
    fn test_pool1d_unbatched() {
        let pool = AdaptiveAvgPool1d::new_in(&REFERENCE_API, vec![3i64]).unwrap();
        let input = Tensor::from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0], &[1, 5]).unwrap();

        let output = Forward::forward(&pool, &input).unwrap();
        assert_eq!(output.shape().unwrap(), vec![1, 3]);
    }

    #[test]
    fn test_wrapper_dispose() {
        let before = engine::live_objects();
        let mut pool = AdaptiveAvgPool3d::new(&[1i64, 1, 1]).unwrap();
        pool.dispose();
        pool.dispose();

        assert!(pool.is_disposed());
        assert_eq!(engine::live_objects(), before);

        let input = Tensor::from_slice(&[0.0; 8], &[1, 2, 2, 2]).unwrap();
        assert!(matches!(pool.forward(&input), Err(Error::Disposed("AdaptiveAvgPool3d"))));
    }

    #[test]
    fn test_into_module_keeps_handles() {
        let pool = AdaptiveAvgPool2d::new(&[2i64, 2]).unwrap();
        let module = pool.into_module();

        assert!(!module.is_disposed());
        assert!(module.boxed_handle().is_ok());
        assert_eq!(module.output_size(), &[2, 2]);
    }
}

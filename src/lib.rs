//! Safe bindings for operators of a native tensor engine.
//!
//! The engine owns every tensor and operator; this crate hands out wrappers
//! around its opaque handles. Construction arguments are marshaled as pinned
//! integer arrays, failures signaled through the engine's per-thread error
//! slot become typed [`Error`]s at the call site, and every handle is released
//! exactly once.
//!
//! ```
//! use ndarray::{Array, IxDyn};
//! use torch_bridge::{AdaptiveAvgPool3d, Tensor};
//!
//! let input = Tensor::from_array(&Array::ones(IxDyn(&[2, 3, 8, 14, 14])))?;
//! let pool = AdaptiveAvgPool3d::new(&[4i64, 7, 7])?;
//! let output = pool.forward(&input)?;
//! assert_eq!(output.shape()?, vec![2, 3, 4, 7, 7]);
//! # Ok::<(), torch_bridge::Error>(())
//! ```

pub mod bridge;
pub mod config;
pub mod engine;
pub mod error;
pub mod ops;
pub mod sys;

// Re-export commonly used types
pub use bridge::{NativeHandle, StableArray};
pub use config::{Backend, BridgeOptions};
pub use error::{Error, Result};
pub use ops::functional::apply;
pub use ops::nn::pool::{
    adaptive_avg_pool1d, adaptive_avg_pool2d, adaptive_avg_pool3d, AdaptiveAvgPool1d, AdaptiveAvgPool2d,
    AdaptiveAvgPool3d,
};
pub use ops::{Forward, Module, OperatorRegistry, Tensor};
pub use sys::NativeApi;

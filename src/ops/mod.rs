pub mod functional;
pub mod module;
pub mod registry;
pub mod tensor;

pub mod prelude {
    pub use super::module::{Forward, Module};
    pub use super::nn::pool::{
        adaptive_avg_pool1d, adaptive_avg_pool2d, adaptive_avg_pool3d, AdaptiveAvgPool1d, AdaptiveAvgPool2d,
        AdaptiveAvgPool3d,
    };
    pub use super::tensor::{Shape, Tensor};
}

pub use module::{Forward, Module};
pub use registry::OperatorRegistry;
pub use tensor::{Shape, Tensor};

// Module files for nn subdirectory
pub mod nn {
    pub mod pool;
}

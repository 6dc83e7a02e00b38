use crate::bridge::StableArray;
use crate::error::Result;
use crate::ops::module::Module;
use crate::ops::tensor::Tensor;

/// Construct operator `name`, run it once on `input` and release it.
///
/// The operator is built on the engine that owns `input`. It is disposed on
/// every path, including when `forward` fails; the error is returned after
/// the release. Neither `input` nor the result is disposed.
pub fn apply<'a>(name: &str, input: &Tensor, output_size: impl Into<StableArray<'a>>) -> Result<Tensor> {
    let mut module = Module::construct(input.api(), name, output_size)?;
    let result = module.forward(input);
    module.dispose();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine;
    use crate::error::Error;

    #[test]
    fn test_apply_releases_module() {
        let input = Tensor::from_slice(&[1.0; 16], &[1, 4, 4]).unwrap();
        let before = engine::live_objects();

        let output = apply("AdaptiveAvgPool2d", &input, &[2i64, 2]).unwrap();
        assert_eq!(output.shape().unwrap(), vec![1, 2, 2]);

        // Only the result tensor is left alive.
        assert_eq!(engine::live_objects() - before, 1);
        assert!(!input.is_disposed());
    }

    #[test]
    fn test_apply_releases_module_on_forward_failure() {
        let input = Tensor::from_slice(&[1.0; 4], &[4]).unwrap();
        let before = engine::live_objects();

        let err = apply("AdaptiveAvgPool2d", &input, &[2i64, 2]).unwrap_err();
        assert!(matches!(err, Error::Compute { .. }));
        assert_eq!(engine::live_objects(), before);
    }

    #[test]
    fn test_apply_propagates_construction_failure() {
        let input = Tensor::from_slice(&[1.0; 4], &[1, 4]).unwrap();
        let err = apply("AdaptiveAvgPool1d", &input, &[-1i64]).unwrap_err();
        assert!(matches!(err, Error::Construction { .. }));
    }
}

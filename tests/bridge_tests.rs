use std::os::raw::c_int;
use std::ptr;

use anyhow::Result;
use ndarray::{Array, ArrayD, IxDyn};
use rand::prelude::*;

use torch_bridge::{
    adaptive_avg_pool3d,
    engine::{self, REFERENCE_API, REFERENCE_TABLE},
    sys::{AnyModuleHandle, ModuleHandle, NativeApi, OperatorEntry, TensorHandle},
    AdaptiveAvgPool3d, Error, Module, Tensor,
};

// Helper to create a random input tensor of the given shape
fn random_tensor(rng: &mut StdRng, shape: &[usize]) -> Result<(ArrayD<f32>, Tensor)> {
    let len: usize = shape.iter().product();
    let data: Vec<f32> = (0..len).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let array = Array::from_shape_vec(IxDyn(shape), data)?;
    let tensor = Tensor::from_array(&array)?;
    Ok((array, tensor))
}

unsafe extern "C" fn exhausted_ctor(_sizes: *const i64, _length: c_int, _boxed: *mut AnyModuleHandle) -> ModuleHandle {
    engine::set_last_error("CUDA out of memory. Tried to allocate 2.00 GiB");
    ptr::null_mut()
}

unsafe extern "C" fn unreachable_forward(_module: ModuleHandle, _input: TensorHandle) -> TensorHandle {
    panic!("forward must not be called on a failed construction");
}

static EXHAUSTED_OPERATORS: [OperatorEntry; 1] = [OperatorEntry {
    name: "AdaptiveAvgPool3d",
    rank: 3,
    ctor: exhausted_ctor,
    forward: unreachable_forward,
}];

static EXHAUSTED_API: NativeApi = NativeApi {
    name: "exhausted",
    operators: &EXHAUSTED_OPERATORS,
    ..REFERENCE_TABLE
};

#[test]
fn test_construct_release_leaves_no_leak() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(7);
    let before = engine::live_objects();

    for _ in 0..32 {
        let size: Vec<i64> = (0..3).map(|_| rng.gen_range(1..16)).collect();
        let mut module = Module::construct(&REFERENCE_API, "AdaptiveAvgPool3d", size)?;
        module.dispose();
    }

    assert_eq!(engine::live_objects(), before);
    Ok(())
}

#[test]
fn test_forward_preserves_leading_dimensions() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(11);

    for _ in 0..8 {
        let batch = rng.gen_range(1..4);
        let channels = rng.gen_range(1..5);
        let input_spatial: Vec<usize> = (0..3).map(|_| rng.gen_range(1..10)).collect();
        let output_size: Vec<i64> = (0..3).map(|_| rng.gen_range(1..6)).collect();

        let mut shape = vec![batch, channels];
        shape.extend(&input_spatial);
        let (_, input) = random_tensor(&mut rng, &shape)?;

        let pool = AdaptiveAvgPool3d::new(&output_size)?;
        let output = pool.forward(&input)?;

        let mut expected = vec![batch, channels];
        expected.extend(output_size.iter().map(|&s| s as usize));
        assert_eq!(output.shape()?, expected);
    }
    Ok(())
}

#[test]
fn test_functional_matches_manual_sequence() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(3);
    let (_, input) = random_tensor(&mut rng, &[2, 3, 5, 9, 6])?;
    let size = [3i64, 4, 2];

    let mut module = AdaptiveAvgPool3d::new(&size)?;
    let manual = module.forward(&input)?.to_array()?;
    module.dispose();

    let functional = adaptive_avg_pool3d(&input, &size)?.to_array()?;
    assert_eq!(manual, functional);
    Ok(())
}

#[test]
fn test_double_dispose_is_noop() -> Result<()> {
    let before = engine::live_objects();
    let mut module = AdaptiveAvgPool3d::new(&[2i64, 2, 2])?;

    module.dispose();
    assert_eq!(engine::live_objects(), before);
    module.dispose();
    assert_eq!(engine::live_objects(), before);
    assert!(module.is_disposed());
    Ok(())
}

#[test]
fn test_forward_on_disposed_module() -> Result<()> {
    let input = Tensor::from_slice(&[1.0; 8], &[1, 1, 2, 2, 2])?;
    let mut module = AdaptiveAvgPool3d::new(&[1i64, 1, 1])?;
    module.dispose();

    let err = module.forward(&input).unwrap_err();
    assert!(matches!(err, Error::Disposed(_)));
    assert!(engine::peek_last_error().is_none());
    Ok(())
}

#[test]
fn test_construction_failure_from_test_double() {
    engine::clear_last_error();
    let err = AdaptiveAvgPool3d::new_in(&EXHAUSTED_API, &[4i64, 7, 7]).unwrap_err();

    match &err {
        Error::Construction { operator, message } => {
            assert_eq!(*operator, "AdaptiveAvgPool3d");
            assert_eq!(message, "CUDA out of memory. Tried to allocate 2.00 GiB");
        }
        other => panic!("expected a construction error, got {other}"),
    }
    assert!(err.to_string().contains("CUDA out of memory"));
    assert!(engine::peek_last_error().is_none());
}

#[test]
fn test_pool3d_concrete_scenario() -> Result<()> {
    let input = Tensor::from_array(&Array::ones(IxDyn(&[2, 3, 8, 14, 14])))?;
    let pool = AdaptiveAvgPool3d::new(&[4i64, 7, 7])?;

    let output = pool.forward(&input)?;
    assert_eq!(output.shape()?, vec![2, 3, 4, 7, 7]);

    let values = output.to_array()?;
    assert!(values.iter().all(|&v| (v - 1.0).abs() < 1e-6));
    Ok(())
}

#[test]
fn test_pooled_values_are_window_means() -> Result<()> {
    // 2x2x2 blocks of a (1, 1, 4, 4, 4) ramp
    let data: Vec<f32> = (0..64).map(|v| v as f32).collect();
    let input = Tensor::from_slice(&data, &[1, 1, 4, 4, 4])?;

    let output = adaptive_avg_pool3d(&input, &[2i64, 2, 2])?.to_array()?;
    let block_mean = |d: usize, h: usize, w: usize| -> f32 {
        let mut sum = 0.0;
        for dd in 0..2 {
            for hh in 0..2 {
                for ww in 0..2 {
                    sum += data[(2 * d + dd) * 16 + (2 * h + hh) * 4 + (2 * w + ww)];
                }
            }
        }
        sum / 8.0
    };

    for d in 0..2 {
        for h in 0..2 {
            for w in 0..2 {
                assert!((output[[0, 0, d, h, w]] - block_mean(d, h, w)).abs() < 1e-5);
            }
        }
    }
    Ok(())
}

#[test]
fn test_shape_mismatch_is_compute_error() -> Result<()> {
    let input = Tensor::from_slice(&[1.0; 9], &[3, 3])?;
    let pool = AdaptiveAvgPool3d::new(&[1i64, 1, 1])?;

    match pool.forward(&input) {
        Err(Error::Compute { message, .. }) => assert!(message.contains("Expected 4D or 5D tensor")),
        other => panic!("expected a compute error, got {other:?}"),
    }
    assert!(!input.is_disposed());
    Ok(())
}

#[test]
fn test_invalid_sizes_surface_native_diagnostic() {
    let err = AdaptiveAvgPool3d::new(&[4i64, -7, 7]).unwrap_err();
    assert!(err.native_message().unwrap().contains("greater than 0"));

    let err = AdaptiveAvgPool3d::new(Vec::<i64>::new()).unwrap_err();
    assert!(err.native_message().unwrap().contains("must have 3 elements, got 0"));
}

#[test]
fn test_module_can_move_across_threads() -> Result<()> {
    let pool = AdaptiveAvgPool3d::new(&[1i64, 1, 1])?;

    let shape = std::thread::spawn(move || -> torch_bridge::Result<Vec<usize>> {
        let input = Tensor::from_slice(&[2.0; 8], &[1, 1, 2, 2, 2])?;
        pool.forward(&input)?.shape()
    })
    .join()
    .expect("worker thread panicked")?;

    assert_eq!(shape, vec![1, 1, 1, 1, 1]);
    Ok(())
}

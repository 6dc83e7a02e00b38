use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, Axis, IxDyn, Slice};
use num_traits::{Float, FromPrimitive};
use rayon::prelude::*;

/// Adaptive average pooling over the trailing `output_size.len()` dimensions.
///
/// Accepts an unbatched `(C, spatial...)` or batched `(N, C, spatial...)`
/// input. Output element `i` along an axis of input extent `n` and output
/// extent `m` averages the window `[floor(i * n / m), ceil((i + 1) * n / m))`.
pub(crate) fn adaptive_avg_pool<A>(
    name: &str,
    input: ArrayViewD<A>,
    output_size: &[usize],
) -> Result<ArrayD<A>, String>
where
    A: Float + FromPrimitive + Send + Sync,
{
    let rank = output_size.len();
    let ndim = input.ndim();

    if ndim != rank + 1 && ndim != rank + 2 {
        return Err(format!(
            "{}(): Expected {}D or {}D tensor, but got {:?}",
            name,
            rank + 1,
            rank + 2,
            input.shape()
        ));
    }

    // The batch dimension may be empty; channel and spatial dimensions may not.
    let first_checked = if ndim == rank + 2 { 1 } else { 0 };
    if let Some(empty) = (first_checked..ndim).find(|&d| input.shape()[d] == 0) {
        return Err(format!(
            "{}(): Expected input to have non-zero size for non-batch dimensions, but input has sizes {:?} with dimension {} being empty",
            name,
            input.shape(),
            empty
        ));
    }

    let (leading, spatial) = input.shape().split_at(ndim - rank);
    let planes: usize = leading.iter().product();

    let mut plane_shape = vec![planes];
    plane_shape.extend_from_slice(spatial);
    let mut pooled_shape = vec![planes];
    pooled_shape.extend_from_slice(output_size);
    let mut result_shape = leading.to_vec();
    result_shape.extend_from_slice(output_size);

    let standard = input.as_standard_layout();
    let source = standard
        .view()
        .into_shape(IxDyn(&plane_shape))
        .map_err(|e| e.to_string())?;

    let mut pooled = ArrayD::<A>::zeros(IxDyn(&pooled_shape));
    pooled
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(source.axis_iter(Axis(0)).into_par_iter())
        .for_each(|(mut dst, src)| pool_plane(&src, &mut dst));

    pooled
        .into_shape(IxDyn(&result_shape))
        .map_err(|e| e.to_string())
}

fn pool_plane<A>(src: &ArrayViewD<A>, dst: &mut ArrayViewMutD<A>)
where
    A: Float + FromPrimitive,
{
    let in_shape = src.shape().to_vec();
    let out_shape = dst.shape().to_vec();

    for (index, value) in dst.indexed_iter_mut() {
        let window = src.slice_each_axis(|ax| {
            let axis = ax.axis.index();
            let (start, end) = window_bounds(index[axis], in_shape[axis], out_shape[axis]);
            Slice::from(start..end)
        });
        *value = window.mean().unwrap_or_else(A::zero);
    }
}

/// Half-open input window for output position `i`.
fn window_bounds(i: usize, input: usize, output: usize) -> (usize, usize) {
    let start = (i * input) / output;
    let end = ((i + 1) * input + output - 1) / output;
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr3, Array};

    #[test]
    fn test_window_bounds() {
        // 8 -> 4 splits evenly
        assert_eq!(window_bounds(0, 8, 4), (0, 2));
        assert_eq!(window_bounds(3, 8, 4), (6, 8));

        // 5 -> 3 overlaps
        assert_eq!(window_bounds(0, 5, 3), (0, 2));
        assert_eq!(window_bounds(1, 5, 3), (1, 4));
        assert_eq!(window_bounds(2, 5, 3), (3, 5));

        // Upsampling repeats elements
        assert_eq!(window_bounds(0, 2, 4), (0, 1));
        assert_eq!(window_bounds(3, 2, 4), (1, 2));
    }

    #[test]
    fn test_pool_3d_shape() {
        let input = ArrayD::<f32>::ones(IxDyn(&[2, 3, 8, 14, 14]));
        let output = adaptive_avg_pool("adaptive_avg_pool3d", input.view(), &[4, 7, 7]).unwrap();

        assert_eq!(output.shape(), &[2, 3, 4, 7, 7]);
        assert!(output.iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_pool_values_2d() {
        // One plane of 2x4 averaged down to 1x2
        let input = arr3(&[[[1.0f32, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0]]]).into_dyn();
        let output = adaptive_avg_pool("adaptive_avg_pool2d", input.view(), &[1, 2]).unwrap();

        assert_eq!(output.shape(), &[1, 1, 2]);
        assert_eq!(output[[0, 0, 0]], 3.5);
        assert_eq!(output[[0, 0, 1]], 5.5);
    }

    #[test]
    fn test_pool_1d_overlapping_windows() {
        let input = Array::from_shape_vec(IxDyn(&[1, 1, 5]), vec![1.0f64, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let output = adaptive_avg_pool("adaptive_avg_pool1d", input.view(), &[3]).unwrap();

        let values: Vec<f64> = output.iter().copied().collect();
        assert_eq!(values, vec![1.5, 3.0, 4.5]);
    }

    #[test]
    fn test_pool_rejects_wrong_rank() {
        let input = ArrayD::<f32>::zeros(IxDyn(&[2, 3]));
        let err = adaptive_avg_pool("adaptive_avg_pool3d", input.view(), &[1, 1, 1]).unwrap_err();
        assert!(err.contains("Expected 4D or 5D tensor"));
    }

    #[test]
    fn test_pool_rejects_empty_spatial_dimension() {
        let input = ArrayD::<f32>::zeros(IxDyn(&[1, 3, 0, 4, 4]));
        let err = adaptive_avg_pool("adaptive_avg_pool3d", input.view(), &[1, 1, 1]).unwrap_err();
        assert!(err.contains("dimension 2 being empty"));
    }

    #[test]
    fn test_pool_allows_empty_batch() {
        let input = ArrayD::<f32>::zeros(IxDyn(&[0, 3, 4, 4]));
        let output = adaptive_avg_pool("adaptive_avg_pool2d", input.view(), &[2, 2]).unwrap();
        assert_eq!(output.shape(), &[0, 3, 2, 2]);
    }
}

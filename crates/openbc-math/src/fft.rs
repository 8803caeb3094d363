//! 3D FFT wrappers around rustfft.
//!
//! Convention matches numpy:
//! - Forward FFT (fft3): unnormalized
//! - Inverse FFT (ifft3): normalized by 1/(nx*ny*nz)
//!
//! Axes of length 1 are skipped, so a 2-D buffer stored with a degenerate
//! axis costs the same as a true 2-D transform.

use ndarray::{Array3, Axis};
use num_complex::Complex64;
use rustfft::{FftDirection, FftPlanner};

/// Forward 3D FFT. Matches `numpy.fft.fftn()` on a 3-D array.
pub fn fft3(input: &Array3<f64>) -> Array3<Complex64> {
    let mut data = input.mapv(|v| Complex64::new(v, 0.0));
    let mut planner = FftPlanner::new();
    transform_all_axes(&mut data, &mut planner, FftDirection::Forward);
    data
}

/// Inverse 3D FFT returning the real part. Matches `numpy.fft.ifftn().real`.
///
/// Applies 1/(nx*ny*nz) normalization.
pub fn ifft3(input: &Array3<Complex64>) -> Array3<f64> {
    let mut data = input.clone();
    let mut planner = FftPlanner::new();
    transform_all_axes(&mut data, &mut planner, FftDirection::Inverse);
    let norm = 1.0 / data.len() as f64;
    data.mapv(|c| c.re * norm)
}

/// In-place transform along every axis with a shared planner.
fn transform_all_axes(
    data: &mut Array3<Complex64>,
    planner: &mut FftPlanner<f64>,
    direction: FftDirection,
) {
    for axis in 0..3 {
        transform_axis(data, planner, Axis(axis), direction);
    }
}

/// In-place 1D transform of every lane along `axis`.
///
/// Lanes are not contiguous for the leading axes, so each lane is copied
/// into a scratch buffer, transformed and written back.
fn transform_axis(
    data: &mut Array3<Complex64>,
    planner: &mut FftPlanner<f64>,
    axis: Axis,
    direction: FftDirection,
) {
    let n = data.len_of(axis);
    if n <= 1 {
        return;
    }
    let fft = planner.plan_fft(n, direction);
    let mut buf = vec![Complex64::new(0.0, 0.0); n];
    for mut lane in data.lanes_mut(axis) {
        for (dst, src) in buf.iter_mut().zip(lane.iter()) {
            *dst = *src;
        }
        fft.process(&mut buf);
        for (dst, src) in lane.iter_mut().zip(buf.iter()) {
            *dst = *src;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fft3_roundtrip() {
        let original = Array3::from_shape_fn((6, 5, 4), |(i, j, k)| {
            (i * 20 + j * 4 + k) as f64 * 0.37 - 3.0
        });
        let spectrum = fft3(&original);
        let recovered = ifft3(&spectrum);

        for ((i, j, k), &val) in original.indexed_iter() {
            assert!(
                (recovered[[i, j, k]] - val).abs() < 1e-10,
                "FFT roundtrip failed at ({i}, {j}, {k}): {} vs {val}",
                recovered[[i, j, k]]
            );
        }
    }

    #[test]
    fn test_fft3_dc_component() {
        // For a constant field, the DC component should be N*value
        let val = 3.0;
        let input = Array3::from_elem((4, 6, 8), val);
        let spectrum = fft3(&input);

        let expected_dc = (4 * 6 * 8) as f64 * val;
        assert!(
            (spectrum[[0, 0, 0]].re - expected_dc).abs() < 1e-9,
            "DC component: {} vs {expected_dc}",
            spectrum[[0, 0, 0]].re
        );
        assert!(spectrum[[0, 0, 0]].im.abs() < 1e-9, "DC imaginary should be zero");
        for ((i, j, k), v) in spectrum.indexed_iter() {
            if (i, j, k) != (0, 0, 0) {
                assert!(v.norm() < 1e-9, "Non-DC mode ({i},{j},{k}) should vanish");
            }
        }
    }

    #[test]
    fn test_fft3_degenerate_axis_matches_2d() {
        // A (n, 1, m) buffer transforms like its 2-D slice.
        let a = Array3::from_shape_fn((8, 1, 4), |(i, _, k)| ((i + 1) * (k + 2)) as f64);
        let spectrum = fft3(&a);
        let dc: f64 = a.iter().sum();
        assert!((spectrum[[0, 0, 0]].re - dc).abs() < 1e-9);
        let back = ifft3(&spectrum);
        for (x, y) in a.iter().zip(back.iter()) {
            assert!((x - y).abs() < 1e-10);
        }
    }
}

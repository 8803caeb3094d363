//! Centered finite differences on node-sampled buffers.
//!
//! Second-order central difference with coefficient `1/(2·dx)`; first-order
//! one-sided differences where a neighbour is unavailable.

use ndarray::{Array3, ArrayView3, Axis};
use openbc_types::geometry::Dimensionality;

/// `(plus - minus) / (2·dx)`.
#[inline]
pub fn central_difference(minus: f64, plus: f64, dx: f64) -> f64 {
    (plus - minus) / (2.0 * dx)
}

/// `(plus - here) / dx`.
#[inline]
pub fn forward_difference(here: f64, plus: f64, dx: f64) -> f64 {
    (plus - here) / dx
}

/// `(here - minus) / dx`.
#[inline]
pub fn backward_difference(minus: f64, here: f64, dx: f64) -> f64 {
    (here - minus) / dx
}

/// Gradient of a whole buffer, one component per axis.
///
/// Central differences in the interior, one-sided at the buffer edges.
/// Components of inactive axes (or axes of length 1) are zero.
pub fn gradient_3d(
    field: ArrayView3<'_, f64>,
    dx: [f64; 3],
    dim: Dimensionality,
) -> [Array3<f64>; 3] {
    let mut out = [
        Array3::zeros(field.raw_dim()),
        Array3::zeros(field.raw_dim()),
        Array3::zeros(field.raw_dim()),
    ];
    for &axis in dim.active_axes() {
        let n = field.len_of(Axis(axis));
        if n < 2 {
            continue;
        }
        let h = dx[axis];
        for ((i, j, k), g) in out[axis].indexed_iter_mut() {
            let idx = [i, j, k];
            let at = |m: usize| {
                let mut p = idx;
                p[axis] = m;
                field[p]
            };
            let c = idx[axis];
            *g = if c == 0 {
                forward_difference(at(0), at(1), h)
            } else if c == n - 1 {
                backward_difference(at(n - 2), at(n - 1), h)
            } else {
                central_difference(at(c - 1), at(c + 1), h)
            };
        }
    }
    out
}

// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — OpenBC Free-Space Green's Function Solver
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Open-boundary Poisson solve by zero-padded FFT convolution.
//!
//! Hockney's method: the node-sampled charge density is embedded in a
//! buffer twice its size along every active axis, convolved with the
//! free-space Green's function sampled at minimum-image distances, and the
//! original window is read back. With `n` samples per axis and a padded
//! length of `2n`, every source/target pair separation is below half the
//! padded period, so the circular convolution equals the aperiodic one.
//!
//!   3-D: G(r) =  1 / (4π ε₀ r)
//!   2-D: G(r) = −ln(r) / (2π ε₀)
//!
//! The self term `G(0)` is replaced by `G(r₀)` with `r₀` a configurable
//! fraction of the smallest active cell edge.
//!
//! References:
//!   - Hockney & Eastwood, "Computer Simulation Using Particles", Ch. 6

use crate::fft::{fft3, ifft3};
use ndarray::{s, Array3};
use openbc_types::error::{OpenBcError, OpenBcResult};
use openbc_types::geometry::Dimensionality;
use std::f64::consts::PI;

/// Dense open-boundary solver consumed by the distributed pipeline.
///
/// `rho` is one worker's node-sampled buffer (row-major, x slowest) and
/// `dx` the cell spacing per axis. The result has the same shape.
///
/// `solve` sees no communicator, so a worker's result can only depend on
/// the charge in its own buffer.
pub trait BoundarySolver: Send + Sync {
    fn solve(&self, rho: &Array3<f64>, dx: [f64; 3]) -> OpenBcResult<Array3<f64>>;

    /// True when the potential at a sample depends on charge anywhere in the
    /// domain. Such a solver is only correct when one worker holds the
    /// whole domain.
    fn needs_whole_domain(&self) -> bool {
        false
    }
}

/// Free-space solver over a single buffer.
///
/// The buffer is taken as the complete charge distribution, so the result is
/// the open-boundary potential only when the buffer spans the whole domain.
/// On a worker's slab it is the self-potential of that slab's charge.
#[derive(Debug, Clone)]
pub struct HockneySolver {
    dim: Dimensionality,
    epsilon0: f64,
    origin_regularization: f64,
}

impl HockneySolver {
    pub fn new(
        dim: Dimensionality,
        epsilon0: f64,
        origin_regularization: f64,
    ) -> OpenBcResult<Self> {
        if !epsilon0.is_finite() || epsilon0 <= 0.0 {
            return Err(OpenBcError::ConfigError(format!(
                "epsilon0 must be finite and > 0, got {epsilon0}"
            )));
        }
        if !origin_regularization.is_finite() || origin_regularization <= 0.0 {
            return Err(OpenBcError::ConfigError(format!(
                "origin regularization must be finite and > 0, got {origin_regularization}"
            )));
        }
        Ok(HockneySolver {
            dim,
            epsilon0,
            origin_regularization,
        })
    }

    pub fn dimensionality(&self) -> Dimensionality {
        self.dim
    }

    fn kernel(&self, r: f64) -> f64 {
        match self.dim {
            Dimensionality::Xyz => 1.0 / (4.0 * PI * self.epsilon0 * r),
            _ => -r.ln() / (2.0 * PI * self.epsilon0),
        }
    }

    /// Green's function on the padded grid, minimum-image distances.
    fn green_table(&self, padded: [usize; 3], dx: [f64; 3]) -> Array3<f64> {
        let axes = self.dim.active_axes();
        let min_dx = axes.iter().map(|&a| dx[a]).fold(f64::INFINITY, f64::min);
        let r0 = self.origin_regularization * min_dx;
        Array3::from_shape_fn((padded[0], padded[1], padded[2]), |(i, j, k)| {
            let idx = [i, j, k];
            let mut r2 = 0.0f64;
            for &a in axes {
                let d = idx[a].min(padded[a] - idx[a]) as f64 * dx[a];
                r2 += d * d;
            }
            let r = r2.sqrt();
            self.kernel(if r > 0.0 { r } else { r0 })
        })
    }
}

impl BoundarySolver for HockneySolver {
    fn solve(&self, rho: &Array3<f64>, dx: [f64; 3]) -> OpenBcResult<Array3<f64>> {
        let shape = rho.dim();
        let n = [shape.0, shape.1, shape.2];
        let mut padded = [1usize; 3];
        let mut cell_volume = 1.0f64;
        for axis in 0..3 {
            if self.dim.is_active(axis) {
                if !dx[axis].is_finite() || dx[axis] <= 0.0 {
                    return Err(OpenBcError::ConfigError(format!(
                        "cell spacing must be finite > 0, got dx[{axis}]={}",
                        dx[axis]
                    )));
                }
                padded[axis] = 2 * n[axis];
                cell_volume *= dx[axis];
            } else if n[axis] != 1 {
                return Err(OpenBcError::ConfigError(format!(
                    "axis {axis} is inactive in a {:?} build but the buffer has {} samples",
                    self.dim, n[axis]
                )));
            }
        }
        if rho.is_empty() {
            return Err(OpenBcError::ConfigError(
                "boundary solve needs a non-empty buffer".to_string(),
            ));
        }
        if rho.iter().any(|v| !v.is_finite()) {
            return Err(OpenBcError::ConfigError(
                "charge density contains non-finite values".to_string(),
            ));
        }

        let mut padded_rho = Array3::<f64>::zeros((padded[0], padded[1], padded[2]));
        padded_rho
            .slice_mut(s![0..n[0], 0..n[1], 0..n[2]])
            .assign(&rho.mapv(|v| v * cell_volume));
        let mut spectrum = fft3(&padded_rho);
        let green_hat = fft3(&self.green_table(padded, dx));
        spectrum.zip_mut_with(&green_hat, |a, g| *a *= *g);
        let phi = ifft3(&spectrum)
            .slice(s![0..n[0], 0..n[1], 0..n[2]])
            .to_owned();

        if phi.iter().any(|v| !v.is_finite()) {
            return Err(OpenBcError::SolverFailure(
                "free-space convolution produced non-finite potential".to_string(),
            ));
        }
        log::trace!(
            "Hockney solve {:?} -> padded {:?}, cell volume {cell_volume:.3e}",
            n,
            padded
        );
        Ok(phi)
    }

    fn needs_whole_domain(&self) -> bool {
        true
    }
}

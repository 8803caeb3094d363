//! Nodal field from the nodal potential by 3-point differences.
//!
//! Interior and periodic nodes use `(φ[i+1] - φ[i-1]) / (2·dx)` and read one
//! halo sample on each side. Nodes on a non-periodic domain face have no
//! neighbour beyond the face and fall back to a one-sided difference.

use crate::field::{CopyOp, Field, VectorField};
use ndarray::{s, Array3};
use openbc_math::stencil::gradient_3d;
use openbc_types::error::{OpenBcError, OpenBcResult};
use openbc_types::region::{IndexType, Region};
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StencilDerivator {
    sign: f64,
}

impl StencilDerivator {
    /// `∇φ`.
    pub fn gradient() -> Self {
        StencilDerivator { sign: 1.0 }
    }

    /// `E = -∇φ`.
    pub fn electric_field() -> Self {
        StencilDerivator { sign: -1.0 }
    }

    pub fn sign(&self) -> f64 {
        self.sign
    }

    /// Fill the valid samples of `out` from `phi`.
    ///
    /// `phi` and `out` must share entries; `phi` needs at least one halo layer.
    pub fn derive(&self, phi: &Field, out: &mut VectorField) -> OpenBcResult<()> {
        let decomposition = phi.decomposition();
        let geometry = decomposition.geometry();
        let dim = geometry.dimensionality();
        if out.decomposition().entries() != decomposition.entries() {
            return Err(OpenBcError::ConfigError(
                "potential and field decompositions differ".to_string(),
            ));
        }
        if let Some(t) = decomposition.index_type() {
            if t != IndexType::node_on(dim) {
                return Err(OpenBcError::ConfigError(format!(
                    "potential must be node-centered, got {t:?}"
                )));
            }
        }
        if phi.n_grow() < 1 {
            return Err(OpenBcError::ConfigError(
                "potential needs a halo of at least one sample".to_string(),
            ));
        }

        let dx = geometry.cell_size();
        let nodes = geometry.node_domain();
        let local: Vec<_> = phi.fabs().collect();
        let derived = local
            .par_iter()
            .map(|&(index, fab)| -> OpenBcResult<(usize, [Array3<f64>; 3])> {
                let valid = *fab.valid_region();
                let storage = *fab.storage_region();
                // Clip the halo at non-periodic domain faces so the kernel
                // turns one-sided there.
                let (mut lo, mut hi) = (storage.lo(), storage.hi());
                for &axis in dim.active_axes() {
                    if !geometry.is_periodic(axis) {
                        lo[axis] = lo[axis].max(nodes.lo()[axis]);
                        hi[axis] = hi[axis].min(nodes.hi()[axis]);
                    }
                }
                let window = Region::new(lo, hi, storage.index_type())?;
                let grad = gradient_3d(fab.view(&window)?, dx, dim);
                let o: Vec<usize> = (0..3).map(|a| (valid.lo()[a] - lo[a]) as usize).collect();
                let (nx, ny, nz) = valid.shape();
                let comps = grad.map(|g| {
                    g.slice(s![o[0]..o[0] + nx, o[1]..o[1] + ny, o[2]..o[2] + nz])
                        .mapv(|v| self.sign * v)
                });
                Ok((index, comps))
            })
            .collect::<OpenBcResult<Vec<_>>>()?;

        for (index, comps) in derived {
            for (axis, comp) in comps.into_iter().enumerate() {
                let fab = out.component_mut(axis).fab_mut(index).ok_or_else(|| {
                    OpenBcError::BoundsViolation(format!("no field storage for entry {index}"))
                })?;
                let valid = *fab.valid_region();
                let values: Vec<f64> = comp.iter().copied().collect();
                fab.write(&valid, &values, CopyOp::Overwrite)?;
            }
        }
        Ok(())
    }
}

impl Default for StencilDerivator {
    fn default() -> Self {
        Self::electric_field()
    }
}

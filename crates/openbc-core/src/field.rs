// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — OpenBC Distributed Fields
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Scalar and vector fields distributed over a Decomposition.
//!
//! A worker stores one dense buffer (`Fab`) per entry it owns. Each buffer
//! covers its Region grown by `n_grow` ghost samples on every active axis.
//! Placeholder entries and entries owned by other workers have no storage.

use crate::context::SolveContext;
use crate::decomposition::{Decomposition, Entry};
use ndarray::{s, Array3, ArrayView3};
use openbc_types::error::{OpenBcError, OpenBcResult};
use openbc_types::geometry::Dimensionality;
use openbc_types::region::{IntVect, Region};
use std::collections::BTreeMap;
use std::ops::Range;

/// How incoming samples combine with what is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOp {
    Add,
    Overwrite,
}

/// Dense buffer for one Region plus its ghost layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Fab {
    valid: Region,
    storage: Region,
    data: Array3<f64>,
}

impl Fab {
    pub fn zeros(valid: Region, n_grow: usize, dim: Dimensionality) -> Self {
        let storage = valid.grown(n_grow, dim);
        Fab {
            valid,
            storage,
            data: Array3::zeros(storage.shape()),
        }
    }

    pub fn valid_region(&self) -> &Region {
        &self.valid
    }

    pub fn storage_region(&self) -> &Region {
        &self.storage
    }

    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array3<f64> {
        &mut self.data
    }

    pub fn get(&self, iv: IntVect) -> Option<f64> {
        self.storage.offset_of(iv).map(|o| self.data[o])
    }

    pub fn set(&mut self, iv: IntVect, value: f64) -> OpenBcResult<()> {
        let o = self.storage.offset_of(iv).ok_or_else(|| {
            OpenBcError::BoundsViolation(format!("{iv:?} outside storage {}", self.storage))
        })?;
        self.data[o] = value;
        Ok(())
    }

    fn window(&self, region: &Region) -> OpenBcResult<[Range<usize>; 3]> {
        if region.index_type() != self.storage.index_type() {
            return Err(OpenBcError::BoundsViolation(format!(
                "{region} does not match the index type of storage {}",
                self.storage
            )));
        }
        let o = match self.storage.offset_of(region.lo()) {
            Some(o) if self.storage.contains(region.hi()) => o,
            _ => {
                return Err(OpenBcError::BoundsViolation(format!(
                    "{region} outside storage {}",
                    self.storage
                )))
            }
        };
        Ok([
            o[0]..o[0] + region.length(0),
            o[1]..o[1] + region.length(1),
            o[2]..o[2] + region.length(2),
        ])
    }

    pub fn view(&self, region: &Region) -> OpenBcResult<ArrayView3<'_, f64>> {
        let [a, b, c] = self.window(region)?;
        Ok(self.data.slice(s![a, b, c]))
    }

    pub fn valid_view(&self) -> ArrayView3<'_, f64> {
        let g = [
            (self.valid.lo()[0] - self.storage.lo()[0]) as usize,
            (self.valid.lo()[1] - self.storage.lo()[1]) as usize,
            (self.valid.lo()[2] - self.storage.lo()[2]) as usize,
        ];
        let (nx, ny, nz) = self.valid.shape();
        self.data
            .slice(s![g[0]..g[0] + nx, g[1]..g[1] + ny, g[2]..g[2] + nz])
    }

    /// Samples of `region` in row-major order.
    pub fn read(&self, region: &Region) -> OpenBcResult<Vec<f64>> {
        Ok(self.view(region)?.iter().copied().collect())
    }

    /// Combine row-major `values` into `region`.
    pub fn write(&mut self, region: &Region, values: &[f64], op: CopyOp) -> OpenBcResult<()> {
        if values.len() != region.num_points() {
            return Err(OpenBcError::BoundsViolation(format!(
                "{} values for {region} with {} points",
                values.len(),
                region.num_points()
            )));
        }
        let [a, b, c] = self.window(region)?;
        let mut target = self.data.slice_mut(s![a, b, c]);
        match op {
            CopyOp::Add => target
                .iter_mut()
                .zip(values)
                .for_each(|(d, v)| *d += *v),
            CopyOp::Overwrite => target
                .iter_mut()
                .zip(values)
                .for_each(|(d, v)| *d = *v),
        }
        Ok(())
    }

    /// Set every stored sample (ghosts included) from its index.
    pub fn fill_with<F: FnMut(IntVect) -> f64>(&mut self, mut f: F) {
        for (iv, d) in self.storage.points().zip(self.data.iter_mut()) {
            *d = f(iv);
        }
    }
}

/// Scalar field: one `Fab` per locally owned entry.
#[derive(Debug, Clone)]
pub struct Field {
    decomposition: Decomposition,
    n_grow: usize,
    worker_id: usize,
    fabs: BTreeMap<usize, Fab>,
}

impl Field {
    pub fn zeros(decomposition: &Decomposition, n_grow: usize, ctx: &SolveContext) -> Self {
        let dim = decomposition.geometry().dimensionality();
        let fabs = decomposition
            .entries()
            .iter()
            .enumerate()
            .filter_map(|(i, e)| match e {
                Entry::Owned { region, owner } if *owner == ctx.worker_id => {
                    Some((i, Fab::zeros(*region, n_grow, dim)))
                }
                _ => None,
            })
            .collect();
        Field {
            decomposition: decomposition.clone(),
            n_grow,
            worker_id: ctx.worker_id,
            fabs,
        }
    }

    pub fn decomposition(&self) -> &Decomposition {
        &self.decomposition
    }

    pub fn n_grow(&self) -> usize {
        self.n_grow
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub fn fab(&self, index: usize) -> Option<&Fab> {
        self.fabs.get(&index)
    }

    pub fn fab_mut(&mut self, index: usize) -> Option<&mut Fab> {
        self.fabs.get_mut(&index)
    }

    pub fn fabs(&self) -> impl Iterator<Item = (usize, &Fab)> + '_ {
        self.fabs.iter().map(|(i, f)| (*i, f))
    }

    pub fn fabs_mut(&mut self) -> impl Iterator<Item = (usize, &mut Fab)> + '_ {
        self.fabs.iter_mut().map(|(i, f)| (*i, f))
    }

    pub fn num_local(&self) -> usize {
        self.fabs.len()
    }

    pub fn set_val(&mut self, value: f64) {
        for fab in self.fabs.values_mut() {
            fab.data.fill(value);
        }
    }

    /// Set every stored sample of every local buffer from its index.
    pub fn fill_with<F: Fn(IntVect) -> f64>(&mut self, f: F) {
        for fab in self.fabs.values_mut() {
            fab.fill_with(&f);
        }
    }

    /// First local valid sample at `iv`.
    pub fn value_at(&self, iv: IntVect) -> Option<f64> {
        self.fabs
            .values()
            .find(|f| f.valid.contains(iv))
            .and_then(|f| f.get(iv))
    }

    /// Local sum over valid samples.
    pub fn sum_valid(&self) -> f64 {
        self.fabs.values().map(|f| f.valid_view().sum()).sum()
    }

    /// Local sum over stored samples, ghosts included.
    pub fn sum_stored(&self) -> f64 {
        self.fabs.values().map(|f| f.data.sum()).sum()
    }

    pub fn is_zero(&self) -> bool {
        self.fabs.values().all(|f| f.data.iter().all(|v| *v == 0.0))
    }

    /// Local `(min, max)` over valid samples, `None` without local storage.
    pub fn min_max_valid(&self) -> Option<(f64, f64)> {
        self.fabs
            .values()
            .flat_map(|f| f.valid_view().iter().copied().collect::<Vec<_>>())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Three scalar components on one Decomposition.
#[derive(Debug, Clone)]
pub struct VectorField {
    components: [Field; 3],
}

impl VectorField {
    pub fn zeros(decomposition: &Decomposition, n_grow: usize, ctx: &SolveContext) -> Self {
        VectorField {
            components: [
                Field::zeros(decomposition, n_grow, ctx),
                Field::zeros(decomposition, n_grow, ctx),
                Field::zeros(decomposition, n_grow, ctx),
            ],
        }
    }

    pub fn component(&self, axis: usize) -> &Field {
        &self.components[axis]
    }

    pub fn component_mut(&mut self, axis: usize) -> &mut Field {
        &mut self.components[axis]
    }

    pub fn components(&self) -> &[Field; 3] {
        &self.components
    }

    pub fn components_mut(&mut self) -> &mut [Field; 3] {
        &mut self.components
    }

    pub fn decomposition(&self) -> &Decomposition {
        self.components[0].decomposition()
    }

    /// Local maximum of `|v|` over valid samples.
    pub fn max_magnitude(&self) -> f64 {
        let mut best = 0.0f64;
        for (i, fx) in self.components[0].fabs() {
            let (Some(fy), Some(fz)) = (self.components[1].fab(i), self.components[2].fab(i))
            else {
                continue;
            };
            for ((x, y), z) in fx
                .valid_view()
                .iter()
                .zip(fy.valid_view().iter())
                .zip(fz.valid_view().iter())
            {
                best = best.max((x * x + y * y + z * z).sqrt());
            }
        }
        best
    }
}

// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — OpenBC Geometry
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use crate::constants::MAX_AXES;
use crate::error::{OpenBcError, OpenBcResult};
use crate::region::{IntVect, Region};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Active axes of a build. 2-D builds pick one axis pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimensionality {
    Xyz,
    Xy,
    Xz,
    Yz,
}

impl Dimensionality {
    pub fn active_axes(&self) -> &'static [usize] {
        match self {
            Dimensionality::Xyz => &[0, 1, 2],
            Dimensionality::Xy => &[0, 1],
            Dimensionality::Xz => &[0, 2],
            Dimensionality::Yz => &[1, 2],
        }
    }

    pub fn is_active(&self, axis: usize) -> bool {
        self.active_axes().contains(&axis)
    }

    pub fn num_axes(&self) -> usize {
        self.active_axes().len()
    }

    /// Integers exchanged per Region in the layout all-gather.
    pub fn bounds_per_region(&self) -> usize {
        2 * self.num_axes()
    }
}

/// Physical domain, cell spacing and periodicity.
/// Index space is cell-centered: `n_cell[a]` cells, nodes `0..=n_cell[a]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    domain: Region,
    prob_lo: [f64; MAX_AXES],
    prob_hi: [f64; MAX_AXES],
    dx: [f64; MAX_AXES],
    periodicity: [bool; MAX_AXES],
    dim: Dimensionality,
}

impl Geometry {
    pub fn new(
        n_cell: [usize; MAX_AXES],
        prob_lo: [f64; MAX_AXES],
        prob_hi: [f64; MAX_AXES],
        periodicity: [bool; MAX_AXES],
        dim: Dimensionality,
    ) -> OpenBcResult<Self> {
        let mut hi = [0i64; MAX_AXES];
        let mut dx = [1.0f64; MAX_AXES];
        for axis in 0..MAX_AXES {
            if !dim.is_active(axis) {
                if periodicity[axis] {
                    return Err(OpenBcError::ConfigError(format!(
                        "axis {axis} is inactive in a {dim:?} build but flagged periodic"
                    )));
                }
                continue;
            }
            if n_cell[axis] < 1 {
                return Err(OpenBcError::ConfigError(format!(
                    "n_cell[{axis}] must be >= 1"
                )));
            }
            let (lo, up) = (prob_lo[axis], prob_hi[axis]);
            if !lo.is_finite() || !up.is_finite() || up <= lo {
                return Err(OpenBcError::ConfigError(format!(
                    "axis {axis} needs finite prob_lo < prob_hi, got {lo}..{up}"
                )));
            }
            hi[axis] = n_cell[axis] as i64 - 1;
            dx[axis] = (up - lo) / n_cell[axis] as f64;
        }
        Ok(Geometry {
            domain: Region::cell([0; MAX_AXES], hi)?,
            prob_lo,
            prob_hi,
            dx,
            periodicity,
            dim,
        })
    }

    /// Cell-centered index domain.
    pub fn domain(&self) -> &Region {
        &self.domain
    }

    /// Node-centered index domain (`hi + 1` on active axes).
    pub fn node_domain(&self) -> Region {
        self.domain.surrounding_nodes(self.dim)
    }

    pub fn cell_size(&self) -> [f64; MAX_AXES] {
        self.dx
    }

    pub fn prob_lo(&self) -> [f64; MAX_AXES] {
        self.prob_lo
    }

    pub fn prob_hi(&self) -> [f64; MAX_AXES] {
        self.prob_hi
    }

    pub fn periodicity(&self) -> [bool; MAX_AXES] {
        self.periodicity
    }

    pub fn is_periodic(&self, axis: usize) -> bool {
        self.periodicity[axis]
    }

    pub fn dimensionality(&self) -> Dimensionality {
        self.dim
    }

    /// Period length in index units along `axis` (the cell count).
    pub fn period(&self, axis: usize) -> i64 {
        self.domain.length(axis) as i64
    }

    /// Translations for the zero image and one periodic image per periodic
    /// axis (every combination of `{0, -L, +L}`). The zero shift is first.
    pub fn periodic_shifts(&self) -> Vec<IntVect> {
        let mut shifts: Vec<IntVect> = vec![[0; MAX_AXES]];
        for &axis in self.dim.active_axes() {
            if !self.periodicity[axis] {
                continue;
            }
            let period = self.period(axis);
            let mut next = Vec::with_capacity(shifts.len() * 3);
            for s in &shifts {
                for delta in [0, -period, period] {
                    let mut t = *s;
                    t[axis] += delta;
                    next.push(t);
                }
            }
            shifts = next;
        }
        shifts
    }

    /// Physical position of node `iv`.
    pub fn node_position(&self, iv: IntVect) -> [f64; MAX_AXES] {
        let mut x = [0.0f64; MAX_AXES];
        for axis in 0..MAX_AXES {
            x[axis] = self.prob_lo[axis] + iv[axis] as f64 * self.dx[axis];
        }
        x
    }

    /// Node coordinates along `axis`, `prob_lo..=prob_hi`.
    pub fn node_coords(&self, axis: usize) -> Array1<f64> {
        if !self.dim.is_active(axis) {
            return Array1::from_elem(1, self.prob_lo[axis]);
        }
        Array1::linspace(
            self.prob_lo[axis],
            self.prob_hi[axis],
            self.domain.length(axis) + 1,
        )
    }
}

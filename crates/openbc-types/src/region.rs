// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — OpenBC Region
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Closed, integer-indexed, axis-aligned sub-domains.
//!
//! A `Region` always carries three axes. In 2-D builds the inactive axis is
//! pinned to `lo = hi = 0` and every operation that changes extents
//! (`grown`, `surrounding_nodes`, bound packing) skips it.

use crate::constants::MAX_AXES;
use crate::error::{OpenBcError, OpenBcResult};
use crate::geometry::Dimensionality;
use serde::{Deserialize, Serialize};

/// Integer coordinate, one entry per axis (x, y, z).
pub type IntVect = [i64; MAX_AXES];

/// Sample location along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Centering {
    Cell,
    Node,
}

/// Per-axis centering of a Region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexType([Centering; MAX_AXES]);

impl IndexType {
    pub const fn cell() -> Self {
        IndexType([Centering::Cell; MAX_AXES])
    }

    pub const fn node() -> Self {
        IndexType([Centering::Node; MAX_AXES])
    }

    pub const fn mixed(centering: [Centering; MAX_AXES]) -> Self {
        IndexType(centering)
    }

    pub fn centering(&self, axis: usize) -> Centering {
        self.0[axis]
    }

    pub fn is_cell(&self) -> bool {
        self.0.iter().all(|c| *c == Centering::Cell)
    }

    pub fn is_node(&self) -> bool {
        self.0.iter().all(|c| *c == Centering::Node)
    }

    /// Node-centered on every active axis, cell on inactive ones.
    pub fn node_on(dim: Dimensionality) -> Self {
        let mut c = [Centering::Cell; MAX_AXES];
        for &axis in dim.active_axes() {
            c[axis] = Centering::Node;
        }
        IndexType(c)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    lo: IntVect,
    hi: IntVect,
    index_type: IndexType,
}

impl Region {
    pub fn new(lo: IntVect, hi: IntVect, index_type: IndexType) -> OpenBcResult<Self> {
        for axis in 0..MAX_AXES {
            if lo[axis] > hi[axis] {
                return Err(OpenBcError::ConfigError(format!(
                    "Region requires lo <= hi on every axis, got lo={lo:?} hi={hi:?}"
                )));
            }
        }
        Ok(Region { lo, hi, index_type })
    }

    pub fn cell(lo: IntVect, hi: IntVect) -> OpenBcResult<Self> {
        Self::new(lo, hi, IndexType::cell())
    }

    pub fn node(lo: IntVect, hi: IntVect) -> OpenBcResult<Self> {
        Self::new(lo, hi, IndexType::node())
    }

    pub fn lo(&self) -> IntVect {
        self.lo
    }

    pub fn hi(&self) -> IntVect {
        self.hi
    }

    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    /// Number of samples along `axis` (bounds are inclusive).
    pub fn length(&self, axis: usize) -> usize {
        (self.hi[axis] - self.lo[axis] + 1) as usize
    }

    /// Dense buffer shape `(nx, ny, nz)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.length(0), self.length(1), self.length(2))
    }

    pub fn num_points(&self) -> usize {
        self.length(0) * self.length(1) * self.length(2)
    }

    pub fn contains(&self, iv: IntVect) -> bool {
        (0..MAX_AXES).all(|a| iv[a] >= self.lo[a] && iv[a] <= self.hi[a])
    }

    pub fn contains_region(&self, other: &Region) -> bool {
        self.contains(other.lo) && self.contains(other.hi)
    }

    /// Intersection of two Regions of the same index type.
    pub fn intersect(&self, other: &Region) -> Option<Region> {
        debug_assert_eq!(
            self.index_type, other.index_type,
            "intersecting Regions of different index types"
        );
        let mut lo = [0i64; MAX_AXES];
        let mut hi = [0i64; MAX_AXES];
        for a in 0..MAX_AXES {
            lo[a] = self.lo[a].max(other.lo[a]);
            hi[a] = self.hi[a].min(other.hi[a]);
            if lo[a] > hi[a] {
                return None;
            }
        }
        Some(Region {
            lo,
            hi,
            index_type: self.index_type,
        })
    }

    pub fn shifted(&self, shift: IntVect) -> Region {
        let mut lo = self.lo;
        let mut hi = self.hi;
        for a in 0..MAX_AXES {
            lo[a] += shift[a];
            hi[a] += shift[a];
        }
        Region {
            lo,
            hi,
            index_type: self.index_type,
        }
    }

    /// Grow by `n` samples on both sides of every active axis.
    pub fn grown(&self, n: usize, dim: Dimensionality) -> Region {
        let n = n as i64;
        let mut lo = self.lo;
        let mut hi = self.hi;
        for &a in dim.active_axes() {
            lo[a] -= n;
            hi[a] += n;
        }
        Region {
            lo,
            hi,
            index_type: self.index_type,
        }
    }

    /// Convert every cell-centered active axis to node centering.
    ///
    /// Cells `[lo, hi]` are bounded by nodes `[lo, hi + 1]`.
    pub fn surrounding_nodes(&self, dim: Dimensionality) -> Region {
        let mut hi = self.hi;
        let mut centering = self.index_type.0;
        for &a in dim.active_axes() {
            if centering[a] == Centering::Cell {
                hi[a] += 1;
                centering[a] = Centering::Node;
            }
        }
        Region {
            lo: self.lo,
            hi,
            index_type: IndexType(centering),
        }
    }

    /// Local offset of `iv` inside this Region's dense buffer.
    pub fn offset_of(&self, iv: IntVect) -> Option<[usize; MAX_AXES]> {
        if !self.contains(iv) {
            return None;
        }
        Some([
            (iv[0] - self.lo[0]) as usize,
            (iv[1] - self.lo[1]) as usize,
            (iv[2] - self.lo[2]) as usize,
        ])
    }

    /// Every index in the Region, last axis fastest (row-major order).
    pub fn points(&self) -> impl Iterator<Item = IntVect> + '_ {
        let (lo, hi) = (self.lo, self.hi);
        (lo[0]..=hi[0]).flat_map(move |i| {
            (lo[1]..=hi[1]).flat_map(move |j| (lo[2]..=hi[2]).map(move |k| [i, j, k]))
        })
    }

    /// Bounds of the active axes as `[lo.., hi..]`: 6 integers in 3-D, 4 in 2-D.
    pub fn pack_bounds(&self, dim: Dimensionality) -> Vec<i64> {
        let axes = dim.active_axes();
        let mut out = Vec::with_capacity(2 * axes.len());
        out.extend(axes.iter().map(|&a| self.lo[a]));
        out.extend(axes.iter().map(|&a| self.hi[a]));
        out
    }

    /// Inverse of [`Region::pack_bounds`]; inactive axes are pinned to zero.
    pub fn unpack_bounds(
        packed: &[i64],
        dim: Dimensionality,
        index_type: IndexType,
    ) -> OpenBcResult<Region> {
        let axes = dim.active_axes();
        if packed.len() != 2 * axes.len() {
            return Err(OpenBcError::CollectiveMismatch {
                expected: 2 * axes.len(),
                got: packed.len(),
            });
        }
        let mut lo = [0i64; MAX_AXES];
        let mut hi = [0i64; MAX_AXES];
        for (k, &a) in axes.iter().enumerate() {
            lo[a] = packed[k];
            hi[a] = packed[axes.len() + k];
        }
        Region::new(lo, hi, index_type)
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = if self.index_type.is_node() {
            "node"
        } else if self.index_type.is_cell() {
            "cell"
        } else {
            "mixed"
        };
        write!(
            f,
            "({},{},{})..({},{},{}) {tag}",
            self.lo[0], self.lo[1], self.lo[2], self.hi[0], self.hi[1], self.hi[2]
        )
    }
}

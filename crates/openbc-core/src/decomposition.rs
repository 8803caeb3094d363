// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — OpenBC Domain Decomposition
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Ordered Region lists with per-entry ownership.
//!
//! A `Decomposition` is what every worker agrees on: the same entries in the
//! same order on every worker. Entries are either an owned Region or a
//! placeholder that carries no data and resolves to whichever worker asks.
//! Placeholders exist so that a layout can always be indexed one past its
//! last real entry without special-casing the caller.

use crate::context::SolveContext;
use openbc_types::error::{OpenBcError, OpenBcResult};
use openbc_types::geometry::Geometry;
use openbc_types::region::{Centering, IndexType, Region};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ownership {
    Worker(usize),
    /// Resolves to the worker that looks it up.
    Placeholder,
}

/// Entry-index to owning-worker mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipMap(Vec<Ownership>);

impl OwnershipMap {
    pub fn new(entries: Vec<Ownership>) -> Self {
        OwnershipMap(entries)
    }

    /// Identity map over the workers followed by one placeholder:
    /// `[0, 1, .., N-1, <caller>]`.
    pub fn with_placeholder(ctx: &SolveContext) -> Self {
        OwnershipMap(
            (0..ctx.num_workers)
                .map(Ownership::Worker)
                .chain(std::iter::once(Ownership::Placeholder))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn entries(&self) -> &[Ownership] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<Ownership> {
        self.0.get(index).copied()
    }

    /// Owning worker of entry `index` as seen from `ctx`.
    pub fn resolve(&self, index: usize, ctx: &SolveContext) -> Option<usize> {
        self.get(index).map(|o| match o {
            Ownership::Worker(w) => w,
            Ownership::Placeholder => ctx.worker_id,
        })
    }

    /// Every entry resolved as seen from `ctx`.
    pub fn resolved(&self, ctx: &SolveContext) -> Vec<usize> {
        (0..self.len())
            .filter_map(|i| self.resolve(i, ctx))
            .collect()
    }

    pub fn num_owned(&self) -> usize {
        self.0
            .iter()
            .filter(|o| matches!(o, Ownership::Worker(_)))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Owned { region: Region, owner: usize },
    Placeholder,
}

impl Entry {
    pub fn region(&self) -> Option<&Region> {
        match self {
            Entry::Owned { region, .. } => Some(region),
            Entry::Placeholder => None,
        }
    }

    pub fn ownership(&self) -> Ownership {
        match self {
            Entry::Owned { owner, .. } => Ownership::Worker(*owner),
            Entry::Placeholder => Ownership::Placeholder,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decomposition {
    geometry: Geometry,
    num_workers: usize,
    entries: Vec<Entry>,
}

impl Decomposition {
    /// Decomposition of owned Regions, in the given order.
    pub fn from_regions(
        geometry: Geometry,
        num_workers: usize,
        regions: Vec<(Region, usize)>,
    ) -> OpenBcResult<Self> {
        let entries = regions
            .into_iter()
            .map(|(region, owner)| Entry::Owned { region, owner })
            .collect();
        Self::from_entries(geometry, num_workers, entries)
    }

    /// Pair gathered Regions with an ownership map. `Worker` entries consume
    /// `regions` in order; `Placeholder` entries consume nothing.
    pub fn from_ownership(
        geometry: Geometry,
        num_workers: usize,
        regions: Vec<Region>,
        ownership: &OwnershipMap,
    ) -> OpenBcResult<Self> {
        if regions.len() != ownership.num_owned() {
            return Err(OpenBcError::CollectiveMismatch {
                expected: ownership.num_owned(),
                got: regions.len(),
            });
        }
        let mut regions = regions.into_iter();
        let mut entries = Vec::with_capacity(ownership.len());
        for o in ownership.entries() {
            match o {
                Ownership::Worker(owner) => {
                    let region = regions.next().ok_or_else(|| {
                        OpenBcError::ConfigError("ownership map outruns region list".to_string())
                    })?;
                    entries.push(Entry::Owned {
                        region,
                        owner: *owner,
                    });
                }
                Ownership::Placeholder => entries.push(Entry::Placeholder),
            }
        }
        Self::from_entries(geometry, num_workers, entries)
    }

    fn from_entries(
        geometry: Geometry,
        num_workers: usize,
        entries: Vec<Entry>,
    ) -> OpenBcResult<Self> {
        if num_workers < 1 {
            return Err(OpenBcError::ConfigError(
                "decomposition requires num_workers >= 1".to_string(),
            ));
        }
        let dim = geometry.dimensionality();
        let mut index_type: Option<IndexType> = None;
        for (i, e) in entries.iter().enumerate() {
            let Entry::Owned { region, owner } = e else {
                continue;
            };
            if *owner >= num_workers {
                return Err(OpenBcError::ConfigError(format!(
                    "entry {i} owned by worker {owner}, only {num_workers} workers"
                )));
            }
            for axis in (0..3).filter(|a| !dim.is_active(*a)) {
                if region.lo()[axis] != 0 || region.hi()[axis] != 0 {
                    return Err(OpenBcError::ConfigError(format!(
                        "entry {i} spans inactive axis {axis} in a {dim:?} build: {region}"
                    )));
                }
            }
            match index_type {
                None => index_type = Some(region.index_type()),
                Some(t) if t != region.index_type() => {
                    return Err(OpenBcError::ConfigError(format!(
                        "entry {i} has index type {:?}, expected {t:?}",
                        region.index_type()
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(Decomposition {
            geometry,
            num_workers,
            entries,
        })
    }

    /// Chop the cell domain into tiles of at most `max_grid_size` cells per
    /// axis and deal them out to workers in contiguous, balanced runs.
    ///
    /// Tiles are ordered row-major (x slowest).
    pub fn chop(geometry: &Geometry, max_grid_size: usize, num_workers: usize) -> OpenBcResult<Self> {
        if max_grid_size == 0 {
            return Err(OpenBcError::ConfigError(
                "max_grid_size must be >= 1".to_string(),
            ));
        }
        if num_workers < 1 {
            return Err(OpenBcError::ConfigError(
                "decomposition requires num_workers >= 1".to_string(),
            ));
        }
        let domain = geometry.domain();
        let dim = geometry.dimensionality();

        // Per-axis (start, len) runs.
        let runs: Vec<Vec<(i64, usize)>> = (0..3)
            .map(|axis| {
                if !dim.is_active(axis) {
                    return vec![(0, 1)];
                }
                let n = domain.length(axis);
                let pieces = n.div_ceil(max_grid_size);
                let mut cursor = domain.lo()[axis];
                balanced_split(n, pieces)
                    .into_iter()
                    .map(|len| {
                        let start = cursor;
                        cursor += len as i64;
                        (start, len)
                    })
                    .collect()
            })
            .collect();

        let mut tiles = Vec::with_capacity(runs[0].len() * runs[1].len() * runs[2].len());
        for &(x0, nx) in &runs[0] {
            for &(y0, ny) in &runs[1] {
                for &(z0, nz) in &runs[2] {
                    tiles.push(Region::cell(
                        [x0, y0, z0],
                        [x0 + nx as i64 - 1, y0 + ny as i64 - 1, z0 + nz as i64 - 1],
                    )?);
                }
            }
        }
        if num_workers > tiles.len() {
            return Err(OpenBcError::ConfigError(format!(
                "Cannot split {} tiles across num_workers={num_workers}",
                tiles.len()
            )));
        }

        let mut owned = Vec::with_capacity(tiles.len());
        let mut tiles = tiles.into_iter();
        for (owner, count) in balanced_split(tiles.len(), num_workers).into_iter().enumerate() {
            for region in tiles.by_ref().take(count) {
                owned.push((region, owner));
            }
        }
        Self::from_regions(geometry.clone(), num_workers, owned)
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn region(&self, index: usize) -> Option<&Region> {
        self.entries.get(index).and_then(Entry::region)
    }

    /// `(index, region, owner)` of every owned entry.
    pub fn owned(&self) -> impl Iterator<Item = (usize, &Region, usize)> + '_ {
        self.entries.iter().enumerate().filter_map(|(i, e)| match e {
            Entry::Owned { region, owner } => Some((i, region, *owner)),
            Entry::Placeholder => None,
        })
    }

    pub fn owned_by(&self, worker: usize) -> impl Iterator<Item = (usize, &Region)> + '_ {
        self.owned()
            .filter(move |(_, _, o)| *o == worker)
            .map(|(i, r, _)| (i, r))
    }

    /// Index type shared by every owned Region.
    pub fn index_type(&self) -> Option<IndexType> {
        self.owned().next().map(|(_, r, _)| r.index_type())
    }

    pub fn ownership_map(&self) -> OwnershipMap {
        OwnershipMap(self.entries.iter().map(Entry::ownership).collect())
    }

    /// Same entries and owners with every Region converted to nodes.
    pub fn surrounding_nodes(&self) -> Decomposition {
        let dim = self.geometry.dimensionality();
        Decomposition {
            geometry: self.geometry.clone(),
            num_workers: self.num_workers,
            entries: self
                .entries
                .iter()
                .map(|e| match e {
                    Entry::Owned { region, owner } => Entry::Owned {
                        region: region.surrounding_nodes(dim),
                        owner: *owner,
                    },
                    Entry::Placeholder => Entry::Placeholder,
                })
                .collect(),
        }
    }

    /// Full index domain for Regions of `index_type`.
    pub fn index_domain(&self, index_type: IndexType) -> OpenBcResult<Region> {
        let domain = self.geometry.domain();
        let mut hi = domain.hi();
        for &axis in self.geometry.dimensionality().active_axes() {
            if index_type.centering(axis) == Centering::Node {
                hi[axis] += 1;
            }
        }
        Region::new(domain.lo(), hi, index_type)
    }

    /// Owned Regions lie inside the domain, are pairwise disjoint and cover it.
    pub fn validate_partition(&self) -> OpenBcResult<()> {
        let index_type = self.index_type().ok_or_else(|| {
            OpenBcError::ConfigError("decomposition has no owned entries".to_string())
        })?;
        let domain = self.index_domain(index_type)?;
        let owned: Vec<(usize, &Region)> = self.owned().map(|(i, r, _)| (i, r)).collect();
        for &(i, r) in &owned {
            if !domain.contains_region(r) {
                return Err(OpenBcError::ConfigError(format!(
                    "entry {i} {r} extends outside domain {domain}"
                )));
            }
        }
        for (a, &(i, ri)) in owned.iter().enumerate() {
            for &(j, rj) in &owned[a + 1..] {
                if let Some(overlap) = ri.intersect(rj) {
                    return Err(OpenBcError::ConfigError(format!(
                        "entries {i} and {j} overlap on {overlap}"
                    )));
                }
            }
        }
        let covered: usize = owned.iter().map(|(_, r)| r.num_points()).sum();
        if covered != domain.num_points() {
            return Err(OpenBcError::ConfigError(format!(
                "entries cover {covered} of {} points in {domain}",
                domain.num_points()
            )));
        }
        Ok(())
    }
}

/// Split `n` items across `k` buckets as evenly as possible, remainder to
/// the first buckets. No buckets for `k == 0`.
pub(crate) fn balanced_split(n: usize, k: usize) -> Vec<usize> {
    if k == 0 {
        return Vec::new();
    }
    let base = n / k;
    let rem = n % k;
    (0..k).map(|i| base + usize::from(i < rem)).collect()
}

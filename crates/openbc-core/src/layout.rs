// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — OpenBC Global Layout
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Secondary layout for the boundary solve.
//!
//! Each worker names the node Region it wants its solver to see; the bounds
//! are all-gathered so every worker assembles the same N-entry layout, and a
//! trailing placeholder entry is appended.

use crate::comm::Communicator;
use crate::context::SolveContext;
use crate::decomposition::{balanced_split, Decomposition, OwnershipMap};
use openbc_types::error::{OpenBcError, OpenBcResult};
use openbc_types::geometry::Geometry;
use openbc_types::region::Region;

/// Balanced slab of the node domain along the last active axis.
///
/// Slabs of consecutive workers are disjoint and together cover every node.
pub fn slab_region(geometry: &Geometry, ctx: &SolveContext) -> OpenBcResult<Region> {
    let nodes = geometry.node_domain();
    let axis = *geometry
        .dimensionality()
        .active_axes()
        .last()
        .ok_or_else(|| OpenBcError::ConfigError("no active axis".to_string()))?;
    let n = nodes.length(axis);
    if ctx.num_workers > n {
        return Err(OpenBcError::ConfigError(format!(
            "Cannot split {n} node planes across num_workers={}",
            ctx.num_workers
        )));
    }
    let counts = balanced_split(n, ctx.num_workers);
    let start = nodes.lo()[axis] + counts[..ctx.worker_id].iter().sum::<usize>() as i64;
    let mut lo = nodes.lo();
    let mut hi = nodes.hi();
    lo[axis] = start;
    hi[axis] = start + counts[ctx.worker_id] as i64 - 1;
    Region::new(lo, hi, nodes.index_type())
}

pub struct GlobalLayoutBuilder<'a> {
    ctx: &'a SolveContext,
}

impl<'a> GlobalLayoutBuilder<'a> {
    pub fn new(ctx: &'a SolveContext) -> Self {
        GlobalLayoutBuilder { ctx }
    }

    /// All-gather every worker's `local` Region, in worker order.
    ///
    /// The gathered bounds carry no index type; every Region takes `local`'s.
    pub fn gather_regions(
        &self,
        comm: &dyn Communicator,
        local: &Region,
    ) -> OpenBcResult<Vec<Region>> {
        let dim = self.ctx.dim;
        let per_region = dim.bounds_per_region();
        if comm.size() != self.ctx.num_workers {
            return Err(OpenBcError::CollectiveMismatch {
                expected: self.ctx.num_workers,
                got: comm.size(),
            });
        }
        let packed = local.pack_bounds(dim);
        let all = comm.all_gather_i64(&packed)?;
        let expected = per_region * self.ctx.num_workers;
        if all.len() != expected {
            return Err(OpenBcError::CollectiveMismatch {
                expected,
                got: all.len(),
            });
        }
        all.chunks(per_region)
            .map(|b| Region::unpack_bounds(b, dim, local.index_type()))
            .collect()
    }

    /// Gather, attach the placeholder and synchronize.
    ///
    /// Returns once every worker holds the complete layout.
    pub fn build(
        &self,
        comm: &dyn Communicator,
        local: &Region,
        geometry: &Geometry,
    ) -> OpenBcResult<Decomposition> {
        let regions = self.gather_regions(comm, local)?;
        let ownership = OwnershipMap::with_placeholder(self.ctx);
        let layout = Decomposition::from_ownership(
            geometry.clone(),
            self.ctx.num_workers,
            regions,
            &ownership,
        )?;
        log::debug!(
            "{} secondary layout: {} entries, own region {}",
            self.ctx.tag(),
            layout.len(),
            local
        );
        comm.barrier()?;
        Ok(layout)
    }
}

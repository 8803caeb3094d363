// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — OpenBC Periodic-Aware Copy Engines
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Data movement between two Decompositions of the same domain.
//!
//! A `CopyPlan` lists every (source entry, destination entry, periodic
//! shift) triple whose boxes overlap. It is derived only from data every
//! worker shares, so all workers build the same plan and agree on message
//! sizes without negotiating them. Execution is one all-to-all: each worker
//! packs the overlaps it owns as source, ships them to the destination
//! owners, and applies what it receives in plan order.
//!
//! Two flavours sit on top:
//! - reduction: source ghosts included, samples are added, destination
//!   ghosts untouched;
//! - scatter: source valid samples only, destination ghosts filled,
//!   samples overwrite with unshifted data taking precedence.

use crate::comm::Communicator;
use crate::context::SolveContext;
use crate::decomposition::Decomposition;
use crate::field::{CopyOp, Field};
use openbc_types::error::{OpenBcError, OpenBcResult};
use openbc_types::region::{IntVect, Region};
use rayon::prelude::*;

/// One overlap between a source and a destination box.
#[derive(Debug, Clone, PartialEq)]
pub struct CopyTag {
    pub src_index: usize,
    pub dst_index: usize,
    pub src_owner: usize,
    pub dst_owner: usize,
    /// Overlap in destination index space.
    pub dst_region: Region,
    /// Translation applied to the source box to reach `dst_region`.
    pub shift: IntVect,
}

impl CopyTag {
    /// Overlap in source index space.
    pub fn src_region(&self) -> Region {
        self.dst_region
            .shifted([-self.shift[0], -self.shift[1], -self.shift[2]])
    }

    pub fn is_periodic_image(&self) -> bool {
        self.shift != [0; 3]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub tags: usize,
    pub local_tags: usize,
    pub values_sent: usize,
    pub values_received: usize,
}

#[derive(Debug, Clone)]
pub struct CopyPlan {
    tags: Vec<CopyTag>,
    op: CopyOp,
    src_entries: usize,
    dst_entries: usize,
}

impl CopyPlan {
    /// Overlaps of `src` (grown by `src_grow`) with `dst` (grown by
    /// `dst_grow`) under every periodic image.
    pub fn build(
        src: &Decomposition,
        src_grow: usize,
        dst: &Decomposition,
        dst_grow: usize,
        ctx: &SolveContext,
        op: CopyOp,
    ) -> OpenBcResult<Self> {
        let sg = src.geometry();
        let dg = dst.geometry();
        if sg.periodicity() != dg.periodicity() || sg.periodicity() != ctx.periodicity {
            return Err(OpenBcError::ConfigError(format!(
                "periodicity differs between source {:?}, destination {:?} and context {:?}",
                sg.periodicity(),
                dg.periodicity(),
                ctx.periodicity
            )));
        }
        if sg.dimensionality() != dg.dimensionality() || sg.dimensionality() != ctx.dim {
            return Err(OpenBcError::ConfigError(format!(
                "dimensionality differs: source {:?}, destination {:?}, context {:?}",
                sg.dimensionality(),
                dg.dimensionality(),
                ctx.dim
            )));
        }
        if sg.domain() != dg.domain() {
            return Err(OpenBcError::ConfigError(format!(
                "source domain {} and destination domain {} differ",
                sg.domain(),
                dg.domain()
            )));
        }
        for d in [src, dst] {
            if d.num_workers() != ctx.num_workers {
                return Err(OpenBcError::ConfigError(format!(
                    "decomposition built for {} workers, context has {}",
                    d.num_workers(),
                    ctx.num_workers
                )));
            }
        }
        if let (Some(a), Some(b)) = (src.index_type(), dst.index_type()) {
            if a != b {
                return Err(OpenBcError::ConfigError(format!(
                    "cannot copy between index types {a:?} and {b:?}"
                )));
            }
        }

        let dim = ctx.dim;
        check_single_image(src, src_grow)?;
        check_single_image(dst, dst_grow)?;

        let shifts = sg.periodic_shifts();
        let src_boxes: Vec<(usize, Region, usize)> = src
            .owned()
            .map(|(i, r, o)| (i, r.grown(src_grow, dim), o))
            .collect();
        let mut tags = Vec::new();
        for (di, dr, downer) in dst.owned() {
            let dbox = dr.grown(dst_grow, dim);
            for &(si, sbox, sowner) in &src_boxes {
                for &shift in &shifts {
                    if let Some(overlap) = sbox.shifted(shift).intersect(&dbox) {
                        tags.push(CopyTag {
                            src_index: si,
                            dst_index: di,
                            src_owner: sowner,
                            dst_owner: downer,
                            dst_region: overlap,
                            shift,
                        });
                    }
                }
            }
        }
        if op == CopyOp::Overwrite {
            // Stable: images first, unshifted overlaps applied last.
            tags.sort_by_key(|t| !t.is_periodic_image());
        }
        Ok(CopyPlan {
            tags,
            op,
            src_entries: src.len(),
            dst_entries: dst.len(),
        })
    }

    pub fn tags(&self) -> &[CopyTag] {
        &self.tags
    }

    pub fn op(&self) -> CopyOp {
        self.op
    }

    /// Samples this plan moves in total, summed over workers.
    pub fn total_values(&self) -> usize {
        self.tags.iter().map(|t| t.dst_region.num_points()).sum()
    }

    /// Run the plan. Collective: every worker must call it with its own
    /// fields, even when it sends and receives nothing.
    pub fn execute(
        &self,
        src: &Field,
        dst: &mut Field,
        comm: &dyn Communicator,
    ) -> OpenBcResult<CopyStats> {
        let me = comm.rank();
        let n = comm.size();
        if src.decomposition().num_workers() != n || dst.decomposition().num_workers() != n {
            return Err(OpenBcError::CollectiveMismatch {
                expected: n,
                got: src.decomposition().num_workers(),
            });
        }
        if src.worker_id() != me || dst.worker_id() != me {
            return Err(OpenBcError::ConfigError(format!(
                "fields allocated for workers {}/{} used on worker {me}",
                src.worker_id(),
                dst.worker_id()
            )));
        }
        if src.decomposition().len() != self.src_entries
            || dst.decomposition().len() != self.dst_entries
        {
            return Err(OpenBcError::ConfigError(
                "fields do not match the decompositions this plan was built for".to_string(),
            ));
        }

        let mut stats = CopyStats {
            tags: self.tags.len(),
            ..CopyStats::default()
        };

        let packed: Vec<(usize, Vec<f64>)> = self
            .tags
            .par_iter()
            .enumerate()
            .filter(|(_, t)| t.src_owner == me)
            .map(|(k, t)| -> OpenBcResult<(usize, Vec<f64>)> {
                let fab = src.fab(t.src_index).ok_or_else(|| {
                    OpenBcError::BoundsViolation(format!(
                        "worker {me} has no storage for source entry {}",
                        t.src_index
                    ))
                })?;
                Ok((k, fab.read(&t.src_region())?))
            })
            .collect::<OpenBcResult<Vec<_>>>()?;

        let mut outgoing: Vec<Vec<f64>> = vec![Vec::new(); n];
        let mut ready: Vec<(usize, Vec<f64>)> = Vec::new();
        for (k, values) in packed {
            let t = &self.tags[k];
            if t.dst_owner == me {
                stats.local_tags += 1;
                ready.push((k, values));
            } else {
                stats.values_sent += values.len();
                outgoing[t.dst_owner].extend(values);
            }
        }

        let incoming = comm.all_to_all_f64(outgoing)?;
        if incoming.len() != n {
            return Err(OpenBcError::CollectiveMismatch {
                expected: n,
                got: incoming.len(),
            });
        }
        for (peer, buf) in incoming.iter().enumerate() {
            if peer == me {
                continue;
            }
            let mut cursor = 0usize;
            for (k, t) in self
                .tags
                .iter()
                .enumerate()
                .filter(|(_, t)| t.src_owner == peer && t.dst_owner == me)
            {
                let len = t.dst_region.num_points();
                let chunk = buf.get(cursor..cursor + len).ok_or_else(|| OpenBcError::CommError {
                    worker: me,
                    message: format!("worker {peer} sent {} values, plan needs more", buf.len()),
                })?;
                ready.push((k, chunk.to_vec()));
                cursor += len;
            }
            if cursor != buf.len() {
                return Err(OpenBcError::CommError {
                    worker: me,
                    message: format!(
                        "worker {peer} sent {} values, plan expects {cursor}",
                        buf.len()
                    ),
                });
            }
            stats.values_received += cursor;
        }

        ready.sort_by_key(|(k, _)| *k);
        for (k, values) in ready {
            let t = &self.tags[k];
            let fab = dst.fab_mut(t.dst_index).ok_or_else(|| {
                OpenBcError::BoundsViolation(format!(
                    "worker {me} has no storage for destination entry {}",
                    t.dst_index
                ))
            })?;
            fab.write(&t.dst_region, &values, self.op)?;
        }
        Ok(stats)
    }
}

/// Grown boxes may reach past a periodic boundary by at most one period.
fn check_single_image(d: &Decomposition, n_grow: usize) -> OpenBcResult<()> {
    let Some(index_type) = d.index_type() else {
        return Ok(());
    };
    let geometry = d.geometry();
    let domain = d.index_domain(index_type)?;
    let dim = geometry.dimensionality();
    for (i, r, _) in d.owned() {
        let b = r.grown(n_grow, dim);
        for &axis in dim.active_axes() {
            if !geometry.is_periodic(axis) {
                continue;
            }
            let period = geometry.period(axis);
            if b.lo()[axis] < domain.lo()[axis] - period || b.hi()[axis] > domain.hi()[axis] + period
            {
                return Err(OpenBcError::ConfigError(format!(
                    "entry {i} grown to {b} needs more than one periodic image along axis {axis}"
                )));
            }
        }
    }
    Ok(())
}

/// Sum `src` (ghosts included) into the valid samples of `dst`.
///
/// `dst` must be zero on entry. Overlapping contributions, including
/// periodic images, accumulate.
pub fn reduction_copy(
    src: &Field,
    dst: &mut Field,
    ctx: &SolveContext,
    comm: &dyn Communicator,
) -> OpenBcResult<CopyStats> {
    if !dst.is_zero() {
        return Err(OpenBcError::ConfigError(
            "reduction destination must be zero-initialized".to_string(),
        ));
    }
    let plan = CopyPlan::build(
        src.decomposition(),
        src.n_grow(),
        dst.decomposition(),
        0,
        ctx,
        CopyOp::Add,
    )?;
    let stats = plan.execute(src, dst, comm)?;
    log::debug!(
        "{} reduction copy: {} tags ({} local), sent {}, received {}",
        ctx.tag(),
        stats.tags,
        stats.local_tags,
        stats.values_sent,
        stats.values_received
    );
    Ok(stats)
}

/// Overwrite `dst` (ghosts included) from the valid samples of `src`.
///
/// Destination samples that no source Region reaches keep their value.
pub fn scatter_copy(
    src: &Field,
    dst: &mut Field,
    ctx: &SolveContext,
    comm: &dyn Communicator,
) -> OpenBcResult<CopyStats> {
    let plan = CopyPlan::build(
        src.decomposition(),
        0,
        dst.decomposition(),
        dst.n_grow(),
        ctx,
        CopyOp::Overwrite,
    )?;
    let stats = plan.execute(src, dst, comm)?;
    log::debug!(
        "{} scatter copy: {} tags ({} local), sent {}, received {}",
        ctx.tag(),
        stats.tags,
        stats.local_tags,
        stats.values_sent,
        stats.values_received
    );
    Ok(stats)
}

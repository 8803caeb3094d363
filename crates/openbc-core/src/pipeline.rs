// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — OpenBC Solve Pipeline
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Distributed open-boundary potential solve.
//!
//! Stages, executed in lockstep by every worker:
//!   1. gather a node-slab layout (one Region per worker + placeholder)
//!   2. reduce the deposited charge onto that layout (additive, periodic)
//!   3. barrier, solve the worker's own Region with the boundary solver
//!   4. barrier, scatter the potential back with a one-sample halo
//!   5. derive the nodal field with the 3-point stencil

use crate::comm::Communicator;
use crate::context::SolveContext;
use crate::copy::{reduction_copy, scatter_copy, CopyStats};
use crate::derive::StencilDerivator;
use crate::field::{Field, VectorField};
use crate::layout::{slab_region, GlobalLayoutBuilder};
use openbc_math::green::BoundarySolver;
use openbc_types::constants::POTENTIAL_HALO;
use openbc_types::error::{OpenBcError, OpenBcResult};
use openbc_types::region::Region;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct SolveReport {
    pub worker_id: usize,
    pub num_workers: usize,
    /// Region this worker handed to the boundary solver.
    pub solver_region: Region,
    pub layout_entries: usize,
    /// Charge on `solver_region` after the reduction, density × cell volume.
    pub solver_charge: f64,
    /// Local `(min, max)` of the scattered potential.
    pub potential_range: Option<(f64, f64)>,
    /// Local maximum of the derived field magnitude; zero until derived.
    pub max_field: f64,
    pub reduction: CopyStats,
    pub scatter: CopyStats,
    pub elapsed_ms: f64,
}

pub struct OpenBoundarySolve<S: BoundarySolver> {
    solver: S,
    derivator: StencilDerivator,
    allow_slab_solves: bool,
}

impl<S: BoundarySolver> OpenBoundarySolve<S> {
    pub fn new(solver: S) -> Self {
        OpenBoundarySolve {
            solver,
            derivator: StencilDerivator::electric_field(),
            allow_slab_solves: false,
        }
    }

    pub fn with_derivator(mut self, derivator: StencilDerivator) -> Self {
        self.derivator = derivator;
        self
    }

    /// Let a solver that needs the whole domain run on each worker's slab.
    /// The potential then omits the charge held by other workers.
    pub fn allow_slab_solves(mut self, allow: bool) -> Self {
        self.allow_slab_solves = allow;
        self
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Stages 1-4. `rho` is the node-centered charge density on the primary
    /// decomposition; the returned potential lives on the same entries with
    /// a one-sample halo.
    pub fn solve_potential(
        &self,
        comm: &dyn Communicator,
        rho: &Field,
    ) -> OpenBcResult<(Field, SolveReport)> {
        let start = Instant::now();
        let primary = rho.decomposition();
        let geometry = primary.geometry();
        let ctx = SolveContext::from_comm(comm, geometry)?;
        let tag = ctx.tag();
        if ctx.num_workers > 1 && self.solver.needs_whole_domain() {
            if !self.allow_slab_solves {
                return Err(OpenBcError::ConfigError(format!(
                    "{tag} solver needs the whole domain but the solve is split over {} workers",
                    ctx.num_workers
                )));
            }
            if ctx.worker_id == 0 {
                log::warn!(
                    "{tag} solving {} slabs independently; potentials omit other workers' charge",
                    ctx.num_workers
                );
            }
        }

        let local = slab_region(geometry, &ctx)?;
        let layout = GlobalLayoutBuilder::new(&ctx).build(comm, &local, geometry)?;
        log::info!("{tag} layout ready: solving on {local}");

        let mut rho_openbc = Field::zeros(&layout, 0, &ctx);
        let reduction = reduction_copy(rho, &mut rho_openbc, &ctx, comm)?;
        comm.barrier()?;

        let dx = geometry.cell_size();
        let cell_volume: f64 = ctx.dim.active_axes().iter().map(|&a| dx[a]).product();
        let solver_charge = rho_openbc.sum_valid() * cell_volume;
        log::debug!("{tag} reduced charge on solver region: {solver_charge:.6e}");

        let mut phi_openbc = Field::zeros(&layout, 0, &ctx);
        for (index, fab) in rho_openbc.fabs() {
            let phi = self.solver.solve(fab.data(), dx).map_err(|e| match e {
                OpenBcError::SolverFailure(_) => e,
                other => OpenBcError::SolverFailure(format!("{tag} {other}")),
            })?;
            if phi.dim() != fab.data().dim() {
                return Err(OpenBcError::SolverFailure(format!(
                    "{tag} solver returned shape {:?} for input {:?}",
                    phi.dim(),
                    fab.data().dim()
                )));
            }
            if phi.iter().any(|v| !v.is_finite()) {
                return Err(OpenBcError::SolverFailure(format!(
                    "{tag} solver returned non-finite potential"
                )));
            }
            phi_openbc
                .fab_mut(index)
                .ok_or_else(|| {
                    OpenBcError::BoundsViolation(format!("{tag} no storage for entry {index}"))
                })?
                .data_mut()
                .assign(&phi);
        }
        comm.barrier()?;
        log::debug!("{tag} boundary solve done");

        let phi_layout = primary.surrounding_nodes();
        let mut phi = Field::zeros(&phi_layout, POTENTIAL_HALO, &ctx);
        let scatter = scatter_copy(&phi_openbc, &mut phi, &ctx, comm)?;

        let report = SolveReport {
            worker_id: ctx.worker_id,
            num_workers: ctx.num_workers,
            solver_region: local,
            layout_entries: layout.len(),
            solver_charge,
            potential_range: phi.min_max_valid(),
            max_field: 0.0,
            reduction,
            scatter,
            elapsed_ms: start.elapsed().as_secs_f64() * 1e3,
        };
        Ok((phi, report))
    }

    /// Full solve: potential, then the derived field into `field`.
    pub fn run(
        &self,
        comm: &dyn Communicator,
        rho: &Field,
        field: &mut VectorField,
    ) -> OpenBcResult<SolveReport> {
        let start = Instant::now();
        let (phi, mut report) = self.solve_potential(comm, rho)?;
        self.derivator.derive(&phi, field)?;
        report.max_field = field.max_magnitude();
        report.elapsed_ms = start.elapsed().as_secs_f64() * 1e3;
        log::info!(
            "[worker {}/{}] solve complete in {:.2} ms, |F|max={:.4e}",
            report.worker_id,
            report.num_workers,
            report.elapsed_ms,
            report.max_field
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::SerialComm;
    use crate::decomposition::Decomposition;
    use ndarray::Array3;
    use openbc_math::green::HockneySolver;
    use openbc_types::geometry::{Dimensionality, Geometry};

    /// Returns a constant potential; the derived field must vanish.
    struct ConstantSolver(f64);

    impl BoundarySolver for ConstantSolver {
        fn solve(&self, rho: &Array3<f64>, _dx: [f64; 3]) -> OpenBcResult<Array3<f64>> {
            Ok(Array3::from_elem(rho.raw_dim(), self.0))
        }
    }

    struct NanSolver;

    impl BoundarySolver for NanSolver {
        fn solve(&self, rho: &Array3<f64>, _dx: [f64; 3]) -> OpenBcResult<Array3<f64>> {
            Ok(Array3::from_elem(rho.raw_dim(), f64::NAN))
        }
    }

    fn geometry() -> Geometry {
        Geometry::new(
            [8, 8, 8],
            [-1.0; 3],
            [1.0; 3],
            [false; 3],
            Dimensionality::Xyz,
        )
        .expect("geometry")
    }

    #[test]
    fn test_constant_potential_gives_zero_field() {
        let g = geometry();
        let ctx = SolveContext::new(1, 0, &g).expect("ctx");
        let primary = Decomposition::chop(&g, 4, 1).expect("chop").surrounding_nodes();
        let rho = Field::zeros(&primary, 1, &ctx);
        let mut e = VectorField::zeros(&primary, 0, &ctx);
        let report = OpenBoundarySolve::new(ConstantSolver(3.5))
            .run(&SerialComm, &rho, &mut e)
            .expect("run");
        assert_eq!(report.layout_entries, 2);
        assert_eq!(report.potential_range, Some((3.5, 3.5)));
        assert!(report.max_field.abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_solve_is_reported() {
        let g = geometry();
        let ctx = SolveContext::new(1, 0, &g).expect("ctx");
        let primary = Decomposition::chop(&g, 8, 1).expect("chop").surrounding_nodes();
        let rho = Field::zeros(&primary, 0, &ctx);
        let err = OpenBoundarySolve::new(NanSolver)
            .solve_potential(&SerialComm, &rho)
            .expect_err("NaN potential must fail");
        assert!(matches!(err, OpenBcError::SolverFailure(_)));
    }

    #[test]
    fn test_point_charge_field_points_outward() {
        let g = geometry();
        let ctx = SolveContext::new(1, 0, &g).expect("ctx");
        let primary = Decomposition::chop(&g, 4, 1).expect("chop").surrounding_nodes();
        let mut rho = Field::zeros(&primary, 0, &ctx);
        let h = g.cell_size()[0];
        let centre = [4, 4, 4];
        for (_, fab) in rho.fabs_mut() {
            if fab.valid_region().hi() == [4, 4, 4] {
                fab.set(centre, 1.0 / (h * h * h)).expect("set");
            }
        }
        let solver = HockneySolver::new(Dimensionality::Xyz, 1.0, 0.5).expect("solver");
        let mut e = VectorField::zeros(&primary, 0, &ctx);
        OpenBoundarySolve::new(solver)
            .run(&SerialComm, &rho, &mut e)
            .expect("run");
        let ex_right = e.component(0).value_at([6, 4, 4]).expect("node");
        let ex_left = e.component(0).value_at([2, 4, 4]).expect("node");
        assert!(ex_right > 0.0);
        assert!((ex_right + ex_left).abs() < 1e-9 * ex_right.abs());
    }
}

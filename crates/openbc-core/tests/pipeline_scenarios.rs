// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Multi-Worker Scenarios for openbc-core
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! End-to-end scenarios on in-process worker groups.

use ndarray::Array3;
use openbc_core::comm::{run_workers, Communicator, SerialComm};
use openbc_core::context::SolveContext;
use openbc_core::copy::{reduction_copy, scatter_copy};
use openbc_core::decomposition::{Decomposition, Entry, Ownership};
use openbc_core::field::{Field, VectorField};
use openbc_core::layout::{slab_region, GlobalLayoutBuilder};
use openbc_core::pipeline::OpenBoundarySolve;
use openbc_core::source::GaussianCloud;
use openbc_math::green::{BoundarySolver, HockneySolver};
use openbc_types::error::{OpenBcError, OpenBcResult};
use openbc_types::geometry::{Dimensionality, Geometry};
use openbc_types::region::{IntVect, Region};

/// φ = ρ: exposes the copies without any physics in between.
struct IdentitySolver;

impl BoundarySolver for IdentitySolver {
    fn solve(&self, rho: &Array3<f64>, _dx: [f64; 3]) -> OpenBcResult<Array3<f64>> {
        Ok(rho.clone())
    }
}

/// φ = slope · x, where x is measured from the first sample of the buffer.
struct RampSolver {
    slope: f64,
}

impl BoundarySolver for RampSolver {
    fn solve(&self, rho: &Array3<f64>, dx: [f64; 3]) -> OpenBcResult<Array3<f64>> {
        Ok(Array3::from_shape_fn(rho.raw_dim(), |(i, _, _)| {
            self.slope * i as f64 * dx[0]
        }))
    }
}

fn plane(periodic_x: bool) -> Geometry {
    Geometry::new(
        [8, 8, 1],
        [0.0; 3],
        [1.0; 3],
        [periodic_x, false, false],
        Dimensionality::Xy,
    )
    .expect("geometry")
}

/// Worker 0 owns cells x in [0,4), worker 1 owns [4,8).
fn halves(g: &Geometry) -> Decomposition {
    let left = Region::cell([0, 0, 0], [3, 7, 0]).expect("left");
    let right = Region::cell([4, 0, 0], [7, 7, 0]).expect("right");
    Decomposition::from_regions(g.clone(), 2, vec![(left, 0), (right, 1)])
        .expect("halves")
        .surrounding_nodes()
}

/// Secondary layout and reduced density for the calling worker.
fn reduce_onto_slabs(comm: &dyn Communicator, rho: &Field) -> OpenBcResult<Field> {
    let g = rho.decomposition().geometry();
    let ctx = SolveContext::from_comm(comm, g)?;
    let local = slab_region(g, &ctx)?;
    let layout = GlobalLayoutBuilder::new(&ctx).build(comm, &local, g)?;
    let mut rho_openbc = Field::zeros(&layout, 0, &ctx);
    reduction_copy(rho, &mut rho_openbc, &ctx, comm)?;
    Ok(rho_openbc)
}

#[test]
fn layout_has_one_entry_per_worker_plus_placeholder() {
    let g = plane(false);
    let out = run_workers(4, |comm| {
        let ctx = SolveContext::from_comm(&comm, &g)?;
        let local = slab_region(&g, &ctx)?;
        let layout = GlobalLayoutBuilder::new(&ctx).build(&comm, &local, &g)?;
        Ok((ctx, layout))
    })
    .expect("workers");
    for (ctx, layout) in &out {
        assert_eq!(layout.len(), 5);
        let map = layout.ownership_map();
        for w in 0..4 {
            assert_eq!(map.get(w), Some(Ownership::Worker(w)));
        }
        assert_eq!(map.get(4), Some(Ownership::Placeholder));
        assert_eq!(map.resolve(4, ctx), Some(ctx.worker_id));
        assert_eq!(layout.entries()[4], Entry::Placeholder);
    }
}

#[test]
fn single_worker_two_regions_reduce_into_one_slab() {
    let g = plane(false);
    let ctx = SolveContext::new(1, 0, &g).expect("ctx");
    let left = Region::cell([0, 0, 0], [3, 7, 0]).expect("left");
    let right = Region::cell([4, 0, 0], [7, 7, 0]).expect("right");
    let primary = Decomposition::from_regions(g.clone(), 1, vec![(left, 0), (right, 0)])
        .expect("primary")
        .surrounding_nodes();
    let mut rho = Field::zeros(&primary, 0, &ctx);
    rho.fill_with(|iv| 1.0 + iv[0] as f64);

    let rho_openbc = reduce_onto_slabs(&SerialComm, &rho).expect("reduce");
    assert_eq!(rho_openbc.decomposition().len(), 2);
    assert_eq!(rho_openbc.num_local(), 1);
    // Shared face x=4 receives both tiles' samples.
    assert_eq!(rho_openbc.value_at([4, 2, 0]), Some(10.0));
    assert_eq!(rho_openbc.value_at([3, 2, 0]), Some(4.0));
    assert!((rho_openbc.sum_valid() - rho.sum_stored()).abs() < 1e-12);
}

#[test]
fn periodic_image_doubles_boundary_charge() {
    for (periodic, expected) in [(true, 2.0), (false, 1.0)] {
        let g = plane(periodic);
        let primary = halves(&g);
        let out = run_workers(2, |comm| {
            let ctx = SolveContext::from_comm(&comm, &g)?;
            let mut rho = Field::zeros(&primary, 0, &ctx);
            if ctx.worker_id == 0 {
                let fab = rho.fab_mut(0).ok_or_else(|| {
                    OpenBcError::ConfigError("worker 0 owns entry 0".to_string())
                })?;
                fab.set([0, 3, 0], 1.0)?;
            }
            let reduced = reduce_onto_slabs(&comm, &rho)?;
            Ok((
                reduced.sum_valid(),
                reduced.value_at([0, 3, 0]),
                reduced.value_at([8, 3, 0]),
            ))
        })
        .expect("workers");
        let total: f64 = out.iter().map(|(s, _, _)| s).sum();
        assert!(
            (total - expected).abs() < 1e-12,
            "periodic={periodic}: total {total}"
        );
        // y=3 lies in worker 0's slab (node rows 0..=4).
        let (_, at_origin, at_image) = out[0];
        assert_eq!(at_origin, Some(1.0));
        assert_eq!(at_image, Some(if periodic { 1.0 } else { 0.0 }));
        assert!((out[1].0).abs() < 1e-15);
    }
}

#[test]
fn reduction_conserves_charge_across_workers() {
    let g = Geometry::new(
        [12, 10, 9],
        [0.0; 3],
        [1.0; 3],
        [false; 3],
        Dimensionality::Xyz,
    )
    .expect("geometry");
    let sums = run_workers(3, |comm| {
        let ctx = SolveContext::from_comm(&comm, &g)?;
        let primary = Decomposition::chop(&g, 5, ctx.num_workers)?.surrounding_nodes();
        let mut rho = Field::zeros(&primary, 0, &ctx);
        rho.fill_with(|iv: IntVect| ((iv[0] * 7 + iv[1] * 3 + iv[2]) % 11) as f64 - 4.0);
        let reduced = reduce_onto_slabs(&comm, &rho)?;
        Ok((rho.sum_stored(), reduced.sum_valid()))
    })
    .expect("workers");
    let deposited: f64 = sums.iter().map(|(a, _)| a).sum();
    let received: f64 = sums.iter().map(|(_, b)| b).sum();
    assert!((deposited - received).abs() < 1e-9, "{deposited} vs {received}");
}

#[test]
fn reduce_then_scatter_round_trips_through_other_worker() {
    // All data starts on worker 1 and must visit worker 0's slab and back.
    for periodic in [false, true] {
        let g = plane(periodic);
        let all = Region::cell([0, 0, 0], [7, 7, 0]).expect("all");
        let primary = Decomposition::from_regions(g.clone(), 2, vec![(all, 1)])
            .expect("primary")
            .surrounding_nodes();
        let value = |iv: IntVect| (iv[0] * 100 + iv[1]) as f64;
        let out = run_workers(2, |comm| {
            let ctx = SolveContext::from_comm(&comm, &g)?;
            let mut rho = Field::zeros(&primary, 0, &ctx);
            rho.fill_with(|iv| if periodic && iv[0] == 8 { 0.0 } else { value(iv) });
            let reduced = reduce_onto_slabs(&comm, &rho)?;
            let mut back = Field::zeros(&primary, 1, &ctx);
            scatter_copy(&reduced, &mut back, &ctx, &comm)?;
            Ok(back)
        })
        .expect("workers");
        assert_eq!(out[0].num_local(), 0);
        let back = &out[1];
        let fab = back.fab(0).expect("worker 1 storage");
        for iv in fab.valid_region().points() {
            // With x periodic, node 8 is node 0's image and carries its value.
            let src = if periodic && iv[0] == 8 { [0, iv[1], iv[2]] } else { iv };
            assert_eq!(fab.get(iv), Some(value(src)), "periodic={periodic} at {iv:?}");
        }
        if periodic {
            assert_eq!(fab.get([-1, 5, 0]), Some(value([7, 5, 0])));
            assert_eq!(fab.get([9, 5, 0]), Some(value([1, 5, 0])));
        }
    }
}

#[test]
fn identity_solve_is_independent_of_worker_count() {
    let g = Geometry::new(
        [10, 1, 12],
        [-1.0, 0.0, -1.0],
        [1.0, 1.0, 1.0],
        [false; 3],
        Dimensionality::Xz,
    )
    .expect("geometry");
    let cloud = GaussianCloud {
        total_charge: 1.0,
        center: [0.1, 0.0, -0.2],
        sigma: [0.2, 1.0, 0.2],
    };
    let solve = OpenBoundarySolve::new(IdentitySolver);

    let ctx = SolveContext::new(1, 0, &g).expect("ctx");
    let serial_primary = Decomposition::chop(&g, 12, 1).expect("chop").surrounding_nodes();
    let mut serial_rho = Field::zeros(&serial_primary, 1, &ctx);
    cloud.deposit(&mut serial_rho);
    let (serial_phi, _) = solve
        .solve_potential(&SerialComm, &serial_rho)
        .expect("serial");

    let out = run_workers(3, |comm| {
        let ctx = SolveContext::from_comm(&comm, &g)?;
        let primary = Decomposition::chop(&g, 4, ctx.num_workers)?.surrounding_nodes();
        let mut rho = Field::zeros(&primary, 1, &ctx);
        cloud.deposit(&mut rho);
        let (phi, report) = solve.solve_potential(&comm, &rho)?;
        let samples: Vec<(IntVect, f64)> = phi
            .fabs()
            .flat_map(|(_, fab)| {
                fab.valid_region()
                    .points()
                    .filter_map(|iv| fab.get(iv).map(|v| (iv, v)))
                    .collect::<Vec<_>>()
            })
            .collect();
        Ok((samples, report))
    })
    .expect("workers");

    let charge: f64 = out.iter().map(|(_, r)| r.solver_charge).sum();
    assert!((charge - 1.0).abs() < 1e-3, "charge {charge}");
    for (samples, report) in &out {
        assert_eq!(report.layout_entries, 4);
        for (iv, v) in samples {
            let expected = serial_phi.value_at(*iv).expect("serial covers every node");
            assert!((v - expected).abs() < 1e-12, "{iv:?}: {v} vs {expected}");
        }
    }
}

#[test]
fn ramp_potential_gives_uniform_field_on_every_worker() {
    let g = Geometry::new(
        [8, 8, 8],
        [0.0; 3],
        [2.0; 3],
        [false; 3],
        Dimensionality::Xyz,
    )
    .expect("geometry");
    let slope = 1.5;
    let out = run_workers(2, |comm| {
        let ctx = SolveContext::from_comm(&comm, &g)?;
        let primary = Decomposition::chop(&g, 4, ctx.num_workers)?.surrounding_nodes();
        let rho = Field::zeros(&primary, 0, &ctx);
        let mut e = VectorField::zeros(&primary, 0, &ctx);
        OpenBoundarySolve::new(RampSolver { slope }).run(&comm, &rho, &mut e)?;
        Ok(e)
    })
    .expect("workers");
    for e in &out {
        assert!(e.component(0).num_local() > 0);
        for axis in 0..3 {
            let want = if axis == 0 { -slope } else { 0.0 };
            for (_, fab) in e.component(axis).fabs() {
                for v in fab.data().iter() {
                    assert!((v - want).abs() < 1e-10, "axis {axis}: {v}");
                }
            }
        }
    }
}

#[test]
fn mismatched_collectives_surface_as_errors() {
    let g = plane(false);
    let err = run_workers(2, |comm| {
        let ctx = SolveContext::from_comm(&comm, &g)?;
        // Worker 1 claims a 3-D region in a 2-D build and sends extra bounds.
        let local = slab_region(&g, &ctx)?;
        if ctx.worker_id == 1 {
            comm.all_gather_i64(&[0, 0, 0, 1, 1, 1])?;
            return Ok(());
        }
        GlobalLayoutBuilder::new(&ctx)
            .build(&comm, &local, &g)
            .map(|_| ())
    })
    .expect_err("uneven gather must fail");
    assert!(matches!(
        err,
        OpenBcError::CollectiveMismatch { .. } | OpenBcError::CommError { .. }
    ));
}

fn centred_cloud() -> (Geometry, GaussianCloud) {
    let g = Geometry::new(
        [16, 16, 16],
        [-1.0; 3],
        [1.0; 3],
        [false; 3],
        Dimensionality::Xyz,
    )
    .expect("geometry");
    let cloud = GaussianCloud {
        total_charge: 1.0,
        center: [0.0; 3],
        sigma: [0.2; 3],
    };
    (g, cloud)
}

fn hockney() -> HockneySolver {
    HockneySolver::new(Dimensionality::Xyz, 1.0, 0.5).expect("solver")
}

#[test]
fn whole_domain_solver_refuses_split_solve() {
    let (g, cloud) = centred_cloud();
    let solve = OpenBoundarySolve::new(hockney());
    let err = run_workers(4, |comm| {
        let ctx = SolveContext::from_comm(&comm, &g)?;
        let primary = Decomposition::chop(&g, 8, ctx.num_workers)?.surrounding_nodes();
        let mut rho = Field::zeros(&primary, 1, &ctx);
        cloud.deposit(&mut rho);
        solve.solve_potential(&comm, &rho).map(|_| ())
    })
    .expect_err("split free-space solve must be refused");
    assert!(matches!(err, OpenBcError::ConfigError(_)), "{err}");
}

#[test]
fn slab_solves_miss_charge_held_by_other_workers() {
    let (g, cloud) = centred_cloud();
    let below_cloud: IntVect = [8, 8, 2];

    let ctx = SolveContext::new(1, 0, &g).expect("ctx");
    let serial_primary = Decomposition::chop(&g, 8, 1).expect("chop").surrounding_nodes();
    let mut serial_rho = Field::zeros(&serial_primary, 1, &ctx);
    cloud.deposit(&mut serial_rho);
    let (serial_phi, _) = OpenBoundarySolve::new(hockney())
        .solve_potential(&SerialComm, &serial_rho)
        .expect("serial");
    let whole = serial_phi.value_at(below_cloud).expect("node");
    let r = 0.75;
    assert!(
        ((whole - 1.0 / (4.0 * std::f64::consts::PI * r)) / whole).abs() < 0.05,
        "whole-domain potential {whole}"
    );

    let solve = OpenBoundarySolve::new(hockney()).allow_slab_solves(true);
    let out = run_workers(4, |comm| {
        let ctx = SolveContext::from_comm(&comm, &g)?;
        let primary = Decomposition::chop(&g, 8, ctx.num_workers)?.surrounding_nodes();
        let mut rho = Field::zeros(&primary, 1, &ctx);
        cloud.deposit(&mut rho);
        let (phi, _) = solve.solve_potential(&comm, &rho)?;
        Ok(phi.value_at(below_cloud))
    })
    .expect("workers");
    // The node sits on a face shared by tiles of every worker.
    let split: Vec<f64> = out.into_iter().flatten().collect();
    assert!(!split.is_empty());
    for v in split {
        assert!(v.abs() * 10.0 < whole, "slab {v} vs whole {whole}");
    }
}

use anyhow::{bail, Context, Result};
use clap::Args;
use log::info;
use openbc_core::comm::run_workers;
use openbc_core::context::SolveContext;
use openbc_core::decomposition::Decomposition;
use openbc_core::derive::StencilDerivator;
use openbc_core::field::{Field, VectorField};
use openbc_core::pipeline::OpenBoundarySolve;
use openbc_core::source::GaussianCloud;
use openbc_math::green::{BoundarySolver, HockneySolver};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Args)]
pub struct RunArgs {
    /// Config file path
    #[arg(short, long)]
    pub config: PathBuf,

    /// Override the configured worker count
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Report the potential gradient instead of the electric field
    #[arg(long)]
    pub gradient: bool,

    /// Solve each worker's slab on its own when running on several workers.
    /// The potential then ignores charge held by other workers.
    #[arg(long)]
    pub slab_solves: bool,
}

pub fn execute(args: RunArgs) -> Result<()> {
    let cfg = super::load_config(&args.config)?;
    let num_workers = args.workers.unwrap_or(cfg.decomposition.num_workers);
    if num_workers == 0 {
        bail!("at least one worker is required");
    }
    let geometry = cfg.create_geometry().context("invalid grid")?;
    let solver = HockneySolver::new(
        geometry.dimensionality(),
        cfg.solver.epsilon0,
        cfg.solver.origin_regularization,
    )
    .context("invalid solver settings")?;
    let cloud = GaussianCloud::from_config(&cfg.source, &geometry).context("invalid source")?;
    let derivator = if args.gradient {
        StencilDerivator::gradient()
    } else {
        StencilDerivator::electric_field()
    };
    if num_workers > 1 && solver.needs_whole_domain() && !args.slab_solves {
        bail!(
            "the free-space solver needs the whole domain; use --workers 1, \
             or pass --slab-solves to solve each worker's slab on its own"
        );
    }
    let pipeline = OpenBoundarySolve::new(solver)
        .with_derivator(derivator)
        .allow_slab_solves(args.slab_solves);

    let primary = Decomposition::chop(&geometry, cfg.decomposition.max_grid_size, num_workers)
        .context("cannot decompose domain")?;
    primary
        .validate_partition()
        .context("decomposition does not tile the domain")?;
    let nodes = primary.surrounding_nodes();

    info!(
        "=== {} : {} tiles on {num_workers} workers ===",
        cfg.run_name,
        primary.len()
    );

    let start = Instant::now();
    let reports = run_workers(num_workers, |comm| {
        let ctx = SolveContext::from_comm(&comm, &geometry)?;
        let mut rho = Field::zeros(&nodes, cfg.source.ghost_cells, &ctx);
        let deposited = cloud.deposit(&mut rho);
        info!("{} deposited {deposited:.6e} C", ctx.tag());
        let mut field = VectorField::zeros(&nodes, 0, &ctx);
        let report = pipeline.run(&comm, &rho, &mut field)?;
        Ok((deposited, report))
    })
    .context("distributed solve failed")?;

    let deposited: f64 = reports.iter().map(|(q, _)| q).sum();
    let reduced: f64 = reports.iter().map(|(_, r)| r.solver_charge).sum();
    println!("run           : {}", cfg.run_name);
    println!("workers       : {num_workers}");
    println!("charge        : deposited {deposited:.6e}, on solver layout {reduced:.6e}");
    for (_, r) in &reports {
        let (lo, hi) = r.potential_range.unwrap_or((0.0, 0.0));
        println!(
            "  worker {:>3} : slab {}  phi [{lo:.4e}, {hi:.4e}]  |F|max {:.4e}  sent {} recv {}",
            r.worker_id,
            r.solver_region,
            r.max_field,
            r.reduction.values_sent + r.scatter.values_sent,
            r.reduction.values_received + r.scatter.values_received
        );
    }
    println!("elapsed       : {:.2} ms", start.elapsed().as_secs_f64() * 1e3);
    Ok(())
}

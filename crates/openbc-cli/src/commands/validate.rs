use anyhow::{Context, Result};
use clap::Args;
use log::info;
use openbc_core::decomposition::Decomposition;
use std::path::PathBuf;

#[derive(Args)]
pub struct ValidateArgs {
    /// Config file path
    #[arg(short, long)]
    pub config: PathBuf,
}

pub fn execute(args: ValidateArgs) -> Result<()> {
    let cfg = super::load_config(&args.config)?;
    let geometry = cfg.create_geometry().context("invalid grid")?;
    let primary = Decomposition::chop(
        &geometry,
        cfg.decomposition.max_grid_size,
        cfg.decomposition.num_workers,
    )
    .context("cannot decompose domain")?;
    primary
        .validate_partition()
        .context("decomposition does not tile the domain")?;

    info!("config '{}' is valid", cfg.run_name);
    println!(
        "{}: {:?} domain {} dx={:?} periodic={:?}",
        cfg.run_name,
        geometry.dimensionality(),
        geometry.domain(),
        geometry.cell_size(),
        geometry.periodicity()
    );
    for w in 0..primary.num_workers() {
        let tiles: Vec<String> = primary
            .owned_by(w)
            .map(|(i, r)| format!("#{i} {r}"))
            .collect();
        println!("  worker {w}: {} tiles [{}]", tiles.len(), tiles.join(", "));
    }
    Ok(())
}

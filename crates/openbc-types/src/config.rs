// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — OpenBC Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use crate::constants::{DEFAULT_SOURCE_GHOST, EPSILON0_SI};
use crate::geometry::{Dimensionality, Geometry};
use serde::{Deserialize, Serialize};

/// Top-level open-boundary solve configuration.
/// Maps 1:1 to the JSON files under `configs/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenBcConfig {
    pub run_name: String,
    pub grid: GridConfig,
    pub decomposition: DecompositionConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub solver: SolverConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    /// Cell counts per axis; the inactive axis of a 2-D build is ignored.
    pub n_cell: [usize; 3],
    pub prob_lo: [f64; 3],
    pub prob_hi: [f64; 3],
    #[serde(default = "default_dimensionality")]
    pub dimensionality: Dimensionality,
    #[serde(default)]
    pub periodicity: [bool; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecompositionConfig {
    /// Largest primary box edge, in cells.
    #[serde(default = "default_max_grid_size")]
    pub max_grid_size: usize,
    /// Number of workers taking part in the solve.
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
}

/// Charge cloud deposited by the command line driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Ghost width of the deposited charge density.
    #[serde(default = "default_ghost_cells")]
    pub ghost_cells: usize,
    /// Total charge of the Gaussian cloud (C).
    #[serde(default = "default_total_charge")]
    pub total_charge: f64,
    /// Cloud center; `None` places it at the domain center.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center: Option<[f64; 3]>,
    /// RMS width per axis, in physical units.
    #[serde(default = "default_sigma")]
    pub sigma: [f64; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Vacuum permittivity; 1.0 gives normalized units.
    #[serde(default = "default_epsilon0")]
    pub epsilon0: f64,
    /// Distance, as a fraction of the smallest cell edge, at which the
    /// Green's function is sampled for the self-interaction term.
    #[serde(default = "default_origin_regularization")]
    pub origin_regularization: f64,
}

fn default_dimensionality() -> Dimensionality {
    Dimensionality::Xyz
}
fn default_max_grid_size() -> usize {
    32
}
fn default_num_workers() -> usize {
    1
}
fn default_ghost_cells() -> usize {
    DEFAULT_SOURCE_GHOST
}
fn default_total_charge() -> f64 {
    1.0e-9
}
fn default_sigma() -> [f64; 3] {
    [0.1, 0.1, 0.1]
}
fn default_epsilon0() -> f64 {
    EPSILON0_SI
}
fn default_origin_regularization() -> f64 {
    0.5
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            ghost_cells: default_ghost_cells(),
            total_charge: default_total_charge(),
            center: None,
            sigma: default_sigma(),
        }
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            epsilon0: default_epsilon0(),
            origin_regularization: default_origin_regularization(),
        }
    }
}

impl OpenBcConfig {
    /// Load from a JSON file.
    pub fn from_file(path: &str) -> crate::error::OpenBcResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Build the validated `Geometry` for this config.
    pub fn create_geometry(&self) -> crate::error::OpenBcResult<Geometry> {
        let mut n_cell = self.grid.n_cell;
        for axis in 0..3 {
            if !self.grid.dimensionality.is_active(axis) {
                n_cell[axis] = 1;
            }
        }
        Geometry::new(
            n_cell,
            self.grid.prob_lo,
            self.grid.prob_hi,
            self.grid.periodicity,
            self.grid.dimensionality,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// CARGO_MANIFEST_DIR points to crates/openbc-types/, the repository
    /// root is two levels up.
    fn project_root() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("..").join("..")
    }

    fn config_path(relative: &str) -> String {
        project_root().join(relative).to_string_lossy().to_string()
    }

    #[test]
    fn test_load_gaussian_cloud_config() {
        let cfg = OpenBcConfig::from_file(&config_path("configs/gaussian_cloud_3d.json")).unwrap();
        assert_eq!(cfg.run_name, "gaussian-cloud-3d");
        assert_eq!(cfg.grid.n_cell, [32, 32, 32]);
        assert_eq!(cfg.grid.dimensionality, Dimensionality::Xyz);
        assert_eq!(cfg.decomposition.num_workers, 4);
        let geom = cfg.create_geometry().unwrap();
        assert_eq!(geom.domain().hi(), [31, 31, 31]);
    }

    #[test]
    fn test_load_periodic_slab_config() {
        let cfg = OpenBcConfig::from_file(&config_path("configs/periodic_slab_xz.json")).unwrap();
        assert_eq!(cfg.grid.dimensionality, Dimensionality::Xz);
        assert_eq!(cfg.grid.periodicity, [true, false, false]);
        let geom = cfg.create_geometry().unwrap();
        assert_eq!(geom.domain().hi()[1], 0);
        assert!(geom.is_periodic(0));
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let json = r#"{
            "run_name": "minimal",
            "grid": { "n_cell": [8, 8, 8], "prob_lo": [0, 0, 0], "prob_hi": [1, 1, 1] },
            "decomposition": {}
        }"#;
        let cfg: OpenBcConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.grid.dimensionality, Dimensionality::Xyz);
        assert_eq!(cfg.grid.periodicity, [false; 3]);
        assert_eq!(cfg.decomposition.max_grid_size, 32);
        assert_eq!(cfg.decomposition.num_workers, 1);
        assert_eq!(cfg.source.ghost_cells, DEFAULT_SOURCE_GHOST);
        assert!((cfg.solver.epsilon0 - EPSILON0_SI).abs() < 1e-24);
    }

    #[test]
    fn test_roundtrip_serialization() {
        let cfg = OpenBcConfig::from_file(&config_path("configs/gaussian_cloud_3d.json")).unwrap();
        let json = serde_json::to_string_pretty(&cfg).unwrap();
        let cfg2: OpenBcConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.run_name, cfg2.run_name);
        assert_eq!(cfg.grid.n_cell, cfg2.grid.n_cell);
        assert_eq!(cfg.decomposition.max_grid_size, cfg2.decomposition.max_grid_size);
    }
}

//! Charge density deposit for a Gaussian cloud.
//!
//! ρ(x) = Q / ((2π)^{d/2} Π σ_a) · exp(-Σ (x_a - c_a)² / (2σ_a²))
//! over the active axes. The cloud is assumed to sit well inside the
//! domain; periodic images of the cloud itself are not summed.
//!
//! Deposits are partial: every physical node is written by exactly one
//! Region, so adding all Regions' samples recovers the density once. A node
//! on a shared face belongs to the Region starting there; a node on the
//! upper face of a periodic axis is the image of node 0 and is left empty.

use crate::field::Field;
use openbc_types::config::SourceConfig;
use openbc_types::error::{OpenBcError, OpenBcResult};
use openbc_types::geometry::Geometry;
use openbc_types::region::{IntVect, Region};
use std::f64::consts::PI;

#[derive(Debug, Clone, PartialEq)]
pub struct GaussianCloud {
    pub total_charge: f64,
    pub center: [f64; 3],
    pub sigma: [f64; 3],
}

impl GaussianCloud {
    /// Cloud from config; a missing center means the middle of the domain.
    pub fn from_config(cfg: &SourceConfig, geometry: &Geometry) -> OpenBcResult<Self> {
        let center = cfg.center.unwrap_or_else(|| {
            let (lo, hi) = (geometry.prob_lo(), geometry.prob_hi());
            [
                0.5 * (lo[0] + hi[0]),
                0.5 * (lo[1] + hi[1]),
                0.5 * (lo[2] + hi[2]),
            ]
        });
        for &axis in geometry.dimensionality().active_axes() {
            let s = cfg.sigma[axis];
            if !s.is_finite() || s <= 0.0 {
                return Err(OpenBcError::ConfigError(format!(
                    "source sigma[{axis}] must be finite and > 0, got {s}"
                )));
            }
        }
        if !cfg.total_charge.is_finite() {
            return Err(OpenBcError::ConfigError(
                "source total_charge must be finite".to_string(),
            ));
        }
        Ok(GaussianCloud {
            total_charge: cfg.total_charge,
            center,
            sigma: cfg.sigma,
        })
    }

    pub fn density(&self, x: [f64; 3], geometry: &Geometry) -> f64 {
        let axes = geometry.dimensionality().active_axes();
        let mut norm = (2.0 * PI).powf(axes.len() as f64 / 2.0);
        let mut exponent = 0.0;
        for &a in axes {
            norm *= self.sigma[a];
            let d = (x[a] - self.center[a]) / self.sigma[a];
            exponent += d * d;
        }
        self.total_charge / norm * (-0.5 * exponent).exp()
    }

    /// Overwrite `rho` (ghosts zeroed) with this worker's share of the
    /// density. Returns the locally deposited charge.
    pub fn deposit(&self, rho: &mut Field) -> f64 {
        let geometry = rho.decomposition().geometry().clone();
        let dim = geometry.dimensionality();
        let nodes = geometry.node_domain();
        let dx = geometry.cell_size();
        let cell_volume: f64 = dim.active_axes().iter().map(|&a| dx[a]).product();

        let claims = |region: &Region, iv: IntVect| {
            dim.active_axes().iter().all(|&a| {
                let top = nodes.hi()[a];
                if iv[a] == top {
                    !geometry.is_periodic(a) && region.hi()[a] == top
                } else {
                    iv[a] < region.hi()[a] || region.hi()[a] == top
                }
            })
        };

        let mut charge = 0.0;
        for (_, fab) in rho.fabs_mut() {
            let valid = *fab.valid_region();
            let mut deposited = 0.0;
            fab.fill_with(|iv| {
                if !valid.contains(iv) || !claims(&valid, iv) {
                    return 0.0;
                }
                let v = self.density(geometry.node_position(iv), &geometry);
                deposited += v;
                v
            });
            charge += deposited * cell_volume;
        }
        charge
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SolveContext;
    use crate::decomposition::Decomposition;
    use openbc_types::geometry::Dimensionality;

    fn geometry(periodic: [bool; 3]) -> Geometry {
        Geometry::new(
            [16, 16, 1],
            [-1.0, -1.0, 0.0],
            [1.0, 1.0, 1.0],
            periodic,
            Dimensionality::Xy,
        )
        .expect("geometry")
    }

    fn cloud() -> GaussianCloud {
        GaussianCloud {
            total_charge: 2.0,
            center: [0.0, 0.0, 0.0],
            sigma: [0.2, 0.2, 1.0],
        }
    }

    #[test]
    fn test_deposit_counts_shared_nodes_once() {
        let g = geometry([false; 3]);
        let ctx = SolveContext::new(1, 0, &g).expect("ctx");
        let tiled = Decomposition::chop(&g, 4, 1).expect("tiles").surrounding_nodes();
        let whole = Decomposition::chop(&g, 16, 1).expect("whole").surrounding_nodes();

        let mut a = Field::zeros(&tiled, 1, &ctx);
        let mut b = Field::zeros(&whole, 1, &ctx);
        let qa = cloud().deposit(&mut a);
        let qb = cloud().deposit(&mut b);
        assert!((qa - qb).abs() < 1e-12 * qb.abs());
        assert!((qb - 2.0).abs() < 1e-3, "discrete charge {qb}");
        assert!((a.sum_stored() - b.sum_stored()).abs() < 1e-9);
    }

    #[test]
    fn test_periodic_upper_face_left_empty() {
        let g = geometry([true, false, false]);
        let ctx = SolveContext::new(1, 0, &g).expect("ctx");
        let d = Decomposition::chop(&g, 16, 1).expect("whole").surrounding_nodes();
        let mut rho = Field::zeros(&d, 0, &ctx);
        let wide = GaussianCloud {
            sigma: [5.0, 5.0, 1.0],
            ..cloud()
        };
        wide.deposit(&mut rho);
        assert_eq!(rho.value_at([16, 3, 0]), Some(0.0));
        assert!(rho.value_at([0, 3, 0]).expect("node 0") > 0.0);
        assert!(rho.value_at([3, 16, 0]).expect("open face") > 0.0);
    }

    #[test]
    fn test_from_config_defaults_to_domain_center() {
        let g = geometry([false; 3]);
        let cfg = SourceConfig::default();
        let c = GaussianCloud::from_config(&cfg, &g).expect("cloud");
        assert_eq!(c.center, [0.0, 0.0, 0.5]);

        let bad = SourceConfig {
            sigma: [0.0, 0.1, 0.1],
            ..SourceConfig::default()
        };
        assert!(GaussianCloud::from_config(&bad, &g).is_err());
    }
}

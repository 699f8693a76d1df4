//! Engine configuration (spec §6).

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Tunables for one inset's integration run. Defaults match spec §6/§4.8.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Lattice width. Powers of small primes are preferred for transform
    /// efficiency but not required (spec §3).
    pub lx: usize,
    /// Lattice height.
    pub ly: usize,
    /// Upper bound on integration steps before the driver gives up (§4.8).
    pub max_integrations: u32,
    /// Convergence threshold on `max_g |area(g)/target*(g) - 1|` (§4.8).
    pub eps_area: f64,
    /// Floor under the `σ = 2^(5-k)` blur schedule, to keep C4 well posed (§4.3).
    pub sigma_floor: f64,
    /// Use triangulated-affine advection (C5/C7) instead of bilinear.
    pub triangulation: bool,
    /// Densify long segments before triangulated advection (C6).
    pub densify: bool,
    /// How many times a flow sub-step may be halved before
    /// `NonPositiveDensity` is reported as fatal (§7).
    pub max_density_halvings: u32,
    /// Emit per-step progress to stderr, the way the teacher crate routes
    /// `println!`/`eprintln!` rather than a logging framework.
    pub verbose: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lx: 512,
            ly: 512,
            max_integrations: 50,
            eps_area: 1e-2,
            sigma_floor: 0.1,
            triangulation: false,
            densify: false,
            max_density_halvings: 20,
            verbose: false,
        }
    }
}

impl EngineConfig {
    /// Validate field ranges that the rest of the engine assumes hold.
    pub fn validate(&self) -> Result<()> {
        if self.lx == 0 || self.ly == 0 {
            bail!("lattice dimensions must be positive (lx={}, ly={})", self.lx, self.ly);
        }
        if self.eps_area <= 0.0 {
            bail!("eps_area must be positive, got {}", self.eps_area);
        }
        if self.sigma_floor <= 0.0 {
            bail!("sigma_floor must be positive, got {}", self.sigma_floor);
        }
        if self.max_integrations == 0 {
            bail!("max_integrations must be at least 1");
        }
        if self.densify && !self.triangulation {
            bail!("densify only has an effect when triangulation is enabled");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_empty_lattice() {
        let cfg = EngineConfig { lx: 0, ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_densify_without_triangulation() {
        let cfg = EngineConfig { densify: true, triangulation: false, ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = EngineConfig { lx: 64, ly: 128, triangulation: true, densify: true, ..Default::default() };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}

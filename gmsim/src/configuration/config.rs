//! Configuration types for loading simulation scenarios from YAML.
//!
//! This module defines a thin, `serde`-deserializable representation of a
//! granular flow scenario. A scenario consists of:
//!
//! - [`EngineConfig`]     – integrator and neighbour search options
//! - [`ParametersConfig`] – step size, stiffness, gravity, seed
//! - [`SiloConfig`]       – box width, height and floor gap
//! - [`ParticlesConfig`]  – random initial packing, or
//! - [`BodyConfig`]       – explicit initial state for each particle
//! - [`CriteriaConfig`]   – when to stop
//! - [`OutputConfig`]     – which writers to attach
//! - [`ScenarioConfig`]   – top-level wrapper used to load a scenario from YAML
//!
//! # YAML format
//!
//! ```yaml
//! engine:
//!   integrator: "gear5"     # beeman, gear5 or gear5_vd
//!   stencil: half           # half (5 cells) or full (9 cells)
//!
//! parameters:
//!   dt: 1.0e-5
//!   writer_iteration: 1000
//!   seed: 7
//!   kn: 1.0e5
//!   kt: 2.0e5               # defaults to 2 * kn
//!   gravity: true
//!   g: 9.8
//!
//! silo:
//!   width: 1.0
//!   height: 1.5
//!   gap: 0.25
//!
//! particles:
//!   count: 200
//!   min_radius: 0.01
//!   max_radius: 0.015
//!   mass: 0.01
//!
//! criteria:
//!   kind: any
//!   of:
//!     - { kind: flow, exits: 100 }
//!     - { kind: time, t_end: 10.0 }
//!
//! output:
//!   xyz: "silo_flow.xyz"
//! ```
//!
//! Instead of `particles`, a list of `bodies` (`x`, `v`, `m`, `radius`) can
//! give every initial state explicitly; ids are assigned from 1 in list order.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ConfigError, SimError};
use crate::simulation::cell_index::Stencil;

/// Which integrator every particle is bound to
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegratorConfig {
    #[serde(rename = "beeman")] // third order, keeps the previous acceleration
    Beeman,

    #[serde(rename = "gear5")] // fifth order Gear predictor-corrector
    Gear5,

    #[serde(rename = "gear5_vd")] // Gear-5 with coefficients for velocity dependent forces
    Gear5Vd,
}

#[derive(Deserialize, Debug, Clone)]
pub struct EngineConfig {
    pub integrator: IntegratorConfig,
    #[serde(default)]
    pub stencil: Stencil, // neighbour search stencil, half by default
    #[serde(default)]
    pub periodic: bool, // wrap the neighbour grid
}

#[derive(Deserialize, Debug, Clone)]
pub struct ParametersConfig {
    pub dt: f64, // fixed step size
    pub writer_iteration: u64, // frame every this many ticks
    #[serde(default)]
    pub seed: u64, // rng seed for placement and recycling
    pub kn: f64, // normal stiffness
    pub kt: Option<f64>, // tangential coefficient, 2 * kn when absent
    #[serde(default = "default_true")]
    pub gravity: bool, // gravity on/off
    #[serde(default = "default_g")]
    pub g: f64, // gravity magnitude
    #[serde(default = "default_max_attempts")]
    pub max_recycle_attempts: usize, // retries when placing a recycled particle
    pub neighbour_radius: Option<f64>, // neighbour search range, largest radius when absent
    #[serde(default)]
    pub cell_margin: f64, // extra cell size
}

#[derive(Deserialize, Debug, Clone)]
pub struct SiloConfig {
    pub width: f64,
    pub height: f64,
    pub gap: f64, // floor opening, centred
}

/// Random, non-overlapping packing at rest
#[derive(Deserialize, Debug, Clone)]
pub struct ParticlesConfig {
    pub count: usize,
    pub min_radius: f64,
    pub max_radius: f64,
    pub mass: f64,
    #[serde(default = "default_max_attempts")]
    pub max_placement_attempts: usize,
}

/// Configuration for a single particle's initial state
#[derive(Deserialize, Debug, Clone)]
pub struct BodyConfig {
    pub x: Vec<f64>, // position [x, y]
    #[serde(default = "default_velocity")]
    pub v: Vec<f64>, // velocity [vx, vy]
    pub m: f64, // mass
    pub radius: f64, // radius
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CriteriaConfig {
    Time {
        t_end: f64,
    },
    NullVelocity {
        epsilon: f64,
        #[serde(default)]
        min_time: f64,
    },
    KineticEnergy {
        tolerance: f64,
        min_samples: usize,
        #[serde(default = "default_sample_every")]
        sample_every: u64,
    },
    Flow {
        exits: usize,
    },
    Any {
        of: Vec<CriteriaConfig>,
    },
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct OutputConfig {
    pub xyz: Option<PathBuf>, // extended xyz trajectory
    pub kinetic_energy: Option<PathBuf>, // csv of (time, kinetic energy)
    #[serde(default)]
    pub quiet: bool, // no progress logging per frame
}

/// Top-level scenario configuration loaded from YAML.
#[derive(Deserialize, Debug, Clone)]
pub struct ScenarioConfig {
    pub engine: EngineConfig,
    pub parameters: ParametersConfig,
    pub silo: SiloConfig,
    #[serde(default)]
    pub particles: Option<ParticlesConfig>,
    #[serde(default)]
    pub bodies: Vec<BodyConfig>,
    pub criteria: CriteriaConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_true() -> bool {
    true
}

fn default_g() -> f64 {
    9.8
}

fn default_max_attempts() -> usize {
    10_000
}

fn default_velocity() -> Vec<f64> {
    vec![0.0, 0.0]
}

fn default_sample_every() -> u64 {
    1
}

impl ScenarioConfig {
    /// Read, parse and validate a scenario file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let reader = BufReader::new(File::open(path)?);
        let cfg: ScenarioConfig = serde_yaml::from_reader(reader)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: ScenarioConfig = serde_yaml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Tangential coefficient, falling back to twice the normal stiffness
    pub fn kt(&self) -> f64 {
        self.parameters.kt.unwrap_or(2.0 * self.parameters.kn)
    }

    /// Gravity magnitude when enabled
    pub fn gravity(&self) -> Option<f64> {
        self.parameters.gravity.then_some(self.parameters.g)
    }

    /// Structural checks; physical ranges are checked again when the simulator is built
    pub fn validate(&self) -> Result<(), SimError> {
        let p = &self.parameters;
        if !(p.dt.is_finite() && p.dt > 0.0) {
            return Err(SimError::invalid("parameters.dt must be positive"));
        }
        if p.writer_iteration == 0 {
            return Err(SimError::invalid("parameters.writer_iteration must be at least 1"));
        }

        let s = &self.silo;
        if s.width <= 0.0 || s.height <= 0.0 {
            return Err(SimError::invalid("silo width and height must be positive"));
        }
        if s.gap < 0.0 || s.gap > s.width {
            return Err(SimError::invalid("silo gap must lie within [0, width]"));
        }

        match (&self.particles, self.bodies.is_empty()) {
            (Some(_), false) => return Err(SimError::invalid("give either `particles` or `bodies`, not both")),
            (None, true) => return Err(SimError::invalid("no particles: give `particles` or `bodies`")),
            (Some(gen), true) => {
                if gen.count == 0 {
                    return Err(SimError::invalid("particles.count must be at least 1"));
                }
                if !(gen.min_radius > 0.0 && gen.min_radius <= gen.max_radius) {
                    return Err(SimError::invalid("particles radius range must satisfy 0 < min_radius <= max_radius"));
                }
                if gen.mass <= 0.0 {
                    return Err(SimError::invalid("particles.mass must be positive"));
                }
            }
            (None, false) => {
                for (i, b) in self.bodies.iter().enumerate() {
                    if b.x.len() != 2 || b.v.len() != 2 {
                        return Err(SimError::invalid(format!("body {i}: x and v must have 2 components")));
                    }
                }
            }
        }

        validate_criteria(&self.criteria)
    }
}

fn validate_criteria(c: &CriteriaConfig) -> Result<(), SimError> {
    match c {
        CriteriaConfig::Time { t_end } if *t_end < 0.0 => Err(SimError::invalid("time criterion needs t_end >= 0")),
        CriteriaConfig::NullVelocity { epsilon, .. } if *epsilon <= 0.0 => {
            Err(SimError::invalid("null_velocity criterion needs epsilon > 0"))
        }
        CriteriaConfig::KineticEnergy { tolerance, .. } if *tolerance < 0.0 => {
            Err(SimError::invalid("kinetic_energy criterion needs tolerance >= 0"))
        }
        CriteriaConfig::Flow { exits } if *exits == 0 => Err(SimError::invalid("flow criterion needs exits >= 1")),
        CriteriaConfig::Any { of } => {
            if of.is_empty() {
                return Err(SimError::invalid("any criterion needs at least one member"));
            }
            of.iter().try_for_each(validate_criteria)
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
engine:
  integrator: "beeman"
parameters:
  dt: 1.0e-5
  writer_iteration: 100
  kn: 1.0e5
silo:
  width: 1.0
  height: 1.0
  gap: 0.2
particles:
  count: 10
  min_radius: 0.01
  max_radius: 0.015
  mass: 0.01
criteria:
  kind: time
  t_end: 1.0
"#;

    #[test]
    fn parses_with_defaults() {
        let cfg = ScenarioConfig::from_yaml_str(BASE).unwrap();
        assert_eq!(cfg.engine.integrator, IntegratorConfig::Beeman);
        assert_eq!(cfg.engine.stencil, Stencil::Half);
        assert_eq!(cfg.kt(), 2.0e5);
        assert_eq!(cfg.gravity(), Some(9.8));
        assert_eq!(cfg.parameters.seed, 0);
        assert!(cfg.output.xyz.is_none());
    }

    #[test]
    fn nested_any_criteria() {
        let text = BASE.replace(
            "criteria:\n  kind: time\n  t_end: 1.0\n",
            "criteria:\n  kind: any\n  of:\n    - { kind: flow, exits: 5 }\n    - { kind: null_velocity, epsilon: 0.001 }\n",
        );
        let cfg = ScenarioConfig::from_yaml_str(&text).unwrap();
        assert_eq!(
            cfg.criteria,
            CriteriaConfig::Any {
                of: vec![
                    CriteriaConfig::Flow { exits: 5 },
                    CriteriaConfig::NullVelocity { epsilon: 0.001, min_time: 0.0 },
                ]
            }
        );
    }

    #[test]
    fn rejects_unknown_integrator() {
        let text = BASE.replace("\"beeman\"", "\"rk4\"");
        assert!(matches!(ScenarioConfig::from_yaml_str(&text), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn rejects_gap_wider_than_box() {
        let text = BASE.replace("gap: 0.2", "gap: 2.0");
        assert!(matches!(ScenarioConfig::from_yaml_str(&text), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_both_particles_and_bodies() {
        let text = format!("{BASE}bodies:\n  - {{ x: [0.5, 0.5], m: 0.01, radius: 0.01 }}\n");
        assert!(ScenarioConfig::from_yaml_str(&text).is_err());
    }

    #[test]
    fn rejects_zero_dt() {
        let text = BASE.replace("dt: 1.0e-5", "dt: 0.0");
        assert!(ScenarioConfig::from_yaml_str(&text).is_err());
    }
}

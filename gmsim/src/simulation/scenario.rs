//! Build fully-initialized simulation scenarios from configuration
//!
//! Takes a `ScenarioConfig` (YAML-facing) and produces a runtime `Scenario`
//! containing:
//! - engine settings (`Engine`)
//! - numerical parameters (`Parameters`)
//! - the simulator with its particles at t = 0 (`GranularSimulator`)
//! - the termination criterion (`Criteria`)

use crate::configuration::config::{BodyConfig, CriteriaConfig, ScenarioConfig};
use crate::error::{SimError, SimResult};
use crate::simulation::boundary::{random_packing, Silo};
use crate::simulation::criteria::{
    Criteria, FlowCriteria, KineticEnergyEquilibrium, NullVelocityCriteria, TimeCriteria,
};
use crate::simulation::engine::Engine;
use crate::simulation::params::Parameters;
use crate::simulation::simulator::GranularSimulator;
use crate::simulation::states::{Particle, NVec2};

/// Runtime bundle built from a [`ScenarioConfig`]
pub struct Scenario {
    pub engine: Engine,
    pub parameters: Parameters,
    pub simulator: GranularSimulator,
    pub criteria: Criteria,
}

impl Scenario {
    pub fn build_scenario(cfg: &ScenarioConfig) -> SimResult<Self> {
        let silo = Silo::new(cfg.silo.width, cfg.silo.height, cfg.silo.gap)?;

        let p_cfg = &cfg.parameters;
        let parameters = Parameters {
            dt: p_cfg.dt,
            writer_iteration: p_cfg.writer_iteration,
            seed: p_cfg.seed,
            kn: p_cfg.kn,
            kt: cfg.kt(),
            gravity: cfg.gravity(),
            max_recycle_attempts: p_cfg.max_recycle_attempts,
            neighbour_radius: p_cfg.neighbour_radius,
            cell_margin: p_cfg.cell_margin,
        };

        let e_cfg = &cfg.engine;
        let engine = Engine {
            integrator: e_cfg.integrator,
            stencil: e_cfg.stencil,
            periodic: e_cfg.periodic,
        };

        // Particles: random packing, or map `BodyConfig` -> `Particle` with ids from 1
        let particles = match &cfg.particles {
            Some(gen) => random_packing(
                &silo,
                gen.count,
                gen.min_radius,
                gen.max_radius,
                gen.mass,
                // keep the packing stream apart from the recycling stream
                parameters.seed.wrapping_add(1),
                gen.max_placement_attempts,
            )?,
            None => cfg
                .bodies
                .iter()
                .enumerate()
                .map(|(i, bc)| body_to_particle(i as i64 + 1, bc))
                .collect::<SimResult<Vec<_>>>()?,
        };

        let simulator = GranularSimulator::new(particles, &engine, &parameters, silo)?;
        let criteria = build_criteria(&cfg.criteria);

        Ok(Self {
            engine,
            parameters,
            simulator,
            criteria,
        })
    }
}

fn body_to_particle(id: i64, bc: &BodyConfig) -> SimResult<Particle> {
    match (bc.x.as_slice(), bc.v.as_slice()) {
        ([x, y], [vx, vy]) => Particle::new(id, NVec2::new(*x, *y), NVec2::new(*vx, *vy), bc.radius, bc.m),
        _ => Err(SimError::invalid(format!("body {id}: x and v must have 2 components"))),
    }
}

/// Map the YAML criterion tree onto runtime criteria
pub fn build_criteria(cfg: &CriteriaConfig) -> Criteria {
    match cfg {
        CriteriaConfig::Time { t_end } => Criteria::Time(TimeCriteria::new(*t_end)),
        CriteriaConfig::NullVelocity { epsilon, min_time } => {
            Criteria::NullVelocity(NullVelocityCriteria::new(*epsilon, *min_time))
        }
        CriteriaConfig::KineticEnergy { tolerance, min_samples, sample_every } => {
            Criteria::KineticEnergy(KineticEnergyEquilibrium::new(*tolerance, *min_samples, *sample_every))
        }
        CriteriaConfig::Flow { exits } => Criteria::Flow(FlowCriteria::new(*exits)),
        CriteriaConfig::Any { of } => Criteria::Any(of.iter().map(build_criteria).collect()),
    }
}

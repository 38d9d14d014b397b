//! Fixed-step integrators for single particles
//!
//! Each particle slot owns one [`Integrator`] which keeps the kinematic
//! history needed by its scheme:
//! - `Beeman` – previous acceleration, third order
//! - `Gear`   – position and time derivatives up to fifth order (predictor-corrector)
//!
//! Both treat the [`ContactForce`] model as a black box evaluated at the
//! predicted state.

use crate::configuration::config::IntegratorConfig;
use crate::error::{SimError, SimResult};
use crate::simulation::forces::ContactForce;
use crate::simulation::states::{Neighbour, Particle, NVec2};

/// Most terms a Gear history can hold (position .. 5th derivative)
pub const GEAR_MAX_TERMS: usize = 6;

pub const GEAR_5_ALPHAS: [f64; 6] = [
    3.0 / 20.0,
    251.0 / 360.0,
    1.0,
    11.0 / 18.0,
    1.0 / 6.0,
    1.0 / 60.0,
];

/// Gear-5 coefficients for forces that depend on velocity
pub const GEAR_5_VD_ALPHAS: [f64; 6] = [
    3.0 / 16.0,
    251.0 / 360.0,
    1.0,
    11.0 / 18.0,
    1.0 / 6.0,
    1.0 / 60.0,
];

const FACTORIALS: [f64; GEAR_MAX_TERMS] = [1.0, 1.0, 2.0, 6.0, 24.0, 120.0];

#[derive(Debug, Clone, PartialEq)]
pub enum Integrator {
    Beeman(Beeman),
    Gear(Gear),
}

impl Integrator {
    /// Build the integrator selected in the config, with its history seeded from `particle`
    pub fn from_config(cfg: IntegratorConfig, particle: &Particle, gravity: NVec2) -> SimResult<Self> {
        match cfg {
            IntegratorConfig::Beeman => Ok(Integrator::Beeman(Beeman::new())),
            IntegratorConfig::Gear5 => Ok(Integrator::Gear(Gear::seeded(&GEAR_5_ALPHAS, particle, gravity)?)),
            IntegratorConfig::Gear5Vd => Ok(Integrator::Gear(Gear::seeded(&GEAR_5_VD_ALPHAS, particle, gravity)?)),
        }
    }

    /// Advance `particle` by `dt` under `force` and return its new state
    pub fn advance(&mut self, particle: &Particle, neighbours: &[Neighbour], force: &ContactForce, dt: f64) -> Particle {
        match self {
            Integrator::Beeman(b) => b.advance(particle, neighbours, force, dt),
            Integrator::Gear(g) => g.advance(particle, neighbours, force, dt),
        }
    }

    /// Forget everything learned about the particle's past, e.g. after recycling
    pub fn reset_history(&mut self, particle: &Particle) {
        match self {
            Integrator::Beeman(b) => b.reset_history(),
            Integrator::Gear(g) => g.reset_history(particle),
        }
    }
}

// =========================================================================================
// Beeman
// =========================================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Beeman {
    previous_acceleration: Option<NVec2>, // a(t - dt), None right after a reset
}

impl Beeman {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous_acceleration(&self) -> Option<NVec2> {
        self.previous_acceleration
    }

    pub fn reset_history(&mut self) {
        self.previous_acceleration = None;
    }

    pub fn advance(&mut self, particle: &Particle, neighbours: &[Neighbour], force: &ContactForce, dt: f64) -> Particle {
        let m = particle.mass();
        let x = particle.position();
        let v = particle.velocity();

        let a = force.force(particle, neighbours) / m;
        // an empty history starts as if acceleration had been constant
        let a_prev = self.previous_acceleration.unwrap_or(a);

        let x1 = x + v * dt + (2.0 / 3.0 * a - 1.0 / 6.0 * a_prev) * dt * dt;
        let v_pred = v + (1.5 * a - 0.5 * a_prev) * dt;

        let a1 = force.force(&particle.moved_to(x1, v_pred), neighbours) / m;
        let v1 = v + (1.0 / 3.0 * a1 + 5.0 / 6.0 * a - 1.0 / 6.0 * a_prev) * dt;

        self.previous_acceleration = Some(a);
        particle.moved_to(x1, v1)
    }
}

// =========================================================================================
// Gear predictor-corrector
// =========================================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Gear {
    alphas: [f64; GEAR_MAX_TERMS], // corrector coefficients, only `terms` used
    r: [NVec2; GEAR_MAX_TERMS], // r[0] position, r[1] velocity, r[2] acceleration, ...
    terms: usize, // order + 1
    initial_acceleration: NVec2, // r[2] after a reset
}

impl Gear {
    /// Build from explicit coefficients and history, which must have equal length between 3 and 6
    pub fn new(alphas: &[f64], history: &[NVec2], initial_acceleration: NVec2) -> SimResult<Self> {
        if alphas.len() != history.len() {
            return Err(SimError::invalid(format!(
                "gear: {} coefficients for {} history terms",
                alphas.len(),
                history.len()
            )));
        }
        if alphas.len() > GEAR_MAX_TERMS || alphas.len() < 3 {
            return Err(SimError::invalid(format!("gear: order {} not supported", alphas.len() as isize - 1)));
        }

        let mut a = [0.0; GEAR_MAX_TERMS];
        let mut r = [NVec2::zeros(); GEAR_MAX_TERMS];
        a[..alphas.len()].copy_from_slice(alphas);
        r[..history.len()].copy_from_slice(history);

        Ok(Self {
            alphas: a,
            r,
            terms: alphas.len(),
            initial_acceleration,
        })
    }

    /// Coefficients plus a freshly reset history for `particle`
    pub fn seeded(alphas: &[f64], particle: &Particle, gravity: NVec2) -> SimResult<Self> {
        let history = vec![NVec2::zeros(); alphas.len()];
        let mut gear = Self::new(alphas, &history, gravity)?;
        gear.reset_history(particle);
        Ok(gear)
    }

    pub fn order(&self) -> usize {
        self.terms - 1
    }

    pub fn history(&self) -> &[NVec2] {
        &self.r[..self.terms]
    }

    pub fn reset_history(&mut self, particle: &Particle) {
        self.r = [NVec2::zeros(); GEAR_MAX_TERMS];
        self.r[0] = particle.position();
        self.r[1] = particle.velocity();
        self.r[2] = self.initial_acceleration;
    }

    pub fn advance(&mut self, particle: &Particle, neighbours: &[Neighbour], force: &ContactForce, dt: f64) -> Particle {
        let n = self.terms;

        // predict: Taylor expansion of every term
        let mut rp = [NVec2::zeros(); GEAR_MAX_TERMS];
        for i in 0..n {
            let mut acc = self.r[i];
            let mut dt_pow = 1.0;
            for l in 1..(n - i) {
                dt_pow *= dt;
                acc += self.r[i + l] * (dt_pow / FACTORIALS[l]);
            }
            rp[i] = acc;
        }

        // evaluate
        let predicted = particle.moved_to(rp[0], rp[1]);
        let a = force.force(&predicted, neighbours) / particle.mass();
        let delta_r2 = (a - rp[2]) * (dt * dt / 2.0);

        // correct
        let mut dt_pow = 1.0;
        for i in 0..n {
            self.r[i] = rp[i] + delta_r2 * (self.alphas[i] * FACTORIALS[i] / dt_pow);
            dt_pow *= dt;
        }

        particle.moved_to(self.r[0], self.r[1])
    }
}

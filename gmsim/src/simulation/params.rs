//! Numerical and physical parameters for the simulation
//!
//! `Parameters` holds runtime settings:
//! - fixed step size and writer emission interval,
//! - contact stiffness constants and gravity,
//! - recycling seed and retry cap,
//! - neighbour search range and cell margin

use crate::error::{SimError, SimResult};

#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    pub dt: f64, // fixed step size
    pub writer_iteration: u64, // emit a frame every this many ticks
    pub seed: u64, // recycling rng seed
    pub kn: f64, // normal stiffness
    pub kt: f64, // tangential coefficient
    pub gravity: Option<f64>, // g along -y, None disables gravity
    pub max_recycle_attempts: usize, // rejection sampling cap per recycled particle
    pub neighbour_radius: Option<f64>, // surface range of the neighbour search, defaults to the largest radius
    pub cell_margin: f64, // extra cell size on top of the minimum
}

impl Parameters {
    pub fn validate(&self) -> SimResult<()> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(SimError::invalid(format!("dt must be positive, got {}", self.dt)));
        }
        if self.writer_iteration == 0 {
            return Err(SimError::invalid("writer_iteration must be at least 1"));
        }
        if !(self.kn.is_finite() && self.kn >= 0.0 && self.kt.is_finite() && self.kt >= 0.0) {
            return Err(SimError::invalid("stiffness constants must be finite and non-negative"));
        }
        if let Some(g) = self.gravity {
            if !g.is_finite() {
                return Err(SimError::invalid("gravity must be finite"));
            }
        }
        if self.max_recycle_attempts == 0 {
            return Err(SimError::invalid("max_recycle_attempts must be at least 1"));
        }
        if let Some(r) = self.neighbour_radius {
            if !(r.is_finite() && r >= 0.0) {
                return Err(SimError::invalid("neighbour_radius must be non-negative"));
            }
        }
        if !(self.cell_margin.is_finite() && self.cell_margin >= 0.0) {
            return Err(SimError::invalid("cell_margin must be non-negative"));
        }
        Ok(())
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            dt: 1e-5,
            writer_iteration: 1000,
            seed: 0,
            kn: 1e5,
            kt: 2e5,
            gravity: Some(9.8),
            max_recycle_attempts: 10_000,
            neighbour_radius: None,
            cell_margin: 0.0,
        }
    }
}

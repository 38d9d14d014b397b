//! Core state types for the granular simulation.
//!
//! - `Particle`  one disk: identity, position, velocity, radius, mass
//! - `Neighbour` a particle seen from another one, plus the signed gap between surfaces
//!
//! Particles are immutable values. Every update produces a new `Particle`
//! with the same identity, and equality only looks at the identity.

use nalgebra::Vector2;

use crate::error::{SimError, SimResult};

pub type NVec2 = Vector2<f64>;

#[derive(Debug, Clone, Copy)]
pub struct Particle {
    id: i64, // stable identity, negative for synthetic wall particles
    position: NVec2, // centre
    velocity: NVec2, // velocity
    radius: f64, // radius, 0 for wall particles
    mass: f64, // mass, infinite for wall particles
}

impl Particle {
    /// Build a real (movable) particle
    /// Radius and mass must be finite and strictly positive
    pub fn new(id: i64, position: NVec2, velocity: NVec2, radius: f64, mass: f64) -> SimResult<Self> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(SimError::invalid(format!("particle {id}: radius must be positive, got {radius}")));
        }
        if !(mass.is_finite() && mass > 0.0) {
            return Err(SimError::invalid(format!("particle {id}: mass must be positive and finite, got {mass}")));
        }
        if !(position.iter().all(|c| c.is_finite()) && velocity.iter().all(|c| c.is_finite())) {
            return Err(SimError::invalid(format!("particle {id}: non-finite initial state")));
        }
        Ok(Self { id, position, velocity, radius, mass })
    }

    /// Immovable point used as a contact source for walls and gap edges
    pub fn boundary(id: i64, position: NVec2) -> Self {
        Self {
            id,
            position,
            velocity: NVec2::zeros(),
            radius: 0.0,
            mass: f64::INFINITY,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn position(&self) -> NVec2 {
        self.position
    }

    pub fn velocity(&self) -> NVec2 {
        self.velocity
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Same particle (identity, radius, mass) at a new kinematic state
    pub fn moved_to(&self, position: NVec2, velocity: NVec2) -> Self {
        Self { position, velocity, ..*self }
    }

    pub fn speed(&self) -> f64 {
        self.velocity.norm()
    }

    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.mass * self.velocity.norm_squared()
    }

    /// Signed distance between the two surfaces, negative when overlapping
    pub fn gap_to(&self, other: &Particle) -> f64 {
        (other.position - self.position).norm() - (self.radius + other.radius)
    }

    pub fn overlaps(&self, other: &Particle) -> bool {
        self.gap_to(other) < 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.position.iter().chain(self.velocity.iter()).all(|c| c.is_finite())
    }
}

impl PartialEq for Particle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Particle {}

/// Directed contact candidate: `particle` as seen from some subject (its
/// nearest image in periodic domains), `distance` is the signed surface gap
/// when the candidate was found (negative means overlap)
#[derive(Debug, Clone, Copy)]
pub struct Neighbour {
    pub particle: Particle,
    pub distance: f64,
}

impl Neighbour {
    pub fn new(particle: Particle, distance: f64) -> Self {
        Self { particle, distance }
    }
}

//! Contact force model for the granular engine
//!
//! Linear spring along the contact normal plus a tangential term proportional
//! to the overlap and to the relative tangential velocity. Gravity is added on
//! top when enabled.
//!
//! The overlap is measured from the positions the force is evaluated at, so an
//! integrator probing a predicted state sees the contact as it would be there.
//! The gap stored in each [`Neighbour`] only selects candidates.

use crate::simulation::states::{Neighbour, Particle, NVec2};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactForce {
    pub kn: f64, // normal stiffness
    pub kt: f64, // tangential coefficient
    pub gravity: Option<f64>, // magnitude of g along -y, None disables gravity
}

impl ContactForce {
    pub fn new(kn: f64, kt: f64, gravity: Option<f64>) -> Self {
        Self { kn, kt, gravity }
    }

    /// Net force on `particle` from its neighbours (walls included) and gravity
    pub fn force(&self, particle: &Particle, neighbours: &[Neighbour]) -> NVec2 {
        let mut total = self.contact_force(particle, neighbours);
        if let Some(g) = self.gravity {
            total.y -= g * particle.mass();
        }
        total
    }

    /// Sum of the contact terms only, without gravity
    pub fn contact_force(&self, particle: &Particle, neighbours: &[Neighbour]) -> NVec2 {
        let mut total = NVec2::zeros();
        for n in neighbours {
            let r = n.particle.position() - particle.position();
            let dist = r.norm();
            // coincident centres have no normal direction
            if dist == 0.0 {
                continue;
            }
            let overlap = (particle.radius() + n.particle.radius()) - dist;
            if overlap <= 0.0 {
                continue;
            }
            let e_n = r / dist;
            let e_t = NVec2::new(-e_n.y, e_n.x);

            let relative_tangential = (particle.velocity() - n.particle.velocity()).dot(&e_t);

            total -= self.kn * overlap * e_n;
            total -= self.kt * overlap * relative_tangential * e_t;
        }
        total
    }

    /// Magnitude of the contact force, used to annotate output frames
    pub fn contact_magnitude(&self, particle: &Particle, neighbours: &[Neighbour]) -> f64 {
        self.contact_force(particle, neighbours).norm()
    }

    /// Acceleration vector of gravity, zero when disabled
    pub fn gravity_acceleration(&self) -> NVec2 {
        match self.gravity {
            Some(g) => NVec2::new(0.0, -g),
            None => NVec2::zeros(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disk(id: i64, x: f64, y: f64, vx: f64, vy: f64) -> Particle {
        Particle::new(id, NVec2::new(x, y), NVec2::new(vx, vy), 0.1, 0.01).unwrap()
    }

    #[test]
    fn normal_force_pushes_apart() {
        let model = ContactForce::new(1e5, 2e5, None);
        let a = disk(1, 0.0, 0.0, 0.0, 0.0);
        let b = disk(2, 0.19, 0.0, 0.0, 0.0);
        let f = model.force(&a, &[Neighbour::new(b, a.gap_to(&b))]);
        assert!((f.x + 1e5 * 0.01).abs() < 1e-6);
        assert!(f.y.abs() < 1e-12);
    }

    #[test]
    fn tangential_force_opposes_sliding() {
        let model = ContactForce::new(0.0, 1e5, None);
        let a = disk(1, 0.0, 0.0, 0.0, 1.0);
        let b = disk(2, 0.19, 0.0, 0.0, 0.0);
        let f = model.force(&a, &[Neighbour::new(b, a.gap_to(&b))]);
        // e_n = (1, 0), e_t = (0, 1), relative tangential speed 1
        assert!(f.x.abs() < 1e-12);
        assert!((f.y + 1e5 * 0.01).abs() < 1e-6);
    }

    #[test]
    fn gravity_only_when_enabled() {
        let a = disk(1, 0.5, 0.5, 0.0, 0.0);
        let on = ContactForce::new(1e5, 2e5, Some(9.8));
        let off = ContactForce::new(1e5, 2e5, None);
        assert!((on.force(&a, &[]).y + 9.8 * 0.01).abs() < 1e-12);
        assert_eq!(off.force(&a, &[]), NVec2::zeros());
        assert_eq!(on.gravity_acceleration(), NVec2::new(0.0, -9.8));
    }

    #[test]
    fn wall_particle_contact() {
        let model = ContactForce::new(1e5, 2e5, None);
        let a = disk(1, 0.09, 0.5, 0.0, 0.0);
        let wall = Particle::boundary(-1, NVec2::new(0.0, 0.5));
        let f = model.force(&a, &[Neighbour::new(wall, 0.09 - 0.1)]);
        assert!(f.x > 0.0);
    }

    #[test]
    fn overlap_follows_evaluated_positions() {
        let model = ContactForce::new(1e5, 0.0, None);
        let a = disk(1, 0.0, 0.0, 0.0, 0.0);
        let b = disk(2, 0.19, 0.0, 0.0, 0.0);
        // a stale gap from an earlier state does not change the spring
        let fresh = model.force(&a, &[Neighbour::new(b, a.gap_to(&b))]);
        let stale = model.force(&a, &[Neighbour::new(b, -0.05)]);
        assert_eq!(fresh, stale);

        // separated by now: no force, whatever the recorded gap says
        let apart = disk(2, 0.25, 0.0, 0.0, 0.0);
        assert_eq!(model.force(&a, &[Neighbour::new(apart, -0.05)]), NVec2::zeros());

        // touching by now although recorded as apart
        let closer = disk(2, 0.18, 0.0, 0.0, 0.0);
        assert!(model.force(&a, &[Neighbour::new(closer, 0.01)]).x < 0.0);
    }

    #[test]
    fn coincident_centres_are_skipped() {
        let model = ContactForce::new(1e5, 2e5, None);
        let a = disk(1, 0.5, 0.5, 0.0, 0.0);
        let b = disk(2, 0.5, 0.5, 0.0, 0.0);
        assert_eq!(model.force(&a, &[Neighbour::new(b, -0.2)]), NVec2::zeros());
    }
}

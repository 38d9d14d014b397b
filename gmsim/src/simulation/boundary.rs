//! Box geometry, wall contacts and particle recycling
//!
//! The box is `width` wide with its floor at `bottom = height / 10`, so that
//! particles falling through the floor gap have room to leave before being
//! recycled, and its top at `bottom + height`. The gap is centred in the floor.
//!
//! Walls are not particles in the simulation. Each step, [`Silo::wall_contacts`]
//! synthesizes zero-radius, infinite-mass points wherever a particle's surface
//! crosses a wall or touches a gap lip, and hands them to the force model as
//! ordinary neighbours.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{SimError, SimResult};
use crate::simulation::states::{Neighbour, Particle, NVec2};

/// Escape distance from the box, in multiples of the grid side
const ESCAPE_REACH: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Silo {
    width: f64,
    height: f64,
    gap: f64,
    bottom: f64, // floor level
    top: f64, // bottom + height
}

impl Silo {
    pub fn new(width: f64, height: f64, gap: f64) -> SimResult<Self> {
        if !(width.is_finite() && width > 0.0 && height.is_finite() && height > 0.0) {
            return Err(SimError::invalid(format!("box must have positive size, got {width} x {height}")));
        }
        if !(gap.is_finite() && gap >= 0.0 && gap <= width) {
            return Err(SimError::invalid(format!("gap {gap} must lie within [0, {width}]")));
        }
        let bottom = height / 10.0;
        Ok(Self {
            width,
            height,
            gap,
            bottom,
            top: bottom + height,
        })
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn gap(&self) -> f64 {
        self.gap
    }

    pub fn bottom(&self) -> f64 {
        self.bottom
    }

    pub fn top(&self) -> f64 {
        self.top
    }

    pub fn gap_start(&self) -> f64 {
        self.width / 2.0 - self.gap / 2.0
    }

    pub fn gap_end(&self) -> f64 {
        self.width / 2.0 + self.gap / 2.0
    }

    /// Side of the square grid that covers the whole box
    pub fn grid_side(&self) -> f64 {
        self.width.max(self.top)
    }

    /// The particle fell through the floor and must be recycled
    pub fn is_out(&self, particle: &Particle) -> bool {
        particle.position().y < self.bottom
    }

    /// Farther from the box than any particle can get without blowing up
    pub fn has_escaped(&self, particle: &Particle) -> bool {
        let c = particle.position();
        let reach = ESCAPE_REACH * self.grid_side();
        c.x < -reach || c.x > self.width + reach || c.y < self.bottom - reach || c.y > self.top + reach
    }

    fn over_gap(&self, x: f64) -> bool {
        self.gap > 0.0 && x >= self.gap_start() && x <= self.gap_end()
    }

    /// Synthetic wall and gap-lip contacts for `particle`, only where its surface penetrates
    pub fn wall_contacts(&self, particle: &Particle) -> Vec<Neighbour> {
        let mut out = Vec::new();
        let mut wall_id = -1;
        let c = particle.position();
        let r = particle.radius();

        let mut push = |at: NVec2, gap: f64| {
            if gap < 0.0 {
                out.push(Neighbour::new(Particle::boundary(wall_id, at), gap));
                wall_id -= 1;
            }
        };

        // left and right walls
        push(NVec2::new(0.0, c.y), c.x - r);
        push(NVec2::new(self.width, c.y), self.width - (c.x + r));

        if self.over_gap(c.x) {
            // gap lips
            for lip in [NVec2::new(self.gap_start(), self.bottom), NVec2::new(self.gap_end(), self.bottom)] {
                push(lip, (c - lip).norm() - r);
            }
        } else {
            push(NVec2::new(c.x, self.bottom), c.y - r - self.bottom);
        }

        out
    }
}

// =========================================================================================
// random placement
// =========================================================================================

/// Reinserts particles that left through the gap at the top of the box
#[derive(Debug, Clone)]
pub struct Recycler {
    rng: ChaCha8Rng,
    max_attempts: usize, // rejection sampling cap per particle
}

impl Recycler {
    pub fn new(seed: u64, max_attempts: usize) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Top band: particles that a new arrival at `top - R` could touch
    pub fn top_band(silo: &Silo, particles: &[Particle], max_radius: f64) -> Vec<Particle> {
        let floor = silo.top() - 4.0 * max_radius;
        particles.iter().filter(|p| p.position().y >= floor).copied().collect()
    }

    /// Same particle at rest just below the lid, at a random x where it overlaps nothing in `band`.
    pub fn place_at_top(&mut self, particle: &Particle, silo: &Silo, band: &[Particle]) -> SimResult<Particle> {
        let r = particle.radius();
        let y = silo.top() - r;
        for _ in 0..self.max_attempts {
            let x = self.rng.gen_range(r..=silo.width() - r);
            let candidate = particle.moved_to(NVec2::new(x, y), NVec2::zeros());
            if !band.iter().any(|other| other.overlaps(&candidate)) {
                return Ok(candidate);
            }
        }
        Err(SimError::Saturated {
            id: particle.id(),
            attempts: self.max_attempts,
        })
    }
}

/// Random non-overlapping initial packing inside the box, at rest.
/// Radii are uniform in `[min_radius, max_radius]` and ids run from 1.
pub fn random_packing(
    silo: &Silo,
    count: usize,
    min_radius: f64,
    max_radius: f64,
    mass: f64,
    seed: u64,
    max_attempts: usize,
) -> SimResult<Vec<Particle>> {
    if !(min_radius > 0.0 && min_radius <= max_radius) {
        return Err(SimError::invalid(format!("radius range [{min_radius}, {max_radius}] is empty")));
    }
    if 2.0 * max_radius > silo.width() || 2.0 * max_radius > silo.height() {
        return Err(SimError::invalid("particles do not fit in the box"));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut placed: Vec<Particle> = Vec::with_capacity(count);
    for i in 0..count {
        let id = i as i64 + 1;
        let radius = rng.gen_range(min_radius..=max_radius);
        let mut slot = None;
        for _ in 0..max_attempts.max(1) {
            let x = rng.gen_range(radius..=silo.width() - radius);
            let y = rng.gen_range(silo.bottom() + radius..=silo.top() - radius);
            let candidate = Particle::new(id, NVec2::new(x, y), NVec2::zeros(), radius, mass)?;
            if !placed.iter().any(|p| p.overlaps(&candidate)) {
                slot = Some(candidate);
                break;
            }
        }
        match slot {
            Some(p) => placed.push(p),
            None => return Err(SimError::Saturated { id, attempts: max_attempts.max(1) }),
        }
    }
    Ok(placed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disk(id: i64, x: f64, y: f64, r: f64) -> Particle {
        Particle::new(id, NVec2::new(x, y), NVec2::zeros(), r, 0.01).unwrap()
    }

    #[test]
    fn geometry_offsets() {
        let silo = Silo::new(1.0, 2.0, 0.2).unwrap();
        assert!((silo.bottom() - 0.2).abs() < 1e-12);
        assert!((silo.top() - 2.2).abs() < 1e-12);
        assert!((silo.gap_start() - 0.4).abs() < 1e-12);
        assert!((silo.gap_end() - 0.6).abs() < 1e-12);
        assert!((silo.grid_side() - 2.2).abs() < 1e-12);
    }

    #[test]
    fn rejects_gap_wider_than_box() {
        assert!(Silo::new(1.0, 1.0, 1.5).is_err());
        assert!(Silo::new(0.0, 1.0, 0.0).is_err());
    }

    #[test]
    fn escape_is_far_outside_the_box() {
        // grid side 1.1, so the reach is 11
        let silo = Silo::new(1.0, 1.0, 0.2).unwrap();
        assert!(!silo.has_escaped(&disk(1, 0.5, 0.5, 0.01)));
        assert!(!silo.has_escaped(&disk(1, 0.5, -2.0, 0.01)));
        assert!(!silo.has_escaped(&disk(1, 1.5, 3.0, 0.01)));
        assert!(silo.has_escaped(&disk(1, -20.0, 0.5, 0.01)));
        assert!(silo.has_escaped(&disk(1, 0.5, 50.0, 0.01)));
        assert!(silo.has_escaped(&disk(1, 0.5, -20.0, 0.01)));
    }

    #[test]
    fn side_walls() {
        let silo = Silo::new(1.0, 1.0, 0.2).unwrap();
        let left = silo.wall_contacts(&disk(1, 0.01, 0.5, 0.02));
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].particle.id(), -1);
        assert!((left[0].distance + 0.01).abs() < 1e-12);
        assert_eq!(left[0].particle.position(), NVec2::new(0.0, 0.5));

        let right = silo.wall_contacts(&disk(1, 0.99, 0.5, 0.02));
        assert_eq!(right.len(), 1);
        assert_eq!(right[0].particle.position(), NVec2::new(1.0, 0.5));
    }

    #[test]
    fn floor_outside_the_gap() {
        let silo = Silo::new(1.0, 1.0, 0.2).unwrap();
        let c = silo.wall_contacts(&disk(1, 0.2, 0.11, 0.02));
        assert_eq!(c.len(), 1);
        assert!((c[0].distance + 0.01).abs() < 1e-12);
        assert_eq!(c[0].particle.position(), NVec2::new(0.2, 0.1));
    }

    #[test]
    fn corner_gets_two_walls_with_distinct_ids() {
        let silo = Silo::new(1.0, 1.0, 0.2).unwrap();
        let c = silo.wall_contacts(&disk(1, 0.01, 0.11, 0.02));
        let ids: Vec<i64> = c.iter().map(|n| n.particle.id()).collect();
        assert_eq!(ids, vec![-1, -2]);
    }

    #[test]
    fn recycler_is_reproducible() {
        let silo = Silo::new(1.0, 1.0, 0.2).unwrap();
        let p = disk(5, 0.5, 0.05, 0.02);
        let a = Recycler::new(9, 100).place_at_top(&p, &silo, &[]).unwrap();
        let b = Recycler::new(9, 100).place_at_top(&p, &silo, &[]).unwrap();
        assert_eq!(a.position(), b.position());
        assert_eq!(a.id(), 5);
        assert!((a.position().y - (silo.top() - 0.02)).abs() < 1e-12);
    }

    #[test]
    fn recycler_reports_saturation() {
        let silo = Silo::new(0.1, 1.0, 0.0).unwrap();
        let p = disk(5, 0.05, 0.05, 0.05);
        let blocker = disk(6, 0.05, silo.top() - 0.05, 0.05);
        let err = Recycler::new(1, 20).place_at_top(&p, &silo, &[blocker]).unwrap_err();
        assert_eq!(err, SimError::Saturated { id: 5, attempts: 20 });
    }

    #[test]
    fn packing_has_no_overlaps() {
        let silo = Silo::new(1.0, 1.0, 0.2).unwrap();
        let ps = random_packing(&silo, 50, 0.01, 0.02, 0.01, 3, 1000).unwrap();
        assert_eq!(ps.len(), 50);
        for (i, a) in ps.iter().enumerate() {
            assert!(a.position().y - a.radius() >= silo.bottom());
            for b in &ps[i + 1..] {
                assert!(!a.overlaps(b));
            }
        }
    }
}

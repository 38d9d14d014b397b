//! Termination and measurement criteria
//!
//! A [`Criteria`] is tested once per tick against a [`Snapshot`] of the run.
//! Some variants keep counters between calls (equilibrium streak, exit times),
//! so `test` takes `&mut self`.

use crate::simulation::states::Particle;

/// State of the run right after a tick
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub time: f64, // elapsed simulated time
    pub tick: u64, // ticks completed
    pub particles: &'a [Particle],
    pub exited: &'a [i64], // ids recycled during this tick
}

#[derive(Debug, Clone, PartialEq)]
pub enum Criteria {
    Time(TimeCriteria),
    NullVelocity(NullVelocityCriteria),
    KineticEnergy(KineticEnergyEquilibrium),
    Flow(FlowCriteria),
    /// True when any member is; every member is evaluated on every tick
    Any(Vec<Criteria>),
}

impl Criteria {
    pub fn test(&mut self, snapshot: &Snapshot) -> bool {
        match self {
            Criteria::Time(c) => c.test(snapshot),
            Criteria::NullVelocity(c) => c.test(snapshot),
            Criteria::KineticEnergy(c) => c.test(snapshot),
            Criteria::Flow(c) => c.test(snapshot),
            Criteria::Any(list) => {
                // no short-circuit: stateful members must see every tick
                let mut any = false;
                for c in list.iter_mut() {
                    any |= c.test(snapshot);
                }
                any
            }
        }
    }

    /// First flow criterion in the tree, if any, for reading its exit series
    pub fn flow(&self) -> Option<&FlowCriteria> {
        match self {
            Criteria::Flow(f) => Some(f),
            Criteria::Any(list) => list.iter().find_map(|c| c.flow()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeCriteria {
    pub end: f64,
}

impl TimeCriteria {
    pub fn new(end: f64) -> Self {
        Self { end }
    }

    fn test(&self, s: &Snapshot) -> bool {
        s.time >= self.end
    }
}

/// Every particle slower than `epsilon`, once `min_time` has elapsed
#[derive(Debug, Clone, PartialEq)]
pub struct NullVelocityCriteria {
    pub epsilon: f64,
    pub min_time: f64,
}

impl NullVelocityCriteria {
    pub fn new(epsilon: f64, min_time: f64) -> Self {
        Self { epsilon, min_time }
    }

    fn test(&self, s: &Snapshot) -> bool {
        s.time >= self.min_time && s.particles.iter().all(|p| p.speed() < self.epsilon)
    }
}

/// Total kinetic energy sampled every `sample_every` ticks; true after
/// `min_samples` consecutive samples changed by less than `tolerance`.
#[derive(Debug, Clone, PartialEq)]
pub struct KineticEnergyEquilibrium {
    pub tolerance: f64,
    pub min_samples: usize,
    pub sample_every: u64,
    previous: Option<f64>,
    streak: usize,
}

impl KineticEnergyEquilibrium {
    pub fn new(tolerance: f64, min_samples: usize, sample_every: u64) -> Self {
        Self {
            tolerance,
            min_samples,
            sample_every: sample_every.max(1),
            previous: None,
            streak: 0,
        }
    }

    pub fn streak(&self) -> usize {
        self.streak
    }

    fn test(&mut self, s: &Snapshot) -> bool {
        if s.tick % self.sample_every == 0 {
            let energy: f64 = s.particles.iter().map(|p| p.kinetic_energy()).sum();
            match self.previous {
                Some(prev) if (energy - prev).abs() < self.tolerance => self.streak += 1,
                _ => self.streak = 0,
            }
            self.previous = Some(energy);
        }
        self.streak >= self.min_samples
    }
}

/// Records when particles leave through the gap; true once `target` exits happened
#[derive(Debug, Clone, PartialEq)]
pub struct FlowCriteria {
    pub target: usize,
    exit_times: Vec<f64>,
}

impl FlowCriteria {
    pub fn new(target: usize) -> Self {
        Self {
            target,
            exit_times: Vec::new(),
        }
    }

    pub fn exit_times(&self) -> &[f64] {
        &self.exit_times
    }

    pub fn exits(&self) -> usize {
        self.exit_times.len()
    }

    /// Exits per unit time between the first and the last recorded exit
    pub fn mean_flow_rate(&self) -> Option<f64> {
        let (first, last) = (self.exit_times.first()?, self.exit_times.last()?);
        let span = last - first;
        if self.exit_times.len() < 2 || span <= 0.0 {
            return None;
        }
        Some((self.exit_times.len() - 1) as f64 / span)
    }

    fn test(&mut self, s: &Snapshot) -> bool {
        self.exit_times.extend(s.exited.iter().map(|_| s.time));
        self.exit_times.len() >= self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::states::NVec2;

    fn snap<'a>(time: f64, tick: u64, particles: &'a [Particle], exited: &'a [i64]) -> Snapshot<'a> {
        Snapshot { time, tick, particles, exited }
    }

    fn moving(v: f64) -> Particle {
        Particle::new(1, NVec2::new(0.5, 0.5), NVec2::new(v, 0.0), 0.01, 2.0).unwrap()
    }

    #[test]
    fn null_velocity_waits_for_min_time() {
        let ps = [moving(0.0)];
        let mut c = Criteria::NullVelocity(NullVelocityCriteria::new(1e-3, 0.5));
        assert!(!c.test(&snap(0.1, 1, &ps, &[])));
        assert!(c.test(&snap(0.5, 2, &ps, &[])));
        let fast = [moving(1.0)];
        assert!(!c.test(&snap(0.6, 3, &fast, &[])));
    }

    #[test]
    fn equilibrium_needs_a_streak() {
        let ps = [moving(1.0)]; // KE = 1
        let mut c = KineticEnergyEquilibrium::new(1e-6, 2, 1);
        assert!(!c.test(&snap(0.0, 1, &ps, &[]))); // first sample, no previous
        assert!(!c.test(&snap(0.0, 2, &ps, &[]))); // streak 1
        assert!(c.test(&snap(0.0, 3, &ps, &[]))); // streak 2
        let other = [moving(2.0)];
        assert!(!c.test(&snap(0.0, 4, &other, &[])));
        assert_eq!(c.streak(), 0);
    }

    #[test]
    fn equilibrium_only_samples_on_interval() {
        let ps = [moving(1.0)];
        let mut c = KineticEnergyEquilibrium::new(1e-6, 1, 10);
        for tick in 1..10 {
            assert!(!c.test(&snap(0.0, tick, &ps, &[])));
        }
        assert!(!c.test(&snap(0.0, 10, &ps, &[])));
        assert!(c.test(&snap(0.0, 20, &ps, &[])));
    }

    #[test]
    fn flow_counts_exits_and_rate() {
        let mut c = FlowCriteria::new(3);
        assert!(!c.test(&snap(1.0, 1, &[], &[4])));
        assert!(!c.test(&snap(1.5, 2, &[], &[])));
        assert!(c.test(&snap(2.0, 3, &[], &[5, 6])));
        assert_eq!(c.exit_times(), &[1.0, 2.0, 2.0]);
        assert!((c.mean_flow_rate().unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn any_keeps_counting_after_a_member_fires() {
        let mut c = Criteria::Any(vec![Criteria::Time(TimeCriteria::new(0.0)), Criteria::Flow(FlowCriteria::new(10))]);
        assert!(c.test(&snap(0.1, 1, &[], &[1, 2])));
        assert_eq!(c.flow().map(|f| f.exits()), Some(2));
    }
}

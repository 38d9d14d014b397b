//! Fixed-step simulation loop
//!
//! `GranularSimulator` owns the canonical particle collection. Integrators live
//! in a parallel arena: `integrators[i]` advances `particles[i]` for the whole
//! run, and only its history is reset when the particle is recycled.
//!
//! One tick:
//! 1. neighbour sets from the cell index, plus synthetic wall contacts
//! 2. every particle advanced by its own integrator
//! 3. particles below the floor recycled to the top of the box
//! 4. time advanced to `tick * dt`
//!
//! `simulate` repeats ticks until the criterion holds or the stop flag is raised.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::{SimError, SimResult};
use crate::output::writer::{Frame, ParticlesWriter};
use crate::simulation::boundary::{Recycler, Silo};
use crate::simulation::cell_index::CellIndex;
use crate::simulation::criteria::{Criteria, Snapshot};
use crate::simulation::engine::Engine;
use crate::simulation::forces::ContactForce;
use crate::simulation::integrator::Integrator;
use crate::simulation::params::Parameters;
use crate::simulation::states::{Neighbour, Particle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Criteria, // the termination criterion held
    Interrupted, // the stop flag was raised
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub particles: Vec<Particle>,
    pub time: f64,
    pub ticks: u64,
    pub write_failures: usize,
    pub reason: StopReason,
}

pub struct GranularSimulator {
    particles: Vec<Particle>,
    integrators: Vec<Integrator>, // same slot as `particles`
    force: ContactForce,
    silo: Silo,
    index: CellIndex,
    recycler: Recycler,
    dt: f64,
    writer_iteration: u64,
    max_radius: f64,
    interaction_radius: f64,
    cell_margin: f64,
    tick: u64,
    state: RunState,
    stop: Arc<AtomicBool>,
    write_failures: usize,
    failure: Option<SimError>, // set by the first failed tick, the run cannot continue
}

impl GranularSimulator {
    pub fn new(particles: Vec<Particle>, engine: &Engine, params: &Parameters, silo: Silo) -> SimResult<Self> {
        params.validate()?;
        if particles.is_empty() {
            return Err(SimError::invalid("at least one particle is required"));
        }

        let mut ids: Vec<i64> = particles.iter().map(|p| p.id()).collect();
        ids.sort_unstable();
        if ids[0] < 0 {
            return Err(SimError::invalid("negative ids are reserved for wall particles"));
        }
        if ids.windows(2).any(|w| w[0] == w[1]) {
            return Err(SimError::invalid("particle ids must be unique"));
        }

        let max_radius = particles.iter().map(|p| p.radius()).fold(0.0, f64::max);
        if 2.0 * max_radius > silo.width() || 2.0 * max_radius > silo.height() {
            return Err(SimError::invalid(format!(
                "particles of radius {max_radius} do not fit in a {} x {} box",
                silo.width(),
                silo.height()
            )));
        }

        let force = ContactForce::new(params.kn, params.kt, params.gravity);
        let integrators = particles
            .iter()
            .map(|p| Integrator::from_config(engine.integrator, p, force.gravity_acceleration()))
            .collect::<SimResult<Vec<_>>>()?;

        Ok(Self {
            particles,
            integrators,
            force,
            silo,
            index: CellIndex::new(silo.grid_side(), engine.periodic, engine.stencil)?,
            recycler: Recycler::new(params.seed, params.max_recycle_attempts),
            dt: params.dt,
            writer_iteration: params.writer_iteration,
            max_radius,
            interaction_radius: params.neighbour_radius.unwrap_or(max_radius),
            cell_margin: params.cell_margin,
            tick: 0,
            state: RunState::Running,
            stop: Arc::new(AtomicBool::new(false)),
            write_failures: 0,
            failure: None,
        })
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn integrators(&self) -> &[Integrator] {
        &self.integrators
    }

    pub fn force(&self) -> &ContactForce {
        &self.force
    }

    pub fn silo(&self) -> &Silo {
        &self.silo
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Elapsed simulated time, `tick * dt`
    pub fn time(&self) -> f64 {
        self.tick as f64 * self.dt
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn write_failures(&self) -> usize {
        self.write_failures
    }

    /// Error of the tick that ended the run, if one failed
    pub fn failure(&self) -> Option<&SimError> {
        self.failure.as_ref()
    }

    pub fn max_radius(&self) -> f64 {
        self.max_radius
    }

    /// Raising the returned flag stops `simulate` before its next tick
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Neighbour sets of the current particles, wall contacts included
    pub fn contacts(&mut self) -> Vec<Vec<Neighbour>> {
        let mut sets = self.index.neighbours(&self.particles, self.interaction_radius, self.cell_margin);
        for (p, set) in self.particles.iter().zip(sets.iter_mut()) {
            set.extend(self.silo.wall_contacts(p));
        }
        sets
    }

    /// Run one tick and return the ids recycled during it.
    ///
    /// A failed tick leaves integrator histories partly advanced, so it
    /// terminates the run: later calls return the same error.
    pub fn step(&mut self) -> SimResult<Vec<i64>> {
        if let Some(e) = &self.failure {
            return Err(e.clone());
        }
        self.tick_once().map_err(|e| {
            error!(error = %e, tick = self.tick, "simulation failed");
            self.state = RunState::Terminated;
            self.failure = Some(e.clone());
            e
        })
    }

    fn tick_once(&mut self) -> SimResult<Vec<i64>> {
        let contacts = self.contacts();
        let time = (self.tick + 1) as f64 * self.dt;

        let mut next = Vec::with_capacity(self.particles.len());
        for ((p, integrator), set) in self.particles.iter().zip(self.integrators.iter_mut()).zip(contacts.iter()) {
            let moved = integrator.advance(p, set, &self.force, self.dt);
            if !moved.is_finite() || self.silo.has_escaped(&moved) {
                return Err(SimError::Diverged { id: moved.id(), time });
            }
            next.push(moved);
        }

        let out: Vec<usize> = (0..next.len()).filter(|&i| self.silo.is_out(&next[i])).collect();
        let mut exited = Vec::with_capacity(out.len());
        if !out.is_empty() {
            let staying: Vec<Particle> = next.iter().filter(|p| !self.silo.is_out(p)).copied().collect();
            let mut band = Recycler::top_band(&self.silo, &staying, self.max_radius);
            for slot in out {
                let placed = self.recycler.place_at_top(&next[slot], &self.silo, &band)?;
                self.integrators[slot].reset_history(&placed);
                band.push(placed);
                next[slot] = placed;
                exited.push(placed.id());
            }
            debug!(time, exited = exited.len(), "recycled particles");
        }

        self.particles = next;
        self.tick += 1;
        Ok(exited)
    }

    /// Tick until `criteria` holds, sending a frame to `writer` every `writer_iteration` ticks
    pub fn simulate(&mut self, criteria: &mut Criteria, writer: &mut dyn ParticlesWriter) -> SimResult<RunOutcome> {
        if let Some(e) = &self.failure {
            return Err(e.clone());
        }
        self.state = RunState::Running;
        info!(
            particles = self.particles.len(),
            dt = self.dt,
            width = self.silo.width(),
            height = self.silo.height(),
            gap = self.silo.gap(),
            "simulation started"
        );

        if self.tick == 0 {
            self.emit(writer);
        }

        loop {
            if self.stop.load(Ordering::Relaxed) {
                info!(time = self.time(), ticks = self.tick, "simulation interrupted");
                return Ok(self.outcome(StopReason::Interrupted));
            }

            let exited = self.step()?;
            let snapshot = Snapshot {
                time: self.time(),
                tick: self.tick,
                particles: &self.particles,
                exited: &exited,
            };
            if criteria.test(&snapshot) {
                self.state = RunState::Terminated;
                info!(
                    time = self.time(),
                    ticks = self.tick,
                    write_failures = self.write_failures,
                    "simulation finished"
                );
                return Ok(self.outcome(StopReason::Criteria));
            }

            if self.tick % self.writer_iteration == 0 {
                self.emit(writer);
            }
        }
    }

    fn emit(&mut self, writer: &mut dyn ParticlesWriter) {
        let contacts = self.contacts();
        let frame = Frame {
            time: self.time(),
            tick: self.tick,
            particles: &self.particles,
            contacts: &contacts,
            force: &self.force,
            silo: &self.silo,
        };
        debug!(time = frame.time, tick = frame.tick, "writing frame");
        if let Err(e) = writer.write(&frame) {
            self.write_failures += 1;
            warn!(error = %e, time = frame.time, "writer failed, continuing");
        }
    }

    fn outcome(&self, reason: StopReason) -> RunOutcome {
        RunOutcome {
            particles: self.particles.clone(),
            time: self.time(),
            ticks: self.tick,
            write_failures: self.write_failures,
            reason,
        }
    }
}

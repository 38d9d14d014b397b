//! Frame sinks driven by the simulation loop
//!
//! The loop hands a [`Frame`] to a [`ParticlesWriter`] every `writer_iteration`
//! ticks. A failed write is logged and counted by the loop, never fatal.

use std::io;

use tracing::info;

use crate::simulation::boundary::Silo;
use crate::simulation::forces::ContactForce;
use crate::simulation::states::{Neighbour, Particle};

/// Everything a writer may want to know about the run at one instant
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub time: f64,
    pub tick: u64,
    pub particles: &'a [Particle],
    pub contacts: &'a [Vec<Neighbour>], // contacts[i] belongs to particles[i], walls included
    pub force: &'a ContactForce,
    pub silo: &'a Silo,
}

impl Frame<'_> {
    /// Contact force magnitude of every particle, in slot order
    pub fn contact_magnitudes(&self) -> Vec<f64> {
        self.particles
            .iter()
            .zip(self.contacts.iter())
            .map(|(p, c)| self.force.contact_magnitude(p, c))
            .collect()
    }

    pub fn kinetic_energy(&self) -> f64 {
        self.particles.iter().map(|p| p.kinetic_energy()).sum()
    }
}

pub trait ParticlesWriter {
    fn write(&mut self, frame: &Frame<'_>) -> io::Result<()>;
}

/// Discards every frame
#[derive(Debug, Default)]
pub struct NoopWriter;

impl ParticlesWriter for NoopWriter {
    fn write(&mut self, _frame: &Frame<'_>) -> io::Result<()> {
        Ok(())
    }
}

/// Fans a frame out to several writers.
/// Every writer sees the frame; the first failure is reported afterwards.
#[derive(Default)]
pub struct MultiWriter<'w> {
    writers: Vec<&'w mut dyn ParticlesWriter>,
}

impl<'w> MultiWriter<'w> {
    pub fn new() -> Self {
        Self { writers: Vec::new() }
    }

    pub fn with(mut self, writer: &'w mut dyn ParticlesWriter) -> Self {
        self.writers.push(writer);
        self
    }

    pub fn len(&self) -> usize {
        self.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }
}

impl ParticlesWriter for MultiWriter<'_> {
    fn write(&mut self, frame: &Frame<'_>) -> io::Result<()> {
        let mut first_err = None;
        for w in self.writers.iter_mut() {
            if let Err(e) = w.write(frame) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Collects `(time, total kinetic energy)` points
#[derive(Debug, Default)]
pub struct KineticEnergyWriter {
    points: Vec<(f64, f64)>,
}

impl KineticEnergyWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Hand back the collected points and start a fresh series
    pub fn take_points(&mut self) -> Vec<(f64, f64)> {
        std::mem::take(&mut self.points)
    }

    /// Dump the series as `time,kinetic_energy` lines
    pub fn write_csv<W: io::Write>(&self, mut out: W) -> io::Result<()> {
        writeln!(out, "time,kinetic_energy")?;
        for (t, k) in &self.points {
            writeln!(out, "{t:.6},{k:.9e}")?;
        }
        out.flush()
    }
}

impl ParticlesWriter for KineticEnergyWriter {
    fn write(&mut self, frame: &Frame<'_>) -> io::Result<()> {
        self.points.push((frame.time, frame.kinetic_energy()));
        Ok(())
    }
}

/// Logs average speed and position extents of every frame
#[derive(Debug, Default)]
pub struct ProgressWriter;

impl ParticlesWriter for ProgressWriter {
    fn write(&mut self, frame: &Frame<'_>) -> io::Result<()> {
        let n = frame.particles.len();
        if n == 0 {
            return Ok(());
        }
        let avg_speed = frame.particles.iter().map(|p| p.speed()).sum::<f64>() / n as f64;
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in frame.particles {
            let c = p.position();
            min_x = min_x.min(c.x);
            min_y = min_y.min(c.y);
            max_x = max_x.max(c.x);
            max_y = max_y.max(c.y);
        }
        info!(
            time = frame.time,
            avg_speed,
            min = ?(min_x, min_y),
            max = ?(max_x, max_y),
            "progress"
        );
        Ok(())
    }
}

//! Extended XYZ trajectory writer (readable by Ovito)
//!
//! Each frame lists every particle as `id x y z vx vy vz radius force`, with
//! `force` the contact force magnitude. Six fixed zero-radius markers (box
//! corners and gap lips, negative ids) are appended so the box outline shows
//! up in the viewer.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::output::writer::{Frame, ParticlesWriter};
use crate::simulation::boundary::Silo;
use crate::simulation::states::NVec2;

pub struct XyzWriter<W: Write> {
    out: W,
}

impl XyzWriter<BufWriter<File>> {
    /// Create (or truncate) `path`
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> XyzWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn markers(silo: &Silo) -> [NVec2; 6] {
        [
            NVec2::new(0.0, silo.bottom()),
            NVec2::new(0.0, silo.top()),
            NVec2::new(silo.width(), silo.top()),
            NVec2::new(silo.width(), silo.bottom()),
            NVec2::new(silo.gap_start(), silo.bottom()),
            NVec2::new(silo.gap_end(), silo.bottom()),
        ]
    }
}

impl<W: Write> ParticlesWriter for XyzWriter<W> {
    fn write(&mut self, frame: &Frame<'_>) -> io::Result<()> {
        let markers = Self::markers(frame.silo);
        let forces = frame.contact_magnitudes();

        writeln!(self.out, "{}", frame.particles.len() + markers.len())?;
        writeln!(
            self.out,
            "Properties=id:I:1:pos:R:3:velo:R:3:radius:R:1:force:R:1 Time={:.6}",
            frame.time
        )?;
        for (p, f) in frame.particles.iter().zip(forces) {
            let (c, v) = (p.position(), p.velocity());
            writeln!(
                self.out,
                "{} {:.6} {:.6} 0 {:.6} {:.6} 0 {:.6} {:.6}",
                p.id(),
                c.x,
                c.y,
                v.x,
                v.y,
                p.radius(),
                f
            )?;
        }
        for (k, m) in markers.iter().enumerate() {
            writeln!(self.out, "{} {:.6} {:.6} 0 0 0 0 0 0", -(k as i64) - 1, m.x, m.y)?;
        }
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::forces::ContactForce;
    use crate::simulation::states::{Neighbour, Particle};

    #[test]
    fn frame_layout() {
        let silo = Silo::new(1.0, 1.0, 0.2).unwrap();
        let force = ContactForce::new(1e5, 2e5, None);
        let ps = [Particle::new(3, NVec2::new(0.009, 0.5), NVec2::zeros(), 0.01, 1.0).unwrap()];
        let wall = Particle::boundary(-1, NVec2::new(0.0, 0.5));
        let contacts = vec![vec![Neighbour::new(wall, -0.001)]];
        let frame = Frame { time: 1.5, tick: 3, particles: &ps, contacts: &contacts, force: &force, silo: &silo };

        let mut w = XyzWriter::new(Vec::new());
        w.write(&frame).unwrap();
        let text = String::from_utf8(w.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2 + 1 + 6);
        assert_eq!(lines[0], "7");
        assert!(lines[1].ends_with("Time=1.500000"));
        assert!(lines[2].starts_with("3 0.009000 0.500000 0"));
        assert!(lines[2].ends_with("100.000000"));
        assert!(lines[8].starts_with("-6 0.600000 0.100000"));
    }
}

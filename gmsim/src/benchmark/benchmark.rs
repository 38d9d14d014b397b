use std::time::Instant;

use crate::configuration::config::IntegratorConfig;
use crate::simulation::boundary::{random_packing, Silo};
use crate::simulation::cell_index::{CellIndex, Stencil};
use crate::simulation::engine::Engine;
use crate::simulation::params::Parameters;
use crate::simulation::simulator::GranularSimulator;
use crate::simulation::states::Particle;

/// Helper to pack `n` particles of radius 0.004..0.006 into a 1 x 1 box
fn make_particles(n: usize) -> Option<(Silo, Vec<Particle>)> {
    let silo = Silo::new(1.0, 1.0, 0.1).ok()?;
    let particles = random_packing(&silo, n, 0.004, 0.006, 0.01, 42, 100_000).ok()?;
    Some((silo, particles))
}

/// Brute force against both cell index stencils
pub fn bench_neighbours() {
    let ns = [250, 500, 1000, 2000, 4000, 8000];

    for n in ns {
        let Some((silo, particles)) = make_particles(n) else {
            println!("N = {n:5}, could not pack particles, skipping");
            continue;
        };
        let range = 0.006;

        let Ok(mut full) = CellIndex::new(silo.grid_side(), false, Stencil::Full) else { return };
        let Ok(mut half) = CellIndex::new(silo.grid_side(), false, Stencil::Half) else { return };

        // Warm up
        full.neighbours(&particles, range, 0.0);
        half.neighbours(&particles, range, 0.0);

        let t0 = Instant::now();
        let brute = full.brute_force(&particles, range);
        let dt_brute = t0.elapsed().as_secs_f64();

        let t1 = Instant::now();
        full.neighbours(&particles, range, 0.0);
        let dt_full = t1.elapsed().as_secs_f64();

        let t2 = Instant::now();
        half.neighbours(&particles, range, 0.0);
        let dt_half = t2.elapsed().as_secs_f64();

        let pairs: usize = brute.iter().map(|s| s.len()).sum::<usize>() / 2;
        println!(
            "N = {n:5}, pairs = {pairs:6}, brute = {:8.6} s, full = {:8.6} s, half = {:8.6} s",
            dt_brute, dt_full, dt_half
        );
    }
}

/// Cost of a whole tick for each integrator
/// Paste output directly into excel to graph
pub fn bench_integrators() {
    println!("N,beeman_ms,gear5_ms");

    let steps = 20;
    for n in (500..=4000).step_by(500) {
        let Some((silo, particles)) = make_particles(n) else { continue };

        let mut row = Vec::new();
        for integrator in [IntegratorConfig::Beeman, IntegratorConfig::Gear5] {
            let engine = Engine { integrator, ..Engine::default() };
            let params = Parameters { dt: 1e-5, ..Parameters::default() };
            let Ok(mut sim) = GranularSimulator::new(particles.clone(), &engine, &params, silo) else { return };

            let t0 = Instant::now();
            for _ in 0..steps {
                if sim.step().is_err() {
                    break;
                }
            }
            row.push(t0.elapsed().as_secs_f64() * 1000.0 / steps as f64);
        }

        println!("{},{:.6},{:.6}", n, row[0], row[1]);
    }
}

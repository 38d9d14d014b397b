use gmsim::{Criteria, Frame, NoopWriter, ParticlesWriter, Scenario, ScenarioConfig, StopReason};

use std::io;

/// Highest particle speed over every frame
#[derive(Default)]
struct TopSpeed {
    max: f64,
    frames: usize,
}

impl ParticlesWriter for TopSpeed {
    fn write(&mut self, frame: &Frame<'_>) -> io::Result<()> {
        self.frames += 1;
        for p in frame.particles {
            self.max = self.max.max(p.speed());
        }
        Ok(())
    }
}

const FLOW_SCENARIO: &str = r#"
engine:
  integrator: "gear5"
  stencil: half

parameters:
  dt: 5.0e-5
  writer_iteration: 1000
  seed: 3
  kn: 1.0e4
  kt: 2.0e4

silo:
  width: 1.0
  height: 1.0
  gap: 0.25

particles:
  count: 100
  min_radius: 0.02
  max_radius: 0.03
  mass: 0.01

criteria:
  kind: any
  of:
    - { kind: flow, exits: 50 }
    - { kind: time, t_end: 20.0 }
"#;

#[test]
fn silo_discharges_through_the_gap() {
    let cfg = ScenarioConfig::from_yaml_str(FLOW_SCENARIO).unwrap();
    let Scenario { mut simulator, mut criteria, .. } = Scenario::build_scenario(&cfg).unwrap();
    let start: Vec<i64> = simulator.particles().iter().map(|p| p.id()).collect();

    let outcome = simulator.simulate(&mut criteria, &mut NoopWriter).unwrap();
    assert_eq!(outcome.reason, StopReason::Criteria);

    let flow = criteria.flow().unwrap();
    assert!(flow.exits() >= 50, "stopped at t = {} with {} exits", outcome.time, flow.exits());
    assert!(outcome.time < 20.0);
    assert!(flow.exit_times().windows(2).all(|w| w[0] <= w[1]));
    assert!(flow.mean_flow_rate().is_some_and(|q| q > 0.0));

    // recycling keeps every particle, in its slot, inside the box
    let end: Vec<i64> = outcome.particles.iter().map(|p| p.id()).collect();
    assert_eq!(start, end);
    assert!(outcome.particles.iter().all(|p| !simulator.silo().is_out(p)));
}

#[test]
fn gear_stays_bounded_with_stiff_contacts() {
    // stiff springs and the small step used by the shipped scenarios
    for integrator in ["gear5", "gear5_vd"] {
        let text = FLOW_SCENARIO
            .replace("\"gear5\"", &format!("\"{integrator}\""))
            .replace("dt: 5.0e-5", "dt: 1.0e-5")
            .replace("writer_iteration: 1000", "writer_iteration: 200")
            .replace("kn: 1.0e4", "kn: 1.0e5")
            .replace("kt: 2.0e4", "kt: 2.0e5")
            .replace("t_end: 20.0", "t_end: 0.4");
        let cfg = ScenarioConfig::from_yaml_str(&text).unwrap();
        let Scenario { mut simulator, mut criteria, .. } = Scenario::build_scenario(&cfg).unwrap();

        let mut top = TopSpeed::default();
        let outcome = simulator.simulate(&mut criteria, &mut top).unwrap();
        assert_eq!(outcome.reason, StopReason::Criteria);
        assert!(top.frames > 100);

        // nothing falls faster than a drop from the lid allows, with some room for collisions
        let drop = (2.0 * 9.8 * simulator.silo().top()).sqrt();
        assert!(top.max < 2.0 * drop, "{integrator}: top speed {} after t = {}", top.max, outcome.time);
        assert!(outcome.particles.iter().all(|p| p.speed() < 2.0 * drop));
    }
}

#[test]
fn explicit_bodies_keep_their_order() {
    let yaml = r#"
engine:
  integrator: "beeman"
parameters:
  dt: 1.0e-4
  writer_iteration: 10
  kn: 1.0e5
  gravity: false
silo:
  width: 1.0
  height: 1.0
  gap: 0.0
bodies:
  - { x: [0.3, 0.5], v: [1.0, 0.0], m: 0.01, radius: 0.02 }
  - { x: [0.7, 0.5], v: [-1.0, 0.0], m: 0.01, radius: 0.02 }
criteria: { kind: time, t_end: 0.01 }
"#;
    let cfg = ScenarioConfig::from_yaml_str(yaml).unwrap();
    assert_eq!(cfg.kt(), 2.0e5);
    assert_eq!(cfg.gravity(), None);

    let Scenario { mut simulator, mut criteria, .. } = Scenario::build_scenario(&cfg).unwrap();
    assert!(matches!(criteria, Criteria::Time(_)));
    let outcome = simulator.simulate(&mut criteria, &mut NoopWriter).unwrap();

    // bodies approach each other without touching yet
    let ids: Vec<i64> = outcome.particles.iter().map(|p| p.id()).collect();
    assert_eq!(ids, vec![1, 2]);
    assert!((outcome.particles[0].position().x - 0.31).abs() < 2e-4);
    assert!((outcome.particles[1].position().x - 0.69).abs() < 2e-4);
}

#[test]
fn conflicting_particle_sources_are_rejected() {
    let yaml = r#"
engine: { integrator: "gear5" }
parameters: { dt: 1.0e-5, writer_iteration: 10, kn: 1.0e5 }
silo: { width: 1.0, height: 1.0, gap: 0.1 }
particles: { count: 5, min_radius: 0.01, max_radius: 0.01, mass: 0.01 }
bodies:
  - { x: [0.5, 0.5], m: 0.01, radius: 0.01 }
criteria: { kind: time, t_end: 1.0 }
"#;
    assert!(ScenarioConfig::from_yaml_str(yaml).is_err());
}

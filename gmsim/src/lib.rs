pub mod error;
pub mod simulation;
pub mod configuration;
pub mod output;
pub mod benchmark;

pub use error::{ConfigError, SimError, SimResult};

pub use simulation::states::{Particle, Neighbour, NVec2};
pub use simulation::cell_index::{CellIndex, Stencil};
pub use simulation::forces::ContactForce;
pub use simulation::integrator::{Integrator, Beeman, Gear, GEAR_5_ALPHAS, GEAR_5_VD_ALPHAS};
pub use simulation::boundary::{Silo, Recycler, random_packing};
pub use simulation::criteria::{Criteria, Snapshot, TimeCriteria, NullVelocityCriteria, KineticEnergyEquilibrium, FlowCriteria};
pub use simulation::engine::Engine;
pub use simulation::params::Parameters;
pub use simulation::simulator::{GranularSimulator, RunOutcome, RunState, StopReason};
pub use simulation::scenario::{Scenario, build_criteria};

pub use configuration::config::{IntegratorConfig, EngineConfig, ParametersConfig, SiloConfig, ParticlesConfig, BodyConfig, CriteriaConfig, OutputConfig, ScenarioConfig};

pub use output::writer::{Frame, ParticlesWriter, NoopWriter, MultiWriter, KineticEnergyWriter, ProgressWriter};
pub use output::xyz::XyzWriter;

pub use benchmark::benchmark::{bench_neighbours, bench_integrators};

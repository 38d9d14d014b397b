pub mod states;
pub mod params;
pub mod engine;
pub mod cell_index;
pub mod forces;
pub mod integrator;
pub mod boundary;
pub mod criteria;
pub mod simulator;
pub mod scenario;

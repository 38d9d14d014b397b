//! High-level runtime engine settings
//!
//! Selects the integrator bound to every particle and how the cell index
//! searches for neighbours, used when building a `GranularSimulator`

use crate::configuration::config::IntegratorConfig;
use crate::simulation::cell_index::Stencil;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Engine {
    pub integrator: IntegratorConfig, // beeman, gear5 or gear5_vd
    pub stencil: Stencil, // full (9 cells) or half (5 cells)
    pub periodic: bool, // wrap the neighbour grid
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            integrator: IntegratorConfig::Gear5,
            stencil: Stencil::Half,
            periodic: false,
        }
    }
}

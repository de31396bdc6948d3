//! Physics configuration.

use serde::{Deserialize, Serialize};

/// Native world configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsConfig {
    /// Gravity vector (default: -9.81 in Y).
    pub gravity: [f32; 3],

    /// Fixed timestep for the simulation.
    pub timestep: f32,

    /// Maximum number of substeps per frame.
    pub max_substeps: u32,

    /// Solver iterations for velocity resolution.
    pub solver_iterations: usize,

    /// Enable sleeping for inactive bodies.
    pub sleeping_enabled: bool,

    /// Default normalized linear velocity threshold below which bodies may
    /// fall asleep.
    pub default_sleep_threshold: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, -9.81, 0.0],
            timestep: 1.0 / 60.0,
            max_substeps: 4,
            solver_iterations: 4,
            sleeping_enabled: true,
            default_sleep_threshold: 0.1,
        }
    }
}

impl PhysicsConfig {
    /// Set gravity.
    pub fn with_gravity(mut self, x: f32, y: f32, z: f32) -> Self {
        self.gravity = [x, y, z];
        self
    }

    /// Set the fixed timestep.
    pub fn with_timestep(mut self, timestep: f32) -> Self {
        self.timestep = timestep;
        self
    }

    /// Disable sleeping entirely.
    pub fn without_sleeping(mut self) -> Self {
        self.sleeping_enabled = false;
        self
    }
}

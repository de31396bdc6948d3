//! Physics materials defining surface properties.

use serde::{Deserialize, Serialize};

/// Surface material carried by every attached shape.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PhysicsMaterial {
    /// Friction coefficient (0 = frictionless).
    pub friction: f32,
    /// Restitution/bounciness (0 = no bounce).
    pub restitution: f32,
    /// Density for mass calculation (kg/m³).
    pub density: f32,
    /// How friction is combined between two touching shapes.
    pub friction_combine: CombineRule,
    /// How restitution is combined between two touching shapes.
    pub restitution_combine: CombineRule,
}

impl Default for PhysicsMaterial {
    fn default() -> Self {
        Self {
            friction: 0.5,
            restitution: 0.0,
            density: 1.0,
            friction_combine: CombineRule::Average,
            restitution_combine: CombineRule::Average,
        }
    }
}

impl PhysicsMaterial {
    /// Create a material from friction and restitution.
    pub fn new(friction: f32, restitution: f32) -> Self {
        Self {
            friction,
            restitution,
            ..Default::default()
        }
    }

    /// Set friction.
    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction.max(0.0);
        self
    }

    /// Set restitution.
    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution.clamp(0.0, 1.0);
        self
    }

    /// Set density.
    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density.max(0.001);
        self
    }
}

/// Rule for combining material properties of two touching shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CombineRule {
    /// Use the average of both values.
    #[default]
    Average,
    /// Use the minimum value.
    Min,
    /// Multiply the values.
    Multiply,
    /// Use the maximum value.
    Max,
}

impl CombineRule {
    pub(crate) fn to_native(self) -> rapier3d::prelude::CoefficientCombineRule {
        use rapier3d::prelude::CoefficientCombineRule;
        match self {
            Self::Average => CoefficientCombineRule::Average,
            Self::Min => CoefficientCombineRule::Min,
            Self::Multiply => CoefficientCombineRule::Multiply,
            Self::Max => CoefficientCombineRule::Max,
        }
    }
}

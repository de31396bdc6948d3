//! Error types for the physics system.

use crate::ids::{ColliderId, JointId, RigidbodyId};
use thiserror::Error;

/// Physics system errors.
#[derive(Debug, Error)]
pub enum PhysicsError {
    /// The native world (or its engine) has already been disposed.
    #[error("physics world is disposed")]
    WorldDisposed,

    /// Rigid body not found.
    #[error("rigid body not found: {0:?}")]
    BodyNotFound(RigidbodyId),

    /// Attached collider shape not found.
    #[error("collider not found: {0:?}")]
    ColliderNotFound(ColliderId),

    /// Joint not found.
    #[error("joint not found: {0:?}")]
    JointNotFound(JointId),

    /// Invalid configuration rejected before any native call.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Transform access array used after dispose.
    #[error("transform access array used after dispose")]
    ArrayDisposed,

    /// Shape creation failed.
    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// Errors building a collision shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    /// A shape dimension was zero or negative after scaling.
    #[error("shape dimension must be positive: {0}")]
    NonPositiveDimension(&'static str),

    /// A convex hull could not be computed from the given points.
    #[error("convex hull computation failed ({points} points)")]
    DegenerateHull {
        /// How many input points were supplied.
        points: usize,
    },

    /// A plane normal of zero length was supplied.
    #[error("plane normal must be non-zero")]
    ZeroNormal,
}

/// Result type for physics operations.
pub type Result<T> = std::result::Result<T, PhysicsError>;

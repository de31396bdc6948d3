//! Collision shape construction.
//!
//! Shapes are described by a tagged [`ShapeKind`] and baked into a native
//! shape by [`build_shape`], folding the owning node's accumulated world
//! scale into the geometry (the native engine does not scale shapes itself).

use crate::error::ShapeError;
use crate::filter::CollisionFilter;
use crate::material::PhysicsMaterial;
use rapier3d::na::{Isometry3, Point3, UnitVector3, Vector3};
use rapier3d::prelude as rapier;
use serde::{Deserialize, Serialize};

/// Authored shape description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ShapeKind {
    /// Box with half-extents.
    Box {
        /// Half size along each local axis.
        half_extents: [f32; 3],
    },
    /// Sphere with radius. Scaled by the largest scale component.
    Sphere {
        /// Radius before scaling.
        radius: f32,
    },
    /// Capsule aligned along local Y.
    Capsule {
        /// Half the distance between the cap centers.
        half_height: f32,
        /// Cap radius.
        radius: f32,
    },
    /// Cylinder aligned along local Y.
    Cylinder {
        /// Half height.
        half_height: f32,
        /// Radius.
        radius: f32,
    },
    /// Convex hull of a point cloud.
    ConvexMesh {
        /// Input points; the hull is computed at build time.
        points: Vec<[f32; 3]>,
    },
    /// Infinite half-space, solid below the plane.
    InfinitePlane {
        /// Outward plane normal.
        normal: [f32; 3],
    },
}

impl Default for ShapeKind {
    fn default() -> Self {
        Self::Box {
            half_extents: [0.5, 0.5, 0.5],
        }
    }
}

impl ShapeKind {
    /// Box from half-extents.
    pub fn cuboid(hx: f32, hy: f32, hz: f32) -> Self {
        Self::Box {
            half_extents: [hx, hy, hz],
        }
    }

    /// Sphere from radius.
    pub fn sphere(radius: f32) -> Self {
        Self::Sphere { radius }
    }

    /// Y-aligned capsule.
    pub fn capsule(half_height: f32, radius: f32) -> Self {
        Self::Capsule {
            half_height,
            radius,
        }
    }
}

/// One shape ready to cross the native boundary: baked geometry plus the
/// attachment parameters the native record carries.
#[derive(Clone)]
pub struct ShapeRecord {
    pub(crate) shape: rapier::SharedShape,
    /// Pose of the shape relative to the owning body's origin.
    pub local_pose: Isometry3<f32>,
    /// Surface material.
    pub material: PhysicsMaterial,
    /// Whether the shape reports overlaps instead of colliding.
    pub is_trigger: bool,
    /// Collision filter masks.
    pub filter: CollisionFilter,
}

fn positive(value: f32, what: &'static str) -> Result<f32, ShapeError> {
    if value > 0.0 {
        Ok(value)
    } else {
        Err(ShapeError::NonPositiveDimension(what))
    }
}

/// Bake a [`ShapeKind`] into a native shape under the given world scale.
pub fn build_shape(
    kind: &ShapeKind,
    scale: Vector3<f32>,
) -> Result<rapier::SharedShape, ShapeError> {
    match kind {
        ShapeKind::Box { half_extents } => {
            let hx = positive(half_extents[0] * scale.x.abs(), "box half extent x")?;
            let hy = positive(half_extents[1] * scale.y.abs(), "box half extent y")?;
            let hz = positive(half_extents[2] * scale.z.abs(), "box half extent z")?;
            Ok(rapier::SharedShape::cuboid(hx, hy, hz))
        }
        ShapeKind::Sphere { radius } => {
            let uniform = scale.x.abs().max(scale.y.abs()).max(scale.z.abs());
            let r = positive(radius * uniform, "sphere radius")?;
            Ok(rapier::SharedShape::ball(r))
        }
        ShapeKind::Capsule {
            half_height,
            radius,
        } => {
            let radial = scale.x.abs().max(scale.z.abs());
            let r = positive(radius * radial, "capsule radius")?;
            let hh = positive(half_height * scale.y.abs(), "capsule half height")?;
            Ok(rapier::SharedShape::capsule_y(hh, r))
        }
        ShapeKind::Cylinder {
            half_height,
            radius,
        } => {
            let radial = scale.x.abs().max(scale.z.abs());
            let r = positive(radius * radial, "cylinder radius")?;
            let hh = positive(half_height * scale.y.abs(), "cylinder half height")?;
            Ok(rapier::SharedShape::cylinder(hh, r))
        }
        ShapeKind::ConvexMesh { points } => {
            let scaled: Vec<Point3<f32>> = points
                .iter()
                .map(|p| Point3::new(p[0] * scale.x, p[1] * scale.y, p[2] * scale.z))
                .collect();
            rapier::SharedShape::convex_hull(&scaled).ok_or(ShapeError::DegenerateHull {
                points: points.len(),
            })
        }
        ShapeKind::InfinitePlane { normal } => {
            let n = Vector3::new(normal[0], normal[1], normal[2]);
            if n.norm_squared() <= f32::EPSILON {
                return Err(ShapeError::ZeroNormal);
            }
            Ok(rapier::SharedShape::halfspace(UnitVector3::new_normalize(n)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_scale() -> Vector3<f32> {
        Vector3::new(1.0, 1.0, 1.0)
    }

    #[test]
    fn primitives_build() {
        assert!(build_shape(&ShapeKind::cuboid(0.5, 0.5, 0.5), unit_scale()).is_ok());
        assert!(build_shape(&ShapeKind::sphere(1.0), unit_scale()).is_ok());
        assert!(build_shape(&ShapeKind::capsule(0.5, 0.3), unit_scale()).is_ok());
        assert!(build_shape(
            &ShapeKind::InfinitePlane {
                normal: [0.0, 1.0, 0.0]
            },
            unit_scale()
        )
        .is_ok());
    }

    #[test]
    fn zero_dimension_rejected() {
        let err = build_shape(&ShapeKind::sphere(0.0), unit_scale()).unwrap_err();
        assert_eq!(err, ShapeError::NonPositiveDimension("sphere radius"));

        // Scale can also collapse a valid dimension.
        let err = build_shape(
            &ShapeKind::cuboid(0.5, 0.5, 0.5),
            Vector3::new(1.0, 0.0, 1.0),
        )
        .unwrap_err();
        assert_eq!(err, ShapeError::NonPositiveDimension("box half extent y"));
    }

    #[test]
    fn degenerate_hull_rejected() {
        let err = build_shape(
            &ShapeKind::ConvexMesh {
                points: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
            },
            unit_scale(),
        )
        .unwrap_err();
        assert_eq!(err, ShapeError::DegenerateHull { points: 2 });
    }

    #[test]
    fn sphere_scales_by_largest_component() {
        let shape = build_shape(&ShapeKind::sphere(1.0), Vector3::new(1.0, 3.0, 2.0)).unwrap();
        let ball = shape.as_ball().unwrap();
        assert!((ball.radius - 3.0).abs() < 1e-6);
    }
}

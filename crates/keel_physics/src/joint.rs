//! Joint component, constraint conversion and dirty tracking.
//!
//! Joints mirror lazily: property writes only flag the component dirty, and
//! the full constraint configuration is rebuilt and pushed once per dirty
//! joint when the next step flushes. The connected anchor frame can be
//! derived automatically from the relative pose of the two bodies at
//! creation time; the derived frame is cached and only recomputed when an
//! authored property invalidates it.

use crate::body::BodyKey;
use crate::error::{PhysicsError, Result};
use crate::handle::WorldRef;
use crate::ids::JointId;
use crate::lifecycle::NativeLifecycle;
use keel_core::Handle;
use keel_scene::NodeId;
use rapier3d::na::Isometry3;
use rapier3d::prelude as rapier;
use serde::{Deserialize, Serialize};

/// Registry key for a [`Joint`] component.
pub type JointKey = Handle<Joint>;

/// Constraint flavor plus its authored limits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum JointKind {
    /// All six degrees of freedom locked.
    Fixed,
    /// Rotation about the local X axis only.
    Hinge {
        /// Optional angular range in radians.
        limits: Option<[f32; 2]>,
    },
    /// Translation along the local X axis only.
    Slider {
        /// Optional travel range.
        limits: Option<[f32; 2]>,
    },
    /// Free rotation about all axes, translation locked.
    Ball {
        /// Optional swing limit around local X.
        x_limits: Option<[f32; 2]>,
        /// Optional swing limit around local Y.
        y_limits: Option<[f32; 2]>,
        /// Optional swing limit around local Z.
        z_limits: Option<[f32; 2]>,
    },
    /// Keeps the anchors within a distance band, rotation free.
    Distance {
        /// Minimum separation.
        min: f32,
        /// Maximum separation.
        max: f32,
    },
    /// Rotation about two perpendicular axes, like a cardan shaft.
    Universal,
    /// Translation locked, rotation bounded per axis.
    Ellipsoid {
        /// Angular range around local X.
        x_range: [f32; 2],
        /// Angular range around local Y.
        y_range: [f32; 2],
        /// Angular range around local Z.
        z_range: [f32; 2],
    },
}

impl JointKind {
    fn to_native(self, frame_a: Isometry3<f32>, frame_b: Isometry3<f32>) -> rapier::GenericJoint {
        use rapier::{JointAxesMask, JointAxis};

        let builder = match self {
            Self::Fixed => rapier::GenericJointBuilder::new(JointAxesMask::LOCKED_FIXED_AXES),
            Self::Hinge { limits } => {
                let mut b = rapier::GenericJointBuilder::new(JointAxesMask::LOCKED_REVOLUTE_AXES);
                if let Some(range) = limits {
                    b = b.limits(JointAxis::AngX, range);
                }
                b
            }
            Self::Slider { limits } => {
                let mut b = rapier::GenericJointBuilder::new(JointAxesMask::LOCKED_PRISMATIC_AXES);
                if let Some(range) = limits {
                    b = b.limits(JointAxis::LinX, range);
                }
                b
            }
            Self::Ball {
                x_limits,
                y_limits,
                z_limits,
            } => {
                let mut b = rapier::GenericJointBuilder::new(JointAxesMask::LOCKED_SPHERICAL_AXES);
                if let Some(range) = x_limits {
                    b = b.limits(JointAxis::AngX, range);
                }
                if let Some(range) = y_limits {
                    b = b.limits(JointAxis::AngY, range);
                }
                if let Some(range) = z_limits {
                    b = b.limits(JointAxis::AngZ, range);
                }
                b
            }
            Self::Distance { min, max } => rapier::GenericJointBuilder::new(JointAxesMask::empty())
                .limits(JointAxis::LinX, [min, max])
                .limits(JointAxis::LinY, [min, max])
                .limits(JointAxis::LinZ, [min, max]),
            Self::Universal => rapier::GenericJointBuilder::new(
                JointAxesMask::LIN_AXES | JointAxesMask::ANG_X,
            ),
            Self::Ellipsoid {
                x_range,
                y_range,
                z_range,
            } => rapier::GenericJointBuilder::new(JointAxesMask::LIN_AXES)
                .limits(JointAxis::AngX, x_range)
                .limits(JointAxis::AngY, y_range)
                .limits(JointAxis::AngZ, z_range),
        };

        builder
            .local_frame1(frame_a)
            .local_frame2(frame_b)
            .build()
    }
}

/// Scene-side joint component.
pub struct Joint {
    /// The scene node this component mirrors.
    pub node: NodeId,
    /// Component-level enable flag, independent of node activity.
    pub enabled: bool,
    /// Whether the owning node has completed scene registration.
    pub(crate) hosted: bool,
    pub(crate) body_a: BodyKey,
    pub(crate) body_b: Option<BodyKey>,
    pub(crate) kind: JointKind,
    pub(crate) local_frame_a: Isometry3<f32>,
    pub(crate) local_frame_b: Isometry3<f32>,
    /// Derive the connected frame from body poses at creation time.
    pub(crate) auto_configure: bool,
    /// Cached derived connected frame; cleared when invalidated.
    pub(crate) computed_frame_b: Option<Isometry3<f32>>,
    pub(crate) lifecycle: NativeLifecycle,
    pub(crate) world: WorldRef,
    pub(crate) id: JointId,
    /// Native configuration is stale and must be re-pushed.
    pub(crate) dirty: bool,
    /// Endpoint bodies changed; the native constraint cannot be updated in
    /// place and must be recreated against the new bodies.
    pub(crate) rebind: bool,
}

impl Joint {
    /// Create an unhosted joint between `body_a` and `body_b` (or the world
    /// when `body_b` is absent).
    pub fn new(node: NodeId, kind: JointKind, body_a: BodyKey, body_b: Option<BodyKey>) -> Self {
        Self {
            node,
            enabled: true,
            hosted: false,
            body_a,
            body_b,
            kind,
            local_frame_a: Isometry3::identity(),
            local_frame_b: Isometry3::identity(),
            auto_configure: true,
            computed_frame_b: None,
            lifecycle: NativeLifecycle::default(),
            world: WorldRef::invalid(),
            id: JointId::INVALID,
            dirty: false,
            rebind: false,
        }
    }

    /// Set the anchor frame on `body_a` before registration.
    pub fn with_frame_a(mut self, frame: Isometry3<f32>) -> Self {
        self.local_frame_a = frame;
        self
    }

    /// Author the connected frame explicitly, disabling auto-configuration.
    pub fn with_frame_b(mut self, frame: Isometry3<f32>) -> Self {
        self.local_frame_b = frame;
        self.auto_configure = false;
        self
    }

    /// Constraint flavor.
    pub fn kind(&self) -> &JointKind {
        &self.kind
    }

    /// First constrained body.
    pub fn body_a(&self) -> BodyKey {
        self.body_a
    }

    /// Second constrained body, absent for world-anchored joints.
    pub fn body_b(&self) -> Option<BodyKey> {
        self.body_b
    }

    /// Whether the connected frame is derived from body poses.
    pub fn auto_configure(&self) -> bool {
        self.auto_configure
    }

    /// Whether a native constraint currently exists.
    pub fn has_native(&self) -> bool {
        self.id.is_valid()
    }

    /// Change the constraint flavor.
    pub fn set_kind(&mut self, kind: JointKind) {
        self.kind = kind;
        self.dirty = true;
    }

    /// Change the anchor frame on `body_a`.
    pub fn set_frame_a(&mut self, frame: Isometry3<f32>) {
        self.local_frame_a = frame;
        self.computed_frame_b = None;
        self.dirty = true;
    }

    /// Author the connected frame, disabling auto-configuration.
    pub fn set_frame_b(&mut self, frame: Isometry3<f32>) {
        self.local_frame_b = frame;
        self.auto_configure = false;
        self.computed_frame_b = None;
        self.dirty = true;
    }

    /// Enable or disable connected-frame derivation.
    pub fn set_auto_configure(&mut self, auto: bool) {
        if self.auto_configure != auto {
            self.auto_configure = auto;
            self.computed_frame_b = None;
            self.dirty = true;
        }
    }

    /// Rebind the second body.
    ///
    /// The native engine fixes a constraint's endpoints at creation, so a
    /// live joint is torn down and recreated on the next flush rather than
    /// updated in place. Binding back onto `body_a` is rejected, same as at
    /// registration.
    pub fn set_body_b(&mut self, body: Option<BodyKey>) -> Result<()> {
        if body == Some(self.body_a) {
            return Err(PhysicsError::InvalidParameter(
                "joint cannot connect a body to itself".into(),
            ));
        }
        if self.body_b == body {
            return Ok(());
        }
        self.body_b = body;
        self.computed_frame_b = None;
        self.rebind = true;
        self.dirty = true;
        Ok(())
    }

    /// The connected frame to push: authored, cached, or freshly derived
    /// from the given body poses.
    pub(crate) fn connected_frame(
        &mut self,
        pose_a: Isometry3<f32>,
        pose_b: Isometry3<f32>,
    ) -> Isometry3<f32> {
        if !self.auto_configure {
            return self.local_frame_b;
        }
        if let Some(cached) = self.computed_frame_b {
            return cached;
        }
        let derived = pose_b.inverse() * (pose_a * self.local_frame_a);
        self.computed_frame_b = Some(derived);
        derived
    }

    /// Build the full native configuration for the given anchor frames.
    pub(crate) fn native_data(&self, frame_b: Isometry3<f32>) -> rapier::GenericJoint {
        self.kind.to_native(self.local_frame_a, frame_b)
    }

    /// Reject degenerate topology before any boundary call.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.body_a.is_null() {
            return Err(PhysicsError::InvalidParameter(
                "joint requires a first body".into(),
            ));
        }
        if self.body_b == Some(self.body_a) {
            return Err(PhysicsError::InvalidParameter(
                "joint cannot connect a body to itself".into(),
            ));
        }
        Ok(())
    }
}

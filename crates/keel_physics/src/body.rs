//! Rigid body component and its native bridge.
//!
//! A [`Rigidbody`] is the authored, scene-side description of a physical
//! actor. Its native counterpart is created and torn down on demand through
//! a [`BodyBridge`], which owns the handle and translates every property
//! write into a boundary call. While no native object exists, property
//! writes only update the stored options; they are pushed in aggregate the
//! next time the native body is created.

use crate::collider::ColliderKey;
use crate::error::{PhysicsError, Result};
use crate::handle::{RigidbodyHandle, WorldRef};
use crate::ids::{ChildColliderKey, ColliderId, RigidbodyId};
use crate::lifecycle::NativeLifecycle;
use crate::shape::ShapeRecord;
use keel_core::Handle;
use keel_scene::NodeId;
use rapier3d::na::{Isometry3, Vector3};
use rapier3d::prelude as rapier;
use serde::{Deserialize, Serialize};

/// Registry key for a [`Rigidbody`] component.
pub type BodyKey = Handle<Rigidbody>;

/// Per-axis motion locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FreezeFlags {
    /// Lock translation along X.
    pub translation_x: bool,
    /// Lock translation along Y.
    pub translation_y: bool,
    /// Lock translation along Z.
    pub translation_z: bool,
    /// Lock rotation around X.
    pub rotation_x: bool,
    /// Lock rotation around Y.
    pub rotation_y: bool,
    /// Lock rotation around Z.
    pub rotation_z: bool,
}

impl FreezeFlags {
    /// Nothing locked.
    pub const NONE: Self = Self {
        translation_x: false,
        translation_y: false,
        translation_z: false,
        rotation_x: false,
        rotation_y: false,
        rotation_z: false,
    };

    /// All rotation locked.
    pub const ROTATION: Self = Self {
        translation_x: false,
        translation_y: false,
        translation_z: false,
        rotation_x: true,
        rotation_y: true,
        rotation_z: true,
    };

    pub(crate) fn to_native(self) -> rapier::LockedAxes {
        let mut axes = rapier::LockedAxes::empty();
        if self.translation_x {
            axes |= rapier::LockedAxes::TRANSLATION_LOCKED_X;
        }
        if self.translation_y {
            axes |= rapier::LockedAxes::TRANSLATION_LOCKED_Y;
        }
        if self.translation_z {
            axes |= rapier::LockedAxes::TRANSLATION_LOCKED_Z;
        }
        if self.rotation_x {
            axes |= rapier::LockedAxes::ROTATION_LOCKED_X;
        }
        if self.rotation_y {
            axes |= rapier::LockedAxes::ROTATION_LOCKED_Y;
        }
        if self.rotation_z {
            axes |= rapier::LockedAxes::ROTATION_LOCKED_Z;
        }
        axes
    }
}

/// How a native actor participates in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionKind {
    /// Never moves; infinite mass.
    Static,
    /// Fully simulated.
    Dynamic,
    /// Moved by pose writes; pushes dynamic bodies but is not pushed.
    Kinematic,
}

/// Dynamic-state options carried by a [`Rigidbody`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DynamicOptions {
    /// Body mass in kilograms.
    pub mass: f32,
    /// Whether gravity affects the body.
    pub gravity_enabled: bool,
    /// Whether the body is kinematic rather than dynamic.
    pub kinematic: bool,
    /// Linear damping coefficient.
    pub linear_damping: f32,
    /// Angular damping coefficient.
    pub angular_damping: f32,
    /// Per-axis motion locks.
    pub freeze: FreezeFlags,
    /// Cap on linear speed, enforced after each substep.
    pub max_linear_velocity: f32,
    /// Cap on angular speed, enforced after each substep.
    pub max_angular_velocity: f32,
    /// Normalized speed threshold below which the body may sleep.
    /// Negative keeps the body permanently awake.
    pub sleep_threshold: f32,
    /// Optional local center-of-mass override.
    pub center_of_mass: Option<[f32; 3]>,
}

impl Default for DynamicOptions {
    fn default() -> Self {
        Self {
            mass: 1.0,
            gravity_enabled: true,
            kinematic: false,
            linear_damping: 0.0,
            angular_damping: 0.05,
            freeze: FreezeFlags::NONE,
            max_linear_velocity: f32::INFINITY,
            max_angular_velocity: f32::INFINITY,
            sleep_threshold: 0.1,
            center_of_mass: None,
        }
    }
}

/// Everything needed to create one native actor in a single boundary call.
#[derive(Clone)]
pub struct ActorOptions {
    /// Simulation participation.
    pub motion: MotionKind,
    /// Initial world-space pose.
    pub pose: Isometry3<f32>,
    /// Dynamic-state options (ignored for static actors).
    pub dynamics: DynamicOptions,
    /// Shapes attached at creation, in order.
    pub shapes: Vec<ShapeRecord>,
}

/// Owns one native body and turns property writes into boundary calls.
#[derive(Debug, Clone)]
pub struct BodyBridge {
    handle: RigidbodyHandle,
}

impl BodyBridge {
    /// Create the native actor and bridge it.
    pub fn create(
        world: &WorldRef,
        options: &ActorOptions,
    ) -> Result<(Self, Vec<ChildColliderKey>)> {
        let (id, keys) = world.with(|w| w.add_actor(options))?;
        let bridge = Self {
            handle: RigidbodyHandle::new(world.clone(), id),
        };
        if let Some(com) = options.dynamics.center_of_mass {
            bridge.set_center_of_mass(Vector3::new(com[0], com[1], com[2]), options.dynamics.mass)?;
        }
        Ok((bridge, keys))
    }

    /// Remove the native actor. A disposed world counts as already removed.
    pub fn destroy(&self) -> Result<bool> {
        match self
            .handle
            .world()
            .with(|w| w.remove_actor(self.handle.id()))
        {
            Err(PhysicsError::WorldDisposed) => Ok(false),
            other => other,
        }
    }

    /// The bound native body.
    pub fn handle(&self) -> &RigidbodyHandle {
        &self.handle
    }

    /// The native body identity.
    pub fn id(&self) -> RigidbodyId {
        self.handle.id()
    }

    fn with<R>(&self, f: impl FnOnce(&mut crate::world::PhysicsWorld) -> Result<R>) -> Result<R> {
        self.handle.world().with(f)
    }

    /// Attach one shape, returning its composite attachment identity.
    pub fn attach_shape(&self, record: &ShapeRecord) -> Result<ColliderId> {
        let key = self.with(|w| w.attach_shape(self.handle.id(), record))?;
        Ok(ColliderId {
            body: self.handle.id(),
            key,
        })
    }

    /// Detach one shape. `Ok(false)` when already detached or the world is
    /// gone.
    pub fn detach_shape(&self, id: ColliderId) -> Result<bool> {
        match self.with(|w| w.detach_shape(id)) {
            Err(PhysicsError::WorldDisposed) => Ok(false),
            other => other,
        }
    }

    /// Push a rebuilt shape record over an existing attachment.
    pub fn update_shape(&self, id: ColliderId, record: &ShapeRecord) -> Result<()> {
        self.with(|w| w.update_shape(id, record))
    }

    /// Enable or disable one attached shape.
    pub fn set_shape_enabled(&self, id: ColliderId, enabled: bool) -> Result<()> {
        self.with(|w| w.set_shape_enabled(id, enabled))
    }

    /// Switch between kinematic and dynamic motion.
    ///
    /// Switching to dynamic re-pushes every dynamic-state property, since the
    /// native engine resets them when the motion kind changes.
    pub fn set_kinematic(&self, kinematic: bool, dynamics: &DynamicOptions) -> Result<()> {
        let id = self.handle.id();
        self.with(|w| {
            w.set_motion(
                id,
                if kinematic {
                    MotionKind::Kinematic
                } else {
                    MotionKind::Dynamic
                },
            )?;
            if !kinematic {
                w.set_mass(id, dynamics.mass)?;
                w.set_freeze(id, dynamics.freeze)?;
                w.set_gravity_enabled(id, dynamics.gravity_enabled)?;
                w.set_damping(id, dynamics.linear_damping, dynamics.angular_damping)?;
                w.set_velocity_limits(
                    id,
                    dynamics.max_linear_velocity,
                    dynamics.max_angular_velocity,
                )?;
                w.set_sleep_threshold(id, dynamics.sleep_threshold)?;
            }
            Ok(())
        })
    }

    /// Set body mass.
    pub fn set_mass(&self, mass: f32) -> Result<()> {
        self.with(|w| w.set_mass(self.handle.id(), mass))
    }

    /// Override the local center of mass.
    pub fn set_center_of_mass(&self, com: Vector3<f32>, mass: f32) -> Result<()> {
        self.with(|w| w.set_center_of_mass(self.handle.id(), com, mass))
    }

    /// Enable or disable gravity.
    pub fn set_gravity_enabled(&self, enabled: bool) -> Result<()> {
        self.with(|w| w.set_gravity_enabled(self.handle.id(), enabled))
    }

    /// Set damping coefficients.
    pub fn set_damping(&self, linear: f32, angular: f32) -> Result<()> {
        self.with(|w| w.set_damping(self.handle.id(), linear, angular))
    }

    /// Set per-axis motion locks.
    pub fn set_freeze(&self, freeze: FreezeFlags) -> Result<()> {
        self.with(|w| w.set_freeze(self.handle.id(), freeze))
    }

    /// Set velocity caps.
    pub fn set_velocity_limits(&self, max_linear: f32, max_angular: f32) -> Result<()> {
        self.with(|w| w.set_velocity_limits(self.handle.id(), max_linear, max_angular))
    }

    /// Set the sleep threshold.
    pub fn set_sleep_threshold(&self, threshold: f32) -> Result<()> {
        self.with(|w| w.set_sleep_threshold(self.handle.id(), threshold))
    }

    /// Enable or disable collision detection for all attached shapes.
    pub fn set_detect_collisions(&self, enabled: bool) -> Result<()> {
        self.with(|w| w.set_detect_collisions(self.handle.id(), enabled))
    }
}

/// Scene-side rigid body component.
pub struct Rigidbody {
    /// The scene node this component mirrors.
    pub node: NodeId,
    /// Component-level enable flag, independent of node activity.
    pub enabled: bool,
    /// Whether the owning node has completed scene registration.
    pub(crate) hosted: bool,
    /// Whether attached shapes report collisions at all.
    pub(crate) detect_collisions: bool,
    /// Authored dynamic state.
    pub(crate) dynamics: DynamicOptions,
    /// Native lifecycle tracking.
    pub(crate) lifecycle: NativeLifecycle,
    /// Bridge to the native actor, present only while one exists.
    pub(crate) bridge: Option<BodyBridge>,
    /// Colliders currently attached to this body.
    pub(crate) children: Vec<ColliderKey>,
}

impl Rigidbody {
    /// Create an unhosted body component for a node.
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            enabled: true,
            hosted: false,
            detect_collisions: true,
            dynamics: DynamicOptions::default(),
            lifecycle: NativeLifecycle::default(),
            bridge: None,
            children: Vec::new(),
        }
    }

    /// Set mass before registration.
    pub fn with_mass(mut self, mass: f32) -> Self {
        self.dynamics.mass = mass.max(1e-6);
        self
    }

    /// Mark kinematic before registration.
    pub fn with_kinematic(mut self, kinematic: bool) -> Self {
        self.dynamics.kinematic = kinematic;
        self
    }

    /// Set motion locks before registration.
    pub fn with_freeze(mut self, freeze: FreezeFlags) -> Self {
        self.dynamics.freeze = freeze;
        self
    }

    /// Authored dynamic state.
    pub fn dynamics(&self) -> &DynamicOptions {
        &self.dynamics
    }

    /// Whether a native actor currently exists.
    pub fn has_native(&self) -> bool {
        self.bridge.is_some()
    }

    /// The native body identity, if one exists.
    pub fn native_id(&self) -> Option<RigidbodyId> {
        self.bridge.as_ref().map(|b| b.id())
    }

    /// The bridge, if a native actor exists.
    pub fn bridge(&self) -> Option<&BodyBridge> {
        self.bridge.as_ref()
    }

    /// Whether the body is kinematic.
    pub fn is_kinematic(&self) -> bool {
        self.dynamics.kinematic
    }

    /// Whether attached shapes report collisions.
    pub fn detect_collisions(&self) -> bool {
        self.detect_collisions
    }

    /// Keys of colliders attached to this body.
    pub fn attached_colliders(&self) -> &[ColliderKey] {
        &self.children
    }

    /// Aggregate creation options at the given pose.
    pub(crate) fn actor_options(&self, pose: Isometry3<f32>) -> ActorOptions {
        ActorOptions {
            motion: if self.dynamics.kinematic {
                MotionKind::Kinematic
            } else {
                MotionKind::Dynamic
            },
            pose,
            dynamics: self.dynamics,
            shapes: Vec::new(),
        }
    }

    /// Set mass, pushing to the native actor when one exists.
    pub fn set_mass(&mut self, mass: f32) -> Result<()> {
        if !(mass > 0.0) {
            return Err(PhysicsError::InvalidParameter(format!(
                "mass must be positive, got {mass}"
            )));
        }
        self.dynamics.mass = mass;
        if let Some(bridge) = &self.bridge {
            bridge.set_mass(mass)?;
        }
        Ok(())
    }

    /// Override the local center of mass.
    pub fn set_center_of_mass(&mut self, com: Vector3<f32>) -> Result<()> {
        self.dynamics.center_of_mass = Some([com.x, com.y, com.z]);
        if let Some(bridge) = &self.bridge {
            bridge.set_center_of_mass(com, self.dynamics.mass)?;
        }
        Ok(())
    }

    /// Enable or disable gravity.
    pub fn set_gravity_enabled(&mut self, enabled: bool) -> Result<()> {
        self.dynamics.gravity_enabled = enabled;
        if let Some(bridge) = &self.bridge {
            bridge.set_gravity_enabled(enabled)?;
        }
        Ok(())
    }

    /// Set damping coefficients.
    pub fn set_damping(&mut self, linear: f32, angular: f32) -> Result<()> {
        if linear < 0.0 || angular < 0.0 {
            return Err(PhysicsError::InvalidParameter(
                "damping must be non-negative".into(),
            ));
        }
        self.dynamics.linear_damping = linear;
        self.dynamics.angular_damping = angular;
        if let Some(bridge) = &self.bridge {
            bridge.set_damping(linear, angular)?;
        }
        Ok(())
    }

    /// Set per-axis motion locks.
    pub fn set_freeze(&mut self, freeze: FreezeFlags) -> Result<()> {
        self.dynamics.freeze = freeze;
        if let Some(bridge) = &self.bridge {
            bridge.set_freeze(freeze)?;
        }
        Ok(())
    }

    /// Set velocity caps.
    pub fn set_velocity_limits(&mut self, max_linear: f32, max_angular: f32) -> Result<()> {
        if max_linear <= 0.0 || max_angular <= 0.0 {
            return Err(PhysicsError::InvalidParameter(
                "velocity limits must be positive".into(),
            ));
        }
        self.dynamics.max_linear_velocity = max_linear;
        self.dynamics.max_angular_velocity = max_angular;
        if let Some(bridge) = &self.bridge {
            bridge.set_velocity_limits(max_linear, max_angular)?;
        }
        Ok(())
    }

    /// Set the sleep threshold. Negative keeps the body permanently awake.
    pub fn set_sleep_threshold(&mut self, threshold: f32) -> Result<()> {
        self.dynamics.sleep_threshold = threshold;
        if let Some(bridge) = &self.bridge {
            bridge.set_sleep_threshold(threshold)?;
        }
        Ok(())
    }

    /// Set linear velocity on the native actor.
    pub fn set_linear_velocity(&self, velocity: Vector3<f32>) -> Result<()> {
        match &self.bridge {
            Some(bridge) => bridge.handle().set_linear_velocity(velocity),
            None => Ok(()),
        }
    }

    /// Linear velocity of the native actor, zero when none exists.
    pub fn linear_velocity(&self) -> Result<Vector3<f32>> {
        match &self.bridge {
            Some(bridge) => bridge.handle().linear_velocity(),
            None => Ok(Vector3::zeros()),
        }
    }

    /// Set angular velocity on the native actor.
    pub fn set_angular_velocity(&self, velocity: Vector3<f32>) -> Result<()> {
        match &self.bridge {
            Some(bridge) => bridge.handle().set_angular_velocity(velocity),
            None => Ok(()),
        }
    }

    /// Angular velocity of the native actor, zero when none exists.
    pub fn angular_velocity(&self) -> Result<Vector3<f32>> {
        match &self.bridge {
            Some(bridge) => bridge.handle().angular_velocity(),
            None => Ok(Vector3::zeros()),
        }
    }

    /// Whether the native actor is asleep.
    pub fn is_sleeping(&self) -> Result<bool> {
        match &self.bridge {
            Some(bridge) => bridge.handle().is_sleeping(),
            None => Ok(false),
        }
    }

    /// Wake the native actor.
    pub fn wake(&self) -> Result<()> {
        match &self.bridge {
            Some(bridge) => bridge.handle().wake(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freeze_flags_map_to_locked_axes() {
        assert!(FreezeFlags::NONE.to_native().is_empty());

        let locked = FreezeFlags {
            translation_y: true,
            rotation_x: true,
            rotation_z: true,
            ..FreezeFlags::NONE
        }
        .to_native();
        assert!(locked.contains(rapier::LockedAxes::TRANSLATION_LOCKED_Y));
        assert!(locked.contains(rapier::LockedAxes::ROTATION_LOCKED_X));
        assert!(locked.contains(rapier::LockedAxes::ROTATION_LOCKED_Z));
        assert!(!locked.contains(rapier::LockedAxes::TRANSLATION_LOCKED_X));
    }

    #[test]
    fn invalid_parameters_rejected_before_any_boundary_call() {
        let mut body = Rigidbody::new(NodeId::null());
        assert!(body.set_mass(0.0).is_err());
        assert!(body.set_mass(-1.0).is_err());
        assert!(body.set_damping(-0.1, 0.0).is_err());
        assert!(body.set_velocity_limits(0.0, 1.0).is_err());

        // Stored state unchanged by rejected writes.
        assert!((body.dynamics.mass - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn writes_without_native_update_stored_options() {
        let mut body = Rigidbody::new(NodeId::null());
        body.set_mass(4.0).unwrap();
        body.set_gravity_enabled(false).unwrap();
        body.set_sleep_threshold(-1.0).unwrap();

        assert!((body.dynamics.mass - 4.0).abs() < f32::EPSILON);
        assert!(!body.dynamics.gravity_enabled);
        assert!(body.dynamics.sleep_threshold < 0.0);
        assert!(!body.has_native());
    }
}

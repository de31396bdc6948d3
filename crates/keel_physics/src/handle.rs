//! Weak references into a native world.
//!
//! A [`WorldRef`] pairs a weak pointer to the shared world with the world's
//! identity. Every boundary call goes through [`WorldRef::with`], which fails
//! with [`PhysicsError::WorldDisposed`] once the world has been dropped or
//! replaced, so stale component state can never touch a recycled world.

use crate::error::{PhysicsError, Result};
use crate::ids::{RigidbodyId, WorldId};
use crate::world::{PhysicsWorld, SharedWorld};
use parking_lot::Mutex;
use rapier3d::na::{Isometry3, Vector3};
use std::sync::Weak;

/// Weak, identity-checked reference to a native world.
#[derive(Clone)]
pub struct WorldRef {
    world: Weak<Mutex<PhysicsWorld>>,
    id: WorldId,
}

impl WorldRef {
    /// Reference an existing shared world.
    pub fn new(world: &SharedWorld) -> Self {
        let id = world.lock().id();
        Self {
            world: std::sync::Arc::downgrade(world),
            id,
        }
    }

    /// A reference that resolves to nothing.
    pub fn invalid() -> Self {
        Self {
            world: Weak::new(),
            id: WorldId::INVALID,
        }
    }

    /// The identity of the referenced world.
    pub fn world_id(&self) -> WorldId {
        self.id
    }

    /// Whether the referenced world is still alive.
    pub fn is_valid(&self) -> bool {
        match self.world.upgrade() {
            Some(world) => world.lock().id() == self.id,
            None => false,
        }
    }

    /// Run a closure against the live world, or fail with `WorldDisposed`.
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut PhysicsWorld) -> Result<R>) -> Result<R> {
        let world = self.world.upgrade().ok_or(PhysicsError::WorldDisposed)?;
        let mut guard = world.lock();
        if guard.id() != self.id {
            return Err(PhysicsError::WorldDisposed);
        }
        f(&mut guard)
    }
}

impl std::fmt::Debug for WorldRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldRef").field("id", &self.id).finish()
    }
}

/// A native body bound to the world that owns it.
///
/// All mutators pass straight through to the native world and propagate
/// boundary failures to the caller.
#[derive(Debug, Clone)]
pub struct RigidbodyHandle {
    world: WorldRef,
    id: RigidbodyId,
}

impl RigidbodyHandle {
    /// Bind a native body id to its owning world.
    pub fn new(world: WorldRef, id: RigidbodyId) -> Self {
        Self { world, id }
    }

    /// The native body identity.
    pub fn id(&self) -> RigidbodyId {
        self.id
    }

    /// The owning world reference.
    pub fn world(&self) -> &WorldRef {
        &self.world
    }

    /// World-space pose.
    pub fn pose(&self) -> Result<Isometry3<f32>> {
        self.world.with(|w| w.pose(self.id))
    }

    /// Set the world-space pose.
    pub fn set_pose(&self, pose: Isometry3<f32>) -> Result<()> {
        self.world.with(|w| w.set_pose(self.id, pose))
    }

    /// Linear velocity.
    pub fn linear_velocity(&self) -> Result<Vector3<f32>> {
        self.world.with(|w| w.linear_velocity(self.id))
    }

    /// Set linear velocity.
    pub fn set_linear_velocity(&self, velocity: Vector3<f32>) -> Result<()> {
        self.world.with(|w| w.set_linear_velocity(self.id, velocity))
    }

    /// Angular velocity.
    pub fn angular_velocity(&self) -> Result<Vector3<f32>> {
        self.world.with(|w| w.angular_velocity(self.id))
    }

    /// Set angular velocity.
    pub fn set_angular_velocity(&self, velocity: Vector3<f32>) -> Result<()> {
        self.world.with(|w| w.set_angular_velocity(self.id, velocity))
    }

    /// Whether the body is asleep.
    pub fn is_sleeping(&self) -> Result<bool> {
        self.world.with(|w| w.is_sleeping(self.id))
    }

    /// Wake the body.
    pub fn wake(&self) -> Result<()> {
        self.world.with(|w| w.wake(self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicsConfig;

    #[test]
    fn disposed_world_is_reported() {
        let world = PhysicsWorld::new_shared(PhysicsConfig::default());
        let reference = WorldRef::new(&world);
        assert!(reference.is_valid());

        drop(world);
        assert!(!reference.is_valid());
        let err = reference.with(|_| Ok(())).unwrap_err();
        assert!(matches!(err, PhysicsError::WorldDisposed));
    }

    #[test]
    fn invalid_reference_never_resolves() {
        let reference = WorldRef::invalid();
        assert!(!reference.is_valid());
        assert!(reference.with(|_| Ok(())).is_err());
    }
}

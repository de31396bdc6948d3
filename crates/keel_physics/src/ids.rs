//! Opaque identity types for native simulation objects.
//!
//! Each identity is a small value type comparing by its integer payload and
//! carrying an explicit invalid sentinel. They say nothing about liveness:
//! resolving one is always a fallible boundary call.

use rapier3d::prelude as rapier;

fn pack(index: u32, generation: u32) -> u64 {
    (u64::from(index) << 32) | u64::from(generation)
}

fn unpack(bits: u64) -> (u32, u32) {
    ((bits >> 32) as u32, bits as u32)
}

/// Identity of one native simulation world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorldId(pub(crate) u32);

impl WorldId {
    /// Invalid sentinel.
    pub const INVALID: Self = Self(u32::MAX);

    /// Whether this id is not the invalid sentinel.
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

/// Opaque handle to one native rigid body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RigidbodyId(u64);

impl RigidbodyId {
    /// Invalid sentinel.
    pub const INVALID: Self = Self(u64::MAX);

    /// Whether this id is not the invalid sentinel.
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    pub(crate) fn from_native(handle: rapier::RigidBodyHandle) -> Self {
        let (index, generation) = handle.into_raw_parts();
        Self(pack(index, generation))
    }

    pub(crate) fn to_native(self) -> rapier::RigidBodyHandle {
        let (index, generation) = unpack(self.0);
        rapier::RigidBodyHandle::from_raw_parts(index, generation)
    }
}

/// Opaque per-body slot key for one attached shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChildColliderKey(u64);

impl ChildColliderKey {
    /// Invalid sentinel.
    pub const INVALID: Self = Self(u64::MAX);

    /// Whether this key is not the invalid sentinel.
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    pub(crate) fn from_native(handle: rapier::ColliderHandle) -> Self {
        let (index, generation) = handle.into_raw_parts();
        Self(pack(index, generation))
    }

    pub(crate) fn to_native(self) -> rapier::ColliderHandle {
        let (index, generation) = unpack(self.0);
        rapier::ColliderHandle::from_raw_parts(index, generation)
    }
}

/// Composite identity of one attached collider: owning body plus shape slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColliderId {
    /// The native body the shape is attached to.
    pub body: RigidbodyId,
    /// The per-body shape slot.
    pub key: ChildColliderKey,
}

impl ColliderId {
    /// Invalid sentinel.
    pub const INVALID: Self = Self {
        body: RigidbodyId::INVALID,
        key: ChildColliderKey::INVALID,
    };

    /// An attachment exists exactly when the shape slot key is valid.
    pub fn is_valid(&self) -> bool {
        self.key.is_valid()
    }
}

/// Opaque handle to one native joint constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JointId(u64);

impl JointId {
    /// Invalid sentinel.
    pub const INVALID: Self = Self(u64::MAX);

    /// Whether this id is not the invalid sentinel.
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    pub(crate) fn from_native(handle: rapier::ImpulseJointHandle) -> Self {
        let (index, generation) = handle.into_raw_parts();
        Self(pack(index, generation))
    }

    pub(crate) fn to_native(self) -> rapier::ImpulseJointHandle {
        let (index, generation) = unpack(self.0);
        rapier::ImpulseJointHandle::from_raw_parts(index, generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_are_invalid() {
        assert!(!WorldId::INVALID.is_valid());
        assert!(!RigidbodyId::INVALID.is_valid());
        assert!(!ChildColliderKey::INVALID.is_valid());
        assert!(!ColliderId::INVALID.is_valid());
        assert!(!JointId::INVALID.is_valid());
    }

    #[test]
    fn native_round_trip() {
        let native = rapier::RigidBodyHandle::from_raw_parts(42, 7);
        let id = RigidbodyId::from_native(native);
        assert!(id.is_valid());
        assert_eq!(id.to_native(), native);
    }

    #[test]
    fn collider_id_validity_follows_child_key() {
        let id = ColliderId {
            body: RigidbodyId::from_native(rapier::RigidBodyHandle::from_raw_parts(1, 1)),
            key: ChildColliderKey::INVALID,
        };
        assert!(!id.is_valid());
    }
}

//! Dense pose mirror for awake dynamic bodies.
//!
//! Poses read back after each step land in this array; consumers walk it
//! linearly instead of chasing native handles. Membership is maintained
//! incrementally: bodies enter when they become dynamic or wake up, and
//! leave by swap-removal when they sleep, turn kinematic, or are destroyed,
//! so the dense part never contains holes.

use crate::error::{PhysicsError, Result};
use crate::ids::RigidbodyId;
use rapier3d::na::Isometry3;
use std::collections::HashMap;

const INITIAL_CAPACITY: usize = 64;

/// Dense `(body, pose)` array with O(1) membership changes.
pub struct TransformAccessArray {
    poses: Vec<Isometry3<f32>>,
    ids: Vec<RigidbodyId>,
    slots: HashMap<RigidbodyId, usize>,
    disposed: bool,
}

impl TransformAccessArray {
    /// Create an empty array.
    pub fn new() -> Self {
        Self {
            poses: Vec::new(),
            ids: Vec::new(),
            slots: HashMap::new(),
            disposed: false,
        }
    }

    fn ensure_capacity(&mut self) {
        if self.ids.len() == self.ids.capacity() {
            let grow = if self.ids.capacity() == 0 {
                INITIAL_CAPACITY
            } else {
                self.ids.capacity()
            };
            self.ids.reserve_exact(grow);
            self.poses.reserve_exact(grow);
        }
    }

    /// Insert a body with its current pose.
    ///
    /// Re-inserting a present body just overwrites its pose.
    pub fn insert(&mut self, id: RigidbodyId, pose: Isometry3<f32>) -> Result<()> {
        if self.disposed {
            return Err(PhysicsError::ArrayDisposed);
        }
        if let Some(&slot) = self.slots.get(&id) {
            self.poses[slot] = pose;
            return Ok(());
        }
        self.ensure_capacity();
        self.slots.insert(id, self.ids.len());
        self.ids.push(id);
        self.poses.push(pose);
        Ok(())
    }

    /// Insert unless already present; reports whether a slot was added.
    pub fn try_insert(&mut self, id: RigidbodyId, pose: Isometry3<f32>) -> Result<bool> {
        if self.disposed {
            return Err(PhysicsError::ArrayDisposed);
        }
        if self.slots.contains_key(&id) {
            return Ok(false);
        }
        self.insert(id, pose)?;
        Ok(true)
    }

    /// Remove a body by swapping the last slot into its place.
    ///
    /// Returns whether the body was present. Safe on a disposed array.
    pub fn remove(&mut self, id: RigidbodyId) -> bool {
        let Some(slot) = self.slots.remove(&id) else {
            return false;
        };
        self.ids.swap_remove(slot);
        self.poses.swap_remove(slot);
        if let Some(&moved) = self.ids.get(slot) {
            self.slots.insert(moved, slot);
        }
        true
    }

    /// Whether a body occupies a slot.
    pub fn contains(&self, id: RigidbodyId) -> bool {
        self.slots.contains_key(&id)
    }

    /// Pose of a body, if present.
    pub fn pose(&self, id: RigidbodyId) -> Option<&Isometry3<f32>> {
        self.slots.get(&id).map(|&slot| &self.poses[slot])
    }

    /// Overwrite the pose of a present body.
    pub fn set_pose(&mut self, id: RigidbodyId, pose: Isometry3<f32>) -> bool {
        match self.slots.get(&id) {
            Some(&slot) => {
                self.poses[slot] = pose;
                true
            }
            None => false,
        }
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the array is empty.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Iterate over `(body, pose)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (RigidbodyId, &Isometry3<f32>)> {
        self.ids.iter().copied().zip(self.poses.iter())
    }

    /// Drop all slots and refuse further insertions.
    pub fn dispose(&mut self) {
        self.disposed = true;
        self.ids.clear();
        self.poses.clear();
        self.slots.clear();
    }

    /// Whether the array has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl Default for TransformAccessArray {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapier3d::prelude as rapier;

    fn id(index: u32) -> RigidbodyId {
        RigidbodyId::from_native(rapier::RigidBodyHandle::from_raw_parts(index, 1))
    }

    fn pose(x: f32) -> Isometry3<f32> {
        Isometry3::translation(x, 0.0, 0.0)
    }

    #[test]
    fn swap_removal_keeps_the_array_dense_and_mapped() {
        let mut array = TransformAccessArray::new();
        for i in 0..4 {
            array.insert(id(i), pose(i as f32)).unwrap();
        }

        // Removing from the middle moves the last slot down.
        assert!(array.remove(id(1)));
        assert_eq!(array.len(), 3);
        assert_eq!(array.pose(id(3)).unwrap().translation.vector.x, 3.0);
        assert_eq!(array.pose(id(0)).unwrap().translation.vector.x, 0.0);
        assert!(!array.contains(id(1)));

        // The moved body's slot stays valid for further removal.
        assert!(array.remove(id(3)));
        assert_eq!(array.len(), 2);
    }

    #[test]
    fn reinsert_overwrites_pose_without_duplicating() {
        let mut array = TransformAccessArray::new();
        array.insert(id(0), pose(1.0)).unwrap();
        array.insert(id(0), pose(2.0)).unwrap();

        assert_eq!(array.len(), 1);
        assert_eq!(array.pose(id(0)).unwrap().translation.vector.x, 2.0);
        assert!(!array.try_insert(id(0), pose(3.0)).unwrap());
    }

    #[test]
    fn disposed_array_rejects_insertions_but_tolerates_removal() {
        let mut array = TransformAccessArray::new();
        array.insert(id(0), pose(0.0)).unwrap();
        array.dispose();

        assert!(matches!(
            array.insert(id(1), pose(1.0)),
            Err(PhysicsError::ArrayDisposed)
        ));
        assert!(!array.remove(id(0)));
        assert!(array.is_empty());
    }
}

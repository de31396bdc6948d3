//! Component registries and identity resolution.
//!
//! One [`PhysicsContext`] owns every physics component in a scene, keyed by
//! generational handles. It also owns the maps that turn native attachment
//! identities back into components when events arrive, including a grace
//! buffer for colliders torn down while their last events are still in
//! flight: a detached identity keeps resolving for exactly one more pass.

use crate::body::{BodyKey, Rigidbody};
use crate::collider::{Collider, ColliderKey};
use crate::ids::ColliderId;
use crate::joint::{Joint, JointKey};
use crate::transform_array::TransformAccessArray;
use keel_core::Arena;
use keel_scene::NodeId;
use log::debug;
use std::collections::HashMap;

/// Components bound to one scene node.
#[derive(Default)]
pub(crate) struct NodeBinding {
    pub(crate) body: Option<BodyKey>,
    pub(crate) colliders: Vec<ColliderKey>,
    pub(crate) joints: Vec<JointKey>,
}

/// Owner of all physics components and their native identity maps.
#[derive(Default)]
pub struct PhysicsContext {
    pub(crate) bodies: Arena<Rigidbody>,
    pub(crate) colliders: Arena<Collider>,
    pub(crate) joints: Arena<Joint>,
    pub(crate) bindings: HashMap<NodeId, NodeBinding>,

    /// Live attachment identities.
    attachments: HashMap<ColliderId, ColliderKey>,
    /// Recently detached identities, stamped with the pass they died in.
    unregistering: HashMap<ColliderId, (ColliderKey, u64)>,
    /// Bodies whose native actor was created before their node finished
    /// registration; swept if the host never materializes.
    pub(crate) unhosted_bodies: Vec<BodyKey>,

    pub(crate) transforms: TransformAccessArray,
    tick: u64,
}

impl PhysicsContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Component access ====================

    /// Borrow a body component.
    pub fn body(&self, key: BodyKey) -> Option<&Rigidbody> {
        self.bodies.get(key)
    }

    /// Mutably borrow a body component.
    pub fn body_mut(&mut self, key: BodyKey) -> Option<&mut Rigidbody> {
        self.bodies.get_mut(key)
    }

    /// Borrow a collider component.
    pub fn collider(&self, key: ColliderKey) -> Option<&Collider> {
        self.colliders.get(key)
    }

    /// Mutably borrow a collider component.
    pub fn collider_mut(&mut self, key: ColliderKey) -> Option<&mut Collider> {
        self.colliders.get_mut(key)
    }

    /// Borrow a joint component.
    pub fn joint(&self, key: JointKey) -> Option<&Joint> {
        self.joints.get(key)
    }

    /// Mutably borrow a joint component.
    pub fn joint_mut(&mut self, key: JointKey) -> Option<&mut Joint> {
        self.joints.get_mut(key)
    }

    /// Number of registered body components.
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Number of registered collider components.
    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    /// Number of registered joint components.
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// The dense pose mirror maintained across steps.
    pub fn transforms(&self) -> &TransformAccessArray {
        &self.transforms
    }

    // ==================== Node bindings ====================

    pub(crate) fn binding_mut(&mut self, node: NodeId) -> &mut NodeBinding {
        self.bindings.entry(node).or_default()
    }

    /// The body component bound to a node, if any.
    pub fn body_of_node(&self, node: NodeId) -> Option<BodyKey> {
        self.bindings.get(&node).and_then(|b| b.body)
    }

    /// Collider components bound to a node.
    pub fn colliders_of_node(&self, node: NodeId) -> &[ColliderKey] {
        self.bindings
            .get(&node)
            .map(|b| b.colliders.as_slice())
            .unwrap_or(&[])
    }

    /// Joint components bound to a node.
    pub fn joints_of_node(&self, node: NodeId) -> &[JointKey] {
        self.bindings
            .get(&node)
            .map(|b| b.joints.as_slice())
            .unwrap_or(&[])
    }

    // ==================== Attachment identity ====================

    pub(crate) fn register_attachment(&mut self, id: ColliderId, key: ColliderKey) {
        self.attachments.insert(id, key);
    }

    /// Move an attachment identity into the grace buffer.
    pub(crate) fn begin_unregistering(&mut self, id: ColliderId, key: ColliderKey) {
        if self.attachments.remove(&id).is_some() {
            self.unregistering.insert(id, (key, self.tick));
        }
    }

    /// Resolve a native attachment identity to its component.
    ///
    /// Identities in the grace buffer still resolve; anything else is a
    /// late event for an object gone longer than one pass.
    pub fn resolve_collider(&self, id: ColliderId) -> Option<ColliderKey> {
        if let Some(&key) = self.attachments.get(&id) {
            return Some(key);
        }
        if let Some(&(key, _)) = self.unregistering.get(&id) {
            return Some(key);
        }
        debug!("event for unknown attachment {id:?} dropped");
        None
    }

    /// Drop grace-buffer entries that have survived one full pass, then
    /// open the next pass.
    pub(crate) fn housekeep(&mut self) {
        let tick = self.tick;
        self.unregistering.retain(|_, &mut (_, stamp)| stamp >= tick);
        self.tick += 1;
    }

    /// Drop every component and identity map.
    ///
    /// Native teardown is the caller's job; this only forgets the mirrors,
    /// so it is safe to call after the world itself is gone.
    pub(crate) fn forget_all(&mut self) {
        self.bodies.clear();
        self.colliders.clear();
        self.joints.clear();
        self.bindings.clear();
        self.attachments.clear();
        self.unregistering.clear();
        self.unhosted_bodies.clear();
        self.transforms.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{ChildColliderKey, RigidbodyId};
    use crate::shape::ShapeKind;
    use rapier3d::prelude as rapier;

    fn attachment_id(index: u32) -> ColliderId {
        ColliderId {
            body: RigidbodyId::from_native(rapier::RigidBodyHandle::from_raw_parts(index, 1)),
            key: ChildColliderKey::from_native(rapier::ColliderHandle::from_raw_parts(index, 1)),
        }
    }

    #[test]
    fn detached_identity_resolves_for_exactly_one_pass() {
        let mut ctx = PhysicsContext::new();
        let key = ctx.colliders.insert(Collider::new(NodeId::null(), ShapeKind::default()));
        let id = attachment_id(0);

        ctx.register_attachment(id, key);
        assert_eq!(ctx.resolve_collider(id), Some(key));

        // Detach during pass 0; events of this pass still resolve.
        ctx.begin_unregistering(id, key);
        assert_eq!(ctx.resolve_collider(id), Some(key));

        // End of pass 0: the entry survives its own pass.
        ctx.housekeep();
        assert_eq!(ctx.resolve_collider(id), Some(key));

        // End of pass 1: gone.
        ctx.housekeep();
        assert_eq!(ctx.resolve_collider(id), None);
    }

    #[test]
    fn unregistering_an_unknown_identity_is_harmless() {
        let mut ctx = PhysicsContext::new();
        let key = ctx.colliders.insert(Collider::new(NodeId::null(), ShapeKind::default()));
        ctx.begin_unregistering(attachment_id(7), key);
        assert_eq!(ctx.resolve_collider(attachment_id(7)), None);
    }
}

//! Scene-to-native lifecycle synchronization.
//!
//! Every structural scene change funnels through the `on_*` entry points
//! here: they decide which native objects must exist, create and destroy
//! them in dependency order (bodies, then their shapes, then joints), and
//! keep colliders homed on the correct body as the hierarchy shifts.
//! [`PhysicsContext::step`] drives a frame: dirty joints flush, kinematic
//! targets push, the native world steps, dynamic poses write back, and
//! events resolve to components.

use crate::body::{BodyBridge, BodyKey, Rigidbody};
use crate::collider::{self, Attachment, Collider, ColliderKey};
use crate::context::PhysicsContext;
use crate::error::{PhysicsError, Result};
use crate::events::{self, PhysicsEvent};
use crate::filter::CollisionFilter;
use crate::handle::WorldRef;
use crate::ids::{ColliderId, JointId};
use crate::joint::{Joint, JointKey};
use crate::material::PhysicsMaterial;
use crate::shape::ShapeKind;
use crate::world::SharedWorld;
use keel_scene::{NodeId, SceneGraph};
use log::{debug, warn};
use rapier3d::na::{Isometry3, UnitQuaternion, Vector3};

/// Create the native actor for a body component if it should exist and
/// does not yet. Creation failures are logged and latched on the component.
pub(crate) fn ensure_body_native(
    ctx: &mut PhysicsContext,
    scene: &SceneGraph,
    world: &WorldRef,
    key: BodyKey,
) -> Result<()> {
    let Some(body) = ctx.bodies.get(key) else {
        return Ok(());
    };
    if body.has_native() || !body.lifecycle.can_create() {
        return Ok(());
    }
    if !body.enabled || !scene.is_active(body.node) {
        return Ok(());
    }

    let pose = scene.world_isometry(body.node);
    let options = body.actor_options(pose);
    let hosted = body.hosted;
    let kinematic = body.dynamics.kinematic;

    let Some(body) = ctx.bodies.get_mut(key) else {
        return Ok(());
    };
    body.lifecycle.begin_create();
    match BodyBridge::create(world, &options) {
        Ok((bridge, _)) => {
            let id = bridge.id();
            body.bridge = Some(bridge);
            body.lifecycle.finish_create();
            if !hosted {
                ctx.unhosted_bodies.push(key);
            }
            if !kinematic {
                let _ = ctx.transforms.try_insert(id, pose);
            }
        }
        Err(err) => {
            body.lifecycle.fail_create("body", &err);
        }
    }
    Ok(())
}

impl PhysicsContext {
    // ==================== Registration ====================

    /// Register a body component, binding it to its node.
    ///
    /// The native actor is not created here; it appears when the node
    /// completes registration or on first demand from a collider.
    pub fn register_rigidbody(&mut self, body: Rigidbody) -> BodyKey {
        let node = body.node;
        let key = self.bodies.insert(body);
        let binding = self.binding_mut(node);
        if let Some(previous) = binding.body.replace(key) {
            warn!("node {node:?} already had a body component, replacing");
            self.bodies.remove(previous);
        }
        key
    }

    /// Register a collider component, binding it to its node.
    pub fn register_collider(&mut self, collider: Collider) -> ColliderKey {
        let node = collider.node;
        let key = self.colliders.insert(collider);
        self.binding_mut(node).colliders.push(key);
        key
    }

    /// Register a joint component, binding it to its node.
    ///
    /// Degenerate topology (a body jointed to itself) is rejected up front.
    pub fn register_joint(&mut self, joint: Joint) -> Result<JointKey> {
        joint.validate()?;
        let node = joint.node;
        let key = self.joints.insert(joint);
        self.binding_mut(node).joints.push(key);
        Ok(key)
    }

    /// Nearest eligible body component at or above `node`, if any.
    ///
    /// This is the same search collider attachment uses: disabled components
    /// and inactive nodes are passed over, and the walk continues upward.
    pub fn find_owning_body(&self, scene: &SceneGraph, node: NodeId) -> Option<BodyKey> {
        collider::find_owning_body(self, scene, node, None)
    }

    // ==================== Scene lifecycle entry points ====================

    /// A node finished scene registration: mark its components hosted and
    /// bring the subtree's native state up to date.
    pub fn on_node_created(&mut self, scene: &SceneGraph, world: &WorldRef, node: NodeId) {
        if let Some(key) = self.body_of_node(node) {
            if let Some(body) = self.bodies.get_mut(key) {
                body.hosted = true;
            }
            self.unhosted_bodies.retain(|&k| k != key);
        }
        for key in self.colliders_of_node(node).to_vec() {
            if let Some(collider) = self.colliders.get_mut(key) {
                collider.hosted = true;
            }
        }
        for key in self.joints_of_node(node).to_vec() {
            if let Some(joint) = self.joints.get_mut(key) {
                joint.hosted = true;
            }
        }
        self.refresh_subtree(scene, world, node);
    }

    /// A node is about to be removed from the scene. Must be called while
    /// the node and its subtree are still present in the graph.
    ///
    /// Teardown runs joints first, then colliders, then bodies, so no
    /// native object ever outlives something it depends on.
    pub fn on_node_destroyed(&mut self, scene: &SceneGraph, world: &WorldRef, node: NodeId) {
        let nodes = scene.descendants(node);

        let mut removed_bodies = Vec::new();
        for &n in &nodes {
            for key in self.joints_of_node(n).to_vec() {
                self.destroy_joint_native(key);
                self.joints.remove(key);
            }
        }
        for &n in &nodes {
            for key in self.colliders_of_node(n).to_vec() {
                collider::detach_collider(self, key);
                self.colliders.remove(key);
            }
        }
        for &n in &nodes {
            if let Some(key) = self.body_of_node(n) {
                self.destroy_body_native(scene, world, key);
                self.bodies.remove(key);
                self.unhosted_bodies.retain(|&k| k != key);
                removed_bodies.push(key);
            }
            self.bindings.remove(&n);
        }

        // Joints elsewhere that referenced a removed body lose their native
        // constraint; the component stays and waits for a rebind.
        if !removed_bodies.is_empty() {
            for key in self.joints.handles() {
                let references_removed = self.joints.get(key).map_or(false, |j| {
                    removed_bodies.contains(&j.body_a)
                        || j.body_b.map_or(false, |b| removed_bodies.contains(&b))
                });
                if references_removed {
                    self.destroy_joint_native(key);
                }
            }
        }
    }

    /// A node (or one of its ancestors) became active.
    pub fn on_node_enabled(&mut self, scene: &SceneGraph, world: &WorldRef, node: NodeId) {
        self.refresh_subtree(scene, world, node);
    }

    /// A node (or one of its ancestors) became inactive.
    pub fn on_node_disabled(&mut self, scene: &SceneGraph, world: &WorldRef, node: NodeId) {
        self.refresh_subtree(scene, world, node);
    }

    /// A node was moved to a different parent: re-home every collider in
    /// the subtree and re-pose bodies at their new world transforms.
    pub fn on_parent_changed(&mut self, scene: &SceneGraph, world: &WorldRef, node: NodeId) {
        self.refresh_subtree(scene, world, node);
        for n in scene.descendants(node) {
            let Some(key) = self.body_of_node(n) else {
                continue;
            };
            let Some(bridge) = self.bodies.get(key).and_then(|b| b.bridge().cloned()) else {
                continue;
            };
            if let Err(err) = bridge.handle().set_pose(scene.world_isometry(n)) {
                debug!("pose push after reparent failed: {err}");
            }
        }
    }

    /// Bring native state for a whole subtree in line with what the scene
    /// says should exist: bodies first, then collider homing, then joints.
    fn refresh_subtree(&mut self, scene: &SceneGraph, world: &WorldRef, root: NodeId) {
        let nodes = scene.descendants(root);

        for &n in &nodes {
            let Some(key) = self.body_of_node(n) else {
                continue;
            };
            let should = self
                .bodies
                .get(key)
                .map_or(false, |b| b.hosted && b.enabled && scene.is_active(b.node));
            if should {
                let _ = ensure_body_native(self, scene, world, key);
            } else {
                self.destroy_body_native(scene, world, key);
            }
        }
        for &n in &nodes {
            for key in self.colliders_of_node(n).to_vec() {
                collider::reevaluate_collider(self, scene, world, key, None);
            }
        }
        for &n in &nodes {
            for key in self.joints_of_node(n).to_vec() {
                let should = self
                    .joints
                    .get(key)
                    .map_or(false, |j| j.hosted && j.enabled && scene.is_active(j.node));
                if should {
                    self.create_joint_native(scene, world, key);
                } else {
                    self.destroy_joint_native(key);
                }
            }
        }
    }

    // ==================== Component toggles ====================

    /// Enable or disable a body component without touching its node.
    ///
    /// Disabling destroys the native actor; colliders it carried are
    /// re-homed to the next body up the hierarchy.
    pub fn set_body_enabled(
        &mut self,
        scene: &SceneGraph,
        world: &WorldRef,
        key: BodyKey,
        enabled: bool,
    ) {
        let Some(body) = self.bodies.get_mut(key) else {
            return;
        };
        if body.enabled == enabled {
            return;
        }
        body.enabled = enabled;
        let node = body.node;
        self.refresh_subtree(scene, world, node);
    }

    /// Enable or disable a collider component.
    pub fn set_collider_enabled(
        &mut self,
        scene: &SceneGraph,
        world: &WorldRef,
        key: ColliderKey,
        enabled: bool,
    ) {
        let Some(collider) = self.colliders.get_mut(key) else {
            return;
        };
        if collider.enabled == enabled {
            return;
        }
        collider.enabled = enabled;
        collider::reevaluate_collider(self, scene, world, key, None);
    }

    /// Enable or disable a joint component.
    pub fn set_joint_enabled(
        &mut self,
        scene: &SceneGraph,
        world: &WorldRef,
        key: JointKey,
        enabled: bool,
    ) {
        let Some(joint) = self.joints.get_mut(key) else {
            return;
        };
        if joint.enabled == enabled {
            return;
        }
        joint.enabled = enabled;
        if enabled {
            self.create_joint_native(scene, world, key);
        } else {
            self.destroy_joint_native(key);
        }
    }

    // ==================== Body property routing ====================

    /// Toggle a body between kinematic and dynamic.
    ///
    /// Switching to dynamic re-pushes every dynamic-state property and
    /// re-enters the body into the pose mirror; switching to kinematic
    /// removes it.
    pub fn set_body_kinematic(&mut self, key: BodyKey, kinematic: bool) -> Result<()> {
        let Some(body) = self.bodies.get_mut(key) else {
            return Err(PhysicsError::InvalidParameter(
                "unknown body component".into(),
            ));
        };
        if body.dynamics.kinematic == kinematic {
            return Ok(());
        }
        body.dynamics.kinematic = kinematic;
        let dynamics = body.dynamics;
        let Some(bridge) = body.bridge().cloned() else {
            return Ok(());
        };

        bridge.set_kinematic(kinematic, &dynamics)?;
        if kinematic {
            self.transforms.remove(bridge.id());
        } else if let Ok(pose) = bridge.handle().pose() {
            let _ = self.transforms.try_insert(bridge.id(), pose);
        }
        Ok(())
    }

    /// Enable or disable collision reporting for all of a body's shapes.
    pub fn set_body_detect_collisions(&mut self, key: BodyKey, enabled: bool) -> Result<()> {
        let Some(body) = self.bodies.get_mut(key) else {
            return Err(PhysicsError::InvalidParameter(
                "unknown body component".into(),
            ));
        };
        if body.detect_collisions == enabled {
            return Ok(());
        }
        body.detect_collisions = enabled;
        match body.bridge() {
            Some(bridge) => bridge.set_detect_collisions(enabled),
            None => Ok(()),
        }
    }

    // ==================== Collider property routing ====================

    /// Replace a collider's shape and push the rebuilt geometry.
    pub fn set_collider_shape(&mut self, scene: &SceneGraph, key: ColliderKey, shape: ShapeKind) {
        if let Some(collider) = self.colliders.get_mut(key) {
            collider.shape = shape;
            collider::push_shape_change(self, scene, key);
        }
    }

    /// Replace a collider's material and push it.
    pub fn set_collider_material(
        &mut self,
        scene: &SceneGraph,
        key: ColliderKey,
        material: PhysicsMaterial,
    ) {
        if let Some(collider) = self.colliders.get_mut(key) {
            collider.material = material;
            collider::push_shape_change(self, scene, key);
        }
    }

    /// Switch a collider between solid and trigger.
    pub fn set_collider_trigger(&mut self, scene: &SceneGraph, key: ColliderKey, is_trigger: bool) {
        if let Some(collider) = self.colliders.get_mut(key) {
            collider.is_trigger = is_trigger;
            collider::push_shape_change(self, scene, key);
        }
    }

    /// Replace a collider's filtering masks and push them.
    pub fn set_collider_filter(
        &mut self,
        scene: &SceneGraph,
        key: ColliderKey,
        filter: CollisionFilter,
    ) {
        if let Some(collider) = self.colliders.get_mut(key) {
            collider.filter = filter;
            collider::push_shape_change(self, scene, key);
        }
    }

    /// Change a collider's offset from its node and push the new pose.
    pub fn set_collider_offset(
        &mut self,
        scene: &SceneGraph,
        key: ColliderKey,
        position: Vector3<f32>,
        rotation: UnitQuaternion<f32>,
    ) {
        if let Some(collider) = self.colliders.get_mut(key) {
            collider.offset_position = position;
            collider.offset_rotation = rotation;
            collider::push_shape_change(self, scene, key);
        }
    }

    /// Rebake a collider's geometry if its node's accumulated scale changed.
    pub fn refresh_collider_scale(&mut self, scene: &SceneGraph, key: ColliderKey) {
        let Some(collider) = self.colliders.get(key) else {
            return;
        };
        if !collider.is_attached() {
            return;
        }
        let scale = scene.world_scale(collider.node);
        if (scale - collider.built_scale).norm() > 1e-6 {
            collider::push_shape_change(self, scene, key);
        }
    }

    // ==================== Joint natives ====================

    fn create_joint_native(&mut self, scene: &SceneGraph, world: &WorldRef, key: JointKey) {
        let Some(joint) = self.joints.get(key) else {
            return;
        };
        if joint.has_native() || !joint.lifecycle.can_create() {
            return;
        }
        if !joint.hosted || !joint.enabled || !scene.is_active(joint.node) {
            return;
        }
        if let Err(err) = joint.validate() {
            if let Some(joint) = self.joints.get_mut(key) {
                joint.lifecycle.begin_create();
                joint.lifecycle.fail_create("joint", &err);
            }
            return;
        }
        let body_a = joint.body_a;
        let body_b = joint.body_b;

        // Both endpoint bodies must exist natively before the constraint.
        let _ = ensure_body_native(self, scene, world, body_a);
        if let Some(b) = body_b {
            let _ = ensure_body_native(self, scene, world, b);
        }

        let Some(a) = self.bodies.get(body_a) else {
            return;
        };
        let Some(a_id) = a.native_id() else {
            return; // body creation failed or is inactive, joint stays pending
        };
        let pose_a = scene.world_isometry(a.node);
        let (b_id, pose_b) = match body_b {
            Some(b_key) => {
                let Some(b) = self.bodies.get(b_key) else {
                    return;
                };
                let Some(b_id) = b.native_id() else {
                    return;
                };
                (Some(b_id), scene.world_isometry(b.node))
            }
            None => (None, Isometry3::identity()),
        };

        let Some(joint) = self.joints.get_mut(key) else {
            return;
        };
        joint.lifecycle.begin_create();
        let frame_b = joint.connected_frame(pose_a, pose_b);
        let data = joint.native_data(frame_b);
        match world.with(|w| w.add_joint(a_id, b_id, data)) {
            Ok(id) => {
                joint.id = id;
                joint.world = world.clone();
                joint.dirty = false;
                joint.lifecycle.finish_create();
            }
            Err(err) => joint.lifecycle.fail_create("joint", &err),
        }
    }

    fn destroy_joint_native(&mut self, key: JointKey) {
        let Some(joint) = self.joints.get_mut(key) else {
            return;
        };
        if !joint.has_native() {
            return;
        }
        joint.lifecycle.begin_destroy();
        let id = joint.id;
        match joint.world.with(|w| w.remove_joint(id)) {
            Ok(_) | Err(PhysicsError::WorldDisposed) => {}
            Err(err) => debug!("joint teardown failed: {err}"),
        }
        joint.id = JointId::INVALID;
        joint.world = WorldRef::invalid();
        joint.lifecycle.finish_destroy();
    }

    /// Push every dirty joint's full configuration, once per joint.
    ///
    /// Joints whose endpoint bodies changed are recreated instead: the
    /// native engine fixes a constraint's endpoints at creation, so an
    /// in-place update could never move them.
    fn flush_dirty_joints(&mut self, scene: &SceneGraph) {
        for key in self.joints.handles() {
            let Some(joint) = self.joints.get(key) else {
                continue;
            };
            if !joint.dirty {
                continue;
            }
            if joint.rebind {
                let world = joint.world.clone();
                let had_native = joint.has_native();
                if had_native {
                    self.destroy_joint_native(key);
                }
                if let Some(joint) = self.joints.get_mut(key) {
                    joint.rebind = false;
                    joint.dirty = false;
                }
                if had_native && world.is_valid() {
                    self.create_joint_native(scene, &world, key);
                }
                continue;
            }
            if !joint.has_native() {
                continue;
            }
            let pose_a = self
                .bodies
                .get(joint.body_a)
                .map(|b| scene.world_isometry(b.node))
                .unwrap_or_else(Isometry3::identity);
            let pose_b = joint
                .body_b
                .and_then(|b| self.bodies.get(b))
                .map(|b| scene.world_isometry(b.node))
                .unwrap_or_else(Isometry3::identity);

            let Some(joint) = self.joints.get_mut(key) else {
                continue;
            };
            let frame_b = joint.connected_frame(pose_a, pose_b);
            let data = joint.native_data(frame_b);
            let id = joint.id;
            let world = joint.world.clone();
            joint.dirty = false;
            if let Err(err) = world.with(|w| w.update_joint(id, data)) {
                debug!("dirty joint flush failed: {err}");
            }
        }
    }

    // ==================== Body natives ====================

    /// Destroy a body's native actor, re-homing the colliders it carried to
    /// the next eligible body up the hierarchy (or private static bodies).
    /// Sibling and unrelated bodies are never touched.
    fn destroy_body_native(&mut self, scene: &SceneGraph, world: &WorldRef, key: BodyKey) {
        let Some(body) = self.bodies.get_mut(key) else {
            return;
        };
        let Some(bridge) = body.bridge.take() else {
            return;
        };
        body.lifecycle.begin_destroy();
        let orphans = std::mem::take(&mut body.children);
        let id = bridge.id();

        // The actor removal below takes the native shapes down with it, so
        // orphans only need their mirror state cleared.
        let mut freed = Vec::with_capacity(orphans.len());
        for &c in &orphans {
            if let Some(col) = self.colliders.get_mut(c) {
                freed.push((col.id, c));
                col.attachment = Attachment::Detached;
                col.id = ColliderId::INVALID;
            }
        }
        for (old, c) in freed {
            self.begin_unregistering(old, c);
        }

        if let Err(err) = bridge.destroy() {
            debug!("body teardown failed: {err}");
        }
        self.transforms.remove(id);
        if let Some(body) = self.bodies.get_mut(key) {
            body.lifecycle.finish_destroy();
        }

        for c in orphans {
            collider::attach_collider(self, scene, world, c, Some(key));
        }
    }

    /// Destroy native actors created on demand for bodies whose node never
    /// completed registration. Colliders they carried are re-homed.
    ///
    /// Runs at the start of every [`Self::step`], so a speculative actor
    /// never outlives the frame its host failed to materialize in.
    pub fn sweep_unhosted(&mut self, scene: &SceneGraph, world: &WorldRef) {
        let pending: Vec<BodyKey> = self.unhosted_bodies.drain(..).collect();
        for key in pending {
            let still_unhosted = self.bodies.get(key).map_or(false, |b| !b.hosted);
            if still_unhosted {
                self.destroy_body_native(scene, world, key);
            }
        }
    }

    // ==================== Frame driver ====================

    /// Advance physics by `delta_time` and return this frame's events.
    ///
    /// Order within the frame: unhosted actors sweep, dirty joints flush,
    /// kinematic targets push, the native world substeps, dynamic poses
    /// write back into the scene and the pose mirror (membership driven by
    /// the step's sleep transitions), and finally events resolve against
    /// the identity maps before the unregistering grace buffer rolls over.
    pub fn step(
        &mut self,
        scene: &mut SceneGraph,
        world: &SharedWorld,
        delta_time: f32,
    ) -> Vec<PhysicsEvent> {
        if !self.unhosted_bodies.is_empty() {
            let wref = WorldRef::new(world);
            self.sweep_unhosted(scene, &wref);
        }
        self.flush_dirty_joints(scene);

        let mut kinematic_targets = Vec::new();
        let mut dynamic_bodies = Vec::new();
        for (_, body) in self.bodies.iter() {
            let Some(id) = body.native_id() else {
                continue;
            };
            if body.dynamics.kinematic {
                kinematic_targets.push((id, scene.world_isometry(body.node)));
            } else {
                dynamic_bodies.push((id, body.node));
            }
        }

        let output = {
            let mut w = world.lock();
            for (id, pose) in kinematic_targets {
                if let Err(err) = w.set_pose(id, pose) {
                    debug!("kinematic target push failed: {err}");
                }
            }
            w.step(delta_time)
        };

        for id in &output.slept {
            self.transforms.remove(*id);
        }
        {
            let w = world.lock();
            for (id, node) in dynamic_bodies {
                if !output.woke.contains(&id) && !self.transforms.contains(id) {
                    continue; // asleep since before this step
                }
                let Ok(pose) = w.pose(id) else {
                    continue;
                };
                let _ = self.transforms.try_insert(id, pose);
                self.transforms.set_pose(id, pose);
                scene.set_world_isometry(node, pose);
            }
        }

        let events = events::translate(self, &output.events);
        self.housekeep();
        events
    }

    // ==================== Shutdown ====================

    /// Tear down every native object and forget all components.
    ///
    /// Safe to call after the native world is already gone; disposed-world
    /// failures are absorbed.
    pub fn shutdown(&mut self) {
        for key in self.joints.handles() {
            self.destroy_joint_native(key);
        }
        for key in self.colliders.handles() {
            collider::detach_collider(self, key);
        }
        for key in self.bodies.handles() {
            let Some(body) = self.bodies.get_mut(key) else {
                continue;
            };
            let Some(bridge) = body.bridge.take() else {
                continue;
            };
            if let Err(err) = bridge.destroy() {
                debug!("body teardown during shutdown failed: {err}");
            }
        }
        self.forget_all();
    }
}

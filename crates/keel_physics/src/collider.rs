//! Collider component and body attachment management.
//!
//! A collider does not own a native body. At attach time the scene hierarchy
//! is walked upward from the collider's node to find the nearest eligible
//! rigid body component; the collider becomes one of that body's shapes,
//! posed relative to the body's origin. When no body exists anywhere above,
//! the collider gets a private static body of its own. Hierarchy or enable
//! changes re-run the same search and re-home the collider atomically.

use crate::body::{ActorOptions, BodyBridge, BodyKey, DynamicOptions, MotionKind};
use crate::context::PhysicsContext;
use crate::error::Result;
use crate::filter::CollisionFilter;
use crate::handle::WorldRef;
use crate::ids::ColliderId;
use crate::material::PhysicsMaterial;
use crate::shape::{build_shape, ShapeKind, ShapeRecord};
use keel_core::Handle;
use keel_scene::{NodeId, SceneGraph};
use log::{debug, warn};
use rapier3d::na::{Isometry3, Translation3, UnitQuaternion, Vector3};

/// Registry key for a [`Collider`] component.
pub type ColliderKey = Handle<Collider>;

/// Where a collider's native shape currently lives.
pub(crate) enum Attachment {
    /// No native shape exists.
    Detached,
    /// Attached to the body component's native actor.
    OwnedBy(BodyKey),
    /// Attached to a private static body owned by this collider.
    Private(BodyBridge),
}

/// Scene-side collider component.
pub struct Collider {
    /// The scene node this component mirrors.
    pub node: NodeId,
    /// Component-level enable flag, independent of node activity.
    pub enabled: bool,
    /// Whether the owning node has completed scene registration.
    pub(crate) hosted: bool,
    pub(crate) shape: ShapeKind,
    pub(crate) offset_position: Vector3<f32>,
    pub(crate) offset_rotation: UnitQuaternion<f32>,
    pub(crate) material: PhysicsMaterial,
    pub(crate) is_trigger: bool,
    pub(crate) filter: CollisionFilter,
    /// Native attachment identity, valid only while attached.
    pub(crate) id: ColliderId,
    pub(crate) attachment: Attachment,
    /// World scale the current native geometry was baked under.
    pub(crate) built_scale: Vector3<f32>,
}

impl Collider {
    /// Create an unhosted collider for a node.
    pub fn new(node: NodeId, shape: ShapeKind) -> Self {
        Self {
            node,
            enabled: true,
            hosted: false,
            shape,
            offset_position: Vector3::zeros(),
            offset_rotation: UnitQuaternion::identity(),
            material: PhysicsMaterial::default(),
            is_trigger: false,
            filter: CollisionFilter::ALL,
            id: ColliderId::INVALID,
            attachment: Attachment::Detached,
            built_scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// Set the surface material before registration.
    pub fn with_material(mut self, material: PhysicsMaterial) -> Self {
        self.material = material;
        self
    }

    /// Mark as a trigger before registration.
    pub fn with_trigger(mut self, is_trigger: bool) -> Self {
        self.is_trigger = is_trigger;
        self
    }

    /// Set collision filtering before registration.
    pub fn with_filter(mut self, filter: CollisionFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the local offset from the owning node before registration.
    pub fn with_offset(mut self, position: Vector3<f32>, rotation: UnitQuaternion<f32>) -> Self {
        self.offset_position = position;
        self.offset_rotation = rotation;
        self
    }

    /// Authored shape description.
    pub fn shape(&self) -> &ShapeKind {
        &self.shape
    }

    /// Surface material.
    pub fn material(&self) -> &PhysicsMaterial {
        &self.material
    }

    /// Whether the shape reports overlaps instead of colliding.
    pub fn is_trigger(&self) -> bool {
        self.is_trigger
    }

    /// Collision filter masks.
    pub fn filter(&self) -> CollisionFilter {
        self.filter
    }

    /// Whether a native shape currently exists.
    pub fn is_attached(&self) -> bool {
        !matches!(self.attachment, Attachment::Detached)
    }

    /// The body component this collider's shape is attached to, if it is not
    /// detached or privately hosted.
    pub fn owning_body(&self) -> Option<BodyKey> {
        match self.attachment {
            Attachment::OwnedBy(key) => Some(key),
            _ => None,
        }
    }

    /// Native attachment identity, invalid while detached.
    pub fn attachment_id(&self) -> ColliderId {
        self.id
    }

    /// Offset of the shape from the owning node's origin.
    pub(crate) fn offset_pose(&self) -> Isometry3<f32> {
        Isometry3::from_parts(Translation3::from(self.offset_position), self.offset_rotation)
    }

    /// Bake the current description into a boundary-ready record.
    pub(crate) fn make_record(
        &self,
        scale: Vector3<f32>,
        local_pose: Isometry3<f32>,
    ) -> Result<ShapeRecord> {
        Ok(ShapeRecord {
            shape: build_shape(&self.shape, scale)?,
            local_pose,
            material: self.material,
            is_trigger: self.is_trigger,
            filter: self.filter,
        })
    }
}

/// Walk upward from `start` to the nearest eligible body component.
///
/// A body is eligible when its component is enabled, its node chain is
/// active, and it is not the excluded key. Present-but-ineligible bodies
/// are passed over and the walk continues at the parent.
pub(crate) fn find_owning_body(
    ctx: &PhysicsContext,
    scene: &SceneGraph,
    start: NodeId,
    exclude: Option<BodyKey>,
) -> Option<BodyKey> {
    let mut current = Some(start);
    while let Some(node) = current {
        if let Some(key) = ctx.body_of_node(node) {
            if Some(key) != exclude {
                if let Some(body) = ctx.bodies.get(key) {
                    if body.enabled && scene.is_active(body.node) {
                        return Some(key);
                    }
                }
            }
        }
        current = scene.parent(node);
    }
    None
}

/// Attach a collider to the nearest eligible body, creating a private
/// static body when none exists. No-op when already attached.
///
/// Boundary failures are logged and leave the collider detached.
pub(crate) fn attach_collider(
    ctx: &mut PhysicsContext,
    scene: &SceneGraph,
    world: &WorldRef,
    key: ColliderKey,
    exclude: Option<BodyKey>,
) {
    let Some(collider) = ctx.colliders.get(key) else {
        return;
    };
    if collider.is_attached() {
        return;
    }
    if !collider.hosted || !collider.enabled || !scene.is_active(collider.node) {
        return;
    }

    let node = collider.node;
    let scale = scene.world_scale(node);
    let shape_world = scene.world_isometry(node) * collider.offset_pose();
    let owner = find_owning_body(ctx, scene, node, exclude);

    let attached = match owner {
        Some(body_key) => attach_to_body(ctx, scene, world, key, body_key, scale),
        None => attach_private(ctx, world, key, shape_world, scale),
    };

    if let Err(err) = attached {
        warn!("failed to attach collider at node {node:?}: {err}");
        if let Some(collider) = ctx.colliders.get_mut(key) {
            collider.attachment = Attachment::Detached;
            collider.id = ColliderId::INVALID;
        }
    }
}

fn attach_to_body(
    ctx: &mut PhysicsContext,
    scene: &SceneGraph,
    world: &WorldRef,
    key: ColliderKey,
    body_key: BodyKey,
    scale: Vector3<f32>,
) -> Result<()> {
    crate::sync::ensure_body_native(ctx, scene, world, body_key)?;

    let body = ctx
        .bodies
        .get(body_key)
        .ok_or(crate::error::PhysicsError::WorldDisposed)?;
    let Some(bridge) = body.bridge().cloned() else {
        // Creation was absorbed as a failure; stay detached.
        return Ok(());
    };
    let body_world = scene.world_isometry(body.node);

    let collider = match ctx.colliders.get(key) {
        Some(c) => c,
        None => return Ok(()),
    };
    let shape_world = scene.world_isometry(collider.node) * collider.offset_pose();
    let local_pose = body_world.inverse() * shape_world;
    let record = collider.make_record(scale, local_pose)?;

    let id = bridge.attach_shape(&record)?;
    if !ctx.bodies.get(body_key).map(|b| b.detect_collisions()).unwrap_or(true) {
        bridge.set_shape_enabled(id, false)?;
    }

    if let Some(collider) = ctx.colliders.get_mut(key) {
        collider.attachment = Attachment::OwnedBy(body_key);
        collider.id = id;
        collider.built_scale = scale;
    }
    if let Some(body) = ctx.bodies.get_mut(body_key) {
        body.children.push(key);
    }
    ctx.register_attachment(id, key);
    Ok(())
}

fn attach_private(
    ctx: &mut PhysicsContext,
    world: &WorldRef,
    key: ColliderKey,
    shape_world: Isometry3<f32>,
    scale: Vector3<f32>,
) -> Result<()> {
    let collider = match ctx.colliders.get(key) {
        Some(c) => c,
        None => return Ok(()),
    };
    let record = collider.make_record(scale, Isometry3::identity())?;
    let options = ActorOptions {
        motion: MotionKind::Static,
        pose: shape_world,
        dynamics: DynamicOptions::default(),
        shapes: vec![record],
    };
    let (bridge, keys) = BodyBridge::create(world, &options)?;
    let id = ColliderId {
        body: bridge.id(),
        key: keys[0],
    };

    if let Some(collider) = ctx.colliders.get_mut(key) {
        collider.attachment = Attachment::Private(bridge);
        collider.id = id;
        collider.built_scale = scale;
    }
    ctx.register_attachment(id, key);
    Ok(())
}

/// Detach a collider's native shape, leaving sibling shapes untouched.
///
/// The attachment identity moves into the unregistering buffer so events
/// already in flight still resolve for one more pass.
pub(crate) fn detach_collider(ctx: &mut PhysicsContext, key: ColliderKey) {
    let Some(collider) = ctx.colliders.get_mut(key) else {
        return;
    };
    let id = collider.id;
    let attachment = std::mem::replace(&mut collider.attachment, Attachment::Detached);
    collider.id = ColliderId::INVALID;

    match attachment {
        Attachment::Detached => return,
        Attachment::OwnedBy(body_key) => {
            if let Some(body) = ctx.bodies.get_mut(body_key) {
                body.children.retain(|&c| c != key);
                if let Some(bridge) = body.bridge().cloned() {
                    if let Err(err) = bridge.detach_shape(id) {
                        debug!("detach of {id:?} failed: {err}");
                    }
                }
            }
        }
        Attachment::Private(bridge) => {
            if let Err(err) = bridge.destroy() {
                debug!("private body teardown for {id:?} failed: {err}");
            }
        }
    }
    ctx.begin_unregistering(id, key);
}

/// Re-run the owner search and re-home the collider if its correct owner
/// changed. The detach and re-attach happen back to back, so no step ever
/// observes the collider half-moved.
pub(crate) fn reevaluate_collider(
    ctx: &mut PhysicsContext,
    scene: &SceneGraph,
    world: &WorldRef,
    key: ColliderKey,
    exclude: Option<BodyKey>,
) {
    let Some(collider) = ctx.colliders.get(key) else {
        return;
    };
    let active = collider.hosted && collider.enabled && scene.is_active(collider.node);
    if !active {
        detach_collider(ctx, key);
        return;
    }

    let desired = find_owning_body(ctx, scene, collider.node, exclude);
    let matches_current = match (&collider.attachment, desired) {
        (Attachment::Detached, _) => false,
        (Attachment::OwnedBy(current), Some(want)) => *current == want,
        (Attachment::OwnedBy(_), None) => false,
        (Attachment::Private(_), None) => true,
        (Attachment::Private(_), Some(_)) => false,
    };

    if !matches_current {
        detach_collider(ctx, key);
        attach_collider(ctx, scene, world, key, exclude);
    }
}

/// Push the collider's current description over its native shape, rebaking
/// geometry under the node's current world scale.
///
/// A failed rebuild (degenerate shape after a scale change, for example)
/// detaches the collider instead of leaving a stale native shape behind.
pub(crate) fn push_shape_change(ctx: &mut PhysicsContext, scene: &SceneGraph, key: ColliderKey) {
    let Some(collider) = ctx.colliders.get(key) else {
        return;
    };
    let id = collider.id;
    let node = collider.node;
    let scale = scene.world_scale(node);

    let result = match &collider.attachment {
        Attachment::Detached => return,
        Attachment::OwnedBy(body_key) => {
            let Some(body) = ctx.bodies.get(*body_key) else {
                return;
            };
            let Some(bridge) = body.bridge().cloned() else {
                return;
            };
            let body_world = scene.world_isometry(body.node);
            let local_pose =
                body_world.inverse() * (scene.world_isometry(node) * collider.offset_pose());
            collider
                .make_record(scale, local_pose)
                .and_then(|record| bridge.update_shape(id, &record))
        }
        Attachment::Private(bridge) => {
            let bridge = bridge.clone();
            collider
                .make_record(scale, Isometry3::identity())
                .and_then(|record| bridge.update_shape(id, &record))
                .and_then(|()| {
                    bridge
                        .handle()
                        .set_pose(scene.world_isometry(node) * collider.offset_pose())
                })
        }
    };

    match result {
        Ok(()) => {
            if let Some(collider) = ctx.colliders.get_mut(key) {
                collider.built_scale = scale;
            }
        }
        Err(err) => {
            warn!("shape update for collider at node {node:?} failed, detaching: {err}");
            detach_collider(ctx, key);
        }
    }
}

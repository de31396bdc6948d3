//! End-to-end lifecycle scenarios across the scene graph, the component
//! registries, and the native world.

use approx::assert_abs_diff_eq;
use keel_physics::prelude::*;
use keel_scene::{Node, NodeId, SceneGraph};
use nalgebra::Vector3;

struct Fixture {
    scene: SceneGraph,
    ctx: PhysicsContext,
    world: SharedWorld,
    wref: WorldRef,
}

impl Fixture {
    fn new() -> Self {
        let world = PhysicsWorld::new_shared(PhysicsConfig::default());
        let wref = WorldRef::new(&world);
        Self {
            scene: SceneGraph::new(),
            ctx: PhysicsContext::new(),
            world,
            wref,
        }
    }

    fn node(&mut self, parent: Option<NodeId>, name: &str, y: f32) -> NodeId {
        let node = Node::new(name).with_position(Vector3::new(0.0, y, 0.0));
        match parent {
            Some(p) => self.scene.add_child(p, node),
            None => self.scene.add_node(node),
        }
    }

    fn body_at(&mut self, parent: Option<NodeId>, name: &str, y: f32) -> (NodeId, BodyKey) {
        let node = self.node(parent, name, y);
        let key = self.ctx.register_rigidbody(Rigidbody::new(node));
        self.ctx.on_node_created(&self.scene, &self.wref, node);
        (node, key)
    }

    fn collider_at(&mut self, parent: Option<NodeId>, name: &str, y: f32) -> (NodeId, ColliderKey) {
        let node = self.node(parent, name, y);
        let key = self
            .ctx
            .register_collider(Collider::new(node, ShapeKind::sphere(0.5)));
        self.ctx.on_node_created(&self.scene, &self.wref, node);
        (node, key)
    }

    fn native_bodies(&self) -> usize {
        self.world.lock().body_count()
    }

    fn native_shapes(&self) -> usize {
        self.world.lock().shape_count()
    }
}

#[test]
fn collider_attaches_to_nearest_eligible_body() {
    let mut f = Fixture::new();
    let (root, body_a) = f.body_at(None, "a", 0.0);
    let (mid, body_b) = f.body_at(Some(root), "b", 1.0);
    let (_, collider) = f.collider_at(Some(mid), "shape", 0.5);

    assert_eq!(f.ctx.collider(collider).unwrap().owning_body(), Some(body_b));

    // Disabling the nearest body continues the walk at its parent.
    f.ctx.set_body_enabled(&f.scene, &f.wref, body_b, false);
    assert_eq!(f.ctx.collider(collider).unwrap().owning_body(), Some(body_a));

    // Re-enabling re-homes it back down.
    f.ctx.set_body_enabled(&f.scene, &f.wref, body_b, true);
    assert_eq!(f.ctx.collider(collider).unwrap().owning_body(), Some(body_b));
}

#[test]
fn detaching_one_collider_leaves_siblings_attached() {
    let mut f = Fixture::new();
    let (root, body) = f.body_at(None, "body", 0.0);
    let (left_node, left) = f.collider_at(Some(root), "left", 0.0);
    let (_, right) = f.collider_at(Some(root), "right", 0.0);

    assert_eq!(f.native_shapes(), 2);
    assert_eq!(f.ctx.body(body).unwrap().attached_colliders().len(), 2);

    f.ctx.on_node_destroyed(&f.scene, &f.wref, left_node);
    f.scene.remove_node(left_node);

    assert_eq!(f.native_shapes(), 1);
    assert!(f.ctx.collider(left).is_none());
    let survivor = f.ctx.collider(right).unwrap();
    assert_eq!(survivor.owning_body(), Some(body));
    assert!(survivor.attachment_id().is_valid());
}

#[test]
fn collider_without_ancestor_body_gets_a_private_static_body() {
    let mut f = Fixture::new();
    let (_, collider) = f.collider_at(None, "loose", 3.0);

    let c = f.ctx.collider(collider).unwrap();
    assert!(c.is_attached());
    assert_eq!(c.owning_body(), None);
    assert_eq!(f.native_bodies(), 1);
    assert_eq!(f.native_shapes(), 1);
}

#[test]
fn destroying_a_body_rescues_its_colliders() {
    let mut f = Fixture::new();
    let (root, outer) = f.body_at(None, "outer", 0.0);
    let (mid, inner) = f.body_at(Some(root), "inner", 1.0);
    let (_, collider) = f.collider_at(Some(mid), "shape", 0.0);

    assert_eq!(f.ctx.collider(collider).unwrap().owning_body(), Some(inner));

    // Disable the inner body component: its colliders must re-home upward
    // without the search finding the dying body again.
    f.ctx.set_body_enabled(&f.scene, &f.wref, inner, false);

    assert_eq!(f.ctx.collider(collider).unwrap().owning_body(), Some(outer));
    assert!(!f.ctx.body(inner).unwrap().has_native());
}

#[test]
fn reparenting_re_homes_colliders_atomically() {
    let mut f = Fixture::new();
    let (node_a, body_a) = f.body_at(None, "a", 0.0);
    let (node_b, body_b) = f.body_at(None, "b", 5.0);
    let (shape_node, collider) = f.collider_at(Some(node_a), "shape", 0.5);

    assert_eq!(f.ctx.collider(collider).unwrap().owning_body(), Some(body_a));

    f.scene.set_parent(shape_node, Some(node_b));
    f.ctx.on_parent_changed(&f.scene, &f.wref, shape_node);

    let c = f.ctx.collider(collider).unwrap();
    assert_eq!(c.owning_body(), Some(body_b));
    assert!(c.attachment_id().is_valid());
    assert_eq!(f.ctx.body(body_a).unwrap().attached_colliders().len(), 0);
    assert_eq!(f.ctx.body(body_b).unwrap().attached_colliders().len(), 1);
}

#[test]
fn kinematic_toggle_updates_pose_mirror_membership() {
    let mut f = Fixture::new();
    let (root, body) = f.body_at(None, "body", 2.0);
    f.collider_at(Some(root), "shape", 0.0);

    let id = f.ctx.body(body).unwrap().native_id().unwrap();
    assert!(f.ctx.transforms().contains(id));

    f.ctx.set_body_kinematic(body, true).unwrap();
    assert!(!f.ctx.transforms().contains(id));

    f.ctx.set_body_kinematic(body, false).unwrap();
    assert!(f.ctx.transforms().contains(id));
}

#[test]
fn kinematic_toggle_re_pushes_dynamic_state() {
    let mut f = Fixture::new();
    let (_, body) = f.body_at(None, "body", 0.0);
    f.ctx
        .body_mut(body)
        .unwrap()
        .set_velocity_limits(2.5, 3.5)
        .unwrap();

    f.ctx.set_body_kinematic(body, true).unwrap();
    f.ctx.set_body_kinematic(body, false).unwrap();

    let id = f.ctx.body(body).unwrap().native_id().unwrap();
    let limits = f.world.lock().velocity_limits(id).unwrap();
    assert_eq!(limits, Some((2.5, 3.5)));
}

#[test]
fn dynamic_body_falls_and_writes_back_into_the_scene() {
    let mut f = Fixture::new();
    let (root, body) = f.body_at(None, "body", 10.0);
    f.collider_at(Some(root), "shape", 0.0);

    for _ in 0..30 {
        f.ctx.step(&mut f.scene, &f.world, 1.0 / 60.0);
    }

    let y = f.scene.world_isometry(root).translation.vector.y;
    assert!(y < 10.0, "body did not fall, y = {y}");

    let id = f.ctx.body(body).unwrap().native_id().unwrap();
    let mirrored = f.ctx.transforms().pose(id).unwrap();
    assert_abs_diff_eq!(mirrored.translation.vector.y, y, epsilon = 1e-4);
}

#[test]
fn bodies_created_on_demand_are_swept_if_never_hosted() {
    let mut f = Fixture::new();

    // The body's node never completes registration, but a collider below it
    // does and pulls the native actor into existence on demand.
    let body_node = f.node(None, "pending", 0.0);
    let body = f.ctx.register_rigidbody(Rigidbody::new(body_node));
    let (_, collider) = f.collider_at(Some(body_node), "shape", 0.0);

    assert!(f.ctx.body(body).unwrap().has_native());
    assert_eq!(f.ctx.collider(collider).unwrap().owning_body(), Some(body));

    // The frame driver sweeps on its own; no explicit call needed.
    f.ctx.step(&mut f.scene, &f.world, 1.0 / 60.0);

    // The speculative actor is gone and the collider found a new home.
    assert!(!f.ctx.body(body).unwrap().has_native());
    let c = f.ctx.collider(collider).unwrap();
    assert!(c.is_attached());
    assert_eq!(c.owning_body(), None);
}

#[test]
fn repeated_joint_writes_coalesce_into_one_native_update() {
    let mut f = Fixture::new();
    let (node_a, body_a) = f.body_at(None, "a", 0.0);
    let (_, body_b) = f.body_at(None, "b", 2.0);

    let joint = f
        .ctx
        .register_joint(Joint::new(
            node_a,
            JointKind::Fixed,
            body_a,
            Some(body_b),
        ))
        .unwrap();
    f.ctx.on_node_created(&f.scene, &f.wref, node_a);
    assert!(f.ctx.joint(joint).unwrap().has_native());

    f.world.lock().reset_stats();
    for i in 0..5 {
        f.ctx
            .joint_mut(joint)
            .unwrap()
            .set_kind(JointKind::Hinge {
                limits: Some([0.0, i as f32]),
            });
    }
    f.ctx.step(&mut f.scene, &f.world, 1.0 / 60.0);

    assert_eq!(f.world.lock().stats().joint_updates, 1);

    // A clean step pushes nothing further.
    f.ctx.step(&mut f.scene, &f.world, 1.0 / 60.0);
    assert_eq!(f.world.lock().stats().joint_updates, 1);
}

#[test]
fn rebinding_a_joint_recreates_the_native_constraint() {
    let mut f = Fixture::new();
    let (node_a, body_a) = f.body_at(None, "a", 0.0);
    let (_, body_b) = f.body_at(None, "b", 2.0);
    let (_, body_c) = f.body_at(None, "c", 4.0);

    let joint = f
        .ctx
        .register_joint(Joint::new(node_a, JointKind::Fixed, body_a, Some(body_b)))
        .unwrap();
    f.ctx.on_node_created(&f.scene, &f.wref, node_a);
    assert!(f.ctx.joint(joint).unwrap().has_native());

    f.ctx
        .joint_mut(joint)
        .unwrap()
        .set_body_b(Some(body_c))
        .unwrap();
    f.ctx.step(&mut f.scene, &f.world, 1.0 / 60.0);

    assert!(f.ctx.joint(joint).unwrap().has_native());
    assert_eq!(f.world.lock().joint_count(), 1);

    // Drag the former endpoint away; the joint must not pull `a` with it.
    f.ctx
        .body(body_b)
        .unwrap()
        .set_linear_velocity(Vector3::new(50.0, 0.0, 0.0))
        .unwrap();
    for _ in 0..60 {
        f.ctx.step(&mut f.scene, &f.world, 1.0 / 60.0);
    }
    let a_x = f.scene.world_isometry(node_a).translation.vector.x;
    assert!(a_x.abs() < 1.0, "body a followed its former joint partner: x = {a_x}");
}

#[test]
fn rebinding_a_joint_onto_its_first_body_is_rejected() {
    let mut f = Fixture::new();
    let (node_a, body_a) = f.body_at(None, "a", 0.0);
    let (_, body_b) = f.body_at(None, "b", 2.0);

    let joint = f
        .ctx
        .register_joint(Joint::new(node_a, JointKind::Fixed, body_a, Some(body_b)))
        .unwrap();
    f.ctx.on_node_created(&f.scene, &f.wref, node_a);

    let err = f
        .ctx
        .joint_mut(joint)
        .unwrap()
        .set_body_b(Some(body_a))
        .unwrap_err();
    assert!(matches!(err, PhysicsError::InvalidParameter(_)));
    assert_eq!(f.ctx.joint(joint).unwrap().body_b(), Some(body_b));
}

#[test]
fn self_connected_joint_is_rejected_at_registration() {
    let mut f = Fixture::new();
    let (node_a, body_a) = f.body_at(None, "a", 0.0);

    let err = f
        .ctx
        .register_joint(Joint::new(node_a, JointKind::Fixed, body_a, Some(body_a)))
        .unwrap_err();
    assert!(matches!(err, PhysicsError::InvalidParameter(_)));
}

#[test]
fn world_anchored_joint_uses_a_hidden_ground_body() {
    let mut f = Fixture::new();
    let (node_a, body_a) = f.body_at(None, "a", 1.0);

    let joint = f
        .ctx
        .register_joint(Joint::new(node_a, JointKind::Fixed, body_a, None))
        .unwrap();
    f.ctx.on_node_created(&f.scene, &f.wref, node_a);

    assert!(f.ctx.joint(joint).unwrap().has_native());
    // One actor plus the lazily created ground anchor.
    assert_eq!(f.native_bodies(), 2);
    assert_eq!(f.world.lock().joint_count(), 1);
}

#[test]
fn node_destruction_is_idempotent_and_total() {
    let mut f = Fixture::new();
    let (root, _) = f.body_at(None, "body", 0.0);
    f.collider_at(Some(root), "shape", 0.0);

    f.ctx.on_node_destroyed(&f.scene, &f.wref, root);
    assert_eq!(f.native_bodies(), 0);
    assert_eq!(f.native_shapes(), 0);
    assert_eq!(f.ctx.body_count(), 0);
    assert_eq!(f.ctx.collider_count(), 0);

    // Already gone: harmless.
    f.ctx.on_node_destroyed(&f.scene, &f.wref, root);
    f.scene.remove_node(root);
}

#[test]
fn disable_enable_cycle_recreates_the_native_actor() {
    let mut f = Fixture::new();
    let (root, body) = f.body_at(None, "body", 0.0);

    let first = f.ctx.body(body).unwrap().native_id().unwrap();

    f.scene.set_enabled(root, false);
    f.ctx.on_node_disabled(&f.scene, &f.wref, root);
    assert!(!f.ctx.body(body).unwrap().has_native());
    assert_eq!(f.native_bodies(), 0);

    f.scene.set_enabled(root, true);
    f.ctx.on_node_enabled(&f.scene, &f.wref, root);
    let second = f.ctx.body(body).unwrap().native_id().unwrap();
    assert_ne!(first, second);
}

#[test]
fn failed_shape_rebuild_tears_down_the_attachment() {
    let mut f = Fixture::new();
    let (root, body) = f.body_at(None, "body", 0.0);
    let (_, collider) = f.collider_at(Some(root), "shape", 0.0);
    let old_id = f.ctx.collider(collider).unwrap().attachment_id();
    assert!(old_id.is_valid());

    // Two points have no hull; the stale native shape must not survive.
    f.ctx.set_collider_shape(
        &f.scene,
        collider,
        ShapeKind::ConvexMesh {
            points: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
        },
    );

    let c = f.ctx.collider(collider).unwrap();
    assert!(!c.is_attached());
    assert!(!c.attachment_id().is_valid());
    assert_eq!(f.native_shapes(), 0);
    assert_eq!(f.ctx.body(body).unwrap().attached_colliders().len(), 0);
    // Events already in flight still resolve for one pass.
    assert_eq!(f.ctx.resolve_collider(old_id), Some(collider));
}

#[test]
fn scale_drift_rebakes_collider_geometry_once() {
    let mut f = Fixture::new();
    let (root, _) = f.body_at(None, "body", 0.0);
    let (shape_node, collider) = f.collider_at(Some(root), "shape", 0.0);

    f.world.lock().reset_stats();
    f.ctx.refresh_collider_scale(&f.scene, collider);
    assert_eq!(f.world.lock().stats().shape_rebuilds, 0);

    f.scene.node_mut(shape_node).unwrap().local_scale = Vector3::new(3.0, 3.0, 3.0);
    f.ctx.refresh_collider_scale(&f.scene, collider);
    assert_eq!(f.world.lock().stats().shape_rebuilds, 1);
    assert!(f.ctx.collider(collider).unwrap().is_attached());

    // Unchanged scale does not rebuild again.
    f.ctx.refresh_collider_scale(&f.scene, collider);
    assert_eq!(f.world.lock().stats().shape_rebuilds, 1);
}

#[test]
fn sleeping_bodies_leave_the_pose_mirror() {
    let mut f = Fixture::new();
    let (root, body) = f.body_at(None, "body", 1.0);
    f.collider_at(Some(root), "shape", 0.0);
    f.ctx.body_mut(body).unwrap().set_gravity_enabled(false).unwrap();

    let id = f.ctx.body(body).unwrap().native_id().unwrap();
    assert!(f.ctx.transforms().contains(id));

    // Motionless long enough to fall asleep.
    for _ in 0..300 {
        f.ctx.step(&mut f.scene, &f.world, 1.0 / 60.0);
    }
    assert!(f.world.lock().is_sleeping(id).unwrap());
    assert!(!f.ctx.transforms().contains(id));

    // Waking re-enters it.
    f.ctx
        .body(body)
        .unwrap()
        .set_linear_velocity(Vector3::new(0.0, 1.0, 0.0))
        .unwrap();
    f.ctx.step(&mut f.scene, &f.world, 1.0 / 60.0);
    assert!(f.ctx.transforms().contains(id));
}

#[test]
fn trigger_overlap_produces_enter_and_exit_events() {
    let mut f = Fixture::new();

    // A falling ball passing through a static trigger volume.
    let ball_node = f.node(None, "ball", 3.0);
    f.ctx.register_rigidbody(Rigidbody::new(ball_node));
    let ball_shape = f.scene.add_child(ball_node, Node::new("shape"));
    f.ctx
        .register_collider(Collider::new(ball_shape, ShapeKind::sphere(0.5)));
    f.ctx.on_node_created(&f.scene, &f.wref, ball_node);
    f.ctx.on_node_created(&f.scene, &f.wref, ball_shape);

    let zone = f.node(None, "zone", 0.0);
    let zone_key = f.ctx.register_collider(
        Collider::new(zone, ShapeKind::cuboid(5.0, 0.5, 5.0)).with_trigger(true),
    );
    f.ctx.on_node_created(&f.scene, &f.wref, zone);

    let mut entered = false;
    let mut exited = false;
    for _ in 0..240 {
        for event in f.ctx.step(&mut f.scene, &f.world, 1.0 / 60.0) {
            let involves_zone = event.collider_a == zone_key || event.collider_b == zone_key;
            if involves_zone && event.kind == PhysicsEventKind::TriggerEntered {
                entered = true;
            }
            if involves_zone && event.kind == PhysicsEventKind::TriggerExited {
                exited = true;
            }
        }
    }
    assert!(entered, "ball never entered the trigger");
    assert!(exited, "ball never left the trigger");
}

#[test]
fn shutdown_survives_a_world_dropped_first() {
    let mut f = Fixture::new();
    let (root, _) = f.body_at(None, "body", 0.0);
    f.collider_at(Some(root), "shape", 0.0);

    drop(f.world);
    assert!(!f.wref.is_valid());

    // Teardown against the dead world absorbs every failure.
    f.ctx.shutdown();
    assert_eq!(f.ctx.body_count(), 0);
    assert_eq!(f.ctx.collider_count(), 0);
}

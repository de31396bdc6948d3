//! Native simulation world boundary.
//!
//! [`PhysicsWorld`] is the only place the native engine is touched. Every
//! operation takes typed identities and returns a typed [`Result`]; absence
//! of the target is an error everywhere except the two removal operations
//! (`remove_actor`, `remove_joint`), which report it as `Ok(false)` so that
//! teardown can be retried safely.

use crate::body::{ActorOptions, FreezeFlags, MotionKind};
use crate::config::PhysicsConfig;
use crate::error::{PhysicsError, Result};
use crate::ids::{ChildColliderKey, ColliderId, JointId, RigidbodyId, WorldId};
use crate::shape::ShapeRecord;
use parking_lot::Mutex;
use rapier3d::na::{Isometry3, Point3, Vector3};
use rapier3d::prelude as rapier;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Shared ownership of one native world; the engine side of a
/// [`crate::handle::WorldRef`].
pub type SharedWorld = Arc<Mutex<PhysicsWorld>>;

static NEXT_WORLD_ID: AtomicU32 = AtomicU32::new(0);

/// Per-body velocity caps, applied after every substep.
#[derive(Debug, Clone, Copy)]
struct VelocityLimits {
    max_linear: f32,
    max_angular: f32,
}

/// Boundary call counters, reset on demand.
#[derive(Debug, Default, Clone, Copy)]
pub struct PhysicsStats {
    /// Substeps executed.
    pub substeps: u64,
    /// Joint configuration pushes (one per flushed dirty joint).
    pub joint_updates: u64,
    /// Shape record rebuild pushes.
    pub shape_rebuilds: u64,
}

impl PhysicsStats {
    /// Reset all counters to zero.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// One collision event as reported by the native engine, in boundary terms.
#[derive(Debug, Clone, Copy)]
pub struct RawCollisionEvent {
    /// First involved attachment.
    pub a: ColliderId,
    /// Second involved attachment.
    pub b: ColliderId,
    /// Whether contact started (else stopped).
    pub started: bool,
    /// Whether either shape is a trigger.
    pub is_trigger: bool,
}

/// Everything one step produced.
#[derive(Debug, Default)]
pub struct StepOutput {
    /// Collision and trigger transitions.
    pub events: Vec<RawCollisionEvent>,
    /// Dynamic bodies that fell asleep during this step.
    pub slept: Vec<RigidbodyId>,
    /// Dynamic bodies that woke up during this step.
    pub woke: Vec<RigidbodyId>,
    /// Substeps executed.
    pub substeps: u32,
}

/// The native simulation world and its auxiliary state.
pub struct PhysicsWorld {
    id: WorldId,
    config: PhysicsConfig,

    pipeline: rapier::PhysicsPipeline,
    gravity: rapier::Vector<f32>,
    integration_params: rapier::IntegrationParameters,
    islands: rapier::IslandManager,
    broad_phase: rapier::DefaultBroadPhase,
    narrow_phase: rapier::NarrowPhase,
    impulse_joints: rapier::ImpulseJointSet,
    multibody_joints: rapier::MultibodyJointSet,
    ccd_solver: rapier::CCDSolver,
    bodies: rapier::RigidBodySet,
    colliders: rapier::ColliderSet,

    /// Velocity caps the native engine does not model itself.
    limits: HashMap<rapier::RigidBodyHandle, VelocityLimits>,
    /// Dynamic bodies that were awake after the previous step.
    awake: HashSet<rapier::RigidBodyHandle>,
    /// Hidden static body backing world-anchored joints.
    ground: Option<rapier::RigidBodyHandle>,

    accumulated_time: f32,
    stats: PhysicsStats,
}

impl PhysicsWorld {
    /// Create a new native world.
    pub fn new(config: PhysicsConfig) -> Self {
        let gravity = rapier::Vector::new(config.gravity[0], config.gravity[1], config.gravity[2]);

        let mut integration_params = rapier::IntegrationParameters::default();
        integration_params.dt = config.timestep;
        if let Some(iterations) = NonZeroUsize::new(config.solver_iterations) {
            integration_params.num_solver_iterations = iterations;
        }

        Self {
            id: WorldId(NEXT_WORLD_ID.fetch_add(1, Ordering::Relaxed)),
            config,
            pipeline: rapier::PhysicsPipeline::new(),
            gravity,
            integration_params,
            islands: rapier::IslandManager::new(),
            broad_phase: rapier::DefaultBroadPhase::new(),
            narrow_phase: rapier::NarrowPhase::new(),
            impulse_joints: rapier::ImpulseJointSet::new(),
            multibody_joints: rapier::MultibodyJointSet::new(),
            ccd_solver: rapier::CCDSolver::new(),
            bodies: rapier::RigidBodySet::new(),
            colliders: rapier::ColliderSet::new(),
            limits: HashMap::new(),
            awake: HashSet::new(),
            ground: None,
            accumulated_time: 0.0,
            stats: PhysicsStats::default(),
        }
    }

    /// Create a world and wrap it for shared access.
    pub fn new_shared(config: PhysicsConfig) -> SharedWorld {
        Arc::new(Mutex::new(Self::new(config)))
    }

    /// This world's identity.
    pub fn id(&self) -> WorldId {
        self.id
    }

    /// The configuration the world was created with.
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Boundary call counters.
    pub fn stats(&self) -> &PhysicsStats {
        &self.stats
    }

    /// Reset boundary call counters.
    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    fn body(&self, id: RigidbodyId) -> Result<&rapier::RigidBody> {
        self.bodies
            .get(id.to_native())
            .ok_or(PhysicsError::BodyNotFound(id))
    }

    fn body_mut(&mut self, id: RigidbodyId) -> Result<&mut rapier::RigidBody> {
        self.bodies
            .get_mut(id.to_native())
            .ok_or(PhysicsError::BodyNotFound(id))
    }

    // ==================== Actors ====================

    /// Create a native body from aggregated options, attaching all supplied
    /// shape records. Returns the body id plus one child key per shape, in
    /// input order.
    pub fn add_actor(
        &mut self,
        options: &ActorOptions,
    ) -> Result<(RigidbodyId, Vec<ChildColliderKey>)> {
        let body_type = match options.motion {
            MotionKind::Static => rapier::RigidBodyType::Fixed,
            MotionKind::Dynamic => rapier::RigidBodyType::Dynamic,
            MotionKind::Kinematic => rapier::RigidBodyType::KinematicPositionBased,
        };

        let mut builder = rapier::RigidBodyBuilder::new(body_type).position(options.pose);
        if options.motion != MotionKind::Static {
            let d = &options.dynamics;
            builder = builder
                .additional_mass(d.mass)
                .gravity_scale(if d.gravity_enabled { 1.0 } else { 0.0 })
                .linear_damping(d.linear_damping)
                .angular_damping(d.angular_damping)
                .locked_axes(d.freeze.to_native())
                .can_sleep(self.config.sleeping_enabled);
        }

        let native = self.bodies.insert(builder);
        let id = RigidbodyId::from_native(native);

        if options.motion != MotionKind::Static {
            let d = options.dynamics;
            self.limits.insert(
                native,
                VelocityLimits {
                    max_linear: d.max_linear_velocity,
                    max_angular: d.max_angular_velocity,
                },
            );
            if self.config.sleeping_enabled {
                self.set_sleep_threshold(id, d.sleep_threshold)?;
            }
        }

        let mut keys = Vec::with_capacity(options.shapes.len());
        for record in &options.shapes {
            keys.push(self.attach_shape(id, record)?);
        }

        Ok((id, keys))
    }

    /// Remove a native body and everything attached to it.
    ///
    /// Returns `Ok(false)` when the body is already gone.
    pub fn remove_actor(&mut self, id: RigidbodyId) -> Result<bool> {
        if !id.is_valid() {
            return Ok(false);
        }
        let native = id.to_native();
        let removed = self
            .bodies
            .remove(
                native,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .is_some();
        self.limits.remove(&native);
        self.awake.remove(&native);
        Ok(removed)
    }

    /// World-space pose of a body.
    pub fn pose(&self, id: RigidbodyId) -> Result<Isometry3<f32>> {
        Ok(*self.body(id)?.position())
    }

    /// Set the world-space pose of a body. Kinematic bodies are moved via
    /// their interpolation target instead of teleported.
    pub fn set_pose(&mut self, id: RigidbodyId, pose: Isometry3<f32>) -> Result<()> {
        let body = self.body_mut(id)?;
        if body.body_type() == rapier::RigidBodyType::KinematicPositionBased {
            body.set_next_kinematic_position(pose);
        } else {
            body.set_position(pose, true);
        }
        Ok(())
    }

    // ==================== Body mutators ====================

    /// Change the motion kind of an existing body.
    pub fn set_motion(&mut self, id: RigidbodyId, motion: MotionKind) -> Result<()> {
        let body_type = match motion {
            MotionKind::Static => rapier::RigidBodyType::Fixed,
            MotionKind::Dynamic => rapier::RigidBodyType::Dynamic,
            MotionKind::Kinematic => rapier::RigidBodyType::KinematicPositionBased,
        };
        self.body_mut(id)?.set_body_type(body_type, true);
        Ok(())
    }

    /// Set body mass.
    pub fn set_mass(&mut self, id: RigidbodyId, mass: f32) -> Result<()> {
        self.body_mut(id)?.set_additional_mass(mass, true);
        Ok(())
    }

    /// Override the local center of mass.
    pub fn set_center_of_mass(&mut self, id: RigidbodyId, com: Vector3<f32>, mass: f32) -> Result<()> {
        let props = rapier::MassProperties::new(
            Point3::from(com),
            mass,
            Vector3::repeat(mass * 0.4),
        );
        self.body_mut(id)?.set_additional_mass_properties(props, true);
        Ok(())
    }

    /// Enable or disable gravity for a body.
    pub fn set_gravity_enabled(&mut self, id: RigidbodyId, enabled: bool) -> Result<()> {
        self.body_mut(id)?
            .set_gravity_scale(if enabled { 1.0 } else { 0.0 }, true);
        Ok(())
    }

    /// Set linear and angular damping.
    pub fn set_damping(&mut self, id: RigidbodyId, linear: f32, angular: f32) -> Result<()> {
        let body = self.body_mut(id)?;
        body.set_linear_damping(linear);
        body.set_angular_damping(angular);
        Ok(())
    }

    /// Set per-axis freeze flags.
    pub fn set_freeze(&mut self, id: RigidbodyId, freeze: FreezeFlags) -> Result<()> {
        self.body_mut(id)?.set_locked_axes(freeze.to_native(), true);
        Ok(())
    }

    /// Set the velocity caps enforced after each substep.
    pub fn set_velocity_limits(
        &mut self,
        id: RigidbodyId,
        max_linear: f32,
        max_angular: f32,
    ) -> Result<()> {
        self.body(id)?;
        self.limits.insert(
            id.to_native(),
            VelocityLimits {
                max_linear,
                max_angular,
            },
        );
        Ok(())
    }

    /// Current velocity caps for a body, if any were set.
    pub fn velocity_limits(&self, id: RigidbodyId) -> Result<Option<(f32, f32)>> {
        self.body(id)?;
        Ok(self
            .limits
            .get(&id.to_native())
            .map(|l| (l.max_linear, l.max_angular)))
    }

    /// Set the normalized linear velocity threshold below which the body may
    /// fall asleep. Negative values keep the body permanently awake.
    pub fn set_sleep_threshold(&mut self, id: RigidbodyId, threshold: f32) -> Result<()> {
        let body = self.body_mut(id)?;
        let activation = body.activation_mut();
        if threshold < 0.0 {
            activation.normalized_linear_threshold = -1.0;
            activation.angular_threshold = -1.0;
        } else {
            activation.normalized_linear_threshold = threshold;
        }
        Ok(())
    }

    /// Current sleep threshold of a body.
    pub fn sleep_threshold(&self, id: RigidbodyId) -> Result<f32> {
        Ok(self.body(id)?.activation().normalized_linear_threshold)
    }

    /// Set linear velocity.
    pub fn set_linear_velocity(&mut self, id: RigidbodyId, velocity: Vector3<f32>) -> Result<()> {
        self.body_mut(id)?.set_linvel(velocity, true);
        Ok(())
    }

    /// Linear velocity.
    pub fn linear_velocity(&self, id: RigidbodyId) -> Result<Vector3<f32>> {
        Ok(*self.body(id)?.linvel())
    }

    /// Set angular velocity.
    pub fn set_angular_velocity(&mut self, id: RigidbodyId, velocity: Vector3<f32>) -> Result<()> {
        self.body_mut(id)?.set_angvel(velocity, true);
        Ok(())
    }

    /// Angular velocity.
    pub fn angular_velocity(&self, id: RigidbodyId) -> Result<Vector3<f32>> {
        Ok(*self.body(id)?.angvel())
    }

    /// Whether the body is asleep.
    pub fn is_sleeping(&self, id: RigidbodyId) -> Result<bool> {
        Ok(self.body(id)?.is_sleeping())
    }

    /// Wake a sleeping body.
    pub fn wake(&mut self, id: RigidbodyId) -> Result<()> {
        self.body_mut(id)?.wake_up(true);
        Ok(())
    }

    /// Motion kind of a body.
    pub fn motion(&self, id: RigidbodyId) -> Result<MotionKind> {
        Ok(match self.body(id)?.body_type() {
            rapier::RigidBodyType::Fixed => MotionKind::Static,
            rapier::RigidBodyType::Dynamic => MotionKind::Dynamic,
            _ => MotionKind::Kinematic,
        })
    }

    /// Enable or disable collision detection for every shape of a body.
    pub fn set_detect_collisions(&mut self, id: RigidbodyId, enabled: bool) -> Result<()> {
        let attached: Vec<_> = self.body(id)?.colliders().to_vec();
        for handle in attached {
            if let Some(collider) = self.colliders.get_mut(handle) {
                collider.set_enabled(enabled);
            }
        }
        Ok(())
    }

    // ==================== Shapes ====================

    /// Attach one shape record to a body, returning its per-body slot key.
    pub fn attach_shape(
        &mut self,
        body: RigidbodyId,
        record: &ShapeRecord,
    ) -> Result<ChildColliderKey> {
        self.body(body)?;
        let builder = Self::shape_builder(record);
        let handle = self
            .colliders
            .insert_with_parent(builder, body.to_native(), &mut self.bodies);
        Ok(ChildColliderKey::from_native(handle))
    }

    /// Detach one shape. Returns `Ok(false)` when the slot is already empty.
    pub fn detach_shape(&mut self, id: ColliderId) -> Result<bool> {
        if !id.is_valid() {
            return Ok(false);
        }
        Ok(self
            .colliders
            .remove(id.key.to_native(), &mut self.islands, &mut self.bodies, true)
            .is_some())
    }

    /// Push a rebuilt shape record over an existing attachment.
    pub fn update_shape(&mut self, id: ColliderId, record: &ShapeRecord) -> Result<()> {
        let collider = self
            .colliders
            .get_mut(id.key.to_native())
            .ok_or(PhysicsError::ColliderNotFound(id))?;
        collider.set_shape(record.shape.clone());
        collider.set_position_wrt_parent(record.local_pose);
        collider.set_sensor(record.is_trigger);
        collider.set_friction(record.material.friction);
        collider.set_restitution(record.material.restitution);
        collider.set_density(record.material.density);
        collider.set_friction_combine_rule(record.material.friction_combine.to_native());
        collider.set_restitution_combine_rule(record.material.restitution_combine.to_native());
        collider.set_collision_groups(record.filter.to_native());
        self.stats.shape_rebuilds += 1;
        Ok(())
    }

    /// Enable or disable one attached shape.
    pub fn set_shape_enabled(&mut self, id: ColliderId, enabled: bool) -> Result<()> {
        self.colliders
            .get_mut(id.key.to_native())
            .ok_or(PhysicsError::ColliderNotFound(id))?
            .set_enabled(enabled);
        Ok(())
    }

    /// Whether one attached shape is enabled.
    pub fn is_shape_enabled(&self, id: ColliderId) -> Result<bool> {
        Ok(self
            .colliders
            .get(id.key.to_native())
            .ok_or(PhysicsError::ColliderNotFound(id))?
            .is_enabled())
    }

    fn shape_builder(record: &ShapeRecord) -> rapier::ColliderBuilder {
        rapier::ColliderBuilder::new(record.shape.clone())
            .active_events(rapier::ActiveEvents::COLLISION_EVENTS)
            .position(record.local_pose)
            .sensor(record.is_trigger)
            .friction(record.material.friction)
            .restitution(record.material.restitution)
            .density(record.material.density)
            .friction_combine_rule(record.material.friction_combine.to_native())
            .restitution_combine_rule(record.material.restitution_combine.to_native())
            .collision_groups(record.filter.to_native())
    }

    // ==================== Joints ====================

    fn ground_body(&mut self) -> rapier::RigidBodyHandle {
        *self.ground.get_or_insert_with(|| {
            self.bodies
                .insert(rapier::RigidBodyBuilder::new(rapier::RigidBodyType::Fixed))
        })
    }

    /// Create a native joint between `a` and `b` (or a hidden world anchor
    /// when `b` is absent).
    pub fn add_joint(
        &mut self,
        a: RigidbodyId,
        b: Option<RigidbodyId>,
        data: rapier::GenericJoint,
    ) -> Result<JointId> {
        self.body(a)?;
        let second = match b {
            Some(id) => {
                self.body(id)?;
                id.to_native()
            }
            None => self.ground_body(),
        };
        let handle = self
            .impulse_joints
            .insert(a.to_native(), second, data, true);
        Ok(JointId::from_native(handle))
    }

    /// Push a full joint configuration over an existing native joint.
    pub fn update_joint(&mut self, id: JointId, data: rapier::GenericJoint) -> Result<()> {
        let joint = self
            .impulse_joints
            .get_mut(id.to_native(), true)
            .ok_or(PhysicsError::JointNotFound(id))?;
        joint.data = data;
        self.stats.joint_updates += 1;
        Ok(())
    }

    /// Remove a native joint. Returns `Ok(false)` when it is already gone.
    pub fn remove_joint(&mut self, id: JointId) -> Result<bool> {
        if !id.is_valid() {
            return Ok(false);
        }
        Ok(self.impulse_joints.remove(id.to_native(), true).is_some())
    }

    /// Read back a joint's current native configuration.
    pub fn joint_data(&self, id: JointId) -> Result<rapier::GenericJoint> {
        Ok(self
            .impulse_joints
            .get(id.to_native())
            .ok_or(PhysicsError::JointNotFound(id))?
            .data)
    }

    // ==================== Simulation ====================

    /// Advance the simulation by `delta_time` using the fixed timestep,
    /// collecting collision events and sleep transitions.
    pub fn step(&mut self, delta_time: f32) -> StepOutput {
        let mut output = StepOutput::default();
        self.accumulated_time += delta_time;

        let mut steps = 0;
        while self.accumulated_time >= self.config.timestep && steps < self.config.max_substeps {
            self.substep(&mut output);
            self.accumulated_time -= self.config.timestep;
            steps += 1;
        }
        output.substeps = steps;
        self.collect_sleep_transitions(&mut output);
        output
    }

    fn substep(&mut self, output: &mut StepOutput) {
        let (collision_send, collision_recv) = crossbeam_channel::unbounded();
        let event_handler = ChannelEventCollector {
            collision_events: collision_send,
        };

        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            None,
            &(),
            &event_handler,
        );
        self.stats.substeps += 1;

        self.clamp_velocities();

        while let Ok(event) = collision_recv.try_recv() {
            let (h1, h2, started) = match event {
                rapier::CollisionEvent::Started(h1, h2, _) => (h1, h2, true),
                rapier::CollisionEvent::Stopped(h1, h2, _) => (h1, h2, false),
            };
            let c1 = self.colliders.get(h1);
            let c2 = self.colliders.get(h2);
            let is_trigger = c1.map(|c| c.is_sensor()).unwrap_or(false)
                || c2.map(|c| c.is_sensor()).unwrap_or(false);

            output.events.push(RawCollisionEvent {
                a: self.collider_id_of(h1),
                b: self.collider_id_of(h2),
                started,
                is_trigger,
            });
        }
    }

    fn collider_id_of(&self, handle: rapier::ColliderHandle) -> ColliderId {
        let body = self
            .colliders
            .get(handle)
            .and_then(|c| c.parent())
            .map(RigidbodyId::from_native)
            .unwrap_or(RigidbodyId::INVALID);
        ColliderId {
            body,
            key: ChildColliderKey::from_native(handle),
        }
    }

    fn clamp_velocities(&mut self) {
        for (&handle, limits) in &self.limits {
            if let Some(body) = self.bodies.get_mut(handle) {
                let linvel = *body.linvel();
                let speed = linvel.norm();
                if speed > limits.max_linear && limits.max_linear.is_finite() {
                    body.set_linvel(linvel * (limits.max_linear / speed), false);
                }
                let angvel = *body.angvel();
                let spin = angvel.norm();
                if spin > limits.max_angular && limits.max_angular.is_finite() {
                    body.set_angvel(angvel * (limits.max_angular / spin), false);
                }
            }
        }
    }

    fn collect_sleep_transitions(&mut self, output: &mut StepOutput) {
        for (handle, body) in self.bodies.iter() {
            if !body.is_dynamic() {
                continue;
            }
            let was_awake = self.awake.contains(&handle);
            let is_awake = !body.is_sleeping();
            if is_awake && !was_awake {
                self.awake.insert(handle);
                output.woke.push(RigidbodyId::from_native(handle));
            } else if !is_awake && was_awake {
                self.awake.remove(&handle);
                output.slept.push(RigidbodyId::from_native(handle));
            }
        }
    }

    // ==================== Introspection ====================

    /// Number of native bodies (including the hidden joint ground body).
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Number of attached shapes.
    pub fn shape_count(&self) -> usize {
        self.colliders.len()
    }

    /// Number of native joints.
    pub fn joint_count(&self) -> usize {
        self.impulse_joints.len()
    }
}

/// Channel-based event collector for the native pipeline.
struct ChannelEventCollector {
    collision_events: crossbeam_channel::Sender<rapier::CollisionEvent>,
}

impl rapier::EventHandler for ChannelEventCollector {
    fn handle_collision_event(
        &self,
        _bodies: &rapier::RigidBodySet,
        _colliders: &rapier::ColliderSet,
        event: rapier::CollisionEvent,
        _contact_pair: Option<&rapier::ContactPair>,
    ) {
        let _ = self.collision_events.send(event);
    }

    fn handle_contact_force_event(
        &self,
        _dt: f32,
        _bodies: &rapier::RigidBodySet,
        _colliders: &rapier::ColliderSet,
        _contact_pair: &rapier::ContactPair,
        _total_force_magnitude: f32,
    ) {
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::DynamicOptions;
    use crate::shape::{build_shape, ShapeKind};
    use crate::filter::CollisionFilter;
    use crate::material::PhysicsMaterial;

    fn ball_record() -> ShapeRecord {
        ShapeRecord {
            shape: build_shape(&ShapeKind::sphere(0.5), Vector3::new(1.0, 1.0, 1.0)).unwrap(),
            local_pose: Isometry3::identity(),
            material: PhysicsMaterial::default(),
            is_trigger: false,
            filter: CollisionFilter::ALL,
        }
    }

    fn dynamic_actor(pose: Isometry3<f32>) -> ActorOptions {
        ActorOptions {
            motion: MotionKind::Dynamic,
            pose,
            dynamics: DynamicOptions::default(),
            shapes: vec![ball_record()],
        }
    }

    #[test]
    fn add_and_remove_actor_is_idempotent() {
        let mut world = PhysicsWorld::new(PhysicsConfig::default());
        let (id, keys) = world.add_actor(&dynamic_actor(Isometry3::identity())).unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(world.body_count(), 1);

        assert!(world.remove_actor(id).unwrap());
        assert!(!world.remove_actor(id).unwrap());
        assert_eq!(world.body_count(), 0);
    }

    #[test]
    fn missing_body_is_a_typed_error() {
        let mut world = PhysicsWorld::new(PhysicsConfig::default());
        let err = world.set_mass(RigidbodyId::INVALID, 2.0).unwrap_err();
        assert!(matches!(err, PhysicsError::BodyNotFound(_)));
    }

    #[test]
    fn gravity_pulls_dynamic_bodies_down() {
        let mut world = PhysicsWorld::new(PhysicsConfig::default());
        let start = Isometry3::translation(0.0, 10.0, 0.0);
        let (id, _) = world.add_actor(&dynamic_actor(start)).unwrap();

        for _ in 0..60 {
            world.step(1.0 / 60.0);
        }
        let pose = world.pose(id).unwrap();
        assert!(pose.translation.vector.y < 10.0);
    }

    #[test]
    fn velocity_limits_cap_speed() {
        let mut world = PhysicsWorld::new(PhysicsConfig::default());
        let (id, _) = world.add_actor(&dynamic_actor(Isometry3::identity())).unwrap();
        world.set_velocity_limits(id, 1.0, 1.0).unwrap();
        world
            .set_linear_velocity(id, Vector3::new(100.0, 0.0, 0.0))
            .unwrap();

        world.step(1.0 / 30.0);
        let speed = world.linear_velocity(id).unwrap().norm();
        assert!(speed <= 1.0 + 1e-4, "speed {speed} not clamped");
    }

    #[test]
    fn detach_shape_reports_absence_as_false() {
        let mut world = PhysicsWorld::new(PhysicsConfig::default());
        let (id, keys) = world.add_actor(&dynamic_actor(Isometry3::identity())).unwrap();
        let collider = ColliderId { body: id, key: keys[0] };

        assert!(world.detach_shape(collider).unwrap());
        assert!(!world.detach_shape(collider).unwrap());
    }
}

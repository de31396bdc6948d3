//! Keel Physics - managed/native rigid body synchronization layer.
//!
//! This crate mirrors scene-graph-hosted components (rigid bodies, colliders,
//! joints) onto an opaque native simulation engine reachable only through
//! handles, and keeps the two representations consistent under arbitrary
//! orderings of creation, reparenting, enable/disable toggling, and
//! destruction.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                     PhysicsContext                        │
//! │  ┌──────────┐ ┌───────────┐ ┌────────┐ ┌──────────────┐  │
//! │  │  bodies  │ │ colliders │ │ joints │ │ dirty joints │  │
//! │  └──────────┘ └───────────┘ └────────┘ └──────────────┘  │
//! │  ┌──────────────────────┐ ┌───────────────────────────┐  │
//! │  │  id → key registries │ │  transform access array   │  │
//! │  └──────────────────────┘ └───────────────────────────┘  │
//! └───────────────────────────┬───────────────────────────────┘
//!                             │ boundary calls (Result-typed)
//!                             ▼
//!               ┌───────────────────────────┐
//!               │   PhysicsWorld (native)   │
//!               └───────────────────────────┘
//! ```
//!
//! Every native-touching call is fallible; the two removal operations
//! (body, joint) report absence as `Ok(false)` instead of an error so that
//! teardown stays idempotent.

pub mod body;
pub mod collider;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod filter;
pub mod handle;
pub mod ids;
pub mod joint;
pub mod lifecycle;
pub mod material;
pub mod shape;
pub mod sync;
pub mod transform_array;
pub mod world;

pub mod prelude {
    //! Common imports for physics functionality.
    pub use crate::body::{
        ActorOptions, BodyBridge, BodyKey, DynamicOptions, FreezeFlags, MotionKind, Rigidbody,
    };
    pub use crate::collider::{Collider, ColliderKey};
    pub use crate::config::PhysicsConfig;
    pub use crate::context::PhysicsContext;
    pub use crate::error::{PhysicsError, Result, ShapeError};
    pub use crate::events::{PhysicsEvent, PhysicsEventKind};
    pub use crate::filter::CollisionFilter;
    pub use crate::handle::{RigidbodyHandle, WorldRef};
    pub use crate::ids::{ChildColliderKey, ColliderId, JointId, RigidbodyId, WorldId};
    pub use crate::joint::{Joint, JointKey, JointKind};
    pub use crate::lifecycle::{LifecycleState, NativeLifecycle};
    pub use crate::material::{CombineRule, PhysicsMaterial};
    pub use crate::shape::{build_shape, ShapeKind, ShapeRecord};
    pub use crate::transform_array::TransformAccessArray;
    pub use crate::world::{PhysicsStats, PhysicsWorld, SharedWorld, StepOutput};
}

pub use prelude::*;

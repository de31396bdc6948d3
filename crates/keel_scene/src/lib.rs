//! Keel Scene - minimal scene graph hosting engine components.
//!
//! A [`SceneGraph`] is a tree of named nodes. Each node carries an enable
//! flag and a local TRS transform; world-space isometry and scale are
//! computed by walking the parent chain. Subsystems (physics, audio, ...)
//! bind their components to nodes by [`NodeId`] and react to the host's
//! structural callbacks (created/destroyed/enabled/disabled/reparented).

pub mod graph;
pub mod node;

pub use graph::SceneGraph;
pub use node::{Node, NodeId};

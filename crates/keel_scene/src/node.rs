//! Scene node data.

use keel_core::Handle;
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Handle to a node in a [`crate::SceneGraph`].
pub type NodeId = Handle<Node>;

/// A single node in the scene tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Display name, for logs and tooling.
    pub name: String,
    /// Whether this node itself is enabled. A node is only *active* when it
    /// and every ancestor are enabled.
    pub enabled: bool,
    /// Translation relative to the parent.
    pub local_position: Vector3<f32>,
    /// Rotation relative to the parent.
    pub local_rotation: UnitQuaternion<f32>,
    /// Scale relative to the parent.
    pub local_scale: Vector3<f32>,
    #[serde(skip)]
    pub(crate) parent: Option<NodeId>,
    #[serde(skip)]
    pub(crate) children: Vec<NodeId>,
}

impl Node {
    /// Create a node with identity transform.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            local_position: Vector3::zeros(),
            local_rotation: UnitQuaternion::identity(),
            local_scale: Vector3::new(1.0, 1.0, 1.0),
            parent: None,
            children: Vec::new(),
        }
    }

    /// Set the local translation.
    pub fn with_position(mut self, position: Vector3<f32>) -> Self {
        self.local_position = position;
        self
    }

    /// Set the local rotation.
    pub fn with_rotation(mut self, rotation: UnitQuaternion<f32>) -> Self {
        self.local_rotation = rotation;
        self
    }

    /// Set the local scale.
    pub fn with_scale(mut self, scale: Vector3<f32>) -> Self {
        self.local_scale = scale;
        self
    }

    /// Parent node, if any.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child nodes.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new("Node")
    }
}

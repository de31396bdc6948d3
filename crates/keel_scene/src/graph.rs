//! Scene tree storage and hierarchy queries.

use crate::node::{Node, NodeId};
use keel_core::Arena;
use nalgebra::{Isometry3, Translation3, Vector3};

/// A tree of scene nodes with world-transform evaluation.
///
/// The graph itself is purely structural: it knows nothing about the
/// components bound to its nodes. Subsystems observe structural changes
/// through their own callback entry points, driven by whoever mutates the
/// graph.
#[derive(Default)]
pub struct SceneGraph {
    nodes: Arena<Node>,
}

impl SceneGraph {
    /// Create an empty scene graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a root node.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        self.nodes.insert(node)
    }

    /// Insert a node as a child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, node: Node) -> NodeId {
        let id = self.nodes.insert(node);
        self.link(parent, id);
        id
    }

    /// Remove a node and its whole subtree. Returns false if already gone.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        let Some(node) = self.nodes.get(id) else {
            return false;
        };
        let children = node.children.clone();
        let parent = node.parent;
        for child in children {
            self.remove_node(child);
        }
        if let Some(parent) = parent {
            if let Some(p) = self.nodes.get_mut(parent) {
                p.children.retain(|c| *c != id);
            }
        }
        self.nodes.remove(id).is_some()
    }

    /// Reparent `id` under `new_parent` (or detach it to a root when `None`).
    ///
    /// Attaching a node under its own descendant is rejected.
    pub fn set_parent(&mut self, id: NodeId, new_parent: Option<NodeId>) -> bool {
        if !self.nodes.contains(id) {
            return false;
        }
        if let Some(p) = new_parent {
            if !self.nodes.contains(p) || p == id || self.is_descendant_of(p, id) {
                log::warn!("rejected reparent of {id:?} under {p:?}");
                return false;
            }
        }
        self.unlink(id);
        if let Some(p) = new_parent {
            self.link(p, id);
        }
        true
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = Some(parent);
        }
    }

    fn unlink(&mut self, id: NodeId) {
        let parent = self.nodes.get(id).and_then(|n| n.parent);
        if let Some(parent) = parent {
            if let Some(p) = self.nodes.get_mut(parent) {
                p.children.retain(|c| *c != id);
            }
        }
        if let Some(n) = self.nodes.get_mut(id) {
            n.parent = None;
        }
    }

    /// Borrow a node.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Mutably borrow a node.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Whether the node still exists.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(id)
    }

    /// Parent of `id`, if any.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    /// Toggle a node's own enable flag. Returns the previous value.
    pub fn set_enabled(&mut self, id: NodeId, enabled: bool) -> bool {
        match self.nodes.get_mut(id) {
            Some(n) => core::mem::replace(&mut n.enabled, enabled),
            None => false,
        }
    }

    /// Whether `id` and all of its ancestors are enabled.
    pub fn is_active(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            match self.nodes.get(node_id) {
                Some(n) if n.enabled => current = n.parent,
                _ => return false,
            }
        }
        true
    }

    /// Whether `node` sits below `ancestor` in the tree.
    pub fn is_descendant_of(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// World-space isometry (rotation + translation) of a node.
    ///
    /// Parent scale is folded into child translations; scale itself is
    /// reported separately by [`Self::world_scale`] because isometries
    /// cannot carry it.
    pub fn world_isometry(&self, id: NodeId) -> Isometry3<f32> {
        match self.nodes.get(id) {
            Some(n) => match n.parent {
                Some(parent) => {
                    let parent_scale = self.world_scale(parent);
                    let local = Isometry3::from_parts(
                        Translation3::from(n.local_position.component_mul(&parent_scale)),
                        n.local_rotation,
                    );
                    self.world_isometry(parent) * local
                }
                None => Isometry3::from_parts(
                    Translation3::from(n.local_position),
                    n.local_rotation,
                ),
            },
            None => Isometry3::identity(),
        }
    }

    /// Set a node's local transform so its world isometry matches `world`.
    ///
    /// Used by pose write-back; scale is left untouched.
    pub fn set_world_isometry(&mut self, id: NodeId, world: Isometry3<f32>) {
        let Some(n) = self.nodes.get(id) else {
            return;
        };
        let local = match n.parent {
            Some(parent) => {
                let parent_scale = self.world_scale(parent);
                let relative = self.world_isometry(parent).inverse() * world;
                let mut position = relative.translation.vector;
                // Undo the parent-scale fold applied when composing.
                position.component_mul_assign(&Vector3::new(
                    1.0 / parent_scale.x,
                    1.0 / parent_scale.y,
                    1.0 / parent_scale.z,
                ));
                (position, relative.rotation)
            }
            None => (world.translation.vector, world.rotation),
        };
        if let Some(n) = self.nodes.get_mut(id) {
            n.local_position = local.0;
            n.local_rotation = local.1;
        }
    }

    /// Accumulated world-space scale of a node (component-wise product of
    /// the ancestor chain; rotation-induced shear is not modeled).
    pub fn world_scale(&self, id: NodeId) -> Vector3<f32> {
        match self.nodes.get(id) {
            Some(n) => match n.parent {
                Some(parent) => self.world_scale(parent).component_mul(&n.local_scale),
                None => n.local_scale,
            },
            None => Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// Depth-first iteration over the subtree rooted at `root`, inclusive.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(n) = self.nodes.get(id) {
                out.push(id);
                stack.extend(n.children.iter().copied());
            }
        }
        out
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::UnitQuaternion;

    #[test]
    fn hierarchy_links() {
        let mut graph = SceneGraph::new();
        let root = graph.add_node(Node::new("root"));
        let child = graph.add_child(root, Node::new("child"));

        assert_eq!(graph.parent(child), Some(root));
        assert_eq!(graph.node(root).unwrap().children(), &[child]);

        assert!(graph.set_parent(child, None));
        assert_eq!(graph.parent(child), None);
        assert!(graph.node(root).unwrap().children().is_empty());
    }

    #[test]
    fn reparent_under_descendant_rejected() {
        let mut graph = SceneGraph::new();
        let a = graph.add_node(Node::new("a"));
        let b = graph.add_child(a, Node::new("b"));

        assert!(!graph.set_parent(a, Some(b)));
        assert_eq!(graph.parent(b), Some(a));
    }

    #[test]
    fn active_requires_whole_ancestor_chain() {
        let mut graph = SceneGraph::new();
        let a = graph.add_node(Node::new("a"));
        let b = graph.add_child(a, Node::new("b"));
        let c = graph.add_child(b, Node::new("c"));

        assert!(graph.is_active(c));
        graph.set_enabled(b, false);
        assert!(!graph.is_active(c));
        assert!(graph.is_active(a));
    }

    #[test]
    fn world_transform_composition() {
        let mut graph = SceneGraph::new();
        let a = graph.add_node(
            Node::new("a")
                .with_position(Vector3::new(10.0, 0.0, 0.0))
                .with_scale(Vector3::new(2.0, 2.0, 2.0)),
        );
        let b = graph.add_child(a, Node::new("b").with_position(Vector3::new(5.0, 0.0, 0.0)));

        let iso = graph.world_isometry(b);
        assert!((iso.translation.vector.x - 20.0).abs() < 1e-5);
        assert_eq!(graph.world_scale(b), Vector3::new(2.0, 2.0, 2.0));
    }

    #[test]
    fn remove_subtree() {
        let mut graph = SceneGraph::new();
        let a = graph.add_node(Node::new("a"));
        let b = graph.add_child(a, Node::new("b"));
        let c = graph.add_child(b, Node::new("c"));

        assert!(graph.remove_node(b));
        assert!(!graph.contains(b));
        assert!(!graph.contains(c));
        assert!(graph.contains(a));
        assert!(!graph.remove_node(b));
    }

    #[test]
    fn rotation_affects_child_position() {
        let mut graph = SceneGraph::new();
        let a = graph.add_node(Node::new("a").with_rotation(UnitQuaternion::from_euler_angles(
            0.0,
            core::f32::consts::FRAC_PI_2,
            0.0,
        )));
        let b = graph.add_child(a, Node::new("b").with_position(Vector3::new(1.0, 0.0, 0.0)));

        let iso = graph.world_isometry(b);
        assert!(iso.translation.vector.x.abs() < 1e-5);
        assert!((iso.translation.vector.z + 1.0).abs() < 1e-5);
    }
}

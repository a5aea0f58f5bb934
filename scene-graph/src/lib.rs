//! A hierarchy of transform nodes with lazily recomputed world matrices.
//!
//! Mutating a node's local transform marks it and every descendant dirty. World matrices are only
//! recomputed when queried, ancestors first.

mod cache;
mod node;
mod transform;

pub use cache::*;
pub use node::*;
pub use transform::*;

use generational_arena::Arena;
use glam::{Mat4, Quat, Vec3};

pub type BoneIndex = u32;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeId(pub generational_arena::Index);

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Unknown node ({0:?})")]
    UnknownNode(NodeId),

    #[error("Can not attach a node to itself ({0:?})")]
    SelfAttach(NodeId),

    #[error("Attaching {child:?} to {parent:?} would create a cycle")]
    Cycle { child: NodeId, parent: NodeId },
}

/// Implemented by node payloads that expose bones other nodes can be attached to.
pub trait BoneSockets {
    /// The matrix placing a bone's local frame inside its owner's object space, or `None` if the
    /// payload has no such bone.
    fn socket_matrix(&self, bone_index: BoneIndex) -> Option<Mat4>;
}

impl BoneSockets for () {
    fn socket_matrix(&self, _bone_index: BoneIndex) -> Option<Mat4> {
        None
    }
}

pub struct Graph<T> {
    nodes: Arena<Node<T>>,
}

impl<T> Default for Graph<T> {
    fn default() -> Self {
        Self {
            nodes: Arena::default(),
        }
    }
}

impl<T> Graph<T> {
    /// Add a new root node with an identity transform.
    pub fn insert(&mut self, payload: T) -> NodeId {
        self.insert_with_transform(Transform::IDENTITY, payload)
    }

    pub fn insert_with_transform(&mut self, local: Transform, payload: T) -> NodeId {
        NodeId(self.nodes.insert(Node::new(local, payload)))
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(id.0)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&Node<T>> {
        self.nodes.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node<T>)> {
        self.nodes.iter().map(|(index, node)| (NodeId(index), node))
    }

    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|(index, _)| NodeId(index)).collect()
    }

    pub fn payload(&self, id: NodeId) -> Option<&T> {
        self.nodes.get(id.0).map(|node| &node.payload)
    }

    pub fn payload_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.nodes.get_mut(id.0).map(|node| &mut node.payload)
    }

    /// Mutable access to two different payloads at once.
    pub fn payload_pair_mut(&mut self, a: NodeId, b: NodeId) -> (Option<&mut T>, Option<&mut T>) {
        debug_assert_ne!(a, b);
        let (a, b) = self.nodes.get2_mut(a.0, b.0);
        (a.map(|node| &mut node.payload), b.map(|node| &mut node.payload))
    }

    pub fn local(&self, id: NodeId) -> Option<&Transform> {
        self.nodes.get(id.0).map(|node| &node.local)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|node| node.parent)
    }

    pub fn parent_bone(&self, id: NodeId) -> Option<BoneIndex> {
        self.nodes.get(id.0).and_then(|node| node.parent_bone)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    pub fn is_dirty(&self, id: NodeId) -> bool {
        self.nodes.get(id.0).is_some_and(|node| node.world.is_stale())
    }

    pub fn set_local(&mut self, id: NodeId, local: Transform) {
        self.modify_local(id, |transform| *transform = local);
    }

    pub fn set_translation(&mut self, id: NodeId, translation: Vec3) {
        self.modify_local(id, |transform| transform.translation = translation);
    }

    pub fn set_rotation(&mut self, id: NodeId, rotation: Quat) {
        self.modify_local(id, |transform| transform.rotation = rotation.normalize());
    }

    pub fn set_scale(&mut self, id: NodeId, scale: Vec3) {
        self.modify_local(id, |transform| transform.scale = scale);
    }

    fn modify_local(&mut self, id: NodeId, f: impl FnOnce(&mut Transform)) {
        let Some(node) = self.nodes.get_mut(id.0) else {
            tracing::warn!("Can not modify transform of unknown node {:?}", id);
            return;
        };
        f(&mut node.local);
        self.mark_dirty(id);
    }

    /// Invalidate the world matrix of the node and, unconditionally, of every node below it.
    pub fn mark_dirty(&self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(current.0) else {
                continue;
            };
            node.world.invalidate();
            stack.extend_from_slice(&node.children);
        }
    }

    /// Remove `child` from its parent, if it has one. The child becomes a root and keeps its
    /// local transform.
    pub fn detach(&mut self, child: NodeId) {
        let Some(node) = self.nodes.get_mut(child.0) else {
            return;
        };

        let parent = node.parent.take();
        node.parent_bone = None;

        if let Some(parent) = parent
            && let Some(parent_node) = self.nodes.get_mut(parent.0)
        {
            parent_node.children.retain(|c| *c != child);
        }

        self.mark_dirty(child);
    }

    /// Make `child` a child of `parent`, optionally riding one of the parent's bones.
    pub fn attach(
        &mut self,
        child: NodeId,
        parent: NodeId,
        bone_index: Option<BoneIndex>,
    ) -> Result<(), GraphError> {
        if !self.contains(child) {
            return Err(GraphError::UnknownNode(child));
        }
        if !self.contains(parent) {
            return Err(GraphError::UnknownNode(parent));
        }
        if child == parent {
            return Err(GraphError::SelfAttach(child));
        }

        // Walking up from the new parent must never reach the child.
        let mut ancestor = Some(parent);
        while let Some(current) = ancestor {
            if current == child {
                return Err(GraphError::Cycle { child, parent });
            }
            ancestor = self.parent(current);
        }

        self.detach(child);

        if let Some(parent_node) = self.nodes.get_mut(parent.0) {
            parent_node.children.push(child);
        }
        if let Some(node) = self.nodes.get_mut(child.0) {
            node.parent = Some(parent);
            node.parent_bone = bone_index;
        }

        self.mark_dirty(child);

        Ok(())
    }

    /// Remove a node. Its children are handed to its parent (or become roots) and keep their
    /// local transforms.
    pub fn remove(&mut self, id: NodeId) -> Option<T> {
        let node = self.nodes.get(id.0)?;
        let new_parent = node.parent;
        let children = node.children.clone();

        self.detach(id);

        for child in children {
            if let Some(child_node) = self.nodes.get_mut(child.0) {
                child_node.parent = new_parent;
                child_node.parent_bone = None;
            }
            if let Some(parent) = new_parent
                && let Some(parent_node) = self.nodes.get_mut(parent.0)
            {
                parent_node.children.push(child);
            }
            self.mark_dirty(child);
        }

        self.nodes.remove(id.0).map(|node| node.payload)
    }

    /// Remove a node and everything below it. Returns the removed payloads, the given node's
    /// first.
    pub fn remove_recursive(&mut self, id: NodeId) -> Vec<T> {
        if !self.contains(id) {
            return Vec::default();
        }

        self.detach(id);

        let mut removed = Vec::default();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(current.0) {
                stack.extend(node.children.iter().rev());
                removed.push(node.payload);
            }
        }
        removed
    }
}

impl<T: BoneSockets> Graph<T> {
    /// The cached world matrix of the node, recomputed (ancestors first) if the node is dirty.
    /// Unknown nodes yield identity.
    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let Some(node) = self.nodes.get(id.0) else {
            return Mat4::IDENTITY;
        };

        node.world.get_or_refresh(|| {
            let local = node.local.to_mat4();
            match node.parent {
                Some(parent) => self.parent_matrix(parent, node.parent_bone) * local,
                None => local,
            }
        })
    }

    /// The matrix a child of `parent` is composed with: the parent's world matrix, followed by the
    /// bone socket if the child rides a bone.
    fn parent_matrix(&self, parent: NodeId, bone_index: Option<BoneIndex>) -> Mat4 {
        let parent_world = self.world_matrix(parent);

        let Some(bone_index) = bone_index else {
            return parent_world;
        };

        match self
            .nodes
            .get(parent.0)
            .and_then(|node| node.payload.socket_matrix(bone_index))
        {
            Some(socket) => parent_world * socket,
            None => parent_world,
        }
    }

    /// Set the node's local translation so that its world position becomes `position`.
    pub fn set_world_position(&mut self, id: NodeId, position: Vec3) {
        let Some(node) = self.nodes.get(id.0) else {
            tracing::warn!("Can not set world position of unknown node {:?}", id);
            return;
        };

        let local = match node.parent {
            Some(parent) => self
                .parent_matrix(parent, node.parent_bone)
                .inverse()
                .transform_point3(position),
            None => position,
        };

        self.set_translation(id, local);
    }

    pub fn world_position(&self, id: NodeId) -> Vec3 {
        self.world_matrix(id).w_axis.truncate()
    }
}

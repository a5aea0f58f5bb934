use crate::{BoneIndex, NodeId, cache::WorldCache, transform::Transform};

/// A single entry in the [crate::Graph]. The local transform is the source of truth, the world
/// matrix is a cache refreshed on demand.
pub struct Node<T> {
    pub(crate) local: Transform,
    /// Non-owning back reference.
    pub(crate) parent: Option<NodeId>,
    /// When set, the node rides this bone of its parent instead of the parent's root.
    pub(crate) parent_bone: Option<BoneIndex>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) world: WorldCache,
    pub(crate) payload: T,
}

impl<T> Node<T> {
    pub(crate) fn new(local: Transform, payload: T) -> Self {
        Self {
            local,
            parent: None,
            parent_bone: None,
            children: Vec::default(),
            world: WorldCache::default(),
            payload,
        }
    }

    #[inline]
    pub fn local(&self) -> &Transform {
        &self.local
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[inline]
    pub fn parent_bone(&self) -> Option<BoneIndex> {
        self.parent_bone
    }

    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.world.is_stale()
    }

    #[inline]
    pub fn payload(&self) -> &T {
        &self.payload
    }
}

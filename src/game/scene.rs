use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};
use scene_graph::{BoneIndex, BoneSockets, Graph, GraphError, NodeId, Transform};

use super::{
    events::{AnimEvent, AnimEventQueue},
    pose::Posable,
    settings::AnimationSettings,
    skeletal_mesh::SkeletalMesh,
    skinned_mesh::{BonePose, BoneRef, SkinnedMesh},
};

/// Payload of a scene node.
#[derive(Debug, Default)]
pub enum SceneObject {
    /// A plain transform, used for props, pivots and groups.
    #[default]
    Empty,
    Skinned(Box<SkinnedMesh>),
}

impl SceneObject {
    pub fn as_skinned(&self) -> Option<&SkinnedMesh> {
        match self {
            SceneObject::Skinned(skinned) => Some(skinned),
            SceneObject::Empty => None,
        }
    }

    pub fn as_skinned_mut(&mut self) -> Option<&mut SkinnedMesh> {
        match self {
            SceneObject::Skinned(skinned) => Some(skinned),
            SceneObject::Empty => None,
        }
    }

    pub fn as_posable(&self) -> Option<&dyn Posable> {
        self.as_skinned().map(|skinned| skinned as &dyn Posable)
    }
}

impl BoneSockets for SceneObject {
    fn socket_matrix(&self, bone_index: BoneIndex) -> Option<Mat4> {
        self.as_skinned()?.socket_matrix(bone_index)
    }
}

/// Owns the node hierarchy and drives animation once per tick.
#[derive(Default)]
pub struct Scene {
    graph: Graph<SceneObject>,
    settings: AnimationSettings,
    events: AnimEventQueue,
}

impl Scene {
    pub fn new(settings: AnimationSettings) -> Self {
        Self {
            graph: Graph::default(),
            settings,
            events: AnimEventQueue::default(),
        }
    }

    #[inline]
    pub fn graph(&self) -> &Graph<SceneObject> {
        &self.graph
    }

    #[inline]
    pub fn graph_mut(&mut self) -> &mut Graph<SceneObject> {
        &mut self.graph
    }

    #[inline]
    pub fn settings(&self) -> &AnimationSettings {
        &self.settings
    }

    pub fn spawn_empty(&mut self, local: Transform) -> NodeId {
        self.graph.insert_with_transform(local, SceneObject::Empty)
    }

    pub fn spawn_skinned(&mut self, mesh: Arc<SkeletalMesh>, local: Transform) -> NodeId {
        self.graph.insert_with_transform(
            local,
            SceneObject::Skinned(Box::new(SkinnedMesh::new(mesh))),
        )
    }

    /// Remove a node, handing its children to its parent.
    pub fn despawn(&mut self, id: NodeId) -> Option<SceneObject> {
        self.graph.remove(id)
    }

    pub fn attach(
        &mut self,
        child: NodeId,
        parent: NodeId,
        bone: Option<BoneIndex>,
    ) -> Result<(), GraphError> {
        self.graph.attach(child, parent, bone)
    }

    /// Attach `child` to a bone of a skinned `parent`. Unknown bones attach to the parent's
    /// root transform instead.
    pub fn attach_to_bone<'a>(
        &mut self,
        child: NodeId,
        parent: NodeId,
        bone: impl Into<BoneRef<'a>>,
    ) -> Result<(), GraphError> {
        let bone_index = match self.skinned(parent) {
            Some(skinned) => skinned.resolve_bone(bone),
            None => {
                tracing::warn!("Attaching to a bone of {parent:?}, which is not skinned");
                None
            }
        };
        self.graph.attach(child, parent, bone_index)
    }

    pub fn skinned(&self, id: NodeId) -> Option<&SkinnedMesh> {
        self.graph.payload(id).and_then(SceneObject::as_skinned)
    }

    pub fn skinned_mut(&mut self, id: NodeId) -> Option<&mut SkinnedMesh> {
        self.graph.payload_mut(id).and_then(SceneObject::as_skinned_mut)
    }

    #[inline]
    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        self.graph.world_matrix(id)
    }

    #[inline]
    pub fn world_position(&self, id: NodeId) -> Vec3 {
        self.graph.world_position(id)
    }

    /// Advance every skinned instance by `delta` seconds. Instances that were not rendered
    /// follow their update mode.
    pub fn tick(&mut self, delta: f32) {
        let skinned: Vec<NodeId> = self
            .graph
            .iter()
            .filter(|(_, node)| node.payload().as_skinned().is_some())
            .map(|(id, _)| id)
            .collect();

        for &id in skinned.iter() {
            if let Some(instance) = self.skinned_mut(id) {
                instance.begin_frame();
            }
        }

        for &id in skinned.iter() {
            let Some(instance) = self.skinned(id) else {
                continue;
            };
            let (update_time, update_bones) =
                instance.update_mode().resolve(instance.is_rendered());
            if update_time {
                self.update_animation(id, delta, update_bones);
            }
        }

        for &id in skinned.iter() {
            if let Some(instance) = self.skinned_mut(id) {
                instance.end_frame();
            }
        }
    }

    /// Update a single instance. An instance inheriting its pose updates its skinned parent
    /// first, always with bones, so the parent's pose is complete for everyone reading it this
    /// frame.
    pub fn update_animation(&mut self, id: NodeId, delta: f32, update_bones: bool) {
        let Some(instance) = self.skinned(id) else {
            tracing::warn!("Can not animate {id:?}, it is not a skinned mesh");
            return;
        };

        if instance.has_animated_this_frame() {
            return;
        }

        let pose_parent = if update_bones && instance.inherit_pose() {
            self.graph
                .parent(id)
                .filter(|&parent| self.skinned(parent).is_some())
        } else {
            None
        };

        if let Some(parent) = pose_parent
            && self
                .skinned(parent)
                .is_some_and(|parent| !parent.has_animated_this_frame())
        {
            self.update_animation(parent, delta, true);
        }

        let settings = self.settings;
        let (rewritten, events) = match pose_parent {
            Some(parent) => {
                let (Some(child), Some(parent)) = self.graph.payload_pair_mut(id, parent) else {
                    return;
                };
                let Some(child) = child.as_skinned_mut() else {
                    return;
                };
                let rewritten =
                    child.update_animation(delta, update_bones, parent.as_posable(), &settings);
                (rewritten, child.take_events())
            }
            None => {
                let Some(instance) = self.skinned_mut(id) else {
                    return;
                };
                let rewritten = instance.update_animation(delta, update_bones, None, &settings);
                (rewritten, instance.take_events())
            }
        };

        self.events.extend(id, events);

        if rewritten {
            self.refresh_bone_children(id);
        }
    }

    /// Mark every child riding a bone of `id` dirty.
    fn refresh_bone_children(&self, id: NodeId) {
        for &child in self.graph.children(id) {
            if self.graph.parent_bone(child).is_some() {
                self.graph.mark_dirty(child);
            }
        }
    }

    // Bones

    /// Pin a bone to an object space frame, see [SkinnedMesh::set_bone_transform].
    pub fn set_bone_transform<'a>(
        &mut self,
        id: NodeId,
        bone: impl Into<BoneRef<'a>>,
        matrix: Mat4,
    ) {
        let Some(instance) = self.skinned_mut(id) else {
            tracing::warn!("Can not set bone transform on {id:?}, it is not a skinned mesh");
            return;
        };
        instance.set_bone_transform(bone, matrix);
        self.refresh_bone_children(id);
    }

    pub fn clear_bone_transform<'a>(&mut self, id: NodeId, bone: impl Into<BoneRef<'a>>) {
        if let Some(instance) = self.skinned_mut(id) {
            instance.clear_bone_transform(bone);
            self.refresh_bone_children(id);
        }
    }

    /// World space transform of a bone.
    pub fn bone_transform<'a>(&self, id: NodeId, bone: impl Into<BoneRef<'a>>) -> Option<Mat4> {
        let object = self.skinned(id)?.bone_transform(bone)?;
        Some(self.graph.world_matrix(id) * object)
    }

    pub fn bone_pose<'a>(&self, id: NodeId, bone: impl Into<BoneRef<'a>>) -> Option<BonePose> {
        self.bone_transform(id, bone).map(BonePose::from_matrix)
    }

    pub fn bone_position<'a>(&self, id: NodeId, bone: impl Into<BoneRef<'a>>) -> Option<Vec3> {
        self.bone_pose(id, bone).map(|pose| pose.position)
    }

    pub fn bone_rotation<'a>(&self, id: NodeId, bone: impl Into<BoneRef<'a>>) -> Option<Quat> {
        self.bone_pose(id, bone).map(|pose| pose.rotation)
    }

    /// World space bone rotation as XYZ euler angles in degrees.
    pub fn bone_rotation_euler<'a>(
        &self,
        id: NodeId,
        bone: impl Into<BoneRef<'a>>,
    ) -> Option<Vec3> {
        self.bone_pose(id, bone).map(|pose| pose.rotation_euler())
    }

    pub fn bone_scale<'a>(&self, id: NodeId, bone: impl Into<BoneRef<'a>>) -> Option<Vec3> {
        self.bone_pose(id, bone).map(|pose| pose.scale)
    }

    // Events

    pub fn pending_events(&self) -> &[(NodeId, AnimEvent)] {
        self.events.pending()
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = (NodeId, AnimEvent)> + '_ {
        self.events.drain()
    }

    pub fn dispatch_events(&mut self, handler: impl FnMut(NodeId, &AnimEvent)) {
        self.events.dispatch(handler);
    }
}

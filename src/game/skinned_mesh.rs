use std::sync::Arc;

use bitflags::bitflags;
use glam::{EulerRot, Mat4, Quat, Vec3};
use scene_graph::{BoneIndex, Transform};

use super::{
    events::AnimEvent,
    playback::{ActiveAnimation, AnimationPlayback, PlayOptions},
    pose::{Posable, PoseSolver, check_inheritable},
    settings::{AnimationSettings, AnimationUpdateMode},
    skeletal_mesh::SkeletalMesh,
    skinning::{BoneInfluenceMode, Vertex, skin_vertices},
};

bitflags! {
    /// Boolean state of a skinned instance.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct SkinnedMeshFlags: u8 {
        /// Neither time nor bones advance.
        const PAUSED = 1 << 0;
        /// Copy bone matrices from a skinned parent instead of evaluating clips.
        const INHERIT_POSE = 1 << 1;
        /// Reset to the bind pose when nothing is playing.
        const REVERT_TO_BIND_POSE = 1 << 2;
        /// Set once the pose was computed for the current tick.
        const ANIMATED_THIS_FRAME = 1 << 3;
        /// Reported by the renderer for the current tick.
        const RENDERED = 1 << 4;
    }
}

/// Identifies a bone either by index or by name.
#[derive(Clone, Copy, Debug)]
pub enum BoneRef<'a> {
    Index(BoneIndex),
    Name(&'a str),
}

impl From<BoneIndex> for BoneRef<'_> {
    fn from(value: BoneIndex) -> Self {
        Self::Index(value)
    }
}

impl<'a> From<&'a str> for BoneRef<'a> {
    fn from(value: &'a str) -> Self {
        Self::Name(value)
    }
}

/// Per instance state of an animated, skinned mesh.
#[derive(Debug)]
pub struct SkinnedMesh {
    mesh: Arc<SkeletalMesh>,
    playback: AnimationPlayback,
    solver: PoseSolver,
    /// Finalized skinning matrices, one per bone.
    bone_matrices: Vec<Mat4>,
    overrides: Vec<Option<Mat4>>,
    skinned_vertices: Vec<Vertex>,
    /// Events produced by the last update, waiting to be collected.
    events: Vec<AnimEvent>,
    animation_speed: f32,
    flags: SkinnedMeshFlags,
    influence_mode: BoneInfluenceMode,
    update_mode: AnimationUpdateMode,
}

impl SkinnedMesh {
    pub fn new(mesh: Arc<SkeletalMesh>) -> Self {
        let bone_count = mesh.skeleton().bone_count();
        let bone_matrices = mesh.skeleton().finalized_bind_pose();

        let mut solver = PoseSolver::default();
        solver.reset_to_bind_pose(&mesh);

        Self {
            mesh,
            playback: AnimationPlayback::default(),
            solver,
            bone_matrices,
            overrides: vec![None; bone_count],
            skinned_vertices: Vec::default(),
            events: Vec::default(),
            animation_speed: 1.0,
            flags: SkinnedMeshFlags::REVERT_TO_BIND_POSE,
            influence_mode: BoneInfluenceMode::default(),
            update_mode: AnimationUpdateMode::default(),
        }
    }

    #[inline]
    pub fn mesh(&self) -> &Arc<SkeletalMesh> {
        &self.mesh
    }

    #[inline]
    pub fn playback(&self) -> &AnimationPlayback {
        &self.playback
    }

    // Playback

    pub fn play_animation(&mut self, name: &str, options: PlayOptions) {
        if !self.mesh.has_animation(name) {
            tracing::warn!(
                "Invalid animation name \"{name}\" for mesh \"{}\"",
                self.mesh.name()
            );
            return;
        }
        self.playback.play(name, options);
    }

    pub fn queue_animation(&mut self, name: &str, target: Option<&str>, options: PlayOptions) {
        if !self.mesh.has_animation(name) {
            tracing::warn!(
                "Invalid animation name \"{name}\" for mesh \"{}\"",
                self.mesh.name()
            );
            return;
        }
        self.playback.queue(name, target, options);
    }

    pub fn stop_animation(&mut self, name: &str, cancel_queued: bool) {
        self.playback.stop(name, cancel_queued);
    }

    pub fn stop_all_animations(&mut self, cancel_queued: bool) {
        self.playback.stop_all(cancel_queued);
    }

    pub fn cancel_queued_animation(&mut self, name: &str) {
        self.playback.cancel_queued(name);
    }

    pub fn cancel_all_queued_animations(&mut self) {
        self.playback.cancel_all_queued();
    }

    pub fn reset_animation(&mut self) {
        self.playback.reset();
    }

    pub fn is_animation_playing(&self, name: &str) -> bool {
        self.playback.is_playing(name)
    }

    pub fn find_active_animation(&self, name: &str) -> Option<&ActiveAnimation> {
        self.playback.find_active(name)
    }

    pub fn animation_duration(&self, name: &str) -> Option<f32> {
        self.mesh.animation_duration(name)
    }

    // Configuration

    #[inline]
    pub fn animation_speed(&self) -> f32 {
        self.animation_speed
    }

    pub fn set_animation_speed(&mut self, speed: f32) {
        self.animation_speed = speed;
    }

    #[inline]
    pub fn flags(&self) -> SkinnedMeshFlags {
        self.flags
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.flags.contains(SkinnedMeshFlags::PAUSED)
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.flags.set(SkinnedMeshFlags::PAUSED, paused);
    }

    #[inline]
    pub fn inherit_pose(&self) -> bool {
        self.flags.contains(SkinnedMeshFlags::INHERIT_POSE)
    }

    pub fn set_inherit_pose(&mut self, inherit: bool) {
        self.flags.set(SkinnedMeshFlags::INHERIT_POSE, inherit);
    }

    #[inline]
    pub fn revert_to_bind_pose(&self) -> bool {
        self.flags.contains(SkinnedMeshFlags::REVERT_TO_BIND_POSE)
    }

    pub fn set_revert_to_bind_pose(&mut self, revert: bool) {
        self.flags.set(SkinnedMeshFlags::REVERT_TO_BIND_POSE, revert);
    }

    #[inline]
    pub fn is_rendered(&self) -> bool {
        self.flags.contains(SkinnedMeshFlags::RENDERED)
    }

    pub fn set_rendered(&mut self, rendered: bool) {
        self.flags.set(SkinnedMeshFlags::RENDERED, rendered);
    }

    #[inline]
    pub fn influence_mode(&self) -> BoneInfluenceMode {
        self.influence_mode
    }

    pub fn set_influence_mode(&mut self, mode: BoneInfluenceMode) {
        self.influence_mode = mode;
    }

    #[inline]
    pub fn update_mode(&self) -> AnimationUpdateMode {
        self.update_mode
    }

    pub fn set_update_mode(&mut self, mode: AnimationUpdateMode) {
        self.update_mode = mode;
    }

    /// Clear per tick state before a new frame is simulated.
    pub fn begin_frame(&mut self) {
        self.flags.remove(SkinnedMeshFlags::ANIMATED_THIS_FRAME);
    }

    /// Clear state the renderer reports for a single frame.
    pub fn end_frame(&mut self) {
        self.flags.remove(SkinnedMeshFlags::RENDERED);
    }

    // Update

    /// Compute the pose for this tick, at most once per frame. `parent` is the pose source when
    /// inheriting; a parent with a different bone count is refused and the instance evaluates
    /// its own clips instead. Inheritance only applies to bone updates, a time only update
    /// advances the instance's own clips.
    ///
    /// Returns `true` when the bone matrices were rewritten.
    pub fn update_animation(
        &mut self,
        delta: f32,
        update_bones: bool,
        parent: Option<&dyn Posable>,
        settings: &AnimationSettings,
    ) -> bool {
        if self.has_animated_this_frame() {
            return false;
        }

        let mut inheriting = false;
        if update_bones
            && self.inherit_pose()
            && let Some(parent) = parent
        {
            match check_inheritable(parent, self.bone_count()) {
                Ok(()) => {
                    self.bone_matrices.clear();
                    self.bone_matrices
                        .extend_from_slice(parent.bone_matrices());
                    inheriting = true;
                }
                Err(err) => tracing::error!("{err}"),
            }
        }

        let evaluate = !self.is_paused()
            && !inheriting
            && (!self.playback.active().is_empty() || self.revert_to_bind_pose());

        if evaluate {
            self.solver.solve(
                &self.mesh,
                &mut self.playback,
                delta,
                self.animation_speed,
                update_bones,
                &mut self.bone_matrices,
                &mut self.events,
            );
        }

        let rewritten = update_bones && (evaluate || inheriting);
        if rewritten || (update_bones && self.is_paused()) {
            self.apply_overrides();
            if settings.cpu_skinning_required(self.bone_count()) {
                self.skin_vertices();
            }
        }

        self.flags.insert(SkinnedMeshFlags::ANIMATED_THIS_FRAME);

        rewritten
    }

    fn apply_overrides(&mut self) {
        for (bone, matrix) in self.bone_matrices.iter_mut().zip(self.overrides.iter()) {
            if let Some(matrix) = matrix {
                *bone = *matrix;
            }
        }
    }

    /// Blend the mesh vertices on the CPU with the current bone matrices.
    pub fn skin_vertices(&mut self) {
        skin_vertices(
            &self.bone_matrices,
            self.mesh.vertices(),
            self.influence_mode,
            &mut self.skinned_vertices,
        );
    }

    #[inline]
    pub fn skinned_vertices(&self) -> &[Vertex] {
        &self.skinned_vertices
    }

    /// Take the events produced since the last call.
    pub fn take_events(&mut self) -> Vec<AnimEvent> {
        std::mem::take(&mut self.events)
    }

    // Bones

    #[inline]
    pub fn bone_count(&self) -> usize {
        self.mesh.skeleton().bone_count()
    }

    pub fn find_bone_index(&self, name: &str) -> Option<BoneIndex> {
        self.mesh.skeleton().find_bone_index(name)
    }

    /// Resolve a bone reference, warning about names or indices the skeleton does not have.
    pub fn resolve_bone<'a>(&self, bone: impl Into<BoneRef<'a>>) -> Option<BoneIndex> {
        match bone.into() {
            BoneRef::Index(index) if (index as usize) < self.bone_count() => Some(index),
            BoneRef::Index(index) => {
                tracing::warn!(
                    "Invalid bone index {index}, mesh \"{}\" has {} bones",
                    self.mesh.name(),
                    self.bone_count()
                );
                None
            }
            BoneRef::Name(name) => {
                let index = self.find_bone_index(name);
                if index.is_none() {
                    tracing::warn!(
                        "Invalid bone name \"{name}\" for mesh \"{}\"",
                        self.mesh.name()
                    );
                }
                index
            }
        }
    }

    #[inline]
    pub fn bone_matrices(&self) -> &[Mat4] {
        &self.bone_matrices
    }

    /// Parent relative transform of a bone from the last evaluation.
    pub fn local_bone_transform<'a>(&self, bone: impl Into<BoneRef<'a>>) -> Option<Transform> {
        let index = self.resolve_bone(bone)?;
        self.solver.locals().get(index as usize).copied()
    }

    /// The animated frame of a bone in the mesh's object space, with the bind offset
    /// removed.
    pub fn socket_matrix(&self, index: BoneIndex) -> Option<Mat4> {
        let bone = self.mesh.skeleton().bone(index)?;
        let matrix = self.bone_matrices.get(index as usize)?;
        Some(*matrix * bone.inv_offset)
    }

    /// Object space bone transform.
    pub fn bone_transform<'a>(&self, bone: impl Into<BoneRef<'a>>) -> Option<Mat4> {
        let index = self.resolve_bone(bone)?;
        self.socket_matrix(index)
    }

    /// Pin a bone to an object space frame, the same space [Self::bone_transform] returns,
    /// until [Self::clear_bone_transform] is called.
    pub fn set_bone_transform<'a>(&mut self, bone: impl Into<BoneRef<'a>>, matrix: Mat4) {
        let Some(index) = self.resolve_bone(bone) else {
            return;
        };
        let Some(bone) = self.mesh.skeleton().bone(index) else {
            return;
        };
        let skinning = matrix * bone.offset;
        self.overrides[index as usize] = Some(skinning);
        self.bone_matrices[index as usize] = skinning;
    }

    pub fn clear_bone_transform<'a>(&mut self, bone: impl Into<BoneRef<'a>>) {
        if let Some(index) = self.resolve_bone(bone) {
            self.overrides[index as usize] = None;
        }
    }

    #[inline]
    pub fn has_animated_this_frame(&self) -> bool {
        self.flags.contains(SkinnedMeshFlags::ANIMATED_THIS_FRAME)
    }
}

impl Posable for SkinnedMesh {
    fn bone_count(&self) -> usize {
        SkinnedMesh::bone_count(self)
    }

    fn bone_matrices(&self) -> &[Mat4] {
        &self.bone_matrices
    }

    fn has_animated_this_frame(&self) -> bool {
        SkinnedMesh::has_animated_this_frame(self)
    }
}

/// Position, rotation and scale extracted from a bone transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BonePose {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl BonePose {
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, position) = matrix.to_scale_rotation_translation();
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Rotation as XYZ euler angles in degrees.
    pub fn rotation_euler(&self) -> Vec3 {
        let (x, y, z) = self.rotation.to_euler(EulerRot::XYZ);
        Vec3::new(x, y, z) * (180.0 / std::f32::consts::PI)
    }
}

use ahash::HashMap;
use glam::Mat4;
use scene_graph::{BoneIndex, Transform};

use crate::engine::assets::AssetError;

/// Parent index of root bones.
pub const BONE_SENTINEL: BoneIndex = BoneIndex::MAX;

#[derive(Clone, Debug)]
pub struct Bone {
    pub name: String,
    pub index: BoneIndex,
    /// [BONE_SENTINEL] for roots, otherwise always smaller than `index`.
    pub parent: BoneIndex,
    /// Maps a vertex from mesh bind space into the bone's local space.
    pub offset: Mat4,
    pub inv_offset: Mat4,
}

impl Bone {
    pub fn new(name: impl Into<String>, index: BoneIndex, parent: BoneIndex, offset: Mat4) -> Self {
        Self {
            name: name.into(),
            index,
            parent,
            offset,
            inv_offset: offset.inverse(),
        }
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent == BONE_SENTINEL
    }
}

/// Immutable bone list shared by every instance of a mesh. Ancestors always precede their
/// descendants, so every per-bone pass is a single forward walk.
#[derive(Clone, Debug)]
pub struct Skeleton {
    bones: Vec<Bone>,
    inv_root: Mat4,
    /// Parent relative bind pose of each bone.
    /// Derived from the offsets unless the asset provides one.
    bind_pose: Vec<Mat4>,
    /// `bind_pose` decomposed, used to seed blending.
    bind_locals: Vec<Transform>,
    name_lookup: HashMap<String, BoneIndex>,
}

impl Skeleton {
    pub fn new(bones: Vec<Bone>) -> Result<Self, AssetError> {
        for (position, bone) in bones.iter().enumerate() {
            if bone.index as usize != position {
                return Err(AssetError::BoneIndexMismatch {
                    position,
                    index: bone.index,
                });
            }

            if !bone.is_root() && bone.parent >= bone.index {
                return Err(AssetError::InvalidBoneParent {
                    index: bone.index,
                    name: bone.name.clone(),
                    parent: bone.parent,
                });
            }
        }

        let bind_pose: Vec<Mat4> = bones
            .iter()
            .map(|bone| {
                if bone.is_root() {
                    bone.inv_offset
                } else {
                    bones[bone.parent as usize].offset * bone.inv_offset
                }
            })
            .collect();

        let bind_locals = bind_pose.iter().copied().map(Transform::from_mat4).collect();

        let name_lookup = bones
            .iter()
            .map(|bone| (bone.name.clone(), bone.index))
            .collect();

        Ok(Self {
            bones,
            inv_root: Mat4::IDENTITY,
            bind_pose,
            bind_locals,
            name_lookup,
        })
    }

    /// Use the parent relative bind pose stored with the asset instead of the one derived from
    /// the bone offsets.
    pub fn with_bind_pose(mut self, bind_pose: Vec<Mat4>) -> Result<Self, AssetError> {
        if bind_pose.len() != self.bones.len() {
            return Err(AssetError::BindPoseMismatch {
                found: bind_pose.len(),
                bone_count: self.bones.len(),
            });
        }

        self.bind_locals = bind_pose.iter().copied().map(Transform::from_mat4).collect();
        self.bind_pose = bind_pose;
        Ok(self)
    }

    /// Set the inverse of the mesh root node transform, applied to every finalized bone.
    pub fn with_inv_root(mut self, inv_root: Mat4) -> Self {
        self.inv_root = inv_root;
        self
    }

    #[inline]
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    #[inline]
    pub fn bone(&self, index: BoneIndex) -> Option<&Bone> {
        self.bones.get(index as usize)
    }

    #[inline]
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    pub fn inv_root(&self) -> Mat4 {
        self.inv_root
    }

    #[inline]
    pub fn bind_pose(&self) -> &[Mat4] {
        &self.bind_pose
    }

    #[inline]
    pub fn bind_locals(&self) -> &[Transform] {
        &self.bind_locals
    }

    pub fn find_bone_index(&self, name: &str) -> Option<BoneIndex> {
        self.name_lookup.get(name).copied()
    }

    /// Reset `out` to the parent relative bind pose.
    pub fn copy_bind_pose(&self, out: &mut Vec<Mat4>) {
        out.clear();
        out.extend_from_slice(&self.bind_pose);
    }

    /// Turn parent relative bone matrices into skinning matrices: concatenate down the hierarchy,
    /// then wrap with the inverse root transform and each bone's offset.
    pub fn finalize_bone_transforms(&self, transforms: &mut [Mat4]) {
        debug_assert_eq!(transforms.len(), self.bones.len());

        for (i, bone) in self.bones.iter().enumerate() {
            if !bone.is_root() {
                transforms[i] = transforms[bone.parent as usize] * transforms[i];
            }
        }

        for (transform, bone) in transforms.iter_mut().zip(self.bones.iter()) {
            *transform = self.inv_root * *transform * bone.offset;
        }
    }

    /// Finalized bind pose, one skinning matrix per bone.
    pub fn finalized_bind_pose(&self) -> Vec<Mat4> {
        let mut transforms = self.bind_pose.clone();
        self.finalize_bone_transforms(&mut transforms);
        transforms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    /// root at the origin, "arm" one unit up, "hand" one unit further along x.
    fn arm() -> Skeleton {
        Skeleton::new(vec![
            Bone::new("root", 0, BONE_SENTINEL, Mat4::IDENTITY),
            Bone::new(
                "arm",
                1,
                0,
                Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)).inverse(),
            ),
            Bone::new(
                "hand",
                2,
                1,
                Mat4::from_translation(Vec3::new(1.0, 1.0, 0.0)).inverse(),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn bind_pose_is_parent_relative() {
        let skeleton = arm();

        assert!(skeleton.bind_pose()[0].abs_diff_eq(Mat4::IDENTITY, 1e-6));
        assert!(
            skeleton.bind_pose()[1]
                .abs_diff_eq(Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)), 1e-6)
        );
        assert!(
            skeleton.bind_pose()[2]
                .abs_diff_eq(Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)), 1e-6)
        );
        assert!(
            skeleton.bind_locals()[2]
                .translation
                .abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-6)
        );
    }

    #[test]
    fn bind_pose_finalizes_to_identity() {
        let skeleton = arm();
        for m in skeleton.finalized_bind_pose() {
            assert!(m.abs_diff_eq(Mat4::IDENTITY, 1e-5));
        }
    }

    #[test]
    fn finalize_concatenates_parents() {
        let skeleton = arm();

        // Rotate the arm 90 degrees around z; the hand rides along.
        let mut transforms = skeleton.bind_pose().to_vec();
        transforms[1] = transforms[1]
            * Mat4::from_quat(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        skeleton.finalize_bone_transforms(&mut transforms);

        // A vertex at the hand's bind position follows the rotation.
        let hand = transforms[2].transform_point3(Vec3::new(1.0, 1.0, 0.0));
        assert!(hand.abs_diff_eq(Vec3::new(0.0, 2.0, 0.0), 1e-5));

        // The root is untouched.
        assert!(transforms[0].abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn inv_root_wraps_every_bone() {
        let inv_root = Mat4::from_translation(Vec3::new(0.0, 0.0, -3.0));
        let skeleton = arm().with_inv_root(inv_root);

        for m in skeleton.finalized_bind_pose() {
            assert!(m.abs_diff_eq(inv_root, 1e-5));
        }
    }

    #[test]
    fn asset_bind_pose_replaces_derived_one() {
        let raised = Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0));
        let skeleton = arm()
            .with_bind_pose(vec![Mat4::IDENTITY, raised, Mat4::IDENTITY])
            .unwrap();

        assert_eq!(skeleton.bind_pose()[1], raised);
        assert!(
            skeleton.bind_locals()[1]
                .translation
                .abs_diff_eq(Vec3::new(0.0, 2.0, 0.0), 1e-6)
        );

        let mut bones = Vec::new();
        skeleton.copy_bind_pose(&mut bones);
        assert_eq!(bones[1], raised);

        // The arm now rests one unit above where its offset expects it.
        let finalized = skeleton.finalized_bind_pose();
        assert!(
            finalized[1]
                .transform_point3(Vec3::new(0.0, 1.0, 0.0))
                .abs_diff_eq(Vec3::new(0.0, 2.0, 0.0), 1e-5)
        );
    }

    #[test]
    fn rejects_bind_pose_of_wrong_length() {
        let result = arm().with_bind_pose(vec![Mat4::IDENTITY]);
        assert!(matches!(
            result,
            Err(AssetError::BindPoseMismatch {
                found: 1,
                bone_count: 3
            })
        ));
    }

    #[test]
    fn rejects_parent_after_child() {
        let result = Skeleton::new(vec![
            Bone::new("a", 0, 1, Mat4::IDENTITY),
            Bone::new("b", 1, BONE_SENTINEL, Mat4::IDENTITY),
        ]);
        assert!(matches!(result, Err(AssetError::InvalidBoneParent { .. })));
    }

    #[test]
    fn rejects_index_mismatch() {
        let result = Skeleton::new(vec![Bone::new("a", 3, BONE_SENTINEL, Mat4::IDENTITY)]);
        assert!(matches!(result, Err(AssetError::BoneIndexMismatch { .. })));
    }

    #[test]
    fn finds_bones_by_name() {
        let skeleton = arm();
        assert_eq!(skeleton.find_bone_index("hand"), Some(2));
        assert_eq!(skeleton.find_bone_index("foot"), None);
    }
}

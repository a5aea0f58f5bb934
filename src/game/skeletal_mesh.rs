use std::sync::Arc;

use ahash::HashMap;

use crate::engine::assets::AssetError;

use super::{animation::AnimationClip, skeleton::Skeleton, skinning::SkinnedVertex};

/// Shared, immutable skinned mesh asset. Every instance playing it holds an `Arc` to the same
/// data.
#[derive(Debug)]
pub struct SkeletalMesh {
    name: String,
    skeleton: Skeleton,
    animations: Vec<AnimationClip>,
    animation_lookup: HashMap<String, usize>,
    vertices: Vec<SkinnedVertex>,
    /// Secondary source of clips, consulted when a name is not found locally.
    animation_lookup_mesh: Option<Arc<SkeletalMesh>>,
}

impl SkeletalMesh {
    /// Validate the loaded data and build the name lookups.
    pub fn new(
        name: impl Into<String>,
        skeleton: Skeleton,
        animations: Vec<AnimationClip>,
        vertices: Vec<SkinnedVertex>,
    ) -> Result<Self, AssetError> {
        let bone_count = skeleton.bone_count();

        for clip in animations.iter() {
            if clip.ticks_per_second <= 0.0 {
                return Err(AssetError::InvalidTickRate(clip.name.clone()));
            }

            for channel in clip.channels.iter() {
                if channel.bone_index as usize >= bone_count {
                    return Err(AssetError::ChannelBoneOutOfRange {
                        animation: clip.name.clone(),
                        bone_index: channel.bone_index,
                        bone_count,
                    });
                }

                if let Some(track) = channel.empty_track() {
                    return Err(AssetError::EmptyKeys {
                        animation: clip.name.clone(),
                        bone_index: channel.bone_index,
                        track,
                    });
                }
            }
        }

        for (vertex_index, vertex) in vertices.iter().enumerate() {
            let used = vertex
                .bone_indices
                .iter()
                .zip(vertex.bone_weights.iter())
                .filter(|(_, weight)| **weight != 0.0);
            for (&bone_index, _) in used {
                if bone_index as usize >= bone_count {
                    return Err(AssetError::VertexBoneOutOfRange {
                        vertex: vertex_index,
                        bone_index,
                        bone_count,
                    });
                }
            }
        }

        let animation_lookup = animations
            .iter()
            .enumerate()
            .map(|(i, clip)| (clip.name.clone(), i))
            .collect();

        Ok(Self {
            name: name.into(),
            skeleton,
            animations,
            animation_lookup,
            vertices,
            animation_lookup_mesh: None,
        })
    }

    pub fn with_animation_lookup_mesh(mut self, mesh: Arc<SkeletalMesh>) -> Self {
        self.animation_lookup_mesh = Some(mesh);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    #[inline]
    pub fn vertices(&self) -> &[SkinnedVertex] {
        &self.vertices
    }

    #[inline]
    pub fn animations(&self) -> &[AnimationClip] {
        &self.animations
    }

    pub fn animation_lookup_mesh(&self) -> Option<&Arc<SkeletalMesh>> {
        self.animation_lookup_mesh.as_ref()
    }

    /// Find a clip by name, falling back to the animation lookup mesh.
    pub fn animation(&self, name: &str) -> Option<&AnimationClip> {
        self.animation_lookup
            .get(name)
            .map(|&index| &self.animations[index])
            .or_else(|| {
                self.animation_lookup_mesh
                    .as_ref()
                    .and_then(|mesh| mesh.animation(name))
            })
    }

    pub fn has_animation(&self, name: &str) -> bool {
        self.animation(name).is_some()
    }

    /// Duration of the named clip in seconds.
    pub fn animation_duration(&self, name: &str) -> Option<f32> {
        self.animation(name).map(AnimationClip::duration_seconds)
    }
}

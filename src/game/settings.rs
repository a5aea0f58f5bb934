/// Hardware bone matrix capacity assumed when the renderer does not report one.
pub const DEFAULT_MAX_GPU_BONES: usize = 80;

/// Runtime settings shared by every skinned instance in a scene.
#[derive(Clone, Copy, Debug)]
pub struct AnimationSettings {
    /// Skeletons with more bones than this are skinned on the CPU.
    pub max_gpu_bones: usize,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            max_gpu_bones: DEFAULT_MAX_GPU_BONES,
        }
    }
}

impl AnimationSettings {
    #[inline]
    pub fn cpu_skinning_required(&self, bone_count: usize) -> bool {
        bone_count > self.max_gpu_bones
    }
}

/// What an instance does on ticks where it was not rendered.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, PartialEq, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
pub enum AnimationUpdateMode {
    #[default]
    AlwaysUpdateTimeAndBones,
    AlwaysUpdateTime,
    OnlyUpdateWhenRendered,
}

impl AnimationUpdateMode {
    /// Returns `(update_time, update_bones)` for an instance, given whether it was rendered.
    pub fn resolve(self, rendered: bool) -> (bool, bool) {
        if rendered {
            return (true, true);
        }

        match self {
            Self::AlwaysUpdateTimeAndBones => (true, true),
            Self::AlwaysUpdateTime => (true, false),
            Self::OnlyUpdateWhenRendered => (false, false),
        }
    }
}

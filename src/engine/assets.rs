/// Problems found while validating asset data handed over by the loader.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("Bone {index} ({name}) has parent {parent}, parents must precede their children")]
    InvalidBoneParent {
        index: u32,
        name: String,
        parent: u32,
    },

    #[error("Bone at position {position} reports index {index}")]
    BoneIndexMismatch { position: usize, index: u32 },

    #[error("Bind pose has {found} matrices, skeleton has {bone_count} bones")]
    BindPoseMismatch { found: usize, bone_count: usize },

    #[error("Animation {animation} has a channel for bone {bone_index}, skeleton has {bone_count}")]
    ChannelBoneOutOfRange {
        animation: String,
        bone_index: u32,
        bone_count: usize,
    },

    #[error("Animation {animation} has an empty {track} key array for bone {bone_index}")]
    EmptyKeys {
        animation: String,
        bone_index: u32,
        track: &'static str,
    },

    #[error("Animation {0} has a non-positive tick rate")]
    InvalidTickRate(String),

    #[error("Vertex {vertex} references bone {bone_index}, skeleton has {bone_count}")]
    VertexBoneOutOfRange {
        vertex: usize,
        bone_index: u8,
        bone_count: usize,
    },
}

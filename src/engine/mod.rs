pub mod assets;
pub mod interpolate;

pub mod prelude {
    pub use super::assets::*;
    pub use super::interpolate::*;
    pub use glam::{Mat4, Quat, Vec2, Vec3};
    pub use scene_graph::{BoneIndex, Graph, NodeId, Transform};
}

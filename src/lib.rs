//! Skeletal animation for transform hierarchies: keyframe playback with queuing and blending,
//! bone pose finalization, pose inheritance and a CPU skinning fallback.

pub mod engine;
pub mod game;

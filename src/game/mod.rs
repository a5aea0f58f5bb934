pub mod animation;
pub mod events;
pub mod playback;
pub mod pose;
pub mod scene;
pub mod settings;
pub mod skeletal_mesh;
pub mod skeleton;
pub mod skinned_mesh;
pub mod skinning;
pub mod track;

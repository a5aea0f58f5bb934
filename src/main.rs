use std::sync::Arc;

use clap::Parser;
use rig_anim::{
    engine::prelude::*,
    game::{
        animation::{AnimationClip, Channel, EventKey, EventTrack},
        playback::PlayOptions,
        scene::Scene,
        settings::{AnimationSettings, AnimationUpdateMode},
        skeletal_mesh::SkeletalMesh,
        skeleton::{BONE_SENTINEL, Bone, Skeleton},
        skinning::{BoneInfluenceMode, SkinnedVertex, as_bytes},
    },
};
use tracing::{error, info};

#[derive(clap::Parser)]
struct Opts {
    /// Number of bones in the procedural chain.
    #[arg(long, default_value_t = 4)]
    bones: u32,

    /// Seconds to simulate.
    #[arg(long, default_value_t = 3.0)]
    seconds: f32,

    /// Simulation ticks per second.
    #[arg(long, default_value_t = 30.0)]
    fps: f32,

    /// Hardware bone matrix capacity; longer chains are skinned on the CPU.
    #[arg(long, default_value_t = 80)]
    max_gpu_bones: usize,

    /// Bone influences blended per vertex when skinning on the CPU (one, four).
    #[arg(long, default_value = "four")]
    influence: BoneInfluenceMode,

    /// What the character does while it is not rendered.
    #[arg(long, default_value = "always-update-time-and-bones")]
    update_mode: AnimationUpdateMode,

    /// Report the character as rendered every tick.
    #[arg(long)]
    rendered: bool,
}

/// A vertical chain of bones one unit apart, each holding two vertices.
fn chain_mesh(bone_count: u32) -> Result<SkeletalMesh, AssetError> {
    let bones = (0..bone_count)
        .map(|i| {
            let parent = if i == 0 { BONE_SENTINEL } else { i - 1 };
            let offset = Mat4::from_translation(Vec3::new(0.0, i as f32, 0.0)).inverse();
            Bone::new(format!("bone{i}"), i, parent, offset)
        })
        .collect();
    let bind_pose = (0..bone_count)
        .map(|i| {
            if i == 0 {
                Mat4::IDENTITY
            } else {
                Mat4::from_translation(Vec3::Y)
            }
        })
        .collect();
    let skeleton = Skeleton::new(bones)?.with_bind_pose(bind_pose)?;

    // Bones past u8 range can not be referenced by vertices.
    let vertices = (0..bone_count.min(u8::MAX as u32 + 1))
        .flat_map(|i| {
            let y = i as f32;
            [
                SkinnedVertex::rigid(Vec3::new(-0.5, y, 0.0), Vec3::NEG_X, i as u8),
                SkinnedVertex::rigid(Vec3::new(0.5, y, 0.0), Vec3::X, i as u8),
            ]
        })
        .collect();

    let channel = |i: u32, bend: Quat| {
        let position = if i == 0 { Vec3::ZERO } else { Vec3::Y };
        Channel::new(i)
            .with_position(0.0, position)
            .with_rotation(0.0, Quat::IDENTITY)
            .with_rotation(15.0, bend)
            .with_rotation(30.0, Quat::IDENTITY)
            .with_scale(0.0, Vec3::ONE)
    };

    let wave = (1..bone_count).fold(AnimationClip::new("Wave", 30.0, 30.0), |clip, i| {
        clip.with_channel(channel(i, Quat::from_rotation_z(0.3)))
    });

    let sway = (1..bone_count)
        .fold(AnimationClip::new("Sway", 30.0, 15.0), |clip, i| {
            clip.with_channel(channel(i, Quat::from_rotation_x(0.2)))
        })
        .with_event_track(EventTrack::new(
            "Step",
            vec![
                EventKey {
                    time: 10.0,
                    value: Vec3::NEG_X,
                },
                EventKey {
                    time: 25.0,
                    value: Vec3::X,
                },
            ],
        ));

    SkeletalMesh::new("chain", skeleton, vec![wave, sway], vertices)
}

fn run(opts: Opts) -> Result<(), AssetError> {
    let mesh = Arc::new(chain_mesh(opts.bones.max(1))?);

    let mut scene = Scene::new(AnimationSettings {
        max_gpu_bones: opts.max_gpu_bones,
    });

    let character = scene.spawn_skinned(Arc::clone(&mesh), Transform::IDENTITY);
    let prop = scene.spawn_empty(Transform::from_translation(Vec3::new(0.0, 0.25, 0.0)));
    let tip = opts.bones.max(1) - 1;
    if let Err(err) = scene.attach_to_bone(prop, character, tip) {
        error!("{err}");
    }

    if let Some(skinned) = scene.skinned_mut(character) {
        skinned.set_influence_mode(opts.influence);
        skinned.set_update_mode(opts.update_mode);
        skinned.play_animation("Wave", PlayOptions::default());
        skinned.queue_animation("Sway", Some("Wave"), PlayOptions::looping());
    }

    let delta = 1.0 / opts.fps.max(1.0);
    let ticks = (opts.seconds * opts.fps.max(1.0)).round() as u32;

    for tick in 0..ticks {
        if opts.rendered
            && let Some(skinned) = scene.skinned_mut(character)
        {
            skinned.set_rendered(true);
        }

        scene.tick(delta);

        scene.dispatch_events(|node, event| {
            info!(
                "[{:.2}s] {node:?} \"{}\" from \"{}\" at tick {} ({})",
                (tick + 1) as f32 * delta,
                event.name,
                event.animation,
                event.time,
                event.value
            );
        });

        tracing::debug!("prop at {}", scene.world_position(prop));
    }

    info!("Prop world position: {}", scene.world_position(prop));
    if let Some(rotation) = scene.bone_rotation_euler(character, tip) {
        info!("Tip bone rotation: {rotation}");
    }

    if let Some(skinned) = scene.skinned(character) {
        let playing: Vec<&str> = skinned
            .playback()
            .active()
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        info!("Playing: {playing:?}");

        if scene.settings().cpu_skinning_required(skinned.bone_count()) {
            info!(
                "CPU skinned {} vertices ({} bytes) for {} bones",
                skinned.skinned_vertices().len(),
                as_bytes(skinned.skinned_vertices()).len(),
                skinned.bone_count()
            );
        } else {
            info!(
                "{} bone matrices ready for GPU skinning",
                skinned.bone_matrices().len()
            );
        }
    }

    Ok(())
}

fn main() {
    tracing_subscriber::fmt().init();

    let opts = Opts::parse();

    if let Err(err) = run(opts) {
        error!("{err}");
        std::process::exit(1);
    }
}

use glam::Mat4;
use scene_graph::Transform;

use super::{events::AnimEvent, playback::AnimationPlayback, skeletal_mesh::SkeletalMesh};

/// Anything that can hand its finalized bone matrices to another instance.
pub trait Posable {
    fn bone_count(&self) -> usize;
    fn bone_matrices(&self) -> &[Mat4];
    fn has_animated_this_frame(&self) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum PoseError {
    #[error("Cannot inherit pose, parent has {parent} bones and child has {child}")]
    BoneCountMismatch { parent: usize, child: usize },
}

/// Only the bone count is compared; names and hierarchy are not.
pub fn check_inheritable(parent: &dyn Posable, bone_count: usize) -> Result<(), PoseError> {
    if parent.bone_count() == bone_count {
        Ok(())
    } else {
        Err(PoseError::BoneCountMismatch {
            parent: parent.bone_count(),
            child: bone_count,
        })
    }
}

/// Evaluates active animations into bone matrices. Owns the per instance scratch state so
/// nothing is reallocated between ticks.
#[derive(Debug, Default)]
pub struct PoseSolver {
    /// Parent relative TRS of every bone after the last evaluation.
    locals: Vec<Transform>,
    /// Bones written by at least one channel this tick.
    touched: Vec<bool>,
    finished: Vec<String>,
}

impl PoseSolver {
    #[inline]
    pub fn locals(&self) -> &[Transform] {
        &self.locals
    }

    /// Seed the locals from the bind pose.
    pub fn reset_to_bind_pose(&mut self, mesh: &SkeletalMesh) {
        let skeleton = mesh.skeleton();
        self.locals.clear();
        self.locals.extend_from_slice(skeleton.bind_locals());
        self.touched.clear();
        self.touched.resize(skeleton.bone_count(), false);
    }

    /// Advance every active animation by `delta` seconds (scaled by `global_speed`), blend
    /// their channels over the bind pose and, when `update_bones` is set, write finalized
    /// matrices into `bones`. Crossed event keys are appended to `events`. Finished animations
    /// are retired after all of them were evaluated.
    #[allow(clippy::too_many_arguments)]
    pub fn solve(
        &mut self,
        mesh: &SkeletalMesh,
        playback: &mut AnimationPlayback,
        delta: f32,
        global_speed: f32,
        update_bones: bool,
        bones: &mut Vec<Mat4>,
        events: &mut Vec<AnimEvent>,
    ) {
        let skeleton = mesh.skeleton();

        if update_bones {
            self.reset_to_bind_pose(mesh);
        }

        for active in playback.active_mut() {
            let Some(clip) = mesh.animation(&active.name) else {
                tracing::warn!("Invalid animation name \"{}\"", active.name);
                self.finished.push(active.name.clone());
                continue;
            };

            let speed = active.speed * global_speed;
            let prev_tick = active.time * clip.ticks_per_second;

            if active.advance(delta * global_speed, clip.duration_seconds()) {
                self.finished.push(active.name.clone());
            }

            let weight = active.weight.clamp(0.0, 1.0);
            if weight <= 0.0 {
                continue;
            }

            let tick = active.time * clip.ticks_per_second;

            if update_bones {
                for channel in clip.channels.iter() {
                    let index = channel.bone_index as usize;
                    let Some(local) = self.locals.get_mut(index) else {
                        continue;
                    };
                    *local = local.blend(&channel.sample(tick), weight);
                    self.touched[index] = true;
                }
            }

            clip.detect_events(prev_tick, tick, speed, events);
        }

        playback.retire(self.finished.drain(..));

        if update_bones {
            skeleton.copy_bind_pose(bones);
            for ((bone, local), touched) in bones
                .iter_mut()
                .zip(self.locals.iter())
                .zip(self.touched.iter())
            {
                if *touched {
                    *bone = local.to_mat4();
                }
            }
            skeleton.finalize_bone_transforms(bones);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{
        animation::{AnimationClip, Channel},
        playback::PlayOptions,
        skeleton::{BONE_SENTINEL, Bone, Skeleton},
    };
    use glam::{Quat, Vec3};

    #[inline]
    fn approx_v3(a: Vec3, b: Vec3) -> bool {
        a.abs_diff_eq(b, 1e-4)
    }

    fn constant_clip(name: &str, position: Vec3) -> AnimationClip {
        AnimationClip::new(name, 10.0, 10.0).with_channel(
            Channel::new(0)
                .with_position(0.0, position)
                .with_rotation(0.0, Quat::IDENTITY)
                .with_scale(0.0, Vec3::ONE),
        )
    }

    fn mesh() -> SkeletalMesh {
        let skeleton = Skeleton::new(vec![
            Bone::new("root", 0, BONE_SENTINEL, Mat4::IDENTITY),
            Bone::new("tip", 1, 0, Mat4::from_translation(Vec3::Y).inverse()),
        ])
        .unwrap();

        SkeletalMesh::new(
            "m",
            skeleton,
            vec![
                constant_clip("A", Vec3::new(2.0, 0.0, 0.0)),
                constant_clip("B", Vec3::new(0.0, 4.0, 0.0)),
                constant_clip("C", Vec3::new(0.0, 0.0, 8.0)),
            ],
            vec![],
        )
        .unwrap()
    }

    fn solve(mesh: &SkeletalMesh, playback: &mut AnimationPlayback) -> (PoseSolver, Vec<Mat4>) {
        let mut solver = PoseSolver::default();
        let mut bones = Vec::new();
        let mut events = Vec::new();
        solver.solve(mesh, playback, 0.1, 1.0, true, &mut bones, &mut events);
        (solver, bones)
    }

    #[test]
    fn zero_weight_leaves_prior_value() {
        let mesh = mesh();
        let mut playback = AnimationPlayback::default();
        playback.play("A", PlayOptions::looping());
        playback.play("B", PlayOptions::looping().with_weight(0.0));

        let (solver, _) = solve(&mesh, &mut playback);
        assert!(approx_v3(solver.locals()[0].translation, Vec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn full_weight_replaces() {
        let mesh = mesh();
        let mut playback = AnimationPlayback::default();
        playback.play("A", PlayOptions::looping());
        playback.play("B", PlayOptions::looping());

        let (solver, bones) = solve(&mesh, &mut playback);
        assert!(approx_v3(solver.locals()[0].translation, Vec3::new(0.0, 4.0, 0.0)));
        // Untouched bones keep their bind pose and ride the animated root.
        assert!(approx_v3(
            bones[1].transform_point3(Vec3::Y),
            Vec3::new(0.0, 5.0, 0.0)
        ));
    }

    #[test]
    fn blend_is_order_dependent() {
        let mesh = mesh();

        let mut forward = AnimationPlayback::default();
        forward.play("A", PlayOptions::looping());
        forward.play("B", PlayOptions::looping().with_weight(0.5));
        forward.play("C", PlayOptions::looping().with_weight(0.5));
        let (a_then, _) = solve(&mesh, &mut forward);
        // ((A + B) / 2 + C) / 2
        assert!(approx_v3(a_then.locals()[0].translation, Vec3::new(0.5, 1.0, 4.0)));

        let mut reordered = AnimationPlayback::default();
        reordered.play("A", PlayOptions::looping());
        reordered.play("C", PlayOptions::looping().with_weight(0.5));
        reordered.play("B", PlayOptions::looping().with_weight(0.5));
        let (c_then, _) = solve(&mesh, &mut reordered);
        assert!(approx_v3(c_then.locals()[0].translation, Vec3::new(0.5, 2.0, 2.0)));
    }

    #[test]
    fn unknown_animation_finishes() {
        let mesh = mesh();
        let mut playback = AnimationPlayback::default();
        playback.play("Missing", PlayOptions::looping());
        playback.queue("A", Some("Missing"), PlayOptions::looping());

        solve(&mesh, &mut playback);
        assert!(!playback.is_playing("Missing"));
        assert!(playback.is_playing("A"));
    }

    #[test]
    fn inheritance_checks_bone_count() {
        struct Parent(Vec<Mat4>);
        impl Posable for Parent {
            fn bone_count(&self) -> usize {
                self.0.len()
            }
            fn bone_matrices(&self) -> &[Mat4] {
                &self.0
            }
            fn has_animated_this_frame(&self) -> bool {
                true
            }
        }

        let parent = Parent(vec![Mat4::IDENTITY; 3]);
        assert!(check_inheritable(&parent, 3).is_ok());
        assert!(matches!(
            check_inheritable(&parent, 2),
            Err(PoseError::BoneCountMismatch {
                parent: 3,
                child: 2
            })
        ));
    }
}

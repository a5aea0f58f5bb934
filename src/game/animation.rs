use glam::{Quat, Vec3};
use scene_graph::{BoneIndex, Transform};

use crate::engine::interpolate::Interpolate;

use super::{events::AnimEvent, track::Track};

/// Keys driving a single bone.
#[derive(Clone, Debug, Default)]
pub struct Channel {
    pub bone_index: BoneIndex,
    pub positions: Track<Vec3>,
    pub rotations: Track<Quat>,
    pub scales: Track<Vec3>,
}

impl Channel {
    pub fn new(bone_index: BoneIndex) -> Self {
        Self {
            bone_index,
            ..Default::default()
        }
    }

    pub fn with_position(mut self, time: f32, position: Vec3) -> Self {
        self.positions.insert(time, position);
        self
    }

    pub fn with_rotation(mut self, time: f32, rotation: Quat) -> Self {
        self.rotations.insert(time, rotation);
        self
    }

    pub fn with_scale(mut self, time: f32, scale: Vec3) -> Self {
        self.scales.insert(time, scale);
        self
    }

    /// Name of the first track without keys, if any.
    pub fn empty_track(&self) -> Option<&'static str> {
        if self.positions.is_empty() {
            Some("positions")
        } else if self.rotations.is_empty() {
            Some("rotations")
        } else if self.scales.is_empty() {
            Some("scales")
        } else {
            None
        }
    }

    /// Local bone transform at `tick`.
    pub fn sample(&self, tick: f32) -> Transform {
        debug_assert!(
            self.empty_track().is_none(),
            "Channel for bone {} has an empty track!",
            self.bone_index
        );

        Transform {
            translation: sample_or(&self.positions, tick, Vec3::ZERO),
            rotation: sample_or(&self.rotations, tick, Quat::IDENTITY),
            scale: sample_or(&self.scales, tick, Vec3::ONE),
        }
    }
}

fn sample_or<V: Interpolate + Default>(track: &Track<V>, tick: f32, fallback: V) -> V {
    if track.is_empty() {
        fallback
    } else {
        track.sample(tick)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct EventKey {
    /// Time of the key in ticks.
    pub time: f32,
    pub value: Vec3,
}

#[derive(Clone, Debug)]
pub struct EventTrack {
    pub name: String,
    pub keys: Vec<EventKey>,
}

impl EventTrack {
    pub fn new(name: impl Into<String>, keys: Vec<EventKey>) -> Self {
        Self {
            name: name.into(),
            keys,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AnimationClip {
    pub name: String,
    /// Length in ticks.
    pub duration: f32,
    pub ticks_per_second: f32,
    pub channels: Vec<Channel>,
    pub event_tracks: Vec<EventTrack>,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, duration: f32, ticks_per_second: f32) -> Self {
        Self {
            name: name.into(),
            duration,
            ticks_per_second,
            channels: Vec::default(),
            event_tracks: Vec::default(),
        }
    }

    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn with_event_track(mut self, track: EventTrack) -> Self {
        self.event_tracks.push(track);
        self
    }

    #[inline]
    pub fn duration_seconds(&self) -> f32 {
        self.duration / self.ticks_per_second
    }

    /// Push an event for every key crossed while playback moved from `prev_tick` to `tick`. The
    /// previous time is exclusive and the current time inclusive, so consecutive updates never
    /// fire a key twice. A wrap shows up as the time moving against `speed`.
    pub fn detect_events(&self, prev_tick: f32, tick: f32, speed: f32, out: &mut Vec<AnimEvent>) {
        if speed == 0.0 || prev_tick == tick {
            return;
        }

        for track in self.event_tracks.iter() {
            for key in track.keys.iter() {
                let k = key.time;
                let crossed = if speed > 0.0 {
                    if tick >= prev_tick {
                        k > prev_tick && k <= tick
                    } else {
                        k > prev_tick || k <= tick
                    }
                } else if tick <= prev_tick {
                    k < prev_tick && k >= tick
                } else {
                    k < prev_tick || k >= tick
                };

                if crossed {
                    out.push(AnimEvent {
                        name: track.name.clone(),
                        animation: self.name.clone(),
                        time: k,
                        value: key.value,
                    });
                }
            }
        }
    }
}

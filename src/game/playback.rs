/// Priority that always appends to the end of the active list.
pub const APPEND_PRIORITY: u8 = u8::MAX;

/// Parameters shared by [AnimationPlayback::play] and [AnimationPlayback::queue].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlayOptions {
    pub looping: bool,
    pub speed: f32,
    pub weight: f32,
    /// Insert position in the active list, clamped to its length.
    pub priority: u8,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            looping: false,
            speed: 1.0,
            weight: 1.0,
            priority: APPEND_PRIORITY,
        }
    }
}

impl PlayOptions {
    pub fn looping() -> Self {
        Self {
            looping: true,
            ..Default::default()
        }
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ActiveAnimation {
    pub name: String,
    /// Playback position in seconds.
    pub time: f32,
    pub speed: f32,
    pub weight: f32,
    pub looping: bool,
}

impl ActiveAnimation {
    /// Move the playback position by `delta` seconds scaled by the animation's own speed.
    /// Looping animations wrap into `[0, duration)`. Returns true once a non looping animation
    /// runs off either end, in which case the time is clamped to that end.
    pub fn advance(&mut self, delta: f32, duration: f32) -> bool {
        self.time += delta * self.speed;

        if self.looping {
            if duration <= 0.0 {
                self.time = 0.0;
            } else if self.time >= duration || self.time < 0.0 {
                self.time = self.time.rem_euclid(duration);
                if self.time >= duration {
                    self.time = 0.0;
                }
            }
            false
        } else if self.time > duration {
            self.time = duration;
            true
        } else if self.time < 0.0 {
            self.time = 0.0;
            true
        } else {
            false
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct QueuedAnimation {
    pub name: String,
    /// Animation that has to finish before this one starts.
    pub dependent: String,
    pub options: PlayOptions,
}

/// Per instance lists of playing and waiting animations. The order of the active list is the
/// blend order.
#[derive(Clone, Debug, Default)]
pub struct AnimationPlayback {
    active: Vec<ActiveAnimation>,
    queued: Vec<QueuedAnimation>,
}

impl AnimationPlayback {
    #[inline]
    pub fn active(&self) -> &[ActiveAnimation] {
        &self.active
    }

    #[inline]
    pub fn active_mut(&mut self) -> &mut [ActiveAnimation] {
        &mut self.active
    }

    #[inline]
    pub fn queued(&self) -> &[QueuedAnimation] {
        &self.queued
    }

    pub fn find_active(&self, name: &str) -> Option<&ActiveAnimation> {
        self.active.iter().find(|a| a.name == name)
    }

    pub fn find_queued(&self, name: &str, dependent: &str) -> Option<&QueuedAnimation> {
        self.queued
            .iter()
            .find(|q| q.name == name && q.dependent == dependent)
    }

    #[inline]
    pub fn is_playing(&self, name: &str) -> bool {
        self.find_active(name).is_some()
    }

    /// Start `name`, or update it in place if it is already playing. A replayed non looping
    /// animation restarts from the beginning.
    pub fn play(&mut self, name: &str, options: PlayOptions) {
        if let Some(existing) = self.active.iter_mut().find(|a| a.name == name) {
            if !options.looping {
                existing.time = 0.0;
            }
            existing.speed = options.speed;
            existing.weight = options.weight;
            existing.looping = options.looping;
            return;
        }

        let index = (options.priority as usize).min(self.active.len());
        self.active.insert(
            index,
            ActiveAnimation {
                name: name.to_string(),
                time: 0.0,
                speed: options.speed,
                weight: options.weight,
                looping: options.looping,
            },
        );
    }

    /// Start `name` once `target` finishes. `target` may itself be queued, which chains
    /// animations. Without a target the last active animation is used, or `name` plays right
    /// away when nothing is active.
    pub fn queue(&mut self, name: &str, target: Option<&str>, options: PlayOptions) {
        let dependent = match target {
            Some(target) => {
                if !self.is_playing(target) && !self.queued.iter().any(|q| q.name == target) {
                    tracing::warn!(
                        "Cannot queue \"{name}\", \"{target}\" is neither playing nor queued."
                    );
                    return;
                }
                target.to_string()
            }
            None => match self.active.last() {
                Some(last) => last.name.clone(),
                None => {
                    self.play(name, options);
                    return;
                }
            },
        };

        if let Some(existing) = self
            .queued
            .iter_mut()
            .find(|q| q.name == name && q.dependent == dependent)
        {
            existing.options = options;
            return;
        }

        self.queued.push(QueuedAnimation {
            name: name.to_string(),
            dependent,
            options,
        });
    }

    pub fn stop(&mut self, name: &str, cancel_queued: bool) {
        self.active.retain(|a| a.name != name);
        if cancel_queued {
            self.cancel_queued(name);
        }
    }

    pub fn stop_all(&mut self, cancel_queued: bool) {
        self.active.clear();
        if cancel_queued {
            self.cancel_all_queued();
        }
    }

    pub fn cancel_queued(&mut self, name: &str) {
        self.queued.retain(|q| q.name != name);
    }

    pub fn cancel_all_queued(&mut self) {
        self.queued.clear();
    }

    /// Rewind every active animation.
    pub fn reset(&mut self) {
        for active in self.active.iter_mut() {
            active.time = 0.0;
        }
    }

    /// Remove finished animations and start whatever was waiting on them.
    pub fn retire(&mut self, finished: impl IntoIterator<Item = String>) {
        for name in finished {
            self.active.retain(|a| a.name != name);

            let (promoted, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.queued)
                .into_iter()
                .partition(|q| q.dependent == name);
            self.queued = waiting;

            for queued in promoted {
                tracing::debug!("Promoting \"{}\" after \"{}\" finished.", queued.name, name);
                self.play(&queued.name, queued.options);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(playback: &AnimationPlayback) -> Vec<&str> {
        playback.active().iter().map(|a| a.name.as_str()).collect()
    }

    #[test]
    fn priority_is_an_insert_position() {
        let mut playback = AnimationPlayback::default();
        playback.play("Walk", PlayOptions::looping());
        playback.play("Run", PlayOptions::looping());
        playback.play("Aim", PlayOptions::default().with_priority(0));
        playback.play("Wave", PlayOptions::default().with_priority(1));

        assert_eq!(names(&playback), vec!["Aim", "Wave", "Walk", "Run"]);
    }

    #[test]
    fn replay_updates_in_place() {
        let mut playback = AnimationPlayback::default();
        playback.play("Walk", PlayOptions::looping());
        playback.play("Jump", PlayOptions::default());
        playback.active_mut()[0].time = 0.4;
        playback.active_mut()[1].time = 0.2;

        playback.play("Walk", PlayOptions::looping().with_speed(2.0));
        playback.play("Jump", PlayOptions::default().with_weight(0.5));

        assert_eq!(names(&playback), vec!["Walk", "Jump"]);
        let walk = playback.find_active("Walk").unwrap();
        assert_eq!(walk.time, 0.4);
        assert_eq!(walk.speed, 2.0);
        let jump = playback.find_active("Jump").unwrap();
        assert_eq!(jump.time, 0.0);
        assert_eq!(jump.weight, 0.5);
    }

    #[test]
    fn queue_without_target() {
        let mut playback = AnimationPlayback::default();

        // Nothing active, plays immediately.
        playback.queue("Idle", None, PlayOptions::looping());
        assert!(playback.is_playing("Idle"));
        assert!(playback.queued().is_empty());

        // Otherwise waits on the last active animation.
        playback.play("Jump", PlayOptions::default());
        playback.queue("Land", None, PlayOptions::default());
        assert!(playback.find_queued("Land", "Jump").is_some());
    }

    #[test]
    fn queue_chains_and_dedups() {
        let mut playback = AnimationPlayback::default();
        playback.play("Jump", PlayOptions::default());
        playback.queue("Land", Some("Jump"), PlayOptions::default());
        playback.queue("Recover", Some("Land"), PlayOptions::default());
        playback.queue("Land", Some("Jump"), PlayOptions::default().with_speed(3.0));

        assert_eq!(playback.queued().len(), 2);
        assert_eq!(playback.find_queued("Land", "Jump").unwrap().options.speed, 3.0);
        assert!(playback.find_queued("Recover", "Land").is_some());

        // Unknown targets are ignored.
        playback.queue("Dance", Some("Swim"), PlayOptions::default());
        assert_eq!(playback.queued().len(), 2);

        playback.retire(["Jump".to_string()]);
        assert_eq!(names(&playback), vec!["Land"]);
        playback.retire(["Land".to_string()]);
        assert_eq!(names(&playback), vec!["Recover"]);
        assert!(playback.queued().is_empty());
    }

    #[test]
    fn stop_and_cancel() {
        let mut playback = AnimationPlayback::default();
        playback.play("Jump", PlayOptions::default());
        playback.play("Walk", PlayOptions::looping());
        playback.queue("Land", Some("Jump"), PlayOptions::default());
        playback.queue("Land", Some("Walk"), PlayOptions::default());

        playback.stop("Jump", false);
        assert_eq!(names(&playback), vec!["Walk"]);
        assert_eq!(playback.queued().len(), 2);

        playback.stop("Land", true);
        assert!(playback.queued().is_empty());

        playback.queue("Wave", Some("Walk"), PlayOptions::default());
        playback.stop_all(false);
        assert!(playback.active().is_empty());
        assert_eq!(playback.queued().len(), 1);
        playback.cancel_all_queued();
        assert!(playback.queued().is_empty());
    }

    #[test]
    fn reset_rewinds() {
        let mut playback = AnimationPlayback::default();
        playback.play("Walk", PlayOptions::looping());
        playback.active_mut()[0].time = 0.7;
        playback.reset();
        assert_eq!(playback.active()[0].time, 0.0);
    }

    #[test]
    fn loop_wraps() {
        let mut anim = ActiveAnimation {
            name: "Walk".into(),
            time: 0.0,
            speed: 1.0,
            weight: 1.0,
            looping: true,
        };

        let mut elapsed = 0.0;
        for delta in [0.4, 0.4, 0.5, 0.6, 0.4] {
            elapsed += delta;
            assert!(!anim.advance(delta, 1.0));
            assert!((0.0..1.0).contains(&anim.time));
        }
        assert!((elapsed - 2.3_f32).abs() < 1e-5);
        assert!((anim.time - 0.3).abs() < 1e-4);

        // Reverse playback wraps from the end.
        anim.speed = -1.0;
        anim.advance(0.5, 1.0);
        assert!((anim.time - 0.8).abs() < 1e-4);
    }

    #[test]
    fn clamps_and_finishes() {
        let mut anim = ActiveAnimation {
            name: "Jump".into(),
            time: 0.0,
            speed: 1.0,
            weight: 1.0,
            looping: false,
        };

        assert!(!anim.advance(0.3, 0.5));
        assert!(anim.advance(0.3, 0.5));
        assert_eq!(anim.time, 0.5);

        // Played backwards it finishes at the start.
        let mut rewind = ActiveAnimation {
            time: 0.4,
            speed: -1.0,
            ..anim
        };
        assert!(!rewind.advance(0.3, 0.5));
        assert!((rewind.time - 0.1).abs() < 1e-6);
        assert!(rewind.advance(0.3, 0.5));
        assert_eq!(rewind.time, 0.0);
    }
}

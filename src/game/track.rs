use crate::engine::interpolate::Interpolate;

#[derive(Clone, Copy, Debug)]
pub struct Key<V> {
    /// Time of the key in animation ticks.
    pub time: f32,
    pub value: V,
}

impl<V> Key<V> {
    pub fn new(time: f32, value: V) -> Self {
        Self { time, value }
    }
}

/// A sorted list of keys for one property of one bone.
#[derive(Clone, Debug, Default)]
pub struct Track<V: Interpolate> {
    keys: Vec<Key<V>>,
}

impl<V: Interpolate + Default> Track<V> {
    /// Build a track from keys that are already sorted by time.
    pub fn from_keys(keys: Vec<Key<V>>) -> Self {
        debug_assert!(
            keys.windows(2).all(|w| w[0].time <= w[1].time),
            "Keys must be sorted by time!"
        );
        Self { keys }
    }

    #[inline]
    pub fn keys(&self) -> &[Key<V>] {
        &self.keys
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Return the time of the last key.
    #[inline]
    pub fn last_time(&self) -> Option<f32> {
        self.keys.last().map(|k| k.time)
    }

    pub fn insert(&mut self, time: f32, value: V) {
        let i = self.keys.partition_point(|k| k.time < time);
        match self.keys.get_mut(i) {
            Some(key) if key.time == time => key.value = value, // last wins
            _ => self.keys.insert(i, Key { time, value }),      // keep sorted
        }
    }

    /// Index of the key starting the segment that contains `time`. Times past the end use the
    /// last segment. Channels are short, so a linear scan is fine.
    pub fn segment_index(&self, time: f32) -> usize {
        debug_assert!(self.keys.len() >= 2);

        let last_segment = self.keys.len() - 2;
        (0..last_segment)
            .find(|&i| time < self.keys[i + 1].time)
            .unwrap_or(last_segment)
    }

    /// Interpolated value at `time` (in ticks). Clamps to the first and last keys.
    pub fn sample(&self, time: f32) -> V {
        debug_assert!(!self.keys.is_empty(), "Track has no keys!");

        match self.keys.len() {
            0 => V::default(),
            1 => self.keys[0].value,
            _ => {
                let index = self.segment_index(time);
                let before = self.keys[index];
                let after = self.keys[index + 1];

                let span = after.time - before.time;
                let t = if span > 0.0 {
                    ((time - before.time) / span).clamp(0.0, 1.0)
                } else {
                    0.0
                };

                V::interpolate(before.value, after.value, t)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    fn approx_v3(a: Vec3, b: Vec3) -> bool {
        a.abs_diff_eq(b, 1e-4)
    }

    /// Rotations are equal up to sign.
    fn approx_q(a: Quat, b: Quat) -> bool {
        a.dot(b).abs() > 1.0 - 1e-4
    }

    fn stride() -> Track<Vec3> {
        Track::from_keys(vec![
            Key::new(0.0, Vec3::ZERO),
            Key::new(30.0, Vec3::new(1.0, 0.0, 0.0)),
            Key::new(45.0, Vec3::new(1.0, 0.5, 0.0)),
        ])
    }

    #[test]
    fn lerps_between_keys() {
        let track = stride();
        assert!(approx_v3(track.sample(15.0), Vec3::new(0.5, 0.0, 0.0)));
        assert!(approx_v3(track.sample(30.0), Vec3::new(1.0, 0.0, 0.0)));
        assert!(approx_v3(track.sample(40.0), Vec3::new(1.0, 1.0 / 3.0, 0.0)));
    }

    #[test]
    fn holds_first_and_last_key() {
        let track = stride();
        assert!(approx_v3(track.sample(-5.0), Vec3::ZERO));
        assert!(approx_v3(track.sample(90.0), Vec3::new(1.0, 0.5, 0.0)));
        assert_eq!(track.last_time(), Some(45.0));
    }

    #[test]
    fn segment_search_clamps_to_last_segment() {
        let t = Track::from_keys(vec![
            Key::new(0.0, 0.0_f32),
            Key::new(1.0, 1.0),
            Key::new(2.0, 2.0),
            Key::new(3.0, 3.0),
        ]);

        assert_eq!(t.segment_index(-1.0), 0);
        assert_eq!(t.segment_index(0.5), 0);
        assert_eq!(t.segment_index(1.0), 1);
        assert_eq!(t.segment_index(2.9), 2);
        assert_eq!(t.segment_index(50.0), 2);
    }

    #[test]
    fn value_is_continuous_at_segment_end() {
        let t = Track::from_keys(vec![
            Key::new(0.0, Vec3::ZERO),
            Key::new(4.0, Vec3::new(4.0, 8.0, -2.0)),
            Key::new(9.0, Vec3::new(-1.0, 0.0, 3.0)),
        ]);

        let at_end = t.sample(4.0);
        for eps in [1e-1_f32, 1e-2, 1e-3] {
            let before = t.sample(4.0 - eps);
            assert!((before - at_end).length() < eps * 10.0);
        }
    }

    #[test]
    fn single_key_is_constant() {
        let t = Track::from_keys(vec![Key::new(3.0, Vec3::ONE)]);
        assert_eq!(t.sample(-10.0), Vec3::ONE);
        assert_eq!(t.sample(10.0), Vec3::ONE);
    }

    #[test]
    fn insert_keeps_order_and_replaces_equal_times() {
        let mut t = Track::<f32>::default();
        t.insert(20.0, 2.0);
        t.insert(0.0, 0.0);
        t.insert(10.0, 7.0);
        t.insert(10.0, 1.0);

        let times: Vec<f32> = t.keys().iter().map(|k| k.time).collect();
        assert_eq!(times, vec![0.0, 10.0, 20.0]);
        assert_eq!(t.sample(15.0), 1.5);
    }

    #[test]
    fn rotations_take_the_short_way() {
        let quarter = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        // Same rotation, opposite hemisphere.
        let negated = -quarter;

        let t = Track::from_keys(vec![
            Key::new(0.0, Quat::IDENTITY),
            Key::new(10.0, negated),
        ]);

        let mid = t.sample(5.0);
        assert!(mid.is_normalized());
        assert!(approx_q(
            mid,
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_4)
        ));
    }
}

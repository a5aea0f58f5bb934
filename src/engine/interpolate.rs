use glam::{Quat, Vec3};

/// A key value a [crate::game::track::Track] can blend between. `t` is the position inside the
/// segment, `0.0` at `from` and `1.0` at `to`.
pub trait Interpolate: Copy {
    fn interpolate(from: Self, to: Self, t: f32) -> Self;
}

/// Scalar keys, straight line.
impl Interpolate for f32 {
    #[inline]
    fn interpolate(from: Self, to: Self, t: f32) -> Self {
        from + (to - from) * t
    }
}

/// Position and scale keys, componentwise.
impl Interpolate for Vec3 {
    #[inline]
    fn interpolate(from: Self, to: Self, t: f32) -> Self {
        from.lerp(to, t)
    }
}

/// Rotation keys. `slerp` flips `to` into the hemisphere of `from`, so the blend takes the short
/// way round; the result is renormalized to keep drift out of long chains.
impl Interpolate for Quat {
    #[inline]
    fn interpolate(from: Self, to: Self, t: f32) -> Self {
        from.slerp(to, t).normalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quat_stays_normalized() {
        let a = Quat::from_rotation_x(0.2);
        let b = Quat::from_rotation_y(2.5);

        for i in 0..=10 {
            let q = Quat::interpolate(a, b, i as f32 / 10.0);
            assert!(q.is_normalized());
        }
    }

    #[test]
    fn vec3_endpoints() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(-1.0, 0.0, 5.0);
        assert_eq!(Vec3::interpolate(a, b, 0.0), a);
        assert!(Vec3::interpolate(a, b, 1.0).abs_diff_eq(b, 1e-6));
    }
}

use glam::{Mat4, Vec2, Vec3};

/// Number of `(bone, weight)` pairs carried by every skinned vertex.
pub const MAX_BONE_INFLUENCES: usize = 4;

/// How many bone influences the CPU skinner blends per vertex.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum BoneInfluenceMode {
    /// Only the first (dominant) bone.
    One,
    #[default]
    Four,
}

/// Source vertex as stored in the mesh asset.
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::NoUninit)]
#[repr(C)]
pub struct SkinnedVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coord0: Vec2,
    pub tex_coord1: Vec2,
    pub bone_indices: [u8; MAX_BONE_INFLUENCES],
    pub bone_weights: [f32; MAX_BONE_INFLUENCES],
}

impl SkinnedVertex {
    /// A vertex fully bound to a single bone.
    pub fn rigid(position: Vec3, normal: Vec3, bone: u8) -> Self {
        Self {
            position,
            normal,
            tex_coord0: Vec2::ZERO,
            tex_coord1: Vec2::ZERO,
            bone_indices: [bone, 0, 0, 0],
            bone_weights: [1.0, 0.0, 0.0, 0.0],
        }
    }
}

/// Skinned output vertex, ready for upload.
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::NoUninit)]
#[repr(C)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coord0: Vec2,
    pub tex_coord1: Vec2,
}

#[inline]
fn bone_matrix(bones: &[Mat4], index: u8) -> Mat4 {
    bones.get(index as usize).copied().unwrap_or(Mat4::IDENTITY)
}

/// Blend every source vertex by its bone influences into `out`, which ends up the same length
/// as `source`. Normals are transformed as directions and are not renormalized.
pub fn skin_vertices(
    bones: &[Mat4],
    source: &[SkinnedVertex],
    mode: BoneInfluenceMode,
    out: &mut Vec<Vertex>,
) {
    out.clear();
    out.reserve(source.len());

    out.extend(source.iter().map(|vertex| {
        let transform = match mode {
            BoneInfluenceMode::One => bone_matrix(bones, vertex.bone_indices[0]),
            BoneInfluenceMode::Four => vertex
                .bone_indices
                .iter()
                .zip(vertex.bone_weights.iter())
                .filter(|(_, weight)| **weight != 0.0)
                .fold(Mat4::ZERO, |acc, (&index, &weight)| {
                    acc + bone_matrix(bones, index) * weight
                }),
        };

        Vertex {
            position: transform.transform_point3(vertex.position),
            normal: transform.transform_vector3(vertex.normal),
            tex_coord0: vertex.tex_coord0,
            tex_coord1: vertex.tex_coord1,
        }
    }));
}

/// Raw bytes of a skinned vertex buffer for the renderer to upload.
pub fn as_bytes(vertices: &[Vertex]) -> &[u8] {
    bytemuck::cast_slice(vertices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[inline]
    fn approx_v3(a: Vec3, b: Vec3) -> bool {
        a.abs_diff_eq(b, 1e-4)
    }

    #[test]
    fn rest_pose_has_no_deltas() {
        // 200 bones, well past an 80 bone hardware cap.
        let bones = vec![Mat4::IDENTITY; 200];
        let source: Vec<SkinnedVertex> = (0..64)
            .map(|i| SkinnedVertex::rigid(Vec3::new(i as f32, 1.0, -2.0), Vec3::Y, 0))
            .collect();

        let mut out = Vec::new();
        skin_vertices(&bones, &source, BoneInfluenceMode::Four, &mut out);

        assert_eq!(out.len(), source.len());
        for (skinned, source_vertex) in out.iter().zip(source.iter()) {
            assert!(approx_v3(skinned.position, source_vertex.position));
            assert!(approx_v3(skinned.normal, source_vertex.normal));
        }
    }

    #[test]
    fn blends_weighted_influences() {
        let bones = vec![
            Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0)),
            Mat4::from_translation(Vec3::new(0.0, 4.0, 0.0)),
        ];
        let vertex = SkinnedVertex {
            position: Vec3::ZERO,
            normal: Vec3::Z,
            bone_indices: [0, 1, 0, 0],
            bone_weights: [0.5, 0.5, 0.0, 0.0],
            ..Default::default()
        };

        let mut out = Vec::new();
        skin_vertices(&bones, &[vertex], BoneInfluenceMode::Four, &mut out);
        assert!(approx_v3(out[0].position, Vec3::new(1.0, 2.0, 0.0)));
        // Translation does not move directions.
        assert!(approx_v3(out[0].normal, Vec3::Z));

        skin_vertices(&bones, &[vertex], BoneInfluenceMode::One, &mut out);
        assert_eq!(out.len(), 1);
        assert!(approx_v3(out[0].position, Vec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn normals_follow_rotation() {
        let bones = vec![Mat4::from_quat(Quat::from_rotation_z(
            std::f32::consts::FRAC_PI_2,
        ))];
        let vertex = SkinnedVertex::rigid(Vec3::X, Vec3::X, 0);

        let mut out = Vec::new();
        skin_vertices(&bones, &[vertex], BoneInfluenceMode::One, &mut out);
        assert!(approx_v3(out[0].position, Vec3::Y));
        assert!(approx_v3(out[0].normal, Vec3::Y));
    }

    #[test]
    fn byte_view_covers_every_vertex() {
        let vertices = vec![Vertex::default(); 3];
        assert_eq!(as_bytes(&vertices).len(), 3 * std::mem::size_of::<Vertex>());
    }
}

use glam::{Vec2, Vec3};

use crate::{Error, Result};

/// Indexed triangle mesh in the engine's vertex layout.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    /// xyz = tangent, w = bitangent sign.
    pub tangents: Vec<[f32; 4]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Validates attribute counts and index bounds, generating flat
    /// normals, zero UVs and tangents where they are missing.
    pub fn finalize(mut self) -> Result<Self> {
        let count = self.positions.len();
        if count == 0 || self.indices.len() % 3 != 0 {
            return Err(Error::BadMesh("positions empty or index count not a triangle multiple"));
        }
        if self.indices.iter().any(|&i| i as usize >= count) {
            return Err(Error::BadMesh("index out of bounds"));
        }
        if self.uvs.is_empty() {
            self.uvs = vec![[0.0, 0.0]; count];
        }
        if self.normals.is_empty() {
            self.normals = vec![[0.0, 0.0, 0.0]; count];
            self.accumulate_face_normals();
        }
        if self.uvs.len() != count || self.normals.len() != count {
            return Err(Error::BadMesh("attribute counts disagree"));
        }
        if self.tangents.len() != count {
            self.tangents = generate_tangents(&self.positions, &self.normals, &self.uvs, &self.indices);
        }
        Ok(self)
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn accumulate_face_normals(&mut self) {
        for triangle in self.indices.chunks_exact(3) {
            let [a, b, c] = [triangle[0] as usize, triangle[1] as usize, triangle[2] as usize];
            let pa = Vec3::from_array(self.positions[a]);
            let pb = Vec3::from_array(self.positions[b]);
            let pc = Vec3::from_array(self.positions[c]);
            let normal = (pb - pa).cross(pc - pa);
            for index in [a, b, c] {
                let acc = Vec3::from_array(self.normals[index]) + normal;
                self.normals[index] = acc.to_array();
            }
        }
        for normal in &mut self.normals {
            *normal = Vec3::from_array(*normal).normalize_or_zero().to_array();
        }
    }
}

/// Deterministic tangent generation: per-triangle tangents accumulated per
/// vertex in index order, then Gram-Schmidt orthonormalized against the
/// normal. Iteration order is fixed, so the result is a pure function of
/// the mesh data.
pub(crate) fn generate_tangents(
    positions: &[[f32; 3]],
    normals: &[[f32; 3]],
    uvs: &[[f32; 2]],
    indices: &[u32],
) -> Vec<[f32; 4]> {
    let mut accum = vec![Vec3::ZERO; positions.len()];
    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0] as usize, triangle[1] as usize, triangle[2] as usize];
        let pa = Vec3::from_array(positions[a]);
        let pb = Vec3::from_array(positions[b]);
        let pc = Vec3::from_array(positions[c]);
        let ua = Vec2::from_array(uvs[a]);
        let ub = Vec2::from_array(uvs[b]);
        let uc = Vec2::from_array(uvs[c]);

        let edge1 = pb - pa;
        let edge2 = pc - pa;
        let duv1 = ub - ua;
        let duv2 = uc - ua;

        let det = duv1.x * duv2.y - duv2.x * duv1.y;
        let tangent = if det.abs() < 1e-12 {
            // Degenerate UVs: fall back to the first edge direction.
            edge1
        } else {
            (edge1 * duv2.y - edge2 * duv1.y) / det
        };
        for index in [a, b, c] {
            accum[index] += tangent;
        }
    }

    accum
        .iter()
        .zip(normals.iter())
        .map(|(tangent, normal)| {
            let n = Vec3::from_array(*normal);
            let t = (*tangent - n * n.dot(*tangent)).normalize_or_zero();
            let t = if t == Vec3::ZERO {
                // Any stable perpendicular will do for unused tangents.
                let fallback = n.cross(Vec3::Y);
                if fallback.length_squared() > 1e-12 {
                    fallback.normalize()
                } else {
                    Vec3::X
                }
            } else {
                t
            };
            [t.x, t.y, t.z, 1.0]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> Mesh {
        Mesh {
            positions: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            uvs: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            indices: vec![0, 1, 2, 0, 2, 3],
            ..Mesh::default()
        }
    }

    #[test]
    fn finalize_fills_missing_attributes() {
        let mesh = quad().finalize().unwrap();
        assert_eq!(mesh.normals.len(), 4);
        assert_eq!(mesh.tangents.len(), 4);
        // Face normal of the xy quad points along +Z (counter-clockwise).
        assert!(mesh.normals[0][2] > 0.99);
        // Tangent follows +U, which is +X here.
        assert!(mesh.tangents[0][0] > 0.99);
    }

    #[test]
    fn tangents_are_deterministic() {
        let a = quad().finalize().unwrap();
        let b = quad().finalize().unwrap();
        assert_eq!(a.tangents, b.tangents);
    }

    #[test]
    fn bad_meshes_are_rejected() {
        assert!(Mesh::default().finalize().is_err());
        let mut mesh = quad();
        mesh.indices = vec![0, 1, 9];
        assert!(mesh.finalize().is_err());
        let mut mesh = quad();
        mesh.indices.pop();
        assert!(mesh.finalize().is_err());
    }
}

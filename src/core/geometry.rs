use nalgebra::{Point3, Vector2, Vector3};

/// Represents a single vertex in 3D space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// Position in local object space.
    pub position: Point3<f32>,
    /// Normal vector for lighting calculations.
    pub normal: Vector3<f32>,
    /// Texture coordinates (UV).
    pub texcoord: Vector2<f32>,
    /// Tangent vector for normal mapping.
    pub tangent: Vector3<f32>,
    /// Bitangent vector, completes the TBN basis together with `tangent` and `normal`.
    pub bitangent: Vector3<f32>,
}

impl Vertex {
    /// Number of floats in the interleaved GPU layout:
    /// position(3) normal(3) texcoord(2) tangent(3) bitangent(3).
    pub const FLOATS: usize = 14;

    pub fn new(position: Point3<f32>, normal: Vector3<f32>, texcoord: Vector2<f32>) -> Self {
        Self {
            position,
            normal,
            texcoord,
            tangent: Vector3::zeros(),
            bitangent: Vector3::zeros(),
        }
    }

    /// Appends this vertex to an interleaved float buffer.
    pub fn write_interleaved(&self, out: &mut Vec<f32>) {
        out.extend_from_slice(&[
            self.position.x,
            self.position.y,
            self.position.z,
            self.normal.x,
            self.normal.y,
            self.normal.z,
            self.texcoord.x,
            self.texcoord.y,
            self.tangent.x,
            self.tangent.y,
            self.tangent.z,
            self.bitangent.x,
            self.bitangent.y,
            self.bitangent.z,
        ]);
    }
}

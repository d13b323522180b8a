use nalgebra::{Point3, Vector2, Vector3, Vector4};
use std::ops::{Add, Mul};

/// Trait for types that can be linearly interpolated across a primitive.
///
/// Requirements:
/// - Copy + Clone: cheaply duplicable values for per-vertex storage and interpolation.
/// - Add + Mul<f32>: support linear combination (a + b * t) used by barycentric interpolation.
/// - Send + Sync: safe to use from multiple threads during parallel rasterization.
pub trait Interpolatable:
    Copy + Clone + Add<Output = Self> + Mul<f32, Output = Self> + Send + Sync
{
}

impl Interpolatable for Vector2<f32> {}
impl Interpolatable for Vector3<f32> {}

/// Attributes fetched from the bound vertex buffers for one vertex.
///
/// The device fills only the channels the active program declares; the rest
/// stay at their defaults.
#[derive(Debug, Clone, Copy)]
pub struct VertexInput {
    pub position: Point3<f32>,
    pub color: Vector3<f32>,
    pub texcoord: Vector2<f32>,
}

impl Default for VertexInput {
    fn default() -> Self {
        Self {
            position: Point3::origin(),
            color: Vector3::new(1.0, 1.0, 1.0),
            texcoord: Vector2::zeros(),
        }
    }
}

/// Shader represents the programmable stages of the pipeline.
///
/// Implementations must be thread-safe (Send + Sync) because shading may be invoked
/// concurrently across fragments.
pub trait Shader: Send + Sync {
    /// Per-vertex varying data to be interpolated and provided to the fragment shader.
    type Varying: Interpolatable;

    /// Transforms the vertex into homogeneous clip space and returns the varying
    /// that will be interpolated across the primitive.
    fn vertex(&self, input: &VertexInput) -> (Vector4<f32>, Self::Varying);

    /// Computes the final RGB color for the current fragment.
    fn fragment(&self, varying: Self::Varying) -> Vector3<f32>;
}

use crate::error::Result;
use crate::gpu::device::{GpuContext, Topology, UniformValue, VertexLayout};
use crate::pipeline::shaders;
use crate::scene::camera::OrbitCamera;
use crate::scene::drawable::Drawable;
use crate::scene::scene_object::{Geometry, SceneObject};
use nalgebra::{Matrix4, Vector3};

/// Wireframe of a pinhole camera looking down its local +Z axis.
pub struct CameraFrustum {
    object: SceneObject,
    pub color: Vector3<f32>,
}

impl CameraFrustum {
    pub const DEFAULT_FOV_DEG: f32 = 60.0;
    pub const LINE_WIDTH: f32 = 2.0;

    pub fn new(gpu: &GpuContext, fov_rad: f32, scale: f32) -> Result<Self> {
        let object = SceneObject::build(
            gpu,
            "camera_frustum",
            (shaders::FLAT_VS, shaders::FLAT_FS),
            Topology::Lines,
            || Self::geometry(fov_rad, scale),
        )?
        .with_line_width(Self::LINE_WIDTH);

        Ok(Self {
            object,
            color: Vector3::new(1.0, 1.0, 1.0),
        })
    }

    /// Four edges from the centre to the image plane at depth `scale`, plus
    /// the image-plane rectangle.
    pub fn geometry(fov_rad: f32, scale: f32) -> Geometry {
        let h = scale * (fov_rad / 2.0).tan();
        let corners = [[-h, -h, scale], [h, -h, scale], [h, h, scale], [-h, h, scale]];

        let mut vertices = Vec::with_capacity(16 * 3);
        for corner in &corners {
            vertices.extend_from_slice(&[0.0, 0.0, 0.0]);
            vertices.extend_from_slice(corner);
        }
        for i in 0..4 {
            vertices.extend_from_slice(&corners[i]);
            vertices.extend_from_slice(&corners[(i + 1) % 4]);
        }

        Geometry {
            vertices,
            indices: None,
            layout: VertexLayout::packed(&[3]),
        }
    }
}

impl Drawable for CameraFrustum {
    fn name(&self) -> &str {
        self.object.name()
    }

    fn transform(&self) -> &Matrix4<f32> {
        &self.object.transform
    }

    fn set_transform(&mut self, transform: Matrix4<f32>) {
        self.object.transform = transform;
    }

    fn draw(&self, camera: &OrbitCamera) -> Result<()> {
        self.object.draw_with(camera, |program| {
            program.set_or_warn("color", UniformValue::Vec3(self.color))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn eight_segments_with_matching_opening_angle() {
        let geometry = CameraFrustum::geometry(60f32.to_radians(), 2.0);
        assert_eq!(geometry.vertex_count(), 16);

        // Second vertex is the (-h, -h, scale) corner.
        let corner = &geometry.vertices[3..6];
        assert_relative_eq!(corner[0].abs() / corner[2], 30f32.to_radians().tan(), epsilon = 1e-6);
    }
}

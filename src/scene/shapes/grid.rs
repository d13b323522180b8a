use crate::error::Result;
use crate::gpu::device::{GpuContext, Topology, UniformValue, VertexLayout};
use crate::pipeline::shaders;
use crate::scene::camera::OrbitCamera;
use crate::scene::drawable::Drawable;
use crate::scene::scene_object::{Geometry, SceneObject};
use nalgebra::{Matrix4, Vector3};

/// A square line grid on the XZ plane, one unit between lines.
pub struct Grid {
    object: SceneObject,
    grid_size: usize,
    pub color: Vector3<f32>,
}

impl Grid {
    pub const DEFAULT_SIZE: usize = 10;

    pub fn new(gpu: &GpuContext, grid_size: usize) -> Result<Self> {
        let object = SceneObject::build(
            gpu,
            "grid",
            (shaders::FLAT_VS, shaders::FLAT_FS),
            Topology::Lines,
            || Self::geometry(grid_size),
        )?;

        Ok(Self {
            object,
            grid_size,
            color: Vector3::new(0.8, 0.8, 0.8),
        })
    }

    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    /// `2 * (grid_size + 1)` segments, centred on the origin.
    pub fn geometry(grid_size: usize) -> Geometry {
        let half = grid_size as f32 / 2.0;
        let mut vertices = Vec::with_capacity((grid_size + 1) * 12);

        for i in 0..=grid_size {
            let offset = -half + i as f32;
            // Parallel to Z
            vertices.extend_from_slice(&[offset, 0.0, -half, offset, 0.0, half]);
            // Parallel to X
            vertices.extend_from_slice(&[-half, 0.0, offset, half, 0.0, offset]);
        }

        Geometry {
            vertices,
            indices: None,
            layout: VertexLayout::packed(&[3]),
        }
    }
}

impl Drawable for Grid {
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

    #[test]
    fn generates_two_segments_per_step() {
        let geometry = Grid::geometry(10);
        assert_eq!(geometry.vertex_count(), 2 * 2 * 11);
        // Every vertex lies on the ground plane inside [-5, 5].
        for v in geometry.vertices.chunks(3) {
            assert_eq!(v[1], 0.0);
            assert!(v[0].abs() <= 5.0 && v[2].abs() <= 5.0);
        }
    }

    #[test]
    fn zero_size_grid_is_a_cross() {
        assert_eq!(Grid::geometry(0).vertex_count(), 4);
    }
}

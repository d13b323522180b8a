use crate::error::Result;
use crate::gpu::device::{GpuContext, Topology, VertexLayout};
use crate::pipeline::shaders;
use crate::scene::camera::OrbitCamera;
use crate::scene::drawable::Drawable;
use crate::scene::scene_object::{Geometry, SceneObject};
use nalgebra::{Matrix4, Vector3};

/// Triangles of the cube, counter-clockwise seen from outside.
/// Corner `i` has coordinates `(i & 1, i >> 1 & 1, i >> 2 & 1)`.
const CUBE_INDICES: [u32; 36] = [
    0, 2, 1, 1, 2, 3, // -Z
    4, 5, 6, 5, 7, 6, // +Z
    0, 4, 2, 2, 4, 6, // -X
    1, 3, 5, 3, 7, 5, // +X
    0, 1, 4, 1, 5, 4, // -Y
    2, 6, 3, 3, 6, 7, // +Y
];

/// A solid, single-coloured cube centred on the origin.
pub struct Cube {
    object: SceneObject,
    pub size: f32,
}

impl Cube {
    pub const DEFAULT_SIZE: f32 = 0.5;
    pub const DEFAULT_COLOR: [f32; 3] = [0.9, 0.4, 0.2];

    pub fn new(gpu: &GpuContext, size: f32) -> Result<Self> {
        Self::with_color(gpu, size, Vector3::from(Self::DEFAULT_COLOR))
    }

    pub fn with_color(gpu: &GpuContext, size: f32, color: Vector3<f32>) -> Result<Self> {
        let object = SceneObject::build(
            gpu,
            "cube",
            (shaders::VERTEX_COLOR_VS, shaders::VERTEX_COLOR_FS),
            Topology::Triangles,
            || Self::geometry(size, color),
        )?;
        Ok(Self { object, size })
    }

    /// 8 corners (position + colour) and 12 indexed triangles.
    pub fn geometry(size: f32, color: Vector3<f32>) -> Geometry {
        let half = size / 2.0;
        let mut vertices = Vec::with_capacity(8 * 6);
        for i in 0..8u32 {
            let corner = |bit: u32| if i >> bit & 1 == 1 { half } else { -half };
            vertices.extend_from_slice(&[corner(0), corner(1), corner(2)]);
            vertices.extend_from_slice(color.as_slice());
        }

        Geometry {
            vertices,
            indices: Some(CUBE_INDICES.to_vec()),
            layout: VertexLayout::packed(&[3, 3]),
        }
    }
}

impl Drawable for Cube {
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
        self.object.draw_with(camera, |_| Ok(()))
    }
}

use crate::error::Result;
use crate::gpu::device::{GpuContext, Topology, VertexLayout};
use crate::pipeline::shaders;
use crate::scene::camera::OrbitCamera;
use crate::scene::drawable::Drawable;
use crate::scene::scene_object::{Geometry, SceneObject};
use nalgebra::Matrix4;

/// Coordinate axes: X red, Y green, Z blue.
pub struct Frame {
    object: SceneObject,
}

impl Frame {
    pub const LINE_WIDTH: f32 = 5.0;

    pub fn new(gpu: &GpuContext, axis_length: f32) -> Result<Self> {
        let object = SceneObject::build(
            gpu,
            "frame",
            (shaders::VERTEX_COLOR_VS, shaders::VERTEX_COLOR_FS),
            Topology::Lines,
            || Self::geometry(axis_length),
        )?
        .with_line_width(Self::LINE_WIDTH);
        Ok(Self { object })
    }

    pub fn geometry(axis_length: f32) -> Geometry {
        let l = axis_length;
        #[rustfmt::skip]
        let vertices = vec![
            0.0, 0.0, 0.0,  1.0, 0.0, 0.0,
            l,   0.0, 0.0,  1.0, 0.0, 0.0,
            0.0, 0.0, 0.0,  0.0, 1.0, 0.0,
            0.0, l,   0.0,  0.0, 1.0, 0.0,
            0.0, 0.0, 0.0,  0.0, 0.0, 1.0,
            0.0, 0.0, l,    0.0, 0.0, 1.0,
        ];
        Geometry {
            vertices,
            indices: None,
            layout: VertexLayout::packed(&[3, 3]),
        }
    }
}

impl Drawable for Frame {
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

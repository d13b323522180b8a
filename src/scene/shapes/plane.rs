use crate::error::Result;
use crate::gpu::device::{GpuContext, Topology, UniformValue, VertexLayout};
use crate::gpu::resources::GpuTexture;
use crate::io::image::{ImageData, ImageLoader};
use crate::pipeline::shaders;
use crate::scene::camera::OrbitCamera;
use crate::scene::drawable::Drawable;
use crate::scene::scene_object::{Geometry, SceneObject};
use nalgebra::Matrix4;
use std::path::Path;

/// A textured quad in the local XY plane. The plane owns its texture.
pub struct TexturedPlane {
    object: SceneObject,
    texture: GpuTexture,
    gpu: GpuContext,
}

impl TexturedPlane {
    pub const DEFAULT_HALF_EXTENT: f32 = 0.5;

    pub fn new(gpu: &GpuContext, image: &ImageData, half_extent: f32) -> Result<Self> {
        let object = SceneObject::build(
            gpu,
            "plane",
            (shaders::PLANE_VS, shaders::PLANE_FS),
            Topology::Triangles,
            || Self::geometry(half_extent),
        )?;
        let texture = GpuTexture::upload(gpu, image)?;

        Ok(Self {
            object,
            texture,
            gpu: gpu.clone(),
        })
    }

    pub fn load(
        gpu: &GpuContext,
        loader: &mut dyn ImageLoader,
        path: &Path,
        half_extent: f32,
    ) -> Result<Self> {
        let image = loader.load(path)?;
        Self::new(gpu, &image, half_extent)
    }

    pub fn texture_size(&self) -> (u32, u32) {
        (self.texture.width, self.texture.height)
    }

    pub fn geometry(half_extent: f32) -> Geometry {
        let e = half_extent;
        #[rustfmt::skip]
        let vertices = vec![
            -e, -e, 0.0,  0.0, 0.0,
             e, -e, 0.0,  1.0, 0.0,
             e,  e, 0.0,  1.0, 1.0,
            -e,  e, 0.0,  0.0, 1.0,
        ];
        Geometry {
            vertices,
            indices: Some(vec![0, 1, 2, 0, 2, 3]),
            layout: VertexLayout::packed(&[3, 2]),
        }
    }
}

impl Drawable for TexturedPlane {
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
        let result = self.object.draw_with(camera, |program| {
            self.gpu.borrow_mut().bind_texture(0, Some(self.texture.id()));
            program.set_or_warn("texture1", UniformValue::Int(0))
        });
        self.gpu.borrow_mut().bind_texture(0, None);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::software::SoftwareDevice;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn draws_its_texture_across_the_screen() {
        let gpu: GpuContext = Rc::new(RefCell::new(SoftwareDevice::new(8, 8, 1)));
        let mut plane =
            TexturedPlane::new(&gpu, &ImageData::solid(2, 2, [0, 0, 255]), 1.0).unwrap();
        assert_eq!(plane.texture_size(), (2, 2));

        // Shrink the orbit so the quad fills the view.
        let mut camera = OrbitCamera::default();
        camera.set_viewport(8, 8);
        camera.radius = 0.5;
        camera.set_orientation(0.0, 0.0).unwrap();
        // front = +Z: the eye sits on -Z looking at the quad's back face, which is fine without culling.
        plane.set_transform(Matrix4::identity());

        gpu.borrow_mut().clear(nalgebra::Vector3::zeros());
        plane.draw(&camera).unwrap();

        let frame = gpu.borrow().read_frame();
        assert_eq!(frame[4 * 8 + 4] & 0xFFFFFF, 0x0000FF);
        assert_eq!(gpu.borrow().stats().live_textures, 1);
        drop(plane);
        assert_eq!(gpu.borrow().stats().live_textures, 0);
    }
}

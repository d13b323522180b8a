use crate::error::Result;
use crate::pipeline::program::ShaderProgram;
use crate::scene::camera::OrbitCamera;
use crate::scene::drawable::{Drawable, upload_camera_uniforms};
use crate::scene::mesh::GpuMesh;
use crate::scene::utils::Aabb;
use nalgebra::Matrix4;

/// A model produced by the import pipeline: its meshes in traversal order,
/// one shared program and the bounds of all vertices.
pub struct ImportedModel {
    name: String,
    program: ShaderProgram,
    pub meshes: Vec<GpuMesh>,
    pub bounds: Option<Aabb>,
    pub transform: Matrix4<f32>,
}

impl ImportedModel {
    pub fn new(
        name: &str,
        program: ShaderProgram,
        meshes: Vec<GpuMesh>,
        bounds: Option<Aabb>,
    ) -> Self {
        Self {
            name: name.to_string(),
            program,
            meshes,
            bounds,
            transform: Matrix4::identity(),
        }
    }

    /// Centres the model and scales it to fit a 1.8 unit cube, on top of
    /// `placement`.
    pub fn normalize(&mut self, placement: Matrix4<f32>) {
        let fit = self
            .bounds
            .map(|b| b.normalize_transform())
            .unwrap_or_else(Matrix4::identity);
        self.transform = placement * fit;
    }
}

impl std::fmt::Debug for ImportedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportedModel")
            .field("name", &self.name)
            .field("meshes", &self.meshes)
            .field("bounds", &self.bounds)
            .finish()
    }
}

impl Drawable for ImportedModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&self) -> &Matrix4<f32> {
        &self.transform
    }

    fn set_transform(&mut self, transform: Matrix4<f32>) {
        self.transform = transform;
    }

    fn draw(&self, camera: &OrbitCamera) -> Result<()> {
        upload_camera_uniforms(&self.program, camera, &self.transform)?;
        let result = self
            .meshes
            .iter()
            .try_for_each(|mesh| mesh.draw(&self.program));
        self.program.deactivate();
        result
    }
}

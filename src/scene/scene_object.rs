use crate::error::Result;
use crate::gpu::device::{BufferData, GpuContext, Topology, VertexLayout};
use crate::gpu::resources::{GpuBuffer, VertexArray};
use crate::pipeline::program::ShaderProgram;
use crate::scene::camera::OrbitCamera;
use crate::scene::drawable::upload_camera_uniforms;
use log::debug;
use nalgebra::Matrix4;

/// CPU-side vertex data for one shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Geometry {
    pub vertices: Vec<f32>,
    pub indices: Option<Vec<u32>>,
    pub layout: VertexLayout,
}

impl Geometry {
    pub fn vertex_count(&self) -> usize {
        if self.layout.stride == 0 {
            0
        } else {
            self.vertices.len() / self.layout.stride
        }
    }
}

/// The GPU half of a built-in shape: program, buffers, topology and transform.
///
/// Shapes wrap one of these and add their own uniforms on top.
pub struct SceneObject {
    gpu: GpuContext,
    name: String,
    program: ShaderProgram,
    vao: VertexArray,
    topology: Topology,
    line_width: f32,
    pub transform: Matrix4<f32>,
}

impl SceneObject {
    /// Builds the object in a fixed order: link the program, generate the
    /// vertex data, upload it, then configure the attribute layout. Anything
    /// allocated before a failing step is released again.
    pub fn build(
        gpu: &GpuContext,
        name: &str,
        shaders: (&str, &str),
        topology: Topology,
        generate: impl FnOnce() -> Geometry,
    ) -> Result<Self> {
        let program = ShaderProgram::new(gpu, name, shaders.0, shaders.1)?;
        let geometry = generate();

        let vertices = GpuBuffer::new(gpu, BufferData::Vertices(&geometry.vertices))?;
        let indices = match &geometry.indices {
            Some(indices) => Some(GpuBuffer::new(gpu, BufferData::Indices(indices))?),
            None => None,
        };
        let vao = VertexArray::new(gpu, vertices, indices, geometry.layout.clone())?;

        debug!(
            "Built '{}': {} vertices, {:?}",
            name,
            geometry.vertex_count(),
            topology
        );

        Ok(Self {
            gpu: gpu.clone(),
            name: name.to_string(),
            program,
            vao,
            topology,
            line_width: 1.0,
            transform: Matrix4::identity(),
        })
    }

    pub fn with_line_width(mut self, width: f32) -> Self {
        self.line_width = width;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn program(&self) -> &ShaderProgram {
        &self.program
    }

    pub fn vertex_count(&self) -> usize {
        self.vao.vertex_count()
    }

    /// Replaces the vertex (and index) data. The layout must stay the same.
    pub fn update_geometry(&mut self, geometry: &Geometry) -> Result<()> {
        self.vao.update_vertices(&geometry.vertices)?;
        if let Some(indices) = &geometry.indices {
            self.vao.update_indices(indices)?;
        }
        Ok(())
    }

    /// Runs the draw sequence. `bind_extra` sets shape-specific uniforms and
    /// textures after the camera uniforms are in place.
    pub fn draw_with(
        &self,
        camera: &OrbitCamera,
        bind_extra: impl FnOnce(&ShaderProgram) -> Result<()>,
    ) -> Result<()> {
        upload_camera_uniforms(&self.program, camera, &self.transform)?;
        bind_extra(&self.program)?;

        let mut device = self.gpu.borrow_mut();
        if self.topology == Topology::Lines {
            device.set_line_width(self.line_width);
        }
        device.bind_vertex_array(Some(self.vao.id()));

        let result = match self.vao.index_count() {
            Some(count) => device.draw_elements(self.topology, count),
            None => device.draw_arrays(self.topology, 0, self.vao.vertex_count()),
        };

        device.bind_vertex_array(None);
        device.set_line_width(1.0);
        device.use_program(None);
        result
    }
}

impl std::fmt::Debug for SceneObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneObject")
            .field("name", &self.name)
            .field("topology", &self.topology)
            .field("vao", &self.vao)
            .finish()
    }
}

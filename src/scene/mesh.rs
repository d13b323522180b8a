use crate::core::geometry::Vertex;
use crate::error::Result;
use crate::gpu::device::{BufferData, GpuContext, Topology, UniformValue, VertexLayout};
use crate::gpu::resources::{GpuBuffer, VertexArray};
use crate::pipeline::program::ShaderProgram;
use crate::scene::texture::{TextureKind, TextureRef};
use log::warn;
use std::cell::Cell;
use std::collections::HashMap;

/// A collection of vertices and indices representing a 3D object.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub name: String,
    /// List of vertices.
    pub vertices: Vec<Vertex>,
    /// List of indices defining triangles (3 indices per triangle).
    pub indices: Vec<u32>,
    pub textures: Vec<TextureRef>,
}

impl Mesh {
    pub fn new(name: &str, vertices: Vec<Vertex>, indices: Vec<u32>, textures: Vec<TextureRef>) -> Self {
        Self {
            name: name.to_string(),
            vertices,
            indices,
            textures,
        }
    }

    /// Attribute layout of [`Vertex::write_interleaved`]: position, normal,
    /// texcoord, tangent, bitangent at locations 0 to 4.
    pub fn layout() -> VertexLayout {
        VertexLayout::packed(&[3, 3, 2, 3, 3])
    }

    pub fn interleaved(&self) -> Vec<f32> {
        let mut data = Vec::with_capacity(self.vertices.len() * Vertex::FLOATS);
        for vertex in &self.vertices {
            vertex.write_interleaved(&mut data);
        }
        data
    }

    /// One-time upload to GPU buffers.
    pub fn upload(self, gpu: &GpuContext) -> Result<GpuMesh> {
        let vertices = GpuBuffer::new(gpu, BufferData::Vertices(&self.interleaved()))?;
        let indices = GpuBuffer::new(gpu, BufferData::Indices(&self.indices))?;
        let vao = VertexArray::new(gpu, vertices, Some(indices), Self::layout())?;

        Ok(GpuMesh {
            gpu: gpu.clone(),
            name: self.name,
            vao,
            index_count: self.indices.len(),
            textures: self.textures,
            warned_released: Cell::new(false),
        })
    }
}

/// A mesh whose buffers live on the GPU.
pub struct GpuMesh {
    gpu: GpuContext,
    pub name: String,
    vao: VertexArray,
    index_count: usize,
    pub textures: Vec<TextureRef>,
    warned_released: Cell<bool>,
}

impl GpuMesh {
    pub fn index_count(&self) -> usize {
        self.index_count
    }

    /// Binds the textures to consecutive units, points the
    /// `texture_<kind><n>` samplers at them and draws. `program` must be active.
    pub fn draw(&self, program: &ShaderProgram) -> Result<()> {
        let mut bound_units = Vec::with_capacity(self.textures.len());
        let result = self
            .bind_textures(program, &mut bound_units)
            .and_then(|()| {
                let mut device = self.gpu.borrow_mut();
                device.bind_vertex_array(Some(self.vao.id()));
                let result = device.draw_elements(Topology::Triangles, self.index_count);
                device.bind_vertex_array(None);
                result
            });

        let mut device = self.gpu.borrow_mut();
        for unit in bound_units {
            device.bind_texture(unit, None);
        }
        result
    }

    fn bind_textures(&self, program: &ShaderProgram, bound_units: &mut Vec<u32>) -> Result<()> {
        let mut counters: HashMap<TextureKind, usize> = HashMap::new();

        for (unit, texture) in self.textures.iter().enumerate() {
            let Some(id) = texture.id() else {
                if !self.warned_released.replace(true) {
                    warn!(
                        "Texture {:?} of mesh '{}' was released, skipping",
                        texture.path, self.name
                    );
                }
                continue;
            };
            let n = counters.entry(texture.kind).or_insert(0);
            *n += 1;

            self.gpu.borrow_mut().bind_texture(unit as u32, Some(id));
            bound_units.push(unit as u32);
            program.set_or_warn(
                &texture.kind.sampler_name(*n),
                UniformValue::Int(unit as i32),
            )?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for GpuMesh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuMesh")
            .field("name", &self.name)
            .field("index_count", &self.index_count)
            .field("textures", &self.textures.len())
            .finish()
    }
}

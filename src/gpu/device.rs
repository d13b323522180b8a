use crate::error::Result;
use crate::io::image::ImageData;
use nalgebra::{Matrix4, Vector3, Vector4};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

macro_rules! handle {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub u32);
        )*
    };
}

handle!(
    ShaderId,
    ProgramId,
    BufferId,
    VertexArrayId,
    TextureId,
    /// Index of a uniform inside the program that reported it.
    UniformLocation,
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

/// Primitive assembly mode for a draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    Triangles,
    Lines,
}

/// Data handed to the device for a buffer upload.
#[derive(Debug, Clone, Copy)]
pub enum BufferData<'a> {
    Vertices(&'a [f32]),
    Indices(&'a [u32]),
}

impl BufferData<'_> {
    pub fn is_empty(&self) -> bool {
        match self {
            BufferData::Vertices(data) => data.is_empty(),
            BufferData::Indices(data) => data.is_empty(),
        }
    }
}

/// One attribute inside an interleaved vertex buffer. Units are floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub components: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VertexLayout {
    /// Floats per vertex.
    pub stride: usize,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Builds a tightly packed layout: attribute `i` lives at location `i`.
    pub fn packed(components: &[usize]) -> Self {
        let mut attributes = Vec::with_capacity(components.len());
        let mut offset = 0;
        for (location, &count) in components.iter().enumerate() {
            attributes.push(VertexAttribute {
                location: location as u32,
                components: count,
                offset,
            });
            offset += count;
        }
        Self {
            stride: offset,
            attributes,
        }
    }

    pub fn attribute(&self, location: u32) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.location == location)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec3(Vector3<f32>),
    Vec4(Vector4<f32>),
    Mat4(Matrix4<f32>),
}

/// Counters a device keeps about the objects it owns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub live_shaders: usize,
    pub live_programs: usize,
    pub live_buffers: usize,
    pub live_vertex_arrays: usize,
    pub live_textures: usize,
    pub texture_uploads: usize,
    pub draw_calls: usize,
}

/// The graphics API as seen by the viewer.
///
/// Handles are plain ids; ownership lives in the RAII wrappers in
/// `gpu::resources` and `pipeline::program`. Deleting an unknown handle is a
/// no-op, like in GL.
pub trait Device {
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId>;
    fn delete_shader(&mut self, shader: ShaderId);

    fn link_program(&mut self, vertex: ShaderId, fragment: ShaderId) -> Result<ProgramId>;
    fn delete_program(&mut self, program: ProgramId);
    fn use_program(&mut self, program: Option<ProgramId>);

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;
    /// Sets a uniform of the program currently in use.
    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) -> Result<()>;

    fn create_buffer(&mut self, data: BufferData<'_>) -> Result<BufferId>;
    fn update_buffer(&mut self, buffer: BufferId, data: BufferData<'_>) -> Result<()>;
    fn delete_buffer(&mut self, buffer: BufferId);

    fn create_vertex_array(&mut self) -> Result<VertexArrayId>;
    fn configure_vertex_array(
        &mut self,
        vao: VertexArrayId,
        vertices: BufferId,
        indices: Option<BufferId>,
        layout: &VertexLayout,
    ) -> Result<()>;
    fn bind_vertex_array(&mut self, vao: Option<VertexArrayId>);
    fn delete_vertex_array(&mut self, vao: VertexArrayId);

    fn create_texture(&mut self, image: &ImageData) -> Result<TextureId>;
    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>);
    fn delete_texture(&mut self, texture: TextureId);

    fn set_line_width(&mut self, width: f32);
    fn draw_arrays(&mut self, topology: Topology, first: usize, count: usize) -> Result<()>;
    fn draw_elements(&mut self, topology: Topology, count: usize) -> Result<()>;

    fn set_viewport(&mut self, width: usize, height: usize);
    fn viewport(&self) -> (usize, usize);
    fn clear(&mut self, color: Vector3<f32>);
    /// Current frame as packed opaque ARGB pixels, row-major from the top-left.
    fn read_frame(&self) -> Vec<u32>;

    fn stats(&self) -> DeviceStats;
}

/// Shared handle to the device. The viewer is single-threaded.
pub type GpuContext = Rc<RefCell<dyn Device>>;

use crate::error::{Result, ViewerError};
use crate::gpu::device::{
    BufferData, BufferId, Device, GpuContext, TextureId, VertexArrayId, VertexLayout,
};
use crate::io::image::ImageData;
use log::warn;
use std::fmt;

/// Releases a handle on drop. A device that is already borrowed (which only
/// happens while unwinding out of a device call) leaks the handle instead of
/// panicking a second time.
fn release(gpu: &GpuContext, what: &str, f: impl FnOnce(&mut dyn Device)) {
    match gpu.try_borrow_mut() {
        Ok(mut device) => f(&mut *device),
        Err(_) => warn!("GPU device busy, leaking {}", what),
    }
}

/// Owned vertex or index buffer.
pub struct GpuBuffer {
    gpu: GpuContext,
    id: BufferId,
    len: usize,
}

impl GpuBuffer {
    pub fn new(gpu: &GpuContext, data: BufferData<'_>) -> Result<Self> {
        let id = gpu.borrow_mut().create_buffer(data)?;
        Ok(Self {
            gpu: gpu.clone(),
            id,
            len: element_count(&data),
        })
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Number of floats or indices stored.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn update(&mut self, data: BufferData<'_>) -> Result<()> {
        self.gpu.borrow_mut().update_buffer(self.id, data)?;
        self.len = element_count(&data);
        Ok(())
    }
}

fn element_count(data: &BufferData<'_>) -> usize {
    match data {
        BufferData::Vertices(v) => v.len(),
        BufferData::Indices(i) => i.len(),
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        let id = self.id;
        release(&self.gpu, "buffer", |d| d.delete_buffer(id));
    }
}

impl fmt::Debug for GpuBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuBuffer")
            .field("id", &self.id)
            .field("len", &self.len)
            .finish()
    }
}

/// A vertex array together with the buffers it reads from.
pub struct VertexArray {
    gpu: GpuContext,
    id: VertexArrayId,
    layout: VertexLayout,
    vertices: GpuBuffer,
    indices: Option<GpuBuffer>,
}

impl VertexArray {
    pub fn new(
        gpu: &GpuContext,
        vertices: GpuBuffer,
        indices: Option<GpuBuffer>,
        layout: VertexLayout,
    ) -> Result<Self> {
        let id = gpu.borrow_mut().create_vertex_array()?;
        // Own the id before configuring so a failure below still releases it.
        let vao = Self {
            gpu: gpu.clone(),
            id,
            layout,
            vertices,
            indices,
        };
        let configured = vao.gpu.borrow_mut().configure_vertex_array(
            vao.id,
            vao.vertices.id(),
            vao.indices.as_ref().map(GpuBuffer::id),
            &vao.layout,
        );
        configured.map(|()| vao)
    }

    pub fn id(&self) -> VertexArrayId {
        self.id
    }

    /// Vertices available for a non-indexed draw.
    pub fn vertex_count(&self) -> usize {
        if self.layout.stride == 0 {
            0
        } else {
            self.vertices.len() / self.layout.stride
        }
    }

    pub fn index_count(&self) -> Option<usize> {
        self.indices.as_ref().map(GpuBuffer::len)
    }

    /// Replaces the vertex data, keeping the layout.
    pub fn update_vertices(&mut self, data: &[f32]) -> Result<()> {
        self.vertices.update(BufferData::Vertices(data))
    }

    pub fn update_indices(&mut self, data: &[u32]) -> Result<()> {
        match self.indices.as_mut() {
            Some(buffer) => buffer.update(BufferData::Indices(data)),
            None => Err(ViewerError::DrawState(
                "vertex array has no index buffer".into(),
            )),
        }
    }
}

impl Drop for VertexArray {
    fn drop(&mut self) {
        let id = self.id;
        release(&self.gpu, "vertex array", |d| d.delete_vertex_array(id));
    }
}

impl fmt::Debug for VertexArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VertexArray")
            .field("id", &self.id)
            .field("vertices", &self.vertices)
            .field("indices", &self.indices)
            .finish()
    }
}

/// Owned 2D texture.
pub struct GpuTexture {
    gpu: GpuContext,
    id: TextureId,
    pub width: u32,
    pub height: u32,
}

impl GpuTexture {
    pub fn upload(gpu: &GpuContext, image: &ImageData) -> Result<Self> {
        let id = gpu.borrow_mut().create_texture(image)?;
        Ok(Self {
            gpu: gpu.clone(),
            id,
            width: image.width,
            height: image.height,
        })
    }

    pub fn id(&self) -> TextureId {
        self.id
    }
}

impl Drop for GpuTexture {
    fn drop(&mut self) {
        let id = self.id;
        release(&self.gpu, "texture", |d| d.delete_texture(id));
    }
}

impl fmt::Debug for GpuTexture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GpuTexture({:?}, {}x{})", self.id, self.width, self.height)
    }
}

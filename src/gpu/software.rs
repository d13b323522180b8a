use crate::core::framebuffer::{FrameBuffer, resolve_to_buffer};
use crate::core::pipeline::{Shader, VertexInput};
use crate::core::rasterizer::Rasterizer;
use crate::error::{Result, ViewerError};
use crate::gpu::device::{
    BufferData, BufferId, Device, DeviceStats, ProgramId, ShaderId, ShaderStage, TextureId,
    Topology, UniformLocation, UniformValue, VertexArrayId, VertexLayout,
};
use crate::gpu::glsl::{self, Declaration, GlslType, ShaderInterface};
use crate::gpu::shading::{ColorShader, SoftwareTexture, TexturedShader};
use crate::io::image::ImageData;
use log::debug;
use nalgebra::{Matrix4, Point3, Vector2, Vector3};
use std::collections::HashMap;

struct CompiledShader {
    stage: ShaderStage,
    interface: ShaderInterface,
}

/// How fragments of a program get their colour, derived from its interface.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ShadingModel {
    /// Per-vertex colour read from the given attribute location.
    VertexColor { location: u32 },
    /// A `vec3` uniform, white when unset.
    Flat { uniform: Option<usize> },
    Textured {
        sampler: usize,
        texcoord: Option<u32>,
    },
}

struct LinkedProgram {
    uniforms: Vec<Declaration>,
    values: Vec<Option<UniformValue>>,
    shading: ShadingModel,
}

impl LinkedProgram {
    fn matrix(&self, name: &str) -> Matrix4<f32> {
        self.uniforms
            .iter()
            .position(|u| u.name == name)
            .and_then(|i| match self.values[i] {
                Some(UniformValue::Mat4(m)) => Some(m),
                _ => None,
            })
            .unwrap_or_else(Matrix4::identity)
    }
}

enum BufferStorage {
    Vertices(Vec<f32>),
    Indices(Vec<u32>),
}

impl BufferStorage {
    fn from_data(data: BufferData<'_>) -> Self {
        match data {
            BufferData::Vertices(v) => BufferStorage::Vertices(v.to_vec()),
            BufferData::Indices(i) => BufferStorage::Indices(i.to_vec()),
        }
    }
}

#[derive(Default)]
struct VertexArrayState {
    vertices: Option<BufferId>,
    indices: Option<BufferId>,
    layout: VertexLayout,
}

/// An in-process implementation of [`Device`] on top of the CPU rasterizer.
///
/// Shader sources are reflected, not executed: the program interface decides
/// between per-vertex colour, flat colour and textured output.
pub struct SoftwareDevice {
    framebuffer: FrameBuffer,
    rasterizer: Rasterizer,
    next_id: u32,

    shaders: HashMap<ShaderId, CompiledShader>,
    programs: HashMap<ProgramId, LinkedProgram>,
    buffers: HashMap<BufferId, BufferStorage>,
    vertex_arrays: HashMap<VertexArrayId, VertexArrayState>,
    textures: HashMap<TextureId, SoftwareTexture>,
    texture_units: HashMap<u32, TextureId>,

    current_program: Option<ProgramId>,
    current_vao: Option<VertexArrayId>,

    texture_uploads: usize,
    draw_calls: usize,
}

impl SoftwareDevice {
    /// `samples` is the SSAA factor per axis.
    pub fn new(width: usize, height: usize, samples: usize) -> Self {
        Self {
            framebuffer: FrameBuffer::new(width.max(1), height.max(1), samples.max(1)),
            rasterizer: Rasterizer::new(),
            next_id: 1,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            textures: HashMap::new(),
            texture_units: HashMap::new(),
            current_program: None,
            current_vao: None,
            texture_uploads: 0,
            draw_calls: 0,
        }
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn shading_model(uniforms: &[Declaration], vertex: &ShaderInterface) -> ShadingModel {
        let location_of = |index: usize, decl: &Declaration| decl.location.unwrap_or(index as u32);

        if let Some(sampler) = uniforms.iter().position(|u| u.ty == GlslType::Sampler2D) {
            let texcoord = vertex
                .inputs
                .iter()
                .enumerate()
                .find(|(_, d)| d.ty == GlslType::Vec2)
                .map(|(i, d)| location_of(i, d));
            return ShadingModel::Textured { sampler, texcoord };
        }

        if let Some(location) = vertex
            .inputs
            .iter()
            .enumerate()
            .find(|(_, d)| d.ty == GlslType::Vec3 && d.name.to_lowercase().contains("color"))
            .map(|(i, d)| location_of(i, d))
        {
            return ShadingModel::VertexColor { location };
        }

        ShadingModel::Flat {
            uniform: uniforms
                .iter()
                .position(|u| u.name == "color" && u.ty == GlslType::Vec3),
        }
    }

    /// Fetches and assembles the vertices referenced by `indices`.
    fn fetch_vertices(&self, indices: &[u32]) -> Result<(Vec<VertexInput>, &LinkedProgram)> {
        let program = self
            .current_program
            .and_then(|id| self.programs.get(&id))
            .ok_or_else(|| ViewerError::DrawState("no program in use".into()))?;
        let vao = self
            .current_vao
            .and_then(|id| self.vertex_arrays.get(&id))
            .ok_or_else(|| ViewerError::DrawState("no vertex array bound".into()))?;
        let data = match vao.vertices.and_then(|id| self.buffers.get(&id)) {
            Some(BufferStorage::Vertices(data)) => data,
            _ => {
                return Err(ViewerError::DrawState(
                    "vertex array has no vertex buffer".into(),
                ));
            }
        };

        let stride = vao.layout.stride;
        let read = |base: usize, location: u32| {
            vao.layout
                .attribute(location)
                .and_then(|attr| data.get(base + attr.offset..base + attr.offset + attr.components))
        };

        let flat_color = match program.shading {
            ShadingModel::Flat { uniform: Some(i) } => match program.values[i] {
                Some(UniformValue::Vec3(c)) => c,
                _ => Vector3::new(1.0, 1.0, 1.0),
            },
            _ => Vector3::new(1.0, 1.0, 1.0),
        };

        let mut inputs = Vec::with_capacity(indices.len());
        for &index in indices {
            let base = index as usize * stride;
            if stride == 0 || base + stride > data.len() {
                return Err(ViewerError::DrawState(format!(
                    "vertex {} is outside the bound buffer",
                    index
                )));
            }

            let mut input = VertexInput {
                color: flat_color,
                ..Default::default()
            };
            if let Some(p) = read(base, 0) {
                input.position = Point3::new(
                    p.first().copied().unwrap_or(0.0),
                    p.get(1).copied().unwrap_or(0.0),
                    p.get(2).copied().unwrap_or(0.0),
                );
            }
            match program.shading {
                ShadingModel::VertexColor { location } => {
                    if let Some([r, g, b, ..]) = read(base, location) {
                        input.color = Vector3::new(*r, *g, *b);
                    }
                }
                ShadingModel::Textured {
                    texcoord: Some(location),
                    ..
                } => {
                    if let Some([u, v, ..]) = read(base, location) {
                        input.texcoord = Vector2::new(*u, *v);
                    }
                }
                _ => {}
            }
            inputs.push(input);
        }

        Ok((inputs, program))
    }

    fn draw_indexed(&mut self, topology: Topology, indices: &[u32]) -> Result<()> {
        let (inputs, program) = self.fetch_vertices(indices)?;
        let mvp =
            program.matrix("projection") * program.matrix("view") * program.matrix("model");

        match program.shading {
            ShadingModel::Textured { sampler, .. } => {
                let unit = match program.values[sampler] {
                    Some(UniformValue::Int(unit)) => unit.max(0) as u32,
                    _ => 0,
                };
                let texture = self
                    .texture_units
                    .get(&unit)
                    .and_then(|id| self.textures.get(id));
                let shader = TexturedShader { mvp, texture };
                rasterize(&self.framebuffer, &self.rasterizer, &shader, &inputs, topology);
            }
            _ => {
                let shader = ColorShader { mvp };
                rasterize(&self.framebuffer, &self.rasterizer, &shader, &inputs, topology);
            }
        }

        self.draw_calls += 1;
        Ok(())
    }
}

fn rasterize<S: Shader>(
    framebuffer: &FrameBuffer,
    rasterizer: &Rasterizer,
    shader: &S,
    inputs: &[VertexInput],
    topology: Topology,
) {
    let processed: Vec<_> = inputs.iter().map(|v| shader.vertex(v)).collect();
    match topology {
        Topology::Triangles => {
            for tri in processed.chunks_exact(3) {
                rasterizer.rasterize_triangle(
                    framebuffer,
                    shader,
                    &[tri[0].0, tri[1].0, tri[2].0],
                    &[tri[0].1, tri[1].1, tri[2].1],
                );
            }
        }
        Topology::Lines => {
            for line in processed.chunks_exact(2) {
                rasterizer.rasterize_line(
                    framebuffer,
                    shader,
                    &[line[0].0, line[1].0],
                    &[line[0].1, line[1].1],
                );
            }
        }
    }
}

impl Device for SoftwareDevice {
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId> {
        let interface = glsl::reflect(stage, source)?;
        let id = ShaderId(self.allocate_id());
        self.shaders.insert(id, CompiledShader { stage, interface });
        Ok(id)
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        self.shaders.remove(&shader);
    }

    fn link_program(&mut self, vertex: ShaderId, fragment: ShaderId) -> Result<ProgramId> {
        let (vs, fs) = match (self.shaders.get(&vertex), self.shaders.get(&fragment)) {
            (Some(vs), Some(fs))
                if vs.stage == ShaderStage::Vertex && fs.stage == ShaderStage::Fragment =>
            {
                (&vs.interface, &fs.interface)
            }
            _ => {
                return Err(ViewerError::ShaderLink(
                    "expected one compiled vertex and one compiled fragment shader".into(),
                ));
            }
        };

        for input in &fs.inputs {
            let written = vs
                .outputs
                .iter()
                .any(|out| out.name == input.name && out.ty == input.ty);
            if !written {
                return Err(ViewerError::ShaderLink(format!(
                    "fragment input '{}' is not written by the vertex stage",
                    input.name
                )));
            }
        }

        let mut uniforms: Vec<Declaration> = vs.uniforms.clone();
        for uniform in &fs.uniforms {
            match uniforms.iter().find(|u| u.name == uniform.name) {
                Some(existing) if existing.ty != uniform.ty => {
                    return Err(ViewerError::ShaderLink(format!(
                        "uniform '{}' declared with different types",
                        uniform.name
                    )));
                }
                Some(_) => {}
                None => uniforms.push(uniform.clone()),
            }
        }

        let shading = Self::shading_model(&uniforms, vs);
        debug!("Linked program: {} uniforms, {:?}", uniforms.len(), shading);

        let id = ProgramId(self.allocate_id());
        self.programs.insert(
            id,
            LinkedProgram {
                values: vec![None; uniforms.len()],
                uniforms,
                shading,
            },
        );
        Ok(id)
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.current_program = program;
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        self.programs
            .get(&program)?
            .uniforms
            .iter()
            .position(|u| u.name == name)
            .map(|i| UniformLocation(i as u32))
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) -> Result<()> {
        let program = self
            .current_program
            .and_then(|id| self.programs.get_mut(&id))
            .ok_or_else(|| ViewerError::DrawState("no program in use".into()))?;
        let index = location.0 as usize;
        let decl = program.uniforms.get(index).ok_or_else(|| {
            ViewerError::DrawState(format!("uniform location {} out of range", index))
        })?;

        let compatible = matches!(
            (decl.ty, &value),
            (GlslType::Int | GlslType::Sampler2D, UniformValue::Int(_))
                | (GlslType::Float, UniformValue::Float(_))
                | (GlslType::Vec3, UniformValue::Vec3(_))
                | (GlslType::Vec4, UniformValue::Vec4(_))
                | (GlslType::Mat4, UniformValue::Mat4(_))
        );
        if !compatible {
            return Err(ViewerError::DrawState(format!(
                "value {:?} does not fit uniform '{}' of type {:?}",
                value, decl.name, decl.ty
            )));
        }

        program.values[index] = Some(value);
        Ok(())
    }

    fn create_buffer(&mut self, data: BufferData<'_>) -> Result<BufferId> {
        let id = BufferId(self.allocate_id());
        self.buffers.insert(id, BufferStorage::from_data(data));
        Ok(id)
    }

    fn update_buffer(&mut self, buffer: BufferId, data: BufferData<'_>) -> Result<()> {
        match self.buffers.get_mut(&buffer) {
            Some(storage) => {
                *storage = BufferStorage::from_data(data);
                Ok(())
            }
            None => Err(ViewerError::BufferUpload(format!(
                "unknown buffer {:?}",
                buffer
            ))),
        }
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
    }

    fn create_vertex_array(&mut self) -> Result<VertexArrayId> {
        let id = VertexArrayId(self.allocate_id());
        self.vertex_arrays.insert(id, VertexArrayState::default());
        Ok(id)
    }

    fn configure_vertex_array(
        &mut self,
        vao: VertexArrayId,
        vertices: BufferId,
        indices: Option<BufferId>,
        layout: &VertexLayout,
    ) -> Result<()> {
        let vertex_len = match self.buffers.get(&vertices) {
            Some(BufferStorage::Vertices(data)) => data.len(),
            _ => {
                return Err(ViewerError::BufferUpload(format!(
                    "{:?} is not a vertex buffer",
                    vertices
                )));
            }
        };
        if let Some(ebo) = indices
            && !matches!(self.buffers.get(&ebo), Some(BufferStorage::Indices(_)))
        {
            return Err(ViewerError::BufferUpload(format!(
                "{:?} is not an index buffer",
                ebo
            )));
        }

        let fits = layout.stride > 0
            && layout
                .attributes
                .iter()
                .all(|a| a.components > 0 && a.offset + a.components <= layout.stride);
        if !fits || vertex_len % layout.stride != 0 {
            return Err(ViewerError::BufferUpload(format!(
                "layout with stride {} does not match a buffer of {} floats",
                layout.stride, vertex_len
            )));
        }

        let state = self.vertex_arrays.get_mut(&vao).ok_or_else(|| {
            ViewerError::BufferUpload(format!("unknown vertex array {:?}", vao))
        })?;
        state.vertices = Some(vertices);
        state.indices = indices;
        state.layout = layout.clone();
        Ok(())
    }

    fn bind_vertex_array(&mut self, vao: Option<VertexArrayId>) {
        self.current_vao = vao;
    }

    fn delete_vertex_array(&mut self, vao: VertexArrayId) {
        self.vertex_arrays.remove(&vao);
        if self.current_vao == Some(vao) {
            self.current_vao = None;
        }
    }

    fn create_texture(&mut self, image: &ImageData) -> Result<TextureId> {
        let expected = image.width as usize * image.height as usize * image.channels as usize;
        if image.width == 0
            || image.height == 0
            || !matches!(image.channels, 1 | 3 | 4)
            || image.pixels.len() != expected
        {
            return Err(ViewerError::TextureUpload(format!(
                "malformed {}x{} image with {} channels",
                image.width, image.height, image.channels
            )));
        }

        let id = TextureId(self.allocate_id());
        self.textures.insert(id, SoftwareTexture::from_image(image));
        self.texture_uploads += 1;
        Ok(id)
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        match texture {
            Some(id) => self.texture_units.insert(unit, id),
            None => self.texture_units.remove(&unit),
        };
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
        self.texture_units.retain(|_, bound| *bound != texture);
    }

    fn set_line_width(&mut self, width: f32) {
        self.rasterizer.line_width = width.max(1.0);
    }

    fn draw_arrays(&mut self, topology: Topology, first: usize, count: usize) -> Result<()> {
        let indices: Vec<u32> = (first as u32..(first + count) as u32).collect();
        self.draw_indexed(topology, &indices)
    }

    fn draw_elements(&mut self, topology: Topology, count: usize) -> Result<()> {
        let vao = self
            .current_vao
            .and_then(|id| self.vertex_arrays.get(&id))
            .ok_or_else(|| ViewerError::DrawState("no vertex array bound".into()))?;
        let indices = match vao.indices.and_then(|id| self.buffers.get(&id)) {
            Some(BufferStorage::Indices(indices)) if count <= indices.len() => {
                indices[..count].to_vec()
            }
            Some(BufferStorage::Indices(indices)) => {
                return Err(ViewerError::DrawState(format!(
                    "{} indices requested, {} available",
                    count,
                    indices.len()
                )));
            }
            _ => {
                return Err(ViewerError::DrawState(
                    "indexed draw without an index buffer".into(),
                ));
            }
        };
        self.draw_indexed(topology, &indices)
    }

    fn set_viewport(&mut self, width: usize, height: usize) {
        let (width, height) = (width.max(1), height.max(1));
        if (width, height) != self.viewport() {
            let samples = self.framebuffer.sample_count;
            self.framebuffer = FrameBuffer::new(width, height, samples);
        }
    }

    fn viewport(&self) -> (usize, usize) {
        (self.framebuffer.width, self.framebuffer.height)
    }

    fn clear(&mut self, color: Vector3<f32>) {
        self.framebuffer.clear(color);
    }

    fn read_frame(&self) -> Vec<u32> {
        let mut buffer = vec![0u32; self.framebuffer.width * self.framebuffer.height];
        resolve_to_buffer(&self.framebuffer, &mut buffer);
        buffer
    }

    fn stats(&self) -> DeviceStats {
        DeviceStats {
            live_shaders: self.shaders.len(),
            live_programs: self.programs.len(),
            live_buffers: self.buffers.len(),
            live_vertex_arrays: self.vertex_arrays.len(),
            live_textures: self.textures.len(),
            texture_uploads: self.texture_uploads,
            draw_calls: self.draw_calls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::framebuffer::pack_rgb;

    const FLAT_VS: &str = "#version 330 core
layout (location = 0) in vec3 aPos;
uniform mat4 model;
uniform mat4 view;
uniform mat4 projection;
void main() { gl_Position = projection * view * model * vec4(aPos, 1.0); }
";
    const FLAT_FS: &str = "#version 330 core
out vec4 FragColor;
uniform vec3 color;
void main() { FragColor = vec4(color, 1.0); }
";

    fn flat_program(device: &mut SoftwareDevice) -> ProgramId {
        let vs = device.compile_shader(ShaderStage::Vertex, FLAT_VS).unwrap();
        let fs = device.compile_shader(ShaderStage::Fragment, FLAT_FS).unwrap();
        device.link_program(vs, fs).unwrap()
    }

    #[test]
    fn uniform_lookup_follows_declarations() {
        let mut device = SoftwareDevice::new(4, 4, 1);
        let program = flat_program(&mut device);
        assert!(device.uniform_location(program, "projection").is_some());
        assert!(device.uniform_location(program, "color").is_some());
        assert!(device.uniform_location(program, "texture1").is_none());
    }

    #[test]
    fn set_uniform_checks_types() {
        let mut device = SoftwareDevice::new(4, 4, 1);
        let program = flat_program(&mut device);
        let color = device.uniform_location(program, "color").unwrap();

        assert!(device.set_uniform(color, UniformValue::Float(1.0)).is_err());
        device.use_program(Some(program));
        assert!(device.set_uniform(color, UniformValue::Float(1.0)).is_err());
        assert!(
            device
                .set_uniform(color, UniformValue::Vec3(Vector3::new(1.0, 0.0, 0.0)))
                .is_ok()
        );
    }

    #[test]
    fn link_rejects_unwritten_varyings() {
        let mut device = SoftwareDevice::new(4, 4, 1);
        let vs = device.compile_shader(ShaderStage::Vertex, FLAT_VS).unwrap();
        let fs = device
            .compile_shader(
                ShaderStage::Fragment,
                "#version 330 core\nin vec2 uv;\nout vec4 c;\nvoid main() { c = vec4(uv, 0.0, 1.0); }\n",
            )
            .unwrap();
        assert!(matches!(
            device.link_program(vs, fs),
            Err(ViewerError::ShaderLink(_))
        ));
        assert!(matches!(
            device.link_program(vs, vs),
            Err(ViewerError::ShaderLink(_))
        ));
    }

    #[test]
    fn draws_flat_triangle_with_uniform_color() {
        let mut device = SoftwareDevice::new(8, 8, 1);
        let program = flat_program(&mut device);
        device.use_program(Some(program));
        let color = device.uniform_location(program, "color").unwrap();
        device
            .set_uniform(color, UniformValue::Vec3(Vector3::new(0.0, 1.0, 0.0)))
            .unwrap();

        let vbo = device
            .create_buffer(BufferData::Vertices(&[
                -1.0, -1.0, 0.0, 3.0, -1.0, 0.0, -1.0, 3.0, 0.0,
            ]))
            .unwrap();
        let vao = device.create_vertex_array().unwrap();
        device
            .configure_vertex_array(vao, vbo, None, &VertexLayout::packed(&[3]))
            .unwrap();
        device.bind_vertex_array(Some(vao));

        device.clear(Vector3::zeros());
        device.draw_arrays(Topology::Triangles, 0, 3).unwrap();

        let frame = device.read_frame();
        assert_eq!(frame[4 * 8 + 4], pack_rgb(Vector3::new(0.0, 1.0, 0.0)));
        assert_eq!(device.stats().draw_calls, 1);
    }

    #[test]
    fn draw_without_state_is_rejected() {
        let mut device = SoftwareDevice::new(4, 4, 1);
        assert!(matches!(
            device.draw_arrays(Topology::Lines, 0, 2),
            Err(ViewerError::DrawState(_))
        ));
    }

    #[test]
    fn out_of_range_index_is_a_draw_error() {
        let mut device = SoftwareDevice::new(4, 4, 1);
        let program = flat_program(&mut device);
        device.use_program(Some(program));
        let vbo = device
            .create_buffer(BufferData::Vertices(&[0.0; 6]))
            .unwrap();
        let ebo = device.create_buffer(BufferData::Indices(&[0, 1, 7])).unwrap();
        let vao = device.create_vertex_array().unwrap();
        device
            .configure_vertex_array(vao, vbo, Some(ebo), &VertexLayout::packed(&[3]))
            .unwrap();
        device.bind_vertex_array(Some(vao));

        assert!(device.draw_elements(Topology::Triangles, 3).is_err());
        assert!(device.draw_elements(Topology::Triangles, 4).is_err());
    }

    #[test]
    fn resizing_keeps_sample_count() {
        let mut device = SoftwareDevice::new(4, 4, 2);
        device.set_viewport(10, 6);
        assert_eq!(device.viewport(), (10, 6));
        assert_eq!(device.read_frame().len(), 60);
        device.set_viewport(0, 0);
        assert_eq!(device.viewport(), (1, 1));
    }
}

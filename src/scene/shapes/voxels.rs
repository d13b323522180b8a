use crate::error::Result;
use crate::gpu::device::{GpuContext, Topology, VertexLayout};
use crate::pipeline::shaders;
use crate::scene::camera::OrbitCamera;
use crate::scene::drawable::Drawable;
use crate::scene::scene_object::{Geometry, SceneObject};
use log::warn;
use nalgebra::{Matrix4, Point3, Vector3};

/// Triangle corners of a unit cube, as (x, y, z) sign triples.
#[rustfmt::skip]
const VOXEL_CORNERS: [[f32; 3]; 36] = [
    [-1., -1., -1.], [ 1.,  1., -1.], [ 1., -1., -1.],
    [ 1.,  1., -1.], [-1., -1., -1.], [-1.,  1., -1.],
    [-1., -1.,  1.], [ 1., -1.,  1.], [ 1.,  1.,  1.],
    [ 1.,  1.,  1.], [-1.,  1.,  1.], [-1., -1.,  1.],
    [-1.,  1.,  1.], [-1.,  1., -1.], [-1., -1., -1.],
    [-1., -1., -1.], [-1., -1.,  1.], [-1.,  1.,  1.],
    [ 1.,  1.,  1.], [ 1., -1., -1.], [ 1.,  1., -1.],
    [ 1., -1., -1.], [ 1.,  1.,  1.], [ 1., -1.,  1.],
    [-1., -1., -1.], [ 1., -1., -1.], [ 1., -1.,  1.],
    [ 1., -1.,  1.], [-1., -1.,  1.], [-1., -1., -1.],
    [-1.,  1., -1.], [ 1.,  1.,  1.], [ 1.,  1., -1.],
    [ 1.,  1.,  1.], [-1.,  1., -1.], [-1.,  1.,  1.],
];

const FLOATS_PER_VERTEX: usize = 6;

/// A set of equally sized cubes, regenerated on every [`VoxelCloud::update`].
pub struct VoxelCloud {
    object: SceneObject,
    voxel_size: f32,
    max_voxels: usize,
    voxel_count: usize,
    pub color: Vector3<f32>,
}

impl VoxelCloud {
    pub fn new(gpu: &GpuContext, voxel_size: f32, max_voxels: usize) -> Result<Self> {
        let object = SceneObject::build(
            gpu,
            "voxels",
            (shaders::VERTEX_COLOR_VS, shaders::VERTEX_COLOR_FS),
            Topology::Triangles,
            || Self::geometry(&[], voxel_size, Vector3::zeros()),
        )?;

        Ok(Self {
            object,
            voxel_size,
            max_voxels,
            voxel_count: 0,
            color: Vector3::new(0.4, 0.6, 0.9),
        })
    }

    pub fn voxel_count(&self) -> usize {
        self.voxel_count
    }

    pub fn max_voxels(&self) -> usize {
        self.max_voxels
    }

    /// Replaces the cloud with cubes centred on `centres`. Anything past
    /// `max_voxels` is dropped with a warning.
    pub fn update(&mut self, centres: &[Point3<f32>]) -> Result<()> {
        let kept = if centres.len() > self.max_voxels {
            warn!(
                "Voxel cloud limited to {} voxels, dropping {}",
                self.max_voxels,
                centres.len() - self.max_voxels
            );
            &centres[..self.max_voxels]
        } else {
            centres
        };

        let geometry = Self::geometry(kept, self.voxel_size, self.color);
        self.object.update_geometry(&geometry)?;
        self.voxel_count = kept.len();
        Ok(())
    }

    pub fn geometry(centres: &[Point3<f32>], voxel_size: f32, color: Vector3<f32>) -> Geometry {
        let half = voxel_size / 2.0;
        let mut vertices = Vec::with_capacity(centres.len() * 36 * FLOATS_PER_VERTEX);
        for centre in centres {
            for corner in &VOXEL_CORNERS {
                vertices.extend_from_slice(&[
                    centre.x + corner[0] * half,
                    centre.y + corner[1] * half,
                    centre.z + corner[2] * half,
                ]);
                vertices.extend_from_slice(color.as_slice());
            }
        }
        Geometry {
            vertices,
            indices: None,
            layout: VertexLayout::packed(&[3, 3]),
        }
    }
}

impl Drawable for VoxelCloud {
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
        if self.voxel_count == 0 {
            return Ok(());
        }
        self.object.draw_with(camera, |_| Ok(()))
    }
}

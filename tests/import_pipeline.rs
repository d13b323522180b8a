use nalgebra::{Point3, Vector2};
use orbitview::error::{ErrorClass, Result, ViewerError};
use orbitview::gpu::device::{Device, GpuContext};
use orbitview::gpu::software::SoftwareDevice;
use orbitview::io::image::{ImageData, ImageLoader};
use orbitview::scene::camera::OrbitCamera;
use orbitview::scene::drawable::Drawable;
use orbitview::scene::graph::{MaterialData, MeshData, SceneGraph, SceneNode};
use orbitview::scene::importer::MeshImportPipeline;
use orbitview::scene::texture::TextureKind;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Default)]
struct CountingLoader {
    calls: Vec<PathBuf>,
}

impl ImageLoader for CountingLoader {
    fn load(&mut self, path: &Path) -> Result<ImageData> {
        self.calls.push(path.to_path_buf());
        Ok(ImageData::solid(4, 4, [255, 0, 0]))
    }
}

fn device() -> (GpuContext, Rc<RefCell<SoftwareDevice>>) {
    let device = Rc::new(RefCell::new(SoftwareDevice::new(32, 24, 1)));
    let gpu: GpuContext = device.clone();
    (gpu, device)
}

fn triangle(name: &str) -> MeshData {
    MeshData {
        name: name.into(),
        positions: vec![
            Point3::new(-0.5, 0.0, 0.0),
            Point3::new(0.5, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ],
        texcoords: vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(0.5, 1.0),
        ],
        faces: vec![[0, 1, 2]],
        material_index: Some(0),
        ..Default::default()
    }
}

fn leaf(name: &str, mesh: usize) -> SceneNode {
    SceneNode {
        name: name.into(),
        mesh_indices: vec![mesh],
        children: Vec::new(),
    }
}

fn shared_texture_graph() -> SceneGraph {
    let mut graph = SceneGraph::with_root("root");
    graph.materials = vec![MaterialData {
        name: "brick".into(),
        textures: vec![(TextureKind::Diffuse, PathBuf::from("brick.png"))],
    }];
    graph.meshes = vec![triangle("left"), triangle("right")];
    graph.add_child(graph.root, leaf("left", 0));
    graph.add_child(graph.root, leaf("right", 1));
    graph
}

#[test]
fn siblings_sharing_a_texture_upload_it_once() {
    let (gpu, device) = device();
    let mut pipeline = MeshImportPipeline::new(&gpu, CountingLoader::default());

    let model = pipeline.import("bricks", &shared_texture_graph()).unwrap();

    assert_eq!(pipeline.loader().calls, [PathBuf::from("brick.png")]);
    assert_eq!(device.borrow().stats().texture_uploads, 1);
    assert_eq!(pipeline.cache().len(), 1);

    let ids: Vec<_> = model
        .meshes
        .iter()
        .map(|m| m.textures[0].id().unwrap())
        .collect();
    assert_eq!(ids[0], ids[1]);
}

#[test]
fn second_import_reuses_cached_textures() {
    let (gpu, device) = device();
    let mut pipeline = MeshImportPipeline::new(&gpu, CountingLoader::default());

    let _first = pipeline.import("a", &shared_texture_graph()).unwrap();
    let _second = pipeline.import("b", &shared_texture_graph()).unwrap();

    assert_eq!(pipeline.loader().calls.len(), 1);
    assert_eq!(device.borrow().stats().texture_uploads, 1);
}

#[test]
fn dangling_mesh_index_fails_before_any_allocation() {
    let (gpu, device) = device();
    let mut graph = shared_texture_graph();
    graph.meshes.push(triangle("third"));
    graph.add_child(graph.root, leaf("broken", 5));

    let mut pipeline = MeshImportPipeline::new(&gpu, CountingLoader::default());
    let err = pipeline.import("broken", &graph).unwrap_err();

    assert!(matches!(err, ViewerError::SceneGraph(_)));
    assert_eq!(err.class(), ErrorClass::SceneGraph);
    assert!(pipeline.loader().calls.is_empty());

    let stats = device.borrow().stats();
    assert_eq!(stats.live_buffers, 0);
    assert_eq!(stats.live_programs, 0);
    assert_eq!(stats.live_textures, 0);
}

#[test]
fn dropping_model_and_cache_releases_everything() {
    let (gpu, device) = device();
    let mut pipeline = MeshImportPipeline::new(&gpu, CountingLoader::default());
    let model = pipeline.import("bricks", &shared_texture_graph()).unwrap();

    let stats = device.borrow().stats();
    assert_eq!(stats.live_programs, 1);
    assert_eq!(stats.live_vertex_arrays, 2);
    assert_eq!(stats.live_textures, 1);

    drop(model);
    drop(pipeline);

    let stats = device.borrow().stats();
    assert_eq!(stats.live_programs, 0);
    assert_eq!(stats.live_buffers, 0);
    assert_eq!(stats.live_vertex_arrays, 0);
    assert_eq!(stats.live_textures, 0);
}

#[test]
fn imported_model_draws_each_mesh() {
    let (gpu, device) = device();
    let mut pipeline = MeshImportPipeline::new(&gpu, CountingLoader::default());
    let mut model = pipeline.import("bricks", &shared_texture_graph()).unwrap();
    model.normalize(nalgebra::Matrix4::identity());

    let mut camera = OrbitCamera::default();
    camera.set_viewport(32, 24);
    model.draw(&camera).unwrap();

    assert_eq!(device.borrow().stats().draw_calls, 2);
}

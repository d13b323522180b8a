use crate::core::geometry::Vertex;
use crate::error::Result;
use crate::gpu::device::GpuContext;
use crate::io::image::ImageLoader;
use crate::io::obj_loader;
use crate::pipeline::program::ShaderProgram;
use crate::pipeline::shaders;
use crate::scene::graph::{MeshData, SceneGraph};
use crate::scene::mesh::Mesh;
use crate::scene::model::ImportedModel;
use crate::scene::texture::{TextureCache, TextureKind, TextureRef};
use crate::scene::utils::{Aabb, compute_tangents};
use log::{debug, info, warn};
use nalgebra::{Vector2, Vector3};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Turns scene graphs into [`ImportedModel`]s.
///
/// The pipeline owns the texture cache: every distinct texture path is
/// loaded and uploaded once across all imports, and meshes only keep weak
/// references. Keep the pipeline (or its cache) alive while the models are
/// drawn.
///
/// A path that fails to load is skipped for the rest of that import and
/// retried by the next one.
pub struct MeshImportPipeline<L: ImageLoader> {
    gpu: GpuContext,
    loader: L,
    cache: TextureCache,
    failed: HashSet<PathBuf>,
}

impl<L: ImageLoader> MeshImportPipeline<L> {
    pub fn new(gpu: &GpuContext, loader: L) -> Self {
        Self {
            gpu: gpu.clone(),
            loader,
            cache: TextureCache::new(),
            failed: HashSet::new(),
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn loader_mut(&mut self) -> &mut L {
        &mut self.loader
    }

    pub fn cache(&self) -> &TextureCache {
        &self.cache
    }

    pub fn into_cache(self) -> TextureCache {
        self.cache
    }

    /// Loads an OBJ file and imports it.
    pub fn import_file(&mut self, path: &Path) -> Result<ImportedModel> {
        let graph = obj_loader::load_scene(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());
        self.import(&name, &graph)
    }

    /// Builds and uploads every mesh of `graph`.
    ///
    /// An invalid graph fails with `SceneGraph` before anything is loaded or
    /// allocated.
    pub fn import(&mut self, name: &str, graph: &SceneGraph) -> Result<ImportedModel> {
        let meshes = self.build_meshes(graph)?;
        let program = ShaderProgram::new(&self.gpu, name, shaders::MODEL_VS, shaders::MODEL_FS)?;

        let bounds = meshes
            .iter()
            .filter_map(|m| Aabb::from_points(m.vertices.iter().map(|v| &v.position)))
            .reduce(|a, b| a.union(&b));

        let vertex_total: usize = meshes.iter().map(|m| m.vertices.len()).sum();
        let gpu_meshes = meshes
            .into_iter()
            .map(|mesh| mesh.upload(&self.gpu))
            .collect::<Result<Vec<_>>>()?;

        info!(
            "Imported '{}': {} meshes, {} vertices, {} cached textures",
            name,
            gpu_meshes.len(),
            vertex_total,
            self.cache.len()
        );

        Ok(ImportedModel::new(name, program, gpu_meshes, bounds))
    }

    /// Depth-first, pre-order walk from the root: a node's meshes come before
    /// its children's, and children keep their input order.
    pub fn build_meshes(&mut self, graph: &SceneGraph) -> Result<Vec<Mesh>> {
        graph.validate()?;
        self.failed.clear();

        let mut meshes = Vec::new();
        let mut stack = vec![graph.root];
        while let Some(index) = stack.pop() {
            let node = &graph.nodes[index];
            for &mesh_index in &node.mesh_indices {
                let mesh = self.build_mesh(graph, &graph.meshes[mesh_index])?;
                meshes.push(mesh);
            }
            stack.extend(node.children.iter().rev());
        }

        debug!("Built {} meshes from {} nodes", meshes.len(), graph.nodes.len());
        Ok(meshes)
    }

    fn build_mesh(&mut self, graph: &SceneGraph, data: &MeshData) -> Result<Mesh> {
        let mut vertices: Vec<Vertex> = data
            .positions
            .iter()
            .enumerate()
            .map(|(i, position)| {
                let mut vertex = Vertex::new(
                    *position,
                    data.normals.get(i).copied().unwrap_or_else(Vector3::y),
                    data.texcoords.get(i).copied().unwrap_or_else(Vector2::zeros),
                );
                if let Some(tangent) = data.tangents.get(i) {
                    vertex.tangent = *tangent;
                }
                if let Some(bitangent) = data.bitangents.get(i) {
                    vertex.bitangent = *bitangent;
                }
                vertex
            })
            .collect();

        let indices: Vec<u32> = data.faces.iter().flatten().copied().collect();

        if data.tangents.is_empty() && !data.texcoords.is_empty() {
            compute_tangents(&mut vertices, &indices);
        }

        let textures = match data.material_index {
            Some(material) => self.resolve_textures(graph, material)?,
            None => Vec::new(),
        };

        Ok(Mesh::new(&data.name, vertices, indices, textures))
    }

    /// Looks up each texture kind in the material's slots. Missing images
    /// leave the slot empty; a failed GPU upload is fatal.
    fn resolve_textures(&mut self, graph: &SceneGraph, material: usize) -> Result<Vec<TextureRef>> {
        let material = &graph.materials[material];
        let mut textures = Vec::new();

        for kind in TextureKind::ALL {
            for path in material.textures_of(kind) {
                let full_path = graph.directory.join(path);
                if self.failed.contains(&full_path) {
                    continue;
                }
                match self
                    .cache
                    .get_or_load(&self.gpu, &mut self.loader, &full_path, kind)
                {
                    Ok(texture) => textures.push(texture),
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        warn!(
                            "Material '{}': {} texture skipped: {}",
                            material.name, kind, e
                        );
                        self.failed.insert(full_path);
                    }
                }
            }
        }
        Ok(textures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ViewerError;
    use crate::gpu::software::SoftwareDevice;
    use crate::io::image::ImageData;
    use crate::scene::graph::{MaterialData, SceneNode};
    use nalgebra::Point3;
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::rc::Rc;

    /// Serves solid images, except for paths listed as missing.
    #[derive(Default)]
    struct FakeLoader {
        requested: Vec<PathBuf>,
        missing: HashSet<PathBuf>,
    }

    impl ImageLoader for FakeLoader {
        fn load(&mut self, path: &Path) -> Result<ImageData> {
            self.requested.push(path.to_path_buf());
            if self.missing.contains(path) {
                return Err(ViewerError::ImageLoad {
                    path: path.display().to_string(),
                    reason: "no such file".into(),
                });
            }
            Ok(ImageData::solid(2, 2, [200, 100, 50]))
        }
    }

    fn gpu() -> GpuContext {
        Rc::new(RefCell::new(SoftwareDevice::new(8, 8, 1)))
    }

    fn quad(name: &str, material: Option<usize>) -> MeshData {
        MeshData {
            name: name.into(),
            positions: vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            texcoords: vec![
                Vector2::new(0.0, 0.0),
                Vector2::new(1.0, 0.0),
                Vector2::new(1.0, 1.0),
                Vector2::new(0.0, 1.0),
            ],
            faces: vec![[0, 1, 2], [0, 2, 3]],
            material_index: material,
            ..Default::default()
        }
    }

    fn node(name: &str, meshes: Vec<usize>) -> SceneNode {
        SceneNode {
            name: name.into(),
            mesh_indices: meshes,
            children: vec![],
        }
    }

    #[test]
    fn traversal_is_preorder_and_keeps_child_order() {
        let mut graph = SceneGraph::with_root("root");
        graph.meshes = vec![quad("a", None), quad("b", None), quad("c", None), quad("d", None)];
        graph.nodes[0].mesh_indices = vec![3];
        let first = graph.add_child(0, node("first", vec![0]));
        graph.add_child(first, node("grandchild", vec![2]));
        graph.add_child(0, node("second", vec![1]));

        let mut pipeline = MeshImportPipeline::new(&gpu(), FakeLoader::default());
        let names: Vec<_> = pipeline
            .build_meshes(&graph)
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, ["d", "a", "c", "b"]);
    }

    #[test]
    fn faces_are_flattened_and_tangents_generated() {
        let mut graph = SceneGraph::with_root("root");
        graph.meshes = vec![quad("q", None)];
        graph.nodes[0].mesh_indices = vec![0];

        let mut pipeline = MeshImportPipeline::new(&gpu(), FakeLoader::default());
        let meshes = pipeline.build_meshes(&graph).unwrap();
        assert_eq!(meshes[0].indices, [0, 1, 2, 0, 2, 3]);
        for v in &meshes[0].vertices {
            assert!((v.tangent - Vector3::x()).norm() < 1e-5);
            // Missing normals default to +Y.
            assert_eq!(v.normal, Vector3::y());
        }
    }

    #[test]
    fn textures_resolve_relative_to_graph_directory() {
        let mut graph = SceneGraph::with_root("root");
        graph.directory = PathBuf::from("assets/crate");
        graph.materials = vec![MaterialData {
            name: "wood".into(),
            textures: vec![
                (TextureKind::Normal, "wood_n.png".into()),
                (TextureKind::Diffuse, "wood.png".into()),
            ],
        }];
        graph.meshes = vec![quad("q", Some(0))];
        graph.nodes[0].mesh_indices = vec![0];

        let mut pipeline = MeshImportPipeline::new(&gpu(), FakeLoader::default());
        let meshes = pipeline.build_meshes(&graph).unwrap();

        // Diffuse is resolved first regardless of slot order.
        let kinds: Vec<_> = meshes[0].textures.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, [TextureKind::Diffuse, TextureKind::Normal]);
        assert_eq!(
            pipeline.loader().requested,
            [
                PathBuf::from("assets/crate/wood.png"),
                PathBuf::from("assets/crate/wood_n.png")
            ]
        );
    }

    #[test]
    fn missing_texture_leaves_slot_empty() {
        let mut graph = SceneGraph::with_root("root");
        graph.materials = vec![MaterialData {
            name: "m".into(),
            textures: vec![
                (TextureKind::Diffuse, "gone.png".into()),
                (TextureKind::Specular, "spec.png".into()),
            ],
        }];
        graph.meshes = vec![quad("q", Some(0))];
        graph.nodes[0].mesh_indices = vec![0];

        let mut loader = FakeLoader::default();
        loader.missing.insert(PathBuf::from("gone.png"));
        let gpu = gpu();
        let mut pipeline = MeshImportPipeline::new(&gpu, loader);

        let model = pipeline.import("model", &graph).unwrap();
        assert_eq!(model.meshes.len(), 1);
        assert_eq!(model.meshes[0].textures.len(), 1);
        assert_eq!(model.meshes[0].textures[0].kind, TextureKind::Specular);
        assert!(!pipeline.cache().contains(Path::new("gone.png")));
    }

    #[test]
    fn missing_texture_is_loaded_once_per_import() {
        let mut graph = SceneGraph::with_root("root");
        graph.materials = vec![MaterialData {
            name: "m".into(),
            textures: vec![(TextureKind::Diffuse, "gone.png".into())],
        }];
        graph.meshes = (0..5).map(|i| quad(&format!("q{}", i), Some(0))).collect();
        for i in 0..5 {
            graph.add_child(0, node(&format!("n{}", i), vec![i]));
        }

        let mut loader = FakeLoader::default();
        loader.missing.insert(PathBuf::from("gone.png"));
        let mut pipeline = MeshImportPipeline::new(&gpu(), loader);

        let meshes = pipeline.build_meshes(&graph).unwrap();
        assert_eq!(meshes.len(), 5);
        assert!(meshes.iter().all(|m| m.textures.is_empty()));
        assert_eq!(pipeline.loader().requested.len(), 1);

        // The next import tries again.
        pipeline.build_meshes(&graph).unwrap();
        assert_eq!(pipeline.loader().requested.len(), 2);
    }

    #[test]
    fn bounds_cover_all_meshes() {
        let mut graph = SceneGraph::with_root("root");
        let mut far = quad("far", None);
        for p in &mut far.positions {
            p.z = -4.0;
        }
        graph.meshes = vec![quad("near", None), far];
        graph.nodes[0].mesh_indices = vec![0, 1];

        let mut pipeline = MeshImportPipeline::new(&gpu(), FakeLoader::default());
        let model = pipeline.import("two", &graph).unwrap();
        let bounds = model.bounds.unwrap();
        assert_eq!(bounds.min, Point3::new(0.0, 0.0, -4.0));
        assert_eq!(bounds.max, Point3::new(1.0, 1.0, 0.0));
    }
}

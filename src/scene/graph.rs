//! Arena representation of an externally parsed scene.
//!
//! Nodes, meshes and materials live in flat vectors and refer to each other
//! by index. Nothing is dereferenced before [`SceneGraph::validate`] has
//! checked every index.

use crate::error::{Result, ViewerError};
use crate::scene::texture::TextureKind;
use nalgebra::{Point3, Vector2, Vector3};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub mesh_indices: Vec<usize>,
    /// Child node indices, in the order they are visited.
    pub children: Vec<usize>,
}

/// Raw mesh data as delivered by the parser.
///
/// `normals`, `texcoords`, `tangents` and `bitangents` are either empty or
/// have one entry per position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub name: String,
    pub positions: Vec<Point3<f32>>,
    pub normals: Vec<Vector3<f32>>,
    pub texcoords: Vec<Vector2<f32>>,
    pub tangents: Vec<Vector3<f32>>,
    pub bitangents: Vec<Vector3<f32>>,
    pub faces: Vec<[u32; 3]>,
    pub material_index: Option<usize>,
}

/// Texture slots of one material, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialData {
    pub name: String,
    pub textures: Vec<(TextureKind, PathBuf)>,
}

impl MaterialData {
    pub fn textures_of(&self, kind: TextureKind) -> impl Iterator<Item = &PathBuf> {
        self.textures
            .iter()
            .filter(move |(k, _)| *k == kind)
            .map(|(_, path)| path)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneGraph {
    pub nodes: Vec<SceneNode>,
    pub meshes: Vec<MeshData>,
    pub materials: Vec<MaterialData>,
    pub root: usize,
    /// Base directory for relative texture paths.
    pub directory: PathBuf,
}

impl SceneGraph {
    /// A graph with a single root node and no content.
    pub fn with_root(name: &str) -> Self {
        Self {
            nodes: vec![SceneNode {
                name: name.to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    /// Adds `node` as the last child of `parent` and returns its index.
    pub fn add_child(&mut self, parent: usize, node: SceneNode) -> usize {
        let index = self.nodes.len();
        self.nodes.push(node);
        if let Some(parent) = self.nodes.get_mut(parent) {
            parent.children.push(index);
        }
        index
    }

    /// Checks every cross reference reachable from the root.
    ///
    /// Fails on dangling mesh, child, material or vertex indices, on attribute
    /// arrays whose length does not match the positions, and on nodes that are
    /// reachable more than once (cycles or shared subtrees).
    pub fn validate(&self) -> Result<()> {
        if self.root >= self.nodes.len() {
            return Err(ViewerError::SceneGraph(format!(
                "root node {} out of range ({} nodes)",
                self.root,
                self.nodes.len()
            )));
        }

        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![self.root];
        while let Some(index) = stack.pop() {
            if std::mem::replace(&mut visited[index], true) {
                return Err(ViewerError::SceneGraph(format!(
                    "node {} is reachable more than once",
                    index
                )));
            }

            let node = &self.nodes[index];
            for &mesh in &node.mesh_indices {
                if mesh >= self.meshes.len() {
                    return Err(ViewerError::SceneGraph(format!(
                        "node '{}' references mesh {} but only {} exist",
                        node.name,
                        mesh,
                        self.meshes.len()
                    )));
                }
            }
            for &child in &node.children {
                if child >= self.nodes.len() {
                    return Err(ViewerError::SceneGraph(format!(
                        "node '{}' references child {} but only {} nodes exist",
                        node.name,
                        child,
                        self.nodes.len()
                    )));
                }
                stack.push(child);
            }
        }

        for (index, mesh) in self.meshes.iter().enumerate() {
            self.validate_mesh(index, mesh)?;
        }
        Ok(())
    }

    fn validate_mesh(&self, index: usize, mesh: &MeshData) -> Result<()> {
        let fail = |what: String| {
            ViewerError::SceneGraph(format!("mesh {} ('{}'): {}", index, mesh.name, what))
        };

        if let Some(material) = mesh.material_index
            && material >= self.materials.len()
        {
            return Err(fail(format!(
                "material {} out of range ({} materials)",
                material,
                self.materials.len()
            )));
        }

        let count = mesh.positions.len();
        let attributes = [
            ("normals", mesh.normals.len()),
            ("texcoords", mesh.texcoords.len()),
            ("tangents", mesh.tangents.len()),
            ("bitangents", mesh.bitangents.len()),
        ];
        for (name, len) in attributes {
            if len != 0 && len != count {
                return Err(fail(format!("{} {} for {} positions", len, name, count)));
            }
        }

        if let Some(face) = mesh
            .faces
            .iter()
            .find(|face| face.iter().any(|&i| i as usize >= count))
        {
            return Err(fail(format!(
                "face {:?} indexes past {} vertices",
                face, count
            )));
        }
        Ok(())
    }
}

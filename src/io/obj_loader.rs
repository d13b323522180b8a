use crate::error::{Result, ViewerError};
use crate::scene::graph::{MaterialData, MeshData, SceneGraph, SceneNode};
use crate::scene::texture::TextureKind;
use log::{info, warn};
use nalgebra::{Point3, Vector2, Vector3};
use std::path::{Path, PathBuf};

/// Loads an OBJ file (and its MTL library, if any) into a scene graph.
///
/// The root node is named after the file and gets one child per OBJ object.
/// Texture paths stay relative; `SceneGraph::directory` is set to the OBJ's
/// directory so they resolve next to the model.
pub fn load_scene(path: &Path) -> Result<SceneGraph> {
    if !path.exists() {
        return Err(ViewerError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("file not found: {}", path.display()),
        )));
    }

    info!("Loading OBJ file: {:?}", path);

    let load_options = tobj::LoadOptions {
        triangulate: true,
        single_index: true, // Important: Unifies indices for Position/Normal/UV
        ..Default::default()
    };

    let (models, materials) = tobj::load_obj(path, &load_options)
        .map_err(|e| ViewerError::SceneGraph(format!("failed to parse {:?}: {}", path, e)))?;

    // A broken or missing MTL file only costs us the textures.
    let materials = materials.unwrap_or_else(|e| {
        warn!("Failed to load materials for {:?}: {}", path, e);
        Vec::new()
    });

    let root_name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut graph = SceneGraph::with_root(&root_name);
    graph.directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
    graph.materials = materials.iter().map(convert_material).collect();

    for model in &models {
        let mesh_index = graph.meshes.len();
        graph.meshes.push(convert_mesh(model));
        graph.add_child(
            graph.root,
            SceneNode {
                name: model.name.clone(),
                mesh_indices: vec![mesh_index],
                children: Vec::new(),
            },
        );
    }

    info!(
        "OBJ loaded: {} objects, {} materials",
        graph.meshes.len(),
        graph.materials.len()
    );

    Ok(graph)
}

fn convert_mesh(model: &tobj::Model) -> MeshData {
    let mesh = &model.mesh;

    if mesh.normals.is_empty() {
        warn!(
            "Mesh '{}' is missing normals. Using default (0, 1, 0).",
            model.name
        );
    }

    let positions = mesh
        .positions
        .chunks_exact(3)
        .map(|p| Point3::new(p[0], p[1], p[2]))
        .collect();
    let normals = mesh
        .normals
        .chunks_exact(3)
        .map(|n| Vector3::new(n[0], n[1], n[2]))
        .collect();
    let texcoords = mesh
        .texcoords
        .chunks_exact(2)
        .map(|t| Vector2::new(t[0], t[1]))
        .collect();
    let faces = mesh
        .indices
        .chunks_exact(3)
        .map(|f| [f[0], f[1], f[2]])
        .collect();

    MeshData {
        name: model.name.clone(),
        positions,
        normals,
        texcoords,
        tangents: Vec::new(),
        bitangents: Vec::new(),
        faces,
        material_index: mesh.material_id,
    }
}

fn convert_material(material: &tobj::Material) -> MaterialData {
    let mut textures: Vec<(TextureKind, PathBuf)> = Vec::new();
    let mut push = |kind: TextureKind, path: Option<&String>| {
        if let Some(path) = path.filter(|p| !p.is_empty()) {
            textures.push((kind, PathBuf::from(path)));
        }
    };

    push(TextureKind::Diffuse, material.diffuse_texture.as_ref());
    push(TextureKind::Specular, material.specular_texture.as_ref());
    // tobj reads `bump`/`map_Bump` into the normal slot.
    push(TextureKind::Normal, material.normal_texture.as_ref());
    push(TextureKind::Height, material.unknown_param.get("disp"));

    MaterialData {
        name: material.name.clone(),
        textures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("orbitview-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_scene(Path::new("no/such/model.obj")).unwrap_err();
        assert!(matches!(err, ViewerError::Io(_)));
    }

    #[test]
    fn objects_become_children_with_materials() {
        let dir = temp_dir("obj");
        fs::write(
            dir.join("box.mtl"),
            "newmtl wood\nmap_Kd textures/wood.png\nmap_Ks spec.png\n",
        )
        .unwrap();
        fs::write(
            dir.join("box.obj"),
            "mtllib box.mtl\n\
             o first\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nvt 0 0\nvt 1 0\nvt 1 1\nvt 0 1\n\
             usemtl wood\nf 1/1 2/2 3/3 4/4\n\
             o second\nv 0 0 1\nv 1 0 1\nv 0 1 1\nf 5 6 7\n",
        )
        .unwrap();

        let graph = load_scene(&dir.join("box.obj")).unwrap();
        assert!(graph.validate().is_ok());
        assert_eq!(graph.directory, dir);
        assert_eq!(graph.nodes[graph.root].name, "box");
        assert_eq!(graph.nodes[graph.root].children.len(), 2);

        // The quad is triangulated into two faces.
        assert_eq!(graph.meshes[0].faces.len(), 2);
        assert_eq!(graph.meshes[0].texcoords.len(), graph.meshes[0].positions.len());
        assert_eq!(graph.meshes[1].faces.len(), 1);

        let material = &graph.materials[graph.meshes[0].material_index.unwrap()];
        assert_eq!(
            material.textures,
            [
                (TextureKind::Diffuse, PathBuf::from("textures/wood.png")),
                (TextureKind::Specular, PathBuf::from("spec.png")),
            ]
        );

        fs::remove_dir_all(dir).ok();
    }
}

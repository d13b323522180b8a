pub mod camera;
pub mod drawable;
pub mod graph;
pub mod importer;
pub mod loader;
pub mod mesh;
pub mod model;
pub mod scene_object;
pub mod shapes;
pub mod texture;
pub mod utils;

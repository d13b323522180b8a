pub mod program;
pub mod shaders;

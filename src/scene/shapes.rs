pub mod cube;
pub mod frame;
pub mod frustum;
pub mod grid;
pub mod plane;
pub mod voxels;

pub use cube::Cube;
pub use frame::Frame;
pub use frustum::CameraFrustum;
pub use grid::Grid;
pub use plane::TexturedPlane;
pub use voxels::VoxelCloud;

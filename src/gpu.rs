pub mod device;
pub mod glsl;
pub mod resources;
pub mod shading;
pub mod software;

pub use device::{Device, GpuContext};
pub use software::SoftwareDevice;

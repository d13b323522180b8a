use crate::error::Result;
use crate::gpu::device::UniformValue;
use crate::pipeline::program::ShaderProgram;
use crate::scene::camera::OrbitCamera;
use nalgebra::Matrix4;

/// Anything the viewer can render with a camera.
///
/// A draw activates the object's program, uploads `projection`, `view` and
/// `model`, binds the object's buffers, issues the draw call and unbinds
/// again. A uniform the program does not declare is logged and skipped.
pub trait Drawable {
    fn name(&self) -> &str;

    /// Local-to-world matrix.
    fn transform(&self) -> &Matrix4<f32>;

    fn set_transform(&mut self, transform: Matrix4<f32>);

    fn draw(&self, camera: &OrbitCamera) -> Result<()>;
}

/// Activates `program` and uploads the camera matrices and the model transform.
pub fn upload_camera_uniforms(
    program: &ShaderProgram,
    camera: &OrbitCamera,
    model: &Matrix4<f32>,
) -> Result<()> {
    let projection = camera.projection()?;

    program.activate();
    program.set_or_warn("projection", UniformValue::Mat4(projection))?;
    program.set_or_warn("view", UniformValue::Mat4(camera.view_matrix()))?;
    program.set_or_warn("model", UniformValue::Mat4(*model))?;
    Ok(())
}

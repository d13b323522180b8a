use crate::error::{ErrorClass, Result, ViewerError};
use crate::gpu::device::{GpuContext, ProgramId, ShaderId, ShaderStage, UniformValue};
use log::{info, warn};
use std::cell::RefCell;
use std::collections::HashSet;

/// A compiled stage that is deleted again once it is linked (or linking failed).
struct StageGuard<'a> {
    gpu: &'a GpuContext,
    id: ShaderId,
}

impl<'a> StageGuard<'a> {
    fn compile(gpu: &'a GpuContext, stage: ShaderStage, source: &str) -> Result<Self> {
        let id = gpu.borrow_mut().compile_shader(stage, source)?;
        Ok(Self { gpu, id })
    }
}

impl Drop for StageGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut device) = self.gpu.try_borrow_mut() {
            device.delete_shader(self.id);
        }
    }
}

/// Owns a linked GPU program and sets its uniforms by name.
pub struct ShaderProgram {
    gpu: GpuContext,
    id: ProgramId,
    label: String,
    /// Uniform names already reported missing.
    warned: RefCell<HashSet<String>>,
}

impl ShaderProgram {
    pub fn new(gpu: &GpuContext, label: &str, vertex_src: &str, fragment_src: &str) -> Result<Self> {
        let vs = StageGuard::compile(gpu, ShaderStage::Vertex, vertex_src)?;
        let fs = StageGuard::compile(gpu, ShaderStage::Fragment, fragment_src)?;
        let id = gpu.borrow_mut().link_program(vs.id, fs.id)?;

        info!("Linked shader program '{}'", label);

        Ok(Self {
            gpu: gpu.clone(),
            id,
            label: label.to_string(),
            warned: RefCell::new(HashSet::new()),
        })
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn activate(&self) {
        self.gpu.borrow_mut().use_program(Some(self.id));
    }

    pub fn deactivate(&self) {
        self.gpu.borrow_mut().use_program(None);
    }

    /// Sets a uniform on this program, which must be active.
    pub fn set(&self, name: &str, value: UniformValue) -> Result<()> {
        let mut device = self.gpu.borrow_mut();
        let location = device
            .uniform_location(self.id, name)
            .ok_or_else(|| ViewerError::UniformNotFound {
                program: self.label.clone(),
                name: name.to_string(),
            })?;
        device.set_uniform(location, value)
    }

    /// Like [`ShaderProgram::set`], but a missing uniform is only logged,
    /// once per name. Other failures still propagate.
    pub fn set_or_warn(&self, name: &str, value: UniformValue) -> Result<()> {
        match self.set(name, value) {
            Err(e) if e.class() == ErrorClass::RecoverableRenderWarning => {
                if self.warned.borrow_mut().insert(name.to_string()) {
                    warn!("{}", e);
                }
                Ok(())
            }
            other => other,
        }
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        match self.gpu.try_borrow_mut() {
            Ok(mut device) => device.delete_program(self.id),
            Err(_) => warn!("GPU device busy, leaking program '{}'", self.label),
        }
    }
}

impl std::fmt::Debug for ShaderProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::software::SoftwareDevice;
    use crate::pipeline::shaders;
    use nalgebra::{Matrix4, Vector3};
    use std::rc::Rc;

    fn gpu() -> GpuContext {
        Rc::new(RefCell::new(SoftwareDevice::new(4, 4, 1)))
    }

    #[test]
    fn stages_are_released_after_linking() {
        let gpu = gpu();
        let program =
            ShaderProgram::new(&gpu, "grid", shaders::FLAT_VS, shaders::FLAT_FS).unwrap();
        let stats = gpu.borrow().stats();
        assert_eq!(stats.live_shaders, 0);
        assert_eq!(stats.live_programs, 1);
        drop(program);
        assert_eq!(gpu.borrow().stats().live_programs, 0);
    }

    #[test]
    fn compile_failure_leaves_nothing_behind() {
        let gpu = gpu();
        let err = ShaderProgram::new(&gpu, "broken", shaders::FLAT_VS, "void main() {}")
            .unwrap_err();
        assert!(matches!(
            err,
            ViewerError::ShaderCompile {
                stage: ShaderStage::Fragment,
                ..
            }
        ));
        assert!(err.is_fatal());
        assert_eq!(gpu.borrow().stats().live_shaders, 0);
    }

    #[test]
    fn missing_uniform_is_reported_by_name() {
        let gpu = gpu();
        let program =
            ShaderProgram::new(&gpu, "cube", shaders::VERTEX_COLOR_VS, shaders::VERTEX_COLOR_FS)
                .unwrap();
        program.activate();

        assert!(program.set("model", UniformValue::Mat4(Matrix4::identity())).is_ok());
        let err = program
            .set("color", UniformValue::Vec3(Vector3::zeros()))
            .unwrap_err();
        assert!(matches!(err, ViewerError::UniformNotFound { ref name, .. } if name == "color"));

        // Downgraded to a warning, repeatedly.
        for _ in 0..3 {
            assert!(
                program
                    .set_or_warn("color", UniformValue::Vec3(Vector3::zeros()))
                    .is_ok()
            );
        }
        assert_eq!(program.warned.borrow().len(), 1);
    }

    #[test]
    fn type_mismatch_is_not_downgraded() {
        let gpu = gpu();
        let program =
            ShaderProgram::new(&gpu, "grid", shaders::FLAT_VS, shaders::FLAT_FS).unwrap();
        program.activate();
        assert!(program.set_or_warn("color", UniformValue::Float(1.0)).is_err());
    }
}

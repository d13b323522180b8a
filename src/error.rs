//! Error types shared by every layer of the viewer.

use crate::gpu::device::ShaderStage;
use thiserror::Error;

/// Coarse classification used to decide how an error is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Shader compile/link or GPU allocation failure. The viewer cannot start.
    FatalSetup,
    /// Missing uniform or optional texture slot. Logged, the draw continues.
    RecoverableRenderWarning,
    /// Structurally invalid scene graph. Aborts one import call only.
    SceneGraph,
    /// A precondition was violated by the caller.
    ProgrammingError,
    /// Config, file system or window problems.
    Environment,
}

#[derive(Error, Debug)]
pub enum ViewerError {
    #[error("failed to compile {stage} shader: {log}")]
    ShaderCompile { stage: ShaderStage, log: String },

    #[error("failed to link program: {0}")]
    ShaderLink(String),

    #[error("GPU buffer upload failed: {0}")]
    BufferUpload(String),

    #[error("GPU texture upload failed: {0}")]
    TextureUpload(String),

    #[error("uniform '{name}' not found in program '{program}'")]
    UniformNotFound { program: String, name: String },

    #[error("failed to load image '{path}': {reason}")]
    ImageLoad { path: String, reason: String },

    #[error("invalid scene graph: {0}")]
    SceneGraph(String),

    #[error("invalid viewport: aspect ratio {0} must be positive and finite")]
    InvalidViewport(f32),

    #[error("cannot normalize zero-length vector ({0})")]
    DegenerateVector(&'static str),

    #[error("time step must not be negative (got {0})")]
    NegativeTimeStep(f32),

    #[error("invalid draw state: {0}")]
    DrawState(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("window error: {0}")]
    Window(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ViewerError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ViewerError::ShaderCompile { .. }
            | ViewerError::ShaderLink(_)
            | ViewerError::BufferUpload(_)
            | ViewerError::TextureUpload(_) => ErrorClass::FatalSetup,
            ViewerError::UniformNotFound { .. } | ViewerError::ImageLoad { .. } => {
                ErrorClass::RecoverableRenderWarning
            }
            ViewerError::SceneGraph(_) => ErrorClass::SceneGraph,
            ViewerError::InvalidViewport(_)
            | ViewerError::DegenerateVector(_)
            | ViewerError::NegativeTimeStep(_)
            | ViewerError::DrawState(_) => ErrorClass::ProgrammingError,
            ViewerError::Config(_) | ViewerError::Window(_) | ViewerError::Io(_) => {
                ErrorClass::Environment
            }
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::FatalSetup
    }
}

pub type Result<T> = std::result::Result<T, ViewerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_failures_are_fatal() {
        assert!(ViewerError::ShaderLink("no main".into()).is_fatal());
        assert!(ViewerError::BufferUpload("oom".into()).is_fatal());
        assert!(!ViewerError::SceneGraph("dangling".into()).is_fatal());
    }

    #[test]
    fn classes_follow_taxonomy() {
        let missing = ViewerError::UniformNotFound {
            program: "grid".into(),
            name: "model".into(),
        };
        assert_eq!(missing.class(), ErrorClass::RecoverableRenderWarning);
        assert_eq!(
            ViewerError::InvalidViewport(0.0).class(),
            ErrorClass::ProgrammingError
        );
        assert_eq!(
            ViewerError::DegenerateVector("front").class(),
            ErrorClass::ProgrammingError
        );
        assert_eq!(
            ViewerError::SceneGraph("x".into()).class(),
            ErrorClass::SceneGraph
        );
    }

    #[test]
    fn messages_name_the_missing_uniform() {
        let err = ViewerError::UniformNotFound {
            program: "cube".into(),
            name: "projection".into(),
        };
        assert_eq!(
            err.to_string(),
            "uniform 'projection' not found in program 'cube'"
        );
    }
}

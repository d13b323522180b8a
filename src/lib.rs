//! Interactive 3D scene viewer core: an orbit camera, drawable shapes, a
//! scene-graph import pipeline and the frame loop that ties them together.
//!
//! Rendering goes through the [`gpu::Device`] trait; [`gpu::SoftwareDevice`]
//! implements it on top of a multithreaded software rasterizer.

pub mod app;
pub mod core;
pub mod error;
pub mod gpu;
pub mod io;
pub mod pipeline;
pub mod scene;
pub mod ui;

pub use error::{Result, ViewerError};

use crate::error::Result;
use crate::gpu::device::GpuContext;
use crate::gpu::software::SoftwareDevice;
use crate::io::config::Config;
use crate::io::image::FileImageLoader;
use crate::scene::loader::{build_scene, camera_from_config};
use crate::ui::frontend::Frontend;
use crate::ui::headless::HeadlessFrontend;
use crate::ui::viewer::ViewerLoop;
use crate::ui::window::WindowFrontend;
use log::info;
use nalgebra::Vector3;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::time::Instant;

fn create_device(config: &Config) -> GpuContext {
    let window = &config.window;
    Rc::new(RefCell::new(SoftwareDevice::new(
        window.width,
        window.height,
        window.samples,
    )))
}

fn viewer_for<F: Frontend>(
    gpu: &GpuContext,
    config: &Config,
    frontend: F,
) -> Result<ViewerLoop<F>> {
    let camera = camera_from_config(&config.camera, (config.window.width, config.window.height))?;
    let scene = build_scene(gpu, config, FileImageLoader)?;
    Ok(ViewerLoop::new(gpu, frontend, camera, scene)
        .with_clear_color(Vector3::from(config.window.clear_color)))
}

/// Opens a window and runs the interactive viewer until it is closed.
pub fn run_gui(config: &Config) -> Result<()> {
    info!(
        "Starting GUI mode ({}x{}, {}x SSAA)...",
        config.window.width, config.window.height, config.window.samples
    );

    let gpu = create_device(config);
    let frontend = WindowFrontend::new(&config.window)?;
    let mut viewer = viewer_for(&gpu, config, frontend)?;
    viewer.run()
}

/// Renders `frames` frames without a window and saves the last one.
pub fn run_headless(config: &Config, frames: usize, output: &Path) -> Result<()> {
    info!("Starting headless mode ({} frames)...", frames);
    let start_time = Instant::now();

    let gpu = create_device(config);
    let mut viewer = viewer_for(&gpu, config, HeadlessFrontend::new(frames.max(1)))?;
    viewer.run()?;

    info!("Render completed in {:.2?}", start_time.elapsed());
    viewer.frontend().save(output)?;
    info!("Done.");
    Ok(())
}

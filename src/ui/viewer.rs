use crate::error::Result;
use crate::gpu::device::GpuContext;
use crate::scene::camera::OrbitCamera;
use crate::scene::loader::Scene;
use crate::ui::frontend::Frontend;
use crate::ui::input::{DragAction, InputDragState, InputEvent, Key};
use log::{debug, info, warn};
use nalgebra::Vector3;
use std::time::{Duration, Instant};

const FPS_LOG_INTERVAL: Duration = Duration::from_secs(2);

/// Wall-clock time between frames. The first tick returns 0.
#[derive(Debug, Default)]
pub struct FrameClock {
    last: Option<Instant>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let dt = self
            .last
            .map(|last| (now - last).as_secs_f32())
            .unwrap_or(0.0);
        self.last = Some(now);
        dt
    }
}

#[derive(Debug)]
struct FpsCounter {
    frames: usize,
    since: Instant,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            frames: 0,
            since: Instant::now(),
        }
    }

    fn frame(&mut self) {
        self.frames += 1;
        let elapsed = self.since.elapsed();
        if elapsed >= FPS_LOG_INTERVAL {
            info!(
                "Average FPS: {:.1}",
                self.frames as f32 / elapsed.as_secs_f32()
            );
            self.frames = 0;
            self.since = Instant::now();
        }
    }
}

/// Drives the frame cycle: poll input, update the camera, clear, draw every
/// drawable in registration order, present.
pub struct ViewerLoop<F: Frontend> {
    gpu: GpuContext,
    frontend: F,
    camera: OrbitCamera,
    scene: Scene,
    drag: InputDragState,
    clock: FrameClock,
    fps: FpsCounter,
    clear_color: Vector3<f32>,
    keep_running: bool,
}

impl<F: Frontend> ViewerLoop<F> {
    pub fn new(gpu: &GpuContext, frontend: F, camera: OrbitCamera, scene: Scene) -> Self {
        Self {
            gpu: gpu.clone(),
            frontend,
            camera,
            scene,
            drag: InputDragState::new(),
            clock: FrameClock::new(),
            fps: FpsCounter::new(),
            clear_color: Vector3::new(0.1, 0.1, 0.12),
            keep_running: true,
        }
    }

    pub fn with_clear_color(mut self, color: Vector3<f32>) -> Self {
        self.clear_color = color;
        self
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut OrbitCamera {
        &mut self.camera
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn frontend(&self) -> &F {
        &self.frontend
    }

    pub fn frontend_mut(&mut self) -> &mut F {
        &mut self.frontend
    }

    pub fn drag_state(&self) -> &InputDragState {
        &self.drag
    }

    pub fn is_running(&self) -> bool {
        self.keep_running && self.frontend.is_open()
    }

    pub fn stop(&mut self) {
        self.keep_running = false;
    }

    /// Runs until the frontend closes or a close key is pressed.
    pub fn run(&mut self) -> Result<()> {
        info!(
            "Viewer started with {} drawables. Controls: LMB drag=Rotate, RMB drag=Pan, Scroll=Zoom, WASD/Space/LShift=Move, Esc/Q=Quit",
            self.scene.len()
        );
        while self.is_running() {
            self.run_frame()?;
        }
        info!("Viewer stopped.");
        Ok(())
    }

    /// One iteration of the frame cycle. Returns without drawing when the
    /// input asked the viewer to close.
    pub fn run_frame(&mut self) -> Result<()> {
        let dt = self.clock.tick();

        for event in self.frontend.poll_events() {
            self.handle_event(event)?;
        }
        if !self.keep_running {
            return Ok(());
        }
        self.poll_keyboard(dt)?;

        self.gpu.borrow_mut().clear(self.clear_color);
        for drawable in &self.scene.drawables {
            if let Err(e) = drawable.draw(&self.camera) {
                warn!("Drawable '{}' failed to draw: {}", drawable.name(), e);
            }
        }

        let (width, height) = self.gpu.borrow().viewport();
        let frame = self.gpu.borrow().read_frame();
        self.frontend.present(&frame, width, height)?;
        self.fps.frame();
        Ok(())
    }

    pub fn handle_event(&mut self, event: InputEvent) -> Result<()> {
        match event {
            InputEvent::PointerMove { x, y } => match self.drag.pointer_moved(x, y) {
                Some(DragAction::Rotate { dx, dy }) => self.camera.apply_drag_rotate(dx, dy)?,
                Some(DragAction::Pan { dx, dy }) => self.camera.apply_drag_pan(dx, dy)?,
                None => {}
            },
            InputEvent::Button { button, pressed } => self.drag.button(button, pressed),
            InputEvent::Scroll { dy } => self.camera.apply_scroll_zoom(dy),
            InputEvent::KeyPressed(key) => {
                if key.closes_viewer() {
                    info!("{:?} pressed, closing viewer.", key);
                    self.stop();
                }
            }
            InputEvent::Resize { width, height } => {
                let (width, height) = (width.max(1), height.max(1));
                debug!("Viewport resized to {}x{}", width, height);
                self.gpu.borrow_mut().set_viewport(width, height);
                self.camera.set_viewport(width, height);
            }
            InputEvent::CloseRequested => self.stop(),
        }
        Ok(())
    }

    /// Applies movement for every key held this frame.
    pub fn poll_keyboard(&mut self, dt: f32) -> Result<()> {
        for key in Key::MOVEMENT {
            if self.frontend.is_key_down(key)
                && let Some(direction) = key.direction()
            {
                self.camera.apply_keyboard(direction, dt)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::software::SoftwareDevice;
    use crate::scene::drawable::Drawable;
    use crate::ui::headless::HeadlessFrontend;
    use crate::ui::input::MouseButton;
    use approx::assert_relative_eq;
    use nalgebra::Matrix4;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    struct Probe {
        draws: Rc<Cell<usize>>,
        fail: bool,
        transform: Matrix4<f32>,
    }

    impl Drawable for Probe {
        fn name(&self) -> &str {
            "probe"
        }
        fn transform(&self) -> &Matrix4<f32> {
            &self.transform
        }
        fn set_transform(&mut self, transform: Matrix4<f32>) {
            self.transform = transform;
        }
        fn draw(&self, _camera: &OrbitCamera) -> Result<()> {
            self.draws.set(self.draws.get() + 1);
            if self.fail {
                return Err(crate::error::ViewerError::DrawState("broken".into()));
            }
            Ok(())
        }
    }

    fn viewer(frames: usize) -> ViewerLoop<HeadlessFrontend> {
        let gpu: GpuContext = Rc::new(RefCell::new(SoftwareDevice::new(8, 6, 1)));
        ViewerLoop::new(
            &gpu,
            HeadlessFrontend::new(frames),
            OrbitCamera::default(),
            Scene::new(),
        )
    }

    #[test]
    fn first_tick_is_zero() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.tick(), 0.0);
        assert!(clock.tick() >= 0.0);
    }

    #[test]
    fn runs_requested_number_of_frames() {
        let mut viewer = viewer(3);
        viewer.run().unwrap();
        assert_eq!(viewer.frontend().presented(), 3);
        assert_eq!(viewer.frontend().last_size(), (8, 6));
    }

    #[test]
    fn a_failing_drawable_does_not_stop_the_frame() {
        let draws = Rc::new(Cell::new(0));
        let mut viewer = viewer(1);
        for fail in [true, false] {
            viewer.scene.add(Probe {
                draws: draws.clone(),
                fail,
                transform: Matrix4::identity(),
            });
        }
        viewer.run().unwrap();
        assert_eq!(draws.get(), 2);
        assert_eq!(viewer.frontend().presented(), 1);
    }

    #[test]
    fn escape_stops_before_drawing() {
        let mut viewer = viewer(10);
        viewer
            .frontend_mut()
            .push_frame(vec![InputEvent::KeyPressed(Key::Escape)]);
        viewer.run().unwrap();
        assert_eq!(viewer.frontend().presented(), 0);
        assert!(!viewer.is_running());
    }

    #[test]
    fn scroll_zooms_regardless_of_drag_state() {
        let mut viewer = viewer(1);
        let fov = viewer.camera().field_of_view();
        viewer.handle_event(InputEvent::Scroll { dy: 1.0 }).unwrap();
        assert_relative_eq!(viewer.camera().field_of_view(), fov - 0.1, epsilon = 1e-6);
    }

    #[test]
    fn right_drag_pans_focal_point() {
        let mut viewer = viewer(1);
        let events = [
            InputEvent::Button {
                button: MouseButton::Right,
                pressed: true,
            },
            InputEvent::PointerMove { x: 0.0, y: 0.0 },
            InputEvent::PointerMove { x: 10.0, y: 0.0 },
        ];
        for event in events {
            viewer.handle_event(event).unwrap();
        }
        let camera = viewer.camera();
        let expected = camera.right() * 10.0 * camera.sensitivity;
        assert_relative_eq!(camera.focal_point.coords, expected, epsilon = 1e-5);
    }

    #[test]
    fn resize_updates_device_and_camera() {
        let mut viewer = viewer(1);
        viewer
            .handle_event(InputEvent::Resize {
                width: 32,
                height: 0,
            })
            .unwrap();
        assert_eq!(viewer.camera().viewport(), (32, 1));
        assert_eq!(viewer.gpu.borrow().viewport(), (32, 1));
    }

    #[test]
    fn held_keys_move_the_camera_position() {
        let mut viewer = viewer(1);
        let start = viewer.camera().position;
        viewer.frontend_mut().hold(Key::W);
        viewer.poll_keyboard(0.5).unwrap();
        let camera = viewer.camera();
        let expected = start + camera.front() * camera.movement_speed * 0.5;
        assert_relative_eq!(camera.position, expected, epsilon = 1e-4);
    }
}

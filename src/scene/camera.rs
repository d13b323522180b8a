use crate::core::math::transform::TransformFactory;
use crate::error::{Result, ViewerError};
use nalgebra::{Matrix4, Point3, Vector3};
use std::f32::consts::{FRAC_PI_2, PI, TAU};

/// Keeps `front.y` away from ±1 so `cross(front, world_up)` never vanishes.
pub const PITCH_EPSILON: f32 = 1e-5;
pub const PITCH_MIN: f32 = -FRAC_PI_2 + PITCH_EPSILON;
pub const PITCH_MAX: f32 = 0.0;

const FOV_MIN_DEG: f32 = 0.5;
const FOV_MAX_DEG: f32 = 90.0;
const FOV_RESET_DEG: f32 = 5.0;
const ZOOM_STEP: f32 = 0.1;

/// Vectors shorter than this cannot be normalized.
const NORMALIZE_EPSILON: f32 = 1e-7;

/// Keyboard movement directions, relative to the camera basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
}

/// A camera orbiting `focal_point` at a fixed `radius`.
///
/// Orientation is stored as yaw/pitch. The basis vectors are derived from them
/// by [`OrbitCamera::update_orientation`], which every mutator calls, so the
/// basis is always orthonormal when read.
///
/// Convention: `front` points from the eye towards the focal point, pitch is
/// non-positive (the eye stays above the focal plane), and a positive vertical
/// drag increases pitch.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    pub focal_point: Point3<f32>,
    pub world_up: Vector3<f32>,
    /// Free-flight position moved by the keyboard and by panning. It does not
    /// affect the view matrix, which is defined by the orbit alone.
    pub position: Point3<f32>,

    yaw: f32,
    pitch: f32,
    fov: f32,

    pub near: f32,
    pub far: f32,
    pub radius: f32,
    pub movement_speed: f32,
    pub sensitivity: f32,

    front: Vector3<f32>,
    right: Vector3<f32>,
    up: Vector3<f32>,

    viewport: (usize, usize),
}

impl Default for OrbitCamera {
    fn default() -> Self {
        let mut camera = Self {
            focal_point: Point3::origin(),
            world_up: Vector3::y(),
            position: Point3::new(0.0, 5.0, 10.0),
            yaw: PI / 4.0,
            pitch: (-35.0f32).to_radians(),
            fov: 1.0472,
            near: 0.1,
            far: 100.0,
            radius: 10.0,
            movement_speed: 50.0,
            sensitivity: 0.02,
            front: -Vector3::z(),
            right: -Vector3::x(),
            up: Vector3::y(),
            viewport: (800, 600),
        };
        // The default angles are well inside the valid range.
        let _ = camera.update_orientation();
        camera
    }
}

fn normalize(v: Vector3<f32>, what: &'static str) -> Result<Vector3<f32>> {
    let norm = v.norm();
    if !norm.is_finite() || norm < NORMALIZE_EPSILON {
        return Err(ViewerError::DegenerateVector(what));
    }
    Ok(v / norm)
}

/// Wraps an angle into (-π, π].
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}

impl OrbitCamera {
    /// Creates a camera with the given orbit. Angles are in radians and are
    /// clamped/wrapped into range.
    pub fn new(focal_point: Point3<f32>, yaw: f32, pitch: f32, radius: f32) -> Result<Self> {
        let mut camera = Self {
            focal_point,
            radius,
            ..Self::default()
        };
        camera.set_orientation(yaw, pitch)?;
        Ok(camera)
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn field_of_view(&self) -> f32 {
        self.fov
    }

    pub fn front(&self) -> Vector3<f32> {
        self.front
    }

    pub fn right(&self) -> Vector3<f32> {
        self.right
    }

    pub fn up(&self) -> Vector3<f32> {
        self.up
    }

    /// Sets yaw and pitch (radians), enforcing the usual limits.
    pub fn set_orientation(&mut self, yaw: f32, pitch: f32) -> Result<()> {
        self.yaw = wrap_angle(yaw);
        self.pitch = pitch.clamp(PITCH_MIN, PITCH_MAX);
        self.update_orientation()
    }

    /// Sets the field of view in radians, clamped to [0.5°, 90°].
    pub fn set_field_of_view(&mut self, fov: f32) {
        self.fov = fov.clamp(FOV_MIN_DEG.to_radians(), FOV_MAX_DEG.to_radians());
    }

    /// Recomputes `front`, `right` and `up` from yaw and pitch.
    pub fn update_orientation(&mut self) -> Result<()> {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();

        let front = normalize(
            Vector3::new(sin_yaw * cos_pitch, sin_pitch, cos_yaw * cos_pitch),
            "front",
        )?;
        let right = normalize(front.cross(&self.world_up), "right")?;
        let up = normalize(right.cross(&front), "up")?;

        self.front = front;
        self.right = right;
        self.up = up;
        Ok(())
    }

    /// The orbit eye: `radius` behind the focal point along `front`.
    pub fn eye_position(&self) -> Point3<f32> {
        self.focal_point - self.front * self.radius
    }

    /// Look-at matrix from the orbit eye towards the focal point.
    pub fn view_matrix(&self) -> Matrix4<f32> {
        TransformFactory::view(&self.eye_position(), &self.focal_point, &self.world_up)
    }

    pub fn projection_matrix(&self, aspect_ratio: f32) -> Result<Matrix4<f32>> {
        if !aspect_ratio.is_finite() || aspect_ratio <= 0.0 {
            return Err(ViewerError::InvalidViewport(aspect_ratio));
        }
        Ok(TransformFactory::perspective(
            aspect_ratio,
            self.fov,
            self.near,
            self.far,
        ))
    }

    /// Viewport size in pixels, as last reported by the frontend.
    pub fn viewport(&self) -> (usize, usize) {
        self.viewport
    }

    pub fn set_viewport(&mut self, width: usize, height: usize) {
        self.viewport = (width, height);
    }

    /// Projection for the current viewport.
    pub fn projection(&self) -> Result<Matrix4<f32>> {
        let (width, height) = self.viewport;
        if height == 0 {
            return Err(ViewerError::InvalidViewport(f32::INFINITY));
        }
        self.projection_matrix(width as f32 / height as f32)
    }

    pub fn apply_keyboard(&mut self, direction: Direction, dt: f32) -> Result<()> {
        if dt < 0.0 || dt.is_nan() {
            return Err(ViewerError::NegativeTimeStep(dt));
        }

        let velocity = self.movement_speed * dt;
        let offset = match direction {
            Direction::Forward => self.front,
            Direction::Backward => -self.front,
            Direction::Left => -self.right,
            Direction::Right => self.right,
            Direction::Up => self.up,
            Direction::Down => -self.up,
        };
        self.position += offset * velocity;
        Ok(())
    }

    pub fn apply_drag_rotate(&mut self, dx: f32, dy: f32) -> Result<()> {
        let yaw = self.yaw - dx * self.sensitivity;
        let pitch = self.pitch + dy * self.sensitivity;
        self.set_orientation(yaw, pitch)
    }

    /// Moves focal point and position together; the view direction is kept.
    pub fn apply_drag_pan(&mut self, dx: f32, dy: f32) -> Result<()> {
        let shift = self.right * (dx * self.sensitivity) - self.front * (dy * self.sensitivity);
        self.focal_point += shift;
        self.position += shift;
        self.update_orientation()
    }

    /// Narrows the field of view for positive `dy`.
    ///
    /// Underflowing the 0.5° floor resets to 5°; overshooting the ceiling
    /// clamps to 90°.
    pub fn apply_scroll_zoom(&mut self, dy: f32) {
        let min = FOV_MIN_DEG.to_radians();
        let max = FOV_MAX_DEG.to_radians();

        if self.fov >= min && self.fov <= max {
            self.fov -= dy * ZOOM_STEP;
        }

        if self.fov <= min {
            self.fov = FOV_RESET_DEG.to_radians();
        } else if self.fov >= max {
            self.fov = max;
        }
    }
}

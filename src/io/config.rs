use crate::error::{Result, ViewerError};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub objects: Vec<ObjectConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            camera: CameraConfig::default(),
            grid: GridConfig::default(),
            objects: vec![
                ObjectConfig {
                    kind: ObjectKind::Frame,
                    ..ObjectConfig::default()
                },
                ObjectConfig {
                    kind: ObjectKind::Cube,
                    position: [1.5, 0.25, 0.0],
                    ..ObjectConfig::default()
                },
                ObjectConfig {
                    kind: ObjectKind::CameraFrustum,
                    position: [-2.0, 1.0, 2.0],
                    rotation: [0.0, 135.0, 0.0],
                    ..ObjectConfig::default()
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct WindowConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_width")]
    pub width: usize,
    #[serde(default = "default_height")]
    pub height: usize,
    /// SSAA factor per axis.
    #[serde(default = "default_samples")]
    pub samples: usize,
    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 3],
    #[serde(default = "default_target_fps")]
    pub target_fps: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            width: default_width(),
            height: default_height(),
            samples: default_samples(),
            clear_color: default_clear_color(),
            target_fps: default_target_fps(),
        }
    }
}

fn default_title() -> String {
    "orbitview".to_string()
}
fn default_width() -> usize {
    800
}
fn default_height() -> usize {
    600
}
fn default_samples() -> usize {
    1
}
fn default_clear_color() -> [f32; 3] {
    [0.1, 0.1, 0.12]
}
fn default_target_fps() -> usize {
    60
}

/// Angles are in degrees.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CameraConfig {
    #[serde(default)]
    pub focal_point: [f32; 3],
    #[serde(default = "default_yaw")]
    pub yaw: f32,
    #[serde(default = "default_pitch")]
    pub pitch: f32,
    #[serde(default = "default_fov")]
    pub fov: f32,
    #[serde(default = "default_radius")]
    pub radius: f32,
    #[serde(default = "default_near")]
    pub near: f32,
    #[serde(default = "default_far")]
    pub far: f32,
    #[serde(default = "default_movement_speed")]
    pub movement_speed: f32,
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            focal_point: [0.0; 3],
            yaw: default_yaw(),
            pitch: default_pitch(),
            fov: default_fov(),
            radius: default_radius(),
            near: default_near(),
            far: default_far(),
            movement_speed: default_movement_speed(),
            sensitivity: default_sensitivity(),
        }
    }
}

fn default_yaw() -> f32 {
    45.0
}
fn default_pitch() -> f32 {
    -35.0
}
fn default_fov() -> f32 {
    60.0
}
fn default_radius() -> f32 {
    10.0
}
fn default_near() -> f32 {
    0.1
}
fn default_far() -> f32 {
    100.0
}
fn default_movement_speed() -> f32 {
    50.0
}
fn default_sensitivity() -> f32 {
    0.02
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GridConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_grid_size")]
    pub size: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            size: default_grid_size(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_grid_size() -> usize {
    10
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Cube,
    Frame,
    CameraFrustum,
    Plane,
    Voxels,
    Model,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ObjectConfig {
    pub kind: ObjectKind,

    /// Image for `plane`, OBJ file for `model`.
    #[serde(default)]
    pub path: Option<String>,

    // --- Transform ---
    #[serde(default)]
    pub position: [f32; 3],
    #[serde(default)]
    pub rotation: [f32; 3],
    #[serde(default = "default_scale")]
    pub scale: [f32; 3],

    /// Edge length (cube, voxel), axis length (frame), depth (frustum) or
    /// half extent (plane). Each kind has its own default.
    pub size: Option<f32>,
    pub color: Option<[f32; 3]>,

    /// Fit a model into a 1.8 unit cube around the origin before placing it.
    #[serde(default = "default_true")]
    pub normalize: bool,

    // --- Voxels ---
    #[serde(default)]
    pub voxels: Vec<[f32; 3]>,
    #[serde(default = "default_max_voxels")]
    pub max_voxels: usize,
}

impl Default for ObjectConfig {
    fn default() -> Self {
        Self {
            kind: ObjectKind::Cube,
            path: None,
            position: [0.0; 3],
            rotation: [0.0; 3],
            scale: default_scale(),
            size: None,
            color: None,
            normalize: true,
            voxels: Vec::new(),
            max_voxels: default_max_voxels(),
        }
    }
}

fn default_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}
fn default_max_voxels() -> usize {
    10_000
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ViewerError::Config(format!("failed to read config file {:?}: {}", path, e))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ViewerError::Config(format!("failed to parse TOML: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults_without_objects() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.window, WindowConfig::default());
        assert_eq!(config.camera, CameraConfig::default());
        assert!(config.grid.enabled);
        assert!(config.objects.is_empty());
    }

    #[test]
    fn parses_objects_of_every_kind() {
        let config = Config::parse(
            r#"
            [window]
            width = 320
            height = 240
            samples = 2

            [camera]
            pitch = -20.0

            [grid]
            size = 4

            [[objects]]
            kind = "cube"
            position = [1.0, 0.0, 0.0]
            size = 0.25

            [[objects]]
            kind = "camera_frustum"

            [[objects]]
            kind = "voxels"
            voxels = [[0.0, 0.0, 0.0], [0.1, 0.0, 0.0]]
            max_voxels = 8

            [[objects]]
            kind = "model"
            path = "assets/spot.obj"
            normalize = false
            "#,
        )
        .unwrap();

        assert_eq!((config.window.width, config.window.height), (320, 240));
        assert_eq!(config.window.title, "orbitview");
        assert_eq!(config.camera.pitch, -20.0);
        assert_eq!(config.camera.yaw, 45.0);
        assert_eq!(config.grid.size, 4);

        let kinds: Vec<_> = config.objects.iter().map(|o| o.kind).collect();
        assert_eq!(
            kinds,
            [
                ObjectKind::Cube,
                ObjectKind::CameraFrustum,
                ObjectKind::Voxels,
                ObjectKind::Model
            ]
        );
        assert_eq!(config.objects[0].size, Some(0.25));
        assert_eq!(config.objects[1].scale, [1.0, 1.0, 1.0]);
        assert_eq!(config.objects[2].voxels.len(), 2);
        assert!(!config.objects[3].normalize);
    }

    #[test]
    fn unknown_kind_is_a_config_error() {
        let err = Config::parse("[[objects]]\nkind = \"teapot\"\n").unwrap_err();
        assert!(matches!(err, ViewerError::Config(_)));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        assert!(matches!(
            Config::load("does/not/exist.toml"),
            Err(ViewerError::Config(_))
        ));
    }
}

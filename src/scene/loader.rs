use crate::core::math::transform::compose_trs;
use crate::error::{Result, ViewerError};
use crate::gpu::device::GpuContext;
use crate::io::config::{CameraConfig, Config, ObjectConfig, ObjectKind};
use crate::io::image::ImageLoader;
use crate::scene::camera::OrbitCamera;
use crate::scene::drawable::Drawable;
use crate::scene::importer::MeshImportPipeline;
use crate::scene::shapes::{CameraFrustum, Cube, Frame, Grid, TexturedPlane, VoxelCloud};
use crate::scene::texture::TextureCache;
use log::{error, info};
use nalgebra::{Matrix4, Point3, Vector3};
use std::path::Path;

const DEFAULT_AXIS_LENGTH: f32 = 1.0;
const DEFAULT_FRUSTUM_SCALE: f32 = 1.0;
const DEFAULT_VOXEL_SIZE: f32 = 0.1;

/// Everything the viewer draws, in registration order, together with the
/// textures the imported models refer to.
pub struct Scene {
    pub drawables: Vec<Box<dyn Drawable>>,
    pub textures: TextureCache,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            drawables: Vec::new(),
            textures: TextureCache::new(),
        }
    }

    pub fn add(&mut self, drawable: impl Drawable + 'static) {
        self.drawables.push(Box::new(drawable));
    }

    pub fn len(&self) -> usize {
        self.drawables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drawables.is_empty()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the camera described by the `[camera]` section. Angles in the
/// config are degrees. Viewport dimensions are clamped to at least 1.
pub fn camera_from_config(config: &CameraConfig, viewport: (usize, usize)) -> Result<OrbitCamera> {
    let mut camera = OrbitCamera::new(
        Point3::from(config.focal_point),
        config.yaw.to_radians(),
        config.pitch.to_radians(),
        config.radius,
    )?;
    camera.set_field_of_view(config.fov.to_radians());
    camera.near = config.near;
    camera.far = config.far;
    camera.movement_speed = config.movement_speed;
    camera.sensitivity = config.sensitivity;
    camera.position = camera.eye_position();
    camera.set_viewport(viewport.0.max(1), viewport.1.max(1));
    Ok(camera)
}

/// Creates every drawable of `config`, grid first.
///
/// Setup failures (shader, buffer, texture upload) abort the build. Objects
/// whose input is unusable (missing file, invalid scene graph, missing
/// image) are logged and left out.
pub fn build_scene<L: ImageLoader>(gpu: &GpuContext, config: &Config, loader: L) -> Result<Scene> {
    let mut scene = Scene::new();
    let mut pipeline = MeshImportPipeline::new(gpu, loader);

    if config.grid.enabled {
        scene.add(Grid::new(gpu, config.grid.size)?);
    }

    for (index, object) in config.objects.iter().enumerate() {
        match build_object(gpu, &mut pipeline, object) {
            Ok(drawable) => scene.drawables.push(drawable),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => error!("Skipping object #{} ({:?}): {}", index, object.kind, e),
        }
    }

    scene.textures = pipeline.into_cache();
    info!(
        "Scene initialized with {} drawables, {} textures.",
        scene.len(),
        scene.textures.len()
    );
    Ok(scene)
}

fn placement(object: &ObjectConfig) -> Matrix4<f32> {
    let rotation = Vector3::from(object.rotation).map(f32::to_radians);
    compose_trs(
        &Vector3::from(object.position),
        &rotation,
        &Vector3::from(object.scale),
    )
}

fn build_object<L: ImageLoader>(
    gpu: &GpuContext,
    pipeline: &mut MeshImportPipeline<L>,
    object: &ObjectConfig,
) -> Result<Box<dyn Drawable>> {
    let transform = placement(object);

    let mut drawable: Box<dyn Drawable> = match object.kind {
        ObjectKind::Cube => {
            let color = object.color.unwrap_or(Cube::DEFAULT_COLOR);
            Box::new(Cube::with_color(
                gpu,
                object.size.unwrap_or(Cube::DEFAULT_SIZE),
                Vector3::from(color),
            )?)
        }
        ObjectKind::Frame => Box::new(Frame::new(
            gpu,
            object.size.unwrap_or(DEFAULT_AXIS_LENGTH),
        )?),
        ObjectKind::CameraFrustum => {
            let mut frustum = CameraFrustum::new(
                gpu,
                CameraFrustum::DEFAULT_FOV_DEG.to_radians(),
                object.size.unwrap_or(DEFAULT_FRUSTUM_SCALE),
            )?;
            if let Some(color) = object.color {
                frustum.color = Vector3::from(color);
            }
            Box::new(frustum)
        }
        ObjectKind::Plane => {
            let path = required_path(object)?;
            Box::new(TexturedPlane::load(
                gpu,
                pipeline.loader_mut(),
                path,
                object.size.unwrap_or(TexturedPlane::DEFAULT_HALF_EXTENT),
            )?)
        }
        ObjectKind::Voxels => {
            let mut cloud = VoxelCloud::new(
                gpu,
                object.size.unwrap_or(DEFAULT_VOXEL_SIZE),
                object.max_voxels,
            )?;
            if let Some(color) = object.color {
                cloud.color = Vector3::from(color);
            }
            let centres: Vec<Point3<f32>> = object.voxels.iter().copied().map(Point3::from).collect();
            cloud.update(&centres)?;
            Box::new(cloud)
        }
        ObjectKind::Model => {
            let path = required_path(object)?;
            let mut model = pipeline.import_file(path)?;
            if object.normalize {
                model.normalize(transform);
                return Ok(Box::new(model));
            }
            Box::new(model)
        }
    };

    drawable.set_transform(transform);
    Ok(drawable)
}

fn required_path(object: &ObjectConfig) -> Result<&Path> {
    object.path.as_deref().map(Path::new).ok_or_else(|| {
        ViewerError::Config(format!("{:?} object needs a `path`", object.kind))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::software::SoftwareDevice;
    use crate::io::image::ImageData;
    use approx::assert_relative_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct SolidLoader;

    impl ImageLoader for SolidLoader {
        fn load(&mut self, path: &Path) -> Result<ImageData> {
            if path.ends_with("missing.png") {
                return Err(ViewerError::ImageLoad {
                    path: path.display().to_string(),
                    reason: "not found".into(),
                });
            }
            Ok(ImageData::solid(4, 4, [10, 20, 30]))
        }
    }

    fn gpu() -> GpuContext {
        Rc::new(RefCell::new(SoftwareDevice::new(16, 16, 1)))
    }

    #[test]
    fn default_config_builds_grid_and_three_objects() {
        let scene = build_scene(&gpu(), &Config::default(), SolidLoader).unwrap();
        let names: Vec<_> = scene.drawables.iter().map(|d| d.name()).collect();
        assert_eq!(names, ["grid", "frame", "cube", "camera_frustum"]);
    }

    #[test]
    fn unusable_objects_are_skipped() {
        let config = Config::parse(
            r#"
            [grid]
            enabled = false

            [[objects]]
            kind = "plane"
            path = "missing.png"

            [[objects]]
            kind = "model"
            path = "no/such/model.obj"

            [[objects]]
            kind = "plane"

            [[objects]]
            kind = "plane"
            path = "checker.png"
            position = [0.0, 1.0, 0.0]
            "#,
        )
        .unwrap();

        let scene = build_scene(&gpu(), &config, SolidLoader).unwrap();
        assert_eq!(scene.len(), 1);
        assert_eq!(scene.drawables[0].name(), "plane");
        assert_relative_eq!(scene.drawables[0].transform()[(1, 3)], 1.0);
    }

    #[test]
    fn object_transform_uses_degrees() {
        let object = ObjectConfig {
            rotation: [0.0, 90.0, 0.0],
            ..ObjectConfig::default()
        };
        let m = placement(&object);
        let x = m.transform_vector(&Vector3::x());
        assert_relative_eq!(x, Vector3::new(0.0, 0.0, -1.0), epsilon = 1e-6);
    }

    #[test]
    fn camera_config_is_converted_to_radians() {
        let config = CameraConfig {
            yaw: 90.0,
            pitch: -45.0,
            fov: 45.0,
            ..CameraConfig::default()
        };
        let camera = camera_from_config(&config, (640, 480)).unwrap();
        assert_relative_eq!(camera.yaw(), std::f32::consts::FRAC_PI_2, epsilon = 1e-6);
        assert_relative_eq!(camera.pitch(), -std::f32::consts::FRAC_PI_4, epsilon = 1e-6);
        assert_relative_eq!(camera.field_of_view(), 45.0f32.to_radians(), epsilon = 1e-6);
        assert_eq!(camera.viewport(), (640, 480));
        assert_eq!(camera.position, camera.eye_position());
    }

    #[test]
    fn zero_height_window_still_gives_a_usable_camera() {
        let camera = camera_from_config(&CameraConfig::default(), (640, 0)).unwrap();
        assert_eq!(camera.viewport(), (640, 1));
        assert!(camera.projection().is_ok());
    }
}

use crate::error::Result;
use crate::gpu::device::{GpuContext, TextureId};
use crate::gpu::resources::GpuTexture;
use crate::io::image::ImageLoader;
use log::info;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

/// The role a texture plays for a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Diffuse,
    Specular,
    Normal,
    Height,
}

impl TextureKind {
    /// Lookup order when resolving a material.
    pub const ALL: [TextureKind; 4] = [
        TextureKind::Diffuse,
        TextureKind::Specular,
        TextureKind::Normal,
        TextureKind::Height,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TextureKind::Diffuse => "diffuse",
            TextureKind::Specular => "specular",
            TextureKind::Normal => "normal",
            TextureKind::Height => "height",
        }
    }

    /// Sampler uniform for the `n`-th texture of this kind, counting from 1.
    pub fn sampler_name(self, n: usize) -> String {
        format!("texture_{}{}", self.as_str(), n)
    }
}

impl fmt::Display for TextureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-owning handle to a cached texture.
#[derive(Debug, Clone)]
pub struct TextureRef {
    texture: Weak<GpuTexture>,
    pub kind: TextureKind,
    pub path: PathBuf,
}

impl TextureRef {
    /// The GPU texture, if the owning cache is still alive.
    pub fn id(&self) -> Option<TextureId> {
        self.texture.upgrade().map(|t| t.id())
    }

    pub fn is_alive(&self) -> bool {
        self.texture.strong_count() > 0
    }
}

/// Source path -> uploaded texture. Each distinct path is uploaded once.
#[derive(Default)]
pub struct TextureCache {
    entries: HashMap<PathBuf, Rc<GpuTexture>>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Returns the cached texture for `path`, loading and uploading it on a
    /// miss. Failed loads are not cached, so a later import may retry.
    pub fn get_or_load(
        &mut self,
        gpu: &GpuContext,
        loader: &mut dyn ImageLoader,
        path: &Path,
        kind: TextureKind,
    ) -> Result<TextureRef> {
        if let Some(texture) = self.entries.get(path) {
            return Ok(TextureRef {
                texture: Rc::downgrade(texture),
                kind,
                path: path.to_path_buf(),
            });
        }

        let image = loader.load(path)?;
        let texture = Rc::new(GpuTexture::upload(gpu, &image)?);
        info!(
            "Uploaded {} texture {:?} ({}x{})",
            kind, path, image.width, image.height
        );

        let texture_ref = TextureRef {
            texture: Rc::downgrade(&texture),
            kind,
            path: path.to_path_buf(),
        };
        self.entries.insert(path.to_path_buf(), texture);
        Ok(texture_ref)
    }
}

impl fmt::Debug for TextureCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ViewerError;
    use crate::gpu::software::SoftwareDevice;
    use crate::io::image::ImageData;
    use std::cell::RefCell;

    #[derive(Default)]
    struct CountingLoader {
        calls: usize,
        fail: bool,
    }

    impl ImageLoader for CountingLoader {
        fn load(&mut self, path: &Path) -> Result<ImageData> {
            self.calls += 1;
            if self.fail {
                return Err(ViewerError::ImageLoad {
                    path: path.display().to_string(),
                    reason: "missing".into(),
                });
            }
            Ok(ImageData::solid(1, 1, [255, 255, 255]))
        }
    }

    fn gpu() -> GpuContext {
        Rc::new(RefCell::new(SoftwareDevice::new(4, 4, 1)))
    }

    #[test]
    fn second_lookup_is_a_cache_hit() {
        let gpu = gpu();
        let mut loader = CountingLoader::default();
        let mut cache = TextureCache::new();
        let path = Path::new("wood.png");

        let a = cache
            .get_or_load(&gpu, &mut loader, path, TextureKind::Diffuse)
            .unwrap();
        let b = cache
            .get_or_load(&gpu, &mut loader, path, TextureKind::Specular)
            .unwrap();

        assert_eq!(loader.calls, 1);
        assert_eq!(a.id(), b.id());
        assert_eq!(b.kind, TextureKind::Specular);
        assert_eq!(gpu.borrow().stats().texture_uploads, 1);
    }

    #[test]
    fn failures_are_not_cached() {
        let gpu = gpu();
        let mut loader = CountingLoader {
            fail: true,
            ..Default::default()
        };
        let mut cache = TextureCache::new();
        let path = Path::new("missing.png");

        assert!(
            cache
                .get_or_load(&gpu, &mut loader, path, TextureKind::Diffuse)
                .is_err()
        );
        loader.fail = false;
        assert!(
            cache
                .get_or_load(&gpu, &mut loader, path, TextureKind::Diffuse)
                .is_ok()
        );
        assert_eq!(loader.calls, 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn references_do_not_keep_textures_alive() {
        let gpu = gpu();
        let mut loader = CountingLoader::default();
        let mut cache = TextureCache::new();
        let texture_ref = cache
            .get_or_load(&gpu, &mut loader, Path::new("a.png"), TextureKind::Normal)
            .unwrap();
        assert!(texture_ref.is_alive());

        drop(cache);
        assert!(!texture_ref.is_alive());
        assert_eq!(texture_ref.id(), None);
        assert_eq!(gpu.borrow().stats().live_textures, 0);
    }

    #[test]
    fn sampler_names_count_from_one() {
        assert_eq!(TextureKind::Diffuse.sampler_name(1), "texture_diffuse1");
        assert_eq!(TextureKind::Height.sampler_name(2), "texture_height2");
    }
}

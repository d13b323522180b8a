use crate::error::{Result, ViewerError};
use image::{DynamicImage, ImageBuffer};
use log::{error, info};
use std::path::Path;

/// Raw decoded pixels, tightly packed row by row from the top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    /// 1 (luma), 3 (RGB) or 4 (RGBA).
    pub channels: u8,
    pub pixels: Vec<u8>,
}

impl ImageData {
    pub fn new(width: u32, height: u32, channels: u8, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * channels as usize;
        if !matches!(channels, 1 | 3 | 4) || pixels.len() != expected {
            return Err(ViewerError::TextureUpload(format!(
                "{}x{} image with {} channels needs {} bytes, got {}",
                width,
                height,
                channels,
                expected,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            pixels,
        })
    }

    /// A single-colour image, handy for placeholder textures.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self {
            width,
            height,
            channels: 3,
            pixels,
        }
    }
}

/// Turns a file path into raw pixels.
pub trait ImageLoader {
    fn load(&mut self, path: &Path) -> Result<ImageData>;
}

/// Decodes images from disk with the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileImageLoader;

impl ImageLoader for FileImageLoader {
    fn load(&mut self, path: &Path) -> Result<ImageData> {
        let img = image::open(path).map_err(|e| ViewerError::ImageLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let (width, height) = (img.width(), img.height());
        let (channels, pixels) = match img {
            DynamicImage::ImageLuma8(buf) => (1, buf.into_raw()),
            DynamicImage::ImageRgb8(buf) => (3, buf.into_raw()),
            DynamicImage::ImageRgba8(buf) => (4, buf.into_raw()),
            other => (4, other.to_rgba8().into_raw()),
        };

        info!(
            "Loaded image: {:?} ({}x{}, {} channels)",
            path, width, height, channels
        );

        ImageData::new(width, height, channels, pixels)
    }
}

/// Saves a u32 ARGB buffer to a PNG file. Alpha is dropped.
pub fn save_buffer_to_image(buffer: &[u32], width: usize, height: usize, path: &Path) -> Result<()> {
    if buffer.len() < width * height {
        return Err(ViewerError::DrawState(format!(
            "frame buffer holds {} pixels, {}x{} requested",
            buffer.len(),
            width,
            height
        )));
    }

    let mut img_buf = ImageBuffer::new(width as u32, height as u32);

    for (x, y, pixel) in img_buf.enumerate_pixels_mut() {
        let idx = (y as usize) * width + (x as usize);
        let color_u32 = buffer[idx];

        let r = ((color_u32 >> 16) & 0xFF) as u8;
        let g = ((color_u32 >> 8) & 0xFF) as u8;
        let b = (color_u32 & 0xFF) as u8;

        *pixel = image::Rgb([r, g, b]);
    }

    img_buf.save(path).map_err(|e| {
        error!("Failed to save image to {:?}: {}", path, e);
        ViewerError::Io(std::io::Error::other(e.to_string()))
    })
}

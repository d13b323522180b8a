use nalgebra::Vector3;
use rayon::prelude::*;
use std::cell::UnsafeCell;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

const LOCK_STRIPES: usize = 1024;

/// Colour and depth samples of the software device's render target.
///
/// `width`/`height` are output pixels; with supersampling each pixel holds
/// `sample_count²` samples. Rows are shaded in parallel: depth is an atomic
/// compare-and-swap, colour writes go through striped locks.
pub struct FrameBuffer {
    pub width: usize,
    pub height: usize,
    pub sample_count: usize,
    pub buffer_width: usize,
    pub buffer_height: usize,

    /// Only written while holding the stripe lock of the sample.
    pub color_buffer: UnsafeCell<Vec<Vector3<f32>>>,

    /// `f32` bit patterns.
    pub depth_buffer: Vec<AtomicU32>,

    locks: Vec<Mutex<()>>,
}

// Colour access is serialized by `locks`, depth by atomics.
unsafe impl Sync for FrameBuffer {}

impl FrameBuffer {
    pub fn new(width: usize, height: usize, sample_count: usize) -> Self {
        let sample_count = sample_count.max(1);
        let buffer_width = width * sample_count;
        let buffer_height = height * sample_count;
        let size = buffer_width * buffer_height;

        let far = f32::INFINITY.to_bits();
        Self {
            width,
            height,
            sample_count,
            buffer_width,
            buffer_height,
            color_buffer: UnsafeCell::new(vec![Vector3::zeros(); size]),
            depth_buffer: (0..size).map(|_| AtomicU32::new(far)).collect(),
            locks: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Resets every sample to `color` and the depth buffer to infinity.
    pub fn clear(&mut self, color: Vector3<f32>) {
        let inf_bits = f32::INFINITY.to_bits();
        self.color_buffer.get_mut().fill(color);
        for depth in &mut self.depth_buffer {
            *depth.get_mut() = inf_bits;
        }
    }

    #[inline(always)]
    pub fn in_bounds(&self, x: usize, y: usize) -> bool {
        x < self.buffer_width && y < self.buffer_height
    }

    #[inline(always)]
    fn index(&self, x: usize, y: usize) -> usize {
        y * self.buffer_width + x
    }

    /// Stores `new_depth` if it is closer than the current sample and
    /// reports whether it was.
    #[inline]
    pub fn depth_test_and_update(&self, x: usize, y: usize, new_depth: f32) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        let idx = self.index(x, y);
        let new_bits = new_depth.to_bits();
        let depth_atomic = &self.depth_buffer[idx];

        let mut current_bits = depth_atomic.load(Ordering::Relaxed);
        loop {
            let current_depth = f32::from_bits(current_bits);
            if new_depth >= current_depth {
                return false;
            }
            match depth_atomic.compare_exchange_weak(
                current_bits,
                new_bits,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(updated_bits) => current_bits = updated_bits,
            }
        }
    }

    /// Writes one sample. Callers pass the depth test first.
    #[inline]
    pub fn set_pixel_safe(&self, x: usize, y: usize, color: Vector3<f32>) {
        if self.in_bounds(x, y) {
            let idx = self.index(x, y);
            let lock_idx = idx % self.locks.len();
            let _guard = self.locks[lock_idx]
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // SAFETY: the stripe lock for `idx` is held.
            unsafe {
                let buffer = &mut *self.color_buffer.get();
                buffer[idx] = color;
            }
        }
    }

    /// Returns the resolved (SSAA-averaged) color of an output pixel.
    pub fn get_pixel(&self, x: usize, y: usize) -> Option<Vector3<f32>> {
        if x >= self.width || y >= self.height {
            return None;
        }

        // SAFETY: only called between draws, when no writer is active.
        let buffer = unsafe { &*self.color_buffer.get() };

        if self.sample_count == 1 {
            return Some(buffer[self.index(x, y)]);
        }

        let mut sum_color = Vector3::zeros();
        let start_x = x * self.sample_count;
        let start_y = y * self.sample_count;

        for dy in 0..self.sample_count {
            for dx in 0..self.sample_count {
                let idx = self.index(start_x + dx, start_y + dy);
                sum_color += buffer[idx];
            }
        }

        let samples = (self.sample_count * self.sample_count) as f32;
        Some(sum_color / samples)
    }
}

/// Resolves the framebuffer into packed ARGB u32 pixels (alpha always 0xFF),
/// `width * height` of them.
pub fn resolve_to_buffer(framebuffer: &FrameBuffer, buffer: &mut [u32]) {
    buffer
        .par_chunks_mut(framebuffer.width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, pixel) in row.iter_mut().enumerate() {
                *pixel = match framebuffer.get_pixel(x, y) {
                    Some(color) => pack_rgb(color),
                    None => 0,
                };
            }
        });
}

/// Opaque `0xFFRRGGBB`.
#[inline]
pub fn pack_rgb(color: Vector3<f32>) -> u32 {
    let r = (color.x.clamp(0.0, 1.0) * 255.0).round() as u32;
    let g = (color.y.clamp(0.0, 1.0) * 255.0).round() as u32;
    let b = (color.z.clamp(0.0, 1.0) * 255.0).round() as u32;
    (255 << 24) | (r << 16) | (g << 8) | b
}

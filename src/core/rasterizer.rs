use crate::core::framebuffer::FrameBuffer;
use crate::core::math::interpolation::{
    barycentric_coordinates, is_inside_triangle, perspective_correct_barycentric,
};
use crate::core::math::transform::{apply_perspective_division, ndc_to_screen};
use crate::core::pipeline::{Interpolatable, Shader};
use nalgebra::{Point2, Vector4};
use rayon::prelude::*;

/// Frustum planes as `(axis, sign)`: a point is inside when
/// `sign * p[axis] <= p.w`. Order: right, left, top, bottom, far, near.
const CLIP_PLANES: [(usize, f32); 6] = [
    (0, 1.0),
    (0, -1.0),
    (1, 1.0),
    (1, -1.0),
    (2, 1.0),
    (2, -1.0),
];

/// Scan-converts clip-space triangles and lines into a [`FrameBuffer`].
pub struct Rasterizer {
    /// Line thickness in output pixels.
    pub line_width: f32,
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Rasterizer {
    pub fn new() -> Self {
        Self { line_width: 1.0 }
    }

    /// Clips the triangle against the frustum (Sutherland-Hodgman, two
    /// ping-pong vertex lists) and fills the resulting convex polygon as a fan.
    pub fn rasterize_triangle<S: Shader>(
        &self,
        framebuffer: &FrameBuffer,
        shader: &S,
        clip_coords: &[Vector4<f32>; 3],
        varyings: &[S::Varying; 3],
    ) {
        // A triangle clipped by a cube has at most 9 vertices.
        let mut current_poly: Vec<(Vector4<f32>, S::Varying)> = Vec::with_capacity(16);
        let mut clip_buffer: Vec<(Vector4<f32>, S::Varying)> = Vec::with_capacity(16);

        for i in 0..3 {
            current_poly.push((clip_coords[i], varyings[i]));
        }

        for &(axis, sign) in &CLIP_PLANES {
            if current_poly.is_empty() {
                return;
            }

            self.clip_polygon_against_plane::<S>(&current_poly, &mut clip_buffer, axis, sign);
            std::mem::swap(&mut current_poly, &mut clip_buffer);
        }

        if current_poly.len() < 3 {
            return;
        }

        let v0 = current_poly[0];
        for i in 1..(current_poly.len() - 1) {
            let v1 = current_poly[i];
            let v2 = current_poly[i + 1];

            self.rasterize_triangle_clipped(
                framebuffer,
                shader,
                &[v0.0, v1.0, v2.0],
                &[v0.1, v1.1, v2.1],
            );
        }
    }

    /// Rasterize a line segment with depth testing.
    ///
    /// The segment is clipped against all six frustum planes first, so the
    /// number of stepped pixels is bounded by the framebuffer size.
    pub fn rasterize_line<S: Shader>(
        &self,
        framebuffer: &FrameBuffer,
        shader: &S,
        clip_coords: &[Vector4<f32>; 2],
        varyings: &[S::Varying; 2],
    ) {
        let mut a = (clip_coords[0], varyings[0]);
        let mut b = (clip_coords[1], varyings[1]);

        for &(axis, sign) in &CLIP_PLANES {
            let is_inside = |p: &Vector4<f32>| sign * p[axis] <= p.w + 1e-6;
            match (is_inside(&a.0), is_inside(&b.0)) {
                (true, true) => {}
                (false, false) => return,
                (true, false) => match Self::intersect_edge_plane::<S>(a, b, axis, sign) {
                    Some(inter) => b = inter,
                    None => return,
                },
                (false, true) => match Self::intersect_edge_plane::<S>(a, b, axis, sign) {
                    Some(inter) => a = inter,
                    None => return,
                },
            }
        }

        if a.0.w.abs() < 1e-6 || b.0.w.abs() < 1e-6 {
            return;
        }

        let width = framebuffer.buffer_width as f32;
        let height = framebuffer.buffer_height as f32;
        let ndc_a = apply_perspective_division(&a.0);
        let ndc_b = apply_perspective_division(&b.0);
        let sa = ndc_to_screen(ndc_a.x, ndc_a.y, width, height);
        let sb = ndc_to_screen(ndc_b.x, ndc_b.y, width, height);

        let delta = sb - sa;
        let steps = delta.x.abs().max(delta.y.abs()).ceil().max(1.0) as usize;

        // Thickness is applied along the minor axis, scaled with the SSAA factor.
        let thickness = (self.line_width.max(1.0) * framebuffer.sample_count as f32).round() as i32;
        let half = (thickness - 1) / 2;
        let x_major = delta.x.abs() >= delta.y.abs();

        let inv_wa = 1.0 / a.0.w;
        let inv_wb = 1.0 / b.0.w;

        for step in 0..=steps {
            let t = step as f32 / steps as f32;
            let p = sa + delta * t;

            // Perspective-correct weight for the far endpoint
            let wa = (1.0 - t) * inv_wa;
            let wb = t * inv_wb;
            let sum = wa + wb;
            if sum.abs() < 1e-9 {
                continue;
            }
            let tc = wb / sum;

            let z_ndc = a.0.z * (1.0 - tc) + b.0.z * tc;
            let depth = z_ndc * 0.5 + 0.5;
            let color = shader.fragment(a.1 * (1.0 - tc) + b.1 * tc);

            for offset in -half..=(thickness - 1 - half) {
                let (px, py) = if x_major {
                    (p.x, p.y + offset as f32)
                } else {
                    (p.x + offset as f32, p.y)
                };
                if px < 0.0 || py < 0.0 {
                    continue;
                }
                let (x, y) = (px as usize, py as usize);
                if framebuffer.depth_test_and_update(x, y, depth) {
                    framebuffer.set_pixel_safe(x, y, color);
                }
            }
        }
    }

    /// One Sutherland-Hodgman stage. `output` is cleared first.
    fn clip_polygon_against_plane<S: Shader>(
        &self,
        input: &[(Vector4<f32>, S::Varying)],
        output: &mut Vec<(Vector4<f32>, S::Varying)>,
        axis: usize,
        sign: f32,
    ) {
        output.clear();

        if input.is_empty() {
            return;
        }

        let mut prev = input[input.len() - 1];
        let is_inside = |p: &Vector4<f32>| sign * p[axis] <= p.w + 1e-6;

        let mut prev_inside = is_inside(&prev.0);

        for curr in input {
            let curr_inside = is_inside(&curr.0);

            if curr_inside {
                if !prev_inside {
                    if let Some(inter) = Self::intersect_edge_plane::<S>(prev, *curr, axis, sign) {
                        output.push(inter);
                    }
                }
                output.push(*curr);
            } else if prev_inside {
                if let Some(inter) = Self::intersect_edge_plane::<S>(prev, *curr, axis, sign) {
                    output.push(inter);
                }
            }

            prev = *curr;
            prev_inside = curr_inside;
        }
    }

    /// Point where segment `a`-`b` crosses the plane, with the varying
    /// interpolated linearly in clip space.
    #[inline(always)]
    fn intersect_edge_plane<S: Shader>(
        a: (Vector4<f32>, S::Varying),
        b: (Vector4<f32>, S::Varying),
        axis: usize,
        sign: f32,
    ) -> Option<(Vector4<f32>, S::Varying)> {
        let ac = a.0[axis];
        let bc = b.0[axis];
        let aw = a.0.w;
        let bw = b.0.w;

        let denom = sign * (bc - ac) - (bw - aw);
        if denom.abs() < 1e-9 {
            return None;
        }

        let t = (aw - sign * ac) / denom;
        if !t.is_finite() {
            return None;
        }

        let pos = a.0 + (b.0 - a.0) * t;
        let vary = a.1 * (1.0 - t) + b.1 * t;

        Some((pos, vary))
    }

    /// Fills a triangle that already lies inside the frustum.
    fn rasterize_triangle_clipped<S: Shader>(
        &self,
        framebuffer: &FrameBuffer,
        shader: &S,
        clip_coords: &[Vector4<f32>; 3],
        varyings: &[S::Varying; 3],
    ) where
        S::Varying: Interpolatable,
    {
        let width = framebuffer.buffer_width as f32;
        let height = framebuffer.buffer_height as f32;

        let mut screen_coords = [Point2::origin(); 3];
        let mut w_values = [0.0; 3];

        for i in 0..3 {
            if clip_coords[i].w.abs() < 1e-6 {
                return;
            }

            let ndc = apply_perspective_division(&clip_coords[i]);
            w_values[i] = clip_coords[i].w;
            screen_coords[i] = ndc_to_screen(ndc.x, ndc.y, width, height);
        }

        let (min_x, min_y, max_x, max_y) = self.compute_bounding_box(&screen_coords);

        if max_x < 0
            || max_y < 0
            || min_x >= framebuffer.buffer_width as i32
            || min_y >= framebuffer.buffer_height as i32
        {
            return;
        }

        let start_x = min_x.max(0) as usize;
        let end_x = (max_x.min(framebuffer.buffer_width as i32 - 1)) as usize;
        let start_y = min_y.max(0) as usize;
        let end_y = (max_y.min(framebuffer.buffer_height as i32 - 1)) as usize;

        // Rows are independent: depth is atomic, colour writes are striped.
        (start_y..=end_y).into_par_iter().for_each(|y| {
            for x in start_x..=end_x {
                let pixel_center = Point2::new(x as f32 + 0.5, y as f32 + 0.5);

                let Some(bary) = barycentric_coordinates(
                    pixel_center,
                    screen_coords[0],
                    screen_coords[1],
                    screen_coords[2],
                ) else {
                    continue;
                };

                if !is_inside_triangle(bary) {
                    continue;
                }

                let Some(corrected_bary) =
                    perspective_correct_barycentric(bary, w_values[0], w_values[1], w_values[2])
                else {
                    continue;
                };

                let z_ndc = corrected_bary.x * clip_coords[0].z
                    + corrected_bary.y * clip_coords[1].z
                    + corrected_bary.z * clip_coords[2].z;
                let depth = z_ndc * 0.5 + 0.5;

                if framebuffer.depth_test_and_update(x, y, depth) {
                    let interpolated_varying = varyings[0] * corrected_bary.x
                        + varyings[1] * corrected_bary.y
                        + varyings[2] * corrected_bary.z;

                    let color = shader.fragment(interpolated_varying);
                    framebuffer.set_pixel_safe(x, y, color);
                }
            }
        });
    }

    fn compute_bounding_box(&self, points: &[Point2<f32>; 3]) -> (i32, i32, i32, i32) {
        let min_x = points[0].x.min(points[1].x).min(points[2].x).floor() as i32;
        let min_y = points[0].y.min(points[1].y).min(points[2].y).floor() as i32;
        let max_x = points[0].x.max(points[1].x).max(points[2].x).ceil() as i32;
        let max_y = points[0].y.max(points[1].y).max(points[2].y).ceil() as i32;
        (min_x, min_y, max_x, max_y)
    }
}

use crate::core::pipeline::{Shader, VertexInput};
use crate::io::image::ImageData;
use nalgebra::{Matrix4, Vector2, Vector3, Vector4};

/// A texture held in device memory as linear RGB floats.
#[derive(Debug, Clone)]
pub struct SoftwareTexture {
    pub width: u32,
    pub height: u32,
    texels: Vec<Vector3<f32>>,
}

impl SoftwareTexture {
    pub fn from_image(image: &ImageData) -> Self {
        let channels = image.channels as usize;
        let texels = image
            .pixels
            .chunks_exact(channels)
            .map(|px| {
                let (r, g, b) = match channels {
                    1 => (px[0], px[0], px[0]),
                    _ => (px[0], px[1], px[2]),
                };
                Vector3::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
            })
            .collect();

        Self {
            width: image.width,
            height: image.height,
            texels,
        }
    }

    /// Samples the texture using Bilinear Interpolation.
    /// UV coordinates are in [0.0, 1.0].
    pub fn sample(&self, u: f32, v: f32) -> Vector3<f32> {
        if self.texels.is_empty() {
            return Vector3::new(1.0, 1.0, 1.0);
        }

        // Repeat mode: u=1.5 -> 0.5, u=-0.5 -> 0.5
        let u = u.rem_euclid(1.0);
        let v = v.rem_euclid(1.0);

        // -0.5 because pixel centers are at 0.5
        let x = u * self.width as f32 - 0.5;
        let y = (1.0 - v) * self.height as f32 - 0.5; // Flip V for standard UV

        let x0 = x.floor() as i32;
        let y0 = y.floor() as i32;
        let wx = x - x.floor();
        let wy = y - y.floor();

        let c00 = self.texel_wrapped(x0, y0);
        let c10 = self.texel_wrapped(x0 + 1, y0);
        let c01 = self.texel_wrapped(x0, y0 + 1);
        let c11 = self.texel_wrapped(x0 + 1, y0 + 1);

        let top = c00 * (1.0 - wx) + c10 * wx;
        let bottom = c01 * (1.0 - wx) + c11 * wx;
        top * (1.0 - wy) + bottom * wy
    }

    fn texel_wrapped(&self, x: i32, y: i32) -> Vector3<f32> {
        let x = x.rem_euclid(self.width as i32) as usize;
        let y = y.rem_euclid(self.height as i32) as usize;
        self.texels[y * self.width as usize + x]
    }
}

/// Fragment colour comes from the vertex stream (or a constant written into it).
pub struct ColorShader {
    pub mvp: Matrix4<f32>,
}

impl Shader for ColorShader {
    type Varying = Vector3<f32>;

    fn vertex(&self, input: &VertexInput) -> (Vector4<f32>, Self::Varying) {
        (self.mvp * input.position.to_homogeneous(), input.color)
    }

    fn fragment(&self, varying: Self::Varying) -> Vector3<f32> {
        varying
    }
}

/// Fragment colour is read from a texture. An empty unit samples as white.
pub struct TexturedShader<'a> {
    pub mvp: Matrix4<f32>,
    pub texture: Option<&'a SoftwareTexture>,
}

impl Shader for TexturedShader<'_> {
    type Varying = Vector2<f32>;

    fn vertex(&self, input: &VertexInput) -> (Vector4<f32>, Self::Varying) {
        (self.mvp * input.position.to_homogeneous(), input.texcoord)
    }

    fn fragment(&self, uv: Self::Varying) -> Vector3<f32> {
        match self.texture {
            Some(texture) => texture.sample(uv.x, uv.y),
            None => Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    fn checker() -> SoftwareTexture {
        // 2x1: black | white
        SoftwareTexture::from_image(&ImageData {
            width: 2,
            height: 1,
            channels: 1,
            pixels: vec![0, 255],
        })
    }

    #[test]
    fn samples_texel_centres_exactly() {
        let tex = checker();
        assert_relative_eq!(tex.sample(0.25, 0.5), Vector3::zeros(), epsilon = 1e-6);
        assert_relative_eq!(tex.sample(0.75, 0.5), Vector3::new(1.0, 1.0, 1.0), epsilon = 1e-6);
    }

    #[test]
    fn sampling_wraps_around() {
        let tex = checker();
        assert_relative_eq!(tex.sample(1.25, 0.5), tex.sample(0.25, 0.5), epsilon = 1e-6);
        assert_relative_eq!(tex.sample(-0.25, 0.5), tex.sample(0.75, 0.5), epsilon = 1e-6);
        // Halfway between the two texel centres
        assert_relative_eq!(tex.sample(0.5, 0.5).x, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn color_shader_forwards_vertex_color() {
        let shader = ColorShader {
            mvp: Matrix4::identity(),
        };
        let input = VertexInput {
            position: Point3::new(0.5, 0.0, 0.0),
            color: Vector3::new(0.0, 1.0, 0.0),
            ..Default::default()
        };
        let (clip, varying) = shader.vertex(&input);
        assert_relative_eq!(clip, Vector4::new(0.5, 0.0, 0.0, 1.0));
        assert_eq!(shader.fragment(varying), Vector3::new(0.0, 1.0, 0.0));
    }
}

use nalgebra::{Point2, Vector3};

const EPSILON: f32 = 1e-5;

/// Weights of `p` relative to the screen-space triangle `(v1, v2, v3)`,
/// or `None` for a triangle with (almost) no area.
pub fn barycentric_coordinates(
    p: Point2<f32>,
    v1: Point2<f32>,
    v2: Point2<f32>,
    v3: Point2<f32>,
) -> Option<Vector3<f32>> {
    let e1 = v2 - v1;
    let e2 = v3 - v1;
    let d = p - v1;

    let det = e1.x * e2.y - e1.y * e2.x;
    if det.abs() < EPSILON {
        return None;
    }

    let beta = (d.x * e2.y - d.y * e2.x) / det;
    let gamma = (e1.x * d.y - e1.y * d.x) / det;
    Some(Vector3::new(1.0 - beta - gamma, beta, gamma))
}

#[inline(always)]
pub fn is_inside_triangle(bary: Vector3<f32>) -> bool {
    bary.min() >= -EPSILON
}

/// Re-weights screen-space barycentrics by the clip-space `w` of each
/// corner so attributes interpolate linearly in view space.
pub fn perspective_correct_barycentric(
    bary: Vector3<f32>,
    w1: f32,
    w2: f32,
    w3: f32,
) -> Option<Vector3<f32>> {
    let inv = |w: f32| if w.abs() > EPSILON { 1.0 / w } else { 1.0 };
    let weighted = bary.component_mul(&Vector3::new(inv(w1), inv(w2), inv(w3)));

    let sum = weighted.sum();
    if sum.abs() < EPSILON {
        return None;
    }
    Some(weighted / sum)
}

use crate::core::geometry::Vertex;
use crate::core::math::transform::TransformFactory;
use nalgebra::{Matrix4, Point3, Vector3};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb {
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<f32>>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = *points.next()?;
        let mut aabb = Aabb {
            min: first,
            max: first,
        };
        for p in points {
            aabb.grow(p);
        }
        Some(aabb)
    }

    pub fn grow(&mut self, p: &Point3<f32>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn extent(&self) -> Vector3<f32> {
        self.max - self.min
    }

    /// Transform that centres the box on the origin and scales its largest
    /// side to 1.8, so it fits in [-1, 1] with a little padding.
    pub fn normalize_transform(&self) -> Matrix4<f32> {
        let extent = self.extent();
        let max_dimension = extent.x.max(extent.y).max(extent.z);
        let scale = if max_dimension > 1e-6 {
            1.8 / max_dimension
        } else {
            1.0
        };

        TransformFactory::scaling_nonuniform(&Vector3::repeat(scale))
            * TransformFactory::translation(&-self.center().coords)
    }
}

/// Fills in per-vertex tangents and bitangents from the UV layout of the
/// triangles that use each vertex (accumulate, then Gram-Schmidt).
///
/// Vertices without usable UV gradients get an arbitrary basis perpendicular
/// to their normal.
pub fn compute_tangents(vertices: &mut [Vertex], indices: &[u32]) {
    let mut tangents = vec![Vector3::zeros(); vertices.len()];
    let mut bitangents = vec![Vector3::zeros(); vertices.len()];

    for tri in indices.chunks_exact(3) {
        let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if i0 >= vertices.len() || i1 >= vertices.len() || i2 >= vertices.len() {
            continue;
        }
        let (v0, v1, v2) = (&vertices[i0], &vertices[i1], &vertices[i2]);

        let e1 = v1.position - v0.position;
        let e2 = v2.position - v0.position;
        let d1 = v1.texcoord - v0.texcoord;
        let d2 = v2.texcoord - v0.texcoord;

        let det = d1.x * d2.y - d2.x * d1.y;
        if det.abs() < 1e-12 {
            continue;
        }
        let r = 1.0 / det;
        let t = (e1 * d2.y - e2 * d1.y) * r;
        let b = (e2 * d1.x - e1 * d2.x) * r;

        for i in [i0, i1, i2] {
            tangents[i] += t;
            bitangents[i] += b;
        }
    }

    for (i, vertex) in vertices.iter_mut().enumerate() {
        let n = vertex.normal;
        let t = tangents[i] - n * n.dot(&tangents[i]);

        let tangent = match t.try_normalize(1e-8) {
            Some(t) => t,
            None => fallback_tangent(&n),
        };
        let mut bitangent = n.cross(&tangent);
        // Keep the handedness the UVs imply.
        if bitangent.dot(&bitangents[i]) < 0.0 {
            bitangent = -bitangent;
        }

        vertex.tangent = tangent;
        vertex.bitangent = bitangent;
    }
}

fn fallback_tangent(n: &Vector3<f32>) -> Vector3<f32> {
    let helper = if n.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    (helper - n * n.dot(&helper))
        .try_normalize(1e-8)
        .unwrap_or_else(Vector3::x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector2;

    #[test]
    fn normalize_transform_fits_box_in_unit_cube() {
        let aabb = Aabb::from_points(&[Point3::new(2.0, 0.0, 0.0), Point3::new(6.0, 2.0, 1.0)])
            .unwrap();
        let m = aabb.normalize_transform();

        let lo = m.transform_point(&aabb.min);
        let hi = m.transform_point(&aabb.max);
        assert_relative_eq!(hi.x - lo.x, 1.8, epsilon = 1e-5);
        assert_relative_eq!(m.transform_point(&aabb.center()), Point3::origin(), epsilon = 1e-5);
    }

    #[test]
    fn empty_point_set_has_no_bounds() {
        assert!(Aabb::from_points(&[]).is_none());
    }

    #[test]
    fn union_covers_both() {
        let a = Aabb::from_points(&[Point3::new(0.0, 0.0, 0.0)]).unwrap();
        let b = Aabb::from_points(&[Point3::new(-1.0, 2.0, 3.0)]).unwrap();
        let u = a.union(&b);
        assert_eq!(u.min, Point3::new(-1.0, 0.0, 0.0));
        assert_eq!(u.max, Point3::new(0.0, 2.0, 3.0));
    }

    #[test]
    fn tangents_follow_uv_axes() {
        let n = Vector3::z();
        let mut vertices = vec![
            Vertex::new(Point3::new(0.0, 0.0, 0.0), n, Vector2::new(0.0, 0.0)),
            Vertex::new(Point3::new(1.0, 0.0, 0.0), n, Vector2::new(1.0, 0.0)),
            Vertex::new(Point3::new(0.0, 1.0, 0.0), n, Vector2::new(0.0, 1.0)),
        ];
        compute_tangents(&mut vertices, &[0, 1, 2]);

        for v in &vertices {
            assert_relative_eq!(v.tangent, Vector3::x(), epsilon = 1e-6);
            assert_relative_eq!(v.bitangent, Vector3::y(), epsilon = 1e-6);
        }
    }

    #[test]
    fn degenerate_uvs_still_give_an_orthonormal_basis() {
        let n = Vector3::y();
        let mut vertices = vec![
            Vertex::new(Point3::new(0.0, 0.0, 0.0), n, Vector2::zeros()),
            Vertex::new(Point3::new(1.0, 0.0, 0.0), n, Vector2::zeros()),
            Vertex::new(Point3::new(0.0, 0.0, 1.0), n, Vector2::zeros()),
        ];
        compute_tangents(&mut vertices, &[0, 1, 2]);
        for v in &vertices {
            assert_relative_eq!(v.tangent.norm(), 1.0, epsilon = 1e-6);
            assert!(v.tangent.dot(&n).abs() < 1e-6);
            assert!(v.bitangent.dot(&v.tangent).abs() < 1e-6);
        }
    }
}

//! Planar Delaunay triangulation of 2.5D point sets.

use nalgebra::{Matrix3, Point2, Point3, SymmetricEigen, Vector3};
use std::collections::HashMap;

/// Least-squares plane through a point set.
///
/// `u`, `v` and `normal` form a right-handed orthonormal frame
/// (`u × v == normal`); `u` follows the direction of largest spread.
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    pub centroid: Point3<f64>,
    pub u: Vector3<f64>,
    pub v: Vector3<f64>,
    pub normal: Vector3<f64>,
}

impl Plane {
    pub fn project(&self, p: &Point3<f64>) -> Point2<f64> {
        let d = p - self.centroid;
        Point2::new(d.dot(&self.u), d.dot(&self.v))
    }

    /// Same plane seen from the other side.
    pub fn flipped(&self) -> Self {
        Self {
            centroid: self.centroid,
            u: self.u,
            v: -self.v,
            normal: -self.normal,
        }
    }
}

/// Fit the dominant plane by PCA. `None` for an empty input.
pub fn fit_plane(points: &[Point3<f32>]) -> Option<Plane> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let centroid = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords.cast::<f64>())
        / n;

    let mut cov = Matrix3::<f64>::zeros();
    for p in points {
        let d = p.coords.cast::<f64>() - centroid;
        cov += d * d.transpose();
    }
    cov /= n;

    let eigen = SymmetricEigen::new(cov);

    // Find smallest and largest eigenvalue explicitly
    let mut min_idx = 0;
    let mut max_idx = 0;
    for i in 1..3 {
        if eigen.eigenvalues[i] < eigen.eigenvalues[min_idx] {
            min_idx = i;
        }
        if eigen.eigenvalues[i] >= eigen.eigenvalues[max_idx] {
            max_idx = i;
        }
    }
    if min_idx == max_idx {
        // Isotropic spread, any frame will do.
        max_idx = (min_idx + 1) % 3;
    }

    let mut normal: Vector3<f64> = eigen.eigenvectors.column(min_idx).into_owned();
    // Sign convention: largest component of the normal is positive.
    let imax = normal.iamax();
    if normal[imax] < 0.0 {
        normal = -normal;
    }
    let u: Vector3<f64> = eigen.eigenvectors.column(max_idx).into_owned();
    let u = (u - normal * normal.dot(&u)).normalize();
    let v = normal.cross(&u);

    Some(Plane {
        centroid: Point3::from(centroid),
        u,
        v,
        normal,
    })
}

#[derive(Debug, Clone, Copy)]
struct Triangle {
    v: [usize; 3],
    center: Point2<f64>,
    radius_sq: f64,
}

impl Triangle {
    fn new(v: [usize; 3], pts: &[Point2<f64>]) -> Self {
        let (a, b, c) = (pts[v[0]], pts[v[1]], pts[v[2]]);
        let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
        let a2 = a.coords.norm_squared();
        let b2 = b.coords.norm_squared();
        let c2 = c.coords.norm_squared();
        // Degenerate triangles get a NaN circle and are never invalidated.
        let center = Point2::new(
            (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d,
            (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d,
        );
        Self {
            v,
            center,
            radius_sq: (a - center).norm_squared(),
        }
    }

    fn circumcircle_contains(&self, p: &Point2<f64>) -> bool {
        (p - self.center).norm_squared() < self.radius_sq * (1.0 - 1e-10)
    }
}

#[inline]
fn orient(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Delaunay triangulation (Bowyer–Watson) of 2D points.
///
/// Points that coincide up to a tiny tolerance are inserted once; the first
/// occurrence represents them all. Returned triangles index into `points`,
/// are counter-clockwise and have non-zero area.
pub fn delaunay_2d(points: &[Point2<f64>]) -> Vec<[usize; 3]> {
    if points.len() < 3 {
        return Vec::new();
    }

    let (mut min, mut max) = (points[0], points[0]);
    for p in points {
        min = min.inf(p);
        max = max.sup(p);
    }
    let extent = (max - min).amax();
    if !(extent > 0.0) || !extent.is_finite() {
        return Vec::new();
    }

    // Representative input index for every distinct location.
    let quantum = extent * 1e-9;
    let mut seen: HashMap<(i64, i64), usize> = HashMap::new();
    let mut unique: Vec<usize> = Vec::new();
    for (i, p) in points.iter().enumerate() {
        let key = (
            ((p.x - min.x) / quantum).round() as i64,
            ((p.y - min.y) / quantum).round() as i64,
        );
        seen.entry(key).or_insert_with(|| {
            unique.push(i);
            i
        });
    }
    if unique.len() < 3 {
        return Vec::new();
    }

    // Working set: unique points followed by the super triangle.
    let mut pts: Vec<Point2<f64>> = unique.iter().map(|&i| points[i]).collect();
    let n = pts.len();
    let mid = nalgebra::center(&min, &max);
    pts.push(Point2::new(mid.x - 20.0 * extent, mid.y - extent));
    pts.push(Point2::new(mid.x, mid.y + 20.0 * extent));
    pts.push(Point2::new(mid.x + 20.0 * extent, mid.y - extent));

    let mut triangles = vec![Triangle::new([n, n + 1, n + 2], &pts)];

    for i in 0..n {
        let p = pts[i];
        let mut edges: Vec<[usize; 2]> = Vec::new();
        triangles.retain(|t| {
            if t.circumcircle_contains(&p) {
                edges.push([t.v[0], t.v[1]]);
                edges.push([t.v[1], t.v[2]]);
                edges.push([t.v[2], t.v[0]]);
                false
            } else {
                true
            }
        });

        // The cavity boundary is made of edges owned by a single bad triangle.
        let mut counts: HashMap<[usize; 2], usize> = HashMap::with_capacity(edges.len());
        for e in &edges {
            *counts.entry([e[0].min(e[1]), e[0].max(e[1])]).or_insert(0) += 1;
        }
        for e in edges {
            if counts[&[e[0].min(e[1]), e[0].max(e[1])]] == 1 {
                triangles.push(Triangle::new([e[0], e[1], i], &pts));
            }
        }
    }

    triangles
        .into_iter()
        .filter(|t| t.v.iter().all(|&v| v < n))
        .filter_map(|t| {
            let [a, b, c] = t.v;
            let area2 = orient(&pts[a], &pts[b], &pts[c]);
            let tolerance = 1e-12 * extent * extent;
            if area2 > tolerance {
                Some([unique[a], unique[b], unique[c]])
            } else if area2 < -tolerance {
                Some([unique[a], unique[c], unique[b]])
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_gives_two_triangles() {
        let pts = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        let tris = delaunay_2d(&pts);
        assert_eq!(tris.len(), 2);
        for [a, b, c] in tris {
            assert!(orient(&pts[a], &pts[b], &pts[c]) > 0.0);
        }
    }

    #[test]
    fn test_collinear_and_duplicate_inputs() {
        let line: Vec<_> = (0..6).map(|i| Point2::new(i as f64, 2.0 * i as f64)).collect();
        assert!(delaunay_2d(&line).is_empty());

        let dupes = vec![Point2::new(1.0, 1.0); 5];
        assert!(delaunay_2d(&dupes).is_empty());

        let mut tri = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
        ];
        tri.push(tri[1]);
        let tris = delaunay_2d(&tri);
        assert_eq!(tris.len(), 1);
        let mut corners = tris[0];
        corners.sort_unstable();
        assert_eq!(corners, [0, 1, 2]);
    }

    #[test]
    fn test_plane_fit_recovers_normal() {
        let pts: Vec<_> = (0..20)
            .map(|i| Point3::new((i % 5) as f32, 2.0, (i / 5) as f32 * 0.5))
            .collect();
        let plane = fit_plane(&pts).unwrap();
        assert!((plane.normal - Vector3::y()).norm() < 1e-9);
        assert!((plane.u.cross(&plane.v) - plane.normal).norm() < 1e-9);
    }
}

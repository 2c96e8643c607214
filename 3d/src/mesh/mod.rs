//! Point cloud to triangle mesh conversion.

pub mod triangulation;

use nalgebra::{Point2, Point3, Vector3};
use scan_core::{Error, PointCloud, Result, TriangleMesh};
use serde::{Deserialize, Serialize};
use tracing::debug;

use triangulation::{delaunay_2d, fit_plane};

/// Normal given to vertices that no triangle contributes to.
pub const UP: Vector3<f32> = Vector3::new(0.0, 1.0, 0.0);

/// How downsampled vertices are connected into triangles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Triangulation {
    /// Delaunay triangulation in the cloud's dominant plane.
    #[default]
    Delaunay,
    /// Consecutive vertex triples `(0, 1, 2), (3, 4, 5), …` regardless of
    /// geometry.
    Sequential,
}

#[derive(Debug, Clone, Copy)]
pub struct MeshGenerator {
    pub stride: usize,
    pub triangulation: Triangulation,
    /// Triangles with a longer edge are dropped (Delaunay only).
    pub max_edge_length: Option<f32>,
}

impl Default for MeshGenerator {
    fn default() -> Self {
        Self {
            stride: 5,
            triangulation: Triangulation::Delaunay,
            max_edge_length: None,
        }
    }
}

impl MeshGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_triangulation(mut self, triangulation: Triangulation) -> Self {
        self.triangulation = triangulation;
        self
    }

    pub fn with_max_edge_length(mut self, max_edge_length: Option<f32>) -> Self {
        self.max_edge_length = max_edge_length;
        self
    }

    /// Mesh every `stride`-th point of `cloud`.
    ///
    /// Vertices are the kept points in cloud order. The result may have no
    /// triangles at all (fewer than three vertices, or collinear input).
    pub fn generate(&self, cloud: &PointCloud) -> Result<TriangleMesh> {
        if self.stride == 0 {
            return Err(Error::InvalidInput("Mesh stride must be >= 1".to_string()));
        }

        let picked: Vec<usize> = (0..cloud.len()).step_by(self.stride).collect();
        let sampled = cloud.select(&picked);

        let indices = match self.triangulation {
            Triangulation::Sequential => sequential_triples(sampled.len()),
            Triangulation::Delaunay => self.delaunay_triangles(&sampled),
        };

        let normals = compute_vertex_normals(&sampled.points, &indices);
        let mesh = TriangleMesh::new(sampled.points, normals, indices)?;
        debug!(
            vertices = mesh.num_vertices(),
            triangles = mesh.num_triangles(),
            triangulation = ?self.triangulation,
            "mesh generated"
        );
        Ok(mesh)
    }

    fn delaunay_triangles(&self, sampled: &PointCloud) -> Vec<u32> {
        let Some(mut plane) = fit_plane(&sampled.points) else {
            return Vec::new();
        };
        if let Some(normals) = &sampled.normals {
            let mean: Vector3<f64> = normals.iter().map(|n| n.cast::<f64>()).sum();
            if mean.dot(&plane.normal) < 0.0 {
                plane = plane.flipped();
            }
        }

        let projected: Vec<Point2<f64>> = sampled
            .points
            .iter()
            .map(|p| plane.project(&p.cast::<f64>()))
            .collect();

        let max_sq = self.max_edge_length.map(|l| l * l);
        delaunay_2d(&projected)
            .into_iter()
            .filter(|&[a, b, c]| match max_sq {
                Some(limit) => {
                    let p = &sampled.points;
                    (p[a] - p[b]).norm_squared() <= limit
                        && (p[b] - p[c]).norm_squared() <= limit
                        && (p[c] - p[a]).norm_squared() <= limit
                }
                None => true,
            })
            .flat_map(|[a, b, c]| [a as u32, b as u32, c as u32])
            .collect()
    }
}

fn sequential_triples(n: usize) -> Vec<u32> {
    (0..n)
        .step_by(3)
        .take_while(|&i| i + 2 < n)
        .flat_map(|i| [i as u32, i as u32 + 1, i as u32 + 2])
        .collect()
}

/// Area-independent vertex normals: the unit face normals of all adjacent,
/// non-degenerate triangles are summed and renormalized. Vertices without a
/// usable sum get [`UP`].
pub fn compute_vertex_normals(vertices: &[Point3<f32>], indices: &[u32]) -> Vec<Vector3<f32>> {
    let mut sums: Vec<Vector3<f32>> = vec![Vector3::zeros(); vertices.len()];

    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let cross = (vertices[b] - vertices[a]).cross(&(vertices[c] - vertices[a]));
        if let Some(face_normal) = cross.try_normalize(f32::EPSILON) {
            sums[a] += face_normal;
            sums[b] += face_normal;
            sums[c] += face_normal;
        }
    }

    sums.into_iter()
        .map(|n| n.try_normalize(1e-6).unwrap_or(UP))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_triples() {
        assert_eq!(sequential_triples(2), Vec::<u32>::new());
        assert_eq!(sequential_triples(3), vec![0, 1, 2]);
        assert_eq!(sequential_triples(8), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_vertex_normals_default_to_up() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(5.0, 5.0, 5.0),
        ];
        let normals = compute_vertex_normals(&vertices, &[0, 1, 2]);
        assert!((normals[0] - Vector3::z()).norm() < 1e-6);
        assert_eq!(normals[3], UP);

        // Degenerate face contributes nothing.
        let normals = compute_vertex_normals(&vertices, &[0, 0, 1]);
        assert!(normals.iter().all(|n| *n == UP));
    }

    #[test]
    fn test_zero_stride_is_rejected() {
        let cloud = PointCloud::new(vec![Point3::origin(); 3]);
        let err = MeshGenerator::new().with_stride(0).generate(&cloud);
        assert!(matches!(err, Err(Error::InvalidInput(_))));
    }
}

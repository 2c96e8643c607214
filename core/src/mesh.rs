//! Triangle mesh and its axis-aligned bounds.

use crate::{Error, Result};
use nalgebra::{Point2, Point3, Vector3};
use std::path::{Path, PathBuf};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl BoundingBox {
    /// Bounds of `points`; a zero box at the origin when empty.
    pub fn from_points(points: &[Point3<f32>]) -> Self {
        let Some(first) = points.first() else {
            return Self {
                min: Point3::origin(),
                max: Point3::origin(),
            };
        };

        let mut min = *first;
        let mut max = *first;
        for p in points {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }
        Self { min, max }
    }

    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    /// Zero for planar, linear or empty inputs.
    pub fn volume(&self) -> f64 {
        let s = self.size();
        s.x as f64 * s.y as f64 * s.z as f64
    }

    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn contains(&self, p: &Point3<f32>) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }
}

/// Indexed triangle mesh with one normal per vertex.
///
/// Invariants: `indices.len() % 3 == 0`, every index is `< vertices.len()`,
/// `normals.len() == vertices.len()`.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangleMesh {
    vertices: Vec<Point3<f32>>,
    normals: Vec<Vector3<f32>>,
    indices: Vec<u32>,
    tex_coords: Option<Vec<Point2<f32>>>,
    export_locations: Vec<PathBuf>,
}

impl TriangleMesh {
    pub fn new(
        vertices: Vec<Point3<f32>>,
        normals: Vec<Vector3<f32>>,
        indices: Vec<u32>,
    ) -> Result<Self> {
        if indices.len() % 3 != 0 {
            return Err(Error::InvalidInput(format!(
                "Triangle index count {} is not a multiple of 3",
                indices.len()
            )));
        }
        if normals.len() != vertices.len() {
            return Err(Error::InvalidInput(format!(
                "Normal count {} does not match vertex count {}",
                normals.len(),
                vertices.len()
            )));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(Error::InvalidInput(format!(
                "Triangle index {} out of range for {} vertices",
                bad,
                vertices.len()
            )));
        }
        Ok(Self {
            vertices,
            normals,
            indices,
            tex_coords: None,
            export_locations: Vec::new(),
        })
    }

    pub fn empty() -> Self {
        Self {
            vertices: Vec::new(),
            normals: Vec::new(),
            indices: Vec::new(),
            tex_coords: None,
            export_locations: Vec::new(),
        }
    }

    pub fn with_tex_coords(mut self, tex_coords: Vec<Point2<f32>>) -> Result<Self> {
        if tex_coords.len() != self.vertices.len() {
            return Err(Error::InvalidInput(format!(
                "Texture coordinate count {} does not match vertex count {}",
                tex_coords.len(),
                self.vertices.len()
            )));
        }
        self.tex_coords = Some(tex_coords);
        Ok(self)
    }

    pub fn vertices(&self) -> &[Point3<f32>] {
        &self.vertices
    }

    pub fn normals(&self) -> &[Vector3<f32>] {
        &self.normals
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn tex_coords(&self) -> Option<&[Point2<f32>]> {
        self.tex_coords.as_deref()
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Index triples of every triangle.
    pub fn triangles(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        self.indices
            .chunks_exact(3)
            .map(|t| [t[0] as usize, t[1] as usize, t[2] as usize])
    }

    /// Corner positions of every triangle.
    pub fn triangle_vertices(&self) -> impl Iterator<Item = [Point3<f32>; 3]> + '_ {
        self.triangles()
            .map(|[a, b, c]| [self.vertices[a], self.vertices[b], self.vertices[c]])
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(&self.vertices)
    }

    /// Files this mesh has been written to, oldest first.
    pub fn export_locations(&self) -> &[PathBuf] {
        &self.export_locations
    }

    pub fn record_export(&mut self, path: impl AsRef<Path>) {
        self.export_locations.push(path.as_ref().to_path_buf());
    }
}

impl Default for TriangleMesh {
    fn default() -> Self {
        Self::empty()
    }
}

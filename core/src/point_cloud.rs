use nalgebra::{Point3, Vector3};

/// A single sample of a [`PointCloud`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point3D {
    pub position: Point3<f32>,
    pub normal: Option<Vector3<f32>>,
    pub color: Option<Point3<f32>>,
}

/// Ordered point samples with optional per-point colors and normals.
///
/// Optional columns are either absent or exactly as long as `points`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    pub points: Vec<Point3<f32>>,
    pub colors: Option<Vec<Point3<f32>>>,
    pub normals: Option<Vec<Vector3<f32>>>,
}

impl PointCloud {
    pub fn new(points: Vec<Point3<f32>>) -> Self {
        Self {
            points,
            colors: None,
            normals: None,
        }
    }

    pub fn with_colors(mut self, colors: Vec<Point3<f32>>) -> crate::Result<Self> {
        if colors.len() == self.points.len() {
            self.colors = Some(colors);
            Ok(self)
        } else {
            Err(crate::Error::InvalidInput(format!(
                "Color count {} does not match point count {}",
                colors.len(),
                self.points.len()
            )))
        }
    }

    pub fn with_normals(mut self, normals: Vec<Vector3<f32>>) -> crate::Result<Self> {
        if normals.len() == self.points.len() {
            self.normals = Some(normals);
            Ok(self)
        } else {
            Err(crate::Error::InvalidInput(format!(
                "Normal count {} does not match point count {}",
                normals.len(),
                self.points.len()
            )))
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn point(&self, index: usize) -> Option<Point3D> {
        let position = *self.points.get(index)?;
        Some(Point3D {
            position,
            normal: self.normals.as_ref().map(|n| n[index]),
            color: self.colors.as_ref().map(|c| c[index]),
        })
    }

    /// Append another cloud. An optional column survives only if both sides
    /// carry it (or `self` was empty).
    pub fn append(&mut self, other: PointCloud) {
        if self.points.is_empty() {
            *self = other;
            return;
        }
        self.colors = match (self.colors.take(), other.colors) {
            (Some(mut a), Some(b)) => {
                a.extend(b);
                Some(a)
            }
            _ => None,
        };
        self.normals = match (self.normals.take(), other.normals) {
            (Some(mut a), Some(b)) => {
                a.extend(b);
                Some(a)
            }
            _ => None,
        };
        self.points.extend(other.points);
    }

    /// New cloud holding the points at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> PointCloud {
        PointCloud {
            points: indices.iter().map(|&i| self.points[i]).collect(),
            colors: self
                .colors
                .as_ref()
                .map(|c| indices.iter().map(|&i| c[i]).collect()),
            normals: self
                .normals
                .as_ref()
                .map(|n| indices.iter().map(|&i| n[i]).collect()),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Point3D> + '_ {
        (0..self.len()).filter_map(move |i| self.point(i))
    }
}

use crate::{BoundingBox, Error, ReconstructionMethod, Result};

/// Summary statistics of a reconstructed mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityMetrics {
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub surface_area: f64,
    /// Volume of the axis-aligned bounding box.
    pub volume: f64,
    /// Vertices per unit of bounding-box volume. `None` when the box has no
    /// positive volume (planar, linear or empty meshes).
    pub density: Option<f64>,
    pub average_edge_length: f64,
    pub reconstruction_method: ReconstructionMethod,
    pub bounding_box: BoundingBox,
}

impl QualityMetrics {
    pub fn require_density(&self) -> Result<f64> {
        self.density.ok_or_else(|| {
            Error::DegenerateGeometry(format!(
                "Density is undefined for a bounding box of volume {}",
                self.volume
            ))
        })
    }
}

use scan_core::{QualityMetrics, ReconstructionMethod, TriangleMesh};
use tracing::warn;

/// Compute size and sampling statistics of `mesh`.
///
/// Shared edges are counted once per adjacent triangle when averaging edge
/// lengths.
pub fn analyze(mesh: &TriangleMesh, method: ReconstructionMethod) -> QualityMetrics {
    let mut surface_area = 0.0f64;
    let mut edge_sum = 0.0f64;

    for [a, b, c] in mesh.triangle_vertices() {
        let (a, b, c) = (a.cast::<f64>(), b.cast::<f64>(), c.cast::<f64>());
        let e1 = b - a;
        let e2 = c - a;
        surface_area += 0.5 * e1.cross(&e2).norm();
        edge_sum += e1.norm() + (c - b).norm() + e2.norm();
    }

    let triangle_count = mesh.num_triangles();
    let average_edge_length = if triangle_count == 0 {
        0.0
    } else {
        edge_sum / (3 * triangle_count) as f64
    };

    let bounding_box = mesh.bounding_box();
    let volume = bounding_box.volume();
    let density = if volume > 0.0 && volume.is_finite() {
        Some(mesh.num_vertices() as f64 / volume)
    } else {
        if mesh.num_vertices() > 0 {
            warn!(volume, "bounding box has no volume, density undefined");
        }
        None
    };

    QualityMetrics {
        vertex_count: mesh.num_vertices(),
        triangle_count,
        surface_area,
        volume,
        density,
        average_edge_length,
        reconstruction_method: method,
        bounding_box,
    }
}

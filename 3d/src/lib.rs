//! Surface reconstruction from point clouds and mesh quality analysis.

pub mod mesh;
pub mod quality;

pub use mesh::triangulation::{delaunay_2d, fit_plane, Plane};
pub use mesh::{compute_vertex_normals, MeshGenerator, Triangulation, UP};
pub use quality::analyze;

pub use scan_core::{
    BoundingBox, Error, PointCloud, QualityMetrics, ReconstructionMethod, Result, TriangleMesh,
};

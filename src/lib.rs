//! Scene reconstruction from camera frames.
//!
//! Frames carrying either a rectified stereo pair or a sensor depth map are
//! streamed into a [`ReconstructionSession`]. Each frame is turned into
//! world-space points in the background; finalizing removes outliers,
//! triangulates a mesh, measures it and optionally writes it as OBJ or STL.
//!
//! The stages are also usable on their own through the re-exported crates.

pub use scan_3d as geometry;
pub use scan_core as core;
pub use scan_io as io;
pub use scan_point_cloud as point_cloud;
pub use scan_session as session;
pub use scan_stereo as stereo;

pub use scan_core::{
    CameraIntrinsics, CameraObservation, DepthMap, Error, PointCloud, Pose, QualityMetrics,
    ReconstructionMethod, Result, TriangleMesh,
};
pub use scan_io::MeshFormat;
pub use scan_session::{ReconstructionConfig, ReconstructionSession, SessionEvent, SessionState};

/// Initialize a single global Rayon thread pool for all CPU-parallel stages.
///
/// Repeated calls are idempotent and return the first initialization result.
///
/// Priority order:
/// 1. explicit `num_threads`
/// 2. `SCANMESH_CPU_THREADS` env var
/// 3. Rayon default
pub fn init_thread_pool(num_threads: Option<usize>) -> Result<()> {
    scan_core::init_global_thread_pool(num_threads)
}

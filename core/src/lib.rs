//! Shared data model for the scanmesh reconstruction pipeline.

pub mod depth_map;
pub mod error;
pub mod geometry;
pub mod mesh;
pub mod observation;
pub mod point_cloud;
pub mod quality;
pub mod runtime;

pub use depth_map::DepthMap;
pub use error::{Error, Result};
pub use geometry::{CameraIntrinsics, Pose};
pub use mesh::{BoundingBox, TriangleMesh};
pub use observation::{CameraObservation, DepthSource, ReconstructionMethod};
pub use point_cloud::{Point3D, PointCloud};
pub use quality::QualityMetrics;
pub use runtime::{current_cpu_threads, init_global_thread_pool, CPU_THREADS_ENV};

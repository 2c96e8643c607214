//! Reconstruction sessions: frame ingestion, background depth estimation
//! and asynchronous finalization into a mesh.

pub mod config;
pub mod events;
pub mod pipeline;
pub mod session;

pub use config::{
    BackProjectionConfig, ExportTarget, MeshConfig, OutlierConfig, ReconstructionConfig,
    SessionConfig, StereoConfig,
};
pub use events::{SessionEvent, SessionState};
pub use pipeline::{process_frame, run_pipeline, Reconstruction};
pub use session::{export_mesh_async, ReconstructionSession};

pub use scan_core::{Error, Result};

//! The per-frame and finalize stages, free of any session state.

use crate::config::ReconstructionConfig;
use scan_3d::analyze;
use scan_core::{
    CameraObservation, Error, PointCloud, QualityMetrics, ReconstructionMethod, Result,
    TriangleMesh,
};
use scan_io::export_mesh;
use scan_point_cloud::PointCloudBuilder;
use scan_stereo::DepthEstimator;
use std::time::Instant;
use tracing::{debug, info};

/// Depth estimation followed by back-projection into world space.
pub fn process_frame(
    observation: &CameraObservation,
    estimator: &DepthEstimator,
    builder: &PointCloudBuilder,
) -> Result<PointCloud> {
    let depth = estimator.estimate(observation)?;
    Ok(builder.build_from_observation(observation, &depth))
}

/// Result of a successful finalize pass.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub mesh: TriangleMesh,
    pub metrics: QualityMetrics,
    pub filtered_points: usize,
}

/// Filter, mesh, analyze and (if configured) export `cloud`.
///
/// `progress` receives increasing values in `[0, 1]` and ends with `1.0` on
/// success.
pub fn run_pipeline(
    cloud: &PointCloud,
    method: ReconstructionMethod,
    config: &ReconstructionConfig,
    mut progress: impl FnMut(f32),
) -> Result<Reconstruction> {
    if cloud.is_empty() {
        return Err(Error::InvalidInput(
            "no valid depth pixels in any integrated frame".to_string(),
        ));
    }

    let start = Instant::now();
    progress(0.05);

    let filtered = config.outlier_filter().filter(cloud);
    debug!(
        input = cloud.len(),
        kept = filtered.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "outliers removed"
    );
    if filtered.is_empty() {
        return Err(Error::InvalidInput(
            "outlier filter removed every point".to_string(),
        ));
    }
    progress(0.4);

    let mut mesh = config.mesh_generator().generate(&filtered)?;
    if mesh.num_triangles() == 0 {
        return Err(Error::DegenerateGeometry(format!(
            "{} vertices produced no triangles",
            mesh.num_vertices()
        )));
    }
    progress(0.75);

    let metrics = analyze(&mesh, method);
    progress(0.85);

    if let Some(target) = &config.session.auto_export {
        let location = export_mesh(&mesh, target.format()?, &target.path)?;
        mesh.record_export(location);
    }
    progress(1.0);

    info!(
        vertices = metrics.vertex_count,
        triangles = metrics.triangle_count,
        surface_area = metrics.surface_area,
        method = %method,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "reconstruction finished"
    );

    Ok(Reconstruction {
        mesh,
        metrics,
        filtered_points: filtered.len(),
    })
}

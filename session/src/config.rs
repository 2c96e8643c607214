//! Reconstruction settings.
//!
//! Every section has defaults, so a JSON document only needs the fields it
//! changes:
//!
//! ```json
//! { "mesh": { "stride": 3 }, "session": { "min_frames": 5 } }
//! ```

use scan_3d::{MeshGenerator, Triangulation};
use scan_core::{Error, Result};
use scan_io::MeshFormat;
use scan_point_cloud::{PointCloudBuilder, StatisticalOutlierFilter};
use scan_stereo::{BlockMatcher, DepthEstimator};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionConfig {
    pub stereo: StereoConfig,
    pub back_projection: BackProjectionConfig,
    pub outlier: OutlierConfig,
    pub mesh: MeshConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StereoConfig {
    /// Matching window radius; 3 gives a 7x7 window.
    pub block_radius: u32,
    /// Number of disparities searched, starting at 0.
    pub max_disparity: u32,
    /// Depth assigned to zero-disparity matches.
    pub default_depth: f32,
}

impl Default for StereoConfig {
    fn default() -> Self {
        Self {
            block_radius: 3,
            max_disparity: 64,
            default_depth: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackProjectionConfig {
    pub max_range: f32,
    pub sample_colors: bool,
}

impl Default for BackProjectionConfig {
    fn default() -> Self {
        Self {
            max_range: 100.0,
            sample_colors: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    pub k: usize,
    pub stddev_multiplier: f64,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            k: 20,
            stddev_multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    pub stride: usize,
    pub triangulation: Triangulation,
    pub max_edge_length: Option<f32>,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            stride: 5,
            triangulation: Triangulation::Delaunay,
            max_edge_length: None,
        }
    }
}

/// Where a finalized mesh is written automatically. The format follows the
/// file extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportTarget {
    pub path: PathBuf,
}

impl ExportTarget {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn format(&self) -> Result<MeshFormat> {
        MeshFormat::from_path(&self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Integrated frames required before finalizing.
    pub min_frames: usize,
    /// Frames buffered ahead of depth estimation.
    pub queue_capacity: usize,
    /// Frames under depth estimation at the same time. Further frames wait
    /// in the queue, so at most `queue_capacity + max_in_flight` frames are
    /// held by a session.
    pub max_in_flight: usize,
    pub auto_export: Option<ExportTarget>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_frames: 10,
            queue_capacity: 100,
            max_in_flight: 4,
            auto_export: None,
        }
    }
}

impl ReconstructionConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::ParseError(format!("invalid reconstruction config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::RuntimeError(format!("failed to serialize config: {e}")))
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| -> Result<()> { Err(Error::InvalidInput(msg.to_string())) };

        if self.stereo.max_disparity == 0 {
            return invalid("stereo.max_disparity must be >= 1");
        }
        if !(self.stereo.default_depth.is_finite() && self.stereo.default_depth > 0.0) {
            return invalid("stereo.default_depth must be positive");
        }
        if !(self.back_projection.max_range > 0.0) {
            return invalid("back_projection.max_range must be positive");
        }
        let multiplier = self.outlier.stddev_multiplier;
        if !(multiplier.is_finite() && multiplier >= 0.0) {
            return invalid("outlier.stddev_multiplier must be finite and >= 0");
        }
        if self.mesh.stride == 0 {
            return invalid("mesh.stride must be >= 1");
        }
        if matches!(self.mesh.max_edge_length, Some(l) if !(l > 0.0)) {
            return invalid("mesh.max_edge_length must be positive");
        }
        if self.session.queue_capacity == 0 {
            return invalid("session.queue_capacity must be >= 1");
        }
        if self.session.max_in_flight == 0 {
            return invalid("session.max_in_flight must be >= 1");
        }
        if let Some(target) = &self.session.auto_export {
            target.format()?;
        }
        Ok(())
    }

    pub fn depth_estimator(&self) -> DepthEstimator {
        DepthEstimator::new(
            BlockMatcher::new()
                .with_block_radius(self.stereo.block_radius)
                .with_max_disparity(self.stereo.max_disparity),
        )
        .with_default_depth(self.stereo.default_depth)
    }

    pub fn point_cloud_builder(&self) -> PointCloudBuilder {
        PointCloudBuilder::new()
            .with_max_range(self.back_projection.max_range)
            .with_colors(self.back_projection.sample_colors)
    }

    pub fn outlier_filter(&self) -> StatisticalOutlierFilter {
        StatisticalOutlierFilter::new(self.outlier.k, self.outlier.stddev_multiplier)
    }

    pub fn mesh_generator(&self) -> MeshGenerator {
        MeshGenerator::new()
            .with_stride(self.mesh.stride)
            .with_triangulation(self.mesh.triangulation)
            .with_max_edge_length(self.mesh.max_edge_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReconstructionConfig::default();
        assert_eq!(config.stereo.block_radius, 3);
        assert_eq!(config.stereo.max_disparity, 64);
        assert_eq!(config.back_projection.max_range, 100.0);
        assert_eq!(config.outlier.k, 20);
        assert_eq!(config.mesh.stride, 5);
        assert_eq!(config.session.min_frames, 10);
        assert_eq!(config.session.queue_capacity, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ReconstructionConfig::from_json_str(
            r#"{ "mesh": { "stride": 3, "triangulation": "sequential" },
                 "session": { "min_frames": 2, "auto_export": { "path": "out/scan.obj" } } }"#,
        )
        .unwrap();
        assert_eq!(config.mesh.stride, 3);
        assert_eq!(config.mesh.triangulation, Triangulation::Sequential);
        assert_eq!(config.session.min_frames, 2);
        assert_eq!(config.session.queue_capacity, 100);
        assert_eq!(config.outlier.k, 20);
        assert_eq!(
            config.session.auto_export.as_ref().unwrap().format().unwrap(),
            MeshFormat::Obj
        );

        let json = config.to_json_string().unwrap();
        assert_eq!(ReconstructionConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for json in [
            r#"{ "mesh": { "stride": 0 } }"#,
            r#"{ "session": { "queue_capacity": 0 } }"#,
            r#"{ "stereo": { "max_disparity": 0 } }"#,
            r#"{ "outlier": { "stddev_multiplier": -0.5 } }"#,
            r#"{ "session": { "max_in_flight": 0 } }"#,
            r#"{ "back_projection": { "max_range": -1.0 } }"#,
            r#"{ "session": { "auto_export": { "path": "scan.fbx" } } }"#,
        ] {
            assert!(
                matches!(ReconstructionConfig::from_json_str(json), Err(Error::InvalidInput(_))),
                "{json}"
            );
        }
        assert!(matches!(
            ReconstructionConfig::from_json_str("{ not json"),
            Err(Error::ParseError(_))
        ));
    }
}

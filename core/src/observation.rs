//! Camera frames consumed by the reconstruction pipeline.

use crate::{CameraIntrinsics, DepthMap, Pose};
use image::GrayImage;
use serde::{Deserialize, Serialize};

/// How the depth of a reconstruction was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReconstructionMethod {
    SensorDepth,
    Stereo,
    Hybrid,
}

impl ReconstructionMethod {
    /// Combine the methods of two sets of frames.
    pub fn merge(self, other: ReconstructionMethod) -> ReconstructionMethod {
        if self == other {
            self
        } else {
            ReconstructionMethod::Hybrid
        }
    }
}

impl std::fmt::Display for ReconstructionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ReconstructionMethod::SensorDepth => "sensor-depth",
            ReconstructionMethod::Stereo => "stereo",
            ReconstructionMethod::Hybrid => "hybrid",
        };
        f.write_str(name)
    }
}

/// Where the depth of a frame comes from.
#[derive(Debug, Clone)]
pub enum DepthSource {
    /// Rectified right image captured `baseline` units to the right of the
    /// reference camera.
    Stereo { image_right: GrayImage, baseline: f64 },
    /// Depth field read directly from a depth sensor.
    Sensor(DepthMap),
}

/// One captured frame. Immutable once built.
#[derive(Debug, Clone)]
pub struct CameraObservation {
    image_left: GrayImage,
    depth_source: DepthSource,
    intrinsics: CameraIntrinsics,
    pose: Pose,
    timestamp: f64,
}

impl CameraObservation {
    pub fn stereo(
        image_left: GrayImage,
        image_right: GrayImage,
        baseline: f64,
        intrinsics: CameraIntrinsics,
        pose: Pose,
        timestamp: f64,
    ) -> Self {
        Self {
            image_left,
            depth_source: DepthSource::Stereo {
                image_right,
                baseline,
            },
            intrinsics,
            pose,
            timestamp,
        }
    }

    pub fn sensor(
        image_left: GrayImage,
        depth: DepthMap,
        intrinsics: CameraIntrinsics,
        pose: Pose,
        timestamp: f64,
    ) -> Self {
        Self {
            image_left,
            depth_source: DepthSource::Sensor(depth),
            intrinsics,
            pose,
            timestamp,
        }
    }

    pub fn image_left(&self) -> &GrayImage {
        &self.image_left
    }

    pub fn image_right(&self) -> Option<&GrayImage> {
        match &self.depth_source {
            DepthSource::Stereo { image_right, .. } => Some(image_right),
            DepthSource::Sensor(_) => None,
        }
    }

    pub fn depth_source(&self) -> &DepthSource {
        &self.depth_source
    }

    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn reconstruction_method(&self) -> ReconstructionMethod {
        match self.depth_source {
            DepthSource::Stereo { .. } => ReconstructionMethod::Stereo,
            DepthSource::Sensor(_) => ReconstructionMethod::SensorDepth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_merge() {
        use ReconstructionMethod::*;
        assert_eq!(Stereo.merge(Stereo), Stereo);
        assert_eq!(SensorDepth.merge(Stereo), Hybrid);
        assert_eq!(Hybrid.merge(SensorDepth), Hybrid);
        assert_eq!(Stereo.to_string(), "stereo");
    }

    #[test]
    fn test_observation_accessors() {
        let intrinsics = CameraIntrinsics::new_ideal(8, 6);
        let stereo = CameraObservation::stereo(
            GrayImage::new(8, 6),
            GrayImage::new(8, 6),
            0.1,
            intrinsics,
            Pose::identity(),
            0.5,
        );
        assert!(stereo.image_right().is_some());
        assert_eq!(stereo.reconstruction_method(), ReconstructionMethod::Stereo);
        assert_eq!(stereo.timestamp(), 0.5);

        let sensor = CameraObservation::sensor(
            GrayImage::new(8, 6),
            DepthMap::filled(8, 6, 2.0),
            intrinsics,
            Pose::identity(),
            1.0,
        );
        assert!(sensor.image_right().is_none());
        assert_eq!(
            sensor.reconstruction_method(),
            ReconstructionMethod::SensorDepth
        );
    }
}

//! Depth estimation from disparity maps

use crate::{BlockMatcher, DisparityMap, Error, Result, StereoMatcher, StereoParams};
use scan_core::{CameraObservation, DepthMap, DepthSource};
use tracing::debug;

/// Depth assigned to pixels matched at zero disparity.
pub const DEFAULT_ZERO_DISPARITY_DEPTH: f32 = 1.0;

/// Convert a disparity map to metric depth.
///
/// Matched pixels with `d > 0` get `baseline * focal / d`, `d == 0` gets
/// `default_depth`, and unmatched pixels get `0.0`, which every consumer
/// treats as invalid.
pub fn disparity_to_depth_map(
    disparity: &DisparityMap,
    params: &StereoParams,
    default_depth: f32,
) -> DepthMap {
    let data = disparity
        .data
        .iter()
        .map(|&d| {
            if d < 0.0 {
                0.0
            } else if d == 0.0 {
                default_depth
            } else {
                params
                    .disparity_to_depth(d as f64)
                    .map_or(0.0, |z| z as f32)
            }
        })
        .collect();

    DepthMap {
        data,
        width: disparity.width,
        height: disparity.height,
    }
}

/// Turns a [`CameraObservation`] into a per-pixel depth map.
#[derive(Debug, Clone, Copy)]
pub struct DepthEstimator {
    pub matcher: BlockMatcher,
    pub default_depth: f32,
}

impl Default for DepthEstimator {
    fn default() -> Self {
        Self {
            matcher: BlockMatcher::default(),
            default_depth: DEFAULT_ZERO_DISPARITY_DEPTH,
        }
    }
}

impl DepthEstimator {
    pub fn new(matcher: BlockMatcher) -> Self {
        Self {
            matcher,
            ..Self::default()
        }
    }

    pub fn with_default_depth(mut self, depth: f32) -> Self {
        self.default_depth = depth;
        self
    }

    /// Depth for the observation's reference image.
    ///
    /// Stereo frames are block matched with the left focal length; sensor
    /// frames return their depth field unchanged.
    pub fn estimate(&self, observation: &CameraObservation) -> Result<DepthMap> {
        let left = observation.image_left();
        match observation.depth_source() {
            DepthSource::Stereo {
                image_right,
                baseline,
            } => {
                let disparity = self.matcher.compute(left, image_right)?;
                let params = StereoParams::new(observation.intrinsics().fx, *baseline);
                debug!(
                    matched = disparity.matched_count(),
                    pixels = disparity.data.len(),
                    "block matching complete"
                );
                Ok(disparity_to_depth_map(&disparity, &params, self.default_depth))
            }
            DepthSource::Sensor(depth) => {
                if depth.dimensions() != left.dimensions() {
                    return Err(Error::InvalidInput(format!(
                        "Sensor depth is {}x{} but the image is {}x{}",
                        depth.width,
                        depth.height,
                        left.width(),
                        left.height()
                    )));
                }
                Ok(depth.clone())
            }
        }
    }
}

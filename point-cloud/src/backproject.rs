use image::GrayImage;
use nalgebra::Point3;
use scan_core::{CameraIntrinsics, CameraObservation, DepthMap, PointCloud, Pose};
use tracing::warn;

/// Depths beyond this are treated as invalid by default.
pub const DEFAULT_MAX_RANGE: f32 = 100.0;

/// Converts depth maps into world-space points.
#[derive(Debug, Clone, Copy)]
pub struct PointCloudBuilder {
    pub max_range: f32,
    pub sample_colors: bool,
}

impl Default for PointCloudBuilder {
    fn default() -> Self {
        Self {
            max_range: DEFAULT_MAX_RANGE,
            sample_colors: true,
        }
    }
}

impl PointCloudBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_range(mut self, max_range: f32) -> Self {
        self.max_range = max_range;
        self
    }

    pub fn with_colors(mut self, sample_colors: bool) -> Self {
        self.sample_colors = sample_colors;
        self
    }

    /// Back-project every valid pixel of `depth`, in raster order.
    ///
    /// A pixel `(x, y)` with depth `z` maps to the camera-space point
    /// `((x - cx) * z / fx, (y - cy) * z / fy, z)`, then through `pose` into
    /// world space. When `color_source` is given (and color sampling is on)
    /// each point carries the gray level of its pixel scaled to `[0, 1]`.
    pub fn build(
        &self,
        depth: &DepthMap,
        intrinsics: &CameraIntrinsics,
        pose: &Pose,
        color_source: Option<&GrayImage>,
    ) -> PointCloud {
        let colors_from = color_source.filter(|_| self.sample_colors).and_then(|img| {
            if img.dimensions() == depth.dimensions() {
                Some(img)
            } else {
                warn!(
                    image = ?img.dimensions(),
                    depth = ?depth.dimensions(),
                    "color source size differs from depth map, skipping colors"
                );
                None
            }
        });

        let mut points = Vec::new();
        let mut colors = colors_from.map(|_| Vec::new());

        for y in 0..depth.height {
            for x in 0..depth.width {
                let z = depth.get(x, y);
                if !DepthMap::is_valid(z, self.max_range) {
                    continue;
                }

                let z = z as f64;
                let camera = Point3::new(
                    (x as f64 - intrinsics.cx) * z / intrinsics.fx,
                    (y as f64 - intrinsics.cy) * z / intrinsics.fy,
                    z,
                );
                let world = pose.transform_point(&camera);
                points.push(world.cast::<f32>());

                if let (Some(out), Some(img)) = (colors.as_mut(), colors_from) {
                    let intensity = img.get_pixel(x, y)[0] as f32 / 255.0;
                    out.push(Point3::new(intensity, intensity, intensity));
                }
            }
        }

        PointCloud {
            points,
            colors,
            normals: None,
        }
    }

    /// Back-project `depth` with the observation's camera, colored by its
    /// reference image.
    pub fn build_from_observation(
        &self,
        observation: &CameraObservation,
        depth: &DepthMap,
    ) -> PointCloud {
        self.build(
            depth,
            observation.intrinsics(),
            observation.pose(),
            Some(observation.image_left()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{UnitQuaternion, Vector3};

    #[test]
    fn test_skips_invalid_depths() {
        let depth = DepthMap::from_vec(4, 1, vec![0.0, -1.0, f32::NAN, 150.0]).unwrap();
        let intrinsics = CameraIntrinsics::new_ideal(4, 1);
        let cloud = PointCloudBuilder::new().build(&depth, &intrinsics, &Pose::identity(), None);
        assert!(cloud.is_empty());

        let cloud = PointCloudBuilder::new()
            .with_max_range(200.0)
            .build(&depth, &intrinsics, &Pose::identity(), None);
        assert_eq!(cloud.len(), 1);
    }

    #[test]
    fn test_pose_is_applied() {
        let depth = DepthMap::filled(1, 1, 2.0);
        let intrinsics = CameraIntrinsics::new(10.0, 10.0, 0.0, 0.0, 1, 1);
        let pose = Pose::new(
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), std::f64::consts::FRAC_PI_2),
            Vector3::new(1.0, 0.0, 0.0),
        );
        let cloud = PointCloudBuilder::new().build(&depth, &intrinsics, &pose, None);
        // (0, 0, 2) rotated 90 degrees about +y is (2, 0, 0).
        let p = cloud.points[0];
        assert!((p - Point3::new(3.0, 0.0, 0.0)).norm() < 1e-5);
    }

    #[test]
    fn test_colors_follow_pixels() {
        let depth = DepthMap::from_vec(2, 1, vec![0.0, 1.0]).unwrap();
        let img = GrayImage::from_raw(2, 1, vec![0, 255]).unwrap();
        let intrinsics = CameraIntrinsics::new_ideal(2, 1);
        let cloud =
            PointCloudBuilder::new().build(&depth, &intrinsics, &Pose::identity(), Some(&img));
        assert_eq!(cloud.colors, Some(vec![Point3::new(1.0, 1.0, 1.0)]));

        let plain = PointCloudBuilder::new()
            .with_colors(false)
            .build(&depth, &intrinsics, &Pose::identity(), Some(&img));
        assert!(plain.colors.is_none());
    }
}

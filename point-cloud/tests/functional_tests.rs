use nalgebra::{Point2, Point3, UnitQuaternion, Vector3};
use scan_core::{CameraIntrinsics, DepthMap, PointCloud, Pose};
use scan_point_cloud::*;

fn lcg(seed: &mut u64) -> f32 {
    *seed = seed
        .wrapping_mul(6_364_136_223_846_793_005)
        .wrapping_add(1_442_695_040_888_963_407);
    ((*seed >> 33) as f32) / (1u64 << 31) as f32
}

fn noisy_blob(n: usize, seed: u64) -> PointCloud {
    let mut s = seed;
    let points = (0..n)
        .map(|_| Point3::new(lcg(&mut s), lcg(&mut s), lcg(&mut s) * 0.2))
        .collect();
    PointCloud::new(points)
}

#[test]
fn test_back_projection_round_trip() {
    let intrinsics = CameraIntrinsics::new(120.0, 110.0, 8.0, 6.0, 16, 12);
    let pose = Pose::new(
        UnitQuaternion::from_euler_angles(0.05, 0.2, -0.1),
        Vector3::new(0.5, -0.25, 1.0),
    );
    let mut depth = DepthMap::new(16, 12);
    for y in 0..12 {
        for x in 0..16 {
            depth.set(x, y, 1.0 + 0.01 * (x + y) as f32);
        }
    }

    let cloud = PointCloudBuilder::new().build(&depth, &intrinsics, &pose, None);
    assert_eq!(cloud.len(), 16 * 12);

    let inverse = pose.inverse();
    for (i, p) in cloud.points.iter().enumerate() {
        let (x, y) = ((i % 16) as f64, (i / 16) as f64);
        let camera = inverse.transform_point(&p.cast::<f64>());
        let pixel = intrinsics.project(&camera).unwrap();
        assert!((pixel - Point2::new(x, y)).norm() < 1e-3);
        assert!((camera.z - depth.get(x as u32, y as u32) as f64).abs() < 1e-5);
    }
}

#[test]
fn test_filter_never_grows_the_cloud() {
    for seed in 1..6 {
        let cloud = noisy_blob(200, seed);
        let filtered = StatisticalOutlierFilter::default().filter(&cloud);
        assert!(filtered.len() <= cloud.len());
        assert!(filtered.points.iter().all(|p| cloud.points.contains(p)));
    }
}

#[test]
fn test_single_outlier_is_removed_exactly() {
    // 6x6 grid of inliers plus one far point.
    let mut points: Vec<_> = (0..6)
        .flat_map(|i| (0..6).map(move |j| Point3::new(i as f32 * 0.1, j as f32 * 0.1, 0.0)))
        .collect();
    points.push(Point3::new(50.0, 50.0, 50.0));
    let cloud = PointCloud::new(points);

    let (filtered, inliers) = StatisticalOutlierFilter::default().filter_with_indices(&cloud);
    assert_eq!(filtered.len(), 36);
    assert_eq!(inliers, (0..36).collect::<Vec<_>>());
}

#[test]
fn test_kdtree_matches_exhaustive_search() {
    let mut cloud = noisy_blob(300, 42);
    cloud.points.push(Point3::new(3.0, 3.0, 3.0));
    cloud.points.push(Point3::new(0.5, 0.5, 0.1));
    cloud.points.push(Point3::new(0.5, 0.5, 0.1));

    let tree = StatisticalOutlierFilter::default().with_search(NeighborSearch::KdTree);
    let brute = StatisticalOutlierFilter::default().with_search(NeighborSearch::Exhaustive);

    assert_eq!(
        tree.mean_neighbor_distances(&cloud.points, 20),
        brute.mean_neighbor_distances(&cloud.points, 20)
    );
    assert_eq!(
        tree.filter_with_indices(&cloud).1,
        brute.filter_with_indices(&cloud).1
    );
}

#[test]
fn test_attributes_follow_kept_points() {
    let mut points: Vec<_> = (0..40)
        .map(|i| Point3::new((i % 8) as f32, (i / 8) as f32, 0.0))
        .collect();
    points.push(Point3::new(100.0, 0.0, 0.0));
    let colors: Vec<_> = (0..41).map(|i| Point3::new(i as f32, 0.0, 0.0)).collect();
    let cloud = PointCloud::new(points).with_colors(colors).unwrap();

    let filtered = StatisticalOutlierFilter::new(4, 1.0).filter(&cloud);
    let colors = filtered.colors.as_ref().unwrap();
    for (p, c) in filtered.points.iter().zip(colors) {
        let i = c.x as usize;
        assert_eq!(*p, cloud.points[i]);
    }
    assert!(!filtered.points.contains(&Point3::new(100.0, 0.0, 0.0)));
}

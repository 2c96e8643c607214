//! Statistical outlier removal
//!
//! For every point the mean distance to its `k` nearest neighbors (itself
//! excluded) is computed. With `μ` and `σ` the mean and population standard
//! deviation of those values, a point is kept iff its mean distance is
//! `< μ + m·σ`. When `σ == 0` (perfectly uniform spacing) every point is
//! kept.

use nalgebra::Point3;
use rayon::prelude::*;
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use scan_core::PointCloud;
use tracing::debug;

/// How nearest neighbors are found. Both produce identical results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NeighborSearch {
    /// R*-tree index, `O(n log n)` on typical scans.
    #[default]
    KdTree,
    /// Brute force over all pairs, `O(n²)`.
    Exhaustive,
}

#[derive(Debug, Clone, Copy)]
pub struct StatisticalOutlierFilter {
    pub k: usize,
    pub stddev_multiplier: f64,
    pub search: NeighborSearch,
}

impl Default for StatisticalOutlierFilter {
    fn default() -> Self {
        Self {
            k: 20,
            stddev_multiplier: 2.0,
            search: NeighborSearch::KdTree,
        }
    }
}

struct PointWrapper(Point3<f32>);

impl RTreeObject for PointWrapper {
    type Envelope = AABB<[f32; 3]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.0.x, self.0.y, self.0.z])
    }
}

impl PointDistance for PointWrapper {
    fn distance_2(&self, point: &[f32; 3]) -> f32 {
        squared_distance(&self.0, point)
    }
}

#[inline]
fn squared_distance(p: &Point3<f32>, q: &[f32; 3]) -> f32 {
    let dx = p.x - q[0];
    let dy = p.y - q[1];
    let dz = p.z - q[2];
    dx * dx + dy * dy + dz * dz
}

/// Mean of the given distances, summed smallest first.
fn mean_of_sorted(mut distances: Vec<f32>) -> f64 {
    distances.sort_unstable_by(f32::total_cmp);
    let count = distances.len();
    distances.into_iter().map(f64::from).sum::<f64>() / count as f64
}

impl StatisticalOutlierFilter {
    pub fn new(k: usize, stddev_multiplier: f64) -> Self {
        Self {
            k,
            stddev_multiplier,
            ..Self::default()
        }
    }

    pub fn with_search(mut self, search: NeighborSearch) -> Self {
        self.search = search;
        self
    }

    /// Filtered copy of `cloud`; the input is left untouched.
    pub fn filter(&self, cloud: &PointCloud) -> PointCloud {
        self.filter_with_indices(cloud).0
    }

    /// Filtered copy plus the input indices of the kept points, ascending.
    pub fn filter_with_indices(&self, cloud: &PointCloud) -> (PointCloud, Vec<usize>) {
        let n = cloud.len();
        let k = self.k.min(n.saturating_sub(1));
        if k == 0 {
            return (cloud.clone(), (0..n).collect());
        }

        let means = self.mean_neighbor_distances(&cloud.points, k);
        let (mu, sigma) = mean_and_stddev(&means);
        let threshold = mu + self.stddev_multiplier * sigma;

        let inliers: Vec<usize> = if sigma == 0.0 {
            (0..n).collect()
        } else {
            means
                .iter()
                .enumerate()
                .filter(|&(_, &d)| d < threshold)
                .map(|(i, _)| i)
                .collect()
        };

        debug!(
            input = n,
            kept = inliers.len(),
            k,
            mean = mu,
            stddev = sigma,
            "statistical outlier filter"
        );

        (cloud.select(&inliers), inliers)
    }

    /// Mean distance from each point to its `k` nearest other points.
    pub fn mean_neighbor_distances(&self, points: &[Point3<f32>], k: usize) -> Vec<f64> {
        match self.search {
            NeighborSearch::KdTree => kdtree_mean_distances(points, k),
            NeighborSearch::Exhaustive => exhaustive_mean_distances(points, k),
        }
    }
}

fn kdtree_mean_distances(points: &[Point3<f32>], k: usize) -> Vec<f64> {
    let wrappers: Vec<PointWrapper> = points.iter().copied().map(PointWrapper).collect();
    let tree = RTree::bulk_load(wrappers);

    points
        .par_iter()
        .map(|p| {
            let query_point = [p.x, p.y, p.z];
            // The first hit is the query itself (or a duplicate of it); both
            // are at distance zero.
            let distances: Vec<f32> = tree
                .nearest_neighbor_iter(&query_point)
                .take(k + 1)
                .skip(1)
                .map(|n| squared_distance(&n.0, &query_point).sqrt())
                .collect();
            mean_of_sorted(distances)
        })
        .collect()
}

fn exhaustive_mean_distances(points: &[Point3<f32>], k: usize) -> Vec<f64> {
    points
        .par_iter()
        .enumerate()
        .map(|(i, p)| {
            let query_point = [p.x, p.y, p.z];
            let mut distances: Vec<f32> = points
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, q)| squared_distance(q, &query_point).sqrt())
                .collect();
            distances.select_nth_unstable_by(k - 1, f32::total_cmp);
            distances.truncate(k);
            mean_of_sorted(distances)
        })
        .collect()
}

/// Mean and population standard deviation.
fn mean_and_stddev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / n;
    (mean, variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outlier_removal() {
        // 10 coincident points and one far away.
        let mut points = vec![Point3::new(0.0, 0.0, 0.0); 10];
        points.push(Point3::new(10.0, 10.0, 10.0));
        let pc = PointCloud::new(points);

        let (filtered, inliers) = StatisticalOutlierFilter::new(5, 1.0).filter_with_indices(&pc);
        assert_eq!(filtered.len(), 10);
        assert!(!inliers.contains(&10));
    }

    #[test]
    fn test_small_clouds() {
        let empty = PointCloud::default();
        assert!(StatisticalOutlierFilter::default().filter(&empty).is_empty());

        let single = PointCloud::new(vec![Point3::new(1.0, 2.0, 3.0)]);
        assert_eq!(StatisticalOutlierFilter::default().filter(&single), single);
    }

    #[test]
    fn test_uniform_grid_is_kept_whole() {
        let points: Vec<_> = (0..5)
            .flat_map(|i| (0..5).map(move |j| Point3::new(i as f32, j as f32, 0.0)))
            .collect();
        // With k = 1 every point is exactly 1.0 from its nearest neighbor.
        let pc = PointCloud::new(points);
        let filtered = StatisticalOutlierFilter::new(1, 0.0).filter(&pc);
        assert_eq!(filtered.len(), 25);
    }

    #[test]
    fn test_zero_multiplier_drops_points_at_the_mean() {
        // Nearest-neighbor distances 1, 1, 2, 3, 3: mean 2, stddev > 0.
        let points: Vec<Point3<f32>> = [0.0, 1.0, 3.0, 6.0, 9.0]
            .iter()
            .map(|&x| Point3::new(x, 0.0, 0.0))
            .collect();
        let pc = PointCloud::new(points);

        for search in [NeighborSearch::KdTree, NeighborSearch::Exhaustive] {
            let (_, inliers) = StatisticalOutlierFilter::new(1, 0.0)
                .with_search(search)
                .filter_with_indices(&pc);
            assert_eq!(inliers, vec![0, 1]);
        }
    }

    #[test]
    fn test_mean_and_stddev_population() {
        let (m, s) = mean_and_stddev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(m, 5.0);
        assert_eq!(s, 2.0);
    }
}

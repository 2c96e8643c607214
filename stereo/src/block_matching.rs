use crate::{DisparityMap, Error, Result, StereoMatcher, UNMATCHED};
use image::GrayImage;
use rayon::prelude::*;

/// Block matching stereo matcher using the sum of squared differences.
///
/// A pixel is matched only if its whole `(2r+1)²` window lies inside the
/// left image. Candidates are `d = 0, 1, …, max_disparity - 1`, restricted
/// to those whose right-image window is also in bounds. On equal cost the
/// smallest disparity wins.
#[derive(Debug, Clone, Copy)]
pub struct BlockMatcher {
    pub block_radius: u32,
    pub max_disparity: u32,
}

impl Default for BlockMatcher {
    fn default() -> Self {
        Self {
            block_radius: 3,
            max_disparity: 64,
        }
    }
}

impl StereoMatcher for BlockMatcher {
    fn compute(&self, left: &GrayImage, right: &GrayImage) -> Result<DisparityMap> {
        if left.dimensions() != right.dimensions() {
            return Err(Error::InvalidInput(format!(
                "Left and right images must have the same dimensions, got {:?} and {:?}",
                left.dimensions(),
                right.dimensions()
            )));
        }
        if self.max_disparity == 0 {
            return Err(Error::InvalidInput(
                "Disparity search range must not be empty".to_string(),
            ));
        }

        let width = left.width() as usize;
        let height = left.height() as usize;
        let r = self.block_radius as usize;

        let mut disparity = DisparityMap::new(left.width(), left.height(), self.max_disparity);
        if width == 0 || height == 0 {
            return Ok(disparity);
        }

        let left_data = left.as_raw();
        let right_data = right.as_raw();

        // Compute disparity map row-wise in parallel.
        disparity
            .data
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                if y < r || y + r >= height {
                    return;
                }
                for x in r..width.saturating_sub(r) {
                    row[x] = self.find_best_disparity(left_data, right_data, width, x, y);
                }
            });

        Ok(disparity)
    }
}

impl BlockMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Window radius; the window side is `2 * radius + 1`.
    pub fn with_block_radius(mut self, radius: u32) -> Self {
        self.block_radius = radius;
        self
    }

    /// Number of disparity candidates searched, starting at zero.
    pub fn with_max_disparity(mut self, max_disparity: u32) -> Self {
        self.max_disparity = max_disparity;
        self
    }

    pub fn block_size(&self) -> u32 {
        2 * self.block_radius + 1
    }

    fn find_best_disparity(
        &self,
        left_data: &[u8],
        right_data: &[u8],
        width: usize,
        x: usize,
        y: usize,
    ) -> f32 {
        let r = self.block_radius as usize;
        // Keep the right window (centered at x - d) inside the image.
        let max_valid = (x - r).min(self.max_disparity as usize - 1);

        let mut best: Option<(u64, usize)> = None;
        for d in 0..=max_valid {
            let cost = ssd(left_data, right_data, width, x, y, d, r);
            match best {
                Some((best_cost, _)) if cost >= best_cost => {}
                _ => best = Some((cost, d)),
            }
        }

        best.map_or(UNMATCHED, |(_, d)| d as f32)
    }
}

#[inline]
fn ssd(
    left_data: &[u8],
    right_data: &[u8],
    width: usize,
    x: usize,
    y: usize,
    disparity: usize,
    r: usize,
) -> u64 {
    let mut total = 0u64;
    for ly in (y - r)..=(y + r) {
        let row = ly * width;
        let left_row = &left_data[row + x - r..=row + x + r];
        let right_row = &right_data[row + x - r - disparity..=row + x + r - disparity];
        total += left_row
            .iter()
            .zip(right_row)
            .map(|(&a, &b)| {
                let diff = a as i32 - b as i32;
                (diff * diff) as u64
            })
            .sum::<u64>();
    }
    total
}

/// Compute stereo matching using block matching
pub fn stereo_block_match(
    left: &GrayImage,
    right: &GrayImage,
    block_radius: u32,
    max_disparity: u32,
) -> Result<DisparityMap> {
    BlockMatcher::new()
        .with_block_radius(block_radius)
        .with_max_disparity(max_disparity)
        .compute(left, right)
}

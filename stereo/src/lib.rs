//! Stereo depth estimation
//!
//! Block matching over rectified grayscale pairs and conversion of the
//! resulting disparities into metric depth maps.

use image::GrayImage;

pub mod block_matching;
pub mod depth;

pub use block_matching::*;
pub use depth::*;

pub use scan_core::{Error, Result};

/// Disparity value of pixels that could not be matched.
pub const UNMATCHED: f32 = -1.0;

/// Stereo matching algorithm trait
pub trait StereoMatcher {
    fn compute(&self, left: &GrayImage, right: &GrayImage) -> Result<DisparityMap>;
}

/// Disparity map representation
///
/// Matched pixels hold an integer disparity in `[0, max_disparity)`;
/// everything else holds [`UNMATCHED`].
#[derive(Debug, Clone)]
pub struct DisparityMap {
    pub data: Vec<f32>,
    pub width: u32,
    pub height: u32,
    pub max_disparity: u32,
}

impl DisparityMap {
    pub fn new(width: u32, height: u32, max_disparity: u32) -> Self {
        let size = (width as usize) * (height as usize);
        Self {
            data: vec![UNMATCHED; size],
            width,
            height,
            max_disparity,
        }
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        let idx = (y as usize) * (self.width as usize) + x as usize;
        self.data.get(idx).copied().unwrap_or(UNMATCHED)
    }

    pub fn set(&mut self, x: u32, y: u32, value: f32) {
        let idx = (y as usize) * (self.width as usize) + x as usize;
        if let Some(cell) = self.data.get_mut(idx) {
            *cell = value;
        }
    }

    pub fn is_matched(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.get(x, y) >= 0.0
    }

    pub fn matched_count(&self) -> usize {
        self.data.iter().filter(|&&d| d >= 0.0).count()
    }

    /// Convert to a grayscale image for visualization
    pub fn to_image(&self) -> GrayImage {
        let mut img = GrayImage::new(self.width, self.height);
        let scale = if self.max_disparity > 1 {
            255.0 / (self.max_disparity - 1) as f32
        } else {
            0.0
        };

        for y in 0..self.height {
            for x in 0..self.width {
                let d = self.get(x, y);
                let v = if d >= 0.0 {
                    (d * scale).round().clamp(0.0, 255.0) as u8
                } else {
                    0
                };
                img.put_pixel(x, y, image::Luma([v]));
            }
        }

        img
    }
}

/// Stereo camera parameters
#[derive(Debug, Clone, Copy)]
pub struct StereoParams {
    pub focal_length: f64,
    pub baseline: f64,
}

impl StereoParams {
    pub fn new(focal_length: f64, baseline: f64) -> Self {
        Self {
            focal_length,
            baseline,
        }
    }

    /// Compute depth from disparity
    pub fn disparity_to_depth(&self, disparity: f64) -> Option<f64> {
        if disparity.abs() < 1e-6 {
            None
        } else {
            Some((self.focal_length * self.baseline) / disparity)
        }
    }
}

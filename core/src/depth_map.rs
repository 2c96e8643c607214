//! Dense per-pixel depth.

use crate::{Error, Result};

/// Row-major grid of depths, one per pixel of the reference image.
///
/// Entries that are non-finite or `<= 0` are invalid. A range limit is applied
/// by consumers (see [`DepthMap::is_valid`]).
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    pub data: Vec<f32>,
    pub width: u32,
    pub height: u32,
}

impl DepthMap {
    /// All-invalid map of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![0.0; (width as usize) * (height as usize)],
            width,
            height,
        }
    }

    pub fn from_vec(width: u32, height: u32, data: Vec<f32>) -> Result<Self> {
        let expected = (width as usize) * (height as usize);
        if data.len() != expected {
            return Err(Error::InvalidInput(format!(
                "Depth buffer has {} values, expected {}x{} = {}",
                data.len(),
                width,
                height,
                expected
            )));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Constant-depth map, mostly useful for synthetic scenes.
    pub fn filled(width: u32, height: u32, depth: f32) -> Self {
        Self {
            data: vec![depth; (width as usize) * (height as usize)],
            width,
            height,
        }
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        let idx = (y as usize) * (self.width as usize) + x as usize;
        self.data.get(idx).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, x: u32, y: u32, value: f32) {
        let idx = (y as usize) * (self.width as usize) + x as usize;
        if let Some(cell) = self.data.get_mut(idx) {
            *cell = value;
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether `depth` is usable with the given range limit.
    #[inline]
    pub fn is_valid(depth: f32, max_range: f32) -> bool {
        depth.is_finite() && depth > 0.0 && depth <= max_range
    }

    pub fn valid_count(&self, max_range: f32) -> usize {
        self.data
            .iter()
            .filter(|&&d| Self::is_valid(d, max_range))
            .count()
    }

    /// `(min, max, mean)` over valid entries.
    pub fn stats(&self, max_range: f32) -> Option<(f32, f32, f32)> {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut sum = 0.0f64;
        let mut count = 0usize;
        for &d in &self.data {
            if Self::is_valid(d, max_range) {
                min = min.min(d);
                max = max.max(d);
                sum += d as f64;
                count += 1;
            }
        }
        if count == 0 {
            None
        } else {
            Some((min, max, (sum / count as f64) as f32))
        }
    }
}

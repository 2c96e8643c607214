//! Point cloud construction and cleanup
//!
//! - [`PointCloudBuilder`]: back-projects depth maps through a pinhole camera
//!   into world space.
//! - [`StatisticalOutlierFilter`]: drops points whose mean neighbor distance
//!   is unusually large.

pub mod backproject;
pub mod filtering;

pub use backproject::*;
pub use filtering::*;

pub use scan_core::{Error, PointCloud, Result};

//! Contract between the pipeline and whatever runs the segmentation and depth networks.

use anyhow::Result;
use image::RgbaImage;

use crate::grid::{BinaryMask, CoarseMask, DepthScoreGrid};

/// Runs the segmentation and depth networks for one image.
///
/// Implementations own any loaded models; calls must not mutate shared state visibly, so one
/// provider can serve concurrent pipelines.
pub trait InferenceProvider: Send + Sync {
    /// Foreground/background mask at the image's resolution.
    fn segment_fine(&self, image: &RgbaImage) -> Result<BinaryMask>;

    /// Foreground/background mask at the segmentation model's own resolution.
    fn segment_coarse(&self, image: &RgbaImage) -> Result<CoarseMask>;

    /// Relative depth scores at the depth model's output resolution.
    fn estimate_depth(&self, image: &RgbaImage) -> Result<DepthScoreGrid>;
}
